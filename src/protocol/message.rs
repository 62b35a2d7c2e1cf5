//! Netlink message with typed accessors.
//!
//! A received datagram carries one or more messages back to back. Each
//! [`Message`] keeps its payload as `bytes::Bytes` sliced from the datagram,
//! so attribute decoding never copies.
//!
//! # Example
//!
//! ```
//! use matchlib_nl::protocol::{
//!     build_message, flags, split_datagram, Attribute, Command, GenlHeader,
//! };
//!
//! let genl = GenlHeader::new(Command::GetHeaders as u8, 1);
//! let bytes = build_message(555, flags::REQUEST, 1, 0, genl, &[Attribute::u32(2, 0)]).unwrap();
//!
//! let messages = split_datagram(bytes).unwrap();
//! assert_eq!(messages.len(), 1);
//! assert_eq!(messages[0].header.seq, 1);
//! ```

use bytes::{BufMut, Bytes, BytesMut};

use super::attr::{decode_attrs, encode_attrs, Attribute};
use super::wire_format::{align, msg_type, GenlHeader, NlHeader, GENL_HDRLEN, NLMSG_HDRLEN};
use crate::error::{MatchError, Result};

/// One netlink message.
#[derive(Debug, Clone)]
pub struct Message {
    /// Decoded netlink header.
    pub header: NlHeader,
    /// Everything after the netlink header.
    pub payload: Bytes,
}

impl Message {
    /// Create a message from header and payload.
    pub fn new(header: NlHeader, payload: Bytes) -> Self {
        Self { header, payload }
    }

    /// Get the sequence number.
    #[inline]
    pub fn seq(&self) -> u32 {
        self.header.seq
    }

    /// Check if this is an error or acknowledgement.
    #[inline]
    pub fn is_error(&self) -> bool {
        self.header.kind == msg_type::ERROR
    }

    /// Check if this ends a multipart response.
    #[inline]
    pub fn is_done(&self) -> bool {
        self.header.kind == msg_type::DONE
    }

    /// Check if this is a no-op.
    #[inline]
    pub fn is_noop(&self) -> bool {
        self.header.kind == msg_type::NOOP
    }

    /// Check if the kernel reported lost data.
    #[inline]
    pub fn is_overrun(&self) -> bool {
        self.header.kind == msg_type::OVERRUN
    }

    /// Check if this is part of a multipart response.
    #[inline]
    pub fn is_multi(&self) -> bool {
        self.header.is_multi()
    }

    /// Status code of an error message (0 = acknowledgement).
    pub fn error_code(&self) -> Result<i32> {
        if !self.is_error() {
            return Err(MatchError::MalformedMessage(format!(
                "Message type {} is not an error message",
                self.header.kind
            )));
        }
        let code = self.payload.get(0..4).ok_or_else(|| {
            MatchError::MalformedMessage("Error message without status code".to_string())
        })?;
        Ok(i32::from_ne_bytes([code[0], code[1], code[2], code[3]]))
    }

    /// Status carried by a `DONE` message, 0 when the payload omits it.
    ///
    /// A dump that fails partway ends with a negative errno here.
    pub fn done_status(&self) -> i32 {
        match self.payload.get(0..4) {
            Some(code) => i32::from_ne_bytes([code[0], code[1], code[2], code[3]]),
            None => 0,
        }
    }

    /// Generic netlink header of a data message.
    pub fn genl(&self) -> Result<GenlHeader> {
        GenlHeader::decode(&self.payload).ok_or_else(|| {
            MatchError::MalformedMessage(format!(
                "Payload of {} bytes cannot hold a generic netlink header",
                self.payload.len()
            ))
        })
    }

    /// Raw attribute bytes following the generic netlink header.
    pub fn attr_bytes(&self) -> Result<Bytes> {
        self.genl()?;
        Ok(self.payload.slice(GENL_HDRLEN..))
    }

    /// Decoded top-level attributes of a data message.
    pub fn attrs(&self) -> Result<Vec<Attribute>> {
        decode_attrs(&self.attr_bytes()?)
    }
}

/// Build a complete generic netlink message.
///
/// The length field is filled in once the attributes are encoded.
pub fn build_message(
    kind: u16,
    flags: u16,
    seq: u32,
    pid: u32,
    genl: GenlHeader,
    attrs: &[Attribute],
) -> Result<Bytes> {
    let body: usize = attrs.iter().map(Attribute::encoded_len).sum();
    let mut buf = BytesMut::with_capacity(NLMSG_HDRLEN + GENL_HDRLEN + body);

    buf.put_slice(&[0u8; NLMSG_HDRLEN]);
    buf.put_slice(&genl.encode());
    encode_attrs(attrs, &mut buf)?;

    let header = NlHeader::new(buf.len() as u32, kind, flags, seq, pid);
    header.encode_into(&mut buf[..NLMSG_HDRLEN]);
    Ok(buf.freeze())
}

/// Build an error message; `code` 0 is an acknowledgement.
///
/// The original request header is echoed back as netlink does.
pub fn build_error(seq: u32, pid: u32, code: i32, request: &NlHeader) -> Bytes {
    let length = NLMSG_HDRLEN + 4 + NLMSG_HDRLEN;
    let mut buf = BytesMut::with_capacity(length);
    buf.put_slice(&NlHeader::new(length as u32, msg_type::ERROR, 0, seq, pid).encode());
    buf.put_slice(&code.to_ne_bytes());
    buf.put_slice(&request.encode());
    buf.freeze()
}

/// Build the message that ends a multipart response.
pub fn build_done(seq: u32, pid: u32, flags: u16, status: i32) -> Bytes {
    let length = NLMSG_HDRLEN + 4;
    let mut buf = BytesMut::with_capacity(length);
    buf.put_slice(&NlHeader::new(length as u32, msg_type::DONE, flags, seq, pid).encode());
    buf.put_slice(&status.to_ne_bytes());
    buf.freeze()
}

/// Split a received datagram into its messages.
///
/// # Errors
///
/// Returns `MalformedMessage` if a header is truncated or declares a length
/// that does not fit the datagram.
pub fn split_datagram(datagram: Bytes) -> Result<Vec<Message>> {
    let mut messages = Vec::new();
    let mut offset = 0;

    while offset < datagram.len() {
        let rest = &datagram[offset..];
        let header = NlHeader::decode(rest).ok_or_else(|| {
            MatchError::MalformedMessage(format!(
                "{} trailing bytes cannot hold a netlink header",
                rest.len()
            ))
        })?;
        header.validate(rest.len())?;

        let length = header.length as usize;
        let payload = datagram.slice(offset + NLMSG_HDRLEN..offset + length);
        messages.push(Message::new(header, payload));

        offset += align(length).min(rest.len());
    }

    Ok(messages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{flags, Command, DEFAULT_FAMILY, MATCH_GENL_VERSION};

    fn genl() -> GenlHeader {
        GenlHeader::new(Command::GetTables as u8, MATCH_GENL_VERSION)
    }

    #[test]
    fn test_build_message_length() {
        let attrs = [Attribute::u32(1, 1), Attribute::u32(2, 3)];
        let bytes = build_message(DEFAULT_FAMILY, flags::REQUEST, 9, 77, genl(), &attrs).unwrap();

        assert_eq!(bytes.len(), NLMSG_HDRLEN + GENL_HDRLEN + 16);
        let header = NlHeader::decode(&bytes).unwrap();
        assert_eq!(header.length as usize, bytes.len());
        assert_eq!(header.kind, DEFAULT_FAMILY);
        assert_eq!(header.seq, 9);
        assert_eq!(header.pid, 77);
    }

    #[test]
    fn test_message_accessors() {
        let bytes = build_message(
            DEFAULT_FAMILY,
            flags::MULTI,
            3,
            0,
            genl(),
            &[Attribute::string(5, "acl")],
        )
        .unwrap();
        let messages = split_datagram(bytes).unwrap();
        let message = &messages[0];

        assert!(message.is_multi());
        assert!(!message.is_error());
        assert!(!message.is_done());
        assert_eq!(message.genl().unwrap().cmd, Command::GetTables as u8);
        let attrs = message.attrs().unwrap();
        assert_eq!(attrs[0].as_str().unwrap(), "acl");
    }

    #[test]
    fn test_multiple_messages_in_one_datagram() {
        let mut datagram = BytesMut::new();
        for seq in 1..=3 {
            let attrs = [Attribute::u8(1, seq as u8)];
            let bytes =
                build_message(DEFAULT_FAMILY, flags::MULTI, seq, 0, genl(), &attrs).unwrap();
            datagram.extend_from_slice(&bytes);
        }
        datagram.extend_from_slice(&build_done(3, 0, flags::MULTI, 0));

        let messages = split_datagram(datagram.freeze()).unwrap();
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].seq(), 1);
        assert_eq!(messages[2].attrs().unwrap()[0].as_u8().unwrap(), 3);
        assert!(messages[3].is_done());
    }

    #[test]
    fn test_error_and_ack() {
        let request = NlHeader::new(20, DEFAULT_FAMILY, flags::REQUEST | flags::ACK, 5, 10);

        let ack = split_datagram(build_error(5, 0, 0, &request)).unwrap();
        assert!(ack[0].is_error());
        assert_eq!(ack[0].error_code().unwrap(), 0);

        let nack = split_datagram(build_error(5, 0, -22, &request)).unwrap();
        assert_eq!(nack[0].error_code().unwrap(), -22);
    }

    #[test]
    fn test_error_code_on_data_message() {
        let bytes = build_message(DEFAULT_FAMILY, 0, 1, 0, genl(), &[]).unwrap();
        let messages = split_datagram(bytes).unwrap();
        assert!(messages[0].error_code().is_err());
    }

    #[test]
    fn test_done_status() {
        let ok = split_datagram(build_done(4, 0, flags::MULTI, 0)).unwrap();
        assert_eq!(ok[0].done_status(), 0);

        let failed = split_datagram(build_done(4, 0, flags::MULTI, -5)).unwrap();
        assert!(failed[0].is_done());
        assert_eq!(failed[0].done_status(), -5);
    }

    #[test]
    fn test_done_without_status() {
        let header = NlHeader::new(NLMSG_HDRLEN as u32, msg_type::DONE, flags::MULTI, 4, 0);
        let messages = split_datagram(Bytes::copy_from_slice(&header.encode())).unwrap();
        assert_eq!(messages[0].done_status(), 0);
    }

    #[test]
    fn test_truncated_datagram() {
        let attrs = [Attribute::u32(1, 1)];
        let bytes = build_message(DEFAULT_FAMILY, 0, 1, 0, genl(), &attrs).unwrap();
        for cut in 1..bytes.len() {
            assert!(matches!(
                split_datagram(bytes.slice(..cut)),
                Err(MatchError::MalformedMessage(_))
            ));
        }
    }

    #[test]
    fn test_missing_genl_header() {
        let header = NlHeader::new(NLMSG_HDRLEN as u32 + 2, DEFAULT_FAMILY, 0, 1, 0);
        let mut buf = BytesMut::new();
        buf.put_slice(&header.encode());
        buf.put_slice(&[0, 0]);

        let messages = split_datagram(buf.freeze()).unwrap();
        assert!(messages[0].genl().is_err());
        assert!(messages[0].attrs().is_err());
    }

    #[test]
    fn test_empty_datagram() {
        assert!(split_datagram(Bytes::new()).unwrap().is_empty());
    }
}
