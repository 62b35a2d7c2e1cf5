//! Netlink attribute codec.
//!
//! Implements the recursive type-length-value container every message payload
//! is made of:
//! ```text
//! ┌──────────┬──────────┬──────────────────┬──────────┐
//! │ Length   │ Type     │ Payload          │ Padding  │
//! │ u16      │ u16      │ Length - 4 bytes │ to 4     │
//! └──────────┴──────────┴──────────────────┴──────────┘
//! ```
//!
//! `Length` counts the header but not the padding. Bit 15 of `Type` marks a
//! payload made of further attributes. Payloads are shared with the receive
//! buffer through `bytes::Bytes`.
//!
//! # Example
//!
//! ```
//! use bytes::BytesMut;
//! use matchlib_nl::protocol::{decode_attrs, Attribute};
//!
//! let attr = Attribute::nested(1, vec![Attribute::u32(1, 7), Attribute::string(2, "eth")]);
//! let mut buf = BytesMut::new();
//! attr.encode(&mut buf).unwrap();
//!
//! let decoded = decode_attrs(&buf.freeze()).unwrap();
//! assert_eq!(decoded, vec![attr]);
//! ```

use std::borrow::Cow;

use bytes::{BufMut, Bytes, BytesMut};

use super::wire_format::align;
use crate::error::{MatchError, Result};

/// Attribute header size in bytes.
pub const NLA_HDRLEN: usize = 4;

/// Payload is a nested attribute list.
pub const NLA_F_NESTED: u16 = 0x8000;

/// Payload is in network byte order.
pub const NLA_F_NET_BYTEORDER: u16 = 0x4000;

/// Mask selecting the type bits.
pub const NLA_TYPE_MASK: u16 = !(NLA_F_NESTED | NLA_F_NET_BYTEORDER);

/// Deepest nesting accepted while decoding.
pub const MAX_NESTING: usize = 32;

/// Payload of an attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrValue {
    /// Raw bytes (integer, string, opaque).
    Scalar(Bytes),
    /// Child attributes.
    Nested(Vec<Attribute>),
}

/// One node of an attribute tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// Attribute type, flag bits stripped.
    pub kind: u16,
    /// Payload.
    pub value: AttrValue,
}

impl Attribute {
    /// Create an attribute from a kind and value.
    pub fn new(kind: u16, value: AttrValue) -> Self {
        Self {
            kind: kind & NLA_TYPE_MASK,
            value,
        }
    }

    /// Attribute carrying one byte.
    pub fn u8(kind: u16, value: u8) -> Self {
        Self::bytes(kind, Bytes::copy_from_slice(&[value]))
    }

    /// Attribute carrying a u16.
    pub fn u16(kind: u16, value: u16) -> Self {
        Self::bytes(kind, Bytes::copy_from_slice(&value.to_ne_bytes()))
    }

    /// Attribute carrying a u32.
    pub fn u32(kind: u16, value: u32) -> Self {
        Self::bytes(kind, Bytes::copy_from_slice(&value.to_ne_bytes()))
    }

    /// Attribute carrying a u64.
    pub fn u64(kind: u16, value: u64) -> Self {
        Self::bytes(kind, Bytes::copy_from_slice(&value.to_ne_bytes()))
    }

    /// Attribute carrying a NUL-terminated string.
    pub fn string(kind: u16, value: &str) -> Self {
        let mut buf = BytesMut::with_capacity(value.len() + 1);
        buf.put_slice(value.as_bytes());
        buf.put_u8(0);
        Self::bytes(kind, buf.freeze())
    }

    /// Attribute with an empty payload.
    pub fn flag(kind: u16) -> Self {
        Self::bytes(kind, Bytes::new())
    }

    /// Attribute carrying raw bytes.
    pub fn bytes(kind: u16, payload: impl Into<Bytes>) -> Self {
        Self::new(kind, AttrValue::Scalar(payload.into()))
    }

    /// Attribute carrying child attributes.
    pub fn nested(kind: u16, children: Vec<Attribute>) -> Self {
        Self::new(kind, AttrValue::Nested(children))
    }

    /// Check if the payload is a child list.
    #[inline]
    pub fn is_nested(&self) -> bool {
        matches!(self.value, AttrValue::Nested(_))
    }

    /// Length of the payload once encoded, without padding.
    pub fn payload_len(&self) -> usize {
        match &self.value {
            AttrValue::Scalar(bytes) => bytes.len(),
            AttrValue::Nested(children) => children.iter().map(Attribute::encoded_len).sum(),
        }
    }

    /// Length once encoded, header and padding included.
    pub fn encoded_len(&self) -> usize {
        align(NLA_HDRLEN + self.payload_len())
    }

    /// Encode into `buf`.
    ///
    /// The length field is written after the payload so nested lengths are
    /// always consistent with their children.
    ///
    /// # Errors
    ///
    /// Returns `AttributeTooLarge` if the attribute does not fit a u16 length.
    pub fn encode(&self, buf: &mut BytesMut) -> Result<()> {
        let start = buf.len();
        let kind = match self.value {
            AttrValue::Scalar(_) => self.kind,
            AttrValue::Nested(_) => self.kind | NLA_F_NESTED,
        };

        buf.put_slice(&0u16.to_ne_bytes());
        buf.put_slice(&kind.to_ne_bytes());

        match &self.value {
            AttrValue::Scalar(bytes) => buf.put_slice(bytes),
            AttrValue::Nested(children) => encode_attrs(children, buf)?,
        }

        let len = buf.len() - start;
        let len16 = u16::try_from(len).map_err(|_| MatchError::AttributeTooLarge(len))?;
        buf[start..start + 2].copy_from_slice(&len16.to_ne_bytes());
        buf.put_bytes(0, align(len) - len);
        Ok(())
    }

    /// Scalar payload, if this attribute is not nested.
    pub fn payload(&self) -> Option<&Bytes> {
        match &self.value {
            AttrValue::Scalar(bytes) => Some(bytes),
            AttrValue::Nested(_) => None,
        }
    }

    fn fixed<const N: usize>(&self) -> Result<[u8; N]> {
        let bytes = self.payload().ok_or_else(|| {
            MatchError::MalformedMessage(format!(
                "Attribute {} is nested, expected {} byte scalar",
                self.kind, N
            ))
        })?;
        <[u8; N]>::try_from(&bytes[..]).map_err(|_| {
            MatchError::MalformedMessage(format!(
                "Attribute {} has {} bytes, expected {}",
                self.kind,
                bytes.len(),
                N
            ))
        })
    }

    /// Read the payload as a u8.
    pub fn as_u8(&self) -> Result<u8> {
        Ok(self.fixed::<1>()?[0])
    }

    /// Read the payload as a u16.
    pub fn as_u16(&self) -> Result<u16> {
        Ok(u16::from_ne_bytes(self.fixed()?))
    }

    /// Read the payload as a u32.
    pub fn as_u32(&self) -> Result<u32> {
        Ok(u32::from_ne_bytes(self.fixed()?))
    }

    /// Read the payload as a u64.
    pub fn as_u64(&self) -> Result<u64> {
        Ok(u64::from_ne_bytes(self.fixed()?))
    }

    /// Read the payload as a string, trailing NUL bytes removed.
    pub fn as_str(&self) -> Result<String> {
        let bytes = self.payload().ok_or_else(|| {
            MatchError::MalformedMessage(format!(
                "Attribute {} is nested, expected string",
                self.kind
            ))
        })?;
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        std::str::from_utf8(&bytes[..end])
            .map(str::to_owned)
            .map_err(|e| MatchError::MalformedMessage(format!("Attribute {}: {}", self.kind, e)))
    }

    /// Child attributes.
    ///
    /// A scalar payload is parsed as an attribute list, for peers that do not
    /// set the nested flag.
    pub fn children(&self) -> Result<Cow<'_, [Attribute]>> {
        match &self.value {
            AttrValue::Nested(children) => Ok(Cow::Borrowed(children)),
            AttrValue::Scalar(bytes) => decode_attrs(bytes).map(Cow::Owned),
        }
    }
}

/// Encode a list of attributes back to back.
pub fn encode_attrs(attrs: &[Attribute], buf: &mut BytesMut) -> Result<()> {
    for attr in attrs {
        attr.encode(buf)?;
    }
    Ok(())
}

/// Decode a run of attributes.
///
/// # Errors
///
/// Returns `MalformedMessage` if any declared length is shorter than the
/// attribute header or runs past the end of `buf`.
pub fn decode_attrs(buf: &Bytes) -> Result<Vec<Attribute>> {
    decode_level(buf, 0)
}

fn decode_level(buf: &Bytes, depth: usize) -> Result<Vec<Attribute>> {
    if depth > MAX_NESTING {
        return Err(MatchError::MalformedMessage(format!(
            "Attributes nested deeper than {}",
            MAX_NESTING
        )));
    }

    let mut attrs = Vec::new();
    let mut offset = 0;

    while offset < buf.len() {
        let rest = &buf[offset..];
        if rest.len() < NLA_HDRLEN {
            return Err(MatchError::MalformedMessage(format!(
                "{} trailing bytes cannot hold an attribute header",
                rest.len()
            )));
        }

        let len = u16::from_ne_bytes([rest[0], rest[1]]) as usize;
        let raw_kind = u16::from_ne_bytes([rest[2], rest[3]]);

        if len < NLA_HDRLEN {
            return Err(MatchError::MalformedMessage(format!(
                "Attribute length {} is shorter than its header",
                len
            )));
        }
        if len > rest.len() {
            return Err(MatchError::MalformedMessage(format!(
                "Attribute length {} exceeds the {} bytes left",
                len,
                rest.len()
            )));
        }

        let payload = buf.slice(offset + NLA_HDRLEN..offset + len);
        let value = if raw_kind & NLA_F_NESTED != 0 {
            AttrValue::Nested(decode_level(&payload, depth + 1)?)
        } else {
            AttrValue::Scalar(payload)
        };
        attrs.push(Attribute::new(raw_kind, value));

        // The final attribute may come without its padding.
        offset += align(len).min(rest.len());
    }

    Ok(attrs)
}

/// First attribute of the given kind.
pub fn find_attr(attrs: &[Attribute], kind: u16) -> Option<&Attribute> {
    attrs.iter().find(|a| a.kind == kind)
}
