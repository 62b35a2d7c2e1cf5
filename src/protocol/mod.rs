//! Protocol module - wire format, attributes and messages.
//!
//! This module implements the netlink side of the protocol:
//! - netlink and generic netlink header encoding/decoding
//! - the recursive attribute codec
//! - message building and datagram splitting
//! - command discriminants and attribute type numbers

mod attr;
mod message;
pub mod tags;
mod wire_format;

pub use attr::{
    decode_attrs, encode_attrs, find_attr, AttrValue, Attribute, MAX_NESTING, NLA_F_NESTED,
    NLA_F_NET_BYTEORDER, NLA_HDRLEN, NLA_TYPE_MASK,
};
pub use message::{build_done, build_error, build_message, split_datagram, Message};
pub use wire_format::{
    align, flags, msg_type, Command, GenlHeader, NlHeader, DEFAULT_FAMILY, GENL_HDRLEN,
    MATCH_GENL_NAME, MATCH_GENL_VERSION, NLA_ALIGNTO, NLMSG_HDRLEN,
};
