//! Wire format encoding and decoding.
//!
//! Every message is a netlink header followed by a generic netlink header and
//! a run of attributes:
//! ```text
//! ┌──────────┬──────────┬──────────┬──────────┬──────────┐┌─────┬─────────┬──────────┐
//! │ Length   │ Type     │ Flags    │ Seq      │ Port ID  ││ Cmd │ Version │ Reserved │
//! │ u32      │ u16      │ u16      │ u32      │ u32      ││ u8  │ u8      │ u16      │
//! └──────────┴──────────┴──────────┴──────────┴──────────┘└─────┴─────────┴──────────┘
//! ```
//!
//! Netlink uses host byte order throughout.

use std::fmt;

use crate::error::{MatchError, Result};

/// Netlink header size in bytes.
pub const NLMSG_HDRLEN: usize = 16;

/// Generic netlink header size in bytes.
pub const GENL_HDRLEN: usize = 4;

/// Alignment of messages and attributes.
pub const NLA_ALIGNTO: usize = 4;

/// Protocol version carried in the generic netlink header.
pub const MATCH_GENL_VERSION: u8 = 1;

/// Generic netlink family name registered by the pipeline backend.
pub const MATCH_GENL_NAME: &str = "net_mat_nl";

/// Fixed message type used by the user-space backend when no family is resolved.
pub const DEFAULT_FAMILY: u16 = 555;

/// Round `len` up to the netlink alignment.
#[inline]
pub const fn align(len: usize) -> usize {
    (len + NLA_ALIGNTO - 1) & !(NLA_ALIGNTO - 1)
}

/// Reserved netlink message types.
pub mod msg_type {
    /// Nothing, skip.
    pub const NOOP: u16 = 0x1;
    /// Error or acknowledgement.
    pub const ERROR: u16 = 0x2;
    /// End of a multipart response.
    pub const DONE: u16 = 0x3;
    /// Data lost.
    pub const OVERRUN: u16 = 0x4;
    /// Types below this value are control messages.
    pub const MIN_TYPE: u16 = 0x10;
    /// Generic netlink controller.
    pub const GENL_ID_CTRL: u16 = 0x10;
}

/// Netlink header flags.
pub mod flags {
    /// It is a request message.
    pub const REQUEST: u16 = 0x1;
    /// Multipart message, terminated by `DONE`.
    pub const MULTI: u16 = 0x2;
    /// Reply with an acknowledgement.
    pub const ACK: u16 = 0x4;
    /// Echo this request.
    pub const ECHO: u16 = 0x8;
    /// Return the complete table (dump request).
    pub const DUMP: u16 = 0x300;

    /// Check if a specific flag is set.
    #[inline]
    pub fn has_flag(flags: u16, flag: u16) -> bool {
        flags & flag == flag
    }
}

/// Command discriminants understood by the pipeline backend.
///
/// The values are part of the wire contract and never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Command {
    /// Fetch all tables.
    GetTables = 0,
    /// Fetch all header layouts.
    GetHeaders = 1,
    /// Fetch all actions.
    GetActions = 2,
    /// Fetch the parser graph.
    GetHeaderGraph = 3,
    /// Fetch the table graph.
    GetTableGraph = 4,
    /// Fetch installed rules of a table.
    GetRules = 5,
    /// Install rules.
    SetRules = 6,
    /// Remove rules.
    DelRules = 7,
    /// Create a table.
    CreateTable = 8,
    /// Destroy a table.
    DestroyTable = 9,
    /// Update a table.
    UpdateTable = 10,
    /// Fetch ports.
    GetPorts = 11,
    /// Resolve a PCI or MAC address to a logical port.
    GetLport = 12,
    /// Resolve a logical port to a physical port.
    GetPhysPort = 13,
    /// Configure ports.
    SetPorts = 14,
}

impl Command {
    /// Decode a command byte.
    pub fn from_u8(cmd: u8) -> Option<Self> {
        Some(match cmd {
            0 => Command::GetTables,
            1 => Command::GetHeaders,
            2 => Command::GetActions,
            3 => Command::GetHeaderGraph,
            4 => Command::GetTableGraph,
            5 => Command::GetRules,
            6 => Command::SetRules,
            7 => Command::DelRules,
            8 => Command::CreateTable,
            9 => Command::DestroyTable,
            10 => Command::UpdateTable,
            11 => Command::GetPorts,
            12 => Command::GetLport,
            13 => Command::GetPhysPort,
            14 => Command::SetPorts,
            _ => return None,
        })
    }

    /// Name used in logs and error messages.
    pub fn name(self) -> &'static str {
        match self {
            Command::GetTables => "get_tables",
            Command::GetHeaders => "get_headers",
            Command::GetActions => "get_actions",
            Command::GetHeaderGraph => "get_header_graph",
            Command::GetTableGraph => "get_table_graph",
            Command::GetRules => "get_rules",
            Command::SetRules => "set_rules",
            Command::DelRules => "del_rules",
            Command::CreateTable => "create_table",
            Command::DestroyTable => "destroy_table",
            Command::UpdateTable => "update_table",
            Command::GetPorts => "get_ports",
            Command::GetLport => "get_lport",
            Command::GetPhysPort => "get_phys_port",
            Command::SetPorts => "set_ports",
        }
    }

    /// Whether the command changes device state and expects an acknowledgement.
    pub fn is_mutation(self) -> bool {
        matches!(
            self,
            Command::SetRules
                | Command::DelRules
                | Command::CreateTable
                | Command::DestroyTable
                | Command::UpdateTable
                | Command::SetPorts
        )
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Decoded netlink header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NlHeader {
    /// Total message length including this header.
    pub length: u32,
    /// Message type (family id or reserved type).
    pub kind: u16,
    /// Flags (see `flags` module).
    pub flags: u16,
    /// Sequence number used for correlation.
    pub seq: u32,
    /// Sending port id.
    pub pid: u32,
}

impl NlHeader {
    /// Create a new header.
    pub fn new(length: u32, kind: u16, flags: u16, seq: u32, pid: u32) -> Self {
        Self {
            length,
            kind,
            flags,
            seq,
            pid,
        }
    }

    /// Encode header to bytes.
    pub fn encode(&self) -> [u8; NLMSG_HDRLEN] {
        let mut buf = [0u8; NLMSG_HDRLEN];
        self.encode_into(&mut buf);
        buf
    }

    /// Encode header into an existing buffer.
    ///
    /// # Panics
    ///
    /// Panics if buffer is smaller than `NLMSG_HDRLEN` (16 bytes).
    pub fn encode_into(&self, buf: &mut [u8]) {
        buf[0..4].copy_from_slice(&self.length.to_ne_bytes());
        buf[4..6].copy_from_slice(&self.kind.to_ne_bytes());
        buf[6..8].copy_from_slice(&self.flags.to_ne_bytes());
        buf[8..12].copy_from_slice(&self.seq.to_ne_bytes());
        buf[12..16].copy_from_slice(&self.pid.to_ne_bytes());
    }

    /// Decode header from bytes.
    ///
    /// Returns `None` if buffer is too short.
    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < NLMSG_HDRLEN {
            return None;
        }
        Some(Self {
            length: u32::from_ne_bytes([buf[0], buf[1], buf[2], buf[3]]),
            kind: u16::from_ne_bytes([buf[4], buf[5]]),
            flags: u16::from_ne_bytes([buf[6], buf[7]]),
            seq: u32::from_ne_bytes([buf[8], buf[9], buf[10], buf[11]]),
            pid: u32::from_ne_bytes([buf[12], buf[13], buf[14], buf[15]]),
        })
    }

    /// Validate the declared length against the bytes available.
    pub fn validate(&self, available: usize) -> Result<()> {
        let length = self.length as usize;
        if length < NLMSG_HDRLEN {
            return Err(MatchError::MalformedMessage(format!(
                "Message length {} is shorter than the header",
                length
            )));
        }
        if length > available {
            return Err(MatchError::MalformedMessage(format!(
                "Message length {} exceeds the {} bytes received",
                length, available
            )));
        }
        Ok(())
    }

    /// Check if this is a control message (error, done, noop, overrun).
    #[inline]
    pub fn is_control(&self) -> bool {
        self.kind < msg_type::MIN_TYPE
    }

    /// Check if this is part of a multipart response.
    #[inline]
    pub fn is_multi(&self) -> bool {
        flags::has_flag(self.flags, flags::MULTI)
    }
}

/// Decoded generic netlink header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenlHeader {
    /// Command byte.
    pub cmd: u8,
    /// Family version.
    pub version: u8,
}

impl GenlHeader {
    /// Create a new header for the given command.
    pub fn new(cmd: u8, version: u8) -> Self {
        Self { cmd, version }
    }

    /// Encode header to bytes (reserved field zeroed).
    pub fn encode(&self) -> [u8; GENL_HDRLEN] {
        [self.cmd, self.version, 0, 0]
    }

    /// Decode header from bytes.
    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < GENL_HDRLEN {
            return None;
        }
        Some(Self {
            cmd: buf[0],
            version: buf[1],
        })
    }
}
