//! Error types for matchlib-nl.

use thiserror::Error;

use crate::protocol::Command;

/// Main error type for all pipeline client operations.
#[derive(Debug, Error)]
pub enum MatchError {
    /// The netlink channel could not be opened, bound or resolved.
    #[error("Channel unavailable: {0}")]
    ChannelUnavailable(String),

    /// Session identity is zero or could not be looked up.
    #[error("Invalid session: {0}")]
    SessionInvalid(String),

    /// The transport rejected an outgoing message.
    #[error("Send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Length or tag inconsistency while decoding.
    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    /// A required attribute is missing from an entity.
    #[error("Incomplete {entity}: missing {attribute}")]
    IncompleteEntity {
        /// Entity being decoded.
        entity: &'static str,
        /// Name of the missing attribute.
        attribute: &'static str,
    },

    /// An entity decoded fine but violates a data model invariant.
    #[error("Invalid {entity}: {reason}")]
    InvalidEntity {
        /// Entity being decoded.
        entity: &'static str,
        /// What is wrong with it.
        reason: String,
    },

    /// The device acknowledged the command with a non-zero status.
    #[error("Device rejected {command}: status {status}")]
    DeviceRejected {
        /// Command that was rejected.
        command: Command,
        /// Status carried by the acknowledgement (negative errno).
        status: i32,
    },

    /// The channel ended before the response was complete.
    #[error("Channel closed")]
    ChannelClosed,

    /// A nested attribute does not fit the 16-bit length field.
    #[error("Attribute payload of {0} bytes exceeds the 16-bit length field")]
    AttributeTooLarge(usize),

    /// Invalid configuration value.
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error outside of sending (receive, pid file).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error while loading configuration.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MatchError {
    /// Negative errno equivalent, for command-line consumers that exit with a code.
    pub fn errno(&self) -> i32 {
        let code = match self {
            MatchError::ChannelUnavailable(_) => libc::ENODEV,
            MatchError::SessionInvalid(_) => libc::EINVAL,
            MatchError::SendFailed(e) | MatchError::Io(e) => e.raw_os_error().unwrap_or(libc::EIO),
            MatchError::MalformedMessage(_)
            | MatchError::IncompleteEntity { .. }
            | MatchError::InvalidEntity { .. } => libc::EBADMSG,
            MatchError::DeviceRejected { status, .. } => {
                if *status < 0 {
                    -status
                } else {
                    libc::EIO
                }
            }
            MatchError::ChannelClosed => libc::EPIPE,
            MatchError::AttributeTooLarge(_) => libc::EMSGSIZE,
            MatchError::Config(_) | MatchError::Json(_) => libc::EINVAL,
        };
        -code
    }
}

/// Result type alias using MatchError.
pub type Result<T> = std::result::Result<T, MatchError>;
