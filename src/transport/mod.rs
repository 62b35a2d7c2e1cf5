//! Transport module - the message channel to the backend.
//!
//! The session layer only needs three things from a transport:
//! - the local port id, stamped into every outgoing header
//! - sending one datagram to a peer port
//! - receiving one datagram, or learning that the channel is closed
//!
//! [`NetlinkSocket`] implements this over a generic netlink socket. Tests
//! and alternative transports implement [`Channel`] directly.

#[cfg(target_os = "linux")]
mod netlink;

use bytes::Bytes;

use crate::error::Result;

#[cfg(target_os = "linux")]
pub use netlink::{NetlinkSocket, CTRL_ATTR_FAMILY_ID, CTRL_ATTR_FAMILY_NAME, CTRL_CMD_GETFAMILY};

/// Datagram channel carrying netlink messages.
pub trait Channel {
    /// Port id of this end of the channel.
    fn local_port(&self) -> u32;

    /// Send one datagram to `peer`.
    ///
    /// A transport failure is reported as `SendFailed`.
    fn send(&mut self, peer: u32, datagram: &[u8]) -> Result<()>;

    /// Receive one datagram; `Ok(None)` once the channel is closed.
    fn recv(&mut self) -> Result<Option<Bytes>>;
}

impl<C: Channel + ?Sized> Channel for &mut C {
    fn local_port(&self) -> u32 {
        (**self).local_port()
    }

    fn send(&mut self, peer: u32, datagram: &[u8]) -> Result<()> {
        (**self).send(peer, datagram)
    }

    fn recv(&mut self) -> Result<Option<Bytes>> {
        (**self).recv()
    }
}

impl<C: Channel + ?Sized> Channel for Box<C> {
    fn local_port(&self) -> u32 {
        (**self).local_port()
    }

    fn send(&mut self, peer: u32, datagram: &[u8]) -> Result<()> {
        (**self).send(peer, datagram)
    }

    fn recv(&mut self) -> Result<Option<Bytes>> {
        (**self).recv()
    }
}
