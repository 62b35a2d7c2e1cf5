//! Session layer - one request, one response.
//!
//! Every command runs the same cycle:
//!
//! ```text
//! Build ──► Dispatch ──► Collect ──► Finalize
//!  Request    Channel::send  Fragments    DONE / ack / last reply
//! ```
//!
//! The response is read through [`Fragments`], an iterator over the data
//! messages that belong to the request. It stops at the end of the
//! response and yields an error if the device rejects the command or the
//! channel closes first. Dropping it early abandons the response.

use std::collections::VecDeque;
use std::fmt;
use std::num::NonZeroU32;
use std::path::Path;

use bytes::Bytes;

use crate::error::{MatchError, Result};
use crate::protocol::tags::{top, IDENTIFIER_IFINDEX};
use crate::protocol::{
    build_message, flags, split_datagram, Attribute, Command, GenlHeader, Message,
    DEFAULT_FAMILY, MATCH_GENL_VERSION,
};
use crate::transport::Channel;

/// Port id of the backend daemon serving requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(NonZeroU32);

impl SessionId {
    /// Wrap a backend port id; zero is rejected.
    pub fn new(pid: u32) -> Result<Self> {
        NonZeroU32::new(pid)
            .map(Self)
            .ok_or_else(|| MatchError::SessionInvalid("session id 0".to_string()))
    }

    /// Read the backend port id from its pid file.
    pub fn lookup(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| MatchError::SessionInvalid(format!("{}: {}", path.display(), e)))?;
        let pid = text.trim().parse::<u32>().map_err(|e| {
            MatchError::SessionInvalid(format!("{}: {:?}: {}", path.display(), text.trim(), e))
        })?;
        tracing::debug!(path = %path.display(), pid, "session id looked up");
        Self::new(pid)
    }

    /// The raw port id.
    #[inline]
    pub fn get(self) -> u32 {
        self.0.get()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Device addressing carried by every command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Target {
    /// Interface index of the switch device.
    pub ifindex: u32,
    /// Netlink message type of the backend family.
    pub family: u16,
}

impl Default for Target {
    fn default() -> Self {
        Self {
            ifindex: 0,
            family: DEFAULT_FAMILY,
        }
    }
}

/// A command ready to be sent.
#[derive(Debug, Clone)]
pub struct Request {
    command: Command,
    target: Target,
    payload: Vec<Attribute>,
}

impl Request {
    /// Request for `command` on `target` without payload.
    pub fn new(command: Command, target: Target) -> Self {
        Self {
            command,
            target,
            payload: Vec::new(),
        }
    }

    /// Append a payload attribute.
    pub fn attr(mut self, attr: Attribute) -> Self {
        self.payload.push(attr);
        self
    }

    /// Command being sent.
    #[inline]
    pub fn command(&self) -> Command {
        self.command
    }

    /// Netlink flags; mutations ask for an acknowledgement.
    pub fn flags(&self) -> u16 {
        if self.command.is_mutation() {
            flags::REQUEST | flags::ACK
        } else {
            flags::REQUEST
        }
    }

    /// Encode with sequence number `seq`, sent from local port `pid`.
    pub fn encode(&self, seq: u32, pid: u32) -> Result<Bytes> {
        let mut attrs = Vec::with_capacity(self.payload.len() + 2);
        attrs.push(Attribute::u32(top::IDENTIFIER_TYPE, IDENTIFIER_IFINDEX));
        attrs.push(Attribute::u32(top::IDENTIFIER, self.target.ifindex));
        attrs.extend(self.payload.iter().cloned());
        build_message(
            self.target.family,
            self.flags(),
            seq,
            pid,
            GenlHeader::new(self.command as u8, MATCH_GENL_VERSION),
            &attrs,
        )
    }
}

/// Send `request` to the backend and return the response stream.
pub fn dispatch<'a, C: Channel>(
    channel: &'a mut C,
    peer: SessionId,
    request: &Request,
    seq: u32,
) -> Result<Fragments<'a, C>> {
    let bytes = request.encode(seq, channel.local_port())?;
    tracing::debug!(
        command = %request.command,
        seq,
        peer = peer.get(),
        len = bytes.len(),
        "dispatching request"
    );
    channel.send(peer.get(), &bytes)?;
    Ok(Fragments::new(channel, peer, request.command, seq))
}

/// Data messages of one response.
pub struct Fragments<'a, C: Channel> {
    channel: &'a mut C,
    peer: u32,
    command: Command,
    seq: u32,
    pending: VecDeque<Message>,
    await_ack: bool,
    finished: bool,
}

impl<'a, C: Channel> Fragments<'a, C> {
    fn new(channel: &'a mut C, peer: SessionId, command: Command, seq: u32) -> Self {
        Self {
            channel,
            peer: peer.get(),
            command,
            seq,
            pending: VecDeque::new(),
            await_ack: command.is_mutation(),
            finished: false,
        }
    }

    fn finish(&mut self) {
        self.finished = true;
        tracing::debug!(command = %self.command, seq = self.seq, "response complete");
    }

    fn fail(&mut self, err: MatchError) -> Option<Result<Message>> {
        self.finished = true;
        Some(Err(err))
    }
}

impl<C: Channel> Iterator for Fragments<'_, C> {
    type Item = Result<Message>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.finished {
            let Some(msg) = self.pending.pop_front() else {
                match self.channel.recv() {
                    Ok(Some(datagram)) => match split_datagram(datagram) {
                        Ok(messages) => self.pending.extend(messages),
                        Err(e) => return self.fail(e),
                    },
                    Ok(None) => return self.fail(MatchError::ChannelClosed),
                    Err(e) => return self.fail(e),
                }
                continue;
            };

            if msg.seq() != self.seq {
                tracing::warn!(
                    expected = self.seq,
                    got = msg.seq(),
                    kind = msg.header.kind,
                    "ignoring message from another request"
                );
                continue;
            }

            if msg.header.pid != self.peer {
                tracing::warn!(
                    expected = self.peer,
                    got = msg.header.pid,
                    seq = self.seq,
                    "ignoring message from another sender"
                );
                continue;
            }

            if msg.is_noop() {
                continue;
            }

            if msg.is_overrun() {
                return self.fail(MatchError::MalformedMessage(
                    "receive buffer overrun".to_string(),
                ));
            }

            if msg.is_error() {
                return match msg.error_code() {
                    Ok(0) => {
                        self.finish();
                        None
                    }
                    Ok(status) => {
                        tracing::error!(command = %self.command, status, "device rejected command");
                        self.fail(MatchError::DeviceRejected {
                            command: self.command,
                            status,
                        })
                    }
                    Err(e) => self.fail(e),
                };
            }

            if msg.is_done() {
                let status = msg.done_status();
                if status != 0 {
                    tracing::error!(command = %self.command, status, "dump aborted by device");
                    return self.fail(MatchError::DeviceRejected {
                        command: self.command,
                        status,
                    });
                }
                self.finish();
                return None;
            }

            if msg.header.is_control() {
                tracing::trace!(kind = msg.header.kind, "skipping control message");
                continue;
            }

            tracing::trace!(
                command = %self.command,
                seq = self.seq,
                len = msg.payload.len(),
                multi = msg.is_multi(),
                "fragment"
            );
            if !msg.is_multi() && !self.await_ack {
                self.finish();
            }
            return Some(Ok(msg));
        }
        None
    }
}

/// Drain `fragments`, decoding each with `decode` and concatenating the results.
///
/// Any error aborts the call; nothing accumulated so far is returned.
pub fn collect<C, T, F>(fragments: Fragments<'_, C>, mut decode: F) -> Result<Vec<T>>
where
    C: Channel,
    F: FnMut(&[Attribute]) -> Result<Vec<T>>,
{
    let mut items = Vec::new();
    for msg in fragments {
        let attrs = msg?.attrs()?;
        items.extend(decode(&attrs)?);
    }
    Ok(items)
}

/// Drain `fragments` until the acknowledgement, discarding data replies.
pub fn await_ack<C: Channel>(fragments: Fragments<'_, C>) -> Result<()> {
    for msg in fragments {
        let msg = msg?;
        tracing::trace!(len = msg.payload.len(), "discarding reply to mutation");
    }
    Ok(())
}
