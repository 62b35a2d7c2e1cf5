//! Generic netlink socket.
//!
//! # Example
//!
//! ```ignore
//! use matchlib_nl::transport::NetlinkSocket;
//!
//! let mut sock = NetlinkSocket::open()?;
//! let family = sock.resolve_family("net_mat_nl")?;
//! ```

use std::io;
use std::mem;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::time::Duration;

use bytes::{Bytes, BytesMut};

use super::Channel;
use crate::error::{MatchError, Result};
use crate::protocol::{
    build_message, flags, msg_type, split_datagram, Attribute, GenlHeader,
};

/// Generic netlink controller command resolving a family name.
pub const CTRL_CMD_GETFAMILY: u8 = 3;
/// Controller attribute carrying the family id (u16).
pub const CTRL_ATTR_FAMILY_ID: u16 = 1;
/// Controller attribute carrying the family name.
pub const CTRL_ATTR_FAMILY_NAME: u16 = 2;

/// Smallest receive buffer; larger datagrams get a buffer of their own size.
const RECV_BUFFER: usize = 32 * 1024;

/// Port id of the kernel.
const KERNEL_PORT: u32 = 0;

/// A bound `AF_NETLINK` / `NETLINK_GENERIC` socket.
#[derive(Debug)]
pub struct NetlinkSocket {
    fd: OwnedFd,
    port: u32,
    seq: u32,
}

fn check(res: libc::c_int) -> io::Result<libc::c_int> {
    if res == -1 {
        Err(io::Error::last_os_error())
    } else {
        Ok(res)
    }
}

fn sockaddr(pid: u32) -> libc::sockaddr_nl {
    // SAFETY: sockaddr_nl is plain old data; all-zero is a valid value.
    let mut addr: libc::sockaddr_nl = unsafe { mem::zeroed() };
    addr.nl_family = libc::AF_NETLINK as libc::sa_family_t;
    addr.nl_pid = pid;
    addr
}

impl NetlinkSocket {
    /// Open and bind a socket; the kernel assigns the local port.
    pub fn open() -> Result<Self> {
        let unavailable = |what: &str| {
            MatchError::ChannelUnavailable(format!("{}: {}", what, io::Error::last_os_error()))
        };

        // SAFETY: plain socket(2) call.
        let raw = unsafe {
            libc::socket(
                libc::AF_NETLINK,
                libc::SOCK_RAW | libc::SOCK_CLOEXEC,
                libc::NETLINK_GENERIC,
            )
        };
        if raw == -1 {
            return Err(unavailable("socket"));
        }
        // SAFETY: `raw` is a freshly opened descriptor owned by nobody else.
        let fd = unsafe { OwnedFd::from_raw_fd(raw) };

        let addr = sockaddr(0);
        // SAFETY: `addr` outlives the call and the length matches its type.
        let res = unsafe {
            libc::bind(
                fd.as_raw_fd(),
                &addr as *const libc::sockaddr_nl as *const libc::sockaddr,
                mem::size_of::<libc::sockaddr_nl>() as libc::socklen_t,
            )
        };
        if res == -1 {
            return Err(unavailable("bind"));
        }

        let mut bound = sockaddr(0);
        let mut len = mem::size_of::<libc::sockaddr_nl>() as libc::socklen_t;
        // SAFETY: `bound` is large enough for the address getsockname writes.
        let res = unsafe {
            libc::getsockname(
                fd.as_raw_fd(),
                &mut bound as *mut libc::sockaddr_nl as *mut libc::sockaddr,
                &mut len,
            )
        };
        if res == -1 {
            return Err(unavailable("getsockname"));
        }

        tracing::debug!(port = bound.nl_pid, "netlink socket bound");
        Ok(Self {
            fd,
            port: bound.nl_pid,
            seq: 0,
        })
    }

    /// Make `recv` fail with `TimedOut` instead of blocking longer than `timeout`.
    pub fn set_recv_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        let tv = match timeout {
            Some(d) => libc::timeval {
                tv_sec: d.as_secs() as libc::time_t,
                tv_usec: d.subsec_micros() as libc::suseconds_t,
            },
            None => libc::timeval {
                tv_sec: 0,
                tv_usec: 0,
            },
        };
        // SAFETY: `tv` outlives the call and the length matches its type.
        let res = unsafe {
            libc::setsockopt(
                self.fd.as_raw_fd(),
                libc::SOL_SOCKET,
                libc::SO_RCVTIMEO,
                &tv as *const libc::timeval as *const libc::c_void,
                mem::size_of::<libc::timeval>() as libc::socklen_t,
            )
        };
        check(res)?;
        Ok(())
    }

    /// Ask the generic netlink controller for the id of family `name`.
    pub fn resolve_family(&mut self, name: &str) -> Result<u16> {
        self.seq = self.seq.wrapping_add(1);
        let seq = self.seq;
        let request = build_message(
            msg_type::GENL_ID_CTRL,
            flags::REQUEST,
            seq,
            self.port,
            GenlHeader::new(CTRL_CMD_GETFAMILY, 1),
            &[Attribute::string(CTRL_ATTR_FAMILY_NAME, name)],
        )?;
        self.send(KERNEL_PORT, &request)?;

        loop {
            let datagram = self.recv()?.ok_or(MatchError::ChannelClosed)?;
            for msg in split_datagram(datagram)? {
                if msg.seq() != seq {
                    continue;
                }
                if msg.is_error() {
                    let code = msg.error_code()?;
                    return Err(MatchError::ChannelUnavailable(format!(
                        "family {}: {}",
                        name,
                        io::Error::from_raw_os_error(-code)
                    )));
                }
                let attrs = msg.attrs()?;
                let id = attrs
                    .iter()
                    .find(|a| a.kind == CTRL_ATTR_FAMILY_ID)
                    .ok_or_else(|| {
                        MatchError::ChannelUnavailable(format!("family {}: no id in reply", name))
                    })?
                    .as_u16()?;
                tracing::debug!(family = name, id, "resolved generic netlink family");
                return Ok(id);
            }
        }
    }
}

impl AsRawFd for NetlinkSocket {
    fn as_raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }
}

impl Channel for NetlinkSocket {
    fn local_port(&self) -> u32 {
        self.port
    }

    fn send(&mut self, peer: u32, datagram: &[u8]) -> Result<()> {
        let addr = sockaddr(peer);
        // SAFETY: buffer and address outlive the call; lengths match.
        let len = unsafe {
            libc::sendto(
                self.fd.as_raw_fd(),
                datagram.as_ptr() as *const libc::c_void,
                datagram.len(),
                0,
                &addr as *const libc::sockaddr_nl as *const libc::sockaddr,
                mem::size_of::<libc::sockaddr_nl>() as libc::socklen_t,
            )
        };
        if len == -1 {
            return Err(MatchError::SendFailed(io::Error::last_os_error()));
        }
        if len as usize != datagram.len() {
            return Err(MatchError::SendFailed(io::Error::new(
                io::ErrorKind::WriteZero,
                format!("short send: {} of {} bytes", len, datagram.len()),
            )));
        }
        Ok(())
    }

    fn recv(&mut self) -> Result<Option<Bytes>> {
        // With MSG_TRUNC the kernel reports the full datagram length.
        let mut head = [0u8; 4];
        let size = self.recv_into(&mut head, libc::MSG_PEEK | libc::MSG_TRUNC)?;
        if size == 0 {
            self.recv_into(&mut head, 0)?;
            return Ok(None);
        }

        let mut buf = BytesMut::zeroed(size.max(RECV_BUFFER));
        let len = self.recv_into(&mut buf, libc::MSG_TRUNC)?;
        if len > buf.len() {
            return Err(MatchError::MalformedMessage(format!(
                "datagram of {} bytes truncated to {}",
                len,
                buf.len()
            )));
        }
        buf.truncate(len);
        Ok(Some(buf.freeze()))
    }
}

impl NetlinkSocket {
    /// One recv(2) call, retried on EINTR. Returns what the kernel reports,
    /// which exceeds `buf.len()` for a truncated read under `MSG_TRUNC`.
    fn recv_into(&self, buf: &mut [u8], flags: libc::c_int) -> Result<usize> {
        loop {
            // SAFETY: `buf` is valid for writes of its full length.
            let len = unsafe {
                libc::recv(
                    self.fd.as_raw_fd(),
                    buf.as_mut_ptr() as *mut libc::c_void,
                    buf.len(),
                    flags,
                )
            };
            if len >= 0 {
                return Ok(len as usize);
            }
            let err = io::Error::last_os_error();
            match err.kind() {
                io::ErrorKind::Interrupted => continue,
                io::ErrorKind::WouldBlock => {
                    return Err(io::Error::new(io::ErrorKind::TimedOut, err).into())
                }
                _ => return Err(err.into()),
            }
        }
    }
}
