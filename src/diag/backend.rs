//! Log backends.

use std::ffi::CString;
use std::fmt;
use std::io::{self, Write};
use std::sync::Mutex;

use super::{Level, Location};

/// Destination of diagnostic records.
pub trait LogBackend: Send + Sync + fmt::Debug {
    /// Start logging under `ident`.
    fn open(&self, _ident: &str) {}

    /// Stop logging and release resources.
    fn close(&self) {}

    /// Write one record. `location` is set when locations are enabled.
    fn write(&self, level: Level, location: Option<&Location>, message: &str);
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NopBackend;

impl LogBackend for NopBackend {
    fn write(&self, _level: Level, _location: Option<&Location>, _message: &str) {}
}

/// Writes one line per record to any `io::Write`, flushing each.
pub struct StreamBackend<W> {
    out: Mutex<W>,
    ident: Mutex<String>,
}

impl<W: Write + Send> StreamBackend<W> {
    /// Log to `out`.
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
            ident: Mutex::new(String::new()),
        }
    }

    /// Give back the underlying writer.
    pub fn into_inner(self) -> W {
        match self.out.into_inner() {
            Ok(out) => out,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl StreamBackend<io::Stdout> {
    /// Log to standard output.
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl StreamBackend<io::Stderr> {
    /// Log to standard error.
    pub fn stderr() -> Self {
        Self::new(io::stderr())
    }
}

impl<W> fmt::Debug for StreamBackend<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamBackend").finish_non_exhaustive()
    }
}

impl<W: Write + Send> LogBackend for StreamBackend<W> {
    fn open(&self, ident: &str) {
        if let Ok(mut current) = self.ident.lock() {
            *current = ident.to_string();
        }
    }

    fn close(&self) {
        if let Ok(mut out) = self.out.lock() {
            let _ = out.flush();
        }
    }

    fn write(&self, level: Level, location: Option<&Location>, message: &str) {
        let ident = self.ident.lock().map(|i| i.clone()).unwrap_or_default();
        let Ok(mut out) = self.out.lock() else { return };
        let res = match location {
            Some(loc) => writeln!(out, "{}: [{}] {} ({})", ident, level, message, loc),
            None => writeln!(out, "{}: [{}] {}", ident, level, message),
        };
        // A sink that cannot write has nowhere to report it.
        if res.is_ok() {
            let _ = out.flush();
        }
    }
}

/// Forwards records to the system logger.
#[derive(Debug, Default)]
pub struct SyslogBackend {
    // openlog keeps the pointer; the string must outlive the connection.
    ident: Mutex<Option<CString>>,
}

impl SyslogBackend {
    /// Backend that is not yet connected.
    pub fn new() -> Self {
        Self::default()
    }
}

impl LogBackend for SyslogBackend {
    fn open(&self, ident: &str) {
        let Ok(mut slot) = self.ident.lock() else { return };
        let Ok(ident) = CString::new(ident) else { return };
        // SAFETY: `ident` is stored in `slot` and lives until `close` clears it.
        unsafe { libc::openlog(ident.as_ptr(), libc::LOG_PID, libc::LOG_USER) };
        *slot = Some(ident);
    }

    fn close(&self) {
        let Ok(mut slot) = self.ident.lock() else { return };
        if slot.take().is_some() {
            // SAFETY: closelog has no preconditions.
            unsafe { libc::closelog() };
        }
    }

    fn write(&self, level: Level, location: Option<&Location>, message: &str) {
        let text = match location {
            Some(loc) => format!("{} ({})", message, loc),
            None => message.to_string(),
        };
        // Interior NUL bytes cannot cross the C boundary.
        let Ok(text) = CString::new(text.replace('\0', " ")) else { return };
        // SAFETY: the format string takes exactly one C string argument.
        unsafe {
            libc::syslog(
                level as libc::c_int,
                b"%s\0".as_ptr() as *const libc::c_char,
                text.as_ptr(),
            )
        };
    }
}
