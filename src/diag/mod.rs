//! Diagnostics - severity levels, backends and the tracing bridge.
//!
//! The library logs through `tracing`. Processes that want the classic
//! syslog-style sink install it with [`init`]:
//!
//! ```text
//! tracing::debug!(..) ──► DiagLayer ──mask──► LogBackend::write
//!                                               ├─ StreamBackend (stdout, file, ..)
//!                                               ├─ SyslogBackend
//!                                               └─ NopBackend
//! ```
//!
//! The mask is a bitset of syslog severities and can be changed at any time
//! through the returned [`DiagHandle`].
//!
//! # Example
//!
//! ```ignore
//! use matchlib_nl::diag::{self, log_upto, Level, StreamBackend};
//!
//! let handle = diag::init("matchctl", StreamBackend::stdout(), log_upto(Level::Info), false)?;
//! handle.set_mask(log_upto(Level::Debug));
//! ```

mod backend;
mod layer;

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing_subscriber::layer::SubscriberExt;

use crate::error::{MatchError, Result};

pub use backend::{LogBackend, NopBackend, StreamBackend, SyslogBackend};
pub use layer::DiagLayer;

/// Syslog severity, most severe first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    /// System is unusable.
    Emerg = 0,
    /// Action must be taken immediately.
    Alert = 1,
    /// Critical condition.
    Crit = 2,
    /// Error condition.
    Err = 3,
    /// Warning condition.
    Warning = 4,
    /// Normal but significant condition.
    Notice = 5,
    /// Informational message.
    Info = 6,
    /// Debug-level message.
    Debug = 7,
}

impl Level {
    /// All levels, most severe first.
    pub const ALL: [Level; 8] = [
        Level::Emerg,
        Level::Alert,
        Level::Crit,
        Level::Err,
        Level::Warning,
        Level::Notice,
        Level::Info,
        Level::Debug,
    ];

    /// Lowercase name, as used in configuration.
    pub fn as_str(self) -> &'static str {
        match self {
            Level::Emerg => "emerg",
            Level::Alert => "alert",
            Level::Crit => "crit",
            Level::Err => "err",
            Level::Warning => "warning",
            Level::Notice => "notice",
            Level::Info => "info",
            Level::Debug => "debug",
        }
    }

    /// Bit of this level in a mask.
    #[inline]
    pub const fn mask(self) -> u32 {
        1 << self as u32
    }
}

impl From<&tracing::Level> for Level {
    fn from(level: &tracing::Level) -> Self {
        match *level {
            tracing::Level::ERROR => Level::Err,
            tracing::Level::WARN => Level::Warning,
            tracing::Level::INFO => Level::Info,
            // Syslog has nothing below debug.
            _ => Level::Debug,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = MatchError;

    fn from_str(s: &str) -> Result<Self> {
        Level::ALL
            .iter()
            .copied()
            .find(|l| l.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| MatchError::Config(format!("unknown log level {:?}", s)))
    }
}

/// Mask enabling `level` and everything more severe.
#[inline]
pub const fn log_upto(level: Level) -> u32 {
    (1 << (level as u32 + 1)) - 1
}

/// Mask used until configured otherwise.
pub const DEFAULT_MASK: u32 = log_upto(Level::Info);

/// Source location of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    /// Source file.
    pub file: Option<&'static str>,
    /// Line in `file`.
    pub line: Option<u32>,
    /// Module path.
    pub module: Option<&'static str>,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.file, self.line) {
            (Some(file), Some(line)) => write!(f, "{}:{}", file, line)?,
            (Some(file), None) => f.write_str(file)?,
            _ => f.write_str("?")?,
        }
        if let Some(module) = self.module {
            write!(f, " {}", module)?;
        }
        Ok(())
    }
}

/// Runtime control over an installed sink.
#[derive(Debug, Clone)]
pub struct DiagHandle {
    mask: Arc<AtomicU32>,
    backend: Arc<dyn LogBackend>,
}

impl DiagHandle {
    /// Replace the severity mask.
    pub fn set_mask(&self, mask: u32) {
        self.mask.store(mask, Ordering::Relaxed);
    }

    /// Current severity mask.
    pub fn mask(&self) -> u32 {
        self.mask.load(Ordering::Relaxed)
    }

    /// Close the backend. Later records are still offered to it.
    pub fn close(&self) {
        self.backend.close();
    }
}

/// Open `backend` under `ident` and build the layer forwarding to it.
///
/// With `location` set, each record carries the file, line and module of
/// the event that produced it.
pub fn layer<B: LogBackend + 'static>(
    ident: &str,
    backend: B,
    mask: u32,
    location: bool,
) -> (DiagLayer, DiagHandle) {
    let backend: Arc<dyn LogBackend> = Arc::new(backend);
    backend.open(ident);

    let layer = DiagLayer::new(Arc::clone(&backend), mask).with_location(location);
    let handle = DiagHandle {
        mask: layer.mask_handle(),
        backend,
    };
    (layer, handle)
}

/// Install `layer` as the global tracing sink.
///
/// # Errors
///
/// Returns `Config` if a global subscriber is already installed.
pub fn install(layer: DiagLayer) -> Result<()> {
    let subscriber = tracing_subscriber::registry().with(layer);
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| MatchError::Config(format!("diagnostic sink: {}", e)))
}

/// Open `backend` under `ident` and install it as the global tracing sink.
///
/// # Errors
///
/// Returns `Config` if a global subscriber is already installed.
pub fn init<B: LogBackend + 'static>(
    ident: &str,
    backend: B,
    mask: u32,
    location: bool,
) -> Result<DiagHandle> {
    let (layer, handle) = layer(ident, backend, mask, location);
    install(layer)?;
    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_upto() {
        assert_eq!(log_upto(Level::Emerg), 0b1);
        assert_eq!(log_upto(Level::Err), 0b1111);
        assert_eq!(log_upto(Level::Debug), 0xFF);
        assert_eq!(DEFAULT_MASK, 0x7F);
        assert_eq!(Level::Warning.mask(), 0x10);
    }

    #[test]
    fn test_level_parse() {
        assert_eq!("warning".parse::<Level>().unwrap(), Level::Warning);
        assert_eq!("DEBUG".parse::<Level>().unwrap(), Level::Debug);
        assert!("verbose".parse::<Level>().is_err());
    }

    #[test]
    fn test_tracing_levels() {
        assert_eq!(Level::from(&tracing::Level::ERROR), Level::Err);
        assert_eq!(Level::from(&tracing::Level::WARN), Level::Warning);
        assert_eq!(Level::from(&tracing::Level::TRACE), Level::Debug);
    }

    #[test]
    fn test_location_display() {
        let loc = Location {
            file: Some("src/session.rs"),
            line: Some(12),
            module: Some("matchlib_nl::session"),
        };
        assert_eq!(loc.to_string(), "src/session.rs:12 matchlib_nl::session");
    }
}
