//! Client configuration.
//!
//! Loaded from JSON, then optionally overridden from the environment.
//! Every field has a default, so `{}` is a valid configuration.
//!
//! # Example
//!
//! ```
//! use matchlib_nl::control::ClientConfig;
//!
//! let config = ClientConfig::from_json_str(r#"{ "ifindex": 4, "pid": 1234 }"#).unwrap();
//! assert_eq!(config.ifindex, 4);
//! assert_eq!(config.family, 555);
//! ```

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::diag::{
    self, log_upto, DiagHandle, DiagLayer, Level, NopBackend, StreamBackend, SyslogBackend,
};
use crate::error::{MatchError, Result};
use crate::protocol::DEFAULT_FAMILY;

/// Default location of the backend's pid file.
pub const DEFAULT_PID_FILE: &str = "/var/run/matchd.pid";

/// Environment variable overriding [`ClientConfig::pid`].
pub const ENV_PID: &str = "MATCH_PID";
/// Environment variable overriding [`ClientConfig::ifindex`].
pub const ENV_IFINDEX: &str = "MATCH_IFINDEX";
/// Environment variable overriding [`ClientConfig::family`].
pub const ENV_FAMILY: &str = "MATCH_FAMILY";
/// Environment variable overriding [`LogConfig::level`].
pub const ENV_LOG_LEVEL: &str = "MATCH_LOG_LEVEL";

/// Where diagnostic records go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Standard output.
    Stdout,
    /// Standard error.
    Stderr,
    /// The system logger.
    Syslog,
    /// Append to [`LogConfig::path`].
    File,
    /// Discard.
    None,
}

/// Diagnostic sink settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogConfig {
    /// Least severe level that is logged.
    pub level: Level,
    /// Destination.
    pub backend: BackendKind,
    /// Log file, for the `file` backend.
    pub path: Option<PathBuf>,
    /// Pass source locations to the backend.
    pub location: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::Info,
            backend: BackendKind::Stdout,
            path: None,
            location: false,
        }
    }
}

impl LogConfig {
    /// Build the configured backend and the layer forwarding to it.
    pub fn layer(&self, ident: &str) -> Result<(DiagLayer, DiagHandle)> {
        let mask = log_upto(self.level);
        let location = self.location;
        Ok(match self.backend {
            BackendKind::Stdout => diag::layer(ident, StreamBackend::stdout(), mask, location),
            BackendKind::Stderr => diag::layer(ident, StreamBackend::stderr(), mask, location),
            BackendKind::Syslog => diag::layer(ident, SyslogBackend::new(), mask, location),
            BackendKind::File => {
                let path = self.path.as_ref().ok_or_else(|| {
                    MatchError::Config("log backend \"file\" needs a path".to_string())
                })?;
                let file: File = OpenOptions::new().create(true).append(true).open(path)?;
                diag::layer(ident, StreamBackend::new(file), mask, location)
            }
            BackendKind::None => diag::layer(ident, NopBackend, mask, location),
        })
    }

    /// Build the configured backend and install it as the global sink.
    pub fn install(&self, ident: &str) -> Result<DiagHandle> {
        let (layer, handle) = self.layer(ident)?;
        diag::install(layer)?;
        Ok(handle)
    }
}

/// Everything needed to reach a backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    /// Netlink message type of the backend family.
    pub family: u16,
    /// Generic netlink family name; when set, `family` is resolved at connect.
    pub family_name: Option<String>,
    /// Interface index of the switch device.
    pub ifindex: u32,
    /// Backend port id; when unset, read from `pid_file`.
    pub pid: Option<u32>,
    /// Pid file of the backend daemon.
    pub pid_file: PathBuf,
    /// Receive timeout in milliseconds; unset blocks forever.
    pub recv_timeout_ms: Option<u64>,
    /// Diagnostic sink.
    pub log: LogConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            family: DEFAULT_FAMILY,
            family_name: None,
            ifindex: 0,
            pid: None,
            pid_file: PathBuf::from(DEFAULT_PID_FILE),
            recv_timeout_ms: None,
            log: LogConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Parse and validate a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Override fields from `MATCH_*` environment variables.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Override fields from variables looked up with `lookup`.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup(ENV_PID) {
            self.pid = Some(parse_env(ENV_PID, &v)?);
        }
        if let Some(v) = lookup(ENV_IFINDEX) {
            self.ifindex = parse_env(ENV_IFINDEX, &v)?;
        }
        if let Some(v) = lookup(ENV_FAMILY) {
            self.family = parse_env(ENV_FAMILY, &v)?;
        }
        if let Some(v) = lookup(ENV_LOG_LEVEL) {
            self.log.level = v.trim().parse()?;
        }
        self.validate()
    }

    /// Reject values no backend can serve.
    pub fn validate(&self) -> Result<()> {
        if self.pid == Some(0) {
            return Err(MatchError::Config("pid must not be 0".to_string()));
        }
        if matches!(self.family_name.as_deref(), Some(name) if name.is_empty()) {
            return Err(MatchError::Config("family_name must not be empty".to_string()));
        }
        if self.log.backend == BackendKind::File && self.log.path.is_none() {
            return Err(MatchError::Config("log backend \"file\" needs a path".to_string()));
        }
        Ok(())
    }

    /// Receive timeout as a duration.
    pub fn recv_timeout(&self) -> Option<Duration> {
        self.recv_timeout_ms.map(Duration::from_millis)
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| MatchError::Config(format!("{}={:?}: {}", key, value, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::from_json_str("{}").unwrap();
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.family, 555);
        assert_eq!(config.pid_file, PathBuf::from("/var/run/matchd.pid"));
        assert_eq!(config.log.level, Level::Info);
        assert_eq!(config.recv_timeout(), None);
    }

    #[test]
    fn test_full_document() {
        let config = ClientConfig::from_json_str(
            r#"{
                "family": 600,
                "family_name": "net_mat_nl",
                "ifindex": 7,
                "pid": 321,
                "pid_file": "/tmp/matchd.pid",
                "recv_timeout_ms": 250,
                "log": { "level": "debug", "backend": "syslog", "location": true }
            }"#,
        )
        .unwrap();
        assert_eq!(config.family_name.as_deref(), Some("net_mat_nl"));
        assert_eq!(config.pid, Some(321));
        assert_eq!(config.recv_timeout(), Some(Duration::from_millis(250)));
        assert_eq!(config.log.backend, BackendKind::Syslog);
        assert!(config.log.location);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = ClientConfig::from_json_str(r#"{ "ifidx": 3 }"#).unwrap_err();
        assert!(matches!(err, MatchError::Json(_)));
    }

    #[test]
    fn test_validation() {
        assert!(matches!(
            ClientConfig::from_json_str(r#"{ "pid": 0 }"#),
            Err(MatchError::Config(_))
        ));
        assert!(matches!(
            ClientConfig::from_json_str(r#"{ "family_name": "" }"#),
            Err(MatchError::Config(_))
        ));
        assert!(matches!(
            ClientConfig::from_json_str(r#"{ "log": { "backend": "file" } }"#),
            Err(MatchError::Config(_))
        ));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_PID, "99"),
            (ENV_IFINDEX, " 5 "),
            (ENV_LOG_LEVEL, "warning"),
        ]
        .into_iter()
        .collect();
        let mut config = ClientConfig::default();
        config
            .apply_env_from(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.pid, Some(99));
        assert_eq!(config.ifindex, 5);
        assert_eq!(config.family, DEFAULT_FAMILY);
        assert_eq!(config.log.level, Level::Warning);
    }

    #[test]
    fn test_file_backend_with_location() {
        use tracing_subscriber::layer::SubscriberExt;

        let path = std::env::temp_dir().join(format!("matchlib-nl-log-{}.txt", std::process::id()));
        let _ = std::fs::remove_file(&path);
        let json = format!(
            r#"{{ "level": "info", "backend": "file", "path": {:?}, "location": true }}"#,
            path.display().to_string()
        );
        let log: LogConfig = serde_json::from_str(&json).unwrap();

        let (layer, handle) = log.layer("matchctl").unwrap();
        let subscriber = tracing_subscriber::registry().with(layer);
        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("hello");
        });
        handle.close();

        let written = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert!(written.starts_with("matchctl: [info] hello"), "{:?}", written);
        assert!(written.contains("config.rs:"), "{:?}", written);
    }

    #[test]
    fn test_env_bad_value() {
        let mut config = ClientConfig::default();
        let err = config
            .apply_env_from(|k| (k == ENV_FAMILY).then(|| "lots".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("MATCH_FAMILY"));
    }
}
