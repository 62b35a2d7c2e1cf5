//! Control module - client configuration.
//!
//! Configuration is JSON. It names the device, the backend family and
//! session, and the diagnostic sink:
//!
//! ```text
//! { "family": 555, "family_name": null, "ifindex": 0,
//!   "pid": null, "pid_file": "/var/run/matchd.pid",
//!   "recv_timeout_ms": null,
//!   "log": { "level": "info", "backend": "stdout", "location": false } }
//! ```
//!
//! # Example
//!
//! ```ignore
//! use matchlib_nl::control::ClientConfig;
//! use matchlib_nl::Client;
//!
//! let mut config = ClientConfig::from_path("/etc/matchd/client.json")?;
//! config.apply_env()?;
//! let _diag = config.log.install("matchctl")?;
//! let mut client = Client::builder().config(&config).connect()?;
//! ```

mod config;

pub use config::{
    BackendKind, ClientConfig, LogConfig, DEFAULT_PID_FILE, ENV_FAMILY, ENV_IFINDEX,
    ENV_LOG_LEVEL, ENV_PID,
};
