//! # matchlib-nl
//!
//! Netlink client for discovering and programming match-action pipelines.
//!
//! A switch device describes its packet pipeline as a set of entities:
//! header layouts, a parser graph, actions, tables, a table graph, rules
//! and ports. This crate fetches those descriptions from the backend
//! daemon over generic netlink, decodes them into typed values, answers
//! graph queries over them and sends rule, table and port mutations back.
//!
//! ## Architecture
//!
//! ```text
//! client      verbs: get_tables, set_rules, pci_lport, ...
//!   │
//! session     Build ─► Dispatch ─► Collect ─► Finalize
//!   │
//! codec       entity <-> attribute tree
//!   │
//! protocol    attribute TLVs, netlink/genl headers, messages
//!   │
//! transport   Channel trait, NetlinkSocket
//! ```
//!
//! `query` works on decoded entities only and never touches the wire.
//! `diag` and `control` provide the diagnostic sink and the configuration.
//!
//! ## Example
//!
//! ```ignore
//! use matchlib_nl::{query, Client};
//!
//! let mut client = Client::builder().ifindex(4).session(4242).connect()?;
//! let headers = client.get_headers()?;
//! let graph = client.get_header_graph()?;
//! for uid in query::reachable_headers(&graph, 1) {
//!     println!("instance {}", uid);
//! }
//! # Ok::<(), matchlib_nl::MatchError>(())
//! ```

pub mod codec;
pub mod control;
pub mod diag;
pub mod error;
pub mod protocol;
pub mod query;
pub mod session;
pub mod transport;
pub mod types;

mod client;

pub use client::{Client, ClientBuilder, RuleCommand, TableCommand};
pub use error::{MatchError, Result};
pub use session::{SessionId, Target};
pub use transport::Channel;
