//! Client builder and command surface.
//!
//! The [`ClientBuilder`] collects addressing and session settings and
//! produces a [`Client`] over some [`Channel`]. Every [`Client`] verb runs
//! one request/response cycle:
//! 1. Build the request for the device
//! 2. Send it to the backend session
//! 3. Collect and decode the response fragments
//! 4. Finish on end of response, acknowledgement or rejection
//!
//! # Example
//!
//! ```ignore
//! use matchlib_nl::{query, Client};
//!
//! let mut client = Client::builder()
//!     .ifindex(4)
//!     .pid_file("/var/run/matchd.pid")
//!     .connect()?;
//!
//! let tables = client.get_tables()?;
//! let graph = client.get_table_graph()?;
//! let actions = client.get_actions()?;
//! let fwd = query::find_action_by_name("forward", &actions);
//! let table = query::find_table_with_action(&tables, &graph, fwd, 2);
//! ```

use std::path::PathBuf;
use std::time::Duration;

use crate::codec::{
    decode_collection, decode_identities, encode_collection, encode_pci, Collection,
};
use crate::control::ClientConfig;
use crate::error::{MatchError, Result};
use crate::protocol::tags::{port, ports_query, rules_query, top};
use crate::protocol::{Attribute, Command};
use crate::session::{self, Request, SessionId, Target};
use crate::transport::Channel;
use crate::types::{
    Action, Header, HeaderGraphNode, PciAddress, Port, PortIdentity, Rule, Table, TableGraphNode,
};

#[cfg(target_os = "linux")]
use crate::transport::NetlinkSocket;

/// Largest 48-bit MAC address.
const MAC_MAX: u64 = (1 << 48) - 1;

/// Which rule mutation to send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleCommand {
    /// Install rules.
    Set,
    /// Remove rules.
    Delete,
}

impl RuleCommand {
    fn command(self) -> Command {
        match self {
            RuleCommand::Set => Command::SetRules,
            RuleCommand::Delete => Command::DelRules,
        }
    }
}

/// Which table mutation to send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableCommand {
    /// Create a software table.
    Create,
    /// Change a table's attributes.
    Update,
    /// Remove a software table.
    Destroy,
}

impl TableCommand {
    fn command(self) -> Command {
        match self {
            TableCommand::Create => Command::CreateTable,
            TableCommand::Update => Command::UpdateTable,
            TableCommand::Destroy => Command::DestroyTable,
        }
    }
}

/// Builder for configuring and creating a client.
///
/// Either call `connect()` to open a netlink socket, or `with_channel()` to
/// run over any other [`Channel`].
#[derive(Debug, Clone)]
pub struct ClientBuilder {
    target: Target,
    family_name: Option<String>,
    session: Option<u32>,
    pid_file: PathBuf,
    recv_timeout: Option<Duration>,
}

impl ClientBuilder {
    /// Create a builder with default addressing.
    pub fn new() -> Self {
        Self::from_config(&ClientConfig::default())
    }

    /// Create a builder from a loaded configuration.
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            target: Target {
                ifindex: config.ifindex,
                family: config.family,
            },
            family_name: config.family_name.clone(),
            session: config.pid,
            pid_file: config.pid_file.clone(),
            recv_timeout: config.recv_timeout(),
        }
    }

    /// Replace all settings with those of `config`.
    pub fn config(self, config: &ClientConfig) -> Self {
        Self::from_config(config)
    }

    /// Set the interface index of the device.
    pub fn ifindex(mut self, ifindex: u32) -> Self {
        self.target.ifindex = ifindex;
        self
    }

    /// Set the netlink message type of the backend family.
    pub fn family(mut self, family: u16) -> Self {
        self.target.family = family;
        self
    }

    /// Resolve the family by name when connecting.
    pub fn family_name(mut self, name: impl Into<String>) -> Self {
        self.family_name = Some(name.into());
        self
    }

    /// Use this backend port id instead of reading the pid file.
    pub fn session(mut self, pid: u32) -> Self {
        self.session = Some(pid);
        self
    }

    /// Read the backend port id from this file.
    pub fn pid_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.pid_file = path.into();
        self
    }

    /// Fail receives that block longer than `timeout`.
    pub fn recv_timeout(mut self, timeout: Duration) -> Self {
        self.recv_timeout = Some(timeout);
        self
    }

    fn resolve_session(&self) -> Result<SessionId> {
        match self.session {
            Some(pid) => SessionId::new(pid),
            None => SessionId::lookup(&self.pid_file),
        }
    }

    /// Open a netlink socket and build the client.
    #[cfg(target_os = "linux")]
    pub fn connect(self) -> Result<Client<NetlinkSocket>> {
        let session = self.resolve_session()?;
        let mut socket = NetlinkSocket::open()?;
        if self.recv_timeout.is_some() {
            socket.set_recv_timeout(self.recv_timeout)?;
        }
        let mut target = self.target;
        if let Some(name) = &self.family_name {
            target.family = socket.resolve_family(name)?;
        }
        tracing::debug!(
            session = session.get(),
            ifindex = target.ifindex,
            family = target.family,
            "client connected"
        );
        Ok(Client::new(socket, session, target))
    }

    /// Build the client over an existing channel.
    ///
    /// The family is taken as configured; `family_name` is not resolved.
    pub fn with_channel<C: Channel>(self, channel: C) -> Result<Client<C>> {
        let session = self.resolve_session()?;
        Ok(Client::new(channel, session, self.target))
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle for issuing commands to one device through one backend session.
///
/// Verbs take `&mut self`: a handle has at most one command in flight.
#[derive(Debug)]
pub struct Client<C> {
    channel: C,
    session: SessionId,
    target: Target,
    seq: u32,
}

impl Client<()> {
    /// Create a new client builder.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }
}

impl<C: Channel> Client<C> {
    /// Create a client from its parts.
    pub fn new(channel: C, session: SessionId, target: Target) -> Self {
        Self {
            channel,
            session,
            target,
            seq: 0,
        }
    }

    /// Backend session.
    #[inline]
    pub fn session(&self) -> SessionId {
        self.session
    }

    /// Device addressing.
    #[inline]
    pub fn target(&self) -> Target {
        self.target
    }

    /// Borrow the channel.
    pub fn channel(&self) -> &C {
        &self.channel
    }

    /// Borrow the channel mutably.
    pub fn channel_mut(&mut self) -> &mut C {
        &mut self.channel
    }

    /// Give back the channel.
    pub fn into_channel(self) -> C {
        self.channel
    }

    fn next_seq(&mut self) -> u32 {
        self.seq = self.seq.wrapping_add(1);
        self.seq
    }

    fn request(&self, command: Command) -> Request {
        Request::new(command, self.target)
    }

    fn fetch<T: Collection>(&mut self, request: Request) -> Result<Vec<T>> {
        let seq = self.next_seq();
        let fragments = session::dispatch(&mut self.channel, self.session, &request, seq)?;
        let items = session::collect(fragments, decode_collection::<T>)?;
        tracing::debug!(command = %request.command(), count = items.len(), "fetched");
        Ok(items)
    }

    fn mutate(&mut self, request: Request) -> Result<()> {
        let seq = self.next_seq();
        let fragments = session::dispatch(&mut self.channel, self.session, &request, seq)?;
        session::await_ack(fragments)
    }

    fn resolve_port(
        &mut self,
        request: Request,
        id_tag: u16,
        attribute: &'static str,
    ) -> Result<PortIdentity> {
        let seq = self.next_seq();
        let fragments = session::dispatch(&mut self.channel, self.session, &request, seq)?;
        let found =
            session::collect(fragments, |attrs| decode_identities(attrs, id_tag, attribute))?;
        found.into_iter().next().ok_or(MatchError::IncompleteEntity {
            entity: "port",
            attribute,
        })
    }

    /// Fetch all header layouts.
    pub fn get_headers(&mut self) -> Result<Vec<Header>> {
        self.fetch(self.request(Command::GetHeaders))
    }

    /// Fetch all actions.
    pub fn get_actions(&mut self) -> Result<Vec<Action>> {
        self.fetch(self.request(Command::GetActions))
    }

    /// Fetch all tables.
    pub fn get_tables(&mut self) -> Result<Vec<Table>> {
        self.fetch(self.request(Command::GetTables))
    }

    /// Fetch the parser graph.
    pub fn get_header_graph(&mut self) -> Result<Vec<HeaderGraphNode>> {
        self.fetch(self.request(Command::GetHeaderGraph))
    }

    /// Fetch the table graph.
    pub fn get_table_graph(&mut self) -> Result<Vec<TableGraphNode>> {
        self.fetch(self.request(Command::GetTableGraph))
    }

    /// Fetch ports with ids in `min..=max`. A `max` of 0 means no upper bound.
    pub fn get_ports(&mut self, min: u32, max: u32) -> Result<Vec<Port>> {
        let request = self.request(Command::GetPorts).attr(Attribute::nested(
            top::PORTS_QUERY,
            vec![
                Attribute::u32(ports_query::MIN, min),
                Attribute::u32(ports_query::MAX, max),
            ],
        ));
        self.fetch(request)
    }

    /// Fetch rules of `table` with uids in `min..=max`. A `max` of 0 means no upper bound.
    pub fn get_rules(&mut self, table: u32, min: u32, max: u32) -> Result<Vec<Rule>> {
        let request = self.request(Command::GetRules).attr(Attribute::nested(
            top::RULES_QUERY,
            vec![
                Attribute::u32(rules_query::TABLE, table),
                Attribute::u32(rules_query::MIN, min),
                Attribute::u32(rules_query::MAX, max),
            ],
        ));
        self.fetch(request)
    }

    /// Install or remove `rules`.
    pub fn set_del_rules(&mut self, cmd: RuleCommand, rules: &[Rule]) -> Result<()> {
        let request = self.request(cmd.command()).attr(encode_collection(rules));
        self.mutate(request)
    }

    /// Install rules.
    pub fn set_rules(&mut self, rules: &[Rule]) -> Result<()> {
        self.set_del_rules(RuleCommand::Set, rules)
    }

    /// Remove rules.
    pub fn del_rules(&mut self, rules: &[Rule]) -> Result<()> {
        self.set_del_rules(RuleCommand::Delete, rules)
    }

    /// Create, update or destroy `table`.
    pub fn create_update_destroy_table(&mut self, cmd: TableCommand, table: &Table) -> Result<()> {
        let request = self
            .request(cmd.command())
            .attr(encode_collection(std::slice::from_ref(table)));
        self.mutate(request)
    }

    /// Create a table.
    pub fn create_table(&mut self, table: &Table) -> Result<()> {
        self.create_update_destroy_table(TableCommand::Create, table)
    }

    /// Update a table.
    pub fn update_table(&mut self, table: &Table) -> Result<()> {
        self.create_update_destroy_table(TableCommand::Update, table)
    }

    /// Destroy a table.
    pub fn destroy_table(&mut self, table: &Table) -> Result<()> {
        self.create_update_destroy_table(TableCommand::Destroy, table)
    }

    /// Configure a port.
    pub fn set_port(&mut self, port: &Port) -> Result<()> {
        let request = self
            .request(Command::SetPorts)
            .attr(encode_collection(std::slice::from_ref(port)));
        self.mutate(request)
    }

    /// Logical port backed by PCI function `bus:device.function`.
    pub fn pci_lport(&mut self, bus: u8, device: u8, function: u8) -> Result<PortIdentity> {
        let addr = PciAddress {
            bus,
            device,
            function,
        };
        let request = self.request(Command::GetLport).attr(Attribute::nested(
            top::PORTS,
            vec![Attribute::nested(port::PORT, vec![encode_pci(port::PCI, &addr)])],
        ));
        self.resolve_port(request, port::ID, "id")
    }

    /// Logical port owning MAC address `mac`.
    ///
    /// `mac` holds the 48-bit address in its low bits.
    pub fn mac_lport(&mut self, mac: u64) -> Result<PortIdentity> {
        if mac > MAC_MAX {
            return Err(MatchError::InvalidEntity {
                entity: "port",
                reason: format!("mac {:#x} exceeds 48 bits", mac),
            });
        }
        let request = self.request(Command::GetLport).attr(Attribute::nested(
            top::PORTS,
            vec![Attribute::nested(port::PORT, vec![Attribute::u64(port::MAC, mac)])],
        ));
        self.resolve_port(request, port::ID, "id")
    }

    /// Physical port behind logical port `lport`.
    pub fn lport_to_phys_port(&mut self, lport: u32) -> Result<PortIdentity> {
        let request = self.request(Command::GetPhysPort).attr(Attribute::nested(
            top::PORTS,
            vec![Attribute::nested(port::PORT, vec![Attribute::u32(port::ID, lport)])],
        ));
        self.resolve_port(request, port::PHYS_ID, "phys id")
    }
}
