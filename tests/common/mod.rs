//! In-memory device serving a small pipeline.
//!
//! `FakeDevice` implements `Channel`: every request sent to it is answered
//! immediately by queueing reply datagrams, which `recv` then hands out.
//! Knobs on the device inject fragmentation, rejections, stale replies,
//! failed dumps, corrupt fragments and early closure.

#![allow(dead_code)]

use std::collections::VecDeque;

use bytes::Bytes;

use matchlib_nl::codec::{decode_collection, encode_collection, Collection};
use matchlib_nl::protocol::tags::{pci, port, ports_query, rules_query, top};
use matchlib_nl::protocol::{
    build_done, build_error, build_message, find_attr, flags, split_datagram, AttrValue, Attribute,
    Command, GenlHeader, Message, NlHeader, MATCH_GENL_VERSION,
};
use matchlib_nl::types::*;
use matchlib_nl::{Channel, Result};

/// Port id of the fake backend.
pub const DEVICE_PORT: u32 = 4242;

/// Port id of the client end.
pub const CLIENT_PORT: u32 = 77;

/// Everything the device reports.
#[derive(Debug, Clone)]
pub struct Pipeline {
    pub headers: Vec<Header>,
    pub header_graph: Vec<HeaderGraphNode>,
    pub actions: Vec<Action>,
    pub tables: Vec<Table>,
    pub table_graph: Vec<TableGraphNode>,
    pub rules: Vec<Rule>,
    pub ports: Vec<Port>,
}

fn field(uid: u32, name: &str, bitwidth: u32, offset: u32) -> Field {
    Field {
        uid,
        name: name.to_string(),
        bitwidth,
        offset,
    }
}

fn arg(name: &str, value_type: ValueType) -> ActionArg {
    ActionArg {
        name: name.to_string(),
        value_type,
        value: 0,
    }
}

pub const ETHERTYPE_IPV4: u64 = 0x0800;
pub const ETHERTYPE_VLAN: u64 = 0x8100;

pub const ACTION_DROP: u32 = 1;
pub const ACTION_FORWARD: u32 = 2;
pub const ACTION_SET_VLAN: u32 = 3;

pub const TABLE_INGRESS: u32 = 1;
pub const TABLE_ACL: u32 = 2;
pub const TABLE_EGRESS: u32 = 3;

/// Ethernet, VLAN and IPv4 parsing feeding ingress, ACL and egress tables.
///
/// The table graph loops from egress back to ingress.
pub fn sample_pipeline() -> Pipeline {
    let ethertype =
        |instance: u32, value: u64| FieldRef::exact(instance, 1, 3, ValueType::U16, value);

    Pipeline {
        headers: vec![
            Header {
                uid: 1,
                name: "ethernet".to_string(),
                fields: vec![
                    field(1, "dst_mac", 48, 0),
                    field(2, "src_mac", 48, 48),
                    field(3, "ethertype", 16, 96),
                ],
            },
            Header {
                uid: 2,
                name: "vlan".to_string(),
                fields: vec![
                    field(1, "pcp", 3, 0),
                    field(2, "cfi", 1, 3),
                    field(3, "vid", 12, 4),
                    field(4, "ethertype", 16, 16),
                ],
            },
            Header {
                uid: 3,
                name: "ipv4".to_string(),
                fields: vec![
                    field(1, "version", 4, 0),
                    field(2, "ihl", 4, 4),
                    field(3, "dscp", 6, 8),
                    field(4, "ttl", 8, 64),
                    field(5, "protocol", 8, 72),
                    field(6, "src_ip", 32, 96),
                    field(7, "dst_ip", 32, 128),
                ],
            },
        ],
        header_graph: vec![
            HeaderGraphNode {
                uid: 1,
                name: "ethernet".to_string(),
                headers: vec![1],
                jumps: vec![
                    Jump::when(ethertype(1, ETHERTYPE_VLAN), 2),
                    Jump::when(ethertype(1, ETHERTYPE_IPV4), 3),
                ],
            },
            HeaderGraphNode {
                uid: 2,
                name: "vlan".to_string(),
                headers: vec![2],
                jumps: vec![Jump::when(
                    FieldRef::exact(2, 2, 4, ValueType::U16, ETHERTYPE_IPV4),
                    3,
                )],
            },
            HeaderGraphNode {
                uid: 3,
                name: "ipv4".to_string(),
                headers: vec![3],
                jumps: vec![Jump::to(0)],
            },
        ],
        actions: vec![
            Action {
                uid: ACTION_DROP,
                name: "drop".to_string(),
                args: vec![],
            },
            Action {
                uid: ACTION_FORWARD,
                name: "forward".to_string(),
                args: vec![arg("port", ValueType::U32)],
            },
            Action {
                uid: ACTION_SET_VLAN,
                name: "set_vlan".to_string(),
                args: vec![arg("vid", ValueType::U16), arg("pcp", ValueType::U8)],
            },
        ],
        tables: vec![
            Table {
                uid: TABLE_INGRESS,
                name: "ingress".to_string(),
                source: 0,
                apply_action: 0,
                size: 256,
                matches: vec![FieldRef::exact(1, 1, 1, ValueType::U64, 0)],
                actions: vec![ACTION_DROP, ACTION_FORWARD],
            },
            Table {
                uid: TABLE_ACL,
                name: "acl".to_string(),
                source: 0,
                apply_action: 0,
                size: 1024,
                matches: vec![
                    FieldRef::exact(3, 3, 6, ValueType::U32, 0),
                    FieldRef::exact(3, 3, 7, ValueType::U32, 0),
                ],
                actions: vec![ACTION_DROP, ACTION_FORWARD, ACTION_SET_VLAN],
            },
            Table {
                uid: TABLE_EGRESS,
                name: "egress".to_string(),
                source: 0,
                apply_action: 0,
                size: 64,
                matches: vec![],
                actions: vec![ACTION_FORWARD],
            },
        ],
        table_graph: vec![
            TableGraphNode {
                uid: TABLE_INGRESS,
                flags: 0,
                jumps: vec![Jump::to(TABLE_ACL)],
            },
            TableGraphNode {
                uid: TABLE_ACL,
                flags: 0,
                jumps: vec![Jump::to(TABLE_EGRESS)],
            },
            TableGraphNode {
                uid: TABLE_EGRESS,
                flags: 0,
                jumps: vec![Jump::to(TABLE_INGRESS)],
            },
        ],
        rules: (1..=3).map(|uid| forward_rule(TABLE_ACL, uid, uid)).collect(),
        ports: (1..=4)
            .map(|id| Port {
                port_id: id,
                phys_port: 100 + id,
                state: PortState::Up,
                speed: 25_000,
                max_frame_size: 9_216,
                mac_addr: 0x0000_0002_0000_0000 | u64::from(id),
                glort: 0x4000 + id,
                pci: Some(PciAddress {
                    bus: 6,
                    device: 0,
                    function: id as u8,
                }),
            })
            .collect(),
    }
}

/// Rule forwarding IPv4 traffic from `src` to `port`.
pub fn forward_rule(table_id: u32, uid: u32, port: u32) -> Rule {
    Rule {
        table_id,
        uid,
        priority: 10,
        matches: vec![FieldRef::exact(3, 3, 6, ValueType::U32, 0x0A00_0000 + u64::from(uid))],
        actions: vec![RuleAction {
            uid: ACTION_FORWARD,
            args: vec![ActionArg {
                name: "port".to_string(),
                value_type: ValueType::U32,
                value: u64::from(port),
            }],
        }],
    }
}

/// A device answering requests from its pipeline.
#[derive(Debug)]
pub struct FakeDevice {
    pub pipeline: Pipeline,
    /// Entities per reply message.
    pub fragment_size: usize,
    /// Reject this command with this status.
    pub reject: Option<(Command, i32)>,
    /// Precede every reply with one carrying an old sequence number.
    pub stale_replies: bool,
    /// Status carried by the `DONE` that ends each dump.
    pub done_status: i32,
    /// Drop the first attribute of the first entity in this dump fragment.
    pub corrupt_fragment: Option<usize>,
    /// Close the channel after this many more datagrams.
    pub close_after: Option<usize>,
    /// Requests received, in order.
    pub requests: Vec<Message>,
    replies: VecDeque<Bytes>,
}

impl FakeDevice {
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            pipeline,
            fragment_size: 2,
            reject: None,
            stale_replies: false,
            done_status: 0,
            corrupt_fragment: None,
            close_after: None,
            requests: Vec::new(),
            replies: VecDeque::new(),
        }
    }

    fn genl(cmd: Command) -> GenlHeader {
        GenlHeader::new(cmd as u8, MATCH_GENL_VERSION)
    }

    fn reply(&mut self, req: &NlHeader, cmd: Command, multi: bool, attrs: &[Attribute]) {
        let fl = if multi { flags::MULTI } else { 0 };
        let msg = build_message(req.kind, fl, req.seq, DEVICE_PORT, Self::genl(cmd), attrs)
            .expect("reply fits");
        self.replies.push_back(msg);
    }

    fn dump<T: Collection>(&mut self, req: &NlHeader, cmd: Command, items: &[T]) {
        for (i, chunk) in items.chunks(self.fragment_size.max(1)).enumerate() {
            let mut attr = encode_collection(chunk);
            if self.corrupt_fragment == Some(i) {
                Self::strip_first_child(&mut attr);
            }
            self.reply(req, cmd, true, &[attr]);
        }
        self.replies.push_back(build_done(
            req.seq,
            DEVICE_PORT,
            flags::MULTI,
            self.done_status,
        ));
    }

    fn strip_first_child(container: &mut Attribute) {
        if let AttrValue::Nested(entities) = &mut container.value {
            if let Some(Attribute {
                value: AttrValue::Nested(children),
                ..
            }) = entities.first_mut()
            {
                if !children.is_empty() {
                    children.remove(0);
                }
            }
        }
    }

    fn ack(&mut self, req: &NlHeader, status: i32) {
        self.replies
            .push_back(build_error(req.seq, DEVICE_PORT, status, req));
    }

    fn range(query: Option<&Attribute>, min_tag: u16, max_tag: u16) -> (u32, u32) {
        let Some(query) = query else { return (0, 0) };
        let children = query.children().expect("query nest");
        let get = |tag| {
            find_attr(&children, tag)
                .map(|a| a.as_u32().expect("u32"))
                .unwrap_or(0)
        };
        (get(min_tag), get(max_tag))
    }

    fn in_range(uid: u32, (min, max): (u32, u32)) -> bool {
        uid >= min && (max == 0 || uid <= max)
    }

    /// First `PORT` entry of a `PORTS` list.
    fn port_entry(attrs: &[Attribute]) -> Vec<Attribute> {
        find_attr(attrs, top::PORTS)
            .and_then(|list| {
                let entries = list.children().expect("ports nest");
                find_attr(&entries, port::PORT)
                    .map(|p| p.children().expect("port nest").into_owned())
            })
            .unwrap_or_default()
    }

    fn identity_reply(&mut self, req: &NlHeader, cmd: Command, found: Option<&Port>, id_tag: u16) {
        match found {
            Some(p) => {
                let id = if id_tag == port::PHYS_ID { p.phys_port } else { p.port_id };
                let entry = Attribute::nested(
                    port::PORT,
                    vec![Attribute::u32(id_tag, id), Attribute::u32(port::GLORT, p.glort)],
                );
                self.reply(req, cmd, false, &[Attribute::nested(top::PORTS, vec![entry])]);
            }
            None => self.ack(req, -libc::ENOENT),
        }
    }

    fn handle(&mut self, msg: &Message) {
        let req = msg.header;
        let cmd = Command::from_u8(msg.genl().expect("genl header").cmd).expect("known command");
        let attrs = msg.attrs().expect("request attributes");

        if self.stale_replies {
            let stale = NlHeader { seq: req.seq.wrapping_sub(1), ..req };
            self.reply(&stale, cmd, false, &[]);
        }

        if let Some((rejected, status)) = self.reject {
            if rejected == cmd {
                self.ack(&req, status);
                return;
            }
        }

        match cmd {
            Command::GetHeaders => {
                let items = self.pipeline.headers.clone();
                self.dump(&req, cmd, &items);
            }
            Command::GetActions => {
                let items = self.pipeline.actions.clone();
                self.dump(&req, cmd, &items);
            }
            Command::GetTables => {
                let items = self.pipeline.tables.clone();
                self.dump(&req, cmd, &items);
            }
            Command::GetHeaderGraph => {
                let items = self.pipeline.header_graph.clone();
                self.dump(&req, cmd, &items);
            }
            Command::GetTableGraph => {
                let items = self.pipeline.table_graph.clone();
                self.dump(&req, cmd, &items);
            }
            Command::GetRules => {
                let query = find_attr(&attrs, top::RULES_QUERY);
                let range = Self::range(query, rules_query::MIN, rules_query::MAX);
                let table = query
                    .and_then(|q| {
                        let children = q.children().expect("query nest");
                        find_attr(&children, rules_query::TABLE).map(|a| a.as_u32().expect("u32"))
                    })
                    .unwrap_or(0);
                let items: Vec<Rule> = self
                    .pipeline
                    .rules
                    .iter()
                    .filter(|r| r.table_id == table && Self::in_range(r.uid, range))
                    .cloned()
                    .collect();
                self.dump(&req, cmd, &items);
            }
            Command::GetPorts => {
                let range = Self::range(
                    find_attr(&attrs, top::PORTS_QUERY),
                    ports_query::MIN,
                    ports_query::MAX,
                );
                let items: Vec<Port> = self
                    .pipeline
                    .ports
                    .iter()
                    .filter(|p| Self::in_range(p.port_id, range))
                    .cloned()
                    .collect();
                self.dump(&req, cmd, &items);
            }
            Command::SetRules => {
                let rules: Vec<Rule> = decode_collection(&attrs).expect("rules");
                for rule in rules {
                    self.pipeline
                        .rules
                        .retain(|r| !(r.table_id == rule.table_id && r.uid == rule.uid));
                    self.pipeline.rules.push(rule);
                }
                self.ack(&req, 0);
            }
            Command::DelRules => {
                let rules: Vec<Rule> = decode_collection(&attrs).expect("rules");
                for rule in rules {
                    self.pipeline
                        .rules
                        .retain(|r| !(r.table_id == rule.table_id && r.uid == rule.uid));
                }
                self.ack(&req, 0);
            }
            Command::CreateTable | Command::UpdateTable | Command::DestroyTable => {
                let tables: Vec<Table> = decode_collection(&attrs).expect("tables");
                for table in tables {
                    self.pipeline.tables.retain(|t| t.uid != table.uid);
                    if cmd != Command::DestroyTable {
                        self.pipeline.tables.push(table);
                    }
                }
                self.ack(&req, 0);
            }
            Command::SetPorts => {
                let ports: Vec<Port> = decode_collection(&attrs).expect("ports");
                for p in ports {
                    self.pipeline.ports.retain(|q| q.port_id != p.port_id);
                    self.pipeline.ports.push(p);
                }
                self.ack(&req, 0);
            }
            Command::GetLport => {
                let entry = Self::port_entry(&attrs);
                let found = if let Some(addr) = find_attr(&entry, port::PCI) {
                    let fields = addr.children().expect("pci nest");
                    let get = |tag| find_attr(&fields, tag).map(|a| a.as_u8().expect("u8"));
                    let (bus, device, function) =
                        (get(pci::BUS), get(pci::DEVICE), get(pci::FUNCTION));
                    self.pipeline
                        .ports
                        .iter()
                        .find(|p| {
                            p.pci.map(|a| (Some(a.bus), Some(a.device), Some(a.function)))
                                == Some((bus, device, function))
                        })
                        .cloned()
                } else if let Some(mac) = find_attr(&entry, port::MAC) {
                    let mac = mac.as_u64().expect("u64");
                    self.pipeline.ports.iter().find(|p| p.mac_addr == mac).cloned()
                } else {
                    None
                };
                self.identity_reply(&req, cmd, found.as_ref(), port::ID);
            }
            Command::GetPhysPort => {
                let entry = Self::port_entry(&attrs);
                let lport = find_attr(&entry, port::ID).map(|a| a.as_u32().expect("u32"));
                let found = self
                    .pipeline
                    .ports
                    .iter()
                    .find(|p| Some(p.port_id) == lport)
                    .cloned();
                self.identity_reply(&req, cmd, found.as_ref(), port::PHYS_ID);
            }
        }

        if cmd.is_mutation() && !flags::has_flag(req.flags, flags::ACK) {
            panic!("mutation {} sent without ACK flag", cmd);
        }
    }
}

impl Channel for FakeDevice {
    fn local_port(&self) -> u32 {
        CLIENT_PORT
    }

    fn send(&mut self, peer: u32, datagram: &[u8]) -> Result<()> {
        assert_eq!(peer, DEVICE_PORT, "request sent to the wrong session");
        for msg in split_datagram(Bytes::copy_from_slice(datagram))? {
            assert_eq!(msg.header.pid, CLIENT_PORT);
            self.handle(&msg);
            self.requests.push(msg);
        }
        Ok(())
    }

    fn recv(&mut self) -> Result<Option<Bytes>> {
        if let Some(left) = self.close_after.as_mut() {
            if *left == 0 {
                return Ok(None);
            }
            *left -= 1;
        }
        Ok(self.replies.pop_front())
    }
}
