//! Pipeline entities.
//!
//! These are the decoded forms of what a device reports: header layouts, the
//! parser graph, actions, tables, the table graph, rules and ports. Every
//! entity is identified by a non-zero `uid` within its collection.

use serde::{Deserialize, Serialize};

/// Width of a typed value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    /// 8-bit value.
    U8 = 1,
    /// 16-bit value.
    U16 = 2,
    /// 32-bit value.
    U32 = 3,
    /// 64-bit value.
    U64 = 4,
}

impl ValueType {
    /// Decode a wire code.
    pub fn from_u32(code: u32) -> Option<Self> {
        match code {
            1 => Some(ValueType::U8),
            2 => Some(ValueType::U16),
            3 => Some(ValueType::U32),
            4 => Some(ValueType::U64),
            _ => None,
        }
    }

    /// Number of bits.
    pub fn bits(self) -> u32 {
        match self {
            ValueType::U8 => 8,
            ValueType::U16 => 16,
            ValueType::U32 => 32,
            ValueType::U64 => 64,
        }
    }

    /// Largest value of this type.
    pub fn max(self) -> u64 {
        match self {
            ValueType::U64 => u64::MAX,
            other => (1u64 << other.bits()) - 1,
        }
    }
}

/// Match operator of a field reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaskType {
    /// Value must be equal.
    Exact = 1,
    /// Longest prefix match; mask is a prefix.
    Lpm = 2,
    /// Arbitrary bit mask.
    Mask = 3,
}

impl MaskType {
    /// Decode a wire code.
    pub fn from_u32(code: u32) -> Option<Self> {
        match code {
            1 => Some(MaskType::Exact),
            2 => Some(MaskType::Lpm),
            3 => Some(MaskType::Mask),
            _ => None,
        }
    }
}

/// Field of a header layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    /// Identity within the header.
    pub uid: u32,
    /// Field name, e.g. `dst_mac`.
    pub name: String,
    /// Width in bits.
    pub bitwidth: u32,
    /// Bit offset from the start of the header.
    pub offset: u32,
}

/// Protocol header layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    /// Identity.
    pub uid: u32,
    /// Header name, e.g. `ethernet`.
    pub name: String,
    /// Fields in wire order.
    pub fields: Vec<Field>,
}

impl Header {
    /// Check that field offsets strictly increase and fields do not overlap.
    pub fn validate_layout(&self) -> std::result::Result<(), String> {
        let mut prev = 0u64;
        let mut end = 0u64;
        for (i, field) in self.fields.iter().enumerate() {
            let offset = u64::from(field.offset);
            if i > 0 && offset <= prev {
                return Err(format!(
                    "field {} at bit {} does not follow the previous field at bit {}",
                    field.name, field.offset, prev
                ));
            }
            if i > 0 && offset < end {
                return Err(format!(
                    "field {} at bit {} overlaps the previous field ending at bit {}",
                    field.name, field.offset, end
                ));
            }
            prev = offset;
            end = offset + u64::from(field.bitwidth);
        }
        Ok(())
    }

    /// Total width in bits.
    pub fn bitwidth(&self) -> u64 {
        self.fields
            .last()
            .map(|f| u64::from(f.offset) + u64::from(f.bitwidth))
            .unwrap_or(0)
    }

    /// Look a field up by name.
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Field of a header instance plus an operator and a typed value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRef {
    /// Header graph node (header instance).
    pub instance: u32,
    /// Header uid.
    pub header: u32,
    /// Field uid within the header.
    pub field: u32,
    /// Operator.
    pub mask_type: MaskType,
    /// Width of `value` and `mask`.
    pub value_type: ValueType,
    /// Value to compare against.
    pub value: u64,
    /// Mask applied before comparing.
    pub mask: u64,
}

impl FieldRef {
    /// Exact match of a field against a value.
    pub fn exact(
        instance: u32,
        header: u32,
        field: u32,
        value_type: ValueType,
        value: u64,
    ) -> Self {
        Self {
            instance,
            header,
            field,
            mask_type: MaskType::Exact,
            value_type,
            value,
            mask: value_type.max(),
        }
    }
}

/// Edge of a header or table graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jump {
    /// Guard; `None` is the unconditional (default) edge.
    pub condition: Option<FieldRef>,
    /// Target node uid.
    pub node: u32,
}

impl Jump {
    /// Unconditional edge.
    pub fn to(node: u32) -> Self {
        Self {
            condition: None,
            node,
        }
    }

    /// Edge taken when `condition` holds.
    pub fn when(condition: FieldRef, node: u32) -> Self {
        Self {
            condition: Some(condition),
            node,
        }
    }
}

/// Node of the parser graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderGraphNode {
    /// Identity (header instance).
    pub uid: u32,
    /// Instance name, e.g. `ipv4_outer`.
    pub name: String,
    /// Headers parsed at this node.
    pub headers: Vec<u32>,
    /// Transitions to following nodes.
    pub jumps: Vec<Jump>,
}

/// Typed argument of an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionArg {
    /// Argument name.
    pub name: String,
    /// Value width.
    pub value_type: ValueType,
    /// Bound value; zero in action descriptions.
    pub value: u64,
}

/// Action a table may invoke.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    /// Identity.
    pub uid: u32,
    /// Action name, e.g. `set_egress_port`.
    pub name: String,
    /// Argument signature.
    pub args: Vec<ActionArg>,
}

/// Match-action table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    /// Identity.
    pub uid: u32,
    /// Table name.
    pub name: String,
    /// Table this one was carved out of (0 for hardware tables).
    pub source: u32,
    /// Action applied by the table itself.
    pub apply_action: u32,
    /// Number of rules the table can hold.
    pub size: u32,
    /// Fields the table can match on.
    pub matches: Vec<FieldRef>,
    /// Uids of the actions rules may use.
    pub actions: Vec<u32>,
}

impl Table {
    /// Whether rules of this table may use `action`.
    pub fn invokes(&self, action: u32) -> bool {
        self.actions.contains(&action)
    }
}

/// Node of the table graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableGraphNode {
    /// Table uid.
    pub uid: u32,
    /// Device specific node flags.
    pub flags: u32,
    /// Tables that may run next.
    pub jumps: Vec<Jump>,
}

/// Action bound to a rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleAction {
    /// Action uid.
    pub uid: u32,
    /// Argument values.
    pub args: Vec<ActionArg>,
}

/// Rule installed in a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    /// Table the rule belongs to.
    pub table_id: u32,
    /// Identity within the table.
    pub uid: u32,
    /// Priority; higher wins.
    pub priority: u32,
    /// Match conditions.
    pub matches: Vec<FieldRef>,
    /// Actions executed on a hit.
    pub actions: Vec<RuleAction>,
}

/// Administrative state of a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortState {
    /// Disabled.
    Down = 0,
    /// Enabled.
    Up = 1,
}

/// PCI bus/device/function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PciAddress {
    /// Bus number.
    pub bus: u8,
    /// Device number.
    pub device: u8,
    /// Function number.
    pub function: u8,
}

/// Device port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Port {
    /// Logical port id.
    pub port_id: u32,
    /// Physical port id.
    pub phys_port: u32,
    /// Administrative state.
    pub state: PortState,
    /// Speed in Mbit/s.
    pub speed: u32,
    /// Largest frame accepted.
    pub max_frame_size: u32,
    /// 48-bit MAC address.
    pub mac_addr: u64,
    /// Global resource tag.
    pub glort: u32,
    /// PCI function backing the port, if any.
    pub pci: Option<PciAddress>,
}

/// Answer of the port resolution commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortIdentity {
    /// Logical or physical port id, depending on the query.
    pub port: u32,
    /// Global resource tag.
    pub glort: u32,
}
