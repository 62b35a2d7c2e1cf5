//! Attribute type numbers.
//!
//! Each entity has its own numbering space, used inside the nest that holds
//! one entity. List containers hold repeated entries of a single element tag.

/// Attributes at the top of a message.
pub mod top {
    /// Kind of device identifier that follows (see `IDENTIFIER_IFINDEX`).
    pub const IDENTIFIER_TYPE: u16 = 1;
    /// Device identifier, a u32.
    pub const IDENTIFIER: u16 = 2;
    /// List of tables.
    pub const TABLES: u16 = 3;
    /// List of headers.
    pub const HEADERS: u16 = 4;
    /// List of actions.
    pub const ACTIONS: u16 = 5;
    /// List of header graph nodes.
    pub const HEADER_GRAPH: u16 = 6;
    /// List of table graph nodes.
    pub const TABLE_GRAPH: u16 = 7;
    /// List of rules.
    pub const RULES: u16 = 8;
    /// List of rules the device refused.
    pub const RULES_ERROR: u16 = 9;
    /// List of ports.
    pub const PORTS: u16 = 10;
    /// Parameters of a rules fetch.
    pub const RULES_QUERY: u16 = 11;
    /// Parameters of a ports fetch.
    pub const PORTS_QUERY: u16 = 12;
}

/// Identifier type: the device is named by interface index.
pub const IDENTIFIER_IFINDEX: u32 = 1;

/// Header layout.
pub mod header {
    /// List element.
    pub const HEADER: u16 = 1;
    pub const UID: u16 = 1;
    pub const NAME: u16 = 2;
    /// List of fields.
    pub const FIELDS: u16 = 3;
}

/// Field of a header.
pub mod field {
    /// List element.
    pub const FIELD: u16 = 1;
    pub const UID: u16 = 1;
    pub const NAME: u16 = 2;
    pub const BITWIDTH: u16 = 3;
    /// Optional; defaults to the end of the previous field.
    pub const OFFSET: u16 = 4;
}

/// Reference to a field of a header instance, with operator and value.
pub mod field_ref {
    /// List element.
    pub const FIELD_REF: u16 = 1;
    pub const INSTANCE: u16 = 1;
    pub const HEADER: u16 = 2;
    pub const FIELD: u16 = 3;
    pub const MASK_TYPE: u16 = 4;
    pub const VALUE_TYPE: u16 = 5;
    pub const VALUE: u16 = 6;
    pub const MASK: u16 = 7;
}

/// Action description.
pub mod action {
    /// List element.
    pub const ACTION: u16 = 1;
    pub const UID: u16 = 1;
    pub const NAME: u16 = 2;
    /// List of arguments.
    pub const ARGS: u16 = 3;
}

/// Typed action argument.
pub mod action_arg {
    /// List element.
    pub const ARG: u16 = 1;
    pub const NAME: u16 = 1;
    pub const VALUE_TYPE: u16 = 2;
    pub const VALUE: u16 = 3;
}

/// Table description.
pub mod table {
    /// List element.
    pub const TABLE: u16 = 1;
    pub const UID: u16 = 1;
    pub const NAME: u16 = 2;
    pub const SOURCE: u16 = 3;
    pub const APPLY_ACTION: u16 = 4;
    pub const SIZE: u16 = 5;
    /// List of field references the table can match on.
    pub const MATCHES: u16 = 6;
    /// List of action uids.
    pub const ACTIONS: u16 = 7;
    /// Element of `ACTIONS`.
    pub const ACTION_UID: u16 = 1;
}

/// Edge of a header or table graph.
pub mod jump {
    /// List element.
    pub const ENTRY: u16 = 1;
    pub const NODE: u16 = 1;
    /// Optional guard, a nested field reference.
    pub const CONDITION: u16 = 2;
}

/// Header graph node.
pub mod header_node {
    /// List element.
    pub const NODE: u16 = 1;
    pub const UID: u16 = 1;
    pub const NAME: u16 = 2;
    /// List of header uids.
    pub const HEADERS: u16 = 3;
    /// List of jumps.
    pub const JUMPS: u16 = 4;
    /// Element of `HEADERS`.
    pub const HEADER_UID: u16 = 1;
}

/// Table graph node.
pub mod table_node {
    /// List element.
    pub const NODE: u16 = 1;
    pub const UID: u16 = 1;
    pub const FLAGS: u16 = 2;
    /// List of jumps.
    pub const JUMPS: u16 = 3;
}

/// Installed rule.
pub mod rule {
    /// List element.
    pub const RULE: u16 = 1;
    pub const TABLE: u16 = 1;
    pub const UID: u16 = 2;
    pub const PRIORITY: u16 = 3;
    /// List of field references.
    pub const MATCHES: u16 = 4;
    /// List of bound actions, encoded like `action` without a name.
    pub const ACTIONS: u16 = 5;
}

/// Port description.
pub mod port {
    /// List element.
    pub const PORT: u16 = 1;
    pub const ID: u16 = 1;
    pub const PHYS_ID: u16 = 2;
    pub const STATE: u16 = 3;
    pub const SPEED: u16 = 4;
    pub const MAX_FRAME_SIZE: u16 = 5;
    pub const MAC: u16 = 6;
    pub const GLORT: u16 = 7;
    /// Nested PCI address.
    pub const PCI: u16 = 8;
}

/// PCI address inside a port.
pub mod pci {
    pub const BUS: u16 = 1;
    pub const DEVICE: u16 = 2;
    pub const FUNCTION: u16 = 3;
}

/// Parameters of a rules fetch.
pub mod rules_query {
    pub const TABLE: u16 = 1;
    pub const MIN: u16 = 2;
    pub const MAX: u16 = 3;
}

/// Parameters of a ports fetch.
pub mod ports_query {
    pub const MIN: u16 = 1;
    pub const MAX: u16 = 2;
}
