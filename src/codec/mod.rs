//! Codec module - entity marshaling on top of the attribute codec.
//!
//! Every entity type implements [`Marshal`]: a fixed schema of child
//! attributes, some required, some optional or repeating. Top-level lists
//! (everything a `get_*` command returns) additionally implement
//! [`Collection`], which names the container attribute of the message.
//!
//! # Design
//!
//! Codecs are trait impls on the entity types rather than trait objects.
//! This keeps dispatch static and lets the session decode any collection
//! with one generic function.
//!
//! Decoding rules shared by all entities:
//! - a missing required child is `IncompleteEntity`
//! - unknown children are skipped
//! - list entries with an unexpected tag are skipped
//!
//! # Example
//!
//! ```
//! use matchlib_nl::codec::Marshal;
//! use matchlib_nl::types::{Action, ActionArg, ValueType};
//!
//! let action = Action {
//!     uid: 3,
//!     name: "set_egress_port".to_string(),
//!     args: vec![ActionArg { name: "port".to_string(), value_type: ValueType::U32, value: 0 }],
//! };
//! let attr = action.encode_one();
//! assert_eq!(Action::decode_one(&attr).unwrap(), action);
//! ```

mod action;
mod field_ref;
mod graph;
mod header;
mod port;
mod rule;
mod table;

pub(crate) use port::{decode_identities, encode_pci};

use crate::error::{MatchError, Result};
use crate::protocol::Attribute;
use crate::types::ValueType;

/// Attribute schema of one entity type.
pub trait Marshal: Sized {
    /// Tag of one entity inside its list container.
    const KIND: u16;
    /// Entity name used in errors and logs.
    const ENTITY: &'static str;

    /// Encode into a nested attribute tagged `KIND`.
    fn encode_one(&self) -> Attribute;

    /// Decode from a nested attribute. The tag of `attr` itself is not checked.
    fn decode_one(attr: &Attribute) -> Result<Self>;
}

/// An entity a device reports as a top-level list.
pub trait Collection: Marshal {
    /// Top-level attribute holding the list.
    const CONTAINER: u16;
}

/// Encode `items` as a list nested in `container`.
pub fn encode_list<T: Marshal>(container: u16, items: &[T]) -> Attribute {
    Attribute::nested(container, items.iter().map(Marshal::encode_one).collect())
}

/// Decode the entries of a list attribute.
pub fn decode_list<T: Marshal>(container: &Attribute) -> Result<Vec<T>> {
    let children = container.children()?;
    let mut items = Vec::with_capacity(children.len());
    for child in children.iter() {
        if child.kind != T::KIND {
            tracing::trace!(entity = T::ENTITY, kind = child.kind, "skipping list entry");
            continue;
        }
        items.push(T::decode_one(child)?);
    }
    Ok(items)
}

/// Encode a collection as the top-level attribute of a message.
pub fn encode_collection<T: Collection>(items: &[T]) -> Attribute {
    encode_list(T::CONTAINER, items)
}

/// Decode every container of `T` among the top-level attributes of a message.
///
/// A message without the container yields an empty vector.
pub fn decode_collection<T: Collection>(attrs: &[Attribute]) -> Result<Vec<T>> {
    let mut items = Vec::new();
    for attr in attrs.iter().filter(|a| a.kind == T::CONTAINER) {
        items.extend(decode_list::<T>(attr)?);
    }
    Ok(items)
}

/// Encode a value with the width of `value_type`.
///
/// Bits above the declared width are dropped.
pub(crate) fn encode_value(kind: u16, value_type: ValueType, value: u64) -> Attribute {
    match value_type {
        ValueType::U8 => Attribute::u8(kind, value as u8),
        ValueType::U16 => Attribute::u16(kind, value as u16),
        ValueType::U32 => Attribute::u32(kind, value as u32),
        ValueType::U64 => Attribute::u64(kind, value),
    }
}

/// Decode a value that must have the width of `value_type`.
pub(crate) fn decode_value(attr: &Attribute, value_type: ValueType) -> Result<u64> {
    Ok(match value_type {
        ValueType::U8 => u64::from(attr.as_u8()?),
        ValueType::U16 => u64::from(attr.as_u16()?),
        ValueType::U32 => u64::from(attr.as_u32()?),
        ValueType::U64 => attr.as_u64()?,
    })
}

pub(crate) fn decode_value_type(attr: &Attribute, entity: &'static str) -> Result<ValueType> {
    let code = attr.as_u32()?;
    ValueType::from_u32(code).ok_or_else(|| MatchError::InvalidEntity {
        entity,
        reason: format!("unknown value type {}", code),
    })
}

pub(crate) fn required<T>(
    value: Option<T>,
    entity: &'static str,
    attribute: &'static str,
) -> Result<T> {
    value.ok_or(MatchError::IncompleteEntity { entity, attribute })
}

/// A present, non-zero uid.
pub(crate) fn required_uid(uid: Option<u32>, entity: &'static str) -> Result<u32> {
    match required(uid, entity, "uid")? {
        0 => Err(MatchError::InvalidEntity {
            entity,
            reason: "uid 0 is reserved".to_string(),
        }),
        uid => Ok(uid),
    }
}

pub(crate) fn skip(entity: &'static str, kind: u16) {
    tracing::trace!(entity, kind, "skipping unknown attribute");
}

/// Decode a list of u32 scalars tagged `element`.
pub(crate) fn decode_u32_list(container: &Attribute, element: u16) -> Result<Vec<u32>> {
    container
        .children()?
        .iter()
        .filter(|a| a.kind == element)
        .map(Attribute::as_u32)
        .collect()
}

/// Encode a list of u32 scalars tagged `element`.
pub(crate) fn encode_u32_list(container: u16, element: u16, values: &[u32]) -> Attribute {
    Attribute::nested(
        container,
        values.iter().map(|&v| Attribute::u32(element, v)).collect(),
    )
}
