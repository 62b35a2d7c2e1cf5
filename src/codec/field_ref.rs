//! Field reference codec, shared by tables, rules and graph jumps.

use super::{decode_value, decode_value_type, encode_value, required, skip, Marshal};
use crate::error::{MatchError, Result};
use crate::protocol::tags::field_ref;
use crate::protocol::Attribute;
use crate::types::{FieldRef, MaskType};

impl Marshal for FieldRef {
    const KIND: u16 = field_ref::FIELD_REF;
    const ENTITY: &'static str = "field reference";

    fn encode_one(&self) -> Attribute {
        Attribute::nested(
            Self::KIND,
            vec![
                Attribute::u32(field_ref::INSTANCE, self.instance),
                Attribute::u32(field_ref::HEADER, self.header),
                Attribute::u32(field_ref::FIELD, self.field),
                Attribute::u32(field_ref::MASK_TYPE, self.mask_type as u32),
                Attribute::u32(field_ref::VALUE_TYPE, self.value_type as u32),
                encode_value(field_ref::VALUE, self.value_type, self.value),
                encode_value(field_ref::MASK, self.value_type, self.mask),
            ],
        )
    }

    fn decode_one(attr: &Attribute) -> Result<Self> {
        let mut instance = 0;
        let mut header = None;
        let mut field = None;
        let mut mask_type = MaskType::Exact;
        let mut value_type = None;
        let mut value = None;
        let mut mask = None;

        let children = attr.children()?;
        for child in children.iter() {
            match child.kind {
                field_ref::INSTANCE => instance = child.as_u32()?,
                field_ref::HEADER => header = Some(child.as_u32()?),
                field_ref::FIELD => field = Some(child.as_u32()?),
                field_ref::MASK_TYPE => {
                    let code = child.as_u32()?;
                    mask_type = MaskType::from_u32(code).ok_or_else(|| MatchError::InvalidEntity {
                        entity: Self::ENTITY,
                        reason: format!("unknown mask type {}", code),
                    })?;
                }
                field_ref::VALUE_TYPE => value_type = Some(decode_value_type(child, Self::ENTITY)?),
                // Width is only known once the value type has been seen.
                field_ref::VALUE => value = Some(child),
                field_ref::MASK => mask = Some(child),
                other => skip(Self::ENTITY, other),
            }
        }

        let value_type = required(value_type, Self::ENTITY, "value type")?;
        let value = match value {
            Some(a) => decode_value(a, value_type)?,
            None => 0,
        };
        let mask = match mask {
            Some(a) => decode_value(a, value_type)?,
            None => value_type.max(),
        };

        Ok(FieldRef {
            instance,
            header: required(header, Self::ENTITY, "header")?,
            field: required(field, Self::ENTITY, "field")?,
            mask_type,
            value_type,
            value,
            mask,
        })
    }
}
