//! Header layout codec.

use super::{required, required_uid, skip, Collection, Marshal};
use crate::error::{MatchError, Result};
use crate::protocol::tags::{field, header, top};
use crate::protocol::Attribute;
use crate::types::{Field, Header};

fn encode_field(f: &Field) -> Attribute {
    Attribute::nested(
        field::FIELD,
        vec![
            Attribute::u32(field::UID, f.uid),
            Attribute::string(field::NAME, &f.name),
            Attribute::u32(field::BITWIDTH, f.bitwidth),
            Attribute::u32(field::OFFSET, f.offset),
        ],
    )
}

/// Decode one field. A field without an offset starts where the previous one ended.
fn decode_field(attr: &Attribute, next_offset: u32) -> Result<Field> {
    const ENTITY: &str = "field";

    let mut uid = None;
    let mut name = None;
    let mut bitwidth = None;
    let mut offset = None;

    let children = attr.children()?;
    for child in children.iter() {
        match child.kind {
            field::UID => uid = Some(child.as_u32()?),
            field::NAME => name = Some(child.as_str()?),
            field::BITWIDTH => bitwidth = Some(child.as_u32()?),
            field::OFFSET => offset = Some(child.as_u32()?),
            other => skip(ENTITY, other),
        }
    }

    Ok(Field {
        uid: required_uid(uid, ENTITY)?,
        name: required(name, ENTITY, "name")?,
        bitwidth: required(bitwidth, ENTITY, "bitwidth")?,
        offset: offset.unwrap_or(next_offset),
    })
}

fn decode_fields(container: &Attribute) -> Result<Vec<Field>> {
    let children = container.children()?;
    let mut fields: Vec<Field> = Vec::with_capacity(children.len());
    for child in children.iter().filter(|a| a.kind == field::FIELD) {
        let next_offset = fields
            .last()
            .map(|f| f.offset.saturating_add(f.bitwidth))
            .unwrap_or(0);
        fields.push(decode_field(child, next_offset)?);
    }
    Ok(fields)
}

impl Marshal for Header {
    const KIND: u16 = header::HEADER;
    const ENTITY: &'static str = "header";

    fn encode_one(&self) -> Attribute {
        Attribute::nested(
            Self::KIND,
            vec![
                Attribute::u32(header::UID, self.uid),
                Attribute::string(header::NAME, &self.name),
                Attribute::nested(header::FIELDS, self.fields.iter().map(encode_field).collect()),
            ],
        )
    }

    fn decode_one(attr: &Attribute) -> Result<Self> {
        let mut uid = None;
        let mut name = None;
        let mut fields = Vec::new();

        let children = attr.children()?;
        for child in children.iter() {
            match child.kind {
                header::UID => uid = Some(child.as_u32()?),
                header::NAME => name = Some(child.as_str()?),
                header::FIELDS => fields = decode_fields(child)?,
                other => skip(Self::ENTITY, other),
            }
        }

        let decoded = Header {
            uid: required_uid(uid, Self::ENTITY)?,
            name: required(name, Self::ENTITY, "name")?,
            fields,
        };
        decoded
            .validate_layout()
            .map_err(|reason| MatchError::InvalidEntity {
                entity: Self::ENTITY,
                reason,
            })?;
        Ok(decoded)
    }
}

impl Collection for Header {
    const CONTAINER: u16 = top::HEADERS;
}
