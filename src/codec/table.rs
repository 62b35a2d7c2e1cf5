//! Table codec.

use super::{
    decode_list, decode_u32_list, encode_list, encode_u32_list, required, required_uid, skip,
    Collection, Marshal,
};
use crate::error::Result;
use crate::protocol::tags::{table, top};
use crate::protocol::Attribute;
use crate::types::Table;

impl Marshal for Table {
    const KIND: u16 = table::TABLE;
    const ENTITY: &'static str = "table";

    fn encode_one(&self) -> Attribute {
        Attribute::nested(
            Self::KIND,
            vec![
                Attribute::u32(table::UID, self.uid),
                Attribute::string(table::NAME, &self.name),
                Attribute::u32(table::SOURCE, self.source),
                Attribute::u32(table::APPLY_ACTION, self.apply_action),
                Attribute::u32(table::SIZE, self.size),
                encode_list(table::MATCHES, &self.matches),
                encode_u32_list(table::ACTIONS, table::ACTION_UID, &self.actions),
            ],
        )
    }

    fn decode_one(attr: &Attribute) -> Result<Self> {
        let mut uid = None;
        let mut name = None;
        let mut source = 0;
        let mut apply_action = 0;
        let mut size = 0;
        let mut matches = Vec::new();
        let mut actions = Vec::new();

        let children = attr.children()?;
        for child in children.iter() {
            match child.kind {
                table::UID => uid = Some(child.as_u32()?),
                table::NAME => name = Some(child.as_str()?),
                table::SOURCE => source = child.as_u32()?,
                table::APPLY_ACTION => apply_action = child.as_u32()?,
                table::SIZE => size = child.as_u32()?,
                table::MATCHES => matches = decode_list(child)?,
                table::ACTIONS => actions = decode_u32_list(child, table::ACTION_UID)?,
                other => skip(Self::ENTITY, other),
            }
        }

        Ok(Table {
            uid: required_uid(uid, Self::ENTITY)?,
            name: required(name, Self::ENTITY, "name")?,
            source,
            apply_action,
            size,
            matches,
            actions,
        })
    }
}

impl Collection for Table {
    const CONTAINER: u16 = top::TABLES;
}
