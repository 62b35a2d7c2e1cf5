//! Header graph and table graph codecs.
//!
//! Both graphs are node lists; a node names its successors through jumps.
//! A jump without a condition is the default edge.

use super::{
    decode_list, decode_u32_list, encode_list, encode_u32_list, required, required_uid, skip,
    Collection, Marshal,
};
use crate::error::Result;
use crate::protocol::tags::{header_node, jump, table_node, top};
use crate::protocol::Attribute;
use crate::types::{FieldRef, HeaderGraphNode, Jump, TableGraphNode};

impl Marshal for Jump {
    const KIND: u16 = jump::ENTRY;
    const ENTITY: &'static str = "jump";

    fn encode_one(&self) -> Attribute {
        let mut children = vec![Attribute::u32(jump::NODE, self.node)];
        if let Some(cond) = &self.condition {
            let mut cond = cond.encode_one();
            cond.kind = jump::CONDITION;
            children.push(cond);
        }
        Attribute::nested(Self::KIND, children)
    }

    fn decode_one(attr: &Attribute) -> Result<Self> {
        let mut node = None;
        let mut condition = None;

        let children = attr.children()?;
        for child in children.iter() {
            match child.kind {
                jump::NODE => node = Some(child.as_u32()?),
                jump::CONDITION => condition = Some(FieldRef::decode_one(child)?),
                other => skip(Self::ENTITY, other),
            }
        }

        Ok(Jump {
            condition,
            node: required(node, Self::ENTITY, "node")?,
        })
    }
}

impl Marshal for HeaderGraphNode {
    const KIND: u16 = header_node::NODE;
    const ENTITY: &'static str = "header graph node";

    fn encode_one(&self) -> Attribute {
        Attribute::nested(
            Self::KIND,
            vec![
                Attribute::u32(header_node::UID, self.uid),
                Attribute::string(header_node::NAME, &self.name),
                encode_u32_list(header_node::HEADERS, header_node::HEADER_UID, &self.headers),
                encode_list(header_node::JUMPS, &self.jumps),
            ],
        )
    }

    fn decode_one(attr: &Attribute) -> Result<Self> {
        let mut uid = None;
        let mut name = None;
        let mut headers = Vec::new();
        let mut jumps = Vec::new();

        let children = attr.children()?;
        for child in children.iter() {
            match child.kind {
                header_node::UID => uid = Some(child.as_u32()?),
                header_node::NAME => name = Some(child.as_str()?),
                header_node::HEADERS => {
                    headers = decode_u32_list(child, header_node::HEADER_UID)?
                }
                header_node::JUMPS => jumps = decode_list(child)?,
                other => skip(Self::ENTITY, other),
            }
        }

        Ok(HeaderGraphNode {
            uid: required_uid(uid, Self::ENTITY)?,
            name: required(name, Self::ENTITY, "name")?,
            headers,
            jumps,
        })
    }
}

impl Collection for HeaderGraphNode {
    const CONTAINER: u16 = top::HEADER_GRAPH;
}

impl Marshal for TableGraphNode {
    const KIND: u16 = table_node::NODE;
    const ENTITY: &'static str = "table graph node";

    fn encode_one(&self) -> Attribute {
        Attribute::nested(
            Self::KIND,
            vec![
                Attribute::u32(table_node::UID, self.uid),
                Attribute::u32(table_node::FLAGS, self.flags),
                encode_list(table_node::JUMPS, &self.jumps),
            ],
        )
    }

    fn decode_one(attr: &Attribute) -> Result<Self> {
        let mut uid = None;
        let mut flags = 0;
        let mut jumps = Vec::new();

        let children = attr.children()?;
        for child in children.iter() {
            match child.kind {
                table_node::UID => uid = Some(child.as_u32()?),
                table_node::FLAGS => flags = child.as_u32()?,
                table_node::JUMPS => jumps = decode_list(child)?,
                other => skip(Self::ENTITY, other),
            }
        }

        Ok(TableGraphNode {
            uid: required_uid(uid, Self::ENTITY)?,
            flags,
            jumps,
        })
    }
}

impl Collection for TableGraphNode {
    const CONTAINER: u16 = top::TABLE_GRAPH;
}
