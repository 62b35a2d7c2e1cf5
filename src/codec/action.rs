//! Action and action argument codecs.

use super::{
    decode_list, decode_value, decode_value_type, encode_list, encode_value, required,
    required_uid, skip, Collection, Marshal,
};
use crate::error::Result;
use crate::protocol::tags::{action, action_arg, top};
use crate::protocol::Attribute;
use crate::types::{Action, ActionArg};

impl Marshal for ActionArg {
    const KIND: u16 = action_arg::ARG;
    const ENTITY: &'static str = "action argument";

    fn encode_one(&self) -> Attribute {
        let mut children = Vec::with_capacity(3);
        if !self.name.is_empty() {
            children.push(Attribute::string(action_arg::NAME, &self.name));
        }
        children.push(Attribute::u32(action_arg::VALUE_TYPE, self.value_type as u32));
        children.push(encode_value(action_arg::VALUE, self.value_type, self.value));
        Attribute::nested(Self::KIND, children)
    }

    fn decode_one(attr: &Attribute) -> Result<Self> {
        let mut name = String::new();
        let mut value_type = None;
        let mut value = None;

        let children = attr.children()?;
        for child in children.iter() {
            match child.kind {
                action_arg::NAME => name = child.as_str()?,
                action_arg::VALUE_TYPE => {
                    value_type = Some(decode_value_type(child, Self::ENTITY)?)
                }
                action_arg::VALUE => value = Some(child),
                other => skip(Self::ENTITY, other),
            }
        }

        let value_type = required(value_type, Self::ENTITY, "value type")?;
        let value = match value {
            Some(a) => decode_value(a, value_type)?,
            None => 0,
        };
        Ok(ActionArg {
            name,
            value_type,
            value,
        })
    }
}

impl Marshal for Action {
    const KIND: u16 = action::ACTION;
    const ENTITY: &'static str = "action";

    fn encode_one(&self) -> Attribute {
        Attribute::nested(
            Self::KIND,
            vec![
                Attribute::u32(action::UID, self.uid),
                Attribute::string(action::NAME, &self.name),
                encode_list(action::ARGS, &self.args),
            ],
        )
    }

    fn decode_one(attr: &Attribute) -> Result<Self> {
        let mut uid = None;
        let mut name = None;
        let mut args = Vec::new();

        let children = attr.children()?;
        for child in children.iter() {
            match child.kind {
                action::UID => uid = Some(child.as_u32()?),
                action::NAME => name = Some(child.as_str()?),
                action::ARGS => args = decode_list(child)?,
                other => skip(Self::ENTITY, other),
            }
        }

        Ok(Action {
            uid: required_uid(uid, Self::ENTITY)?,
            name: required(name, Self::ENTITY, "name")?,
            args,
        })
    }
}

impl Collection for Action {
    const CONTAINER: u16 = top::ACTIONS;
}
