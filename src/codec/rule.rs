//! Rule codec.
//!
//! Rule actions reuse the action numbering space: a uid plus an argument
//! list carrying bound values, without a name.

use super::{decode_list, encode_list, required_uid, skip, Collection, Marshal};
use crate::error::{MatchError, Result};
use crate::protocol::tags::{action, rule, top};
use crate::protocol::Attribute;
use crate::types::{Rule, RuleAction};

impl Marshal for RuleAction {
    const KIND: u16 = action::ACTION;
    const ENTITY: &'static str = "rule action";

    fn encode_one(&self) -> Attribute {
        Attribute::nested(
            Self::KIND,
            vec![
                Attribute::u32(action::UID, self.uid),
                encode_list(action::ARGS, &self.args),
            ],
        )
    }

    fn decode_one(attr: &Attribute) -> Result<Self> {
        let mut uid = None;
        let mut args = Vec::new();

        let children = attr.children()?;
        for child in children.iter() {
            match child.kind {
                action::UID => uid = Some(child.as_u32()?),
                action::ARGS => args = decode_list(child)?,
                // Devices may echo the action name back.
                action::NAME => {}
                other => skip(Self::ENTITY, other),
            }
        }

        Ok(RuleAction {
            uid: required_uid(uid, Self::ENTITY)?,
            args,
        })
    }
}

impl Marshal for Rule {
    const KIND: u16 = rule::RULE;
    const ENTITY: &'static str = "rule";

    fn encode_one(&self) -> Attribute {
        Attribute::nested(
            Self::KIND,
            vec![
                Attribute::u32(rule::TABLE, self.table_id),
                Attribute::u32(rule::UID, self.uid),
                Attribute::u32(rule::PRIORITY, self.priority),
                encode_list(rule::MATCHES, &self.matches),
                encode_list(rule::ACTIONS, &self.actions),
            ],
        )
    }

    fn decode_one(attr: &Attribute) -> Result<Self> {
        let mut table_id = None;
        let mut uid = None;
        let mut priority = 0;
        let mut matches = Vec::new();
        let mut actions = Vec::new();

        let children = attr.children()?;
        for child in children.iter() {
            match child.kind {
                rule::TABLE => table_id = Some(child.as_u32()?),
                rule::UID => uid = Some(child.as_u32()?),
                rule::PRIORITY => priority = child.as_u32()?,
                rule::MATCHES => matches = decode_list(child)?,
                rule::ACTIONS => actions = decode_list(child)?,
                other => skip(Self::ENTITY, other),
            }
        }

        let table_id = match table_id {
            Some(0) => {
                return Err(MatchError::InvalidEntity {
                    entity: Self::ENTITY,
                    reason: "table 0 is reserved".to_string(),
                })
            }
            Some(id) => id,
            None => {
                return Err(MatchError::IncompleteEntity {
                    entity: Self::ENTITY,
                    attribute: "table",
                })
            }
        };

        Ok(Rule {
            table_id,
            uid: required_uid(uid, Self::ENTITY)?,
            priority,
            matches,
            actions,
        })
    }
}

impl Collection for Rule {
    const CONTAINER: u16 = top::RULES;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ActionArg, FieldRef, ValueType};

    fn sample() -> Rule {
        Rule {
            table_id: 10,
            uid: 1,
            priority: 5,
            matches: vec![FieldRef::exact(1, 1, 1, ValueType::U64, 0x0011_2233_4455)],
            actions: vec![RuleAction {
                uid: 3,
                args: vec![ActionArg {
                    name: "port".to_string(),
                    value_type: ValueType::U32,
                    value: 7,
                }],
            }],
        }
    }

    #[test]
    fn test_roundtrip() {
        let r = sample();
        assert_eq!(Rule::decode_one(&r.encode_one()).unwrap(), r);
    }

    #[test]
    fn test_action_name_ignored() {
        let attr = Attribute::nested(
            action::ACTION,
            vec![
                Attribute::u32(action::UID, 2),
                Attribute::string(action::NAME, "drop"),
            ],
        );
        let decoded = RuleAction::decode_one(&attr).unwrap();
        assert_eq!(decoded, RuleAction { uid: 2, args: vec![] });
    }

    #[test]
    fn test_missing_table() {
        let attr = Attribute::nested(rule::RULE, vec![Attribute::u32(rule::UID, 1)]);
        assert!(matches!(
            Rule::decode_one(&attr),
            Err(MatchError::IncompleteEntity { entity: "rule", attribute: "table" })
        ));
    }

    #[test]
    fn test_zero_table() {
        let mut r = sample();
        r.table_id = 0;
        assert!(matches!(
            Rule::decode_one(&r.encode_one()),
            Err(MatchError::InvalidEntity { .. })
        ));
    }
}
