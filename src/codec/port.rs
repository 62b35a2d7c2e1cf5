//! Port codec.
//!
//! Port ids are device assigned and may be zero, so unlike other entities
//! a zero id is accepted.

use super::{required, skip, Collection, Marshal};
use crate::error::{MatchError, Result};
use crate::protocol::tags::{pci, port, top};
use crate::protocol::Attribute;
use crate::types::{PciAddress, Port, PortIdentity, PortState};

pub(crate) fn encode_pci(kind: u16, addr: &PciAddress) -> Attribute {
    Attribute::nested(
        kind,
        vec![
            Attribute::u8(pci::BUS, addr.bus),
            Attribute::u8(pci::DEVICE, addr.device),
            Attribute::u8(pci::FUNCTION, addr.function),
        ],
    )
}

fn decode_pci(attr: &Attribute) -> Result<PciAddress> {
    const ENTITY: &str = "pci address";

    let mut bus = None;
    let mut device = None;
    let mut function = None;

    let children = attr.children()?;
    for child in children.iter() {
        match child.kind {
            pci::BUS => bus = Some(child.as_u8()?),
            pci::DEVICE => device = Some(child.as_u8()?),
            pci::FUNCTION => function = Some(child.as_u8()?),
            other => skip(ENTITY, other),
        }
    }

    Ok(PciAddress {
        bus: required(bus, ENTITY, "bus")?,
        device: required(device, ENTITY, "device")?,
        function: required(function, ENTITY, "function")?,
    })
}

impl Marshal for Port {
    const KIND: u16 = port::PORT;
    const ENTITY: &'static str = "port";

    fn encode_one(&self) -> Attribute {
        let mut children = vec![
            Attribute::u32(port::ID, self.port_id),
            Attribute::u32(port::PHYS_ID, self.phys_port),
            Attribute::u32(port::STATE, self.state as u32),
            Attribute::u32(port::SPEED, self.speed),
            Attribute::u32(port::MAX_FRAME_SIZE, self.max_frame_size),
            Attribute::u64(port::MAC, self.mac_addr),
            Attribute::u32(port::GLORT, self.glort),
        ];
        if let Some(addr) = &self.pci {
            children.push(encode_pci(port::PCI, addr));
        }
        Attribute::nested(Self::KIND, children)
    }

    fn decode_one(attr: &Attribute) -> Result<Self> {
        let mut port_id = None;
        let mut decoded = Port {
            port_id: 0,
            phys_port: 0,
            state: PortState::Down,
            speed: 0,
            max_frame_size: 0,
            mac_addr: 0,
            glort: 0,
            pci: None,
        };

        let children = attr.children()?;
        for child in children.iter() {
            match child.kind {
                port::ID => port_id = Some(child.as_u32()?),
                port::PHYS_ID => decoded.phys_port = child.as_u32()?,
                port::STATE => {
                    decoded.state = match child.as_u32()? {
                        0 => PortState::Down,
                        1 => PortState::Up,
                        code => {
                            return Err(MatchError::InvalidEntity {
                                entity: Self::ENTITY,
                                reason: format!("unknown port state {}", code),
                            })
                        }
                    }
                }
                port::SPEED => decoded.speed = child.as_u32()?,
                port::MAX_FRAME_SIZE => decoded.max_frame_size = child.as_u32()?,
                port::MAC => decoded.mac_addr = child.as_u64()?,
                port::GLORT => decoded.glort = child.as_u32()?,
                port::PCI => decoded.pci = Some(decode_pci(child)?),
                other => skip(Self::ENTITY, other),
            }
        }

        decoded.port_id = required(port_id, Self::ENTITY, "id")?;
        Ok(decoded)
    }
}

impl Collection for Port {
    const CONTAINER: u16 = top::PORTS;
}

/// Decode the answers of a port resolution command.
///
/// Each port entry carries the resolved id under `id_tag` plus its glort.
pub(crate) fn decode_identities(
    attrs: &[Attribute],
    id_tag: u16,
    attribute: &'static str,
) -> Result<Vec<PortIdentity>> {
    let mut found = Vec::new();
    for list in attrs.iter().filter(|a| a.kind == top::PORTS) {
        let entries = list.children()?;
        for entry in entries.iter().filter(|a| a.kind == port::PORT) {
            let mut id = None;
            let mut glort = 0;
            let children = entry.children()?;
            for child in children.iter() {
                match child.kind {
                    k if k == id_tag => id = Some(child.as_u32()?),
                    port::GLORT => glort = child.as_u32()?,
                    _ => {}
                }
            }
            found.push(PortIdentity {
                port: required(id, Port::ENTITY, attribute)?,
                glort,
            });
        }
    }
    Ok(found)
}
