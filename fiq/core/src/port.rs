//! Port identifiers and handles

use crate::{Error, Result};
use core::fmt;

/// One of the four fixed input-port slots
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PortId {
    In1,
    In2,
    In3,
    In4,
}

impl PortId {
    /// Number of port slots in the system
    pub const COUNT: usize = 4;

    /// All ports in slot order
    pub const ALL: [PortId; Self::COUNT] = [PortId::In1, PortId::In2, PortId::In3, PortId::In4];

    /// Get the fixed slot index of this port
    pub const fn index(self) -> usize {
        match self {
            PortId::In1 => 0,
            PortId::In2 => 1,
            PortId::In3 => 2,
            PortId::In4 => 3,
        }
    }

    /// Look up a port by slot index
    pub const fn from_index(index: usize) -> Result<Self> {
        match index {
            0 => Ok(PortId::In1),
            1 => Ok(PortId::In2),
            2 => Ok(PortId::In3),
            3 => Ok(PortId::In4),
            _ => Err(Error::InvalidArgument),
        }
    }
}

impl fmt::Display for PortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "in{}", self.index() + 1)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for PortId {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "in{}", self.index() + 1);
    }
}

/// Claim ticket for a port slot
///
/// Carries the slot's generation at claim time, so a handle kept around
/// after `release_port` (or after someone else re-claims the slot) becomes
/// a harmless no-op instead of acting on the new claimant's transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortHandle {
    id: PortId,
    generation: u16,
}

impl PortHandle {
    /// Create a handle for a slot generation (used by the registry)
    pub const fn new(id: PortId, generation: u16) -> Self {
        Self { id, generation }
    }

    /// The port this handle refers to
    pub const fn id(self) -> PortId {
        self.id
    }

    /// The slot generation this handle was issued for
    pub const fn generation(self) -> u16 {
        self.generation
    }
}

impl fmt::Display for PortHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.id, self.generation)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for PortHandle {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "{}#{}", self.id, self.generation);
    }
}
