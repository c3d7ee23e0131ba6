//! Platform configuration and tick-rate arithmetic
//!
//! Pin and tick-source identifiers are collaborator-provided and opaque:
//! the core records them at init and never interprets them.

use crate::PortId;
use core::fmt;

/// Opaque platform pin identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinId(pub u8);

/// Opaque periodic tick-source identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickSourceId(pub u8);

/// Data/clock pin assignment for one port
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortPins {
    pub data: PinId,
    pub clock: PinId,
}

/// Everything the platform hands the multiplexer at init
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformConfig {
    /// Per-port data/clock pins, indexed by `PortId::index`
    pub ports: [PortPins; PortId::COUNT],
    /// Tick source clocking the bus half-periods
    pub bus_tick: TickSourceId,
    /// Tick source clocking audio samples
    pub audio_tick: TickSourceId,
    /// State-change notification pin
    pub status: PinId,
}

/// Fixed rate of the shared real-time context, in ticks per second
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TickRate(u32);

impl TickRate {
    /// Create a rate from ticks per second
    pub const fn hz(rate: u32) -> Self {
        Self(rate)
    }

    /// Ticks per second
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Ticks spanning `ms` milliseconds, rounded up, never zero
    ///
    /// Rounding up keeps deadlines conservative: a ramp scheduled over
    /// `ms` finishes no later than one tick past the nominal deadline.
    pub const fn ticks_for_ms(self, ms: u32) -> u32 {
        let ticks = (self.0 as u64 * ms as u64).div_ceil(1000) as u32;
        if ticks == 0 {
            1
        } else {
            ticks
        }
    }
}

impl fmt::Display for TickRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}Hz", self.0)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for TickRate {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "{}Hz", self.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticks_round_up() {
        let rate = TickRate::hz(1000);
        assert_eq!(rate.ticks_for_ms(10), 10);
        let odd = TickRate::hz(1500);
        assert_eq!(odd.ticks_for_ms(1), 2); // 1.5 ticks rounds up
    }

    #[test]
    fn ticks_never_zero() {
        let rate = TickRate::hz(100);
        assert_eq!(rate.ticks_for_ms(0), 1);
    }
}
