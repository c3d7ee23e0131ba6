#![no_std]
#![forbid(unsafe_code)]

//! # fiqmux bus
//!
//! Port registry and bit-banged two-wire transfer engine. The engine is a
//! per-port state machine advanced exactly one clock half-period per tick
//! of the shared real-time context; all timing comes from the tick source,
//! none from the hardware. The registry is pure bookkeeping over a fixed
//! arena of four port slots.
//!
//! `sim` provides a software model of the far end of a port so the whole
//! protocol can be exercised tick-by-tick on the host.

pub mod registry;
pub mod sim;
pub mod xfer;

pub use fiqmux_core::*;
pub use registry::*;
pub use xfer::*;
