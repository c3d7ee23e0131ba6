#![no_std]
#![forbid(unsafe_code)]

//! # fiqmux audio
//!
//! PWM audio playback engine. A single system-wide session consumes one
//! sample per tick of the shared real-time context, scales it by the
//! current volume, and emits the result as a PWM duty cycle. Volume ramps
//! run inside the tick with a precomputed per-tick step; period-elapsed
//! events are returned to the dispatcher for deferred delivery, never
//! invoked from the tick itself.

pub mod engine;

pub use engine::*;
pub use fiqmux_core::*;
