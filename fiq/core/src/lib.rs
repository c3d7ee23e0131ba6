#![no_std]
#![forbid(unsafe_code)]

//! # fiqmux core
//!
//! Shared types, error taxonomy, and hardware-facing traits for the fiqmux
//! real-time multiplexer. The multiplexer time-shares one highest-priority
//! periodic context between a bit-banged two-wire bus controller (up to four
//! ports) and a PWM audio playback engine; this crate holds everything both
//! duties and their callers agree on.

#[cfg(feature = "std")]
extern crate std;

pub mod config;
pub mod error;
pub mod notify;
pub mod pins;
pub mod port;
pub mod source;

pub use config::*;
pub use error::*;
pub use notify::*;
pub use pins::*;
pub use port::*;
pub use source::*;

/// fiqmux version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
