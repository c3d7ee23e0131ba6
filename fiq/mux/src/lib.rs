#![no_std]
#![forbid(unsafe_code)]

//! # fiqmux
//!
//! Deterministic multiplexing of two real-time duties on one periodic
//! execution context: a bit-banged two-wire bus controller serving up to
//! four ports, and a PWM audio playback engine.
//!
//! The platform arranges for [`SharedMux::tick`] to run from its fastest
//! periodic context. Each tick advances every active bus transfer by one
//! protocol unit (round-robin across ports) and the audio session by one
//! sample; completions and period events are queued lock-free and drained
//! by a [`CompletionBridge`] in ordinary context. Nothing in the tick path
//! blocks, allocates, or calls back into the user.
//!
//! ```ignore
//! let mut queue = NotifyQueue::new();
//! let (tx, rx) = queue.split();
//! let mux = SharedMux::new(RtMux::new(tx, pwm, TickRate::hz(10_000), config));
//! let mut bridge = CompletionBridge::new(rx);
//!
//! let handle = mux.request_port(PortId::In1, io)?;
//! let mut msgs = heapless::Vec::new();
//! msgs.push(Msg::write(0x10, &[0x01, 0x02])?).ok();
//! mux.start_xfer(handle, msgs, 7)?;
//! // timer context: mux.tick();
//! // ordinary context: bridge.poll(&mut sink);
//! ```

pub mod bridge;
pub mod dispatch;
pub mod shared;

pub use bridge::*;
pub use dispatch::*;
pub use shared::*;

pub use fiqmux_audio::{AudioEngine, RampDir};
pub use fiqmux_bus::sim;
pub use fiqmux_bus::{BusPhase, Dir, Msg, PortTable, Xfer, MAX_MSGS, MAX_MSG_LEN};
pub use fiqmux_core::*;
