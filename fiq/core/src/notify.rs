//! Deferred notifications from the real-time context
//!
//! The dispatcher never invokes a caller directly. Every user-visible
//! event becomes a `Notification` pushed onto a lock-free single-producer/
//! single-consumer queue; the completion bridge drains it from ordinary
//! context and delivers callbacks in enqueue order.

use crate::{PortId, XferStatus};
use heapless::spsc::{Consumer, Producer, Queue};
use heapless::Vec;

/// Capacity of the notification queue
pub const NOTIFY_DEPTH: usize = 16;

/// Maximum read-back bytes carried per transfer completion
pub const MAX_READ_BACK: usize = 32;

/// One deferred event, produced in the real-time context
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// A transfer finished or aborted
    XferComplete {
        port: PortId,
        /// Caller-chosen tag from `start_xfer`
        token: u32,
        status: XferStatus,
        /// Bytes gathered by the transfer's read messages, in order
        read_back: Vec<u8, MAX_READ_BACK>,
    },
    /// The audio sample cursor crossed an `int_period` boundary
    PeriodElapsed { sample_count: u64 },
    /// The queue saturated and `dropped` notifications were discarded
    Overrun { dropped: u32 },
}

/// Backing queue; split once into producer and consumer halves
pub type NotifyQueue = Queue<Notification, NOTIFY_DEPTH>;

/// Real-time half, owned by the dispatcher
pub type NotifyProducer<'q> = Producer<'q, Notification, NOTIFY_DEPTH>;

/// Ordinary-context half, owned by the completion bridge
pub type NotifyConsumer<'q> = Consumer<'q, Notification, NOTIFY_DEPTH>;
