//! The completion bridge: deferred, ordered, exactly-once delivery
//!
//! Consumes the notification queue in ordinary preemptible context and
//! invokes the caller's sink once per event, in enqueue order. Per port
//! and for the audio session that order matches event occurrence; no
//! global order across ports is promised.

use core::convert::Infallible;
use fiqmux_core::{Notification, NotifyConsumer, PortId, XferStatus};

/// Caller-supplied completion callbacks with their own typed state
pub trait CompletionSink {
    /// A transfer finished or aborted; `read_back` holds the bytes its
    /// read messages gathered, in order
    fn xfer_complete(&mut self, port: PortId, token: u32, status: XferStatus, read_back: &[u8]);

    /// The audio cursor crossed an `int_period` boundary
    fn period_elapsed(&mut self, sample_count: u64);

    /// The completion queue saturated and `dropped` events were discarded
    fn overrun(&mut self, dropped: u32) {
        let _ = dropped;
    }
}

/// Ordinary-context consumer half of the notification queue
pub struct CompletionBridge<'q> {
    rx: NotifyConsumer<'q>,
}

impl<'q> CompletionBridge<'q> {
    /// Wrap the consumer half
    pub fn new(rx: NotifyConsumer<'q>) -> Self {
        Self { rx }
    }

    /// Pull one notification without delivering it
    pub fn try_next(&mut self) -> nb::Result<Notification, Infallible> {
        self.rx.dequeue().ok_or(nb::Error::WouldBlock)
    }

    /// Drain the queue, delivering each event to `sink` exactly once
    ///
    /// Returns the number of events delivered.
    pub fn poll<S: CompletionSink>(&mut self, sink: &mut S) -> usize {
        let mut delivered = 0;
        while let Some(note) = self.rx.dequeue() {
            match note {
                Notification::XferComplete {
                    port,
                    token,
                    status,
                    read_back,
                } => sink.xfer_complete(port, token, status, &read_back),
                Notification::PeriodElapsed { sample_count } => {
                    sink.period_elapsed(sample_count)
                }
                Notification::Overrun { dropped } => sink.overrun(dropped),
            }
            delivered += 1;
        }
        delivered
    }
}
