//! Port registry: a fixed arena of four claimable port slots
//!
//! Pure bookkeeping, no timing. Each slot owns its claimed `BusIo` and at
//! most one active [`Xfer`]; the dispatcher steps active slots and forwards
//! the completion notifications this module produces.

use crate::xfer::{Msg, Step, Xfer, MAX_MSGS};
use crate::{BusIo, Error, Notification, PortHandle, PortId, Result};
use heapless::Vec;

struct Slot<B> {
    generation: u16,
    io: Option<B>,
    xfer: Option<Xfer>,
}

impl<B> Slot<B> {
    const fn empty() -> Self {
        Self {
            generation: 0,
            io: None,
            xfer: None,
        }
    }
}

/// Fixed table of the four port slots
///
/// Invariant: at most one claimant per port, at most one transfer per
/// claimed port. Claim generations make stale handles harmless.
pub struct PortTable<B> {
    slots: [Slot<B>; PortId::COUNT],
}

impl<B: BusIo> PortTable<B> {
    /// Create a table with every slot free
    pub const fn new() -> Self {
        Self {
            slots: [
                Slot::empty(),
                Slot::empty(),
                Slot::empty(),
                Slot::empty(),
            ],
        }
    }

    fn claimed_slot(&mut self, handle: PortHandle) -> Option<&mut Slot<B>> {
        let slot = &mut self.slots[handle.id().index()];
        if slot.io.is_some() && slot.generation == handle.generation() {
            Some(slot)
        } else {
            None
        }
    }

    /// Claim a port, recording its pin pair; `Busy` if already claimed
    pub fn request(&mut self, id: PortId, io: B) -> Result<PortHandle> {
        let slot = &mut self.slots[id.index()];
        if slot.io.is_some() {
            return Err(Error::Busy);
        }
        slot.generation = slot.generation.wrapping_add(1);
        slot.io = Some(io);
        Ok(PortHandle::new(id, slot.generation))
    }

    /// Release a claimed port
    ///
    /// A stale handle is a silent no-op (`None`). Otherwise any active
    /// transfer is cancelled (its `Cancelled` notification is returned for
    /// delivery), the lines go quiescent, and the pins are handed back.
    pub fn release(&mut self, handle: PortHandle) -> Option<(B, Option<Notification>)> {
        let slot = self.claimed_slot(handle)?;
        let note = match (slot.xfer.take(), slot.io.as_mut()) {
            (Some(mut xfer), Some(io)) => {
                xfer.cancel(io);
                Some(cancelled(handle.id(), xfer.token()))
            }
            _ => None,
        };
        let mut io = slot.io.take()?;
        io.quiesce();
        Some((io, note))
    }

    /// Arm a transfer; the first bit clocks on the next tick
    ///
    /// `Busy` if a transfer is already active on the port,
    /// `InvalidArgument` for a stale handle or a bad message list.
    pub fn start(&mut self, handle: PortHandle, msgs: Vec<Msg, MAX_MSGS>, token: u32) -> Result<()> {
        let slot = self.claimed_slot(handle).ok_or(Error::InvalidArgument)?;
        if slot.xfer.is_some() {
            return Err(Error::Busy);
        }
        slot.xfer = Some(Xfer::new(msgs, token)?);
        Ok(())
    }

    /// Cancel the active transfer, if any; idempotent
    ///
    /// The pins reach quiescent level before this returns. The `Cancelled`
    /// notification is produced exactly once per transfer.
    pub fn cancel(&mut self, handle: PortHandle) -> Option<Notification> {
        let slot = self.claimed_slot(handle)?;
        let mut xfer = slot.xfer.take()?;
        let io = slot.io.as_mut()?;
        xfer.cancel(io);
        Some(cancelled(handle.id(), xfer.token()))
    }

    /// Abort the active transfer after a hardware fault; the port stays
    /// claimed and releasable
    pub fn fault(&mut self, port: PortId) -> Option<Notification> {
        let slot = &mut self.slots[port.index()];
        let xfer = slot.xfer.take()?;
        if let Some(io) = slot.io.as_mut() {
            io.quiesce();
        }
        Some(Notification::XferComplete {
            port,
            token: xfer.token(),
            status: Err(Error::BusTimeout),
            read_back: Vec::new(),
        })
    }

    /// Advance the port's transfer by one protocol unit
    ///
    /// Returns the completion notification when the transfer finishes or
    /// aborts; `None` while it is still in flight (or the port is idle).
    pub fn step(&mut self, port: PortId) -> Option<Notification> {
        let slot = &mut self.slots[port.index()];
        let mut xfer = slot.xfer.take()?;
        let io = slot.io.as_mut()?;
        match xfer.step(io) {
            Step::Pending => {
                slot.xfer = Some(xfer);
                None
            }
            Step::Done(status) => Some(Notification::XferComplete {
                port,
                token: xfer.token(),
                status,
                read_back: xfer.take_read_back(),
            }),
        }
    }

    /// Whether the port is claimed
    pub fn is_claimed(&self, port: PortId) -> bool {
        self.slots[port.index()].io.is_some()
    }

    /// Whether the port has a transfer in flight
    pub fn has_active(&self, port: PortId) -> bool {
        self.slots[port.index()].xfer.is_some()
    }

    /// Number of ports with a transfer in flight
    pub fn active_count(&self) -> usize {
        self.slots.iter().filter(|s| s.xfer.is_some()).count()
    }
}

impl<B: BusIo> Default for PortTable<B> {
    fn default() -> Self {
        Self::new()
    }
}

fn cancelled(port: PortId, token: u32) -> Notification {
    Notification::XferComplete {
        port,
        token,
        status: Err(Error::Cancelled),
        read_back: Vec::new(),
    }
}
