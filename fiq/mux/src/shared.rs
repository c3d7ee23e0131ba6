//! Cross-context facade over [`RtMux`]
//!
//! The control plane runs in ordinary concurrent contexts while `tick`
//! runs in the real-time one; both reach the state through a short bounded
//! critical section, so a cancellation issued here is visible to the very
//! next tick. No operation blocks its caller waiting on hardware.

use crate::dispatch::RtMux;
use core::cell::RefCell;
use critical_section::Mutex;
use fiqmux_audio::RampDir;
use fiqmux_bus::{Msg, MAX_MSGS};
use fiqmux_core::{BusIo, PortHandle, PortId, PwmSink, Result, SampleSource};
use heapless::Vec;

/// Shared handle exposing the full operation surface
pub struct SharedMux<'q, 'a, B, P> {
    inner: Mutex<RefCell<RtMux<'q, 'a, B, P>>>,
}

impl<'q, 'a, B: BusIo, P: PwmSink> SharedMux<'q, 'a, B, P> {
    /// Wrap a configured multiplexer
    pub fn new(mux: RtMux<'q, 'a, B, P>) -> Self {
        Self {
            inner: Mutex::new(RefCell::new(mux)),
        }
    }

    fn with<R>(&self, f: impl FnOnce(&mut RtMux<'q, 'a, B, P>) -> R) -> R {
        critical_section::with(|cs| f(&mut self.inner.borrow_ref_mut(cs)))
    }

    /// Real-time entry point; call from the platform's periodic context
    pub fn tick(&self) {
        self.with(|mux| mux.tick());
    }

    /// Claim a port with its pin pair
    pub fn request_port(&self, id: PortId, io: B) -> Result<PortHandle> {
        self.with(|mux| mux.request_port(id, io))
    }

    /// Release a port; silent no-op on a stale handle
    pub fn release_port(&self, handle: PortHandle) -> Option<B> {
        self.with(|mux| mux.release_port(handle))
    }

    /// Submit a transfer; returns immediately, completion arrives through
    /// the bridge
    pub fn start_xfer(&self, handle: PortHandle, msgs: Vec<Msg, MAX_MSGS>, token: u32) -> Result<()> {
        self.with(|mux| mux.start_xfer(handle, msgs, token))
    }

    /// Cancel the port's transfer; idempotent, effective by the next tick
    pub fn cancel_xfer(&self, handle: PortHandle) {
        self.with(|mux| mux.cancel_xfer(handle));
    }

    /// Reserve the audio session slot
    pub fn audio_request(&self) -> Result<()> {
        self.with(|mux| mux.audio_request())
    }

    /// Arm the audio session over a caller-owned sample ring
    pub fn audio_prepare(
        &self,
        source: &'a dyn SampleSource,
        volume: u16,
        int_period: u32,
    ) -> Result<()> {
        self.with(|mux| mux.audio_prepare(source, volume, int_period))
    }

    /// Schedule a volume ramp
    pub fn audio_ramp(&self, dir: RampDir, ramp_ms: u32) {
        self.with(|mux| mux.audio_ramp(dir, ramp_ms));
    }

    /// Set the volume immediately
    pub fn audio_set_volume(&self, volume: u16) {
        self.with(|mux| mux.audio_set_volume(volume));
    }

    /// Monotonic sample cursor; safe from any context
    pub fn audio_get_playback_ptr(&self) -> u64 {
        self.with(|mux| mux.audio_get_playback_ptr())
    }

    /// Allow period-elapsed notifications
    pub fn audio_int_enable(&self) {
        self.with(|mux| mux.audio_int_enable());
    }

    /// Freeze period-elapsed notifications without tearing down the session
    pub fn audio_int_disable(&self) {
        self.with(|mux| mux.audio_int_disable());
    }

    /// Tear the audio session down and free the slot
    pub fn audio_release(&self) {
        self.with(|mux| mux.audio_release());
    }
}
