//! The real-time dispatcher: one tick, two duties

use fiqmux_audio::{AudioEngine, RampDir};
use fiqmux_bus::{Msg, PortTable, MAX_MSGS};
use fiqmux_core::{
    BusIo, Notification, NotifyProducer, PlatformConfig, PortHandle, PortId, PwmSink, Result,
    SampleSource, StatusSignal, TickRate,
};
use heapless::Vec;

/// Default per-tick work budget: every port plus the audio step
pub const DEFAULT_WORK_BUDGET: u8 = PortId::COUNT as u8 + 1;

/// State advanced by the shared real-time context
///
/// Owns the port table, the audio engine, and the producer half of the
/// notification queue. `tick` is the single periodic entry point; all
/// other methods are the control plane and reach the same state through
/// [`SharedMux`](crate::SharedMux)'s critical section.
pub struct RtMux<'q, 'a, B, P> {
    ports: PortTable<B>,
    audio: AudioEngine<'a, P>,
    tx: NotifyProducer<'q>,
    status: Option<&'a mut dyn StatusSignal>,
    config: PlatformConfig,
    /// Round-robin start slot for bus stepping
    rr: usize,
    ticks: u64,
    work_budget: u8,
    /// Notifications dropped while the queue was saturated
    dropped: u32,
}

impl<'q, 'a, B: BusIo, P: PwmSink> RtMux<'q, 'a, B, P> {
    /// Build the multiplexer over the platform's PWM sink and tick rate
    pub fn new(tx: NotifyProducer<'q>, pwm: P, rate: TickRate, config: PlatformConfig) -> Self {
        Self {
            ports: PortTable::new(),
            audio: AudioEngine::new(pwm, rate),
            tx,
            status: None,
            config,
            rr: 0,
            ticks: 0,
            work_budget: DEFAULT_WORK_BUDGET,
            dropped: 0,
        }
    }

    /// Attach the external state-change pin
    pub fn set_status_signal(&mut self, status: &'a mut dyn StatusSignal) {
        self.status = Some(status);
    }

    /// Cap the protocol/audio steps performed per tick
    ///
    /// Bus steps are served first; audio runs only on leftover budget. A
    /// missed audio step degrades one sample, a missed bus half-period
    /// corrupts a transaction.
    pub fn set_work_budget(&mut self, budget: u8) {
        self.work_budget = budget.max(1);
    }

    /// Platform configuration recorded at init
    pub fn config(&self) -> &PlatformConfig {
        &self.config
    }

    /// Ticks dispatched so far
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    // --- real-time entry point -------------------------------------------

    /// One invocation of the shared context
    ///
    /// Never blocks, never allocates, never invokes a callback.
    pub fn tick(&mut self) {
        self.ticks += 1;
        let mut budget = self.work_budget;

        for k in 0..PortId::COUNT {
            if budget == 0 {
                break;
            }
            let port = PortId::ALL[(self.rr + k) % PortId::COUNT];
            if !self.ports.has_active(port) {
                continue;
            }
            budget -= 1;
            if let Some(note) = self.ports.step(port) {
                self.push(note);
                self.state_changed();
            }
        }
        self.rr = (self.rr + 1) % PortId::COUNT;

        if budget > 0 {
            if let Some(sample_count) = self.audio.tick() {
                self.push(Notification::PeriodElapsed { sample_count });
            }
        }
    }

    /// Queue a notification; on saturation drop it, count it, and report
    /// the count once space frees up (drop-newest overrun policy)
    fn push(&mut self, note: Notification) {
        if self.dropped > 0 {
            let overrun = Notification::Overrun {
                dropped: self.dropped,
            };
            if self.tx.enqueue(overrun).is_ok() {
                self.dropped = 0;
            }
        }
        if self.tx.enqueue(note).is_err() {
            self.dropped = self.dropped.saturating_add(1);
        }
    }

    fn state_changed(&mut self) {
        if let Some(status) = self.status.as_mut() {
            status.state_changed();
        }
    }

    // --- bus control plane -----------------------------------------------

    /// Claim a port with its pin pair
    pub fn request_port(&mut self, id: PortId, io: B) -> Result<PortHandle> {
        self.ports.request(id, io)
    }

    /// Release a port, cancelling any active transfer; stale handles are a
    /// silent no-op
    pub fn release_port(&mut self, handle: PortHandle) -> Option<B> {
        let (io, note) = self.ports.release(handle)?;
        if let Some(note) = note {
            self.push(note);
        }
        self.state_changed();
        Some(io)
    }

    /// Submit a transfer; the first bit clocks on the next tick
    pub fn start_xfer(&mut self, handle: PortHandle, msgs: Vec<Msg, MAX_MSGS>, token: u32) -> Result<()> {
        self.ports.start(handle, msgs, token)
    }

    /// Cancel the port's transfer; effective before the next tick, exactly
    /// one `Cancelled` completion, idempotent
    pub fn cancel_xfer(&mut self, handle: PortHandle) {
        if let Some(note) = self.ports.cancel(handle) {
            self.push(note);
            self.state_changed();
        }
    }

    /// Abort the port's transfer after a platform-detected fault; the port
    /// itself stays claimed and releasable
    pub fn fault_port(&mut self, port: PortId) {
        if let Some(note) = self.ports.fault(port) {
            self.push(note);
            self.state_changed();
        }
    }

    /// Whether the port currently has a transfer in flight
    pub fn xfer_active(&self, port: PortId) -> bool {
        self.ports.has_active(port)
    }

    // --- audio control plane ---------------------------------------------

    /// Reserve the audio session slot
    pub fn audio_request(&mut self) -> Result<()> {
        self.audio.request()
    }

    /// Arm the audio session
    pub fn audio_prepare(
        &mut self,
        source: &'a dyn SampleSource,
        volume: u16,
        int_period: u32,
    ) -> Result<()> {
        self.audio.prepare(source, volume, int_period)?;
        self.state_changed();
        Ok(())
    }

    /// Schedule a volume ramp
    pub fn audio_ramp(&mut self, dir: RampDir, ramp_ms: u32) {
        self.audio.ramp(dir, ramp_ms);
    }

    /// Set the volume immediately
    pub fn audio_set_volume(&mut self, volume: u16) {
        self.audio.set_volume(volume);
    }

    /// Monotonic sample cursor
    pub fn audio_get_playback_ptr(&self) -> u64 {
        self.audio.playback_ptr()
    }

    /// Allow period-elapsed notifications
    pub fn audio_int_enable(&mut self) {
        self.audio.int_enable();
    }

    /// Freeze period-elapsed notifications
    pub fn audio_int_disable(&mut self) {
        self.audio.int_disable();
    }

    /// Tear the audio session down
    pub fn audio_release(&mut self) {
        self.audio.release();
        self.state_changed();
    }

    /// Tear the audio session down after a platform-detected fault
    pub fn fault_audio(&mut self) {
        self.audio_release();
    }

    /// Current audio volume in public units
    pub fn audio_volume(&self) -> u16 {
        self.audio.volume()
    }
}
