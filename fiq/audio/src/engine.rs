//! The single-slot playback session and its per-tick sample step

use fiqmux_core::{Error, PwmSink, Result, SampleSource, TickRate, MAX_VOLUME};

/// Direction of a volume ramp
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RampDir {
    /// Toward the last requested volume
    Up,
    /// Toward silence
    Down,
}

#[cfg(feature = "defmt")]
impl defmt::Format for RampDir {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            RampDir::Up => defmt::write!(fmt, "Up"),
            RampDir::Down => defmt::write!(fmt, "Down"),
        }
    }
}

/// Session slot state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Session {
    Free,
    Reserved,
    Prepared,
}

/// In-flight linear volume ramp, 8.8 fixed point
///
/// The step is sized so the target is reached within one tick of the
/// nominal deadline; completion is silent.
struct Ramp {
    target_fp: u32,
    step_fp: u32,
}

/// The audio playback engine
///
/// At most one session is alive at a time; the sample cursor never
/// decreases within a session's lifetime and resets only on a fresh
/// `prepare`. The engine owns the platform's PWM sink for the process
/// lifetime and borrows the caller's sample ring per session.
pub struct AudioEngine<'a, P> {
    pwm: P,
    rate: TickRate,
    session: Session,
    source: Option<&'a dyn SampleSource>,
    /// Current volume, 8.8 fixed point
    volume_fp: u32,
    /// Baseline target a ramp-up heads back to
    requested: u16,
    ramp: Option<Ramp>,
    cursor: u64,
    int_period: u32,
    until_period: u32,
    int_enabled: bool,
}

impl<'a, P: PwmSink> AudioEngine<'a, P> {
    /// Create an engine over the platform PWM sink
    pub const fn new(pwm: P, rate: TickRate) -> Self {
        Self {
            pwm,
            rate,
            session: Session::Free,
            source: None,
            volume_fp: 0,
            requested: 0,
            ramp: None,
            cursor: 0,
            int_period: 0,
            until_period: 0,
            int_enabled: false,
        }
    }

    /// Reserve the single session slot
    pub fn request(&mut self) -> Result<()> {
        if self.session != Session::Free {
            return Err(Error::Busy);
        }
        self.session = Session::Reserved;
        Ok(())
    }

    /// Arm a playback session
    ///
    /// `Busy` if one is already prepared; `InvalidArgument` for a zero
    /// period or an out-of-range volume. Calling from `Free` reserves the
    /// slot implicitly. The period callback fires every `int_period`
    /// samples, not ticks.
    pub fn prepare(
        &mut self,
        source: &'a dyn SampleSource,
        volume: u16,
        int_period: u32,
    ) -> Result<()> {
        if self.session == Session::Prepared {
            return Err(Error::Busy);
        }
        if int_period == 0 || volume > MAX_VOLUME {
            return Err(Error::InvalidArgument);
        }
        self.session = Session::Prepared;
        self.source = Some(source);
        self.volume_fp = (volume as u32) << 8;
        self.requested = volume;
        self.ramp = None;
        self.cursor = 0;
        self.int_period = int_period;
        self.until_period = int_period;
        self.int_enabled = true;
        Ok(())
    }

    /// Schedule a linear volume change over roughly `ramp_ms`
    ///
    /// Down heads to silence, up back to the last requested volume. The
    /// per-tick step is fixed; once the target is reached the volume
    /// simply stops changing.
    pub fn ramp(&mut self, dir: RampDir, ramp_ms: u32) {
        let target = match dir {
            RampDir::Down => 0,
            RampDir::Up => self.requested,
        };
        let target_fp = (target as u32) << 8;
        if target_fp == self.volume_fp {
            self.ramp = None;
            return;
        }
        let ticks = self.rate.ticks_for_ms(ramp_ms);
        let delta = self.volume_fp.abs_diff(target_fp);
        let step_fp = delta.div_ceil(ticks).max(1);
        self.ramp = Some(Ramp { target_fp, step_fp });
    }

    /// Set the volume immediately
    ///
    /// Updates the baseline a later ramp-up returns to; a ramp already in
    /// flight keeps heading for its previously set target.
    pub fn set_volume(&mut self, volume: u16) {
        let volume = volume.min(MAX_VOLUME);
        self.requested = volume;
        self.volume_fp = (volume as u32) << 8;
    }

    /// Current volume in public units
    pub fn volume(&self) -> u16 {
        (self.volume_fp >> 8) as u16
    }

    /// Monotonic sample cursor; never blocks, resets only on `prepare`
    pub fn playback_ptr(&self) -> u64 {
        self.cursor
    }

    /// Allow period-elapsed events
    pub fn int_enable(&mut self) {
        self.int_enabled = true;
    }

    /// Freeze period-elapsed events; the cursor and PWM output keep
    /// advancing
    pub fn int_disable(&mut self) {
        self.int_enabled = false;
    }

    /// Whether a session is prepared and consuming ticks
    pub fn is_prepared(&self) -> bool {
        self.session == Session::Prepared
    }

    /// Tear the session down: silence the output, free the slot
    ///
    /// Idempotent.
    pub fn release(&mut self) {
        self.pwm.idle();
        self.session = Session::Free;
        self.source = None;
        self.ramp = None;
        self.int_enabled = false;
    }

    /// One sample step, called from the real-time context
    ///
    /// Returns the sample count when the cursor crosses an `int_period`
    /// boundary with events enabled; the dispatcher turns that into a
    /// deferred notification.
    pub fn tick(&mut self) -> Option<u64> {
        if self.session != Session::Prepared {
            return None;
        }
        let source = self.source?;

        if let Some(ramp) = &self.ramp {
            let next = if ramp.target_fp > self.volume_fp {
                (self.volume_fp + ramp.step_fp).min(ramp.target_fp)
            } else {
                self.volume_fp.saturating_sub(ramp.step_fp).max(ramp.target_fp)
            };
            self.volume_fp = next;
            if next == ramp.target_fp {
                self.ramp = None;
            }
        }

        // Reduce modulo the ring length before narrowing so the mapping
        // stays continuous once the cursor no longer fits in usize.
        let len = source.len() as u64;
        let idx = if len == 0 {
            0
        } else {
            (self.cursor % len) as usize
        };
        let sample = source.sample(idx);
        self.cursor += 1;
        let volume = self.volume_fp >> 8;
        let duty = (sample as u32 * volume / MAX_VOLUME as u32) as u8;
        self.pwm.set_duty(duty);

        self.until_period -= 1;
        if self.until_period == 0 {
            self.until_period = self.int_period;
            if self.int_enabled {
                return Some(self.cursor);
            }
        }
        None
    }
}
