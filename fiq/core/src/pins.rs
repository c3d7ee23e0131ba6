//! Hardware-facing traits: open-drain lines, PWM output, status signal
//!
//! The multiplexer core never touches registers; platforms hand it objects
//! implementing these traits. `OpenDrain` adapts any `embedded-hal` digital
//! pin pair of capabilities to the crate's open-drain discipline.

use embedded_hal::digital::{InputPin, OutputPin};

/// A software-driven open-drain line
///
/// Released lines float high through the bus pull-up; a driven line is low.
/// `is_high` reads the actual wire, which may be held low by the far end
/// (acknowledgement, clock stretching).
pub trait Line {
    /// Stop driving the line; the pull-up takes it high
    fn release(&mut self);

    /// Drive the line low
    fn drive_low(&mut self);

    /// Read the wire level
    fn is_high(&mut self) -> bool;
}

/// Open-drain adapter over an `embedded-hal` digital pin
///
/// The pin must be configured open-drain by the platform; `set_high` is
/// then "release" and `set_low` is "drive". Pin errors are treated as the
/// line reading low, which the engine surfaces as `BusTimeout` rather than
/// panicking in the real-time path.
pub struct OpenDrain<P> {
    pin: P,
}

impl<P> OpenDrain<P> {
    /// Wrap a pin
    pub const fn new(pin: P) -> Self {
        Self { pin }
    }

    /// Give the pin back
    pub fn free(self) -> P {
        self.pin
    }
}

impl<P: OutputPin + InputPin> Line for OpenDrain<P> {
    fn release(&mut self) {
        let _ = self.pin.set_high();
    }

    fn drive_low(&mut self) {
        let _ = self.pin.set_low();
    }

    fn is_high(&mut self) -> bool {
        self.pin.is_high().unwrap_or(false)
    }
}

/// The two lines of one bus port, driven as a unit
///
/// One object per port keeps ownership simple: the registry stores a
/// `BusIo` per claimed slot and the transfer engine borrows it for exactly
/// one half-period step at a time.
pub trait BusIo {
    /// Release the data line
    fn sda_release(&mut self);
    /// Drive the data line low
    fn sda_drive_low(&mut self);
    /// Read the data wire
    fn sda_is_high(&mut self) -> bool;

    /// Release the clock line
    fn scl_release(&mut self);
    /// Drive the clock line low
    fn scl_drive_low(&mut self);
    /// Read the clock wire
    fn scl_is_high(&mut self) -> bool;

    /// Both lines released high (quiescent bus)
    fn quiesce(&mut self) {
        self.sda_release();
        self.scl_release();
    }
}

/// `BusIo` built from two independent `Line`s
pub struct LinePair<D, C> {
    data: D,
    clock: C,
}

impl<D, C> LinePair<D, C> {
    /// Pair a data line with a clock line
    pub const fn new(data: D, clock: C) -> Self {
        Self { data, clock }
    }

    /// Split the pair back into its lines
    pub fn free(self) -> (D, C) {
        (self.data, self.clock)
    }
}

impl<D: Line, C: Line> BusIo for LinePair<D, C> {
    fn sda_release(&mut self) {
        self.data.release();
    }

    fn sda_drive_low(&mut self) {
        self.data.drive_low();
    }

    fn sda_is_high(&mut self) -> bool {
        self.data.is_high()
    }

    fn scl_release(&mut self) {
        self.clock.release();
    }

    fn scl_drive_low(&mut self) {
        self.clock.drive_low();
    }

    fn scl_is_high(&mut self) -> bool {
        self.clock.is_high()
    }
}

/// PWM duty level emitted for silence (midpoint of the swing)
pub const IDLE_DUTY: u8 = 0x80;

/// Hardware sink for the audio engine's per-sample duty cycle
pub trait PwmSink {
    /// Set the instantaneous duty cycle
    fn set_duty(&mut self, duty: u8);

    /// Park the output at the idle level
    fn idle(&mut self) {
        self.set_duty(IDLE_DUTY);
    }
}

/// External state-change notification pin
///
/// Pulsed on transfer completions and audio session changes so external
/// logic can observe activity; no core logic ever reads it.
pub trait StatusSignal: Send {
    /// Signal that observable state changed
    fn state_changed(&mut self);
}

/// `StatusSignal` that toggles an open-drain line on every change
pub struct StatusLine<L> {
    line: L,
    low: bool,
}

impl<L: Line> StatusLine<L> {
    /// Wrap a line, starting released
    pub fn new(mut line: L) -> Self {
        line.release();
        Self { line, low: false }
    }
}

impl<L: Line + Send> StatusSignal for StatusLine<L> {
    fn state_changed(&mut self) {
        self.low = !self.low;
        if self.low {
            self.line.drive_low();
        } else {
            self.line.release();
        }
    }
}
