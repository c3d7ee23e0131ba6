//! Two-wire transfer messages and the half-period state machine
//!
//! One call to [`Xfer::step`] performs exactly one protocol unit (one clock
//! half-period) of work. The machine follows the classic master sequence:
//! `Start -> Address -> AckAddress -> DataByte -> AckData -> ... -> Stop`,
//! with a repeated start between messages and an `Error` terminal state on
//! a stuck line. Acknowledgement is sampled after the 8th bit of every
//! byte; a missing acknowledgement aborts the whole transfer, the status is
//! carried through a clean stop so the wire is left quiescent.

use crate::{BusIo, Error, Result, XferOffset, XferStatus, MAX_READ_BACK};
use core::fmt;
use heapless::Vec;

/// Maximum messages per transfer
pub const MAX_MSGS: usize = 4;

/// Maximum payload bytes per message
pub const MAX_MSG_LEN: usize = 32;

/// Ticks spent waiting for a released line to rise before the transfer
/// aborts with `BusTimeout`
pub const STUCK_LINE_TICKS: u16 = 1000;

/// Message direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dir {
    Write,
    Read,
}

#[cfg(feature = "defmt")]
impl defmt::Format for Dir {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Dir::Write => defmt::write!(fmt, "W"),
            Dir::Read => defmt::write!(fmt, "R"),
        }
    }
}

/// One addressed message within a transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Msg {
    addr: u8,
    dir: Dir,
    data: Vec<u8, MAX_MSG_LEN>,
}

impl Msg {
    /// Build a write message; fails on an empty payload, an oversized
    /// payload, or an address above the 7-bit range
    pub fn write(addr: u8, bytes: &[u8]) -> Result<Self> {
        if addr > 0x7F || bytes.is_empty() {
            return Err(Error::InvalidArgument);
        }
        let data = Vec::from_slice(bytes).map_err(|_| Error::InvalidArgument)?;
        Ok(Self {
            addr,
            dir: Dir::Write,
            data,
        })
    }

    /// Build a read message of `len` bytes
    pub fn read(addr: u8, len: usize) -> Result<Self> {
        if addr > 0x7F || len == 0 || len > MAX_MSG_LEN {
            return Err(Error::InvalidArgument);
        }
        let mut data = Vec::new();
        data.resize(len, 0).map_err(|_| Error::InvalidArgument)?;
        Ok(Self {
            addr,
            dir: Dir::Read,
            data,
        })
    }

    /// Target address (7-bit)
    pub fn addr(&self) -> u8 {
        self.addr
    }

    /// Message direction
    pub fn dir(&self) -> Dir {
        self.dir
    }

    /// Payload length in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the payload is empty (never true for a constructed message)
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Payload bytes (write messages)
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

/// Transfer state machine phases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusPhase {
    Idle,
    Start,
    Address,
    AckAddress,
    DataByte,
    AckData,
    Stop,
    Error,
}

impl fmt::Display for BusPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BusPhase::Idle => "Idle",
            BusPhase::Start => "Start",
            BusPhase::Address => "Address",
            BusPhase::AckAddress => "AckAddress",
            BusPhase::DataByte => "DataByte",
            BusPhase::AckData => "AckData",
            BusPhase::Stop => "Stop",
            BusPhase::Error => "Error",
        };
        write!(f, "{name}")
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for BusPhase {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            BusPhase::Idle => defmt::write!(fmt, "Idle"),
            BusPhase::Start => defmt::write!(fmt, "Start"),
            BusPhase::Address => defmt::write!(fmt, "Address"),
            BusPhase::AckAddress => defmt::write!(fmt, "AckAddress"),
            BusPhase::DataByte => defmt::write!(fmt, "DataByte"),
            BusPhase::AckData => defmt::write!(fmt, "AckData"),
            BusPhase::Stop => defmt::write!(fmt, "Stop"),
            BusPhase::Error => defmt::write!(fmt, "Error"),
        }
    }
}

/// Which half of the clock period the next step performs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Half {
    /// Clock low, data line changes
    Setup,
    /// Clock released, wait for it to rise, sample
    Clock,
}

/// Result of one protocol step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Transfer still in flight
    Pending,
    /// Transfer finished; the status is the one to deliver
    Done(XferStatus),
}

/// An active transfer: message list plus protocol cursor
pub struct Xfer {
    msgs: Vec<Msg, MAX_MSGS>,
    token: u32,
    read_back: Vec<u8, MAX_READ_BACK>,
    phase: BusPhase,
    half: Half,
    /// Substep within `Start` and `Stop`
    edge: u8,
    msg_idx: usize,
    byte_idx: usize,
    /// Bits left in the current byte
    bit: u8,
    shift: u8,
    /// The data line was released and must read high at the sample point
    expect_sda_high: bool,
    stretch: u16,
    /// Failure recorded mid-transfer, reported after the closing stop
    fail: Option<Error>,
}

impl Xfer {
    /// Validate and arm a transfer; the first bit clocks on the next step
    pub fn new(msgs: Vec<Msg, MAX_MSGS>, token: u32) -> Result<Self> {
        if msgs.is_empty() || msgs.iter().any(Msg::is_empty) {
            return Err(Error::InvalidArgument);
        }
        let read_total: usize = msgs
            .iter()
            .filter(|m| m.dir == Dir::Read)
            .map(Msg::len)
            .sum();
        if read_total > MAX_READ_BACK {
            return Err(Error::InvalidArgument);
        }
        Ok(Self {
            msgs,
            token,
            read_back: Vec::new(),
            phase: BusPhase::Start,
            half: Half::Setup,
            edge: 0,
            msg_idx: 0,
            byte_idx: 0,
            bit: 0,
            shift: 0,
            expect_sda_high: false,
            stretch: 0,
            fail: None,
        })
    }

    /// Caller-chosen completion tag
    pub fn token(&self) -> u32 {
        self.token
    }

    /// Current state machine phase
    pub fn phase(&self) -> BusPhase {
        self.phase
    }

    /// Take the bytes gathered by read messages
    pub fn take_read_back(&mut self) -> Vec<u8, MAX_READ_BACK> {
        core::mem::take(&mut self.read_back)
    }

    /// Abort from caller context: pins reach quiescent level immediately,
    /// within the same tick, never deferred
    pub fn cancel<B: BusIo>(&mut self, io: &mut B) {
        io.quiesce();
        self.phase = BusPhase::Idle;
    }

    /// Advance by exactly one protocol unit
    pub fn step<B: BusIo>(&mut self, io: &mut B) -> Step {
        match self.phase {
            BusPhase::Start => self.step_start(io),
            BusPhase::Address | BusPhase::DataByte => self.step_bits(io),
            BusPhase::AckAddress | BusPhase::AckData => self.step_ack(io),
            BusPhase::Stop => self.step_stop(io),
            // Idle/Error transfers are removed by the registry; stepping
            // one anyway is a harmless no-op.
            BusPhase::Idle | BusPhase::Error => Step::Done(Err(Error::Cancelled)),
        }
    }

    /// Release the clock and wait for the wire to actually rise; with
    /// `sda_high` set, a released data line must have followed it up.
    /// Returns `None` while waiting, `Some(())` when the lines read as
    /// required. Either line stuck low runs the same stretch counter out.
    fn lines_high<B: BusIo>(&mut self, io: &mut B, sda_high: bool) -> Option<()> {
        io.scl_release();
        if io.scl_is_high() && (!sda_high || io.sda_is_high()) {
            self.stretch = 0;
            return Some(());
        }
        self.stretch += 1;
        None
    }

    fn stuck(&self) -> bool {
        self.stretch >= STUCK_LINE_TICKS
    }

    fn abort_stuck<B: BusIo>(&mut self, io: &mut B) -> Step {
        io.quiesce();
        self.phase = BusPhase::Error;
        Step::Done(Err(Error::BusTimeout))
    }

    /// Start (or repeated start) sequence: clock low, both lines high,
    /// data falls while clock is high, clock falls.
    fn step_start<B: BusIo>(&mut self, io: &mut B) -> Step {
        match self.edge {
            0 => {
                io.scl_drive_low();
                io.sda_release();
                self.edge = 1;
            }
            1 => {
                // Both lines must be high before the data line can fall.
                if self.lines_high(io, true).is_none() {
                    if self.stuck() {
                        return self.abort_stuck(io);
                    }
                    return Step::Pending;
                }
                self.edge = 2;
            }
            2 => {
                io.sda_drive_low();
                self.edge = 3;
            }
            _ => {
                io.scl_drive_low();
                self.enter_address();
            }
        }
        Step::Pending
    }

    fn enter_address(&mut self) {
        let msg = &self.msgs[self.msg_idx];
        self.shift = msg.addr << 1 | (msg.dir == Dir::Read) as u8;
        self.bit = 8;
        self.phase = BusPhase::Address;
        self.half = Half::Setup;
    }

    fn enter_data_byte(&mut self) {
        let msg = &self.msgs[self.msg_idx];
        self.shift = match msg.dir {
            Dir::Write => msg.data[self.byte_idx],
            Dir::Read => 0,
        };
        self.bit = 8;
        self.phase = BusPhase::DataByte;
        self.half = Half::Setup;
    }

    fn enter_stop(&mut self) {
        self.phase = BusPhase::Stop;
        self.edge = 0;
    }

    /// One half-period of address or data clocking
    fn step_bits<B: BusIo>(&mut self, io: &mut B) -> Step {
        let reading = self.phase == BusPhase::DataByte && self.msgs[self.msg_idx].dir == Dir::Read;
        match self.half {
            Half::Setup => {
                io.scl_drive_low();
                if reading {
                    io.sda_release();
                    self.expect_sda_high = false;
                } else {
                    let high = self.shift & 0x80 != 0;
                    self.expect_sda_high = high;
                    if high {
                        io.sda_release();
                    } else {
                        io.sda_drive_low();
                    }
                    self.shift <<= 1;
                }
                self.half = Half::Clock;
            }
            Half::Clock => {
                if self.lines_high(io, self.expect_sda_high).is_none() {
                    if self.stuck() {
                        return self.abort_stuck(io);
                    }
                    return Step::Pending;
                }
                if reading {
                    self.shift = self.shift << 1 | io.sda_is_high() as u8;
                }
                self.bit -= 1;
                if self.bit == 0 {
                    if reading {
                        // Capacity checked at construction.
                        let _ = self.read_back.push(self.shift);
                    }
                    self.phase = if self.phase == BusPhase::Address {
                        BusPhase::AckAddress
                    } else {
                        BusPhase::AckData
                    };
                    self.half = Half::Setup;
                } else {
                    self.half = Half::Setup;
                }
            }
        }
        Step::Pending
    }

    /// Acknowledgement slot: the slave drives it after address and write
    /// bytes, the master drives it after read bytes (NACK terminates the
    /// final byte of a read message).
    fn step_ack<B: BusIo>(&mut self, io: &mut B) -> Step {
        let msg_dir = self.msgs[self.msg_idx].dir;
        let msg_len = self.msgs[self.msg_idx].len();
        let master_acks = self.phase == BusPhase::AckData && msg_dir == Dir::Read;
        match self.half {
            Half::Setup => {
                io.scl_drive_low();
                if master_acks {
                    let last = self.byte_idx + 1 == msg_len;
                    // The terminating NACK is a released line; anything
                    // still pulling it low is a fault, not an answer.
                    self.expect_sda_high = last;
                    if last {
                        io.sda_release();
                    } else {
                        io.sda_drive_low();
                    }
                } else {
                    io.sda_release();
                    // Low here is the far end acknowledging, not a fault.
                    self.expect_sda_high = false;
                }
                self.half = Half::Clock;
                Step::Pending
            }
            Half::Clock => {
                if self.lines_high(io, self.expect_sda_high).is_none() {
                    if self.stuck() {
                        return self.abort_stuck(io);
                    }
                    return Step::Pending;
                }
                if !master_acks && io.sda_is_high() {
                    // No acknowledgement: abort the entire transfer, not
                    // just the current message.
                    let byte = if self.phase == BusPhase::AckAddress {
                        0
                    } else {
                        self.byte_idx as u8 + 1
                    };
                    self.fail = Some(Error::NoAck(XferOffset::new(self.msg_idx as u8, byte)));
                    self.enter_stop();
                    return Step::Pending;
                }
                if self.phase == BusPhase::AckAddress {
                    self.byte_idx = 0;
                    self.enter_data_byte();
                } else {
                    self.byte_idx += 1;
                    if self.byte_idx == msg_len {
                        self.msg_idx += 1;
                        if self.msg_idx == self.msgs.len() {
                            self.enter_stop();
                        } else {
                            // Repeated start before the next message.
                            self.phase = BusPhase::Start;
                            self.edge = 0;
                        }
                    } else {
                        self.enter_data_byte();
                    }
                }
                Step::Pending
            }
        }
    }

    /// Stop sequence: data low under a low clock, clock rises, data rises
    fn step_stop<B: BusIo>(&mut self, io: &mut B) -> Step {
        match self.edge {
            0 => {
                io.scl_drive_low();
                io.sda_drive_low();
                self.edge = 1;
                Step::Pending
            }
            1 => {
                if self.lines_high(io, false).is_none() {
                    if self.stuck() {
                        return self.abort_stuck(io);
                    }
                    return Step::Pending;
                }
                self.edge = 2;
                Step::Pending
            }
            _ => {
                io.sda_release();
                // The bus is only quiescent once the wire confirms the
                // rise; a held-low data line is a stuck-line fault.
                if !io.sda_is_high() {
                    if self.stuck() {
                        return self.abort_stuck(io);
                    }
                    self.stretch += 1;
                    return Step::Pending;
                }
                self.phase = BusPhase::Idle;
                Step::Done(match self.fail {
                    Some(err) => Err(err),
                    None => Ok(()),
                })
            }
        }
    }
}
