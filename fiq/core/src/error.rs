//! Error taxonomy shared by every fiqmux crate

use core::fmt;

/// Result type used throughout fiqmux
pub type Result<T> = core::result::Result<T, Error>;

/// Outcome of an asynchronous transfer, delivered through the completion
/// path only: `Ok(())`, `NoAck`, `BusTimeout`, or `Cancelled`.
pub type XferStatus = Result<()>;

/// Position inside a multi-message transfer at which a failure occurred.
///
/// `byte == 0` denotes the address byte of message `msg`; data bytes are
/// numbered from 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XferOffset {
    /// Message index within the transfer
    pub msg: u8,
    /// Byte offset within the message
    pub byte: u8,
}

impl XferOffset {
    /// Create an offset from a message index and byte offset
    pub const fn new(msg: u8, byte: u8) -> Self {
        Self { msg, byte }
    }
}

impl fmt::Display for XferOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "msg {} byte {}", self.msg, self.byte)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for XferOffset {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "msg {} byte {}", self.msg, self.byte);
    }
}

/// Error types for fiqmux operations
///
/// `Busy` and `InvalidArgument` are returned synchronously from the
/// triggering call; the remaining variants are asynchronous outcomes that
/// reach the caller through the completion sink. Nothing is retried inside
/// the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Resource already claimed or session already prepared
    Busy,
    /// Bad port id, empty message list, zero-length message, or zero period
    InvalidArgument,
    /// Bus acknowledgement missing; carries the offset at which it failed
    NoAck(XferOffset),
    /// Data or clock line stuck, or tick budget exceeded
    BusTimeout,
    /// Caller-initiated abort
    Cancelled,
    /// Completion queue saturated; notifications were dropped
    Overrun,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Busy => write!(f, "Resource is busy"),
            Error::InvalidArgument => write!(f, "Invalid argument"),
            Error::NoAck(at) => write!(f, "No acknowledgement at {at}"),
            Error::BusTimeout => write!(f, "Bus timeout"),
            Error::Cancelled => write!(f, "Transfer cancelled"),
            Error::Overrun => write!(f, "Completion queue overrun"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Error::Busy => defmt::write!(fmt, "Busy"),
            Error::InvalidArgument => defmt::write!(fmt, "InvalidArgument"),
            Error::NoAck(at) => defmt::write!(fmt, "NoAck({})", at),
            Error::BusTimeout => defmt::write!(fmt, "BusTimeout"),
            Error::Cancelled => defmt::write!(fmt, "Cancelled"),
            Error::Overrun => defmt::write!(fmt, "Overrun"),
        }
    }
}
