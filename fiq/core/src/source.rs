//! Audio sample sources
//!
//! The playback engine reads one sample per tick from a caller-owned
//! source. Reads wrap modulo the source length, so a source is a ring; the
//! caller refills it from ordinary context, pacing itself with the
//! monotonic playback pointer.

use crate::pins::IDLE_DUTY;
use core::cell::RefCell;
use critical_section::Mutex;

/// Maximum linear volume (unity gain)
pub const MAX_VOLUME: u16 = 256;

/// Ring of PCM-like samples consumed by the playback engine
///
/// `sample` is called from the real-time context once per tick and must
/// never block. Sources are shared with the refilling caller, hence `Sync`.
pub trait SampleSource: Sync {
    /// Number of samples in the ring
    fn len(&self) -> usize;

    /// Whether the ring is empty
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read the sample at `idx`; implementations wrap modulo `len`
    fn sample(&self, idx: usize) -> u8;
}

impl SampleSource for [u8] {
    fn len(&self) -> usize {
        <[u8]>::len(self)
    }

    fn sample(&self, idx: usize) -> u8 {
        if self.is_empty() {
            IDLE_DUTY
        } else {
            self[idx % <[u8]>::len(self)]
        }
    }
}

impl<const N: usize> SampleSource for [u8; N] {
    fn len(&self) -> usize {
        N
    }

    fn sample(&self, idx: usize) -> u8 {
        self.as_slice().sample(idx)
    }
}

/// Caller-refillable sample ring, shared across contexts
///
/// Refills go through a short critical section, so a caller may overwrite
/// drained regions while the real-time context keeps reading. Starts
/// filled with silence.
pub struct SharedRing<const N: usize> {
    cells: Mutex<RefCell<[u8; N]>>,
}

impl<const N: usize> SharedRing<N> {
    /// Create a ring filled with silence
    pub const fn new() -> Self {
        Self {
            cells: Mutex::new(RefCell::new([IDLE_DUTY; N])),
        }
    }

    /// Overwrite samples starting at ring position `offset % N`, wrapping
    ///
    /// `offset` is normally a value previously read from the playback
    /// pointer, so the caller refills only what has been consumed.
    pub fn write_at(&self, offset: u64, bytes: &[u8]) {
        critical_section::with(|cs| {
            let mut cells = self.cells.borrow_ref_mut(cs);
            let mut pos = (offset % N as u64) as usize;
            for &byte in bytes {
                cells[pos] = byte;
                pos = (pos + 1) % N;
            }
        });
    }
}

impl<const N: usize> SampleSource for SharedRing<N> {
    fn len(&self) -> usize {
        N
    }

    fn sample(&self, idx: usize) -> u8 {
        critical_section::with(|cs| self.cells.borrow_ref(cs)[idx % N])
    }
}

impl<const N: usize> Default for SharedRing<N> {
    fn default() -> Self {
        Self::new()
    }
}
