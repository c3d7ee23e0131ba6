//! Software model of the far end of one port
//!
//! [`SimSlave`] implements [`BusIo`] so a transfer engine can clock against
//! it on the host, one half-period at a time. The wire is the open-drain
//! AND of the master and slave contributions; the slave decodes start/stop
//! conditions and byte frames from the edges it observes, acknowledges (or
//! refuses) each byte, and can supply scripted bytes for read messages.
//! Everything it saw is kept in an event log for wire-level assertions.

use crate::BusIo;
use heapless::Vec;

/// Byte supplied for read clocks past the scripted data
const TX_PAD: u8 = 0xFF;

/// One observable wire event, in occurrence order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireEvent {
    /// Start or repeated start condition
    Start,
    /// Stop condition
    Stop,
    /// A complete byte frame and whether its acknowledgement slot was low
    Byte { value: u8, ack: bool },
}

/// Scripted single-device bus model
pub struct SimSlave {
    // Line contributions; true = released/high.
    m_sda: bool,
    m_scl: bool,
    s_sda: bool,
    s_scl: bool,
    prev_sda: bool,
    prev_scl: bool,

    // Frame decoder.
    active: bool,
    addr_frame: bool,
    reading: bool,
    /// Rising edges seen in the current frame: 0..8 data, 8 = ack slot,
    /// 9 = frame done
    frame_bit: u8,
    shift: u8,
    last_ack: bool,
    /// Completed bytes since construction, addresses included
    wire_byte: usize,

    // Scripting.
    nack_at: Option<usize>,
    tx: Vec<u8, 64>,
    tx_pos: usize,
    out_shift: u8,
    out_left: u8,

    log: Vec<WireEvent, 128>,
}

impl SimSlave {
    /// A slave that acknowledges everything and reads back `TX_PAD`
    pub fn new() -> Self {
        Self {
            m_sda: true,
            m_scl: true,
            s_sda: true,
            s_scl: true,
            prev_sda: true,
            prev_scl: true,
            active: false,
            addr_frame: false,
            reading: false,
            frame_bit: 0,
            shift: 0,
            last_ack: false,
            wire_byte: 0,
            nack_at: None,
            tx: Vec::new(),
            tx_pos: 0,
            out_shift: 0,
            out_left: 0,
            log: Vec::new(),
        }
    }

    /// Refuse the acknowledgement of the `index`-th wire byte (addresses
    /// count; the first address byte is index 0)
    pub fn nack_at(mut self, index: usize) -> Self {
        self.nack_at = Some(index);
        self
    }

    /// Script the bytes handed out for read messages, in order
    pub fn with_read_data(mut self, bytes: &[u8]) -> Self {
        self.tx = Vec::from_slice(bytes).unwrap_or_default();
        self
    }

    /// Hold the clock line low forever (stuck-line fault)
    pub fn hold_clock(mut self) -> Self {
        self.s_scl = false;
        self.prev_scl = false;
        self
    }

    /// Hold the data line low forever (stuck-line fault)
    pub fn hold_data(mut self) -> Self {
        self.s_sda = false;
        self.prev_sda = false;
        self
    }

    /// Everything observed so far
    pub fn log(&self) -> &[WireEvent] {
        &self.log
    }

    /// Byte frames observed so far, in order
    pub fn bytes(&self) -> impl Iterator<Item = (u8, bool)> + '_ {
        self.log.iter().filter_map(|event| match event {
            WireEvent::Byte { value, ack } => Some((*value, *ack)),
            _ => None,
        })
    }

    fn sda_wire(&self) -> bool {
        self.m_sda && self.s_sda
    }

    fn scl_wire(&self) -> bool {
        self.m_scl && self.s_scl
    }

    fn next_tx(&mut self) -> u8 {
        let byte = self.tx.get(self.tx_pos).copied().unwrap_or(TX_PAD);
        self.tx_pos += 1;
        byte
    }

    fn drive_out_bit(&mut self) {
        if self.out_left > 0 {
            self.s_sda = self.out_shift & 0x80 != 0;
            self.out_shift <<= 1;
            self.out_left -= 1;
        }
    }

    /// Re-evaluate the wire after a master line change
    fn settle(&mut self) {
        let sda = self.sda_wire();
        let scl = self.scl_wire();

        // Data edges under a high clock are start/stop conditions.
        if self.prev_scl && scl {
            if self.prev_sda && !sda {
                self.on_start();
            } else if !self.prev_sda && sda {
                self.on_stop();
            }
        }
        if !self.prev_scl && scl {
            self.on_scl_rise(sda);
        }
        if self.prev_scl && !scl {
            self.on_scl_fall();
        }

        // The handlers may have moved the slave's own contribution.
        self.prev_sda = self.sda_wire();
        self.prev_scl = self.scl_wire();
    }

    fn on_start(&mut self) {
        self.active = true;
        self.addr_frame = true;
        self.reading = false;
        self.frame_bit = 0;
        self.shift = 0;
        self.out_left = 0;
        self.s_sda = true;
        let _ = self.log.push(WireEvent::Start);
    }

    fn on_stop(&mut self) {
        self.active = false;
        self.s_sda = true;
        let _ = self.log.push(WireEvent::Stop);
    }

    fn on_scl_rise(&mut self, sda: bool) {
        if !self.active {
            return;
        }
        if self.frame_bit < 8 {
            self.shift = self.shift << 1 | sda as u8;
            self.frame_bit += 1;
        } else if self.frame_bit == 8 {
            // Acknowledgement sample point, whichever side drives it.
            let acked = !sda;
            self.last_ack = acked;
            let _ = self.log.push(WireEvent::Byte {
                value: self.shift,
                ack: acked,
            });
            self.frame_bit = 9;
        }
    }

    fn on_scl_fall(&mut self) {
        if !self.active {
            return;
        }
        match self.frame_bit {
            8 => {
                // Low phase of the ack slot: drive it for address and
                // write bytes, leave it to the master for read bytes.
                if self.addr_frame || !self.reading {
                    let nack = self.nack_at == Some(self.wire_byte);
                    self.s_sda = nack;
                } else {
                    self.s_sda = true;
                }
            }
            9 => {
                self.wire_byte += 1;
                if self.addr_frame {
                    self.reading = self.shift & 1 == 1;
                    self.addr_frame = false;
                }
                if self.reading && self.last_ack {
                    self.out_shift = self.next_tx();
                    self.out_left = 8;
                    self.drive_out_bit();
                } else {
                    self.s_sda = true;
                }
                self.frame_bit = 0;
                self.shift = 0;
            }
            _ => {
                if self.reading && self.out_left > 0 {
                    self.drive_out_bit();
                }
            }
        }
    }
}

impl Default for SimSlave {
    fn default() -> Self {
        Self::new()
    }
}

impl BusIo for SimSlave {
    fn sda_release(&mut self) {
        self.m_sda = true;
        self.settle();
    }

    fn sda_drive_low(&mut self) {
        self.m_sda = false;
        self.settle();
    }

    fn sda_is_high(&mut self) -> bool {
        self.sda_wire()
    }

    fn scl_release(&mut self) {
        self.m_scl = true;
        self.settle();
    }

    fn scl_drive_low(&mut self) {
        self.m_scl = false;
        self.settle();
    }

    fn scl_is_high(&mut self) -> bool {
        self.scl_wire()
    }
}
