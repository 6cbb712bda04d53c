//! Outbound command framing and the inbound byte-oriented receive state
//! machine (spec §4.A).
//!
//! Wire format: `[0x40, 0x53] [info] [len_lo, len_hi] [data...] [fcs] [0x40, 0x45]`.

use crate::error::FrameError;

const SOF1: u8 = 0x40;
const SOF2: u8 = 0x53;
const EOF1: u8 = 0x40;
const EOF2: u8 = 0x45;

pub const INFO_PING: u8 = 0x40;
pub const INFO_START: u8 = 0x41;
pub const INFO_STOP: u8 = 0x42;
pub const INFO_SET_FREQUENCY: u8 = 0x45;
pub const INFO_SET_PHY: u8 = 0x47;

pub const INFO_COMMAND_ACK: u8 = 0x80;
pub const INFO_STREAM_DATA: u8 = 0xC0;

fn checksum(info: u8, len_lo: u8, len_hi: u8, data: &[u8]) -> u8 {
    let mut sum = info.wrapping_add(len_lo).wrapping_add(len_hi);
    for &b in data {
        sum = sum.wrapping_add(b);
    }
    sum
}

/// Build a full outbound frame for `info` carrying `data`.
pub fn encode_frame(info: u8, data: &[u8]) -> Vec<u8> {
    let len = data.len() as u16;
    let len_lo = (len & 0xFF) as u8;
    let len_hi = (len >> 8) as u8;
    let fcs = checksum(info, len_lo, len_hi, data);

    let mut out = Vec::with_capacity(8 + data.len());
    out.push(SOF1);
    out.push(SOF2);
    out.push(info);
    out.push(len_lo);
    out.push(len_hi);
    out.extend_from_slice(data);
    out.push(fcs);
    out.push(EOF1);
    out.push(EOF2);
    out
}

/// The zero-data overload: `len=0x0000`, `fcs = info`.
pub fn encode_command(info: u8) -> Vec<u8> {
    encode_frame(info, &[])
}

pub fn encode_ping() -> Vec<u8> {
    encode_command(INFO_PING)
}

pub fn encode_start() -> Vec<u8> {
    encode_command(INFO_START)
}

pub fn encode_stop() -> Vec<u8> {
    encode_command(INFO_STOP)
}

pub fn encode_set_frequency(packed_freq: [u8; 4]) -> Vec<u8> {
    encode_frame(INFO_SET_FREQUENCY, &packed_freq)
}

pub fn encode_set_phy(phy_id: u8) -> Vec<u8> {
    encode_frame(INFO_SET_PHY, &[phy_id])
}

/// Classify a fully received frame. Returns `Ok(true)` if it is stream data,
/// `Ok(false)` if it is a command-ack OK, `Err` otherwise.
pub fn classify_response(info: u8, first_data_byte: Option<u8>) -> Result<bool, FrameError> {
    match info {
        INFO_COMMAND_ACK if first_data_byte == Some(0x00) => Ok(false),
        INFO_STREAM_DATA => Ok(true),
        other => Err(FrameError::UnexpectedResponse(other)),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    Bof1,
    Bof2,
    Info,
    Length1,
    Length2,
    Data,
    Fcs,
    Eof1,
    Eof2,
    Success,
    Error,
}

/// Drives the per-byte receive state machine described in spec §4.A.
pub struct FrameCodec {
    state: FrameState,
    info: u8,
    data_length: u16,
    payload: Vec<u8>,
    fcs: u8,
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameCodec {
    pub fn new() -> Self {
        Self {
            state: FrameState::Bof1,
            info: 0,
            data_length: 0,
            payload: Vec::new(),
            fcs: 0,
        }
    }

    pub fn state(&self) -> FrameState {
        self.state
    }

    pub fn info(&self) -> u8 {
        self.info
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn fcs(&self) -> u8 {
        self.fcs
    }

    fn reset(&mut self) {
        self.state = FrameState::Bof1;
        self.info = 0;
        self.data_length = 0;
        self.payload.clear();
        self.fcs = 0;
    }

    /// Feed one byte. `Error` is a terminal state the caller observes like
    /// `Success`; the next byte fed after either one starts a fresh frame
    /// from `Bof1`, discarding whatever was accumulated.
    pub fn feed(&mut self, byte: u8) -> FrameState {
        self.state = match self.state {
            FrameState::Bof1 => {
                if byte == SOF1 {
                    FrameState::Bof2
                } else {
                    FrameState::Error
                }
            }
            FrameState::Bof2 => {
                if byte == SOF2 {
                    FrameState::Info
                } else {
                    FrameState::Error
                }
            }
            FrameState::Info => {
                self.info = byte;
                // Firmware quirk (spec §9c): a 0xC0 info byte decrements the
                // declared data_length by one. Not explained upstream;
                // preserved verbatim.
                if byte == INFO_STREAM_DATA {
                    self.data_length = self.data_length.wrapping_sub(1);
                }
                FrameState::Length1
            }
            FrameState::Length1 => {
                // Wrapping add, not assignment: the 0xC0 quirk above leaves
                // `data_length` at 0xFFFF, and adding the low length byte is
                // what actually realizes "declared length minus one".
                self.data_length = self.data_length.wrapping_add(byte as u16);
                FrameState::Length2
            }
            FrameState::Length2 => {
                self.data_length |= (byte as u16) << 8;
                if self.data_length == 0 {
                    FrameState::Fcs
                } else {
                    FrameState::Data
                }
            }
            FrameState::Data => {
                self.payload.push(byte);
                if self.payload.len() as u16 >= self.data_length {
                    FrameState::Fcs
                } else {
                    FrameState::Data
                }
            }
            FrameState::Fcs => {
                if byte == 0x00 {
                    FrameState::Error
                } else {
                    self.fcs = byte;
                    FrameState::Eof1
                }
            }
            FrameState::Eof1 => {
                if byte == EOF1 {
                    FrameState::Eof2
                } else {
                    FrameState::Error
                }
            }
            FrameState::Eof2 => {
                if byte == EOF2 {
                    FrameState::Success
                } else {
                    FrameState::Error
                }
            }
            FrameState::Success | FrameState::Error => {
                // Caller is expected to consume a terminal state before
                // feeding another byte; treat as a fresh BOF1 otherwise.
                self.reset();
                return self.feed(byte);
            }
        };

        self.state
    }
}
