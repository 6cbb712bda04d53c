//! Per-device state machine: connect/init/start/stream/stop/reconnect (spec
//! §4.D, Component D). Owns a `FrameCodec` and a `SerialPort`; emits
//! `CapturedFrame`s to the Output Coordinator's queue.

use std::time::{Duration, Instant, SystemTime};

use crate::error::DeviceError;
use crate::frame_codec::{self, FrameCodec, FrameState};
use crate::queue::BoundedQueue;
use crate::radio_mode;
use crate::serial_port::{ReadByte, SerialPort};
use crate::signals;

const IDLE_TIMEOUT: Duration = Duration::from_secs(10);
const RECONNECT_BACKOFF: Duration = Duration::from_secs(10);
const POLL_BACKOFF: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    WaitingForCommand,
    Stopped,
    Started,
}

/// One successfully framed response from a dongle (spec §3 `CapturedFrame`).
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    pub device_id: usize,
    pub port_label: String,
    pub channel: u16,
    pub radio_mode: u8,
    pub raw_frame: Vec<u8>,
    pub wall_time: SystemTime,
}

pub struct DeviceController {
    pub device_id: usize,
    pub port_label: String,
    pub channel: u16,
    pub radio_mode: u8,
    serial: SerialPort,
    codec: FrameCodec,
    state: DeviceState,
    firmware_row: Option<u8>,
}

/// Outcome of one `write command, read until terminal state` round-trip.
enum Exchange {
    Success { info: u8, payload: Vec<u8> },
}

impl DeviceController {
    pub fn new(device_id: usize, port_label: String, channel: u16, radio_mode: u8) -> Self {
        Self {
            device_id,
            serial: SerialPort::new(&port_label),
            port_label,
            channel,
            radio_mode,
            codec: FrameCodec::new(),
            state: DeviceState::WaitingForCommand,
            firmware_row: None,
        }
    }

    pub fn state(&self) -> DeviceState {
        self.state
    }

    pub fn connect(&mut self) -> Result<(), DeviceError> {
        self.serial.connect().map_err(DeviceError::OpenFailed)
    }

    pub fn disconnect(&mut self) {
        self.serial.disconnect();
    }

    /// `stop`, then `ping` (captures `firmware_row`), then `configure`
    /// (`set-phy`, `set-frequency`).
    pub fn init(&mut self) -> Result<(), DeviceError> {
        self.stop()?;

        self.codec = FrameCodec::new();
        let ping = self.exchange(frame_codec::encode_ping())?;
        let Exchange::Success { info, payload } = ping;
        frame_codec::classify_response(info, payload.first().copied())?;
        if payload.len() < 4 {
            return Err(DeviceError::ConfigureFailed("ping response too short".into()));
        }
        let firmware_id = payload[3];
        let firmware_row = radio_mode::firmware_row(firmware_id)
            .ok_or(DeviceError::UnsupportedMode { firmware_row: 0, mode: self.radio_mode })?;
        self.firmware_row = Some(firmware_row);

        self.configure(firmware_row)
    }

    fn configure(&mut self, firmware_row: u8) -> Result<(), DeviceError> {
        let entry = radio_mode::lookup(firmware_row, self.radio_mode)
            .ok_or(DeviceError::UnsupportedMode { firmware_row, mode: self.radio_mode })?;

        let phy = self.exchange(frame_codec::encode_set_phy(entry.phy_id))?;
        let Exchange::Success { info, payload } = phy;
        frame_codec::classify_response(info, payload.first().copied())?;

        let freq_mhz = radio_mode::final_frequency_mhz(self.radio_mode, self.channel as i32)?;
        let packed = radio_mode::pack_frequency(freq_mhz);
        let freq = self.exchange(frame_codec::encode_set_frequency(packed))?;
        let Exchange::Success { info, payload } = freq;
        frame_codec::classify_response(info, payload.first().copied())?;

        Ok(())
    }

    pub fn stop(&mut self) -> Result<(), DeviceError> {
        self.codec = FrameCodec::new();
        let stop = self.exchange(frame_codec::encode_stop())?;
        let Exchange::Success { info, payload } = stop;
        frame_codec::classify_response(info, payload.first().copied())?;
        self.state = DeviceState::Stopped;
        Ok(())
    }

    pub fn start(&mut self) -> Result<(), DeviceError> {
        self.codec = FrameCodec::new();
        let start = self.exchange(frame_codec::encode_start())?;
        let Exchange::Success { info, payload } = start;
        frame_codec::classify_response(info, payload.first().copied())?;
        self.state = DeviceState::Started;
        Ok(())
    }

    /// Stream indefinitely (`duration = None`) or until `duration` elapses.
    /// Submits every stream-data frame to `queue`; reconnects on `Closed`.
    pub fn stream_for(&mut self, queue: &BoundedQueue<CapturedFrame>, duration: Option<Duration>) {
        let deadline = duration.map(|d| Instant::now() + d);

        loop {
            if signals::interrupt_requested() {
                return;
            }
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    return;
                }
            }

            match self.receive_one_frame() {
                Ok(Some((info, payload))) => {
                    if matches!(frame_codec::classify_response(info, payload.first().copied()), Ok(true)) {
                        queue.push(CapturedFrame {
                            device_id: self.device_id,
                            port_label: self.port_label.clone(),
                            channel: self.channel,
                            radio_mode: self.radio_mode,
                            raw_frame: self.last_raw_frame(info, &payload),
                            wall_time: SystemTime::now(),
                        });
                    }
                }
                Ok(None) => continue,
                Err(DeviceError::LinkLost) => {
                    if !self.reconnect() {
                        return;
                    }
                }
                Err(_) => continue,
            }
        }
    }

    pub fn stream(&mut self, queue: &BoundedQueue<CapturedFrame>) {
        self.stream_for(queue, None)
    }

    /// Reassembles the SOF..EOF byte sequence for a successfully decoded
    /// stream frame, matching spec §3's `raw_frame` ("the entire SOF..EOF
    /// frame including info/length/fcs").
    fn last_raw_frame(&self, info: u8, payload: &[u8]) -> Vec<u8> {
        let len = payload.len() as u16;
        let mut raw = vec![0x40, 0x53, info, (len & 0xFF) as u8, (len >> 8) as u8];
        raw.extend_from_slice(payload);
        raw.push(self.codec.fcs());
        raw.push(0x40);
        raw.push(0x45);
        raw
    }

    /// disconnect, sleep, retry `connect → init → start` every 10 s until it
    /// works or the global interrupt flag is set (spec §4.D "stream").
    fn reconnect(&mut self) -> bool {
        self.disconnect();
        loop {
            if signals::interrupt_requested() {
                return false;
            }
            std::thread::sleep(RECONNECT_BACKOFF);
            if signals::interrupt_requested() {
                return false;
            }
            if self.connect().is_ok() && self.init().is_ok() && self.start().is_ok() {
                return true;
            }
        }
    }

    /// Feed bytes to the codec until one terminal `Success` frame is
    /// decoded, an idle timeout elapses, or the link closes.
    fn receive_one_frame(&mut self) -> Result<Option<(u8, Vec<u8>)>, DeviceError> {
        let started = Instant::now();
        loop {
            match self.serial.read_byte() {
                ReadByte::Ready(byte) => {
                    if self.codec.feed(byte) == FrameState::Success {
                        return Ok(Some((self.codec.info(), self.codec.payload().to_vec())));
                    }
                }
                ReadByte::Empty => {
                    if started.elapsed() >= IDLE_TIMEOUT {
                        return Ok(None);
                    }
                    std::thread::sleep(POLL_BACKOFF);
                }
                ReadByte::Closed => return Err(DeviceError::LinkLost),
            }
        }
    }

    /// Write `command`, then run the bounded read loop for one response.
    fn exchange(&mut self, command: Vec<u8>) -> Result<Exchange, DeviceError> {
        self.serial.write_all(&command).map_err(DeviceError::OpenFailed)?;
        let started = Instant::now();
        loop {
            match self.serial.read_byte() {
                ReadByte::Ready(byte) => {
                    if self.codec.feed(byte) == FrameState::Success {
                        return Ok(Exchange::Success {
                            info: self.codec.info(),
                            payload: self.codec.payload().to_vec(),
                        });
                    }
                }
                ReadByte::Empty => {
                    if started.elapsed() >= IDLE_TIMEOUT {
                        return Err(DeviceError::ReadTimeout);
                    }
                    std::thread::sleep(POLL_BACKOFF);
                }
                ReadByte::Closed => return Err(DeviceError::LinkLost),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_state_is_waiting_for_command() {
        let dc = DeviceController::new(0, "/dev/ttyACM0".into(), 20, 20);
        assert_eq!(dc.state(), DeviceState::WaitingForCommand);
    }

    #[test]
    fn last_raw_frame_round_trips_through_the_codec() {
        let mut dc = DeviceController::new(0, "/dev/ttyACM0".into(), 20, 20);
        let encoded = frame_codec::encode_frame(0x80, &[0x00]);
        for &b in &encoded {
            dc.codec.feed(b);
        }
        let raw = dc.last_raw_frame(0x80, &[0x00]);
        assert_eq!(raw, encoded);

        let mut codec = FrameCodec::new();
        let mut last = FrameState::Bof1;
        for &b in &raw {
            last = codec.feed(b);
        }
        assert_eq!(last, FrameState::Success);
        assert_eq!(codec.payload(), &[0x00]);
    }

    #[test]
    fn reconnect_abandons_promptly_once_the_interrupt_flag_is_set() {
        // spec §8 scenario 6 "abandons if the global interrupt flag is set":
        // `reconnect`'s loop checks the flag before its first 10 s sleep, so
        // setting it ahead of time lets this return without ever sleeping.
        // The interrupt flag is a process-wide static; setting it here is
        // harmless to every other test, none of which assert it unset.
        signals::request_interrupt();
        let mut dc = DeviceController::new(0, "/dev/definitely-not-a-real-port".into(), 20, 20);
        let resumed = dc.reconnect();
        assert!(!resumed);
    }
}
