//! Blocking/non-blocking byte I/O over the dongle's serial link, 3,000,000
//! baud 8-N-1 (spec §4.C).

use serial2::SerialPort as Serial2Port;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const BAUD_RATE: u32 = 3_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadByte {
    Ready(u8),
    Empty,
    Closed,
}

/// Wraps a `serial2::SerialPort` configured for 3,000,000 8-N-1, no flow
/// control, raw mode (no canonical processing, no echo).
pub struct SerialPort {
    path: PathBuf,
    port: Option<Serial2Port>,
}

impl SerialPort {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            port: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_connected(&self) -> bool {
        self.port.is_some()
    }

    pub fn connect(&mut self) -> std::io::Result<()> {
        let mut port = Serial2Port::open(&self.path, BAUD_RATE)?;
        port.set_read_timeout(Duration::from_millis(0))?;
        port.set_write_timeout(Duration::from_secs(2))?;
        self.port = Some(port);
        self.purge()?;
        Ok(())
    }

    pub fn disconnect(&mut self) {
        self.port = None;
    }

    pub fn write_all(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        let port = self
            .port
            .as_mut()
            .ok_or_else(|| std::io::Error::from(std::io::ErrorKind::NotConnected))?;
        port.write_all(bytes)
    }

    /// Non-blocking single-byte read. Returns `Empty` rather than blocking
    /// when nothing is available; `Closed` when the descriptor died.
    pub fn read_byte(&mut self) -> ReadByte {
        let Some(port) = self.port.as_mut() else {
            return ReadByte::Closed;
        };
        let mut buf = [0u8; 1];
        match port.read(&mut buf) {
            Ok(1) => ReadByte::Ready(buf[0]),
            Ok(_) => ReadByte::Empty,
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => ReadByte::Empty,
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => ReadByte::Empty,
            Err(_) => ReadByte::Closed,
        }
    }

    pub fn flush_tx(&mut self) -> std::io::Result<()> {
        let port = self
            .port
            .as_mut()
            .ok_or_else(|| std::io::Error::from(std::io::ErrorKind::NotConnected))?;
        port.flush()
    }

    pub fn purge(&mut self) -> std::io::Result<()> {
        let port = self
            .port
            .as_mut()
            .ok_or_else(|| std::io::Error::from(std::io::ErrorKind::NotConnected))?;
        port.discard_buffers()
    }
}
