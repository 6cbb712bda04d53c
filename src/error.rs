//! Crate-wide error types, one `thiserror` enum per subsystem.

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum FrameError {
    #[error("unexpected byte {byte:#04x} in state {state:?}")]
    Desync { byte: u8, state: &'static str },
    #[error("frequency {freq} MHz out of range for radio mode {mode}")]
    InvalidChannelForMode { mode: u8, freq: f32 },
    #[error("response info byte {0:#04x} was not a command-ack or stream frame")]
    UnexpectedResponse(u8),
}

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("serial port open failed: {0}")]
    OpenFailed(#[from] std::io::Error),
    #[error("configure step failed: {0}")]
    ConfigureFailed(String),
    #[error("radio mode {mode} unsupported on firmware row {firmware_row}")]
    UnsupportedMode { firmware_row: u8, mode: u8 },
    #[error("frame codec error: {0}")]
    Frame(#[from] FrameError),
    #[error("no response within the read timeout")]
    ReadTimeout,
    #[error("serial link lost")]
    LinkLost,
}

#[derive(Debug, Error)]
pub enum PipeError {
    #[error("failed to create pipe endpoint {path}: {source}")]
    Create {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("consumer disconnected")]
    BrokenConsumer,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid reset period {0:?}")]
    InvalidResetPeriod(String),
    #[error("missing required option: {0}")]
    MissingRequired(&'static str),
    #[error("channel {channel} invalid for radio mode {mode}")]
    InvalidChannel { channel: u32, mode: u8 },
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse yaml config: {0}")]
    Parse(#[from] serde_yaml::Error),
}

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("no key in the store authenticated this packet")]
    NoKeyMatched,
    #[error("unsupported key id {0}")]
    UnsupportedKeyId(u8),
    #[error("tag verification failed")]
    TagMismatch,
}
