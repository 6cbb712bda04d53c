//! CLI flags and YAML config schema (spec §6), merged into a single
//! `RunConfig`. When `-i/--input` is given, every other flag is ignored.

use std::path::PathBuf;

use clap::Parser;
use serde::Deserialize;

use crate::error::ConfigError;

#[cfg(unix)]
pub const DEFAULT_PIPE_PATH: &str = "/tmp/";
#[cfg(not(unix))]
pub const DEFAULT_PIPE_PATH: &str = r"\\.\pipe\";

/// Command-line interface, mirroring the original dongle-sniffer's flag set.
#[derive(Debug, Parser)]
#[command(name = "tuxniffer", about = "Multi-device Zigbee/BLE sniffer-dongle host", version)]
pub struct Cli {
    /// Print the radio-mode table and exit
    #[arg(short = 'l', long = "list_modes")]
    pub list_modes: bool,

    /// Print a default YAML config example and exit
    #[arg(short = 'y', long = "yaml_example")]
    pub yaml_example: bool,

    /// Serial port path
    #[arg(short = 'p', long)]
    pub port: Option<String>,

    /// Radio mode (0-21)
    #[arg(short = 'm', long = "radio_mode")]
    pub radio_mode: Option<u8>,

    /// Channel (range validated per radio mode)
    #[arg(short = 'c', long)]
    pub channel: Option<i32>,

    /// File/pipe base name
    #[arg(short = 'n', long)]
    pub name: Option<String>,

    /// File output directory
    #[arg(short = 'P', long)]
    pub path: Option<String>,

    /// `none|hourly|daily|weekly|monthly`
    #[arg(short = 'r', long = "reset_period")]
    pub reset_period: Option<String>,

    /// Capture duration in seconds, `-1` = indefinite
    #[arg(short = 't', long = "time_duration")]
    pub time_duration: Option<i64>,

    /// Enable Zigbee key extraction and persist learned keys
    #[arg(short = 'k', long = "key_extraction")]
    pub key_extraction: bool,

    /// YAML config file; when given, every other flag above is ignored
    #[arg(short = 'i', long)]
    pub input: Option<PathBuf>,

    /// Suppress all logging except errors
    #[arg(short = 'q', long)]
    pub quiet: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetPeriod {
    None,
    Hourly,
    Daily,
    Weekly,
    Monthly,
}

impl ResetPeriod {
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        match s {
            "none" => Ok(Self::None),
            "hourly" => Ok(Self::Hourly),
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            other => Err(ConfigError::InvalidResetPeriod(other.to_string())),
        }
    }

    pub fn duration(self) -> Option<std::time::Duration> {
        use std::time::Duration;
        match self {
            Self::None => None,
            Self::Hourly => Some(Duration::from_secs(3600)),
            Self::Daily => Some(Duration::from_secs(3600 * 24)),
            Self::Weekly => Some(Duration::from_secs(3600 * 24 * 7)),
            Self::Monthly => Some(Duration::from_secs(3600 * 24 * 30)),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeviceConfig {
    pub port: String,
    pub radio_mode: u8,
    pub channel: i32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FileLogConfig {
    pub enabled: bool,
    pub path: String,
    pub base_name: String,
    #[serde(rename = "splitDevicesLog")]
    pub split_devices_log: bool,
    #[serde(rename = "resetPeriod")]
    pub reset_period: String,
}

impl Default for FileLogConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: "./".into(),
            base_name: "aceno".into(),
            split_devices_log: false,
            reset_period: "none".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipeLogConfig {
    pub enabled: bool,
    pub path: String,
    pub base_name: String,
    #[serde(rename = "splitDevicesPipe")]
    pub split_devices_log: bool,
}

impl Default for PipeLogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: DEFAULT_PIPE_PATH.to_string(),
            base_name: "aceno".into(),
            split_devices_log: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CryptoConfig {
    pub key_extraction: bool,
    pub security_level: i32,
    pub save_keys: bool,
    pub keys_path: String,
    pub save_packets: bool,
    pub packets_path: String,
    pub simulation: bool,
    pub simulation_path: String,
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self {
            key_extraction: false,
            security_level: -1,
            save_keys: false,
            keys_path: "keys".into(),
            save_packets: false,
            packets_path: "key_packets.bin".into(),
            simulation: false,
            simulation_path: "key_packets.bin".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct YamlConfig {
    pub devices: Vec<DeviceConfig>,
    #[serde(default)]
    pub log: FileLogConfig,
    #[serde(default)]
    pub pipe: PipeLogConfig,
    #[serde(default)]
    pub crypto: CryptoConfig,
    #[serde(default = "default_duration")]
    pub duration: i64,
}

fn default_duration() -> i64 {
    -1
}

/// The merged, validated configuration the orchestrator runs against.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub devices: Vec<DeviceConfig>,
    pub file: FileLogConfig,
    pub pipe: PipeLogConfig,
    pub crypto: CryptoConfig,
    pub duration_secs: i64,
}

impl RunConfig {
    pub fn from_yaml(path: &std::path::Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        let mut parsed: YamlConfig = serde_yaml::from_str(&text)?;
        if ResetPeriod::parse(&parsed.log.reset_period).is_err() {
            parsed.log.reset_period = "none".into();
        }
        if !(5..=7).contains(&parsed.crypto.security_level) {
            parsed.crypto.security_level = -1;
        }
        Ok(Self {
            devices: parsed.devices,
            file: parsed.log,
            pipe: parsed.pipe,
            crypto: parsed.crypto,
            duration_secs: parsed.duration,
        })
    }

    pub fn from_cli(cli: &Cli) -> Result<Self, ConfigError> {
        let port = cli.port.clone().ok_or(ConfigError::MissingRequired("--port"))?;
        let radio_mode = cli.radio_mode.ok_or(ConfigError::MissingRequired("--radio_mode"))?;
        let channel = cli.channel.ok_or(ConfigError::MissingRequired("--channel"))?;

        let mut file = FileLogConfig {
            enabled: true,
            ..FileLogConfig::default()
        };
        if let Some(name) = &cli.name {
            file.base_name = name.clone();
        }
        if let Some(path) = &cli.path {
            file.path = path.clone();
        }
        if let Some(period) = &cli.reset_period {
            ResetPeriod::parse(period)?;
            file.reset_period = period.clone();
        }

        let mut crypto = CryptoConfig::default();
        if cli.key_extraction {
            crypto.key_extraction = true;
            crypto.save_keys = true;
        }

        Ok(Self {
            devices: vec![DeviceConfig { port, radio_mode, channel }],
            file,
            pipe: PipeLogConfig::default(),
            crypto,
            duration_secs: cli.time_duration.unwrap_or(-1),
        })
    }

    /// Build from parsed CLI flags, delegating to YAML when `-i` is given
    /// (spec §6 "when an input file is specified, all other flags are
    /// ignored").
    pub fn resolve(cli: &Cli) -> Result<Self, ConfigError> {
        match &cli.input {
            Some(path) => Self::from_yaml(path),
            None => Self::from_cli(cli),
        }
    }
}

/// The `-y/--yaml_example` default-config text.
pub fn yaml_example() -> String {
    r#"devices:
  - port: /dev/ttyACM0
    radio_mode: 20
    channel: 20

log:
  enabled: false
  path: "./"
  base_name: aceno
  splitDevicesLog: false
  resetPeriod: none

pipe:
  enabled: true
  path: /tmp/
  base_name: aceno
  splitDevicesPipe: false

crypto:
  key_extraction: false
  security_level: -1
  save_keys: false
  keys_path: keys
  save_packets: false
  packets_path: key_packets.bin
  simulation: false
  simulation_path: key_packets.bin

duration: -1
"#
    .to_string()
}
