//! Output Coordinator (spec §4.F, Component F): drains the shared capture
//! queue, freezes the wall-clock/device-clock anchor on the first frame,
//! rotates log files on a schedule, runs every frame through the crypto
//! engine, and fans built records out to files and/or pipe sinks.
//!
//! Grounded on `OutputManager` (`output_manager.hpp`/`.cpp`): `add_packet`'s
//! bounded queue is `crate::queue::BoundedQueue`; `run()`'s busy loop with a
//! 10 ms backoff and drain-on-shutdown; `handle_packet()`'s anchor freeze,
//! rotation check and crypto dispatch; `recreate_log_files()`'s reset-period
//! thresholds; `saveKeyPackets()`/`loadAndSimulateKeyPackets()` now live in
//! `crate::simulation`.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use crate::capture_record::{self, RecordContext};
use crate::config::{CryptoConfig, FileLogConfig, ResetPeriod};
use crate::crypto::CryptoEngine;
use crate::device::CapturedFrame;
use crate::pipe_sink::PipeItem;
use crate::queue::BoundedQueue;
use crate::simulation::{self, KeyPacketRecord};

const POLL_BACKOFF: Duration = Duration::from_millis(10);

/// Fixed metadata about one configured device, known before any frame of its
/// has arrived (spec §4.F item 2).
#[derive(Debug, Clone)]
pub struct DeviceMeta {
    pub device_id: usize,
    pub port_label: String,
    pub channel: u16,
    pub radio_mode: u8,
}

/// One configured pcap file: its path template pieces and the open handle.
struct LogFile {
    dir: PathBuf,
    base_name: String,
    /// `None` for a combined file covering every device.
    device_id: Option<usize>,
    file: std::fs::File,
}

fn timestamp_prefix(reset_period: ResetPeriod) -> Option<String> {
    if reset_period == ResetPeriod::None {
        return None;
    }
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs();
    let days = now / 86_400;
    let secs_of_day = now % 86_400;
    let (y, m, d) = civil_from_days(days as i64);
    Some(format!(
        "{:04}-{:02}-{:02}_{:02}-{:02}",
        y,
        m,
        d,
        secs_of_day / 3600,
        (secs_of_day % 3600) / 60
    ))
}

/// Howard Hinnant's days-from-epoch -> (y, m, d) algorithm; avoids pulling in
/// a chrono-style dependency for a display-only timestamp prefix.
fn civil_from_days(z: i64) -> (i64, u32, u32) {
    let z = z + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = (z - era * 146_097) as u64;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146_096) / 365;
    let y = yoe as i64 + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let m = if mp < 10 { mp + 3 } else { mp - 9 } as u32;
    (if m <= 2 { y + 1 } else { y }, m, d)
}

fn log_file_name(dir: &str, base_name: &str, reset_period: ResetPeriod, device_id: Option<usize>) -> PathBuf {
    let mut name = String::new();
    if let Some(prefix) = timestamp_prefix(reset_period) {
        name.push_str(&prefix);
        name.push('_');
    }
    name.push_str(base_name);
    if let Some(id) = device_id {
        name.push('_');
        name.push_str(&id.to_string());
    }
    name.push_str(".pcap");
    PathBuf::from(dir).join(name)
}

fn open_log_file(dir: &str, base_name: &str, reset_period: ResetPeriod, device_id: Option<usize>) -> std::io::Result<LogFile> {
    let path = log_file_name(dir, base_name, reset_period, device_id);
    let mut file = std::fs::File::create(&path)?;
    file.write_all(&capture_record::global_header())?;
    Ok(LogFile {
        dir: PathBuf::from(dir),
        base_name: base_name.to_string(),
        device_id,
        file,
    })
}

pub struct OutputCoordinator {
    queue: Arc<BoundedQueue<CapturedFrame>>,
    devices: Vec<DeviceMeta>,
    file_config: FileLogConfig,
    crypto_config: CryptoConfig,
    crypto: CryptoEngine,
    pipe_targets: Vec<(Option<usize>, Arc<BoundedQueue<PipeItem>>)>,
    log_files: Vec<LogFile>,
    system_anchor_us: Option<i64>,
    last_rotation: Option<Instant>,
    reset_period: ResetPeriod,
    key_packets: Vec<KeyPacketRecord>,
}

impl OutputCoordinator {
    pub fn new(queue: Arc<BoundedQueue<CapturedFrame>>, file_config: FileLogConfig, crypto_config: CryptoConfig) -> Self {
        let crypto = CryptoEngine::new(crypto_config.security_level);
        let reset_period = ResetPeriod::parse(&file_config.reset_period).unwrap_or(ResetPeriod::None);
        Self {
            queue,
            devices: Vec::new(),
            file_config,
            crypto_config,
            crypto,
            pipe_targets: Vec::new(),
            log_files: Vec::new(),
            system_anchor_us: None,
            last_rotation: None,
            reset_period,
            key_packets: Vec::new(),
        }
    }

    /// Open the configured pcap file(s): one per device if
    /// `split_devices_log`, otherwise a single combined file (spec §4.F
    /// item 3, grounded on `configure_files`).
    pub fn configure_files(&mut self, devices: &[DeviceMeta]) -> std::io::Result<()> {
        if !self.file_config.enabled {
            return Ok(());
        }
        if self.file_config.split_devices_log {
            for d in devices {
                self.log_files.push(open_log_file(
                    &self.file_config.path,
                    &self.file_config.base_name,
                    self.reset_period,
                    Some(d.device_id),
                )?);
            }
        } else {
            self.log_files.push(open_log_file(
                &self.file_config.path,
                &self.file_config.base_name,
                self.reset_period,
                None,
            )?);
        }
        self.last_rotation = Some(Instant::now());
        Ok(())
    }

    /// Register a pipe sink's queue, scoped to one device (`split`) or every
    /// device (`combined`, grounded on `configure_pipes`).
    pub fn register_pipe(&mut self, device_id: Option<usize>, queue: Arc<BoundedQueue<PipeItem>>) {
        self.pipe_targets.push((device_id, queue));
    }

    pub fn configure(&mut self, devices: Vec<DeviceMeta>) -> std::io::Result<()> {
        self.devices = devices.clone();
        self.configure_files(&devices)
    }

    /// Replay any previously saved Transport-Key capture into every
    /// registered pipe before streaming begins (spec §5 "Simulated
    /// Transport-Key frames are emitted to every pipe before any real frame",
    /// grounded on `loadAndSimulateKeyPackets`).
    pub fn simulate_key_packets(&mut self) {
        if !self.crypto_config.simulation {
            return;
        }
        let path = PathBuf::from(&self.crypto_config.simulation_path);
        let records = match simulation::load(&path) {
            Ok(r) => r,
            Err(_) => return,
        };
        for record in &records {
            let ctx = RecordContext {
                port_label: &record.interface,
                channel: record.channel,
                radio_mode: record.mode,
            };
            let packet = capture_record::DecodedPacket {
                device_timestamp_us: 0,
                rssi: 0,
                payload: record.packet.clone(),
                fcs: 0,
            };
            if let Ok((header, body)) = capture_record::build_record(&packet, &ctx, 0) {
                for (_, queue) in &self.pipe_targets {
                    queue.push(PipeItem { header, body: body.clone() });
                }
            }
        }
    }

    /// The busy loop: drains the queue while `still_running` holds, then
    /// drains whatever remains once it returns false (spec §4.F item 1,
    /// grounded on `OutputManager::run`).
    pub fn run(&mut self, still_running: impl Fn() -> bool) {
        loop {
            match self.queue.pop() {
                Some(frame) => self.handle_frame(&frame),
                None => {
                    if !still_running() {
                        break;
                    }
                    std::thread::sleep(POLL_BACKOFF);
                }
            }
        }
        while let Some(frame) = self.queue.pop() {
            self.handle_frame(&frame);
        }
        self.shutdown();
    }

    /// Per-frame pipeline: freeze the anchor, rotate if due, decode + run the
    /// crypto engine, then write to file(s) and dispatch to pipe(s) (spec
    /// §4.F item 4, grounded on `handle_packet`).
    fn handle_frame(&mut self, frame: &CapturedFrame) {
        let Ok(decoded) = capture_record::decode_raw_frame(&frame.raw_frame) else {
            return;
        };

        let anchor_us = *self.system_anchor_us.get_or_insert_with(|| {
            let wall_us = frame
                .wall_time
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_micros() as i64;
            wall_us - decoded.device_timestamp_us as i64 + capture_record::TIMEZONE_SECONDS as i64 * 1_000_000
        });

        self.maybe_rotate();

        let is_key_frame = self.crypto_config.key_extraction && self.crypto.process_frame(&decoded.payload).is_some();

        let ctx = RecordContext {
            port_label: &frame.port_label,
            channel: frame.channel,
            radio_mode: frame.radio_mode,
        };
        let Ok((header, body)) = capture_record::build_record(&decoded, &ctx, anchor_us) else {
            return;
        };

        if self.crypto_config.save_packets && is_key_frame {
            self.key_packets.push(KeyPacketRecord {
                interface: frame.port_label.clone(),
                channel: frame.channel,
                mode: frame.radio_mode,
                packet: decoded.payload.clone(),
            });
        }

        self.write_to_files(frame.device_id, &header, &body);
        self.write_to_pipes(frame.device_id, &header, &body);
    }

    fn write_to_files(&mut self, device_id: usize, header: &[u8; 16], body: &[u8]) {
        for log in &mut self.log_files {
            if log.device_id.is_none() || log.device_id == Some(device_id) {
                let _ = log.file.write_all(header);
                let _ = log.file.write_all(body);
            }
        }
    }

    fn write_to_pipes(&self, device_id: usize, header: &[u8; 16], body: &[u8]) {
        for (target, queue) in &self.pipe_targets {
            if target.is_none() || *target == Some(device_id) {
                queue.push(PipeItem { header: *header, body: body.to_vec() });
            }
        }
    }

    /// Check elapsed time against `reset_period` and reopen with a fresh
    /// timestamped name when due (spec §4.F item 6, grounded on
    /// `recreate_log_files`).
    fn maybe_rotate(&mut self) {
        let Some(period) = self.reset_period.duration() else {
            return;
        };
        let Some(last) = self.last_rotation else {
            return;
        };
        if last.elapsed() < period {
            return;
        }
        for log in self.log_files.drain(..).collect::<Vec<_>>() {
            if let Ok(reopened) = open_log_file(
                log.dir.to_string_lossy().as_ref(),
                &log.base_name,
                self.reset_period,
                log.device_id,
            ) {
                self.log_files.push(reopened);
            }
        }
        self.last_rotation = Some(Instant::now());
    }

    /// Persist learned keys and any buffered key-packet capture, matching
    /// `OutputManager::run`'s shutdown tail.
    fn shutdown(&mut self) {
        for log in &mut self.log_files {
            let _ = log.file.flush();
        }

        if self.crypto_config.save_keys {
            let total = self.crypto.keys.link_keys.len() + self.crypto.keys.nwk_keys.len();
            if total > 1 {
                let path = format!("{}.txt", self.crypto_config.keys_path);
                let _ = std::fs::write(path, self.crypto.keys.to_text());
            }
        }

        if self.crypto_config.save_packets && !self.key_packets.is_empty() {
            let path = PathBuf::from(&self.crypto_config.packets_path);
            let _ = simulation::save(&path, &self.key_packets);
        }
    }
}
