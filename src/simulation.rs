//! Key-packet binary persistence (spec §6 "Persisted state": concatenation of
//! `{u32 interface_len, bytes, u16 channel, u8 mode, u32 packet_len, bytes}`
//! records) and the simulation-mode loader that replays them.
//!
//! Grounded on `OutputManager::saveKeyPackets`/`loadAndSimulateKeyPackets`.

use std::io::{Read, Write};
use std::path::Path;

/// One persisted Transport-Key capture: enough to rebuild a `CapturedFrame`
/// and replay it through the crypto engine / pcap builder without a live
/// device attached.
pub struct KeyPacketRecord {
    pub interface: String,
    pub channel: u16,
    pub mode: u8,
    pub packet: Vec<u8>,
}

pub fn save(path: &Path, records: &[KeyPacketRecord]) -> std::io::Result<()> {
    let mut file = std::fs::File::create(path)?;
    for record in records {
        let interface_bytes = record.interface.as_bytes();
        file.write_all(&(interface_bytes.len() as u32).to_ne_bytes())?;
        file.write_all(interface_bytes)?;
        file.write_all(&record.channel.to_ne_bytes())?;
        file.write_all(&[record.mode])?;
        file.write_all(&(record.packet.len() as u32).to_ne_bytes())?;
        file.write_all(&record.packet)?;
    }
    Ok(())
}

/// Returns an empty vec if the file is absent or empty; a truncated trailing
/// record is dropped rather than treated as a hard error, matching the
/// original's best-effort `try`/`catch` around a partial read.
pub fn load(path: &Path) -> std::io::Result<Vec<KeyPacketRecord>> {
    let mut file = match std::fs::File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut records = Vec::new();
    loop {
        let mut len_buf = [0u8; 4];
        if file.read_exact(&mut len_buf).is_err() {
            break;
        }
        let interface_len = u32::from_ne_bytes(len_buf) as usize;

        let mut interface_buf = vec![0u8; interface_len];
        if file.read_exact(&mut interface_buf).is_err() {
            break;
        }
        let Ok(interface) = String::from_utf8(interface_buf) else {
            break;
        };

        let mut channel_buf = [0u8; 2];
        if file.read_exact(&mut channel_buf).is_err() {
            break;
        }
        let channel = u16::from_ne_bytes(channel_buf);

        let mut mode_buf = [0u8; 1];
        if file.read_exact(&mut mode_buf).is_err() {
            break;
        }
        let mode = mode_buf[0];

        if file.read_exact(&mut len_buf).is_err() {
            break;
        }
        let packet_len = u32::from_ne_bytes(len_buf) as usize;
        let mut packet = vec![0u8; packet_len];
        if file.read_exact(&mut packet).is_err() {
            break;
        }

        records.push(KeyPacketRecord { interface, channel, mode, packet });
    }

    Ok(records)
}
