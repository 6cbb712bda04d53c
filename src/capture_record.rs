//! Global pcap header and per-frame record synthesis (spec §4.E), matching
//! the vendor's TI Packet Sniffer 2 wireshark dissector layout byte-for-byte:
//! global header, then per record an IPv4 stub, a UDP stub, a TI vendor
//! preamble, and the IEEE 802.15.4 frame metadata + payload.

use crate::error::FrameError;
use crate::frame_codec::{FrameCodec, FrameState};
use crate::radio_mode;

/// GMT-to-local correction baked into the global header (spec's `TIMEZONE`).
pub const TIMEZONE_SECONDS: i32 = -10800;

const IPV4_TEMPLATE: [u8; 20] = [
    0x45, 0x00, 0x00, 0x5B, 0x00, 0x00, 0x00, 0x00, 0x80, 0x11, 0xB7, 0x3B, 0xC0, 0xA8, 0x01, 0x03,
    0xC0, 0xA8, 0x01, 0x03,
];
const UDP_TEMPLATE: [u8; 8] = [0x45, 0x60, 0x45, 0x60, 0x00, 0x47, 0x1D, 0x82];
const TI_TEMPLATE: [u8; 4] = [0x00, 0x3C, 0x00, 0x00];

/// `ipv4(20) + udp(8) + ti(4) + protocol(1) + interface(2) + phy(1) + freq(4)
/// + channel(2) + rssi(1) + fcs(1)`.
pub const FIXED_OVERHEAD: u32 = 44;

/// Build the 24-byte global pcap header (spec §4.E).
pub fn global_header() -> [u8; 24] {
    let mut header = [0u8; 24];
    header[0..4].copy_from_slice(&0xA1B2C3D4u32.to_ne_bytes());
    header[4..6].copy_from_slice(&2u16.to_ne_bytes());
    header[6..8].copy_from_slice(&4u16.to_ne_bytes());
    header[8..12].copy_from_slice(&TIMEZONE_SECONDS.to_ne_bytes());
    header[12..16].copy_from_slice(&0u32.to_ne_bytes()); // sigfigs
    header[16..20].copy_from_slice(&65535u32.to_ne_bytes()); // snaplen
    header[20..24].copy_from_slice(&228u32.to_ne_bytes()); // network (DLT_IEEE802_15_4_TAP-adjacent vendor type)
    header
}

/// The device-side view of a stream frame's body, parsed from bytes between
/// the info byte and the outer FCS (spec §4.E "Per-record construction").
pub struct DecodedPacket {
    pub device_timestamp_us: u64,
    pub rssi: u8,
    pub payload: Vec<u8>,
    pub fcs: u8,
}

/// Parse `body = [length(2 LE), device_timestamp(6 LE), payload…, rssi, fcs]`,
/// the bytes of a `0xC0` stream frame's data section.
pub fn decode_stream_body(body: &[u8]) -> Result<DecodedPacket, FrameError> {
    if body.len() < 9 {
        return Err(FrameError::UnexpectedResponse(0xC0));
    }
    let declared_len = u16::from_le_bytes([body[0], body[1]]) as usize;
    let mut ts = [0u8; 8];
    ts[..6].copy_from_slice(&body[2..8]);
    let device_timestamp_us = u64::from_le_bytes(ts);

    let payload_length = declared_len.saturating_sub(9);
    if body.len() < 8 + payload_length + 2 {
        return Err(FrameError::UnexpectedResponse(0xC0));
    }
    let payload = body[8..8 + payload_length].to_vec();
    let rssi = body[8 + payload_length];
    let fcs = body[8 + payload_length + 1];

    Ok(DecodedPacket {
        device_timestamp_us,
        rssi,
        payload,
        fcs,
    })
}

/// Re-run a `CapturedFrame::raw_frame` (the full SOF..EOF bytes) through a
/// fresh codec to recover its stream-data body, then decode that body.
pub fn decode_raw_frame(raw: &[u8]) -> Result<DecodedPacket, FrameError> {
    let mut codec = FrameCodec::new();
    let mut last = FrameState::Bof1;
    for &byte in raw {
        last = codec.feed(byte);
        if last == FrameState::Success {
            break;
        }
    }
    if last != FrameState::Success {
        return Err(FrameError::UnexpectedResponse(0));
    }
    decode_stream_body(codec.payload())
}

/// Per-device context needed to synthesize a record (spec §4.E items 4-8).
pub struct RecordContext<'a> {
    pub port_label: &'a str,
    pub channel: u16,
    pub radio_mode: u8,
}

/// The trailing run of digits in `port_label`, non-digits stripped; empty → 0
/// (spec §9 GLOSSARY "Interface number").
pub fn interface_number(port_label: &str) -> u16 {
    let digits: String = port_label.chars().filter(|c| c.is_ascii_digit()).collect();
    digits.parse().unwrap_or(0)
}

/// Build `(record_header, record_body)` for one decoded packet, given the
/// frozen `system_anchor` (spec §4.F).
pub fn build_record(
    packet: &DecodedPacket,
    ctx: &RecordContext,
    system_anchor_us: i64,
) -> Result<([u8; 16], Vec<u8>), FrameError> {
    let total_us = system_anchor_us + packet.device_timestamp_us as i64;
    let ts_sec = (total_us.div_euclid(1_000_000)) as u32;
    let ts_usec = (total_us.rem_euclid(1_000_000)) as u32;

    let payload_length = packet.payload.len() as u32;
    let total_length = FIXED_OVERHEAD + payload_length;

    let mut record_header = [0u8; 16];
    record_header[0..4].copy_from_slice(&ts_sec.to_ne_bytes());
    record_header[4..8].copy_from_slice(&ts_usec.to_ne_bytes());
    record_header[8..12].copy_from_slice(&total_length.to_ne_bytes());
    record_header[12..16].copy_from_slice(&total_length.to_ne_bytes());

    let mut ip = IPV4_TEMPLATE;
    ip[2] = (total_length >> 8) as u8;
    ip[3] = (total_length & 0xFF) as u8;

    let mut udp = UDP_TEMPLATE;
    let udp_length = total_length - 20;
    udp[4] = (udp_length >> 8) as u8;
    udp[5] = (udp_length & 0xFF) as u8;

    let freq_mhz = radio_mode::final_frequency_mhz(ctx.radio_mode, ctx.channel as i32)?;
    let packed_freq = radio_mode::pack_frequency(freq_mhz);

    let mut body = Vec::with_capacity(total_length as usize);
    body.extend_from_slice(&ip);
    body.extend_from_slice(&udp);
    body.extend_from_slice(&TI_TEMPLATE);
    body.push(radio_mode::protocol_tag(ctx.radio_mode));
    body.extend_from_slice(&interface_number(ctx.port_label).to_be_bytes());
    body.push(radio_mode::phy_type_tag(ctx.radio_mode));
    body.extend_from_slice(&packed_freq);
    body.extend_from_slice(&ctx.channel.to_le_bytes());
    body.push(packet.rssi);
    body.push(packet.fcs);
    body.extend_from_slice(&packet.payload);

    Ok((record_header, body))
}
