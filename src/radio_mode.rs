//! Maps `(firmware-id, radio-mode)` to `(PHY id, base frequency, channel
//! formula, protocol tag, PHY-type tag)` (spec §4.B).
//!
//! Open questions preserved verbatim per spec §9(a)/(b): several table
//! entries carry "TODO: verify" in the upstream source and are transcribed
//! without re-derivation; `0xFF` sentinels for "maybe present, TI docs might
//! be wrong" firmwares are kept as-is.

use crate::error::FrameError;

pub const UNSUPPORTED: u8 = 0xFF;

pub const PROTOCOL_GENERIC: u8 = 0;
pub const PROTOCOL_IEEE_802_15_4_G: u8 = 1;
pub const PROTOCOL_IEEE_802_15_4: u8 = 2;
pub const PROTOCOL_BLE: u8 = 3;
pub const PROTOCOL_WBMS: u8 = 4;

pub const PHY_TYPE_UNUSED: u8 = 0;
pub const PHY_TYPE_50KBPS_GFSK: u8 = 1;
pub const PHY_TYPE_SLR: u8 = 2;
pub const PHY_TYPE_OQPSK: u8 = 3;
pub const PHY_TYPE_200KBPS_GFSK: u8 = 4;
pub const PHY_TYPE_BLE: u8 = 5;
pub const PHY_TYPE_WBMS: u8 = 6;
pub const PHY_TYPE_50KBPS_GFSK_WISUN_1A: u8 = 7;
pub const PHY_TYPE_50KBPS_GFSK_WISUN_1B: u8 = 8;
pub const PHY_TYPE_100KBPS_GFSK_WISUN_2A: u8 = 9;
pub const PHY_TYPE_100KBPS_GFSK_WISUN_2B: u8 = 10;
pub const PHY_TYPE_150KBPS_GFSK_WISUN_3: u8 = 11;
pub const PHY_TYPE_200KBPS_GFSK_WISUN_4A: u8 = 12;
pub const PHY_TYPE_200KBPS_GFSK_WISUN_4B: u8 = 13;
// "maybe present, TI docs might be wrong on several firmwares" (spec §9b).
pub const PHY_TYPE_100KBPS_GFSK_ZIGBEE_R23: u8 = 14;
pub const PHY_TYPE_500KBPS_GFSK_ZIGBEE_R23: u8 = 15;

pub const RADIO_MODE_COUNT: usize = 22;
pub const FIRMWARE_ROW_COUNT: usize = 6;

/// Supported firmware ids, as returned in the ping response board-info.
pub const FW_TABLE: [u8; 7] = [0x0, 0x20, 0x21, 0x22, 0x30, 0x40, 0x50];
/// `FW_TABLE[i]` uses firmware row `FW_TO_ROW_TABLE[i]`.
pub const FW_TO_ROW_TABLE: [u8; 7] = [3, 5, 4, 4, 2, 1, 0];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RadioModeEntry {
    pub phy_id: u8,
    pub base_freq_mhz: f32,
}

const U: RadioModeEntry = RadioModeEntry {
    phy_id: UNSUPPORTED,
    base_freq_mhz: 0.0,
};

const F433: f32 = 433.0;
const F868: f32 = 868.0;
const F915: f32 = 915.0;
const F2405: f32 = 2405.0;

/// `RADIO_MODE_TABLE[firmware_row][radio_mode]`.
pub const RADIO_MODE_TABLE: [[RadioModeEntry; RADIO_MODE_COUNT]; FIRMWARE_ROW_COUNT] = [
    // Row 0: LP-CC1352PX
    [
        RadioModeEntry { phy_id: 0x00, base_freq_mhz: F868 },
        RadioModeEntry { phy_id: 0x00, base_freq_mhz: F915 },
        RadioModeEntry { phy_id: 0x01, base_freq_mhz: F433 },
        RadioModeEntry { phy_id: 0x02, base_freq_mhz: F868 },
        RadioModeEntry { phy_id: 0x02, base_freq_mhz: F915 },
        RadioModeEntry { phy_id: 0x03, base_freq_mhz: F433 },
        RadioModeEntry { phy_id: 0x04, base_freq_mhz: F868 },
        RadioModeEntry { phy_id: 0x05, base_freq_mhz: F915 },
        RadioModeEntry { phy_id: 0x06, base_freq_mhz: F868 },
        RadioModeEntry { phy_id: 0x07, base_freq_mhz: F915 },
        RadioModeEntry { phy_id: 0x08, base_freq_mhz: F868 },
        RadioModeEntry { phy_id: 0x09, base_freq_mhz: F915 },
        RadioModeEntry { phy_id: 0x0A, base_freq_mhz: F915 },
        RadioModeEntry { phy_id: 0x0B, base_freq_mhz: F868 },
        RadioModeEntry { phy_id: 0x0C, base_freq_mhz: F868 },
        RadioModeEntry { phy_id: 0x0D, base_freq_mhz: F915 },
        RadioModeEntry { phy_id: 0x0E, base_freq_mhz: F868 },
        RadioModeEntry { phy_id: 0x0F, base_freq_mhz: F433 },
        RadioModeEntry { phy_id: 0x10, base_freq_mhz: F868 },
        RadioModeEntry { phy_id: 0x11, base_freq_mhz: F433 },
        RadioModeEntry { phy_id: 0x12, base_freq_mhz: F2405 },
        RadioModeEntry { phy_id: 0x13, base_freq_mhz: F2405 },
    ],
    // Row 1: LP-CC1312R1
    [
        RadioModeEntry { phy_id: 0x00, base_freq_mhz: F868 },
        RadioModeEntry { phy_id: 0x00, base_freq_mhz: F915 },
        U,
        RadioModeEntry { phy_id: 0x01, base_freq_mhz: F868 },
        RadioModeEntry { phy_id: 0x01, base_freq_mhz: F915 },
        U,
        RadioModeEntry { phy_id: 0x02, base_freq_mhz: F868 },
        RadioModeEntry { phy_id: 0x03, base_freq_mhz: F915 },
        RadioModeEntry { phy_id: 0x04, base_freq_mhz: F868 },
        RadioModeEntry { phy_id: 0x05, base_freq_mhz: F915 },
        RadioModeEntry { phy_id: 0x06, base_freq_mhz: F868 },
        RadioModeEntry { phy_id: 0x07, base_freq_mhz: F915 },
        RadioModeEntry { phy_id: 0x08, base_freq_mhz: F915 },
        RadioModeEntry { phy_id: 0x09, base_freq_mhz: F868 },
        RadioModeEntry { phy_id: 0x0A, base_freq_mhz: F868 },
        U, // Maybe present, TI docs might be wrong
        RadioModeEntry { phy_id: 0x0B, base_freq_mhz: F868 },
        U,
        RadioModeEntry { phy_id: 0x0C, base_freq_mhz: F868 },
        U,
        U,
        U,
    ],
    // Row 2: LP-CC1352R1
    [
        RadioModeEntry { phy_id: 0x00, base_freq_mhz: F868 },
        RadioModeEntry { phy_id: 0x00, base_freq_mhz: F915 },
        U,
        RadioModeEntry { phy_id: 0x01, base_freq_mhz: F868 },
        RadioModeEntry { phy_id: 0x01, base_freq_mhz: F915 },
        U,
        RadioModeEntry { phy_id: 0x02, base_freq_mhz: F868 },
        RadioModeEntry { phy_id: 0x03, base_freq_mhz: F915 },
        RadioModeEntry { phy_id: 0x04, base_freq_mhz: F868 },
        RadioModeEntry { phy_id: 0x05, base_freq_mhz: F915 },
        RadioModeEntry { phy_id: 0x06, base_freq_mhz: F868 },
        RadioModeEntry { phy_id: 0x07, base_freq_mhz: F915 },
        RadioModeEntry { phy_id: 0x08, base_freq_mhz: F915 },
        RadioModeEntry { phy_id: 0x09, base_freq_mhz: F868 },
        RadioModeEntry { phy_id: 0x0A, base_freq_mhz: F868 },
        U, // Maybe present, TI docs might be wrong
        RadioModeEntry { phy_id: 0x0B, base_freq_mhz: F868 },
        U,
        RadioModeEntry { phy_id: 0x0C, base_freq_mhz: F868 },
        U,
        RadioModeEntry { phy_id: 0x0D, base_freq_mhz: F2405 },
        RadioModeEntry { phy_id: 0x0E, base_freq_mhz: F2405 },
    ],
    // Row 3: LP-CC1350/LP-CC1310
    [
        RadioModeEntry { phy_id: 0x00, base_freq_mhz: F868 },
        RadioModeEntry { phy_id: 0x00, base_freq_mhz: F915 },
        RadioModeEntry { phy_id: 0x01, base_freq_mhz: F433 },
        RadioModeEntry { phy_id: 0x04, base_freq_mhz: F868 }, // 0x02/0x03 not supported
        RadioModeEntry { phy_id: 0x04, base_freq_mhz: F915 },
        RadioModeEntry { phy_id: 0x05, base_freq_mhz: F433 },
        U,
        U,
        U,
        U,
        U,
        U,
        U,
        U,
        U,
        U, // Maybe present, TI docs might be wrong
        RadioModeEntry { phy_id: 0x06, base_freq_mhz: F868 },
        RadioModeEntry { phy_id: 0x07, base_freq_mhz: F433 },
        RadioModeEntry { phy_id: 0x09, base_freq_mhz: F868 }, // 0x08 not supported
        RadioModeEntry { phy_id: 0x0A, base_freq_mhz: F433 },
        U,
        U,
    ],
    // Row 4: LP-CC26X2R1 / LP-CC26X2RB
    [
        U, U, U, U, U, U, U, U, U, U, U, U, U, U, U, U, U, U, U, U,
        RadioModeEntry { phy_id: 0x00, base_freq_mhz: F2405 },
        RadioModeEntry { phy_id: 0x01, base_freq_mhz: F2405 },
    ],
    // Row 5: LP-CC2650
    [
        U, U, U, U, U, U, U, U, U, U, U, U, U, U, U, U, U, U, U, U,
        RadioModeEntry { phy_id: 0x00, base_freq_mhz: F2405 },
        U,
    ],
];

/// Resolve a firmware id (from the ping board-info) to its table row.
pub fn firmware_row(firmware_id: u8) -> Option<u8> {
    FW_TABLE
        .iter()
        .position(|&id| id == firmware_id)
        .map(|i| FW_TO_ROW_TABLE[i])
}

pub fn lookup(firmware_row: u8, radio_mode: u8) -> Option<RadioModeEntry> {
    let row = RADIO_MODE_TABLE.get(firmware_row as usize)?;
    let entry = *row.get(radio_mode as usize)?;
    if entry.phy_id == UNSUPPORTED {
        None
    } else {
        Some(entry)
    }
}

/// Protocol tag for `radio_mode`, per the TI wireshark dissector mapping.
/// TODO: only `PROTOCOL_IEEE_802_15_4` and `PROTOCOL_BLE` are tested upstream;
/// the rest are transcribed, not re-derived.
pub fn protocol_tag(radio_mode: u8) -> u8 {
    match radio_mode {
        0..=15 => PROTOCOL_IEEE_802_15_4_G,
        16..=19 => PROTOCOL_GENERIC,
        20 => PROTOCOL_IEEE_802_15_4,
        21 => PROTOCOL_BLE,
        _ => PROTOCOL_GENERIC,
    }
}

/// PHY-type tag for `radio_mode`.
/// TODO: only `PHY_TYPE_OQPSK` and `PHY_TYPE_BLE` are tested upstream.
pub fn phy_type_tag(radio_mode: u8) -> u8 {
    match radio_mode {
        0..=2 => PHY_TYPE_50KBPS_GFSK,
        3..=5 => PHY_TYPE_SLR,
        6 => PHY_TYPE_50KBPS_GFSK_WISUN_1A,
        7 => PHY_TYPE_50KBPS_GFSK_WISUN_1B,
        8 => PHY_TYPE_100KBPS_GFSK_WISUN_2A,
        9 => PHY_TYPE_100KBPS_GFSK_WISUN_2B,
        10 => PHY_TYPE_150KBPS_GFSK_WISUN_3,
        11 => PHY_TYPE_200KBPS_GFSK_WISUN_4A,
        12 => PHY_TYPE_200KBPS_GFSK_WISUN_4B,
        13 => PHY_TYPE_100KBPS_GFSK_ZIGBEE_R23,
        14 => PHY_TYPE_500KBPS_GFSK_ZIGBEE_R23,
        15 => PHY_TYPE_200KBPS_GFSK,
        16 | 17 => PHY_TYPE_50KBPS_GFSK,
        18 | 19 => PHY_TYPE_SLR,
        20 => PHY_TYPE_OQPSK,
        21 => PHY_TYPE_BLE,
        _ => PHY_TYPE_UNUSED,
    }
}

/// Apply the per-radio-mode channel formula (spec §4.A "Frequency packing").
/// Values taken from the vendor's SmartRF Packet Sniffer 2 channel tables.
pub fn final_frequency_mhz(radio_mode: u8, channel: i32) -> Result<f32, FrameError> {
    let freq = match radio_mode {
        0 if (0..=128).contains(&channel) => 902.2 + channel as f32 * 0.2,
        1 if (0..=33).contains(&channel) => 863.125 + channel as f32 * 0.2,
        2 if (0..=6).contains(&channel) => 433.3 + channel as f32 * 0.2,
        3 if (0..=128).contains(&channel) => 902.2 + channel as f32 * 0.2,
        4 if (0..=33).contains(&channel) => 863.125 + channel as f32 * 0.2,
        5 if (0..=6).contains(&channel) => 433.3 + channel as f32 * 0.2,
        6 if (0..=128).contains(&channel) => 863.1 + channel as f32 * 0.1,
        7 if (0..=128).contains(&channel) => 902.2 + channel as f32 * 0.2,
        8 if (0..=128).contains(&channel) => 863.1 + channel as f32 * 0.2,
        9 if (0..=128).contains(&channel) => 902.2 + channel as f32 * 0.2,
        10 if (0..=128).contains(&channel) => 863.1 + channel as f32 * 0.2,
        11 if (0..=128).contains(&channel) => 902.4 + channel as f32 * 0.4,
        12 if (0..=128).contains(&channel) => 920.8 + channel as f32 * 0.6,
        13 | 14 if (0..=128).contains(&channel) => 863.1 + channel as f32 * 0.2,
        15 if (0..=63).contains(&channel) => 902.4 + channel as f32 * 0.4,
        16 if channel == 0 => 863.125,
        17 if channel == 0 => 433.3,
        18 if channel == 0 => 863.125,
        19 if channel == 0 => 433.3,
        20 if (11..=26).contains(&channel) => 2405.0 + (channel - 11) as f32 * 5.0,
        21 if channel == 37 => 2402.0,
        21 if channel == 38 => 2426.0,
        21 if channel == 39 => 2480.0,
        _ => {
            return Err(FrameError::InvalidChannelForMode {
                mode: radio_mode,
                freq: 0.0,
            })
        }
    };
    Ok(freq)
}

/// Pack a frequency in MHz into the 4-byte little-endian
/// `[int_lo, int_hi, frac_lo, frac_hi]` wire form.
pub fn pack_frequency(freq_mhz: f32) -> [u8; 4] {
    let int_part = freq_mhz.trunc() as u32;
    let frac = ((freq_mhz - int_part as f32) * 65536.0).round() as u32;
    [
        (int_part & 0xFF) as u8,
        ((int_part >> 8) & 0xFF) as u8,
        (frac & 0xFF) as u8,
        ((frac >> 8) & 0xFF) as u8,
    ]
}

pub fn unpack_frequency(bytes: [u8; 4]) -> f32 {
    let int_part = (bytes[0] as u32) | ((bytes[1] as u32) << 8);
    let frac = (bytes[2] as u32) | ((bytes[3] as u32) << 8);
    int_part as f32 + (frac as f32 / 65536.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn firmware_row_maps_known_ids() {
        assert_eq!(firmware_row(0x0), Some(3));
        assert_eq!(firmware_row(0x50), Some(0));
        assert_eq!(firmware_row(0xEE), None);
    }

    #[test]
    fn unsupported_sentinel_is_rejected() {
        assert_eq!(lookup(1, 2), None); // row 1, mode 2 is 0xFF
    }

    #[test]
    fn mode_20_channel_20_is_2450_mhz() {
        let freq = final_frequency_mhz(20, 20).unwrap();
        assert!((freq - 2450.0).abs() < 0.001);
    }

    #[test]
    fn ble_advertising_channels() {
        assert_eq!(final_frequency_mhz(21, 37).unwrap(), 2402.0);
        assert_eq!(final_frequency_mhz(21, 38).unwrap(), 2426.0);
        assert_eq!(final_frequency_mhz(21, 39).unwrap(), 2480.0);
        assert!(final_frequency_mhz(21, 40).is_err());
    }

    #[test]
    fn pack_unpack_roundtrip() {
        for mode in 0..=21u8 {
            let max_channel = match mode {
                0 | 3 => 128,
                1 | 4 => 33,
                2 | 5 => 6,
                20 => 26,
                21 => 39,
                16..=19 => 0,
                _ => 128,
            };
            let min_channel = if mode == 20 { 11 } else if mode == 21 { 37 } else { 0 };
            if min_channel > max_channel {
                continue;
            }
            let ch = min_channel;
            if let Ok(freq) = final_frequency_mhz(mode, ch) {
                let packed = pack_frequency(freq);
                let unpacked = unpack_frequency(packed);
                assert!((unpacked - freq).abs() < 1.0 / 65536.0 + 0.0001);
            }
        }
    }

    #[test]
    fn mode_20_packed_frequency_matches_fixture() {
        // 2450 MHz -> 92 09 00 00 little-endian
        let packed = pack_frequency(final_frequency_mhz(20, 20).unwrap());
        assert_eq!(packed, [0x92, 0x09, 0x00, 0x00]);
    }
}
