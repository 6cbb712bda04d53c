//! Walks MAC -> NWK -> APS headers, yielding offset, security-enabled flag,
//! and nonce material for the Crypto Engine (spec §4.H).
//!
//! Reference: CSA Zigbee specification 05-3474-23 (IEEE 802.15.4 addressing
//! per annex G.3.1; NWK/APS headers per section 3.3.1 / 2.2.5.1; auxiliary
//! security header per sections 4.3-4.5).

use modular_bitfield::prelude::*;

#[bitfield(bits = 16)]
#[derive(Debug, Clone, Copy)]
pub struct MacFrameControl {
    pub frame_type: B3,
    pub security_enabled: bool,
    pub frame_pending: bool,
    pub ack_request: bool,
    pub pan_id_compression: bool,
    pub reserved1: bool,
    pub reserved2: B2,
    pub dest_addressing_mode: B2,
    pub reserved3: B2,
    pub src_addressing_mode: B2,
}

#[bitfield(bits = 16)]
#[derive(Debug, Clone, Copy)]
pub struct NwkFrameControl {
    pub frame_type: B2,
    pub protocol_version: B4,
    pub discover_route: B2,
    pub multicast: bool,
    pub security_enabled: bool,
    pub source_route: bool,
    pub destination_ieee_addr: bool,
    pub source_ieee_addr: bool,
    pub reserved: B3,
}

#[bitfield(bits = 8)]
#[derive(Debug, Clone, Copy)]
pub struct ApsFrameControl {
    pub frame_type: B2,
    pub delivery_mode: B2,
    pub ack_format: bool,
    pub security_enabled: bool,
    pub ack_request: bool,
    pub extended_header: bool,
}

#[bitfield(bits = 8)]
#[derive(Debug, Clone, Copy)]
pub struct AuxSecurityControl {
    pub security_level: B3,
    pub key_id: B2,
    pub extended_nonce: bool,
    pub reserved: B2,
}

const MAC_FRAME_TYPE_DATA: u8 = 0x01;
const NWK_FRAME_TYPE_DATA: u8 = 0b00;
const APS_FRAME_TYPE_COMMAND: u8 = 0x01;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    NotDataFrame,
    NotCommandFrame,
    TooShort,
    ExtendedHeaderUnsupported,
    UnsupportedKeyId(u8),
}

/// IEEE 802.15.4 MAC addressing walk. `payload[0]` is the frame-control low
/// byte, `payload[1]` the high byte (as received on the wire). Returns the
/// byte offset of the Zigbee NWK layer and whether MAC-layer security is
/// enabled.
pub fn mac_header(payload: &[u8]) -> Result<(usize, bool), ParseError> {
    if payload.len() < 3 {
        return Err(ParseError::TooShort);
    }
    let fc = MacFrameControl::from_bytes([payload[0], payload[1]]);
    if fc.frame_type() != MAC_FRAME_TYPE_DATA {
        return Err(ParseError::NotDataFrame);
    }

    let mut offset = 3; // frame control (2) + sequence number (1)
    let dest_mode = fc.dest_addressing_mode();
    let src_mode = fc.src_addressing_mode();

    if dest_mode == 0x02 {
        offset += 2;
    } else if dest_mode == 0x03 {
        offset += 8;
    }

    if dest_mode != 0x00 {
        offset += 2; // destination PAN id
    }
    if !fc.pan_id_compression() && src_mode != 0x00 {
        offset += 2; // source PAN id
    }

    if src_mode == 0x02 {
        offset += 2;
    } else if src_mode == 0x03 {
        offset += 8;
    }

    Ok((offset, fc.security_enabled()))
}

/// NWK header walk. `frame` starts at the NWK frame control field.
pub fn nwk_header(frame: &[u8]) -> Result<(usize, bool), ParseError> {
    if frame.len() < 2 {
        return Err(ParseError::TooShort);
    }
    let fc = NwkFrameControl::from_bytes([frame[0], frame[1]]);
    if fc.frame_type() != NWK_FRAME_TYPE_DATA {
        return Err(ParseError::NotDataFrame);
    }

    // frame control (2) + dest (2) + src (2) + radius (1) + seq (1)
    let mut offset = 2 + 2 + 2 + 1 + 1;
    if frame.len() < offset {
        return Err(ParseError::TooShort);
    }

    if fc.destination_ieee_addr() {
        offset += 8;
        if frame.len() < offset {
            return Err(ParseError::TooShort);
        }
    }
    if fc.source_ieee_addr() {
        offset += 8;
        if frame.len() < offset {
            return Err(ParseError::TooShort);
        }
    }
    if fc.source_route() {
        if frame.len() < offset + 2 {
            return Err(ParseError::TooShort);
        }
        let relay_count = frame[offset] as usize;
        offset += 2;
        let relay_list_bytes = relay_count * 2;
        if frame.len() < offset + relay_list_bytes {
            return Err(ParseError::TooShort);
        }
        offset += relay_list_bytes;
    }

    Ok((offset, fc.security_enabled()))
}

/// APS header walk. Only the non-extended header forms are supported.
pub fn aps_header(frame: &[u8]) -> Result<(usize, bool), ParseError> {
    if frame.is_empty() {
        return Err(ParseError::TooShort);
    }
    let fc = ApsFrameControl::from_bytes([frame[0]]);
    if fc.frame_type() != APS_FRAME_TYPE_COMMAND {
        return Err(ParseError::NotCommandFrame);
    }
    if fc.extended_header() {
        return Err(ParseError::ExtendedHeaderUnsupported);
    }

    let mut offset = 0usize;
    if fc.ack_format() {
        offset += 1; // source endpoint
        match fc.delivery_mode() {
            0x00 | 0x02 => offset += 1, // destination endpoint
            0x03 => offset += 2,        // group address
            _ => {}
        }
    }
    offset += 2; // frame control + counter

    if frame.len() < offset {
        return Err(ParseError::TooShort);
    }

    Ok((offset, fc.security_enabled()))
}

pub struct AuxSecurityHeader {
    pub nonce: [u8; 13],
    pub header_len: usize,
    /// `0x00` for key-id 2, `0x02` for key-id 3 (APS only).
    pub hash_msg_prefix: Option<u8>,
}

/// Given a zigbee-layer payload beginning with a 1-byte security control,
/// extract the nonce and (for APS) the HMAC-MMO hash prefix byte (spec
/// §4.H "Auxiliary security header extraction").
pub fn aux_security_header(frame: &[u8], is_nwk_layer: bool) -> Result<AuxSecurityHeader, ParseError> {
    if frame.len() < 15 {
        return Err(ParseError::TooShort);
    }

    let mut offset = 13;
    let sc = AuxSecurityControl::from_bytes([frame[0]]);

    let mut nonce = [0u8; 13];
    nonce[..8].copy_from_slice(&frame[5..13]); // source address
    nonce[8..12].copy_from_slice(&frame[1..5]); // frame counter
    nonce[12] = frame[0]; // security control

    let hash_msg_prefix = if is_nwk_layer {
        if sc.key_id() != 0x01 {
            return Err(ParseError::UnsupportedKeyId(sc.key_id()));
        }
        offset += 1; // key sequence number
        None
    } else {
        match sc.key_id() {
            0x02 => Some(0x00),
            0x03 => Some(0x02),
            other => return Err(ParseError::UnsupportedKeyId(other)),
        }
    };

    Ok(AuxSecurityHeader {
        nonce,
        header_len: offset,
        hash_msg_prefix,
    })
}
