//! Black-box scenario 5 (spec §8): a Transport-Key APS command secured by
//! the well-known public link key is learned, then a subsequent NWK-secured
//! data frame decrypts using that newly learned key — driven entirely
//! through `CryptoEngine::process_frame`, the MAC -> NWK -> APS walk.

use tuxniffer::crypto::ccm::ccm_star_encrypt;
use tuxniffer::crypto::hmac_mmo::hmac_mmo;
use tuxniffer::crypto::CryptoEngine;
use tuxniffer::key_store::PUBLIC_LINK_KEY;
use tuxniffer::payload_parser;

/// `security control(1) + counter(4) + src addr(8) [+ key seq(1) for nwk]`,
/// plus the nonce pulled out of it (padded past the header's 15-byte floor
/// purely to extract the nonce, same technique as `crypto::engine`'s tests).
fn aux_header_and_nonce(is_nwk_layer: bool, key_id_byte: u8, counter: [u8; 4], src_addr: [u8; 8]) -> (Vec<u8>, [u8; 13]) {
    let mut aux = vec![key_id_byte];
    aux.extend_from_slice(&counter);
    aux.extend_from_slice(&src_addr);
    if is_nwk_layer {
        aux.push(0x00); // key sequence number
    }
    let mut probe = aux.clone();
    while probe.len() < 15 {
        probe.push(0x00);
    }
    let parsed = payload_parser::aux_security_header(&probe, is_nwk_layer).unwrap();
    (aux, parsed.nonce)
}

/// Aux-header inputs that always travel together when building a secured
/// layer: which key slot secured it, the frame counter, and the source
/// address woven into the nonce.
struct AuxHeaderInputs {
    key_id_byte: u8,
    counter: [u8; 4],
    src_addr: [u8; 8],
}

/// Encrypts `plaintext` into a full `aux_header || ciphertext || tag` layer,
/// restoring `level` into both the authentication header and the nonce
/// before encrypting (mirroring `CryptoEngine::attempt_decrypt`).
fn build_secured_layer(
    key: &[u8; 16],
    header_prefix: &[u8],
    is_nwk_layer: bool,
    aux: AuxHeaderInputs,
    level: i32,
    m: usize,
    plaintext: &[u8],
) -> Vec<u8> {
    let (aux, nonce) = aux_header_and_nonce(is_nwk_layer, aux.key_id_byte, aux.counter, aux.src_addr);

    let mut header = header_prefix.to_vec();
    header.extend_from_slice(&aux);
    let sec_index = header_prefix.len();
    header[sec_index] = header[sec_index].wrapping_add(level as u8);

    let mut nonce = nonce;
    nonce[12] = nonce[12].wrapping_add(level as u8);

    let (ciphertext, tag) = ccm_star_encrypt(key, plaintext, &header, &nonce, m);

    let mut layer = aux;
    layer.extend_from_slice(&ciphertext);
    layer.extend_from_slice(&tag);
    layer
}

const LEVEL: i32 = 6; // M=8
const M: usize = 8;

#[test]
fn transport_key_is_learned_then_decrypts_a_subsequent_nwk_frame() {
    let mut engine = CryptoEngine::new(-1);

    // --- Frame 1: unsecured NWK, APS Transport-Key command secured by the
    // well-known public link key.
    let aps_header = [0b0010_0001u8, 0x00]; // command, security_enabled, counter=0
    let new_nwk_key = [0x42u8; 16];
    let mut transport_key_cmd = vec![0x05u8, 0x01]; // Transport-Key, network-key selector
    transport_key_cmd.extend_from_slice(&new_nwk_key);

    let trial_key = hmac_mmo(&PUBLIC_LINK_KEY, &[0x00]); // APS key_id=2 hash prefix
    let aps_layer = build_secured_layer(
        &trial_key,
        &aps_header,
        false,
        AuxHeaderInputs {
            key_id_byte: 0b0001_0000, // key_id = 2 (APS, hash prefix 0x00)
            counter: [0, 0, 0, 1],
            src_addr: [9, 8, 7, 6, 5, 4, 3, 2],
        },
        LEVEL,
        M,
        &transport_key_cmd,
    );

    let nwk_header1 = [0x00u8, 0x00, 0, 0, 0, 0, 0, 0]; // security_enabled = false
    let mut nwk_payload1 = aps_header.to_vec();
    nwk_payload1.extend_from_slice(&aps_layer);

    let mut mac_payload1 = vec![0x01u8, 0x00, 0x00]; // data frame, no addressing, seq=0
    mac_payload1.extend_from_slice(&nwk_header1);
    mac_payload1.extend_from_slice(&nwk_payload1);
    mac_payload1.extend_from_slice(&[0x00, 0x00]); // MAC FCS, discarded

    assert!(engine.keys.nwk_keys.is_empty());
    let decrypted1 = engine.process_frame(&mac_payload1);
    assert_eq!(decrypted1.as_deref(), Some(transport_key_cmd.as_slice()));
    assert_eq!(engine.keys.nwk_keys, vec![new_nwk_key]);
    assert_eq!(engine.security_level, LEVEL);

    // --- Frame 2: NWK-secured with the just-learned key, wrapping an
    // APS-secured (link key) application payload.
    let aps_header2 = [0b0010_0001u8, 0x01];
    let app_payload = b"plain app data";
    let aps_layer2 = build_secured_layer(
        &trial_key,
        &aps_header2,
        false,
        AuxHeaderInputs {
            key_id_byte: 0b0001_0000,
            counter: [0, 0, 0, 2],
            src_addr: [9, 8, 7, 6, 5, 4, 3, 2],
        },
        LEVEL,
        M,
        app_payload,
    );
    let mut nwk_plaintext = aps_header2.to_vec();
    nwk_plaintext.extend_from_slice(&aps_layer2);

    let nwk_header2 = [0x00u8, 0x02, 0, 0, 0, 0, 0, 0]; // security_enabled = true
    let nwk_layer2 = build_secured_layer(
        &new_nwk_key,
        &nwk_header2,
        true,
        AuxHeaderInputs {
            key_id_byte: 0b0000_1000, // key_id = 1 (NWK)
            counter: [0, 0, 0, 1],
            src_addr: [1, 2, 3, 4, 5, 6, 7, 8],
        },
        LEVEL,
        M,
        &nwk_plaintext,
    );

    let mut mac_payload2 = vec![0x01u8, 0x00, 0x01];
    mac_payload2.extend_from_slice(&nwk_header2);
    mac_payload2.extend_from_slice(&nwk_layer2);
    mac_payload2.extend_from_slice(&[0x00, 0x00]);

    let decrypted2 = engine.process_frame(&mac_payload2);
    assert_eq!(decrypted2.as_deref(), Some(app_payload.as_slice()));
}
