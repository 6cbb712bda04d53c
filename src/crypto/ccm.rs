//! CCM* authenticate-encrypt/decrypt (IEEE 802.15.4 security, NIST SP 800-38C
//! as profiled by Zigbee annex B). `nonce` is always 13 bytes in this crate's
//! usage, fixing `L = 2` (the counter-field length), so the flags byte's
//! `L - 1` field is the constant `1`.
//!
//! Spec note: `spec.md` writes the flags byte's length field as `15 - |nonce|`
//! but also states `L = 1` explicitly for a 13-byte nonce; `15 - 13 = 2`
//! contradicts that. The original C++ implementation (`crypto_handler.cpp`)
//! computes `14 - nonce.size()` (`= 1`), matching the standard CCM* encoding
//! of `L - 1` for `L = 2`, and carries its own inline "15 ou 14?" comment —
//! this was already an open question upstream. We follow `L = 1`, i.e. the
//! original's literal and the standard's encoding, recorded in DESIGN.md.

use super::aes_block::aes128_ecb_block;

const BLOCK_SIZE: usize = 16;

fn form_length_string(length: usize) -> Vec<u8> {
    if length == 0 {
        Vec::new()
    } else if length < (1 << 16) - (1 << 8) {
        vec![((length >> 8) & 0xFF) as u8, (length & 0xFF) as u8]
    } else {
        let mut l = vec![0xFF, 0xFE];
        l.extend_from_slice(&(length as u32).to_be_bytes());
        l
    }
}

fn pad_to_block_size(mut input: Vec<u8>) -> Vec<u8> {
    while !input.len().is_multiple_of(BLOCK_SIZE) {
        input.push(0);
    }
    input
}

fn flags_byte(additional_data_present: bool, m: usize) -> u8 {
    ((additional_data_present as u8) << 6) | ((((m - 2) / 2) as u8) << 3) | 1
}

/// CBC-MAC authentication tag, truncated to `m` bytes (`m` ∈ {4, 8, 16}).
fn authenticate(key: &[u8; 16], plaintext: &[u8], additional_data: &[u8], nonce: &[u8; 13], m: usize) -> Vec<u8> {
    let mut b0 = [0u8; BLOCK_SIZE];
    b0[0] = flags_byte(!additional_data.is_empty(), m);
    b0[1..14].copy_from_slice(nonce);
    let l = plaintext.len();
    b0[14] = ((l >> 8) & 0xFF) as u8;
    b0[15] = (l & 0xFF) as u8;

    let mut add_auth_data = if additional_data.is_empty() {
        Vec::new()
    } else {
        let mut d = form_length_string(additional_data.len());
        d.extend_from_slice(additional_data);
        d
    };
    add_auth_data = pad_to_block_size(add_auth_data);

    let plaintext_data = pad_to_block_size(plaintext.to_vec());

    let mut auth_data = add_auth_data;
    auth_data.extend_from_slice(&plaintext_data);

    let mut mac = aes128_ecb_block(key, &b0);
    for block in auth_data.chunks_exact(BLOCK_SIZE) {
        let mut xored = [0u8; BLOCK_SIZE];
        for i in 0..BLOCK_SIZE {
            xored[i] = mac[i] ^ block[i];
        }
        mac = aes128_ecb_block(key, &xored);
    }

    mac[..m].to_vec()
}

fn counter_block(nonce: &[u8; 13], counter: u16) -> [u8; 16] {
    let mut a = [0u8; BLOCK_SIZE];
    a[0] = 1;
    a[1..14].copy_from_slice(nonce);
    a[14..16].copy_from_slice(&counter.to_be_bytes());
    a
}

fn keystream_xor(key: &[u8; 16], nonce: &[u8; 13], data: &[u8]) -> Vec<u8> {
    let mut out = vec![0u8; data.len()];
    let mut s = [0u8; BLOCK_SIZE];
    for (i, (src, dst)) in data.iter().zip(out.iter_mut()).enumerate() {
        if i % BLOCK_SIZE == 0 {
            let counter = (i / BLOCK_SIZE) as u16 + 1;
            s = aes128_ecb_block(key, &counter_block(nonce, counter));
        }
        *dst = src ^ s[i % BLOCK_SIZE];
    }
    out
}

/// CCM* encrypt-then-authenticate. Returns `(ciphertext, auth_tag)`.
pub fn ccm_star_encrypt(
    key: &[u8; 16],
    plaintext: &[u8],
    additional_data: &[u8],
    nonce: &[u8; 13],
    m: usize,
) -> (Vec<u8>, Vec<u8>) {
    let mut auth_tag = authenticate(key, plaintext, additional_data, nonce, m);

    let s0 = aes128_ecb_block(key, &counter_block(nonce, 0));
    for i in 0..m {
        auth_tag[i] ^= s0[i];
    }

    let ciphertext = keystream_xor(key, nonce, plaintext);
    (ciphertext, auth_tag)
}

/// CCM* decrypt-then-verify. Returns `Some(plaintext)` only if the recomputed
/// tag matches; `additional_data` must already carry the true restored
/// security level (spec §4.I "Decryption attempt policy").
pub fn ccm_star_decrypt(
    key: &[u8; 16],
    ciphertext: &[u8],
    additional_data: &[u8],
    nonce: &[u8; 13],
    auth_tag: &[u8],
    m: usize,
) -> Option<Vec<u8>> {
    let s0 = aes128_ecb_block(key, &counter_block(nonce, 0));
    let tag: Vec<u8> = auth_tag.iter().zip(s0.iter()).map(|(a, s)| a ^ s).collect();

    let plaintext = keystream_xor(key, nonce, ciphertext);

    let expected = authenticate(key, &plaintext, additional_data, nonce, m);
    if expected == tag {
        Some(plaintext)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nonce_fixture() -> [u8; 13] {
        let mut n = [0u8; 13];
        for (i, b) in n.iter_mut().enumerate() {
            *b = i as u8;
        }
        n
    }

    #[test]
    fn round_trips_for_each_tag_size() {
        let key = [0x5Au8; 16];
        let nonce = nonce_fixture();
        let plaintext = b"zigbee transport key payload...";
        let aad = b"header-bytes";

        for &m in &[4usize, 8, 16] {
            let (ciphertext, tag) = ccm_star_encrypt(&key, plaintext, aad, &nonce, m);
            let recovered = ccm_star_decrypt(&key, &ciphertext, aad, &nonce, &tag, m);
            assert_eq!(recovered.as_deref(), Some(plaintext.as_slice()));
        }
    }

    #[test]
    fn bit_flip_in_ciphertext_fails_verification() {
        let key = [0x11u8; 16];
        let nonce = nonce_fixture();
        let plaintext = b"0123456789abcdef";
        let (mut ciphertext, tag) = ccm_star_encrypt(&key, plaintext, &[], &nonce, 8);
        ciphertext[0] ^= 0x01;
        assert!(ccm_star_decrypt(&key, &ciphertext, &[], &nonce, &tag, 8).is_none());
    }

    #[test]
    fn bit_flip_in_aad_fails_verification() {
        let key = [0x11u8; 16];
        let nonce = nonce_fixture();
        let plaintext = b"0123456789abcdef";
        let aad = b"aad-bytes";
        let (ciphertext, tag) = ccm_star_encrypt(&key, plaintext, aad, &nonce, 4);
        let mut bad_aad = aad.to_vec();
        bad_aad[0] ^= 0x01;
        assert!(ccm_star_decrypt(&key, &ciphertext, &bad_aad, &nonce, &tag, 4).is_none());
    }

    #[test]
    fn empty_plaintext_round_trips() {
        let key = [0x33u8; 16];
        let nonce = nonce_fixture();
        let (ciphertext, tag) = ccm_star_encrypt(&key, &[], &[1, 2, 3], &nonce, 4);
        assert!(ciphertext.is_empty());
        assert_eq!(
            ccm_star_decrypt(&key, &ciphertext, &[1, 2, 3], &nonce, &tag, 4),
            Some(Vec::new())
        );
    }
}
