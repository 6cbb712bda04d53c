//! Matyas-Meyer-Oseas hash over AES-128, per Zigbee annex B.4 of the CSA
//! Zigbee specification (05-3474-23).

use super::aes_block::aes128_ecb_block;

const BLOCK_SIZE: usize = 16;

/// Pad `message` per annex B.4: append a `1` bit, zero bits, then the
/// original bit-length as a 16-bit (or 32-bit, for messages ≥ 2^16 bits)
/// big-endian field. Long messages get one extra all-zero block appended
/// after the length field.
fn pad_message_hash(message: &[u8]) -> Vec<u8> {
    let l = message.len() * 8;
    let is_long = l >= 65536;
    let block_bits = 8 * BLOCK_SIZE;

    // Signed difference, renormalized into [0, block_bits) with rem_euclid
    // (the C++ source does this with a signed int and an explicit +=).
    let raw = if !is_long {
        7 * BLOCK_SIZE as i64 - (l as i64 + 1)
    } else {
        5 * BLOCK_SIZE as i64 - (l as i64 + 1)
    };
    let padding_size = raw.rem_euclid(block_bits as i64) as usize;

    let mut padded = message.to_vec();
    padded.push(0x80);

    let padding_bytes = (padding_size - 7) / 8;
    padded.extend(std::iter::repeat_n(0u8, padding_bytes));

    let length_size = if is_long { 2 * BLOCK_SIZE / 8 } else { BLOCK_SIZE / 8 };
    for i in 0..length_size {
        padded.push(((l >> (8 * (length_size - 1 - i))) & 0xFF) as u8);
    }

    if is_long {
        padded.extend(std::iter::repeat_n(0u8, BLOCK_SIZE / 8));
    }

    padded
}

/// `matyasMeyerOseas`: `h_0 = 0^128`, `h_i = E(h_{i-1}, m_i) XOR m_i`.
pub fn matyas_meyer_oseas(message: &[u8]) -> [u8; 16] {
    let padded = pad_message_hash(message);
    let mut hash = [0u8; 16];

    for block in padded.chunks_exact(BLOCK_SIZE) {
        let block: [u8; 16] = block.try_into().unwrap();
        let encrypted = aes128_ecb_block(&hash, &block);
        for i in 0..BLOCK_SIZE {
            hash[i] = encrypted[i] ^ block[i];
        }
    }

    hash
}
