//! AES-128 single-block ECB primitive, no padding (spec §4.I annex B.1.1).

use aes::cipher::{BlockEncrypt, KeyInit};
use aes::Aes128;
use generic_array::GenericArray;

/// Encrypt one 16-byte block under `key`. Used directly (never chained) by
/// the Matyas-Meyer-Oseas hash and the CCM* constructions, which each build
/// their own block-chaining logic on top.
pub fn aes128_ecb_block(key: &[u8; 16], input: &[u8; 16]) -> [u8; 16] {
    let cipher = Aes128::new(GenericArray::from_slice(key));
    let mut block = GenericArray::clone_from_slice(input);
    cipher.encrypt_block(&mut block);
    block.into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fips_197_test_vector() {
        let key = [0x00u8; 16];
        let plaintext = [0x00u8; 16];
        let ct = aes128_ecb_block(&key, &plaintext);
        assert_eq!(
            ct,
            [
                0x66, 0xe9, 0x4b, 0xd4, 0xef, 0x8a, 0x2c, 0x3b, 0x88, 0x4c, 0xfa, 0x59, 0xca,
                0x34, 0x2b, 0x2e
            ]
        );
    }
}
