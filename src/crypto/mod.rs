//! Primitive crypto kernel (component A).
//!
//! Thin, allocation-light wrappers over RustCrypto crates plus the two
//! constructions that aren't available off the shelf: the Keccak-f[1600]
//! permutation in the TUAK state layout, and ISO 9797-1 Algorithm 3 (Retail
//! MAC), which SCP02 needs and no crate exposes directly.

mod keccak;
mod retail_mac;

pub use keccak::keccak_f1600;
pub use retail_mac::retail_mac;

use crate::error::CoreError;
use aes::Aes128;
use cbc::{Decryptor, Encryptor};
use cipher::block_padding::NoPadding;
use cipher::{BlockDecrypt, BlockDecryptMut, BlockEncrypt, BlockEncryptMut, KeyIvInit, KeyInit};
use cmac::{Cmac, Mac as CmacTrait};
use des::{Des, TdesEde3};
use hmac::{Hmac, Mac as HmacTrait};
use sha2::Sha256;

type Aes128CbcEnc = Encryptor<Aes128>;
type Des3CbcEnc = Encryptor<TdesEde3>;
type Des3CbcDec = Decryptor<TdesEde3>;

/// AES-128 ECB, single block, encrypt direction. Used directly by MILENAGE,
/// which never chains blocks.
pub fn aes128_ecb_encrypt(key: &[u8; 16], block: &[u8; 16]) -> [u8; 16] {
    let cipher = Aes128::new(key.into());
    let mut buf = (*block).into();
    cipher.encrypt_block(&mut buf);
    buf.into()
}

/// AES-128 CBC encrypt over data whose length is a multiple of 16 bytes.
pub fn aes128_cbc_encrypt(plaintext: &[u8], key: &[u8; 16], iv: &[u8; 16]) -> Result<Vec<u8>, CoreError> {
    if plaintext.len() % 16 != 0 {
        return Err(CoreError::invalid_length("plaintext", "multiple of 16", plaintext.len()));
    }
    Ok(Aes128CbcEnc::new(key.into(), iv.into()).encrypt_padded_vec_mut::<NoPadding>(plaintext))
}

/// 3DES (2-key or 3-key, already expanded to 24 bytes) CBC encrypt.
pub fn des3_cbc_encrypt(data: &[u8], key24: &[u8; 24], iv: &[u8; 8]) -> Result<Vec<u8>, CoreError> {
    if data.len() % 8 != 0 {
        return Err(CoreError::invalid_length("data", "multiple of 8", data.len()));
    }
    Ok(Des3CbcEnc::new(key24.into(), iv.into()).encrypt_padded_vec_mut::<NoPadding>(data))
}

/// 3DES CBC decrypt, mirrors [`des3_cbc_encrypt`].
pub fn des3_cbc_decrypt(data: &[u8], key24: &[u8; 24], iv: &[u8; 8]) -> Result<Vec<u8>, CoreError> {
    if data.len() % 8 != 0 {
        return Err(CoreError::invalid_length("data", "multiple of 8", data.len()));
    }
    Des3CbcDec::new(key24.into(), iv.into())
        .decrypt_padded_vec_mut::<NoPadding>(data)
        .map_err(|_| CoreError::DecodeError("3DES CBC decrypt failed"))
}

/// Single-DES ECB encrypt, one block. Used by Retail MAC and SCP02 ICV chaining.
pub fn des_ecb_encrypt(key8: &[u8; 8], block: &[u8; 8]) -> [u8; 8] {
    let cipher = Des::new(key8.into());
    let mut buf = (*block).into();
    cipher.encrypt_block(&mut buf);
    buf.into()
}

/// Single-DES ECB decrypt, one block.
pub fn des_ecb_decrypt(key8: &[u8; 8], block: &[u8; 8]) -> [u8; 8] {
    let cipher = Des::new(key8.into());
    let mut buf = (*block).into();
    cipher.decrypt_block(&mut buf);
    buf.into()
}

/// AES-128 CMAC over an arbitrary-length message.
pub fn aes_cmac(key: &[u8; 16], msg: &[u8]) -> [u8; 16] {
    let mut mac = Cmac::<Aes128>::new(key.into());
    mac.update(msg);
    mac.finalize().into_bytes().into()
}

/// HMAC-SHA256, used by KASME derivation.
pub fn hmac_sha256(key: &[u8], msg: &[u8]) -> [u8; 32] {
    let mut mac = Hmac::<Sha256>::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(msg);
    mac.finalize().into_bytes().into()
}

/// XOR the first `n` bytes of `a` and `b`. Panics if either is shorter than `n`.
pub fn xor_bytes(a: &[u8], b: &[u8], n: usize) -> Vec<u8> {
    (0..n).map(|i| a[i] ^ b[i]).collect()
}

/// Cyclic left rotation by `r` bytes (not bits), preserving length.
pub fn rotate_left_bytes(data: &[u8], r: usize) -> Vec<u8> {
    if data.is_empty() {
        return Vec::new();
    }
    let r = r % data.len();
    let mut out = Vec::with_capacity(data.len());
    out.extend_from_slice(&data[r..]);
    out.extend_from_slice(&data[..r]);
    out
}

/// ISO/IEC 7816-4 padding: append `0x80`, then zeros, up to the next multiple
/// of `block`.
pub fn iso7816_pad(data: &[u8], block: usize) -> Vec<u8> {
    let mut out = data.to_vec();
    out.push(0x80);
    while out.len() % block != 0 {
        out.push(0x00);
    }
    out
}

/// Expand a subscriber/static key to the 24-byte form 3DES primitives need:
/// `K1||K2||K1` for a 16-byte 2-key input, verbatim for a 24-byte 3-key input.
pub fn expand_to_3des(key: &[u8]) -> Result<[u8; 24], CoreError> {
    match key.len() {
        16 => {
            let mut out = [0u8; 24];
            out[..16].copy_from_slice(key);
            out[16..].copy_from_slice(&key[..8]);
            Ok(out)
        }
        24 => {
            let mut out = [0u8; 24];
            out.copy_from_slice(key);
            Ok(out)
        }
        n => Err(CoreError::invalid_length("key", "16 or 24", n)),
    }
}

/// Length-checked constant-time equality: compares lengths first (a
/// non-secret property), then compares contents in constant time. No
/// short-circuiting on content mismatch.
pub fn ct_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    use subtle::ConstantTimeEq;
    a.ct_eq(b).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn cmac_empty_message_nist_vector() {
        let key = hex!("2b7e151628aed2a6abf7158809cf4f3c");
        let mac = aes_cmac(&key, b"");
        assert_eq!(mac, hex!("bb1d6929e95937287fa37d129b756746"));
    }

    #[test]
    fn iso7816_pad_properties() {
        let padded = iso7816_pad(b"abc", 8);
        assert_eq!(padded.len() % 8, 0);
        assert_eq!(padded[3], 0x80);
        assert!(padded[4..].iter().all(|&b| b == 0));
    }

    #[test]
    fn rotate_left_bytes_cyclic() {
        let data = [1u8, 2, 3, 4];
        assert_eq!(rotate_left_bytes(&data, 1), vec![2, 3, 4, 1]);
        assert_eq!(rotate_left_bytes(&data, 4), vec![1, 2, 3, 4]);
    }

    #[test]
    fn expand_to_3des_shapes() {
        let k16 = [0xAAu8; 16];
        let expanded = expand_to_3des(&k16).unwrap();
        assert_eq!(&expanded[16..], &k16[..8]);
        let k24 = [0xBBu8; 24];
        assert_eq!(expand_to_3des(&k24).unwrap(), k24);
    }
}
