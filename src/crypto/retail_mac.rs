//! ISO 9797-1 Algorithm 3 ("Retail MAC"): single-DES CBC-MAC under K1,
//! followed by a DES-decrypt-K2/DES-encrypt-K1 finishing step. Needed for
//! SCP02's C-MAC; no RustCrypto crate exposes it directly.

use super::{des_ecb_decrypt, des_ecb_encrypt, iso7816_pad};

/// Compute the Retail MAC of `msg` under a 16-byte key (`K1 = key[..8]`,
/// `K2 = key[8..]`), chained from `icv`. `msg` is ISO 7816-4 padded first.
pub fn retail_mac(key16: &[u8; 16], icv: &[u8; 8], msg: &[u8]) -> [u8; 8] {
    let k1: [u8; 8] = key16[..8].try_into().unwrap();
    let k2: [u8; 8] = key16[8..].try_into().unwrap();

    let padded = iso7816_pad(msg, 8);
    let mut chain = *icv;
    for block in padded.chunks(8) {
        let mut xored = [0u8; 8];
        for i in 0..8 {
            xored[i] = block[i] ^ chain[i];
        }
        chain = des_ecb_encrypt(&k1, &xored);
    }

    let decrypted = des_ecb_decrypt(&k2, &chain);
    des_ecb_encrypt(&k1, &decrypted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_and_icv_sensitive() {
        let key = [0x11u8; 16];
        let msg = b"EXTERNAL AUTHENTICATE payload";
        let mac_zero_icv = retail_mac(&key, &[0u8; 8], msg);
        let mac_other_icv = retail_mac(&key, &[1u8; 8], msg);
        assert_ne!(mac_zero_icv, mac_other_icv);
        assert_eq!(mac_zero_icv, retail_mac(&key, &[0u8; 8], msg));
    }
}
