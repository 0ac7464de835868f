//! Keccak-f[1600] permutation over the 200-byte TUAK state.
//!
//! `tiny-keccak` exposes the raw 24-round permutation on a `[u64; 25]` lane
//! array (little-endian per 3GPP TS 35.231 Annex A, same as the reference C
//! implementation this was historically ported from). We just marshal the
//! state in and out of the 200-byte array TUAK wants to work with.

/// Apply the Keccak-f[1600] permutation in place, `rounds` times (TUAK's
/// `Iter` parameter; the 3GPP default is 1).
pub fn keccak_f1600(state: &mut [u8; 200], rounds: u32) {
    let mut lanes = [0u64; 25];
    for (lane, chunk) in lanes.iter_mut().zip(state.chunks_exact(8)) {
        *lane = u64::from_le_bytes(chunk.try_into().unwrap());
    }
    for _ in 0..rounds {
        tiny_keccak::keccakf(&mut lanes);
    }
    for (lane, chunk) in lanes.iter().zip(state.chunks_exact_mut(8)) {
        chunk.copy_from_slice(&lane.to_le_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permutation_changes_all_zero_state() {
        let mut state = [0u8; 200];
        keccak_f1600(&mut state, 1);
        assert!(state.iter().any(|&b| b != 0));
    }

    #[test]
    fn permutation_is_deterministic() {
        let mut a = [0u8; 200];
        let mut b = [0u8; 200];
        a[0] = 0x01;
        b[0] = 0x01;
        keccak_f1600(&mut a, 1);
        keccak_f1600(&mut b, 1);
        assert_eq!(a, b);
    }
}
