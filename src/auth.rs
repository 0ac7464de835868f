//! Component B glue: the mutable authentication-variables record, the
//! algorithm-set trait unifying MILENAGE and TUAK, and the composite
//! derivations (AUTN/AUTS, KASME, 2G triplet compaction) that sit on top of
//! either algorithm set.

use crate::crypto::hmac_sha256;
use crate::error::CoreError;
use crate::milenage;
use crate::tuak::{self, TuakParams};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Inputs and outputs of one authentication-vector computation. Resetting
/// outputs (see [`AuthVariables::reset_outputs`]) never touches inputs.
#[derive(Default, ZeroizeOnDrop)]
pub struct AuthVariables {
    pub k: Vec<u8>,
    pub op: Option<Vec<u8>>,
    pub opc: Option<Vec<u8>>,
    #[zeroize(skip)]
    pub rand: Option<[u8; 16]>,
    #[zeroize(skip)]
    pub sqn: Option<[u8; 6]>,
    #[zeroize(skip)]
    pub amf: Option<[u8; 2]>,
    pub mac_a: Option<Vec<u8>>,
    pub mac_s: Option<Vec<u8>>,
    pub res: Option<Vec<u8>>,
    pub ck: Option<Vec<u8>>,
    pub ik: Option<Vec<u8>>,
    #[zeroize(skip)]
    pub ak: Option<[u8; 6]>,
    #[zeroize(skip)]
    pub ak_star: Option<[u8; 6]>,
}

impl AuthVariables {
    pub fn new(k: Vec<u8>) -> Self {
        AuthVariables { k, ..Default::default() }
    }

    /// Clear every output field, leaving K/OP/OPc/RAND/SQN/AMF untouched.
    pub fn reset_outputs(&mut self) {
        for field in [&mut self.mac_a, &mut self.mac_s, &mut self.res, &mut self.ck, &mut self.ik] {
            if let Some(mut v) = field.take() {
                v.zeroize();
            }
        }
        self.ak = None;
        self.ak_star = None;
    }
}

/// Common surface over MILENAGE and TUAK so higher layers (driver dispatch,
/// offline vector computation) don't need to branch on algorithm choice.
pub trait AlgorithmSet {
    fn compute_opc(&self, k: &[u8], op_or_top: &[u8]) -> Result<Vec<u8>, CoreError>;
    fn f1(&self, k: &[u8], opc: &[u8], rand: &[u8; 16], sqn: &[u8; 6], amf: &[u8; 2]) -> Result<Vec<u8>, CoreError>;
    fn f1_star(&self, k: &[u8], opc: &[u8], rand: &[u8; 16], sqn: &[u8; 6], amf: &[u8; 2]) -> Result<Vec<u8>, CoreError>;
    fn f2345(&self, k: &[u8], opc: &[u8], rand: &[u8; 16]) -> Result<(Vec<u8>, Vec<u8>, Vec<u8>, [u8; 6]), CoreError>;
    fn f5_star(&self, k: &[u8], opc: &[u8], rand: &[u8; 16]) -> Result<[u8; 6], CoreError>;
}

/// MILENAGE: fixed 16-byte K/OPc, 8-byte MAC/RES, 16-byte CK/IK.
pub struct Milenage;

impl AlgorithmSet for Milenage {
    fn compute_opc(&self, k: &[u8], op: &[u8]) -> Result<Vec<u8>, CoreError> {
        let k: &[u8; 16] = k.try_into().map_err(|_| CoreError::invalid_length("K", "16", k.len()))?;
        let op: &[u8; 16] = op.try_into().map_err(|_| CoreError::invalid_length("OP", "16", op.len()))?;
        Ok(milenage::compute_opc(k, op).to_vec())
    }

    fn f1(&self, k: &[u8], opc: &[u8], rand: &[u8; 16], sqn: &[u8; 6], amf: &[u8; 2]) -> Result<Vec<u8>, CoreError> {
        let k = fixed16(k, "K")?;
        let opc = fixed16(opc, "OPc")?;
        Ok(milenage::compute_f1(&k, &opc, rand, sqn, amf).to_vec())
    }

    fn f1_star(&self, k: &[u8], opc: &[u8], rand: &[u8; 16], sqn: &[u8; 6], amf: &[u8; 2]) -> Result<Vec<u8>, CoreError> {
        let k = fixed16(k, "K")?;
        let opc = fixed16(opc, "OPc")?;
        Ok(milenage::compute_f1_star(&k, &opc, rand, sqn, amf).to_vec())
    }

    fn f2345(&self, k: &[u8], opc: &[u8], rand: &[u8; 16]) -> Result<(Vec<u8>, Vec<u8>, Vec<u8>, [u8; 6]), CoreError> {
        let k = fixed16(k, "K")?;
        let opc = fixed16(opc, "OPc")?;
        let (res, ck, ik, ak) = milenage::compute_f2345(&k, &opc, rand);
        Ok((res.to_vec(), ck.to_vec(), ik.to_vec(), ak))
    }

    fn f5_star(&self, k: &[u8], opc: &[u8], rand: &[u8; 16]) -> Result<[u8; 6], CoreError> {
        let k = fixed16(k, "K")?;
        let opc = fixed16(opc, "OPc")?;
        Ok(milenage::compute_f5_star(&k, &opc, rand))
    }
}

fn fixed16(data: &[u8], field: &'static str) -> Result<[u8; 16], CoreError> {
    data.try_into().map_err(|_| CoreError::invalid_length(field, "16", data.len()))
}

fn fixed32(data: &[u8], field: &'static str) -> Result<[u8; 32], CoreError> {
    data.try_into().map_err(|_| CoreError::invalid_length(field, "32", data.len()))
}

/// TUAK, parameterized by [`TuakParams`] (MAC/RES/CK/IK length and iteration
/// count).
pub struct Tuak {
    pub params: TuakParams,
}

impl AlgorithmSet for Tuak {
    fn compute_opc(&self, k: &[u8], top: &[u8]) -> Result<Vec<u8>, CoreError> {
        let top = fixed32(top, "TOP")?;
        Ok(tuak::compute_topc(k, &top, self.params.iterations)?.to_vec())
    }

    fn f1(&self, k: &[u8], topc: &[u8], rand: &[u8; 16], sqn: &[u8; 6], amf: &[u8; 2]) -> Result<Vec<u8>, CoreError> {
        let topc = fixed32(topc, "TOPc")?;
        tuak::compute_f1(k, &topc, rand, sqn, amf, &self.params)
    }

    fn f1_star(&self, k: &[u8], topc: &[u8], rand: &[u8; 16], sqn: &[u8; 6], amf: &[u8; 2]) -> Result<Vec<u8>, CoreError> {
        let topc = fixed32(topc, "TOPc")?;
        tuak::compute_f1_star(k, &topc, rand, sqn, amf, &self.params)
    }

    fn f2345(&self, k: &[u8], topc: &[u8], rand: &[u8; 16]) -> Result<(Vec<u8>, Vec<u8>, Vec<u8>, [u8; 6]), CoreError> {
        let topc = fixed32(topc, "TOPc")?;
        tuak::compute_f2345(k, &topc, rand, &self.params)
    }

    fn f5_star(&self, k: &[u8], topc: &[u8], rand: &[u8; 16]) -> Result<[u8; 6], CoreError> {
        let topc = fixed32(topc, "TOPc")?;
        tuak::compute_f5_star(k, &topc, rand, &self.params)
    }
}

/// `AUTN = (SQN XOR AK) || AMF || MAC-A`.
pub fn compute_autn(sqn: &[u8; 6], ak: &[u8; 6], amf: &[u8; 2], mac_a: &[u8]) -> Vec<u8> {
    let mut autn = Vec::with_capacity(6 + 2 + mac_a.len());
    for i in 0..6 {
        autn.push(sqn[i] ^ ak[i]);
    }
    autn.extend_from_slice(amf);
    autn.extend_from_slice(mac_a);
    autn
}

/// Inverse of [`compute_autn`]: recovers `(SQN, AMF, MAC-A)` given AK.
pub fn decode_autn(autn: &[u8], ak: &[u8; 6]) -> Result<([u8; 6], [u8; 2], Vec<u8>), CoreError> {
    if autn.len() < 9 {
        return Err(CoreError::invalid_length("AUTN", ">= 9", autn.len()));
    }
    let mut sqn = [0u8; 6];
    for i in 0..6 {
        sqn[i] = autn[i] ^ ak[i];
    }
    let amf: [u8; 2] = autn[6..8].try_into().unwrap();
    let mac_a = autn[8..].to_vec();
    Ok((sqn, amf, mac_a))
}

/// `AUTS = (SQN XOR AK*) || MAC-S`.
pub fn compute_auts(sqn_ms: &[u8; 6], ak_star: &[u8; 6], mac_s: &[u8]) -> Vec<u8> {
    let mut auts = Vec::with_capacity(6 + mac_s.len());
    for i in 0..6 {
        auts.push(sqn_ms[i] ^ ak_star[i]);
    }
    auts.extend_from_slice(mac_s);
    auts
}

/// Inverse of [`compute_auts`]: recovers `(SQN_MS, MAC-S)` given AK*.
pub fn decode_auts(auts: &[u8], ak_star: &[u8; 6]) -> Result<([u8; 6], Vec<u8>), CoreError> {
    if auts.len() < 7 {
        return Err(CoreError::invalid_length("AUTS", ">= 7", auts.len()));
    }
    let mut sqn_ms = [0u8; 6];
    for i in 0..6 {
        sqn_ms[i] = auts[i] ^ ak_star[i];
    }
    Ok((sqn_ms, auts[6..].to_vec()))
}

/// 3-byte big-endian nibble-swapped PLMN (MCC/MNC) encoding, per spec.md §6.
pub fn encode_plmn(mcc: &str, mnc: &str) -> Result<[u8; 3], CoreError> {
    let mcc_digits = digits(mcc, 3, "MCC")?;
    let mnc_digits = digits_variable(mnc, "MNC")?;
    let mnc_filler_or_third = if mnc_digits.len() == 2 { 0xF } else { mnc_digits[2] };
    Ok([
        (mcc_digits[1] << 4) | mcc_digits[0],
        (mnc_filler_or_third << 4) | mcc_digits[2],
        (mnc_digits[1] << 4) | mnc_digits[0],
    ])
}

/// Inverse of [`encode_plmn`].
pub fn decode_plmn(bytes: &[u8; 3]) -> (String, String) {
    let mcc = [bytes[0] & 0x0F, bytes[0] >> 4, bytes[1] & 0x0F];
    let mnc_third = bytes[1] >> 4;
    let mnc = [bytes[2] & 0x0F, bytes[2] >> 4];
    let mcc_str: String = mcc.iter().map(|d| (b'0' + d) as char).collect();
    let mnc_str = if mnc_third == 0xF {
        mnc.iter().map(|d| (b'0' + d) as char).collect::<String>()
    } else {
        [mnc[0], mnc[1], mnc_third].iter().map(|d| (b'0' + d) as char).collect::<String>()
    };
    (mcc_str, mnc_str)
}

fn digits(s: &str, len: usize, field: &'static str) -> Result<Vec<u8>, CoreError> {
    if s.len() != len || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CoreError::invalid_length(field, "3 decimal digits", s.len()));
    }
    Ok(s.bytes().map(|b| b - b'0').collect())
}

fn digits_variable(s: &str, field: &'static str) -> Result<Vec<u8>, CoreError> {
    if (s.len() != 2 && s.len() != 3) || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CoreError::invalid_length(field, "2 or 3 decimal digits", s.len()));
    }
    Ok(s.bytes().map(|b| b - b'0').collect())
}

/// `KASME = HMAC-SHA256(CK||IK, FC=0x10 || SN_ID(3) || L0=0x0003 || SQN^AK(6) || L1=0x0006)`.
pub fn compute_kasme(ck: &[u8], ik: &[u8], sqn_xor_ak: &[u8; 6], mcc: &str, mnc: &str) -> Result<[u8; 32], CoreError> {
    if ck.len() != 16 || ik.len() != 16 {
        return Err(CoreError::invalid_length("CK/IK", "16 each", ck.len().max(ik.len())));
    }
    let sn_id = encode_plmn(mcc, mnc)?;

    let mut key = Vec::with_capacity(32);
    key.extend_from_slice(ck);
    key.extend_from_slice(ik);

    let mut msg = Vec::with_capacity(1 + 3 + 2 + 6 + 2);
    msg.push(0x10);
    msg.extend_from_slice(&sn_id);
    msg.extend_from_slice(&0x0003u16.to_be_bytes());
    msg.extend_from_slice(sqn_xor_ak);
    msg.extend_from_slice(&0x0006u16.to_be_bytes());

    Ok(hmac_sha256(&key, &msg))
}

/// 2G triplet compaction: `SRES` folds RES down to 4 bytes by XOR (passed
/// through unfolded if RES is already shorter than 4 bytes, matching the
/// source's documented-but-unexplained behaviour); `Kc` XORs the 8-byte
/// halves of CK and IK.
pub fn generate_triplets(res: &[u8], ck: &[u8; 16], ik: &[u8; 16]) -> (Vec<u8>, [u8; 8]) {
    let sres = if res.len() < 4 {
        res.to_vec()
    } else {
        let mut folded = [0u8; 4];
        for (i, b) in res.iter().enumerate() {
            folded[i % 4] ^= b;
        }
        folded.to_vec()
    };

    let mut kc = [0u8; 8];
    for i in 0..8 {
        kc[i] = ck[i] ^ ck[i + 8] ^ ik[i] ^ ik[i + 8];
    }
    (sres, kc)
}
