//! MILENAGE (3GPP TS 35.206/35.207), the AES-128 based authentication and
//! key agreement algorithm set: `f1`, `f1*`, `f2`, `f3`, `f4`, `f5`, `f5*`.

use crate::crypto::{aes128_ecb_encrypt, rotate_left_bytes};

const R1: usize = 8;
const R2: usize = 0;
const R3: usize = 4;
const R4: usize = 8;
const R5: usize = 12;

const C1: u8 = 0x00;
const C2: u8 = 0x01;
const C3: u8 = 0x02;
const C4: u8 = 0x04;
const C5: u8 = 0x08;

/// `OPc = AES_K(OP) XOR OP`.
pub fn compute_opc(k: &[u8; 16], op: &[u8; 16]) -> [u8; 16] {
    let mut opc = aes128_ecb_encrypt(k, op);
    for i in 0..16 {
        opc[i] ^= op[i];
    }
    opc
}

fn xor16(a: &[u8; 16], b: &[u8; 16]) -> [u8; 16] {
    let mut out = [0u8; 16];
    for i in 0..16 {
        out[i] = a[i] ^ b[i];
    }
    out
}

/// `TEMP = AES_K(RAND XOR OPc)`, shared by every function below.
fn compute_temp(k: &[u8; 16], opc: &[u8; 16], rand: &[u8; 16]) -> [u8; 16] {
    aes128_ecb_encrypt(k, &xor16(rand, opc))
}

/// `AES_K( rot(x, r) XOR c_last_byte ) XOR OPc`, the shared f2..f5* step.
fn derive(k: &[u8; 16], opc: &[u8; 16], base: &[u8; 16], r: usize, c: u8) -> [u8; 16] {
    let rotated = rotate_left_bytes(base, r);
    let mut x: [u8; 16] = rotated.try_into().expect("rotate_left_bytes preserves length");
    x[15] ^= c;
    let mut out = aes128_ecb_encrypt(k, &x);
    for i in 0..16 {
        out[i] ^= opc[i];
    }
    out
}

fn compute_out1(k: &[u8; 16], opc: &[u8; 16], rand: &[u8; 16], sqn: &[u8; 6], amf: &[u8; 2]) -> [u8; 16] {
    let mut in1 = [0u8; 16];
    in1[0..6].copy_from_slice(sqn);
    in1[6..8].copy_from_slice(amf);
    in1[8..14].copy_from_slice(sqn);
    in1[14..16].copy_from_slice(amf);

    let temp = compute_temp(k, opc, rand);
    let pre = xor16(&in1, opc);
    let rotated = rotate_left_bytes(&pre, R1);
    let mut x = [0u8; 16];
    for i in 0..16 {
        x[i] = rotated[i] ^ temp[i];
    }
    x[15] ^= C1;
    let mut out1 = aes128_ecb_encrypt(k, &x);
    for i in 0..16 {
        out1[i] ^= opc[i];
    }
    out1
}

/// MAC-A, the network authentication MAC (high 64 bits of OUT1).
pub fn compute_f1(k: &[u8; 16], opc: &[u8; 16], rand: &[u8; 16], sqn: &[u8; 6], amf: &[u8; 2]) -> [u8; 8] {
    compute_out1(k, opc, rand, sqn, amf)[0..8].try_into().unwrap()
}

/// MAC-S, the resynchronization MAC (low 64 bits of OUT1).
pub fn compute_f1_star(k: &[u8; 16], opc: &[u8; 16], rand: &[u8; 16], sqn: &[u8; 6], amf: &[u8; 2]) -> [u8; 8] {
    compute_out1(k, opc, rand, sqn, amf)[8..16].try_into().unwrap()
}

/// `RES`, `CK`, `IK`, `AK`, in that order.
pub fn compute_f2345(
    k: &[u8; 16],
    opc: &[u8; 16],
    rand: &[u8; 16],
) -> ([u8; 8], [u8; 16], [u8; 16], [u8; 6]) {
    let temp = compute_temp(k, opc, rand);
    let base = xor16(&temp, opc);

    let out2 = derive(k, opc, &base, R2, C2);
    let ak: [u8; 6] = out2[0..6].try_into().unwrap();
    let res: [u8; 8] = out2[8..16].try_into().unwrap();

    let ck = derive(k, opc, &base, R3, C3);
    let ik = derive(k, opc, &base, R4, C4);

    (res, ck, ik, ak)
}

/// `AK*`, used to build AUTS.
pub fn compute_f5_star(k: &[u8; 16], opc: &[u8; 16], rand: &[u8; 16]) -> [u8; 6] {
    let temp = compute_temp(k, opc, rand);
    let base = xor16(&temp, opc);
    let out5 = derive(k, opc, &base, R5, C5);
    out5[0..6].try_into().unwrap()
}
