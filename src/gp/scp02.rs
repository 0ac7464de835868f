//! SCP02: the 3DES-based GlobalPlatform secure channel protocol, in use on
//! most SIM/USIM card populations this crate targets.

use super::{initialize_update, SecureChannel, SecurityLevel};
use crate::apdu::{ApduClient, Command};
use crate::crypto::{des3_cbc_encrypt, des_ecb_encrypt, expand_to_3des, iso7816_pad, retail_mac};
use crate::error::CoreError;
use zeroize::ZeroizeOnDrop;

const DERIVE_ENC: u16 = 0x0182;
const DERIVE_MAC: u16 = 0x0101;
const DERIVE_DEK: u16 = 0x0181;

fn derive_session_key(static_key24: &[u8; 24], constant: u16, seq: &[u8; 2]) -> Result<[u8; 24], CoreError> {
    let mut derivation_data = Vec::with_capacity(16);
    derivation_data.extend_from_slice(&constant.to_be_bytes());
    derivation_data.extend_from_slice(seq);
    derivation_data.extend_from_slice(&[0u8; 12]);
    let out16 = des3_cbc_encrypt(&derivation_data, static_key24, &[0u8; 8])?;
    expand_to_3des(&out16[..16])
}

fn cryptogram(key24: &[u8; 24], input: &[u8]) -> Result<[u8; 8], CoreError> {
    let padded = iso7816_pad(input, 8);
    let ct = des3_cbc_encrypt(&padded, key24, &[0u8; 8])?;
    let n = ct.len();
    Ok(ct[n - 8..].try_into().unwrap())
}

/// A live SCP02 session: derived session keys, the running C-MAC ICV, and
/// the security level negotiated at `EXTERNAL AUTHENTICATE` time.
#[derive(ZeroizeOnDrop)]
pub struct Scp02Session {
    #[zeroize(skip)]
    kvn: u8,
    s_enc: [u8; 24],
    s_mac: [u8; 24],
    s_dek: [u8; 24],
    icv: [u8; 8],
    /// Whether the ICV is re-encrypted with S-MAC K1 after each MAC (the
    /// conventional default).
    #[zeroize(skip)]
    icv_is_encrypted: bool,
    #[zeroize(skip)]
    security_level: SecurityLevel,
}

/// `INITIALIZE UPDATE` plus session-key derivation and card-cryptogram
/// verification, stopping short of `EXTERNAL AUTHENTICATE`. Exposed
/// separately so [`super::autoprobe`] can test a keyset without consuming a
/// retry counter on a failed external authentication.
pub(crate) fn derive_and_verify(
    client: &mut ApduClient<'_>,
    kvn: u8,
    static_key24: &[u8; 24],
    host_challenge: &[u8; 8],
) -> Result<(Scp02Session, [u8; 8]), CoreError> {
    let resp = initialize_update(client, kvn, host_challenge)?;
    if resp.len() < 28 {
        return Err(CoreError::invalid_length("INITIALIZE UPDATE response", "28", resp.len()));
    }
    let scp_id = resp[11];
    if scp_id != 0x02 {
        return Err(CoreError::Session("card negotiated a protocol other than SCP02"));
    }
    let seq: [u8; 2] = resp[12..14].try_into().unwrap();
    let card_challenge: [u8; 6] = resp[14..20].try_into().unwrap();
    let card_cryptogram: [u8; 8] = resp[20..28].try_into().unwrap();

    let s_enc = derive_session_key(static_key24, DERIVE_ENC, &seq)?;
    let s_mac = derive_session_key(static_key24, DERIVE_MAC, &seq)?;
    let s_dek = derive_session_key(static_key24, DERIVE_DEK, &seq)?;

    let mut expected_input = Vec::with_capacity(16);
    expected_input.extend_from_slice(host_challenge);
    expected_input.extend_from_slice(&seq);
    expected_input.extend_from_slice(&card_challenge);
    let expected_cryptogram = cryptogram(&s_enc, &expected_input)?;
    if !crate::crypto::ct_eq(&expected_cryptogram, &card_cryptogram) {
        return Err(CoreError::CryptoVerification("SCP02 card cryptogram mismatch"));
    }

    let mut host_input = Vec::with_capacity(16);
    host_input.extend_from_slice(&seq);
    host_input.extend_from_slice(&card_challenge);
    host_input.extend_from_slice(host_challenge);
    let host_cryptogram = cryptogram(&s_enc, &host_input)?;

    let session = Scp02Session {
        kvn,
        s_enc,
        s_mac,
        s_dek,
        icv: [0u8; 8],
        icv_is_encrypted: true,
        security_level: SecurityLevel::CMac,
    };
    Ok((session, host_cryptogram))
}

/// Runs the full SCP02 handshake: [`derive_and_verify`] followed by
/// `EXTERNAL AUTHENTICATE`.
pub fn open(
    client: &mut ApduClient<'_>,
    kvn: u8,
    static_key24: &[u8; 24],
    host_challenge: &[u8; 8],
    security_level: SecurityLevel,
) -> Result<Scp02Session, CoreError> {
    let (mut session, host_cryptogram) = derive_and_verify(client, kvn, static_key24, host_challenge)?;
    session.security_level = security_level;

    let security_byte = match security_level {
        SecurityLevel::CMac => 0x01,
        SecurityLevel::CMacAndCEnc => 0x03,
    };
    let mut auth_data = host_cryptogram.to_vec();
    let k1: [u8; 8] = session.s_mac[..8].try_into().unwrap();
    let k2: [u8; 8] = session.s_mac[8..16].try_into().unwrap();
    let mac = retail_mac_over_apdu(&k1, &k2, &[0u8; 8], 0x84, 0x82, security_byte, 0x00, &host_cryptogram)?;
    auth_data.extend_from_slice(&mac);

    let cmd = Command::new(0x84, 0x82, security_byte, 0x00).with_data(auth_data);
    let (_, sw) = client.send(cmd)?;
    if !sw.is_success() {
        return Err(CoreError::Apdu {
            sw: sw.0,
            mnemonic: sw.mnemonic(),
            context: Some("EXTERNAL AUTHENTICATE".to_string()),
            retries_left: sw.retries_left(),
        });
    }

    session.icv = if session.icv_is_encrypted { des_ecb_encrypt(&k1, &mac) } else { mac };
    Ok(session)
}

/// Retail MAC over a 4-byte header, the Lc byte and data, chained from `icv`.
fn retail_mac_over_apdu(k1: &[u8; 8], k2: &[u8; 8], icv: &[u8; 8], cla: u8, ins: u8, p1: u8, p2: u8, data: &[u8]) -> Result<[u8; 8], CoreError> {
    let lc = (data.len() + 8) as u8;
    let mut msg = vec![cla, ins, p1, p2, lc];
    msg.extend_from_slice(data);
    let mut key16 = [0u8; 16];
    key16[..8].copy_from_slice(k1);
    key16[8..].copy_from_slice(k2);
    Ok(retail_mac(&key16, icv, &msg))
}

impl SecureChannel for Scp02Session {
    fn wrap_and_send(&mut self, client: &mut ApduClient<'_>, ins: u8, p1: u8, p2: u8, data: &[u8]) -> Result<Vec<u8>, CoreError> {
        let k1: [u8; 8] = self.s_mac[..8].try_into().unwrap();
        let k2: [u8; 8] = self.s_mac[8..16].try_into().unwrap();
        let cla = 0x84;
        let mac = retail_mac_over_apdu(&k1, &k2, &self.icv, cla, ins, p1, p2, data)?;

        let mut wrapped = data.to_vec();
        wrapped.extend_from_slice(&mac);
        let cmd = Command::new(cla, ins, p1, p2).with_data(wrapped).with_le(0);
        let (resp, sw) = client.send(cmd)?;

        self.icv = if self.icv_is_encrypted { des_ecb_encrypt(&k1, &mac) } else { mac };

        if sw.is_success() || sw.data_remaining().is_some() {
            Ok(resp)
        } else {
            Err(CoreError::Apdu { sw: sw.0, mnemonic: sw.mnemonic(), context: Some(format!("GP command INS={ins:#04X}")), retries_left: sw.retries_left() })
        }
    }
}

impl Scp02Session {
    pub fn kvn(&self) -> u8 {
        self.kvn
    }

    pub fn security_level(&self) -> SecurityLevel {
        self.security_level
    }

    pub(crate) fn s_dek(&self) -> &[u8; 24] {
        &self.s_dek
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apdu::transport::mock::MockTransport;
    use crate::apdu::TransportPolicy;

    const STATIC_KEY: [u8; 24] = [0x40; 24];

    #[test]
    fn derive_session_key_is_deterministic() {
        let a = derive_session_key(&STATIC_KEY, DERIVE_ENC, &[0x00, 0x01]).unwrap();
        let b = derive_session_key(&STATIC_KEY, DERIVE_ENC, &[0x00, 0x01]).unwrap();
        assert_eq!(a, b);
        let c = derive_session_key(&STATIC_KEY, DERIVE_MAC, &[0x00, 0x01]).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn open_fails_on_tampered_card_cryptogram() {
        let mut init_resp = vec![0u8; 10]; // key diversification data
        init_resp.push(0x00); // key version
        init_resp.push(0x02); // SCP-ID = SCP02
        init_resp.push(0x00); // i-parameter
        init_resp.extend_from_slice(&[0x00, 0x01]); // seq counter
        init_resp.extend_from_slice(&[0xAA; 6]); // card challenge
        init_resp.extend_from_slice(&[0x00; 8]); // bogus card cryptogram
        init_resp.extend_from_slice(&[0x90, 0x00]);

        let mut transport = MockTransport::new(vec![init_resp]);
        let mut client = ApduClient::new(&mut transport, TransportPolicy::default());
        let result = open(&mut client, 0x00, &STATIC_KEY, &[0x11; 8], SecurityLevel::CMac);
        assert!(result.is_err());
    }

    #[test]
    fn wrap_and_send_chains_icv_across_calls() {
        let static_key = STATIC_KEY;
        let seq = [0x00, 0x01];
        let s_mac = derive_session_key(&static_key, DERIVE_MAC, &seq).unwrap();
        let session = Scp02Session {
            kvn: 0x00,
            s_enc: derive_session_key(&static_key, DERIVE_ENC, &seq).unwrap(),
            s_mac,
            s_dek: derive_session_key(&static_key, DERIVE_DEK, &seq).unwrap(),
            icv: [0u8; 8],
            icv_is_encrypted: true,
            security_level: SecurityLevel::CMac,
        };
        let mut session = session;
        let mut transport = MockTransport::new(vec![vec![0x90, 0x00], vec![0x90, 0x00]]);
        let mut client = ApduClient::new(&mut transport, TransportPolicy::default());
        session.wrap_and_send(&mut client, 0xE4, 0x00, 0x00, b"first").unwrap();
        let icv_after_first = session.icv;
        session.wrap_and_send(&mut client, 0xE4, 0x00, 0x00, b"second").unwrap();
        assert_ne!(icv_after_first, session.icv);
    }
}
