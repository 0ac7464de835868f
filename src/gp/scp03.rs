//! SCP03: the AES-CMAC based GlobalPlatform secure channel protocol,
//! defined by GlobalPlatform Amendment D. Used by newer AES-capable
//! Security Domains.

use super::{initialize_update, SecureChannel, SecurityLevel};
use crate::apdu::{ApduClient, Command};
use crate::crypto::aes_cmac;
use crate::error::CoreError;
use zeroize::ZeroizeOnDrop;

const DERIVE_CARD_CRYPTOGRAM: u8 = 0x00;
const DERIVE_HOST_CRYPTOGRAM: u8 = 0x01;
const DERIVE_S_ENC: u8 = 0x04;
const DERIVE_S_MAC: u8 = 0x06;
const DERIVE_S_RMAC: u8 = 0x07;

/// GP 2.3 Amendment D counter-mode KDF over AES-CMAC. `output_len` in bytes;
/// only lengths up to 16 (one CMAC block) are needed by this core.
fn kdf(base_key: &[u8; 16], constant: u8, context: &[u8], output_len: usize) -> Vec<u8> {
    let mut info = vec![0u8; 11];
    info.push(constant);
    info.push(0x00);
    info.extend_from_slice(&((output_len * 8) as u16).to_be_bytes());
    info.push(0x01);
    info.extend_from_slice(context);
    aes_cmac(base_key, &info)[..output_len].to_vec()
}

/// A live SCP03 session. `s_mode` is the card/host challenge length (8 or
/// 16 bytes), which also sets the transmitted C-MAC truncation length.
#[derive(ZeroizeOnDrop)]
pub struct Scp03Session {
    s_enc: [u8; 16],
    s_mac: [u8; 16],
    s_rmac: [u8; 16],
    chaining_value: [u8; 16],
    #[zeroize(skip)]
    s_mode: usize,
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
    static_enc_key: &[u8; 16],
    static_mac_key: &[u8; 16],
    host_challenge: &[u8],
) -> Result<(Scp03Session, Vec<u8>), CoreError> {
    if host_challenge.len() != 8 && host_challenge.len() != 16 {
        return Err(CoreError::invalid_length("host_challenge", "8 or 16", host_challenge.len()));
    }
    let resp = initialize_update(client, kvn, host_challenge)?;
    if resp.len() < 13 {
        return Err(CoreError::invalid_length("INITIALIZE UPDATE response", ">= 13", resp.len()));
    }
    let scp_id = resp[11];
    if scp_id != 0x03 {
        return Err(CoreError::Session("card negotiated a protocol other than SCP03"));
    }

    let s_mode = host_challenge.len();
    let tail = &resp[12..];
    if tail.len() < 2 * s_mode {
        return Err(CoreError::invalid_length("INITIALIZE UPDATE s-mode tail", "2 * s-mode", tail.len()));
    }
    let card_challenge = &tail[..s_mode];
    let card_cryptogram = &tail[s_mode..2 * s_mode];

    let mut context = Vec::with_capacity(host_challenge.len() + card_challenge.len());
    context.extend_from_slice(host_challenge);
    context.extend_from_slice(card_challenge);

    let s_enc_vec = kdf(static_enc_key, DERIVE_S_ENC, &context, 16);
    let s_mac_vec = kdf(static_mac_key, DERIVE_S_MAC, &context, 16);
    let s_rmac_vec = kdf(static_mac_key, DERIVE_S_RMAC, &context, 16);
    let s_enc: [u8; 16] = s_enc_vec.try_into().unwrap();
    let s_mac: [u8; 16] = s_mac_vec.try_into().unwrap();
    let s_rmac: [u8; 16] = s_rmac_vec.try_into().unwrap();

    let expected_card_cryptogram = kdf(&s_mac, DERIVE_CARD_CRYPTOGRAM, &context, s_mode);
    if !crate::crypto::ct_eq(&expected_card_cryptogram, card_cryptogram) {
        return Err(CoreError::CryptoVerification("SCP03 card cryptogram mismatch"));
    }
    let host_cryptogram = kdf(&s_mac, DERIVE_HOST_CRYPTOGRAM, &context, s_mode);

    let session = Scp03Session {
        s_enc,
        s_mac,
        s_rmac,
        chaining_value: [0u8; 16],
        s_mode,
        security_level: SecurityLevel::CMac,
    };

    Ok((session, host_cryptogram))
}

/// Runs the full SCP03 handshake: [`derive_and_verify`] followed by
/// `EXTERNAL AUTHENTICATE`.
pub fn open(
    client: &mut ApduClient<'_>,
    kvn: u8,
    static_enc_key: &[u8; 16],
    static_mac_key: &[u8; 16],
    host_challenge: &[u8],
    security_level: SecurityLevel,
) -> Result<Scp03Session, CoreError> {
    let (mut session, host_cryptogram) = derive_and_verify(client, kvn, static_enc_key, static_mac_key, host_challenge)?;
    session.security_level = security_level;
    session.wrap_and_send(client, 0x82, security_byte(security_level), 0x00, &host_cryptogram)?;
    Ok(session)
}

fn security_byte(level: SecurityLevel) -> u8 {
    match level {
        SecurityLevel::CMac => 0x01,
        SecurityLevel::CMacAndCEnc => 0x03,
    }
}

impl SecureChannel for Scp03Session {
    fn wrap_and_send(&mut self, client: &mut ApduClient<'_>, ins: u8, p1: u8, p2: u8, data: &[u8]) -> Result<Vec<u8>, CoreError> {
        let cla: u8 = 0x84;
        let lc = data.len() + self.s_mode;
        let mut mac_input = Vec::with_capacity(16 + 5 + data.len());
        mac_input.extend_from_slice(&self.chaining_value);
        mac_input.push(cla);
        mac_input.push(ins);
        mac_input.push(p1);
        mac_input.push(p2);
        mac_input.push(lc as u8);
        mac_input.extend_from_slice(data);

        let full_cmac = aes_cmac(&self.s_mac, &mac_input);
        self.chaining_value = full_cmac;

        let mut wrapped = data.to_vec();
        wrapped.extend_from_slice(&full_cmac[..self.s_mode]);
        let cmd = Command::new(cla, ins, p1, p2).with_data(wrapped).with_le(0);
        let (resp, sw) = client.send(cmd)?;

        if sw.is_success() || sw.data_remaining().is_some() {
            Ok(resp)
        } else {
            Err(CoreError::Apdu { sw: sw.0, mnemonic: sw.mnemonic(), context: Some(format!("GP command INS={ins:#04X}")), retries_left: sw.retries_left() })
        }
    }
}

impl Scp03Session {
    pub fn security_level(&self) -> SecurityLevel {
        self.security_level
    }

    pub(crate) fn s_enc(&self) -> &[u8; 16] {
        &self.s_enc
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apdu::transport::mock::MockTransport;
    use crate::apdu::TransportPolicy;

    const STATIC_KEY: [u8; 16] = [0x41; 16];

    #[test]
    fn kdf_constants_produce_distinct_keys() {
        let ctx = [0xAAu8; 16];
        let enc = kdf(&STATIC_KEY, DERIVE_S_ENC, &ctx, 16);
        let mac = kdf(&STATIC_KEY, DERIVE_S_MAC, &ctx, 16);
        assert_ne!(enc, mac);
    }

    #[test]
    fn chaining_value_changes_every_call() {
        let mut session = Scp03Session {
            s_enc: STATIC_KEY,
            s_mac: STATIC_KEY,
            s_rmac: STATIC_KEY,
            chaining_value: [0u8; 16],
            s_mode: 8,
            security_level: SecurityLevel::CMac,
        };
        let mut transport = MockTransport::new(vec![vec![0x90, 0x00], vec![0x90, 0x00]]);
        let mut client = ApduClient::new(&mut transport, TransportPolicy::default());
        session.wrap_and_send(&mut client, 0xE4, 0x00, 0x00, b"first").unwrap();
        let chain_after_first = session.chaining_value;
        session.wrap_and_send(&mut client, 0xE4, 0x00, 0x00, b"second").unwrap();
        assert_ne!(chain_after_first, session.chaining_value);
    }

    #[test]
    fn open_fails_on_tampered_card_cryptogram() {
        let mut init_resp = vec![0u8; 10];
        init_resp.push(0x00);
        init_resp.push(0x03); // SCP-ID = SCP03
        init_resp.push(0x00);
        init_resp.extend_from_slice(&[0xAA; 8]); // card challenge (8-byte s-mode)
        init_resp.extend_from_slice(&[0x00; 8]); // bogus card cryptogram
        init_resp.extend_from_slice(&[0x90, 0x00]);

        let mut transport = MockTransport::new(vec![init_resp]);
        let mut client = ApduClient::new(&mut transport, TransportPolicy::default());
        let result = open(&mut client, 0x00, &STATIC_KEY, &STATIC_KEY, &[0x11; 8], SecurityLevel::CMac);
        assert!(result.is_err());
    }
}
