//! `AUTHENTICATE` (INS `0x88`): the command that hands a RAND/AUTN
//! challenge to the card and parses back either a success triplet/quintet
//! (tag `0xDB`), a synchronization failure (tag `0xDC`), or a bare GSM
//! SRES+Kc response carrying no tag at all.

use super::command::Command;
use super::transport::ApduClient;
use crate::error::CoreError;

/// Which context byte (`P2`) to use for the `AUTHENTICATE` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthContext {
    /// Plain GSM authentication: `RAND` only, `SRES || Kc` back.
    Gsm,
    /// 3G security context: `RAND || AUTN` in, `RES/AUTS` tagged out.
    ThreeG,
    /// GBA bootstrapping context.
    GbaBootstrap,
    /// GBA NAF derivation context.
    GbaNaf,
    /// IMS/multimedia authentication context.
    ThreeGIms,
}

impl AuthContext {
    fn p2(self) -> u8 {
        match self {
            AuthContext::Gsm => 0x80,
            AuthContext::ThreeG => 0x81,
            AuthContext::GbaBootstrap => 0x84,
            AuthContext::GbaNaf => 0x83,
            AuthContext::ThreeGIms => 0x85,
        }
    }
}

/// The parsed outcome of a 3G/IMS `AUTHENTICATE` exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthenticateResult {
    /// Tag `0xDB`: `RES || CK || IK [|| Kc]`.
    Success { res: Vec<u8>, ck: Vec<u8>, ik: Vec<u8>, kc: Option<Vec<u8>> },
    /// Tag `0xDC`: `AUTS`, 14/22/38 bytes depending on MAC-S length.
    SyncFailure { auts: Vec<u8> },
    /// No tag: plain GSM `SRES || Kc`.
    Gsm { sres: [u8; 4], kc: [u8; 8] },
}

/// Builds and sends an `AUTHENTICATE` command, then parses the response per
/// the tag conventions above.
pub fn authenticate(
    client: &mut ApduClient<'_>,
    context: AuthContext,
    rand: &[u8; 16],
    autn: Option<&[u8; 16]>,
) -> Result<AuthenticateResult, CoreError> {
    let mut data = Vec::with_capacity(34);
    match context {
        AuthContext::Gsm => data.extend_from_slice(rand),
        _ => {
            let autn = autn.ok_or(CoreError::UnsupportedConfig("AUTN required outside GSM context"))?;
            data.push(rand.len() as u8);
            data.extend_from_slice(rand);
            data.push(autn.len() as u8);
            data.extend_from_slice(autn);
        }
    }

    let cmd = Command::new(0x00, 0x88, 0x00, context.p2()).with_data(data).with_le(0);
    let (resp, sw) = client.send(cmd)?;
    if !sw.is_success() {
        return Err(CoreError::Apdu {
            sw: sw.0,
            mnemonic: sw.mnemonic(),
            context: Some("AUTHENTICATE".to_string()),
            retries_left: sw.retries_left(),
        });
    }

    parse_authenticate_response(context, &resp)
}

fn parse_authenticate_response(context: AuthContext, resp: &[u8]) -> Result<AuthenticateResult, CoreError> {
    if context == AuthContext::Gsm {
        if resp.len() != 12 {
            return Err(CoreError::DecodeError("GSM AUTHENTICATE response must be 12 bytes (SRES||Kc)"));
        }
        let sres: [u8; 4] = resp[..4].try_into().unwrap();
        let kc: [u8; 8] = resp[4..].try_into().unwrap();
        return Ok(AuthenticateResult::Gsm { sres, kc });
    }

    if resp.is_empty() {
        return Err(CoreError::DecodeError("empty AUTHENTICATE response"));
    }

    match resp[0] {
        0xDB => {
            if resp.len() < 2 {
                return Err(CoreError::DecodeError("truncated success TLV"));
            }
            let len = resp[1] as usize;
            let body = resp.get(2..2 + len).ok_or(CoreError::DecodeError("success TLV length exceeds response"))?;
            parse_success_body(body)
        }
        0xDC => {
            if resp.len() < 2 {
                return Err(CoreError::DecodeError("truncated sync-failure TLV"));
            }
            let len = resp[1] as usize;
            let auts = resp.get(2..2 + len).ok_or(CoreError::DecodeError("sync-failure TLV length exceeds response"))?.to_vec();
            // MAC-S is 8/16/32 bytes depending on the algorithm set, so AUTS
            // (SQN xor AK || MAC-S, SQN/AK fixed at 6 bytes each) is 14/22/38.
            if !matches!(auts.len(), 14 | 22 | 38) {
                return Err(CoreError::invalid_length("AUTS", "14, 22 or 38", auts.len()));
            }
            Ok(AuthenticateResult::SyncFailure { auts })
        }
        // No recognized tag: some cards answer 3G AUTHENTICATE with the bare
        // RES||CK||IK layout (no 0xDB wrapper), each field still length-prefixed.
        _ => parse_success_body(resp),
    }
}

/// Parses `RES_len || RES || CK_len || CK || IK_len || IK [|| Kc]`, the
/// layout used both inside the `0xDB` TLV body and, by some cards, as the
/// entire untagged response.
fn parse_success_body(body: &[u8]) -> Result<AuthenticateResult, CoreError> {
    let res_len = body.first().copied().ok_or(CoreError::DecodeError("missing RES length"))? as usize;
    let mut pos = 1;
    let res = body.get(pos..pos + res_len).ok_or(CoreError::DecodeError("truncated RES"))?.to_vec();
    pos += res_len;
    let ck_len = body.get(pos).copied().ok_or(CoreError::DecodeError("missing CK length"))? as usize;
    pos += 1;
    let ck = body.get(pos..pos + ck_len).ok_or(CoreError::DecodeError("truncated CK"))?.to_vec();
    pos += ck_len;
    let ik_len = body.get(pos).copied().ok_or(CoreError::DecodeError("missing IK length"))? as usize;
    pos += 1;
    let ik = body.get(pos..pos + ik_len).ok_or(CoreError::DecodeError("truncated IK"))?.to_vec();
    pos += ik_len;
    let kc = body.get(pos..pos + 8).map(|s| s.to_vec());
    Ok(AuthenticateResult::Success { res, ck, ik, kc })
}

#[cfg(test)]
mod tests {
    use super::super::transport::mock::MockTransport;
    use super::super::transport::TransportPolicy;
    use super::*;

    #[test]
    fn gsm_response_parses_sres_and_kc() {
        let mut body = vec![0xAA; 4];
        body.extend(vec![0xBB; 8]);
        body.extend([0x90, 0x00]);
        let mut transport = MockTransport::new(vec![body]);
        let mut client = ApduClient::new(&mut transport, TransportPolicy::default());
        let result = authenticate(&mut client, AuthContext::Gsm, &[0u8; 16], None).unwrap();
        match result {
            AuthenticateResult::Gsm { sres, kc } => {
                assert_eq!(sres, [0xAA; 4]);
                assert_eq!(kc, [0xBB; 8]);
            }
            _ => panic!("expected GSM result"),
        }
    }

    #[test]
    fn success_tlv_with_kc_parses() {
        let mut inner = vec![8u8];
        inner.extend(vec![0x01; 8]); // RES
        inner.push(16); // CK length
        inner.extend(vec![0x02; 16]); // CK
        inner.push(16); // IK length
        inner.extend(vec![0x03; 16]); // IK
        inner.extend(vec![0x04; 8]); // Kc
        let mut body = vec![0xDB, inner.len() as u8];
        body.extend(inner);
        body.extend([0x90, 0x00]);
        let mut transport = MockTransport::new(vec![body]);
        let mut client = ApduClient::new(&mut transport, TransportPolicy::default());
        let result = authenticate(&mut client, AuthContext::ThreeG, &[0u8; 16], Some(&[0u8; 16])).unwrap();
        match result {
            AuthenticateResult::Success { res, ck, ik, kc } => {
                assert_eq!(res, vec![0x01; 8]);
                assert_eq!(ck, vec![0x02; 16]);
                assert_eq!(ik, vec![0x03; 16]);
                assert_eq!(kc, Some(vec![0x04; 8]));
            }
            _ => panic!("expected success result"),
        }
    }

    #[test]
    fn success_tlv_with_tuak_32_byte_ck_ik_parses() {
        let mut inner = vec![16u8];
        inner.extend(vec![0x01; 16]); // RES
        inner.push(32); // CK length
        inner.extend(vec![0x02; 32]); // CK
        inner.push(32); // IK length
        inner.extend(vec![0x03; 32]); // IK
        let mut body = vec![0xDB, inner.len() as u8];
        body.extend(inner);
        body.extend([0x90, 0x00]);
        let mut transport = MockTransport::new(vec![body]);
        let mut client = ApduClient::new(&mut transport, TransportPolicy::default());
        let result = authenticate(&mut client, AuthContext::ThreeG, &[0u8; 16], Some(&[0u8; 16])).unwrap();
        match result {
            AuthenticateResult::Success { res, ck, ik, kc } => {
                assert_eq!(res, vec![0x01; 16]);
                assert_eq!(ck, vec![0x02; 32]);
                assert_eq!(ik, vec![0x03; 32]);
                assert_eq!(kc, None);
            }
            _ => panic!("expected success result"),
        }
    }

    #[test]
    fn untagged_response_falls_back_to_success_layout() {
        let mut body = vec![8u8];
        body.extend(vec![0x01; 8]); // RES
        body.push(16); // CK length
        body.extend(vec![0x02; 16]); // CK
        body.push(16); // IK length
        body.extend(vec![0x03; 16]); // IK
        body.extend([0x90, 0x00]);
        let mut transport = MockTransport::new(vec![body]);
        let mut client = ApduClient::new(&mut transport, TransportPolicy::default());
        let result = authenticate(&mut client, AuthContext::ThreeG, &[0u8; 16], Some(&[0u8; 16])).unwrap();
        match result {
            AuthenticateResult::Success { res, ck, ik, kc } => {
                assert_eq!(res, vec![0x01; 8]);
                assert_eq!(ck, vec![0x02; 16]);
                assert_eq!(ik, vec![0x03; 16]);
                assert_eq!(kc, None);
            }
            _ => panic!("expected success result"),
        }
    }

    #[test]
    fn sync_failure_tlv_parses_auts() {
        let auts = vec![0x05u8; 14];
        let mut body = vec![0xDC, auts.len() as u8];
        body.extend(auts.clone());
        body.extend([0x90, 0x00]);
        let mut transport = MockTransport::new(vec![body]);
        let mut client = ApduClient::new(&mut transport, TransportPolicy::default());
        let result = authenticate(&mut client, AuthContext::ThreeG, &[0u8; 16], Some(&[0u8; 16])).unwrap();
        assert_eq!(result, AuthenticateResult::SyncFailure { auts });
    }

    #[test]
    fn sync_failure_tlv_accepts_tuak_auts_lengths() {
        for len in [14usize, 22, 38] {
            let auts = vec![0x05u8; len];
            let mut body = vec![0xDC, auts.len() as u8];
            body.extend(auts.clone());
            body.extend([0x90, 0x00]);
            let mut transport = MockTransport::new(vec![body]);
            let mut client = ApduClient::new(&mut transport, TransportPolicy::default());
            let result = authenticate(&mut client, AuthContext::ThreeG, &[0u8; 16], Some(&[0u8; 16])).unwrap();
            assert_eq!(result, AuthenticateResult::SyncFailure { auts });
        }
    }

    #[test]
    fn sync_failure_tlv_rejects_other_auts_lengths() {
        let auts = vec![0x05u8; 20];
        let mut body = vec![0xDC, auts.len() as u8];
        body.extend(auts);
        body.extend([0x90, 0x00]);
        let mut transport = MockTransport::new(vec![body]);
        let mut client = ApduClient::new(&mut transport, TransportPolicy::default());
        assert!(authenticate(&mut client, AuthContext::ThreeG, &[0u8; 16], Some(&[0u8; 16])).is_err());
    }

    #[test]
    fn requires_autn_outside_gsm() {
        let mut transport = MockTransport::new(vec![]);
        let mut client = ApduClient::new(&mut transport, TransportPolicy::default());
        assert!(authenticate(&mut client, AuthContext::ThreeG, &[0u8; 16], None).is_err());
    }
}
