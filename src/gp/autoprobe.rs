//! Auto-probing for an unknown Security Domain key/KVN/AID combination:
//! enumerate candidates and check only the card-cryptogram step of the
//! handshake, since a failed `EXTERNAL AUTHENTICATE` burns a retry counter
//! on the card but a failed cryptogram check does not.

use super::{ISD_AID_COMMON, ISD_AID_DEFAULT};
use crate::apdu::ApduClient;
use crate::error::CoreError;
use log::{debug, info};

/// Standard KVNs, the SCP02 reserved range, and the PSK ranges called out
/// for this population.
pub fn candidate_kvns() -> Vec<u8> {
    let mut kvns = vec![0x00, 0x01, 0x02, 0x03];
    kvns.extend(0x20..=0x2F);
    kvns.push(0x40);
    kvns.push(0x41);
    kvns.push(0xFF);
    kvns
}

/// Security Domain AIDs tried in order.
pub fn candidate_sd_aids() -> Vec<Vec<u8>> {
    vec![ISD_AID_DEFAULT.to_vec(), ISD_AID_COMMON.to_vec()]
}

/// One static-key candidate to probe: SCP02 needs a single 24-byte 3DES
/// key, SCP03 needs separate AES ENC/MAC keys.
#[derive(Debug, Clone)]
pub enum KeysetCandidate {
    Scp02 { kvn: u8, static_key24: [u8; 24] },
    Scp03 { kvn: u8, enc_key: [u8; 16], mac_key: [u8; 16] },
}

/// The first keyset/AID/KVN combination whose card cryptogram verifies.
#[derive(Debug, Clone)]
pub struct ProbeResult {
    pub sd_aid: Vec<u8>,
    pub keyset: KeysetCandidate,
}

/// Tries each `(sd_aid, keyset)` pair in order: selects the AID, runs just
/// enough of the handshake to verify the card cryptogram, and returns on
/// the first match without ever issuing `EXTERNAL AUTHENTICATE`.
pub fn probe(client: &mut ApduClient<'_>, keysets: &[KeysetCandidate], host_challenge8: &[u8; 8]) -> Result<ProbeResult, CoreError> {
    for sd_aid in candidate_sd_aids() {
        if client.select_by_aid(&sd_aid).is_err() {
            debug!("auto-probe: SD AID {} not selectable, skipping", hex::encode_upper(&sd_aid));
            continue;
        }
        for keyset in keysets {
            match verify_cryptogram_only(client, keyset, host_challenge8) {
                Ok(true) => {
                    info!("auto-probe: matched SD AID {}", hex::encode_upper(&sd_aid));
                    return Ok(ProbeResult { sd_aid, keyset: keyset.clone() });
                }
                Ok(false) => continue,
                Err(e) => {
                    debug!("auto-probe: keyset candidate rejected: {e}");
                    continue;
                }
            }
        }
    }
    Err(CoreError::Session("auto-probe exhausted all SD AID / keyset / KVN candidates"))
}

fn verify_cryptogram_only(client: &mut ApduClient<'_>, keyset: &KeysetCandidate, host_challenge8: &[u8; 8]) -> Result<bool, CoreError> {
    match keyset {
        KeysetCandidate::Scp02 { kvn, static_key24 } => {
            match super::scp02::derive_and_verify(client, *kvn, static_key24, host_challenge8) {
                Ok(_) => Ok(true),
                Err(CoreError::CryptoVerification(_)) => Ok(false),
                Err(e) => Err(e),
            }
        }
        KeysetCandidate::Scp03 { kvn, enc_key, mac_key } => {
            match super::scp03::derive_and_verify(client, *kvn, enc_key, mac_key, host_challenge8) {
                Ok(_) => Ok(true),
                Err(CoreError::CryptoVerification(_)) => Ok(false),
                Err(e) => Err(e),
            }
        }
    }
}
