//! `VERIFY` (INS `0x20`) and `CHANGE REFERENCE DATA` (INS `0x24`): PIN/ADM
//! presentation. Both pad the reference data to 8 bytes with `0xFF`, per the
//! common (U)SIM convention for CHV/ADM codes.

use super::command::Command;
use super::transport::ApduClient;
use crate::error::CoreError;

const REFERENCE_LEN: usize = 8;

fn pad_reference(code: &[u8]) -> Result<[u8; REFERENCE_LEN], CoreError> {
    if code.len() > REFERENCE_LEN {
        return Err(CoreError::invalid_length("PIN/ADM reference data", "<= 8 bytes", code.len()));
    }
    let mut padded = [0xFFu8; REFERENCE_LEN];
    padded[..code.len()].copy_from_slice(code);
    Ok(padded)
}

/// Presents a PIN/ADM code against reference `p2` (e.g. `0x01` for CHV1,
/// `0x0A` for ADM1). Returns the remaining retry count from a `63CX` failure,
/// if the card reports one, via the propagated error.
pub fn verify(client: &mut ApduClient<'_>, p2: u8, code: &[u8]) -> Result<(), CoreError> {
    let reference = pad_reference(code)?;
    let cmd = Command::new(0x00, 0x20, 0x00, p2).with_data(reference.to_vec());
    let (_, sw) = client.send(cmd)?;
    if sw.is_success() {
        Ok(())
    } else {
        Err(CoreError::Apdu {
            sw: sw.0,
            mnemonic: sw.mnemonic(),
            context: Some(format!("VERIFY P2={p2:#04X}")),
            retries_left: sw.retries_left(),
        })
    }
}

/// Replaces a PIN/ADM reference with a new value, presenting the old one in
/// the same command (`old || new`, both padded to 8 bytes).
pub fn change_reference_data(client: &mut ApduClient<'_>, p2: u8, old: &[u8], new: &[u8]) -> Result<(), CoreError> {
    let old = pad_reference(old)?;
    let new = pad_reference(new)?;
    let mut data = Vec::with_capacity(REFERENCE_LEN * 2);
    data.extend_from_slice(&old);
    data.extend_from_slice(&new);
    let cmd = Command::new(0x00, 0x24, 0x00, p2).with_data(data);
    let (_, sw) = client.send(cmd)?;
    if sw.is_success() {
        Ok(())
    } else {
        Err(CoreError::Apdu {
            sw: sw.0,
            mnemonic: sw.mnemonic(),
            context: Some(format!("CHANGE REFERENCE DATA P2={p2:#04X}")),
            retries_left: sw.retries_left(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::transport::mock::MockTransport;
    use super::super::transport::TransportPolicy;
    use super::*;

    #[test]
    fn verify_pads_short_pin_with_ff() {
        let mut transport = MockTransport::new(vec![vec![0x90, 0x00]]);
        let mut client = ApduClient::new(&mut transport, TransportPolicy::default());
        verify(&mut client, 0x01, b"1234").unwrap();
        let sent = &transport.sent[0];
        assert_eq!(&sent[5..], &[0x31, 0x32, 0x33, 0x34, 0xFF, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn verify_reports_retries_left_on_failure() {
        let mut transport = MockTransport::new(vec![vec![0x63, 0xC2]]);
        let mut client = ApduClient::new(&mut transport, TransportPolicy::default());
        let err = verify(&mut client, 0x01, b"0000").unwrap_err();
        assert_eq!(err.retries_left(), Some(2));
    }

    #[test]
    fn rejects_oversized_reference() {
        let mut transport = MockTransport::new(vec![]);
        let mut client = ApduClient::new(&mut transport, TransportPolicy::default());
        assert!(verify(&mut client, 0x01, b"123456789").is_err());
    }

    #[test]
    fn change_reference_data_concatenates_old_and_new() {
        let mut transport = MockTransport::new(vec![vec![0x90, 0x00]]);
        let mut client = ApduClient::new(&mut transport, TransportPolicy::default());
        change_reference_data(&mut client, 0x0A, b"OLDADM1", b"NEWADM2").unwrap();
        let sent = &transport.sent[0];
        assert_eq!(sent.len(), 5 + 16);
    }
}
