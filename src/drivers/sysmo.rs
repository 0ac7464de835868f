//! Sysmocom card families: `SJS1` (plain files), `SJA2`/`SJA5` (shared file,
//! offset-addressed, ICCID writes refused for license reasons), and the
//! `GR1`/`GR2` unlock variants that gate writes behind a PIN/CHV verify.

use super::{CardDescriptor, CardDriver};
use crate::apdu::{pin, ApduClient};
use crate::error::CoreError;

pub struct SysmoSjs1;

const SJS1_KI_FILE: u16 = 0x00FF;
const SJS1_OPC_FILE: u16 = 0x00F7;

impl CardDriver for SysmoSjs1 {
    fn descriptor(&self) -> &CardDescriptor {
        static DESC: CardDescriptor = CardDescriptor {
            type_name: "sysmo-sjs1",
            human_name: "sysmocom SJS1",
            atr_prefix: &[0x3B, 0x9F, 0x95, 0x80],
            requires_gsm_class: false,
        };
        &DESC
    }

    fn write_ki(&self, client: &mut ApduClient<'_>, ki: &[u8]) -> Result<(), CoreError> {
        if ki.len() != 16 {
            return Err(CoreError::invalid_length("Ki", "16", ki.len()));
        }
        client.select_by_id(SJS1_KI_FILE)?;
        client.update_binary(0, ki)
    }

    fn write_opc(&self, client: &mut ApduClient<'_>, opc: &[u8]) -> Result<(), CoreError> {
        if opc.len() != 16 {
            return Err(CoreError::invalid_length("OPc", "16", opc.len()));
        }
        client.select_by_id(SJS1_OPC_FILE)?;
        let mut payload = vec![0x01u8];
        payload.extend_from_slice(opc);
        client.update_binary(0, &payload)
    }
}

/// `SJA2`/`SJA5`: `Ki` and `OPc` share one file at fixed offsets. ICCID is
/// refused outright, a license-protection measure on these cards.
pub struct SysmoSja2Sja5;

const SJA2_PATH: [u8; 6] = [0x3F, 0x00, 0xA5, 0x15, 0x6F, 0x20];
const SJA2_KI_OFFSET: u16 = 1;
const SJA2_OPC_OFFSET: u16 = 17;

impl CardDriver for SysmoSja2Sja5 {
    fn descriptor(&self) -> &CardDescriptor {
        static DESC: CardDescriptor = CardDescriptor {
            type_name: "sysmo-sja2-sja5",
            human_name: "sysmocom SJA2/SJA5",
            atr_prefix: &[0x3B, 0x9F, 0x96, 0x00],
            requires_gsm_class: false,
        };
        &DESC
    }

    fn write_ki(&self, client: &mut ApduClient<'_>, ki: &[u8]) -> Result<(), CoreError> {
        if ki.len() != 16 {
            return Err(CoreError::invalid_length("Ki", "16", ki.len()));
        }
        client.select_by_path(&SJA2_PATH)?;
        client.update_binary(SJA2_KI_OFFSET, ki)
    }

    fn write_opc(&self, client: &mut ApduClient<'_>, opc: &[u8]) -> Result<(), CoreError> {
        if opc.len() != 16 {
            return Err(CoreError::invalid_length("OPc", "16", opc.len()));
        }
        client.select_by_path(&SJA2_PATH)?;
        client.update_binary(SJA2_OPC_OFFSET, opc)
    }

    fn write_iccid(&self, _client: &mut ApduClient<'_>, _iccid: &[u8]) -> Result<(), CoreError> {
        Err(CoreError::UnsupportedConfig("SJA2/SJA5 refuse ICCID writes (license protection)"))
    }
}

/// `GR1`: unlocks with `VERIFY PIN ADM1` before any write, otherwise
/// identical file layout to [`SysmoSjs1`].
pub struct SysmoGr1;

impl CardDriver for SysmoGr1 {
    fn descriptor(&self) -> &CardDescriptor {
        static DESC: CardDescriptor = CardDescriptor {
            type_name: "sysmo-gr1",
            human_name: "sysmocom GR1",
            atr_prefix: &[0x3B, 0x9F, 0x97, 0x80],
            requires_gsm_class: false,
        };
        &DESC
    }

    fn prepare_write(&self, client: &mut ApduClient<'_>) -> Result<(), CoreError> {
        pin::verify(client, 0x0A, b"32213232")
    }

    fn write_ki(&self, client: &mut ApduClient<'_>, ki: &[u8]) -> Result<(), CoreError> {
        SysmoSjs1.write_ki(client, ki)
    }

    fn write_opc(&self, client: &mut ApduClient<'_>, opc: &[u8]) -> Result<(), CoreError> {
        SysmoSjs1.write_opc(client, opc)
    }
}

/// `GR2`: unlocks with `VERIFY CHV` instead of ADM1, same file layout.
pub struct SysmoGr2;

impl CardDriver for SysmoGr2 {
    fn descriptor(&self) -> &CardDescriptor {
        static DESC: CardDescriptor = CardDescriptor {
            type_name: "sysmo-gr2",
            human_name: "sysmocom GR2",
            atr_prefix: &[0x3B, 0x9F, 0x97, 0x00],
            requires_gsm_class: false,
        };
        &DESC
    }

    fn prepare_write(&self, client: &mut ApduClient<'_>) -> Result<(), CoreError> {
        // "3838383838383838" in the vendor documentation is the hex dump of
        // this 8-byte ASCII CHV, not the literal character string.
        pin::verify(client, 0x01, b"88888888")
    }

    fn write_ki(&self, client: &mut ApduClient<'_>, ki: &[u8]) -> Result<(), CoreError> {
        SysmoSjs1.write_ki(client, ki)
    }

    fn write_opc(&self, client: &mut ApduClient<'_>, opc: &[u8]) -> Result<(), CoreError> {
        SysmoSjs1.write_opc(client, opc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apdu::transport::mock::MockTransport;
    use crate::apdu::TransportPolicy;

    #[test]
    fn sja2_refuses_iccid_write() {
        let mut transport = MockTransport::new(vec![]);
        let mut client = ApduClient::new(&mut transport, TransportPolicy::default());
        assert!(SysmoSja2Sja5.write_iccid(&mut client, b"12345678").is_err());
    }

    #[test]
    fn gr1_prepare_write_verifies_adm1() {
        let mut transport = MockTransport::new(vec![vec![0x90, 0x00]]);
        let mut client = ApduClient::new(&mut transport, TransportPolicy::default());
        SysmoGr1.prepare_write(&mut client).unwrap();
        let sent = &transport.sent[0];
        assert_eq!(sent[3], 0x0A); // P2 = ADM1 reference
    }

    #[test]
    fn gr2_prepare_write_verifies_chv() {
        let mut transport = MockTransport::new(vec![vec![0x90, 0x00]]);
        let mut client = ApduClient::new(&mut transport, TransportPolicy::default());
        SysmoGr2.prepare_write(&mut client).unwrap();
        let sent = &transport.sent[0];
        assert_eq!(sent[3], 0x01); // P2 = CHV1 reference
    }
}
