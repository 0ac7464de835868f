//! GRv2: unlock handshake, `Ki` at a fixed offset in file `0001`, `OPc`
//! length-prefixed in file `6002`, algorithm selector in file `2FD0`.

use super::{AlgorithmKind, CardDescriptor, CardDriver};
use crate::apdu::ApduClient;
use crate::error::CoreError;

pub const ATR_PREFIX: [u8; 4] = [0x3B, 0x9F, 0x96, 0x80];

const KI_FILE: u16 = 0x0001;
const KI_OFFSET: u16 = 3;
const OPC_FILE: u16 = 0x6002;
const ALGO_FILE: u16 = 0x2FD0;

fn algo_type_byte(algorithm: AlgorithmKind) -> u8 {
    match algorithm {
        AlgorithmKind::Milenage => 0x10,
        AlgorithmKind::S3g128 | AlgorithmKind::Tuak | AlgorithmKind::S3g256 => 0x20,
    }
}

pub struct GrV2;

impl CardDriver for GrV2 {
    fn descriptor(&self) -> &CardDescriptor {
        static DESC: CardDescriptor = CardDescriptor {
            type_name: "grv2",
            human_name: "GRv2 programmable card",
            atr_prefix: &ATR_PREFIX,
            requires_gsm_class: true,
        };
        &DESC
    }

    fn prepare_write(&self, client: &mut ApduClient<'_>) -> Result<(), CoreError> {
        let unlock = crate::apdu::Command::new(0xA0, 0x58, 0x00, 0x00).with_data(b"12341234".to_vec());
        let (_, sw) = client.send(unlock)?;
        if sw.is_success() {
            Ok(())
        } else {
            Err(CoreError::Apdu {
                sw: sw.0,
                mnemonic: sw.mnemonic(),
                context: Some("GRv2 unlock handshake".to_string()),
                retries_left: sw.retries_left(),
            })
        }
    }

    fn write_ki(&self, client: &mut ApduClient<'_>, ki: &[u8]) -> Result<(), CoreError> {
        if ki.len() != 16 {
            return Err(CoreError::invalid_length("Ki", "16", ki.len()));
        }
        client.select_by_id(KI_FILE)?;
        client.update_binary(KI_OFFSET, ki)
    }

    fn write_opc(&self, client: &mut ApduClient<'_>, opc: &[u8]) -> Result<(), CoreError> {
        if opc.len() != 16 {
            return Err(CoreError::invalid_length("OPc", "16", opc.len()));
        }
        client.select_by_id(OPC_FILE)?;
        let mut payload = vec![0x01u8];
        payload.extend_from_slice(opc);
        client.update_binary(0, &payload)
    }

    fn set_algorithm(&self, client: &mut ApduClient<'_>, algorithm: AlgorithmKind) -> Result<(), CoreError> {
        client.select_by_id(ALGO_FILE)?;
        client.update_binary(0, &[0x19, algo_type_byte(algorithm)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apdu::transport::mock::MockTransport;
    use crate::apdu::{ApduClient, TransportPolicy};

    #[test]
    fn prepare_write_sends_unlock_handshake() {
        let mut transport = MockTransport::new(vec![vec![0x90, 0x00]]);
        let mut client = ApduClient::new(&mut transport, TransportPolicy::default());
        GrV2.prepare_write(&mut client).unwrap();
        assert_eq!(&transport.sent[0][..4], &[0xA0, 0x58, 0x00, 0x00]);
        assert_eq!(&transport.sent[0][5..], b"12341234");
    }

    #[test]
    fn write_opc_prefixes_with_0x01() {
        let mut transport = MockTransport::new(vec![vec![0x90, 0x00], vec![0x90, 0x00]]);
        let mut client = ApduClient::new(&mut transport, TransportPolicy::default());
        GrV2.write_opc(&mut client, &[0x22; 16]).unwrap();
        let update = &transport.sent[1];
        assert_eq!(update[5], 0x01);
        assert_eq!(&update[6..], &[0x22; 16]);
    }
}
