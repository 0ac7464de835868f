//! RuSIM/OX24-class cards: `Ki`/`OPc` personalization on this family is done
//! through vendor `.pcom` scripting, which is out of this core's scope (the
//! scripting engine is an external collaborator). What the core does own is
//! the proprietary USIM algorithm-selector byte at EF `8F90`.

use super::{AlgorithmKind, CardDescriptor, CardDriver};
use crate::apdu::ApduClient;
use crate::error::CoreError;

const ALGO_SELECTOR_FILE: u16 = 0x8F90;

fn algo_selector_byte(algorithm: AlgorithmKind) -> u8 {
    match algorithm {
        AlgorithmKind::Milenage => 0x1F,
        AlgorithmKind::S3g128 => 0x2E,
        AlgorithmKind::Tuak => 0x3D,
        AlgorithmKind::S3g256 => 0x4C,
    }
}

pub struct RuSimOx24;

impl CardDriver for RuSimOx24 {
    fn descriptor(&self) -> &CardDescriptor {
        static DESC: CardDescriptor = CardDescriptor {
            type_name: "rusim-ox24",
            human_name: "RuSIM/OX24",
            atr_prefix: &[0x3B, 0x9F, 0x94, 0x80],
            requires_gsm_class: false,
        };
        &DESC
    }

    fn write_ki(&self, _client: &mut ApduClient<'_>, _ki: &[u8]) -> Result<(), CoreError> {
        Err(CoreError::UnsupportedConfig("RuSIM/OX24 Ki personalization requires .pcom scripting, outside this core"))
    }

    fn write_opc(&self, _client: &mut ApduClient<'_>, _opc: &[u8]) -> Result<(), CoreError> {
        Err(CoreError::UnsupportedConfig("RuSIM/OX24 OPc personalization requires .pcom scripting, outside this core"))
    }

    fn set_algorithm(&self, client: &mut ApduClient<'_>, algorithm: AlgorithmKind) -> Result<(), CoreError> {
        client.select_by_id(ALGO_SELECTOR_FILE)?;
        client.update_binary(0, &[algo_selector_byte(algorithm)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apdu::transport::mock::MockTransport;
    use crate::apdu::{ApduClient, TransportPolicy};

    #[test]
    fn set_algorithm_writes_selector_byte() {
        let mut transport = MockTransport::new(vec![vec![0x90, 0x00], vec![0x90, 0x00]]);
        let mut client = ApduClient::new(&mut transport, TransportPolicy::default());
        RuSimOx24.set_algorithm(&mut client, AlgorithmKind::Tuak).unwrap();
        let update = &transport.sent[1];
        assert_eq!(update[5], 0x3D);
    }

    #[test]
    fn ki_and_opc_writes_are_refused() {
        let mut transport = MockTransport::new(vec![]);
        let mut client = ApduClient::new(&mut transport, TransportPolicy::default());
        assert!(RuSimOx24.write_ki(&mut client, &[0u8; 16]).is_err());
        assert!(RuSimOx24.write_opc(&mut client, &[0u8; 16]).is_err());
    }
}
