//! GRv1: the oldest, simplest proprietary layout. Never self-identifies
//! (several other vendors share its ATR prefix family), so it only acts as
//! the explicit fallback when no other driver claims a card.

use super::{CardDescriptor, CardDriver};
use crate::apdu::ApduClient;
use crate::error::CoreError;

const KI_PATH: [u8; 4] = [0x7F, 0xF0, 0xFF, 0x02];
const OPC_PATH: [u8; 4] = [0x7F, 0xF0, 0xFF, 0x01];

pub struct GrV1;

impl CardDriver for GrV1 {
    fn descriptor(&self) -> &CardDescriptor {
        static DESC: CardDescriptor = CardDescriptor {
            type_name: "grv1",
            human_name: "GRv1 generic programmable card",
            atr_prefix: &[],
            requires_gsm_class: true,
        };
        &DESC
    }

    /// Never claims a card by ATR; must be selected explicitly.
    fn identify(&self, _atr: &[u8]) -> bool {
        false
    }

    fn write_ki(&self, client: &mut ApduClient<'_>, ki: &[u8]) -> Result<(), CoreError> {
        select_path(client, &KI_PATH)?;
        client.update_binary(0, ki)
    }

    fn write_opc(&self, client: &mut ApduClient<'_>, opc: &[u8]) -> Result<(), CoreError> {
        select_path(client, &OPC_PATH)?;
        client.update_binary(0, opc)
    }
}

fn select_path(client: &mut ApduClient<'_>, path: &[u8]) -> Result<(), CoreError> {
    client.select_by_path(path)?;
    Ok(())
}
