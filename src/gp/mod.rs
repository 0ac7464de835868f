//! Component D: the GlobalPlatform secure channel. [`scp02`] and [`scp03`]
//! implement the two handshake/session variants; both present the same
//! [`SecureChannel`] trait so the command builders below and the driver
//! layer never need to know which one is in use. [`autoprobe`] discovers
//! working keys/KVN/AID combinations when none are known up front.

pub mod autoprobe;
pub mod scp02;
pub mod scp03;

use crate::apdu::{ApduClient, Command};
use crate::error::CoreError;

/// Default Security Domain AID tried first.
pub const ISD_AID_DEFAULT: [u8; 8] = [0xA0, 0x00, 0x00, 0x00, 0x03, 0x00, 0x00, 0x00];
/// A common alternate ISD AID tried during auto-probe.
pub const ISD_AID_COMMON: [u8; 9] = [0xA0, 0x00, 0x00, 0x01, 0x51, 0x00, 0x00, 0x00, 0x00];

/// `C-MAC` only, or `C-MAC` plus command-data encryption.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityLevel {
    CMac,
    CMacAndCEnc,
}

/// A live, mutually-authenticated GP session: wraps outgoing proprietary
/// commands with the protocol's C-MAC (and, if enabled, C-ENC) and sends
/// them through the APDU layer.
pub trait SecureChannel {
    /// Wraps `cla_hint`/`ins`/`p1`/`p2`/`data` with C-MAC (and optional
    /// C-ENC), forces the secure class byte `0x84`, sends it, and returns
    /// the card's response data (status errors propagate).
    fn wrap_and_send(
        &mut self,
        client: &mut ApduClient<'_>,
        ins: u8,
        p1: u8,
        p2: u8,
        data: &[u8],
    ) -> Result<Vec<u8>, CoreError>;
}

/// `INSTALL [for load]` (INS `0xE6`, P1 `0x02`): registers a load file's
/// AID/size/privileges before the `LOAD` blocks are sent.
pub fn install_for_load(channel: &mut dyn SecureChannel, client: &mut ApduClient<'_>, load_file_aid: &[u8], sd_aid: &[u8]) -> Result<Vec<u8>, CoreError> {
    let mut data = Vec::new();
    data.push(load_file_aid.len() as u8);
    data.extend_from_slice(load_file_aid);
    data.push(sd_aid.len() as u8);
    data.extend_from_slice(sd_aid);
    data.push(0x00); // no load file data block hash
    data.push(0x00); // no load parameters
    data.push(0x00); // no load token
    channel.wrap_and_send(client, 0xE6, 0x02, 0x00, &data)
}

/// `LOAD` (INS `0xE8`): one block of a CAP file load sequence.
/// `block_number` is 0-based; `last` marks the final block (`P1=0x80`).
pub fn load_block(channel: &mut dyn SecureChannel, client: &mut ApduClient<'_>, block_number: u8, last: bool, block: &[u8]) -> Result<Vec<u8>, CoreError> {
    let p1 = if last { 0x80 } else { 0x00 };
    channel.wrap_and_send(client, 0xE8, p1, block_number, block)
}

/// `INSTALL [for install]` (INS `0xE6`, P1 `0x0C`): instantiates an applet
/// from an already-loaded package.
#[allow(clippy::too_many_arguments)]
pub fn install_for_install(
    channel: &mut dyn SecureChannel,
    client: &mut ApduClient<'_>,
    package_aid: &[u8],
    applet_aid: &[u8],
    instance_aid: &[u8],
    privileges: &[u8],
    install_params: &[u8],
) -> Result<Vec<u8>, CoreError> {
    let mut data = Vec::new();
    data.push(package_aid.len() as u8);
    data.extend_from_slice(package_aid);
    data.push(applet_aid.len() as u8);
    data.extend_from_slice(applet_aid);
    data.push(instance_aid.len() as u8);
    data.extend_from_slice(instance_aid);
    data.push(privileges.len() as u8);
    data.extend_from_slice(privileges);
    data.push(install_params.len() as u8);
    data.extend_from_slice(install_params);
    data.push(0x00); // no install token
    channel.wrap_and_send(client, 0xE6, 0x0C, 0x00, &data)
}

/// `DELETE` (INS `0xE4`): removes an AID (applet instance or package).
pub fn delete(channel: &mut dyn SecureChannel, client: &mut ApduClient<'_>, aid: &[u8]) -> Result<Vec<u8>, CoreError> {
    let mut data = vec![0x4F, aid.len() as u8];
    data.extend_from_slice(aid);
    channel.wrap_and_send(client, 0xE4, 0x00, 0x00, &data)
}

/// `GET STATUS` (INS `0xF2`): lists ISD/applet/package registry entries.
/// `p1`: `0x80` ISD, `0x40` applications, `0x20` load files.
pub fn get_status(channel: &mut dyn SecureChannel, client: &mut ApduClient<'_>, p1: u8) -> Result<Vec<u8>, CoreError> {
    let data = vec![0x4F, 0x00];
    channel.wrap_and_send(client, 0xF2, p1, 0x02, &data)
}

/// `STORE DATA` (INS `0xE2`): generic post-personalization data push.
pub fn store_data(channel: &mut dyn SecureChannel, client: &mut ApduClient<'_>, p1: u8, data: &[u8]) -> Result<Vec<u8>, CoreError> {
    channel.wrap_and_send(client, 0xE2, p1, 0x00, data)
}

/// Issues `INITIALIZE UPDATE` (INS `0x50`), trying the `{CLA=0x80,
/// CLA=0x00} × {with Le, without Le}` variants the handshake spec allows,
/// and returns the raw response body (status trailer stripped by
/// [`ApduClient::send`]).
pub(crate) fn initialize_update(client: &mut ApduClient<'_>, kvn: u8, host_challenge: &[u8]) -> Result<Vec<u8>, CoreError> {
    for (cla, with_le) in [(0x80u8, true), (0x00, true), (0x80, false), (0x00, false)] {
        let mut cmd = Command::new(cla, 0x50, kvn, 0x00).with_data(host_challenge.to_vec());
        if with_le {
            cmd = cmd.with_le(0);
        }
        let (data, sw) = client.send(cmd)?;
        if sw.is_success() {
            return Ok(data);
        }
    }
    Err(CoreError::Session("INITIALIZE UPDATE rejected under all CLA/Le variants"))
}
