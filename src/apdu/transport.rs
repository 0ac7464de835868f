//! Component C: the APDU transport. Wraps a caller-supplied [`Transport`]
//! (the one blocking primitive this crate depends on) with status-word
//! dispatch, chained read/write and class-byte fallback, per spec.md §4.C.

use super::command::Command;
use super::status::StatusWord;
use crate::error::CoreError;
use log::{debug, trace, warn};

/// The single blocking primitive the core needs from a reader. Callers
/// implement this over PC/SC, a Proxmark3, a mock, or anything else; the
/// core never talks to hardware directly.
pub trait Transport {
    fn transmit(&mut self, apdu: &[u8]) -> Result<Vec<u8>, CoreError>;
}

/// How aggressively the transport auto-remediates non-success status words.
/// Replaces the source's global `UseGSMCommands`-style flags with an
/// explicit value threaded through every call.
#[derive(Debug, Clone)]
pub struct TransportPolicy {
    /// `Auto`: only fall back to GSM class (`0xA0`) on `6E00`/`6D00`.
    /// `ForceA0`: always use `0xA0` as the base class byte.
    pub gsm_mode: GsmMode,
    /// Retry once with `CLA=0xA0` on `6E00`/`6D00`.
    pub gsm_class_fallback: bool,
    /// Retry once with `Le` set from `6CXX`.
    pub retry_wrong_le: bool,
    /// Issue `GET RESPONSE` automatically on `61XX` for these instruction
    /// bytes (SELECT by default).
    pub auto_get_response_ins: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GsmMode {
    Auto,
    ForceA0,
}

impl Default for TransportPolicy {
    fn default() -> Self {
        TransportPolicy {
            gsm_mode: GsmMode::Auto,
            gsm_class_fallback: true,
            retry_wrong_le: true,
            auto_get_response_ins: vec![0xA4],
        }
    }
}

/// High-level APDU client: a `Transport` plus the policy governing its
/// auto-remediation, and the read/write/select helpers built on top.
pub struct ApduClient<'t> {
    transport: &'t mut dyn Transport,
    policy: TransportPolicy,
}

fn split_response(raw: &[u8]) -> Result<(Vec<u8>, StatusWord), CoreError> {
    if raw.len() < 2 {
        return Err(CoreError::Transport(format!("response too short: {} bytes", raw.len())));
    }
    let n = raw.len();
    Ok((raw[..n - 2].to_vec(), StatusWord::from_bytes(raw[n - 2], raw[n - 1])))
}

impl<'t> ApduClient<'t> {
    pub fn new(transport: &'t mut dyn Transport, policy: TransportPolicy) -> Self {
        ApduClient { transport, policy }
    }

    fn base_class(&self, requested: u8) -> u8 {
        if self.policy.gsm_mode == GsmMode::ForceA0 {
            0xA0
        } else {
            requested
        }
    }

    /// Send one command, applying `6CXX` retry, `61XX` GET RESPONSE and
    /// `6E00`/`6D00` class fallback as the policy allows.
    pub fn send(&mut self, mut cmd: Command) -> Result<(Vec<u8>, StatusWord), CoreError> {
        cmd.cla = self.base_class(cmd.cla);
        let bytes = cmd.to_bytes()?;
        trace!("-> {}", hex::encode_upper(&bytes));
        let raw = self.transport.transmit(&bytes)?;
        let (mut data, mut sw) = split_response(&raw)?;
        trace!("<- {} data={}", sw, hex::encode_upper(&data));

        if self.policy.retry_wrong_le {
            if let Some(correct_le) = sw.wrong_le() {
                debug!("retrying with Le={correct_le:#04X} after 6CXX");
                let retried = cmd.clone().with_le(correct_le as u32);
                let bytes = retried.to_bytes()?;
                let raw = self.transport.transmit(&bytes)?;
                let (d, s) = split_response(&raw)?;
                data = d;
                sw = s;
            }
        }

        if let Some(remaining) = sw.data_remaining() {
            if self.policy.auto_get_response_ins.contains(&cmd.ins) {
                debug!("auto GET RESPONSE for {remaining} bytes");
                let get_response = Command::new(cmd.cla, 0xC0, 0x00, 0x00).with_le(remaining as u32);
                let bytes = get_response.to_bytes()?;
                let raw = self.transport.transmit(&bytes)?;
                let (d, s) = split_response(&raw)?;
                data = d;
                sw = s;
            }
        }

        if sw.class_or_ins_unsupported() && self.policy.gsm_class_fallback && cmd.cla != 0xA0 {
            warn!("{sw} on CLA={:#04X}, retrying with GSM class 0xA0", cmd.cla);
            let mut fallback = cmd;
            fallback.cla = 0xA0;
            let bytes = fallback.to_bytes()?;
            let raw = self.transport.transmit(&bytes)?;
            let (d, s) = split_response(&raw)?;
            data = d;
            sw = s;
        }

        Ok((data, sw))
    }

    fn apdu_error(&self, sw: StatusWord, context: &str) -> CoreError {
        CoreError::Apdu {
            sw: sw.0,
            mnemonic: sw.mnemonic(),
            context: Some(context.to_string()),
            retries_left: sw.retries_left(),
        }
    }

    /// `SELECT` by 2-byte file identifier. Retries `P2 ∈ {0x00, 0x0C}` and
    /// with/without a trailing `Le` on `6A86`.
    pub fn select_by_id(&mut self, id: u16) -> Result<Vec<u8>, CoreError> {
        let id_bytes = id.to_be_bytes();
        for (p2, with_le) in [(0x04u8, false), (0x00, false), (0x0C, false), (0x04, true), (0x00, true), (0x0C, true)] {
            let mut cmd = Command::new(0x00, 0xA4, 0x00, p2).with_data(id_bytes.to_vec());
            if with_le {
                cmd = cmd.with_le(0);
            }
            let (data, sw) = self.send(cmd)?;
            if sw.is_success() || sw.data_remaining().is_some() {
                return Ok(data);
            }
            if sw.0 != 0x6A86 {
                return Err(self.apdu_error(sw, &format!("SELECT FILE {id:04X}")));
            }
        }
        Err(CoreError::Apdu {
            sw: 0x6A86,
            mnemonic: "incorrect P1/P2",
            context: Some(format!("SELECT FILE {id:04X}: exhausted P2/Le variants")),
            retries_left: None,
        })
    }

    /// `SELECT` by application identifier (DF name).
    pub fn select_by_aid(&mut self, aid: &[u8]) -> Result<Vec<u8>, CoreError> {
        let cmd = Command::new(0x00, 0xA4, 0x04, 0x04).with_data(aid.to_vec());
        let (data, sw) = self.send(cmd)?;
        if sw.is_success() || sw.data_remaining().is_some() {
            Ok(data)
        } else {
            Err(self.apdu_error(sw, &format!("SELECT AID {}", hex::encode_upper(aid))))
        }
    }

    /// `SELECT` by path, from the MF.
    pub fn select_by_path(&mut self, path: &[u8]) -> Result<Vec<u8>, CoreError> {
        let cmd = Command::new(0x00, 0xA4, 0x08, 0x04).with_data(path.to_vec());
        let (data, sw) = self.send(cmd)?;
        if sw.is_success() || sw.data_remaining().is_some() {
            Ok(data)
        } else {
            Err(self.apdu_error(sw, &format!("SELECT PATH {}", hex::encode_upper(path))))
        }
    }

    /// `READ BINARY` at a byte offset, for up to 255 (or, with `extended`,
    /// 65535) bytes in one exchange.
    pub fn read_binary(&mut self, offset: u16, length: u8) -> Result<Vec<u8>, CoreError> {
        let [p1, p2] = offset.to_be_bytes();
        let cmd = Command::new(0x00, 0xB0, p1, p2).with_le(length as u32);
        let (data, sw) = self.send(cmd)?;
        if sw.is_success() {
            Ok(data)
        } else {
            Err(self.apdu_error(sw, &format!("READ BINARY offset={offset}")))
        }
    }

    /// Iteratively reads the whole file in up to 255-byte chunks, stopping
    /// on an empty read or any non-OK status other than `6CXX` (which
    /// `send` already retries transparently).
    pub fn read_all_binary(&mut self, total_size: usize) -> Result<Vec<u8>, CoreError> {
        let mut out = Vec::with_capacity(total_size);
        let mut offset = 0usize;
        while offset < total_size {
            let chunk_len = (total_size - offset).min(255) as u8;
            let [p1, p2] = (offset as u16).to_be_bytes();
            let cmd = Command::new(0x00, 0xB0, p1, p2).with_le(chunk_len as u32);
            let (data, sw) = self.send(cmd)?;
            if !sw.is_success() || data.is_empty() {
                if !sw.is_success() {
                    return Err(self.apdu_error(sw, &format!("READ BINARY offset={offset}")));
                }
                break;
            }
            offset += data.len();
            out.extend_from_slice(&data);
        }
        Ok(out)
    }

    /// `READ RECORD`. `mode`: `0x04` absolute, `0x02` next, `0x03` previous.
    pub fn read_record(&mut self, record_num: u8, length: u8, mode: u8) -> Result<Vec<u8>, CoreError> {
        let cmd = Command::new(0x00, 0xB2, record_num, mode).with_le(length as u32);
        let (data, sw) = self.send(cmd)?;
        if sw.is_success() {
            Ok(data)
        } else {
            Err(self.apdu_error(sw, &format!("READ RECORD {record_num}")))
        }
    }

    /// `UPDATE BINARY`. For data that doesn't fit in one short-form command,
    /// chunks it, halving the chunk size on `6700` down to 16 bytes before
    /// giving up.
    pub fn update_binary(&mut self, offset: u16, data: &[u8]) -> Result<(), CoreError> {
        if data.len() <= 255 {
            let [p1, p2] = offset.to_be_bytes();
            let cmd = Command::new(0x00, 0xD6, p1, p2).with_data(data.to_vec());
            let (_, sw) = self.send(cmd)?;
            return if sw.is_success() {
                Ok(())
            } else {
                Err(self.apdu_error(sw, &format!("UPDATE BINARY offset={offset}")))
            };
        }

        let mut chunk_size = 255usize;
        let mut pos = 0usize;
        while pos < data.len() {
            let end = (pos + chunk_size).min(data.len());
            let [p1, p2] = ((offset as usize + pos) as u16).to_be_bytes();
            let cmd = Command::new(0x00, 0xD6, p1, p2).with_data(data[pos..end].to_vec());
            let (_, sw) = self.send(cmd)?;
            if sw.is_success() {
                pos = end;
                continue;
            }
            if sw.0 == 0x6700 && chunk_size > 16 {
                chunk_size /= 2;
                debug!("UPDATE BINARY 6700, halving chunk to {chunk_size}");
                continue;
            }
            return Err(self.apdu_error(sw, &format!("UPDATE BINARY offset={}", offset as usize + pos)));
        }
        Ok(())
    }

    /// `UPDATE RECORD`, absolute mode.
    pub fn update_record(&mut self, record_num: u8, data: &[u8]) -> Result<(), CoreError> {
        let cmd = Command::new(0x00, 0xDC, record_num, 0x04).with_data(data.to_vec());
        let (_, sw) = self.send(cmd)?;
        if sw.is_success() {
            Ok(())
        } else {
            Err(self.apdu_error(sw, &format!("UPDATE RECORD {record_num}")))
        }
    }
}


#[cfg(test)]
mod tests {
    use super::mock::MockTransport;
    use super::*;

    #[test]
    fn simple_select_ok() {
        let mut transport = MockTransport::new(vec![vec![0x90, 0x00]]);
        let mut client = ApduClient::new(&mut transport, TransportPolicy::default());
        let data = client.select_by_id(0x3F00).unwrap();
        assert!(data.is_empty());
    }

    #[test]
    fn select_retries_on_6a86() {
        let mut transport = MockTransport::new(vec![vec![0x6A, 0x86], vec![0x90, 0x00]]);
        let mut client = ApduClient::new(&mut transport, TransportPolicy::default());
        client.select_by_id(0x6F07).unwrap();
        assert_eq!(transport.sent.len(), 2);
        assert_eq!(transport.sent[1][3], 0x00); // second attempt uses P2=0x00
    }

    #[test]
    fn wrong_le_retries_once() {
        let mut transport = MockTransport::new(vec![vec![0x6C, 0x10], vec![0x01; 0x10].into_iter().chain([0x90, 0x00]).collect()]);
        let mut client = ApduClient::new(&mut transport, TransportPolicy::default());
        let data = client.read_binary(0, 0x08).unwrap();
        assert_eq!(data.len(), 0x10);
    }

    #[test]
    fn get_response_on_61xx_for_select() {
        let mut transport = MockTransport::new(vec![vec![0x61, 0x0A], vec![0xAA; 10].into_iter().chain([0x90, 0x00]).collect()]);
        let mut client = ApduClient::new(&mut transport, TransportPolicy::default());
        let data = client.select_by_id(0x2F00).unwrap();
        assert_eq!(data.len(), 10);
    }

    #[test]
    fn gsm_class_fallback_on_6e00() {
        let mut transport = MockTransport::new(vec![vec![0x6E, 0x00], vec![0x90, 0x00]]);
        let mut client = ApduClient::new(&mut transport, TransportPolicy::default());
        client.select_by_id(0x3F00).unwrap();
        assert_eq!(transport.sent[1][0], 0xA0);
    }

    #[test]
    fn read_all_binary_chunks_and_stops() {
        let mut first = vec![0x11u8; 255];
        first.extend_from_slice(&[0x90, 0x00]);
        let mut second = vec![0x22u8; 10];
        second.extend_from_slice(&[0x90, 0x00]);
        let mut transport = MockTransport::new(vec![first, second]);
        let mut client = ApduClient::new(&mut transport, TransportPolicy::default());
        let data = client.read_all_binary(265).unwrap();
        assert_eq!(data.len(), 265);
    }

    #[test]
    fn update_binary_halves_chunk_on_6700() {
        let big_chunk_fail = vec![0x67, 0x00];
        let ok = vec![0x90, 0x00];
        let mut responses = vec![big_chunk_fail];
        // 300 bytes at 255 fails once, then retried at 127 (2 writes), succeeding both.
        responses.push(ok.clone());
        responses.push(ok);
        let mut transport = MockTransport::new(responses);
        let mut client = ApduClient::new(&mut transport, TransportPolicy::default());
        let data = vec![0x01u8; 300];
        client.update_binary(0, &data).unwrap();
    }
}
