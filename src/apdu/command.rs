//! ISO 7816-4 command APDU framing: the four "cases" (no data/no Le, Le
//! only, data only, data+Le), plus the extended-length variant for data or
//! expected-length values beyond the short-form 255-byte limit.

use crate::error::CoreError;

/// One APDU command, framed lazily by [`Command::to_bytes`].
#[derive(Debug, Clone)]
pub struct Command {
    pub cla: u8,
    pub ins: u8,
    pub p1: u8,
    pub p2: u8,
    pub data: Vec<u8>,
    pub le: Option<u32>,
    pub extended: bool,
}

impl Command {
    pub fn new(cla: u8, ins: u8, p1: u8, p2: u8) -> Self {
        Command { cla, ins, p1, p2, data: Vec::new(), le: None, extended: false }
    }

    pub fn with_data(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.data = data.into();
        self
    }

    pub fn with_le(mut self, le: u32) -> Self {
        self.le = Some(le);
        self
    }

    pub fn extended(mut self) -> Self {
        self.extended = true;
        self
    }

    /// Serialize to wire bytes, choosing short or extended-length framing.
    pub fn to_bytes(&self) -> Result<Vec<u8>, CoreError> {
        let needs_extended = self.extended || self.data.len() > 255 || self.le.is_some_and(|le| le > 256);
        let mut out = vec![self.cla, self.ins, self.p1, self.p2];

        if needs_extended {
            if self.data.len() > 65535 {
                return Err(CoreError::invalid_length("data", "<= 65535 bytes", self.data.len()));
            }
            if !self.data.is_empty() {
                out.push(0x00);
                out.extend_from_slice(&(self.data.len() as u16).to_be_bytes());
                out.extend_from_slice(&self.data);
                if let Some(le) = self.le {
                    out.extend_from_slice(&(le as u16).to_be_bytes());
                }
            } else if let Some(le) = self.le {
                out.push(0x00);
                out.extend_from_slice(&(le as u16).to_be_bytes());
            }
        } else {
            if !self.data.is_empty() {
                out.push(self.data.len() as u8);
                out.extend_from_slice(&self.data);
            }
            if let Some(le) = self.le {
                out.push(le as u8);
            }
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn case1_no_data_no_le() {
        let bytes = Command::new(0x00, 0xA4, 0x04, 0x0C).to_bytes().unwrap();
        assert_eq!(bytes, vec![0x00, 0xA4, 0x04, 0x0C]);
    }

    #[test]
    fn case2_le_only() {
        let bytes = Command::new(0x00, 0x84, 0x00, 0x00).with_le(0x08).to_bytes().unwrap();
        assert_eq!(bytes, vec![0x00, 0x84, 0x00, 0x00, 0x08]);
    }

    #[test]
    fn case3_data_only() {
        let bytes = Command::new(0x00, 0xA4, 0x04, 0x0C).with_data(vec![0xA0, 0x00]).to_bytes().unwrap();
        assert_eq!(bytes, vec![0x00, 0xA4, 0x04, 0x0C, 0x02, 0xA0, 0x00]);
    }

    #[test]
    fn case4_data_and_le() {
        let bytes = Command::new(0x00, 0x88, 0x00, 0x00)
            .with_data(vec![0x01, 0x02])
            .with_le(0x00)
            .to_bytes()
            .unwrap();
        assert_eq!(bytes, vec![0x00, 0x88, 0x00, 0x00, 0x02, 0x01, 0x02, 0x00]);
    }

    #[test]
    fn extended_case3_data_only() {
        let data = vec![0x42u8; 300];
        let bytes = Command::new(0x00, 0xD6, 0x00, 0x00).with_data(data.clone()).to_bytes().unwrap();
        assert_eq!(&bytes[..4], &[0x00, 0xD6, 0x00, 0x00]);
        assert_eq!(bytes[4], 0x00);
        assert_eq!(u16::from_be_bytes([bytes[5], bytes[6]]), 300);
        assert_eq!(&bytes[7..], &data[..]);
    }

    #[test]
    fn extended_le_forced() {
        let bytes = Command::new(0x00, 0xB0, 0x00, 0x00).with_le(65536.min(65535)).extended().to_bytes();
        assert!(bytes.is_ok());
    }
}
