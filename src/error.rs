//! Error types for the core.
//!
//! Every function in this crate fails early and reports one of the four
//! error families from the design notes: validation, cryptographic, APDU and
//! transport. `CoreError::kind` recovers which family a given error belongs
//! to so callers can decide whether to retry.

use thiserror::Error;

/// Coarse error family, independent of the specific variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input caught before any crypto primitive ran.
    Validation,
    /// A MAC, cryptogram or signature did not verify.
    Crypto,
    /// The card returned a non-success status word that was not auto-remediated.
    Apdu,
    /// The reader/transport itself misbehaved.
    Transport,
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid length for {field}: expected {expected}, got {actual}")]
    InvalidLength {
        field: &'static str,
        expected: &'static str,
        actual: usize,
    },

    #[error("unsupported configuration: {0}")]
    UnsupportedConfig(&'static str),

    #[error("malformed hex input: {0}")]
    MalformedHex(#[from] hex::FromHexError),

    #[error("cryptographic verification failed: {0}")]
    CryptoVerification(&'static str),

    #[error("could not decode response: {0}")]
    DecodeError(&'static str),

    #[error("card status {sw:04X} ({mnemonic}){}", context.as_deref().map(|c| format!(": {c}")).unwrap_or_default())]
    Apdu {
        sw: u16,
        mnemonic: &'static str,
        context: Option<String>,
        retries_left: Option<u8>,
    },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("secure channel error: {0}")]
    Session(&'static str),

    #[error("write failed at slot \"{slot}\": {source}")]
    WriteFailed {
        slot: &'static str,
        #[source]
        source: Box<CoreError>,
    },
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::InvalidLength { .. }
            | CoreError::UnsupportedConfig(_)
            | CoreError::MalformedHex(_) => ErrorKind::Validation,
            CoreError::CryptoVerification(_) | CoreError::DecodeError(_) => ErrorKind::Crypto,
            CoreError::Apdu { .. } | CoreError::Session(_) => ErrorKind::Apdu,
            CoreError::Transport(_) => ErrorKind::Transport,
            CoreError::WriteFailed { source, .. } => source.kind(),
        }
    }

    /// The numeric status word, if this error came from an APDU exchange.
    pub fn status_word(&self) -> Option<u16> {
        match self {
            CoreError::Apdu { sw, .. } => Some(*sw),
            CoreError::WriteFailed { source, .. } => source.status_word(),
            _ => None,
        }
    }

    /// Remaining PIN/ADM retries, if known (from a `63CX` status word).
    pub fn retries_left(&self) -> Option<u8> {
        match self {
            CoreError::Apdu { retries_left, .. } => *retries_left,
            CoreError::WriteFailed { source, .. } => source.retries_left(),
            _ => None,
        }
    }

    pub(crate) fn invalid_length(field: &'static str, expected: &'static str, actual: usize) -> Self {
        CoreError::InvalidLength { field, expected, actual }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
