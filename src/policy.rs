//! The configuration values the core reads from its caller, per spec.md §6
//! ("Environment/configuration recognized by the core"). Plain structs, no
//! parsing: JSON/CLI/config-file handling is the caller's job.

use crate::auth::{AlgorithmSet, Milenage, Tuak};
use crate::gp::SecurityLevel;
use crate::tuak::TuakParams;

/// Which authentication algorithm family a session is configured for.
#[derive(Debug, Clone, Copy)]
pub enum AlgorithmChoice {
    Milenage,
    Tuak(TuakParams),
}

impl AlgorithmChoice {
    /// The [`AlgorithmSet`] implementation for this choice.
    pub fn engine(self) -> Box<dyn AlgorithmSet> {
        match self {
            AlgorithmChoice::Milenage => Box::new(Milenage),
            AlgorithmChoice::Tuak(params) => Box::new(Tuak { params }),
        }
    }
}

impl Default for AlgorithmChoice {
    fn default() -> Self {
        AlgorithmChoice::Milenage
    }
}

/// The full set of environment knobs spec.md §6 lists: algorithm choice,
/// GP security level, and (via [`crate::apdu::TransportPolicy`], held
/// separately since it governs the transport rather than the algorithm
/// engine) class-byte fallback behavior.
#[derive(Debug, Clone, Copy, Default)]
pub struct CoreConfig {
    pub algorithm: AlgorithmChoice,
    pub security_level: SecurityLevelConfig,
}

/// Mirrors [`SecurityLevel`] but stays independent of the `gp` module's
/// session types, so it can be constructed before any session exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SecurityLevelConfig {
    #[default]
    Mac,
    MacAndEnc,
}

impl From<SecurityLevelConfig> for SecurityLevel {
    fn from(value: SecurityLevelConfig) -> Self {
        match value {
            SecurityLevelConfig::Mac => SecurityLevel::CMac,
            SecurityLevelConfig::MacAndEnc => SecurityLevel::CMacAndCEnc,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_algorithm_is_milenage() {
        matches!(AlgorithmChoice::default(), AlgorithmChoice::Milenage);
    }

    #[test]
    fn security_level_config_converts() {
        assert_eq!(SecurityLevel::from(SecurityLevelConfig::Mac), SecurityLevel::CMac);
        assert_eq!(SecurityLevel::from(SecurityLevelConfig::MacAndEnc), SecurityLevel::CMacAndCEnc);
    }
}
