//! Component E: card identification and vendor-specific personalization.
//!
//! Each vendor family implements [`CardDriver`]; a [`DriverRegistry`] built
//! from an explicit list (rather than process-wide registration, so tests
//! can substitute drivers freely) identifies a card from its ATR and
//! dispatches high-level writes to the matching driver's file layout.

pub mod grv1;
pub mod grv2;
pub mod rusim;
pub mod sysmo;

use crate::apdu::ApduClient;
use crate::error::CoreError;

/// Logical slots a driver may be asked to write, independent of where each
/// vendor actually stores them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    Ki,
    Opc,
    MilenageRc,
    AlgorithmSelector,
    Iccid,
    Msisdn,
    Acc,
    Pin1,
    Puk1,
    Pin2,
    Puk2,
    Pins,
}

impl Slot {
    pub fn name(self) -> &'static str {
        match self {
            Slot::Ki => "Ki",
            Slot::Opc => "OPc",
            Slot::MilenageRc => "MILENAGE R/C constants",
            Slot::AlgorithmSelector => "algorithm selector",
            Slot::Iccid => "ICCID",
            Slot::Msisdn => "MSISDN",
            Slot::Acc => "ACC",
            Slot::Pin1 => "PIN1",
            Slot::Puk1 => "PUK1",
            Slot::Pin2 => "PIN2",
            Slot::Puk2 => "PUK2",
            Slot::Pins => "PINs",
        }
    }
}

/// Authentication algorithm a card can be configured for, used by
/// [`CardDriver::set_algorithm`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlgorithmKind {
    Milenage,
    S3g128,
    Tuak,
    S3g256,
}

/// Static metadata for a vendor card family: how to recognize it, and where
/// its proprietary files live. `proprietary_file_ids` maps a subset of
/// [`Slot`] to a file identifier; drivers that address a slot by a
/// different mechanism (offset within a shared file, EF path, etc.) may
/// leave it out and handle that slot entirely in code.
#[derive(Debug, Clone)]
pub struct CardDescriptor {
    pub type_name: &'static str,
    pub human_name: &'static str,
    pub atr_prefix: &'static [u8],
    pub requires_gsm_class: bool,
}

/// The per-operation capability set a registered driver exposes. MILENAGE
/// and TUAK variance is handled by [`crate::auth::AlgorithmSet`]; this
/// trait is purely about where bytes land on a given piece of silicon.
pub trait CardDriver {
    fn descriptor(&self) -> &CardDescriptor;

    /// Inspects an ATR and reports whether this driver recognizes it.
    /// The fallback driver ([`grv1::GrV1`]) always returns `false` here and
    /// must be selected explicitly.
    fn identify(&self, atr: &[u8]) -> bool {
        atr.starts_with(self.descriptor().atr_prefix)
    }

    /// Vendor unlock handshake issued before any write, if the driver needs
    /// one. Default: no-op.
    fn prepare_write(&self, _client: &mut ApduClient<'_>) -> Result<(), CoreError> {
        Ok(())
    }

    fn write_ki(&self, client: &mut ApduClient<'_>, ki: &[u8]) -> Result<(), CoreError>;
    fn write_opc(&self, client: &mut ApduClient<'_>, opc: &[u8]) -> Result<(), CoreError>;

    /// Most drivers have no independent R/C-constant slot (MILENAGE's
    /// standard constants are baked into the algorithm engine); refusing is
    /// the correct default.
    fn write_milenage_rc(&self, _client: &mut ApduClient<'_>, _r: &[u8], _c: &[u8]) -> Result<(), CoreError> {
        Err(CoreError::UnsupportedConfig("driver does not support custom MILENAGE R/C constants"))
    }

    fn set_algorithm(&self, _client: &mut ApduClient<'_>, _algorithm: AlgorithmKind) -> Result<(), CoreError> {
        Err(CoreError::UnsupportedConfig("driver does not support an algorithm selector"))
    }

    fn write_iccid(&self, _client: &mut ApduClient<'_>, _iccid: &[u8]) -> Result<(), CoreError> {
        Err(CoreError::UnsupportedConfig("driver does not support writing ICCID"))
    }

    fn write_msisdn(&self, _client: &mut ApduClient<'_>, _msisdn: &[u8]) -> Result<(), CoreError> {
        Err(CoreError::UnsupportedConfig("driver does not support writing MSISDN"))
    }

    fn write_acc(&self, _client: &mut ApduClient<'_>, _acc: &[u8]) -> Result<(), CoreError> {
        Err(CoreError::UnsupportedConfig("driver does not support writing ACC"))
    }

    fn write_pins(&self, _client: &mut ApduClient<'_>, _pin1: Option<&[u8]>, _pin2: Option<&[u8]>) -> Result<(), CoreError> {
        Err(CoreError::UnsupportedConfig("driver does not support writing PINs"))
    }
}

/// An explicit, insertion-ordered list of drivers. Built by the caller
/// (rather than populated by process-wide registration) so a test can hand
/// in a reduced or synthetic driver set.
pub struct DriverRegistry {
    drivers: Vec<Box<dyn CardDriver>>,
}

impl DriverRegistry {
    pub fn new(drivers: Vec<Box<dyn CardDriver>>) -> Self {
        DriverRegistry { drivers }
    }

    /// The default registry: every built-in driver, in the order listed in
    /// the vendor file-path table, GRv1 last as the declining fallback.
    pub fn with_builtin_drivers() -> Self {
        DriverRegistry::new(vec![
            Box::new(grv2::GrV2),
            Box::new(sysmo::SysmoSjs1),
            Box::new(sysmo::SysmoSja2Sja5),
            Box::new(sysmo::SysmoGr1),
            Box::new(sysmo::SysmoGr2),
            Box::new(rusim::RuSimOx24),
            Box::new(grv1::GrV1),
        ])
    }

    /// First driver whose `identify` matches the given ATR.
    pub fn identify(&self, atr: &[u8]) -> Option<&dyn CardDriver> {
        self.drivers.iter().find(|d| d.identify(atr)).map(|d| d.as_ref())
    }

    /// Explicit selection by type name, bypassing ATR matching (needed for
    /// the GRv1 fallback, which never self-identifies).
    pub fn by_type_name(&self, type_name: &str) -> Option<&dyn CardDriver> {
        self.drivers.iter().find(|d| d.descriptor().type_name == type_name).map(|d| d.as_ref())
    }
}

/// One personalization write request: logical slot plus its payload bytes,
/// and for [`Slot::AlgorithmSelector`] the chosen algorithm.
pub enum WriteRequest<'a> {
    Ki(&'a [u8]),
    Opc(&'a [u8]),
    MilenageRc(&'a [u8], &'a [u8]),
    AlgorithmSelector(AlgorithmKind),
    Iccid(&'a [u8]),
    Msisdn(&'a [u8]),
    Acc(&'a [u8]),
    Pins { pin1: Option<&'a [u8]>, pin2: Option<&'a [u8]> },
}

impl WriteRequest<'_> {
    fn slot(&self) -> Slot {
        match self {
            WriteRequest::Ki(_) => Slot::Ki,
            WriteRequest::Opc(_) => Slot::Opc,
            WriteRequest::MilenageRc(..) => Slot::MilenageRc,
            WriteRequest::AlgorithmSelector(_) => Slot::AlgorithmSelector,
            WriteRequest::Iccid(_) => Slot::Iccid,
            WriteRequest::Msisdn(_) => Slot::Msisdn,
            WriteRequest::Acc(_) => Slot::Acc,
            WriteRequest::Pins { .. } => Slot::Pins,
        }
    }
}

/// Outcome of a personalization run: which slots succeeded, in order, and
/// where (if anywhere) the sequence halted.
#[derive(Debug, Default)]
pub struct WriteReport {
    pub completed: Vec<&'static str>,
    pub failed: Option<(&'static str, CoreError)>,
}

impl WriteReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_none()
    }
}

/// Runs `prepare_write` then each request in order, halting on the first
/// failure and recording which slot it was.
pub fn write_personalization(driver: &dyn CardDriver, client: &mut ApduClient<'_>, requests: &[WriteRequest<'_>]) -> WriteReport {
    let mut report = WriteReport::default();

    if let Err(e) = driver.prepare_write(client) {
        report.failed = Some(("prepare_write", e));
        return report;
    }

    for request in requests {
        let slot = request.slot();
        let result = match request {
            WriteRequest::Ki(ki) => driver.write_ki(client, ki),
            WriteRequest::Opc(opc) => driver.write_opc(client, opc),
            WriteRequest::MilenageRc(r, c) => driver.write_milenage_rc(client, r, c),
            WriteRequest::AlgorithmSelector(alg) => driver.set_algorithm(client, *alg),
            WriteRequest::Iccid(iccid) => driver.write_iccid(client, iccid),
            WriteRequest::Msisdn(msisdn) => driver.write_msisdn(client, msisdn),
            WriteRequest::Acc(acc) => driver.write_acc(client, acc),
            WriteRequest::Pins { pin1, pin2 } => driver.write_pins(client, *pin1, *pin2),
        };
        match result {
            Ok(()) => report.completed.push(slot.name()),
            Err(e) => {
                report.failed = Some((slot.name(), e));
                return report;
            }
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_identifies_grv2_by_atr() {
        let registry = DriverRegistry::with_builtin_drivers();
        let driver = registry.identify(&grv2::ATR_PREFIX).expect("should identify GRv2");
        assert_eq!(driver.descriptor().type_name, "grv2");
    }

    #[test]
    fn grv1_never_self_identifies_but_is_selectable() {
        let registry = DriverRegistry::with_builtin_drivers();
        assert!(registry.identify(&[0xDE, 0xAD, 0xBE, 0xEF]).is_none());
        let driver = registry.by_type_name("grv1").expect("GRv1 selectable by name");
        assert_eq!(driver.descriptor().type_name, "grv1");
    }
}
