//! Field diagnostics (DMD) and user event reporting.
//!
//! Reports are fire-and-forget: no call site inspects a delivery result and a
//! lost report is acceptable.

use core::fmt::{self, Write};

use heapless::String;

pub const DSM_BUF_SIZE: usize = 256;

pub type DsmMessage = String<DSM_BUF_SIZE>;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DsmModule {
    Battery,
    FcpCharge,
    DirectCharge,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DmdError {
    MultiChargeCurrentRatioInfo,
    MultiChargeCurrentRatioWarning,
    MultiChargeCurrentRatioError,
    AdapterOverVoltage,
    AdapterOverCurrent,
    AdapterOverTemp,
    SwitchAttach,
    FcpOutput,
    FcpDetect,
    NonStandardChargerPlugged,
}

pub trait DmdReporter {
    fn report_dmd(&mut self, module: DsmModule, error: DmdError, msg: &str);
}

impl<T: DmdReporter + ?Sized> DmdReporter for &mut T {
    fn report_dmd(&mut self, module: DsmModule, error: DmdError, msg: &str) {
        (**self).report_dmd(module, error, msg)
    }
}

pub trait UeventNotifier {
    fn report_uevent(&mut self, event: &str);
}

impl<T: UeventNotifier + ?Sized> UeventNotifier for &mut T {
    fn report_uevent(&mut self, event: &str) {
        (**self).report_uevent(event)
    }
}

/// Formats into a bounded report buffer. Output that does not fit is dropped,
/// the leading part is kept.
pub fn dsm_message(args: fmt::Arguments) -> DsmMessage {
    let mut buf = DsmMessage::new();
    let _ = buf.write_fmt(args);
    buf
}
