//! Adapter protocol layer.
//!
//! Each wire protocol (SCP, FCP, UFCS) implements [`AdapterProtocol`]. Ops a
//! protocol has no notion of default to [`ProtocolError::NotSupported`].

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;

pub mod fcp;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ProtocolError {
    /// register transfer failed at the transport
    TransportFailure,
    /// an earlier transfer failed in this session, re-detect first
    Latched,
    InvalidTransferLength,
    NotSupported,
    /// no transport registered
    NotRegistered,
    /// written value did not read back
    VerifyMismatch,
    InvalidValue,
}

pub type ProtocolResult<T = ()> = Result<T, ProtocolError>;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AdapterProtocolType {
    Scp,
    Fcp,
    Ufcs,
}

impl AdapterProtocolType {
    pub const fn bit(self) -> u32 {
        match self {
            AdapterProtocolType::Scp => 1 << 0,
            AdapterProtocolType::Fcp => 1 << 1,
            AdapterProtocolType::Ufcs => 1 << 2,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DetectResult {
    Succ,
    Fail,
    /// something answered but speaks another protocol, try the next one
    Other,
}

/// Capabilities an adapter reported during detection.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AdapterSupportMode(u32);

impl AdapterSupportMode {
    pub const UNDEFINED: Self = Self(0);
    /// high voltage buck charging (FCP/QC)
    pub const HV: Self = Self(1 << 0);
    pub const LVC: Self = Self(1 << 1);
    pub const SC: Self = Self(1 << 2);

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SlaveStatus {
    Normal,
    Uvp,
    Ovp,
    Ocp,
    Otp,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AdapterType {
    Unknown,
    Adp5V4P5A,
    Adp10V2A,
    Adp10V2P25A,
    Adp10V2P25ACar,
    QtrA10V2P25A,
    QtrC20V3A,
    Adp10V4A,
    Adp20V3P25A,
    Adp20V3P25AMax,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AdapterDeviceInfo {
    pub vendor_id: i32,
    /// mV
    pub max_volt: i32,
    pub volt_cap: i32,
    /// mW
    pub max_pwr: i32,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AdapterInitData {
    pub scp_mode_enable: bool,
    pub vset_boundary: i32,
    pub iset_boundary: i32,
    pub init_voltage: i32,
    pub watchdog_timer: i32,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PowerCurvePoint {
    pub volt: i32,
    pub cur: i32,
}

pub trait AdapterProtocol {
    fn type_name(&self) -> &str;
    fn protocol_type(&self) -> AdapterProtocolType;

    /// Resets every per-session cached value. Run before each detection.
    fn set_default_param(&mut self);
    fn detect_adapter_support_mode(&mut self) -> (DetectResult, AdapterSupportMode);
    fn support_mode(&self) -> AdapterSupportMode;
    /// True once a transport is bound to this protocol.
    fn is_registered(&self) -> bool;

    fn soft_reset_master(&mut self) -> ProtocolResult {
        Err(ProtocolError::NotSupported)
    }

    fn soft_reset_slave(&mut self) -> ProtocolResult {
        Err(ProtocolError::NotSupported)
    }

    fn master_status(&mut self) -> ProtocolResult {
        Ok(())
    }

    fn stop_charging_config(&mut self) -> ProtocolResult {
        Ok(())
    }

    fn is_accp_charger_type(&mut self) -> bool {
        false
    }

    fn set_default_state(&mut self) -> ProtocolResult {
        Ok(())
    }

    fn device_info(&mut self) -> ProtocolResult<AdapterDeviceInfo> {
        Err(ProtocolError::NotSupported)
    }

    fn chip_vendor_id(&mut self) -> ProtocolResult<i32> {
        Err(ProtocolError::NotSupported)
    }

    fn chip_serial_num(&mut self) -> ProtocolResult<i32> {
        Err(ProtocolError::NotSupported)
    }

    fn adapter_type(&mut self) -> ProtocolResult<AdapterType> {
        Err(ProtocolError::NotSupported)
    }

    /// Lets the protocol narrow the modes direct charge may use.
    fn update_support_mode(&mut self, mode: AdapterSupportMode) -> AdapterSupportMode {
        mode
    }

    fn slave_status(&mut self) -> ProtocolResult<SlaveStatus> {
        Err(ProtocolError::NotSupported)
    }

    fn set_init_data(&mut self, _data: &AdapterInitData) -> ProtocolResult {
        Err(ProtocolError::NotSupported)
    }

    fn set_output_enable(&mut self, _enable: bool) -> ProtocolResult {
        Err(ProtocolError::NotSupported)
    }

    fn set_output_voltage(&mut self, _mv: i32) -> ProtocolResult {
        Err(ProtocolError::NotSupported)
    }

    fn set_output_current(&mut self, _ma: i32) -> ProtocolResult {
        Err(ProtocolError::NotSupported)
    }

    fn output_voltage(&mut self) -> ProtocolResult<i32> {
        Err(ProtocolError::NotSupported)
    }

    fn output_current(&mut self) -> ProtocolResult<i32> {
        Err(ProtocolError::NotSupported)
    }

    fn output_current_set(&mut self) -> ProtocolResult<i32> {
        Err(ProtocolError::NotSupported)
    }

    fn max_voltage(&mut self) -> ProtocolResult<i32> {
        Err(ProtocolError::NotSupported)
    }

    fn max_current(&mut self) -> ProtocolResult<i32> {
        Err(ProtocolError::NotSupported)
    }

    fn power_drop_current(&mut self) -> ProtocolResult<i32> {
        Err(ProtocolError::NotSupported)
    }

    fn inside_temp(&mut self) -> ProtocolResult<i32> {
        Err(ProtocolError::NotSupported)
    }

    fn power_curve_num(&mut self) -> ProtocolResult<usize> {
        Err(ProtocolError::NotSupported)
    }

    /// Fills `out` with the adapter power curve points and returns the count.
    fn power_curve(&mut self, _out: &mut [PowerCurvePoint]) -> ProtocolResult<usize> {
        Err(ProtocolError::NotSupported)
    }

    /// Runs the challenge-response authentication with key `key_index`.
    fn auth_encrypt_start(&mut self, _key_index: u32) -> ProtocolResult {
        Err(ProtocolError::NotSupported)
    }
}

/// A protocol session shared between the poller and other readers.
pub struct SharedSession<M: RawMutex, S> {
    inner: Mutex<M, RefCell<S>>,
}

impl<M: RawMutex, S> SharedSession<M, S> {
    pub const fn new(session: S) -> Self {
        Self { inner: Mutex::new(RefCell::new(session)) }
    }

    /// Runs `f` with exclusive access. Not reentrant.
    pub fn lock<R>(&self, f: impl FnOnce(&mut S) -> R) -> R {
        self.inner.lock(|cell| f(&mut *cell.borrow_mut()))
    }

    pub fn into_inner(self) -> S {
        self.inner.into_inner().into_inner()
    }
}
