//! FCP (fast charge protocol) adapter session.
//!
//! FCP is a register based request/response protocol run by a companion
//! chip (switch, PMIC or MCU) that owns the D+/D- lines. The chip driver
//! implements [`FcpOps`]; this module owns detection, the per-session value
//! cache and the error latch.

use crate::drivers::dc_ic::IcResult;

use super::{
    AdapterDeviceInfo, AdapterProtocol, AdapterProtocolType, AdapterSupportMode, DetectResult, ProtocolError,
    ProtocolResult, SlaveStatus,
};

// register map
pub const HWFCP_ID_OUT0: u8 = 0x04;
pub const HWFCP_DISCRETE_CAPABILITIES0: u8 = 0x21;
pub const HWFCP_MAX_PWR: u8 = 0x22;
pub const HWFCP_ADAPTER_STATUS: u8 = 0x28;
pub const HWFCP_OUTPUT_CONTROL: u8 = 0x2b;
pub const HWFCP_VOUT_CONFIG: u8 = 0x2c;
pub const HWFCP_OUTPUT_V0: u8 = 0x30;
pub const HWFCP_ADP_TYPE0: u8 = 0x7e;
pub const HWFCP_ADP_TYPE1: u8 = 0x80;

pub const HWFCP_VOUT_STEP: i32 = 100;
pub const HWFCP_OUTPUT_V_STEP: i32 = 100;
pub const HWFCP_MAX_PWR_STEP: i32 = 500;
pub const HWFCP_VOUT_CONFIG_ENABLE: u8 = 1;
// 5V, 9V and 12V
pub const HWFCP_CAPABILITIES_5V_9V_12V: u8 = 2;

pub const HWFCP_UVP_MASK: u8 = 1 << 3;
pub const HWFCP_OVP_MASK: u8 = 1 << 2;
pub const HWFCP_OCP_MASK: u8 = 1 << 1;
pub const HWFCP_OTP_MASK: u8 = 1 << 0;

const TRANS_NUM_MAX: usize = 16;

pub const fn hwfcp_output_v_reg(cap: u8) -> u8 {
    HWFCP_OUTPUT_V0 + cap
}

/// Chips known to carry an FCP master.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FcpDeviceId {
    Fsa9685,
    Rt8979,
    SchargerV300,
    SchargerV600,
    Fusb3601,
    Bq2560x,
    Rt9466,
    Sm5450,
    Sc8545,
    Sc200x,
    Stm32g031,
    Hc32l110,
}

const FCP_DEVICES: [(FcpDeviceId, &str); 12] = [
    (FcpDeviceId::Fsa9685, "fsa9685"),
    (FcpDeviceId::Rt8979, "rt8979"),
    (FcpDeviceId::SchargerV300, "scharger_v300"),
    (FcpDeviceId::SchargerV600, "scharger_v600"),
    (FcpDeviceId::Fusb3601, "fusb3601"),
    (FcpDeviceId::Bq2560x, "bq2560x"),
    (FcpDeviceId::Rt9466, "rt9466"),
    (FcpDeviceId::Sm5450, "sm5450"),
    (FcpDeviceId::Sc8545, "sc8545"),
    (FcpDeviceId::Sc200x, "sc200x"),
    (FcpDeviceId::Stm32g031, "stm32g031"),
    (FcpDeviceId::Hc32l110, "hc32l110"),
];

impl FcpDeviceId {
    /// `chip_name` may be an abbreviation (prefix) of the registered name.
    pub fn from_chip_name(chip_name: &str) -> Option<Self> {
        if chip_name.is_empty() {
            return None;
        }
        FCP_DEVICES
            .iter()
            .find(|(_, name)| name.starts_with(chip_name))
            .map(|(id, _)| *id)
    }

    /// VOUT_CONFIG does not read back on these chips.
    pub const fn skips_vout_verify(self) -> bool {
        matches!(self, FcpDeviceId::Bq2560x | FcpDeviceId::Rt9466)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FcpDetect {
    Succ,
    Fail,
    Other,
}

/// Register transport of one FCP master chip. `buf.len()` is the transfer
/// length. Control ops the chip lacks keep their defaults.
pub trait FcpOps {
    fn chip_name(&self) -> &str;

    fn reg_read(&mut self, reg: u8, buf: &mut [u8]) -> IcResult;
    fn reg_write(&mut self, reg: u8, buf: &[u8]) -> IcResult;
    /// Handshake on the data lines.
    fn detect_adapter(&mut self) -> FcpDetect;

    fn soft_reset_master(&mut self) -> IcResult;
    fn soft_reset_slave(&mut self) -> IcResult;

    fn master_status(&mut self) -> IcResult {
        Ok(())
    }

    fn stop_charging_config(&mut self) -> IcResult {
        Ok(())
    }

    fn is_accp_charger_type(&mut self) -> bool {
        false
    }

    fn pre_init(&mut self) -> IcResult {
        Ok(())
    }

    fn post_init(&mut self) -> IcResult {
        Ok(())
    }

    fn pre_exit(&mut self) -> IcResult {
        Ok(())
    }

    fn post_exit(&mut self) -> IcResult {
        Ok(())
    }
}

/// The SCP side state FCP detection consults. SCP and FCP share the
/// handshake, a failed SCP read of 0x80 already proves an FCP only adapter.
pub trait ScpPeer {
    fn reg80_rw_error(&self) -> bool;
    fn is_registered(&self) -> bool;
}

/// Products without SCP.
impl ScpPeer for () {
    fn reg80_rw_error(&self) -> bool {
        false
    }

    fn is_registered(&self) -> bool {
        false
    }
}

/// Values read from the adapter in the current attach session. `None` means
/// not read yet.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FcpSessionInfo {
    pub support_mode: AdapterSupportMode,
    pub vid: Option<i32>,
    pub volt_cap: Option<u8>,
    pub max_volt: Option<i32>,
    pub max_pwr: Option<i32>,
    pub rw_error_flag: bool,
}

pub struct HwFcp<T: FcpOps, P: ScpPeer = ()> {
    ops: Option<T>,
    dev_id: Option<FcpDeviceId>,
    scp: P,
    info: FcpSessionInfo,
}

fn check_trans_num(num: usize) -> ProtocolResult {
    // 1 or an even count up to 16
    if (1..=TRANS_NUM_MAX).contains(&num) && (num == 1 || num % 2 == 0) {
        return Ok(());
    }
    Err(ProtocolError::InvalidTransferLength)
}

impl<T: FcpOps, P: ScpPeer> HwFcp<T, P> {
    pub fn new(scp: P) -> Self {
        Self { ops: None, dev_id: None, scp, info: FcpSessionInfo::default() }
    }

    /// Binds the transport. Chips outside the known device list are refused.
    pub fn register(&mut self, ops: T) -> ProtocolResult {
        let Some(dev_id) = FcpDeviceId::from_chip_name(ops.chip_name()) else {
            error!("{} ops register fail", ops.chip_name());
            return Err(ProtocolError::NotRegistered);
        };

        info!("{}:{} ops register ok", dev_id, ops.chip_name());
        self.ops = Some(ops);
        self.dev_id = Some(dev_id);
        Ok(())
    }

    pub fn dev_id(&self) -> Option<FcpDeviceId> {
        self.dev_id
    }

    pub fn session(&self) -> &FcpSessionInfo {
        &self.info
    }

    pub fn ops_mut(&mut self) -> Option<&mut T> {
        self.ops.as_mut()
    }

    pub fn scp_mut(&mut self) -> &mut P {
        &mut self.scp
    }

    fn ops(&mut self) -> ProtocolResult<&mut T> {
        match self.ops.as_mut() {
            Some(ops) => Ok(ops),
            None => {
                error!("fcp ops is null");
                Err(ProtocolError::NotRegistered)
            }
        }
    }

    fn set_rw_error_flag(&mut self) {
        info!("set_rw_error_flag: 1");
        self.info.rw_error_flag = true;
    }

    // A failed ADP_TYPE1 read is how non-SCP adapters are recognised, it must
    // not latch.
    fn transfer_failed(&mut self, reg: u8) -> ProtocolError {
        if reg != HWFCP_ADP_TYPE1 {
            self.set_rw_error_flag();
        }
        ProtocolError::TransportFailure
    }

    pub fn reg_read(&mut self, reg: u8, buf: &mut [u8]) -> ProtocolResult {
        if self.info.rw_error_flag {
            return Err(ProtocolError::Latched);
        }
        let ops = self.ops()?;
        if let Err(e) = check_trans_num(buf.len()) {
            error!("invalid num={}", buf.len());
            return Err(e);
        }

        if ops.reg_read(reg, buf).is_err() {
            error!("reg {:#x} read fail", reg);
            return Err(self.transfer_failed(reg));
        }
        Ok(())
    }

    pub fn reg_write(&mut self, reg: u8, buf: &[u8]) -> ProtocolResult {
        if self.info.rw_error_flag {
            return Err(ProtocolError::Latched);
        }
        let ops = self.ops()?;
        if let Err(e) = check_trans_num(buf.len()) {
            error!("invalid num={}", buf.len());
            return Err(e);
        }

        if ops.reg_write(reg, buf).is_err() {
            error!("reg {:#x} write fail", reg);
            return Err(self.transfer_failed(reg));
        }
        Ok(())
    }

    fn read_byte(&mut self, reg: u8) -> ProtocolResult<u8> {
        let mut value = [0u8; 1];
        self.reg_read(reg, &mut value)?;
        Ok(value[0])
    }

    fn write_byte(&mut self, reg: u8, value: u8) -> ProtocolResult {
        self.reg_write(reg, &[value])
    }

    pub fn vendor_id(&mut self) -> ProtocolResult<i32> {
        if let Some(vid) = self.info.vid {
            info!("get_vendor_id_a: {:#x}", vid);
            return Ok(vid);
        }

        let vid = self.read_byte(HWFCP_ID_OUT0)? as i32;
        self.info.vid = Some(vid);
        info!("get_vendor_id_f: {:#x}", vid);
        Ok(vid)
    }

    pub fn voltage_capabilities(&mut self) -> ProtocolResult<u8> {
        if let Some(cap) = self.info.volt_cap {
            info!("get_voltage_capabilities_a: {}", cap);
            return Ok(cap);
        }

        let cap = self.read_byte(HWFCP_DISCRETE_CAPABILITIES0)?;
        if cap > HWFCP_CAPABILITIES_5V_9V_12V {
            error!("invalid voltage_capabilities={}", cap);
            return Err(ProtocolError::InvalidValue);
        }

        self.info.volt_cap = Some(cap);
        info!("get_voltage_capabilities_f: {}", cap);
        Ok(cap)
    }

    pub fn max_power(&mut self) -> ProtocolResult<i32> {
        if let Some(pwr) = self.info.max_pwr {
            info!("get_max_power_a: {}", pwr);
            return Ok(pwr);
        }

        let pwr = self.read_byte(HWFCP_MAX_PWR)? as i32 * HWFCP_MAX_PWR_STEP;
        self.info.max_pwr = Some(pwr);
        info!("get_max_power_f: {}", pwr);
        Ok(pwr)
    }

    fn read_max_voltage(&mut self) -> ProtocolResult<i32> {
        if let Some(volt) = self.info.max_volt {
            info!("get_max_voltage_a: {}", volt);
            return Ok(volt);
        }

        let cap = self.voltage_capabilities()?;
        let volt = self.read_byte(hwfcp_output_v_reg(cap))? as i32 * HWFCP_OUTPUT_V_STEP;
        self.info.max_volt = Some(volt);
        info!("get_max_voltage_f: {}", volt);
        Ok(volt)
    }

    fn detect_by_0x80(&mut self) -> DetectResult {
        match self.read_byte(HWFCP_ADP_TYPE1) {
            Ok(value) => {
                info!("adp_type1[{:#x}]={:#x}", HWFCP_ADP_TYPE1, value);
                DetectResult::Other
            }
            Err(_) => {
                error!("read adp_type1(0x80) fail");
                DetectResult::Succ
            }
        }
    }

    fn detect_succ(&mut self) -> (DetectResult, AdapterSupportMode) {
        self.info.support_mode = AdapterSupportMode::HV;
        info!("detect_adapter_type success");
        (DetectResult::Succ, AdapterSupportMode::HV)
    }

    fn process<F: FnOnce(&mut T) -> IcResult>(&mut self, what: &str, f: F) -> ProtocolResult {
        let ops = self.ops()?;
        info!("{}", what);
        f(ops).map_err(|_| ProtocolError::TransportFailure)
    }

    pub fn process_pre_init(&mut self) -> ProtocolResult {
        self.process("process_pre_init", |ops| ops.pre_init())
    }

    pub fn process_post_init(&mut self) -> ProtocolResult {
        self.process("process_post_init", |ops| ops.post_init())
    }
}

impl<T: FcpOps, P: ScpPeer> AdapterProtocol for HwFcp<T, P> {
    fn type_name(&self) -> &str {
        "hw_fcp"
    }

    fn protocol_type(&self) -> AdapterProtocolType {
        AdapterProtocolType::Fcp
    }

    fn set_default_param(&mut self) {
        self.info = FcpSessionInfo::default();
    }

    fn detect_adapter_support_mode(&mut self) -> (DetectResult, AdapterSupportMode) {
        if self.ops.is_none() {
            return (DetectResult::Other, AdapterSupportMode::UNDEFINED);
        }

        self.set_default_param();

        // an FCP only adapter already failed SCP's 0x80 read, skip the rest
        if self.scp.reg80_rw_error() {
            info!("no need continue, reg80 already read fail");
            return self.detect_succ();
        }

        match self.ops().map(|ops| ops.detect_adapter()) {
            Ok(FcpDetect::Succ) => {}
            Ok(FcpDetect::Other) | Err(_) => {
                error!("fcp adapter detect other");
                return (DetectResult::Other, AdapterSupportMode::UNDEFINED);
            }
            Ok(FcpDetect::Fail) => {
                error!("fcp adapter detect fail");
                return (DetectResult::Fail, AdapterSupportMode::UNDEFINED);
            }
        }

        if !self.scp.is_registered() {
            info!("no need continue, scp protocol not support");
            return self.detect_succ();
        }

        if self.detect_by_0x80() == DetectResult::Other {
            info!("fcp adapter type_b detect other(judge by 0x80)");
            return (DetectResult::Other, AdapterSupportMode::UNDEFINED);
        }

        self.detect_succ()
    }

    fn support_mode(&self) -> AdapterSupportMode {
        self.info.support_mode
    }

    fn is_registered(&self) -> bool {
        self.dev_id.is_some()
    }

    fn soft_reset_master(&mut self) -> ProtocolResult {
        self.process("soft_reset_master", |ops| ops.soft_reset_master())
    }

    fn soft_reset_slave(&mut self) -> ProtocolResult {
        self.process("soft_reset_slave", |ops| ops.soft_reset_slave())
    }

    fn master_status(&mut self) -> ProtocolResult {
        self.process("get_master_status", |ops| ops.master_status())
    }

    fn stop_charging_config(&mut self) -> ProtocolResult {
        self.process("stop_charging_config", |ops| ops.stop_charging_config())
    }

    fn is_accp_charger_type(&mut self) -> bool {
        match self.ops.as_mut() {
            Some(ops) => ops.is_accp_charger_type(),
            None => false,
        }
    }

    fn set_default_state(&mut self) -> ProtocolResult {
        self.process("process_pre_exit", |ops| ops.pre_exit())?;
        self.process("process_post_exit", |ops| ops.post_exit())?;
        info!("set_default_state ok");
        Ok(())
    }

    fn device_info(&mut self) -> ProtocolResult<AdapterDeviceInfo> {
        let info = AdapterDeviceInfo {
            vendor_id: self.vendor_id()?,
            max_volt: self.read_max_voltage()?,
            volt_cap: self.voltage_capabilities()? as i32,
            max_pwr: self.max_power()?,
        };
        info!("get_device_info");
        Ok(info)
    }

    fn chip_vendor_id(&mut self) -> ProtocolResult<i32> {
        self.vendor_id()
    }

    fn slave_status(&mut self) -> ProtocolResult<SlaveStatus> {
        let value = self.read_byte(HWFCP_ADAPTER_STATUS)?;
        info!("get_slave_status: {}", value);

        let status = if value & HWFCP_UVP_MASK != 0 {
            SlaveStatus::Uvp
        } else if value & HWFCP_OVP_MASK != 0 {
            SlaveStatus::Ovp
        } else if value & HWFCP_OCP_MASK != 0 {
            SlaveStatus::Ocp
        } else if value & HWFCP_OTP_MASK != 0 {
            SlaveStatus::Otp
        } else {
            SlaveStatus::Normal
        };
        Ok(status)
    }

    /// Writes VOUT_CONFIG, verifies it and only then enables the output.
    fn set_output_voltage(&mut self, mv: i32) -> ProtocolResult {
        // the vendor id read identifies the adapter before any write
        self.vendor_id()?;

        let value = (mv / HWFCP_VOUT_STEP) as u8;
        self.write_byte(HWFCP_VOUT_CONFIG, value)?;
        let readback = self.read_byte(HWFCP_VOUT_CONFIG)?;

        let verify = !self.dev_id.is_some_and(|id| id.skips_vout_verify());
        if verify && readback != value {
            error!("output voltage config fail, reg[{:#x}]={}", HWFCP_VOUT_CONFIG, readback);
            return Err(ProtocolError::VerifyMismatch);
        }

        self.write_byte(HWFCP_OUTPUT_CONTROL, HWFCP_VOUT_CONFIG_ENABLE)?;
        info!("set_output_voltage: {}", mv);
        Ok(())
    }

    /// Rated current at the rated voltage, an estimate only.
    fn output_current(&mut self) -> ProtocolResult<i32> {
        let volt = self.read_max_voltage()?;
        let max_power = self.max_power()?;
        if volt == 0 {
            error!("volt is zero");
            return Err(ProtocolError::InvalidValue);
        }

        let cur = (max_power / volt) * 1000;
        info!("get_output_current: {}", cur);
        Ok(cur)
    }

    fn max_voltage(&mut self) -> ProtocolResult<i32> {
        self.read_max_voltage()
    }
}
