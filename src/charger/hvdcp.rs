//! High voltage DCP (FCP) charge session.
//!
//! Tracks the session stage and the per stage retry budgets. Each budget
//! counter only advances while the session sits in the stage it belongs to;
//! any other stage resets it on the next check.

use embassy_time::Duration;

use crate::dsm::{dsm_message, DmdError, DmdReporter, DsmModule};
use crate::protocol::{AdapterProtocol, AdapterProtocolType, AdapterSupportMode, AdapterType, DetectResult, ProtocolError, SlaveStatus};
use crate::units::POWER_MV_PER_V;

use super::dc_adapter::AdapterProtocols;
use super::{ChargerPlatform, ChargerType, ResetTarget, ADAPTER_5V};

pub const HVDCP_MAX_ADAPTER_DETECT_CNT: u32 = 3;
pub const HVDCP_MAX_ADAPTER_ENABLE_CNT: u32 = 3;
pub const HVDCP_MAX_ADAPTER_RETRY_CNT: u32 = 3;
pub const HVDCP_MAX_MASTER_ERROR_CNT: u32 = 3;
pub const HVDCP_MAX_VBOOST_RETRY_CNT: u32 = 5;

/// mV
pub const HVDCP_MIVR_SETTING: i32 = 4600;
pub const HVDCP_RESET_VOLT_LOWER_LIMIT: i32 = 4500;
pub const HVDCP_RESET_VOLT_UPPER_LIMIT: i32 = 6000;

const RESET_MASTER_SETTLE: Duration = Duration::from_secs(2);
const DECREASE_VOLT_WAIT: Duration = Duration::from_secs(1);
const DECREASE_VOLT_STEP: Duration = Duration::from_millis(50);

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HvdcpError {
    NotPowerGood,
    Protocol(ProtocolError),
}

impl From<ProtocolError> for HvdcpError {
    fn from(e: ProtocolError) -> Self {
        HvdcpError::Protocol(e)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HvdcpStage {
    #[default]
    Default,
    SupportDetect,
    AdapterDetect,
    AdapterEnable,
    Success,
    ChargeDone,
    ResetAdapter,
    Error,
}

impl HvdcpStage {
    pub const fn as_str(self) -> &'static str {
        match self {
            HvdcpStage::Default => "hvdcp_stage_default",
            HvdcpStage::SupportDetect => "hvdcp_stage_support_detect",
            HvdcpStage::AdapterDetect => "hvdcp_stage_adapter_detect",
            HvdcpStage::AdapterEnable => "hvdcp_stage_adapter_enable",
            HvdcpStage::Success => "hvdcp_stage_success",
            HvdcpStage::ChargeDone => "hvdcp_stage_charge_done",
            HvdcpStage::ResetAdapter => "hvdcp_stage_reset_adapter",
            HvdcpStage::Error => "hvdcp_stage_error",
        }
    }
}

/// Collaborators of one check call.
pub struct HvdcpEnv<'e, 'a> {
    pub protocols: &'e mut AdapterProtocols<'a>,
    pub platform: &'e mut dyn ChargerPlatform,
    pub dsm: &'e mut dyn DmdReporter,
}

impl<'e, 'a> HvdcpEnv<'e, 'a> {
    fn fcp(&mut self) -> Result<&mut (dyn AdapterProtocol + 'a), HvdcpError> {
        self.protocols
            .get(AdapterProtocolType::Fcp)
            .ok_or(HvdcpError::Protocol(ProtocolError::NotRegistered))
    }

    fn scp_adapter_type(&mut self) -> AdapterType {
        match self.protocols.get(AdapterProtocolType::Scp) {
            Some(scp) => scp.adapter_type().unwrap_or(AdapterType::Unknown),
            None => AdapterType::Unknown,
        }
    }

    fn scp_support_mode(&mut self) -> AdapterSupportMode {
        match self.protocols.get(AdapterProtocolType::Scp) {
            Some(scp) => scp.support_mode(),
            None => AdapterSupportMode::UNDEFINED,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct HvdcpSession {
    /// built alongside direct charge, which gets the adapter first
    direct_charge: bool,

    rt_current_thld: u32,
    rt_time: u32,
    rt_result: bool,
    charging_flag: bool,
    stage: HvdcpStage,

    master_error_cnt: u32,
    vboost_retry_cnt: u32,
    adapter_retry_cnt: u32,
    adapter_enable_cnt: u32,
    adapter_detect_cnt: u32,
}

macro_rules! hvdcp_counter {
    ($($name:ident),* $(,)?) => {
        ::paste::paste! {
            impl HvdcpSession {
                $(
                    pub fn [<$name _count>](&self) -> u32 {
                        self.[<$name _cnt>]
                    }

                    pub fn [<set_ $name _count>](&mut self, cnt: u32) {
                        self.[<$name _cnt>] = cnt;
                        info!("set_{}_count: cnt={}", stringify!($name), cnt);
                    }
                )*
            }
        }
    };
}

hvdcp_counter!(adapter_enable, adapter_detect, adapter_retry, vboost_retry);

impl HvdcpSession {
    pub fn new(direct_charge: bool) -> Self {
        Self { direct_charge, ..Self::default() }
    }

    pub fn rt_current_thld(&self) -> u32 {
        self.rt_current_thld
    }

    pub fn set_rt_current_thld(&mut self, curr: u32) {
        self.rt_current_thld = curr;
        info!("set_rt_current_thld: curr={}", curr);
    }

    pub fn rt_time(&self) -> u32 {
        self.rt_time
    }

    pub fn set_rt_time(&mut self, time: u32) {
        self.rt_time = time;
        info!("set_rt_time: time={}", time);
    }

    pub fn rt_result(&self) -> bool {
        self.rt_result
    }

    pub fn set_rt_result(&mut self, result: bool) {
        self.rt_result = result;
        info!("set_rt_result: result={}", result);
    }

    pub fn charging_flag(&self) -> bool {
        self.charging_flag
    }

    pub fn set_charging_flag(&mut self, flag: bool) {
        self.charging_flag = flag;
        info!("set_charging_flag: flag={}", flag);
    }

    pub fn charging_stage(&self) -> HvdcpStage {
        self.stage
    }

    pub fn set_charging_stage(&mut self, stage: HvdcpStage) {
        self.stage = stage;
        info!("set_charging_stage: stage={}", stage.as_str());
    }

    pub fn master_error_count(&self) -> u32 {
        self.master_error_cnt
    }

    pub fn reset_flags(&mut self) {
        self.set_adapter_enable_count(0);
        self.set_adapter_detect_count(0);
        self.set_adapter_retry_count(0);
        self.set_vboost_retry_count(0);
    }

    pub fn set_adapter_voltage(&mut self, env: &mut HvdcpEnv, mv: i32) -> Result<(), HvdcpError> {
        let ret = env.fcp()?.set_output_voltage(mv);
        info!("set_adapter_voltage: volt={} ok={}", mv, ret.is_ok());
        Ok(ret?)
    }

    pub fn reset_adapter(&mut self, env: &mut HvdcpEnv) -> Result<(), HvdcpError> {
        Ok(env.fcp()?.soft_reset_slave()?)
    }

    pub fn reset_master(&mut self, env: &mut HvdcpEnv) -> Result<(), HvdcpError> {
        Ok(env.fcp()?.soft_reset_master()?)
    }

    pub fn reset_operate(&mut self, env: &mut HvdcpEnv, target: ResetTarget) -> Result<(), HvdcpError> {
        if env.platform.not_power_good() {
            error!("charger not power good, no need reset");
            return Err(HvdcpError::NotPowerGood);
        }

        info!("reset_operate: type={}", target);
        match target {
            ResetTarget::Adapter => self.reset_adapter(env),
            ResetTarget::Master => {
                let ret = self.reset_master(env);
                // the master needs 2s to come back
                env.platform.delay(RESET_MASTER_SETTLE);
                ret
            }
        }
    }

    /// Brings VBUS back to 5V. 65W adapters cannot be soft reset and are
    /// asked for 5V directly, everything else is reset.
    pub fn decrease_adapter_voltage_to_5v(&mut self, env: &mut HvdcpEnv) -> Result<(), HvdcpError> {
        let adp_type = env.scp_adapter_type();
        info!("adp_type={}", adp_type);

        if matches!(adp_type, AdapterType::Adp20V3P25AMax | AdapterType::Adp20V3P25A)
            && self.set_adapter_voltage(env, ADAPTER_5V as i32 * POWER_MV_PER_V).is_ok()
        {
            let steps = DECREASE_VOLT_WAIT.as_ticks() / DECREASE_VOLT_STEP.as_ticks();
            for _ in 0..steps {
                env.platform.delay(DECREASE_VOLT_STEP);
            }

            let vbus = env.platform.vbus();
            if (HVDCP_RESET_VOLT_LOWER_LIMIT..=HVDCP_RESET_VOLT_UPPER_LIMIT).contains(&vbus) {
                return Ok(());
            }
            info!("adapter vbus={} out of range", vbus);
        }

        self.reset_adapter(env)
    }

    pub fn check_charger_type(charger_type: ChargerType) -> bool {
        let ret = matches!(charger_type, ChargerType::Standard | ChargerType::Fcp);
        info!("check_charger_type: type={} ret={}", charger_type, ret);
        ret
    }

    pub fn check_adapter_status(&mut self, env: &mut HvdcpEnv) {
        if env.platform.not_power_good() {
            info!("charger not power good, no need check adapter status");
            return;
        }

        let Ok(status) = env.fcp().and_then(|fcp| fcp.slave_status().map_err(HvdcpError::from)) else {
            return;
        };
        info!("check_adapter_status: status={}", status);

        let (dmd, msg) = match status {
            SlaveStatus::Uvp => (DmdError::AdapterOverVoltage, "hvdcp adapter voltage over high\n"),
            SlaveStatus::Ocp => (DmdError::AdapterOverCurrent, "hvdcp adapter current over high\n"),
            SlaveStatus::Otp => (DmdError::AdapterOverTemp, "hvdcp adapter temp over high\n"),
            _ => return,
        };

        info!("{}", msg);
        env.dsm.report_dmd(DsmModule::FcpCharge, dmd, msg);
    }

    /// Reports a lost link after consecutive master errors.
    pub fn check_master_status(&mut self, env: &mut HvdcpEnv) {
        if env.platform.not_power_good() {
            info!("charger not power good, no need check master status");
            return;
        }

        let ok = env.fcp().and_then(|fcp| fcp.master_status().map_err(HvdcpError::from)).is_ok();
        if ok {
            self.master_error_cnt = 0;
        } else {
            self.master_error_cnt += 1;
        }
        info!("check_master_status: ok={} error_cnt={}", ok, self.master_error_cnt);

        if self.master_error_cnt >= HVDCP_MAX_MASTER_ERROR_CNT {
            self.master_error_cnt = 0;
            let msg = "hvdcp adapter connect fail\n";
            info!("{}", msg);
            env.dsm.report_dmd(DsmModule::FcpCharge, DmdError::SwitchAttach, msg);
        }
    }

    /// Factory running test: true once the charge current reaches `cur` mA.
    pub fn check_running_current(&self, platform: &mut dyn ChargerPlatform, cur: i32) -> bool {
        if !platform.is_factory_mode() || !self.charging_flag {
            return false;
        }

        let ichg = -platform.battery_current();
        info!("check_running_current: ichg={}, cur={}", ichg, cur);
        ichg >= cur
    }

    pub fn check_adapter_retry_count(&mut self) -> bool {
        let cnt = self.adapter_retry_cnt.saturating_add(1);
        self.set_adapter_retry_count(cnt);
        info!("adapter_retry cnt={}, max_cnt={}", cnt, HVDCP_MAX_ADAPTER_RETRY_CNT);
        cnt <= HVDCP_MAX_ADAPTER_RETRY_CNT
    }

    fn stage_count(&self, stage: HvdcpStage, cnt: u32) -> u32 {
        if self.stage == stage {
            cnt.saturating_add(1)
        } else {
            0
        }
    }

    /// False once the enable budget is used up. The DMD fires on the call
    /// that reaches the limit.
    pub fn check_adapter_enable_count(&mut self, env: &mut HvdcpEnv) -> bool {
        let cnt = self.stage_count(HvdcpStage::AdapterEnable, self.adapter_enable_cnt);
        self.set_adapter_enable_count(cnt);
        info!("adapter_enable cnt={}, max_cnt={}", cnt, HVDCP_MAX_ADAPTER_ENABLE_CNT);

        if cnt == HVDCP_MAX_ADAPTER_ENABLE_CNT {
            let msg = dsm_message(format_args!("hvdcp enable fail, vbus={}\n", env.platform.vbus()));
            info!("{}", msg.as_str());
            // a failed direct charge already reported the adapter
            if !self.direct_charge || !env.platform.direct_charge_failed() {
                env.dsm.report_dmd(DsmModule::FcpCharge, DmdError::FcpOutput, &msg);
            }
        }

        cnt < HVDCP_MAX_ADAPTER_ENABLE_CNT
    }

    /// Detect flavour of [`Self::check_adapter_enable_count`].
    pub fn check_adapter_detect_count(&mut self, env: &mut HvdcpEnv) -> bool {
        let cnt = self.stage_count(HvdcpStage::AdapterDetect, self.adapter_detect_cnt);
        self.set_adapter_detect_count(cnt);
        info!("adapter_detect cnt={}, max_cnt={}", cnt, HVDCP_MAX_ADAPTER_DETECT_CNT);

        if cnt == HVDCP_MAX_ADAPTER_DETECT_CNT {
            let msg = dsm_message(format_args!("hvdcp detect fail, vbus={}\n", env.platform.vbus()));
            info!("{}", msg.as_str());
            env.dsm.report_dmd(DsmModule::FcpCharge, DmdError::FcpDetect, &msg);
        }

        cnt < HVDCP_MAX_ADAPTER_DETECT_CNT
    }

    pub fn detect_adapter(&mut self, env: &mut HvdcpEnv) -> DetectResult {
        let (ret, adp_mode) = match env.fcp() {
            Ok(fcp) => fcp.detect_adapter_support_mode(),
            Err(_) => (DetectResult::Other, AdapterSupportMode::UNDEFINED),
        };
        info!("detect_adapter: adp_mode={:#x} ret={}", adp_mode.bits(), ret);

        if !self.direct_charge {
            match ret {
                DetectResult::Fail => error!("detect adapter fail"),
                DetectResult::Other => error!("detect adapter other"),
                DetectResult::Succ => {}
            }
            return ret;
        }

        if !env.platform.direct_charge_failed() {
            self.set_vboost_retry_count(0);

            if ret == DetectResult::Fail {
                error!("detect adapter fail");
                return DetectResult::Fail;
            }
            if ret == DetectResult::Other {
                error!("detect adapter other");
                return DetectResult::Other;
            }

            // direct charge capable adapters are left to direct charge
            let dc_adp_mode = env.scp_support_mode();
            info!("detect_adapter: dc_adp_mode={:#x}", dc_adp_mode.bits());
            if dc_adp_mode.intersects(AdapterSupportMode::LVC.union(AdapterSupportMode::SC)) {
                return DetectResult::Other;
            }
        }

        let cnt = self.vboost_retry_cnt;
        info!("vboost_retry cnt={}, max_cnt={}", cnt, HVDCP_MAX_VBOOST_RETRY_CNT);
        if cnt >= HVDCP_MAX_VBOOST_RETRY_CNT {
            return DetectResult::Other;
        }
        self.set_vboost_retry_count(cnt + 1);

        if ret != DetectResult::Succ || adp_mode != AdapterSupportMode::HV {
            return DetectResult::Other;
        }
        DetectResult::Succ
    }

    /// Drops back to 5V charging. False when the adapter could not be brought
    /// down.
    pub fn exit_charging(&mut self, env: &mut HvdcpEnv) -> bool {
        info!("exit_charging");

        let _ = env.platform.set_mivr(HVDCP_MIVR_SETTING);
        if self.decrease_adapter_voltage_to_5v(env).is_err() {
            return false;
        }
        let _ = env.platform.set_vbus_vset(ADAPTER_5V);
        true
    }
}
