//! Cross-IC consistency checks for parallel (multi IC) direct charging.
//!
//! Three escalating checks run every poll once the session is older than
//! [`MULTI_IC_CHECK_TIMEOUT`]: the main/aux ibus ratio, the battery voltage
//! delta between the two sense points and the BTB temperature delta. Every
//! check owns up to [`MULTI_IC_PARA_LEVEL`] tiers. A tier counts out of bound
//! samples until its threshold, then reports a DMD once and tightens the
//! shared current limit. Counters never decrease within a session.
//!
//! Remediation is left to the caller: [`MultiIcChecker::force_single_path`]
//! and [`MultiIcChecker::limit_current`] are polled by the charge loop.

use embassy_time::{Duration, Instant};
use heapless::Vec;

use crate::config::{read_i32_table, PropertySource};
use crate::dsm::{dsm_message, DmdError, DmdReporter, DsmModule};

use super::ic_manager::IcManager;
use super::{ChargeMode, ChargePath, CHARGE_PATH_MAX_NUM};

pub const MULTI_IC_CHECK_VBAT_LOW_TH: i32 = 3000;
pub const MULTI_IC_CHECK_VBAT_HIGH_TH: i32 = 5000;
pub const MULTI_IC_CHECK_TIMEOUT: Duration = Duration::from_secs(30);
pub const MULTI_IC_CHECK_ERR_CNT_MAX: u32 = 3;
pub const MULTI_IC_INFO_IBAT_TH_DEFAULT: i32 = 7000;
pub const MULTI_IC_PARA_LEVEL: usize = 5;

// bus current the battery does not account for in a healthy high power charge
const HIGH_POWER_CUR_TH: i32 = 800;
// ibus ratio is kept in tenths
const RATIO_SCALE: i32 = 10;

// ibus_lth, vbat_hth
const THRE_COLS: usize = 2;
// error_cnt, ratio_min, ratio_max, dmd_level, limit_current
const RATIO_COLS: usize = 5;
// error_cnt, diff_val, dmd_level, limit_current
const DIFF_COLS: usize = 4;

// btb check result bits
pub const MAIN_BAT_BTB_ERR: u32 = 1 << 0;
pub const AUX_BAT_BTB_ERR: u32 = 1 << 1;
pub const BTB_BAT_DIFF_ERR: u32 = 1 << 2;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CheckError {
    InvalidParam,
    /// hard bound violation, multi IC charging must stop entirely
    VbatOutOfRange { path: usize, vbat: i32 },
    LimitCurrentInvalid,
    /// every IC reached the error count cap
    AllIcFaulted,
    /// at least one IC reached the error count cap
    IcFaulted,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DmdLevel {
    Info,
    Warning,
    Error,
}

impl DmdLevel {
    pub const COUNT: usize = 3;

    pub const fn from_raw(level: i32) -> Option<Self> {
        match level {
            0 => Some(DmdLevel::Info),
            1 => Some(DmdLevel::Warning),
            2 => Some(DmdLevel::Error),
            _ => None,
        }
    }

    const fn index(self) -> usize {
        self as usize
    }

    const fn dmd_error(self) -> DmdError {
        match self {
            DmdLevel::Info => DmdError::MultiChargeCurrentRatioInfo,
            DmdLevel::Warning => DmdError::MultiChargeCurrentRatioWarning,
            DmdLevel::Error => DmdError::MultiChargeCurrentRatioError,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CheckKind {
    Info = 0,
    Ibus = 1,
    Vbat = 2,
    Tbat = 3,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BtbSensor {
    Main,
    Aux,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BtbCheck {
    Volt,
    Temp,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TbatSelect {
    Sensor(BtbSensor),
    Mixed,
}

/// Battery side readings used by the checks and in report text.
pub trait BatteryMonitor {
    fn btb_temp(&mut self, sensor: BtbSensor) -> i32;
    /// unfiltered temperature, used for the delta check
    fn btb_rt_temp(&mut self, sensor: BtbSensor) -> i32;
    fn ui_capacity(&mut self) -> i32;
    /// platform sign convention, negative while charging
    fn battery_current(&mut self) -> i32;
    fn battery_current_avg(&mut self) -> i32;
    fn charger_type(&mut self) -> u32;
    /// `*_BTB_ERR` bits of the last board to board connector check
    fn btb_result(&mut self, check: BtbCheck) -> u32;
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ThrePara {
    pub ibus_lth: i32,
    pub vbat_hth: i32,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RatioTier {
    pub error_cnt: u32,
    pub ratio_min: i32,
    pub ratio_max: i32,
    pub dmd_level: i32,
    pub limit_current: i32,
}

impl RatioTier {
    fn in_bound(&self, ratio: i32) -> bool {
        ratio >= self.ratio_min && ratio <= self.ratio_max
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DiffTier {
    pub error_cnt: u32,
    pub diff_val: u32,
    pub dmd_level: i32,
    pub limit_current: i32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MultiIcCheckConfig {
    pub thre_para: [ThrePara; CHARGE_PATH_MAX_NUM],
    pub curr_ratio: [RatioTier; MULTI_IC_PARA_LEVEL],
    pub vbat_error: [DiffTier; MULTI_IC_PARA_LEVEL],
    pub tbat_error: [DiffTier; MULTI_IC_PARA_LEVEL],
    pub ibat_th: i32,
    /// board level `[main, aux]` vbat offset
    pub vbat_comp: [i32; 2],
}

impl Default for MultiIcCheckConfig {
    fn default() -> Self {
        Self {
            thre_para: Default::default(),
            curr_ratio: Default::default(),
            vbat_error: Default::default(),
            tbat_error: Default::default(),
            ibat_th: MULTI_IC_INFO_IBAT_TH_DEFAULT,
            vbat_comp: [0, 0],
        }
    }
}

impl MultiIcCheckConfig {
    /// Every table is optional, a missing or malformed one stays zeroed and
    /// its tiers never fire.
    pub fn parse<S: PropertySource + ?Sized>(src: &S) -> Self {
        let mut cfg = Self::default();

        if let Ok(data) = read_i32_table::<_, { CHARGE_PATH_MAX_NUM * THRE_COLS }>(src, "thre_para", THRE_COLS) {
            for (slot, r) in cfg.thre_para.iter_mut().zip(data.chunks(THRE_COLS)) {
                *slot = ThrePara { ibus_lth: r[0], vbat_hth: r[1] };
            }
        }

        if let Ok(data) = read_i32_table::<_, { MULTI_IC_PARA_LEVEL * RATIO_COLS }>(src, "current_ratio", RATIO_COLS) {
            for (slot, r) in cfg.curr_ratio.iter_mut().zip(data.chunks(RATIO_COLS)) {
                *slot = RatioTier {
                    error_cnt: r[0].max(0) as u32,
                    ratio_min: r[1],
                    ratio_max: r[2],
                    dmd_level: r[3],
                    limit_current: r[4],
                };
            }
        }

        cfg.vbat_error = Self::parse_diff(src, "vbat_error");
        cfg.tbat_error = Self::parse_diff(src, "tbat_error");
        cfg
    }

    fn parse_diff<S: PropertySource + ?Sized>(src: &S, key: &str) -> [DiffTier; MULTI_IC_PARA_LEVEL] {
        let mut tiers: [DiffTier; MULTI_IC_PARA_LEVEL] = Default::default();
        let data: Vec<i32, { MULTI_IC_PARA_LEVEL * DIFF_COLS }> = match read_i32_table(src, key, DIFF_COLS) {
            Ok(data) => data,
            Err(_) => return tiers,
        };

        for (slot, r) in tiers.iter_mut().zip(data.chunks(DIFF_COLS)) {
            *slot = DiffTier {
                error_cnt: r[0].max(0) as u32,
                diff_val: r[1].max(0) as u32,
                dmd_level: r[2],
                limit_current: r[3],
            };
        }
        tiers
    }
}

/// Escalation progress of one tier.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TierState {
    pub count: u32,
    /// threshold reached, the tier's action has been taken
    pub latched: bool,
}

impl TierState {
    /// Counts one excursion. True on the sample that reaches `threshold`.
    fn record(&mut self, threshold: u32) -> bool {
        self.count += 1;
        if self.count == threshold {
            self.latched = true;
            return true;
        }
        false
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct McCheckState {
    pub ibus: [TierState; MULTI_IC_PARA_LEVEL],
    pub vbat: [TierState; MULTI_IC_PARA_LEVEL],
    pub tbat: [TierState; MULTI_IC_PARA_LEVEL],
    /// one report per DMD level per session, shared by all checks
    pub report_info: [bool; DmdLevel::COUNT],
    pub limit_current: i32,
    pub force_single_path_flag: bool,
    pub start_time: Instant,
}

impl McCheckState {
    pub fn new(limit_current: i32, now: Instant) -> Self {
        Self {
            ibus: Default::default(),
            vbat: Default::default(),
            tbat: Default::default(),
            report_info: [false; DmdLevel::COUNT],
            limit_current,
            force_single_path_flag: false,
            start_time: now,
        }
    }
}

/// Collaborators a check cycle reads from and reports to.
pub struct CheckEnv<'e, 'a> {
    pub ic: &'e mut IcManager<'a>,
    pub battery: &'e mut dyn BatteryMonitor,
    pub dsm: &'e mut dyn DmdReporter,
}

pub struct MultiIcChecker {
    config: MultiIcCheckConfig,
    state: McCheckState,
}

impl MultiIcChecker {
    pub fn new(config: MultiIcCheckConfig, now: Instant) -> Self {
        Self { config, state: McCheckState::new(0, now) }
    }

    pub fn config(&self) -> &MultiIcCheckConfig {
        &self.config
    }

    pub fn state(&self) -> &McCheckState {
        &self.state
    }

    /// Session start: clears counters, latches and the fallback flag and
    /// restores the thermal default current limit.
    pub fn reset(&mut self, limit_current: i32, now: Instant) {
        self.state = McCheckState::new(limit_current, now);
        self.config.ibat_th = MULTI_IC_INFO_IBAT_TH_DEFAULT;
    }

    /// Re-arms the settle timeout, e.g. after a path switch.
    pub fn restart(&mut self, now: Instant) {
        self.state.start_time = now;
    }

    pub fn limit_current(&self) -> i32 {
        self.state.limit_current
    }

    pub fn force_single_path(&self) -> bool {
        self.state.force_single_path_flag
    }

    pub fn clear_force_single_path(&mut self) {
        self.state.force_single_path_flag = false;
    }

    fn settled(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.state.start_time) >= MULTI_IC_CHECK_TIMEOUT
    }

    /// Lowers, never raises, the shared limit. 0 means no limit.
    pub fn update_limit_current(&mut self, limit_current: i32) {
        if limit_current != 0 && self.state.limit_current > limit_current {
            info!("limit current {} -> {}", self.state.limit_current, limit_current);
            self.state.limit_current = limit_current;
        }
    }

    /// One check cycle. Only paths running both ICs (`MULTI`) are checked.
    pub fn check(
        &mut self,
        env: &mut CheckEnv,
        working_mode: ChargeMode,
        path: ChargePath,
        volt_ratio: i32,
        now: Instant,
    ) -> Result<(), CheckError> {
        if path != ChargePath::MULTI || !self.settled(now) {
            return Ok(());
        }

        self.check_threshold(env, working_mode, volt_ratio)?;

        if self.is_high_power(env, working_mode, path, volt_ratio) {
            return Ok(());
        }

        self.check_info(env, working_mode);
        self.check_ibus(env, working_mode, now);
        self.check_vbat(env, working_mode);
        self.check_tbat(env, working_mode);

        if self.state.limit_current < 0 {
            return Err(CheckError::LimitCurrentInvalid);
        }
        Ok(())
    }

    /// Hard voltage bounds per path, then the soft fallback conditions.
    pub fn check_threshold(&mut self, env: &mut CheckEnv, working_mode: ChargeMode, volt_ratio: i32) -> Result<(), CheckError> {
        if volt_ratio == 0 {
            return Err(CheckError::InvalidParam);
        }

        let vbat_comp = self.config.vbat_comp;
        for i in 0..CHARGE_PATH_MAX_NUM {
            let path = ChargePath::from_index(i);
            let vbat = env.ic.ic_vbtb_with_comp(working_mode, path, &vbat_comp).unwrap_or(-1);
            if !(MULTI_IC_CHECK_VBAT_LOW_TH..=MULTI_IC_CHECK_VBAT_HIGH_TH).contains(&vbat) {
                error!("vbat is over limit, vbat[{}]={}", i, vbat);
                return Err(CheckError::VbatOutOfRange { path: i, vbat });
            }

            let thre = self.config.thre_para[i];
            if thre.vbat_hth != 0 && vbat > thre.vbat_hth {
                self.set_force_single_path();
                return Ok(());
            }

            let ibus = env.ic.ic_ibus(working_mode, path).unwrap_or(0);
            let max_ibat = env.ic.path_max_ibat(working_mode, path).unwrap_or(0);
            if thre.ibus_lth != 0 && ibus < thre.ibus_lth {
                self.set_force_single_path();
                return Ok(());
            }
            if max_ibat != 0 && ibus > max_ibat / volt_ratio {
                self.set_force_single_path();
                return Ok(());
            }
        }

        Ok(())
    }

    fn set_force_single_path(&mut self) {
        info!("set force_single_path_flag true");
        self.state.force_single_path_flag = true;
    }

    fn is_high_power(&mut self, env: &mut CheckEnv, working_mode: ChargeMode, path: ChargePath, volt_ratio: i32) -> bool {
        let mut total_ibus = 0;
        for i in 0..CHARGE_PATH_MAX_NUM {
            total_ibus += env.ic.ic_ibus(working_mode, ChargePath::from_index(i)).unwrap_or(0);
        }
        let total_ibat = env.ic.total_ibat(working_mode, path).unwrap_or(0);

        if total_ibus * volt_ratio - total_ibat > HIGH_POWER_CUR_TH {
            info!("high power scenario, skip dmd report");
            return true;
        }
        false
    }

    fn ibus_pair(env: &mut CheckEnv, working_mode: ChargeMode) -> (i32, i32) {
        let main = env.ic.ic_ibus(working_mode, ChargePath::MAIN).unwrap_or(0);
        let aux = env.ic.ic_ibus(working_mode, ChargePath::AUX).unwrap_or(0);
        (main, aux)
    }

    fn vbat_pair(&self, env: &mut CheckEnv, working_mode: ChargeMode) -> (i32, i32) {
        let comp = self.config.vbat_comp;
        let main = env.ic.ic_vbtb_with_comp(working_mode, ChargePath::MAIN, &comp).unwrap_or(0);
        let aux = env.ic.ic_vbtb_with_comp(working_mode, ChargePath::AUX, &comp).unwrap_or(0);
        (main, aux)
    }

    fn check_info(&mut self, env: &mut CheckEnv, working_mode: ChargeMode) {
        if self.state.report_info[DmdLevel::Info.index()] {
            return;
        }

        let ibat = env.ic.ic_ibat(working_mode, ChargePath::MAIN).unwrap_or(0);
        if ibat < self.config.ibat_th {
            return;
        }

        let (ibus_main, ibus_aux) = Self::ibus_pair(env, working_mode);
        if ibus_aux == 0 {
            return;
        }

        let Some(tier) = self
            .config
            .curr_ratio
            .iter()
            .find(|t| DmdLevel::from_raw(t.dmd_level) == Some(DmdLevel::Info) && t.ratio_max != 0)
            .copied()
        else {
            return;
        };

        let ratio = ibus_main * RATIO_SCALE / ibus_aux;
        if tier.in_bound(ratio) {
            let detail = dsm_message(format_args!("Ibus_ratio = {}, Ibus1 = {}mA, Ibus2 = {}mA\n", ratio, ibus_main, ibus_aux));
            self.report_dmd(env, working_mode, CheckKind::Info, DmdLevel::Info.index() as i32, &detail);
        }
    }

    fn check_ibus(&mut self, env: &mut CheckEnv, working_mode: ChargeMode, now: Instant) {
        if !self.settled(now) {
            return;
        }

        let (ibus_main, ibus_aux) = Self::ibus_pair(env, working_mode);
        if ibus_aux == 0 {
            return;
        }
        let ratio = ibus_main * RATIO_SCALE / ibus_aux;

        for i in 0..MULTI_IC_PARA_LEVEL {
            let tier = self.config.curr_ratio[i];
            if self.state.ibus[i].count >= tier.error_cnt || tier.in_bound(ratio) {
                continue;
            }

            let fired = self.state.ibus[i].record(tier.error_cnt);
            info!(
                "check ibus error, ibus_main={}, ibus_aux={}, ibus_ratio={}, cnt={}",
                ibus_main, ibus_aux, ratio, self.state.ibus[i].count
            );
            if fired {
                let detail = dsm_message(format_args!("Ibus_ratio = {}, Ibus1 = {}mA, Ibus2 = {}mA\n", ratio, ibus_main, ibus_aux));
                self.report_dmd(env, working_mode, CheckKind::Ibus, tier.dmd_level, &detail);
                self.update_limit_current(tier.limit_current);
            }
            return;
        }
    }

    fn check_vbat(&mut self, env: &mut CheckEnv, working_mode: ChargeMode) {
        let (vbat_main, vbat_aux) = self.vbat_pair(env, working_mode);
        let delta = vbat_main.abs_diff(vbat_aux);

        for i in 0..MULTI_IC_PARA_LEVEL {
            let tier = self.config.vbat_error[i];
            if self.state.vbat[i].count >= tier.error_cnt || delta <= tier.diff_val {
                continue;
            }

            let fired = self.state.vbat[i].record(tier.error_cnt);
            info!(
                "check delta_vbat error, main_vbat={}, aux_vbat={}, cnt={}",
                vbat_main, vbat_aux, self.state.vbat[i].count
            );
            if fired {
                let detail = dsm_message(format_args!(
                    "delta_vbat = {}, main_vbat = {}, aux_vbat = {}\n",
                    delta, vbat_main, vbat_aux
                ));
                self.report_dmd(env, working_mode, CheckKind::Vbat, tier.dmd_level, &detail);
                self.update_limit_current(tier.limit_current);
            }
            return;
        }
    }

    fn check_tbat(&mut self, env: &mut CheckEnv, working_mode: ChargeMode) {
        let tbat_main = env.battery.btb_rt_temp(BtbSensor::Main);
        let tbat_aux = env.battery.btb_rt_temp(BtbSensor::Aux);
        let delta = tbat_main.abs_diff(tbat_aux);

        for i in 0..MULTI_IC_PARA_LEVEL {
            let tier = self.config.tbat_error[i];
            if self.state.tbat[i].count >= tier.error_cnt || delta <= tier.diff_val {
                continue;
            }

            let fired = self.state.tbat[i].record(tier.error_cnt);
            info!(
                "check delta_tbat error, main_tbat={}, aux_tbat={}, cnt={}",
                tbat_main, tbat_aux, self.state.tbat[i].count
            );
            if fired {
                let detail = dsm_message(format_args!(
                    "delta_tbat = {}, main_tbat = {}, aux_tbat = {}\n",
                    delta, tbat_main, tbat_aux
                ));
                self.report_dmd(env, working_mode, CheckKind::Tbat, tier.dmd_level, &detail);
                self.update_limit_current(tier.limit_current);
            }
            return;
        }
    }

    fn report_dmd(&mut self, env: &mut CheckEnv, working_mode: ChargeMode, kind: CheckKind, dmd_level: i32, detail: &str) {
        let Some(level) = DmdLevel::from_raw(dmd_level) else {
            return;
        };
        if self.state.report_info[level.index()] {
            return;
        }

        let (ibus_main, ibus_aux) = Self::ibus_pair(env, working_mode);
        if ibus_aux == 0 {
            return;
        }
        let ratio = ibus_main * RATIO_SCALE / ibus_aux;
        let (vbat_main, vbat_aux) = self.vbat_pair(env, working_mode);
        let tbat_main = env.battery.btb_temp(BtbSensor::Main);
        let tbat_aux = env.battery.btb_temp(BtbSensor::Aux);

        let msg = dsm_message(format_args!(
            "{} error_type = {}, Ibus_ratio = {}, capacity = {}, curr = {}mA,avg_curr = {}mA, \
             Ibus1 = {}mA, Ibus2 = {}mA, batt_volt1 = {}mV, batt_volt2 = {}mV,temp1 = {}, temp2 = {}, charger_type = {}\n",
            detail.trim_end(),
            kind as i32,
            ratio,
            env.battery.ui_capacity(),
            -env.battery.battery_current(),
            env.battery.battery_current_avg(),
            ibus_main,
            ibus_aux,
            vbat_main,
            vbat_aux,
            tbat_main,
            tbat_aux,
            env.battery.charger_type(),
        ));

        info!("{}", msg.as_str());
        env.dsm.report_dmd(DsmModule::Battery, level.dmd_error(), &msg);
        self.state.report_info[level.index()] = true;
    }
}

/// Per-IC fault bookkeeping used to pick the starting path of a session.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct McIcSelector {
    pub support_multi_ic: bool,
    pub support_select_temp: bool,
    pub ic_error_cnt: [u32; CHARGE_PATH_MAX_NUM],
}

impl McIcSelector {
    pub fn new(support_multi_ic: bool, support_select_temp: bool) -> Self {
        Self { support_multi_ic, support_select_temp, ic_error_cnt: [0; CHARGE_PATH_MAX_NUM] }
    }

    fn apply_btb_result(&mut self, battery: &mut dyn BatteryMonitor, check: BtbCheck) {
        let result = battery.btb_result(check);
        info!("btb check begin, type is {}", check);
        if result == 0 {
            return;
        }

        if result & MAIN_BAT_BTB_ERR != 0 {
            self.ic_error_cnt = [MULTI_IC_CHECK_ERR_CNT_MAX; CHARGE_PATH_MAX_NUM];
            info!("main btb check fail, can not direct charge");
        }
        if result & AUX_BAT_BTB_ERR != 0 {
            self.ic_error_cnt[1] = MULTI_IC_CHECK_ERR_CNT_MAX;
            info!("aux btb check fail");
        }
        if result & BTB_BAT_DIFF_ERR != 0 {
            self.ic_error_cnt[1] = MULTI_IC_CHECK_ERR_CNT_MAX;
            info!("btb diff check fail");
        }
    }

    /// First path whose IC is still below the error cap, after folding in
    /// the BTB connector checks.
    pub fn select_init_mode(&mut self, battery: &mut dyn BatteryMonitor) -> Result<ChargePath, CheckError> {
        if !self.support_multi_ic {
            return Ok(ChargePath::MAIN);
        }

        self.apply_btb_result(battery, BtbCheck::Volt);
        self.apply_btb_result(battery, BtbCheck::Temp);

        match self.ic_error_cnt.iter().position(|&c| c < MULTI_IC_CHECK_ERR_CNT_MAX) {
            Some(i) => Ok(ChargePath::from_index(i)),
            None => {
                info!("all ic is error, can not enter direct charge");
                Err(CheckError::AllIcFaulted)
            }
        }
    }

    /// Battery temperature source, avoiding a sensor whose connector failed.
    pub fn select_tbat_id(&self, battery: &mut dyn BatteryMonitor) -> TbatSelect {
        if !self.support_multi_ic || !self.support_select_temp {
            return TbatSelect::Mixed;
        }

        match battery.btb_result(BtbCheck::Temp) {
            MAIN_BAT_BTB_ERR => TbatSelect::Sensor(BtbSensor::Aux),
            AUX_BAT_BTB_ERR => TbatSelect::Sensor(BtbSensor::Main),
            _ => TbatSelect::Mixed,
        }
    }

    pub fn set_ic_error_flag(&mut self, path: ChargePath) {
        let index = match path {
            p if p == ChargePath::MAIN => 0,
            p if p == ChargePath::AUX => 1,
            _ => return,
        };

        if self.ic_error_cnt[index] < MULTI_IC_CHECK_ERR_CNT_MAX {
            self.ic_error_cnt[index] += 1;
        }
        info!("[err_flag] main={}, aux={}", self.ic_error_cnt[0], self.ic_error_cnt[1]);
    }

    pub fn check_ic_status(&self) -> Result<(), CheckError> {
        if self.ic_error_cnt.iter().any(|&c| c >= MULTI_IC_CHECK_ERR_CNT_MAX) {
            return Err(CheckError::IcFaulted);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PropertyTable, PropertyValue};

    #[test]
    fn tier_latches_on_threshold() {
        let mut tier = TierState::default();
        assert!(!tier.record(2));
        assert!(tier.record(2));
        assert!(tier.latched);
    }

    #[test]
    fn limit_only_tightens() {
        let mut checker = MultiIcChecker::new(MultiIcCheckConfig::default(), Instant::from_secs(0));
        checker.reset(2000, Instant::from_secs(0));
        checker.update_limit_current(2500);
        assert_eq!(checker.limit_current(), 2000);
        checker.update_limit_current(0);
        assert_eq!(checker.limit_current(), 2000);
        checker.update_limit_current(1500);
        assert_eq!(checker.limit_current(), 1500);
    }

    #[test]
    fn parse_tables() {
        let props = PropertyTable::new(&[
            ("thre_para", PropertyValue::I32Array(&[500, 4450, 500, 4450])),
            ("current_ratio", PropertyValue::I32Array(&[3, 5, 20, 1, 3000, 1, 8, 12, 0, 0])),
            ("vbat_error", PropertyValue::I32Array(&[3, 100, 2, 2000])),
        ]);
        let cfg = MultiIcCheckConfig::parse(&props);
        assert_eq!(cfg.thre_para[1], ThrePara { ibus_lth: 500, vbat_hth: 4450 });
        assert_eq!(cfg.curr_ratio[1].dmd_level, 0);
        assert_eq!(cfg.vbat_error[0].diff_val, 100);
        assert_eq!(cfg.tbat_error, [DiffTier::default(); MULTI_IC_PARA_LEVEL]);
        assert_eq!(cfg.ibat_th, MULTI_IC_INFO_IBAT_TH_DEFAULT);
    }

    #[test]
    fn error_flag_capped() {
        let mut sel = McIcSelector::new(true, false);
        for _ in 0..5 {
            sel.set_ic_error_flag(ChargePath::AUX);
        }
        assert_eq!(sel.ic_error_cnt, [0, MULTI_IC_CHECK_ERR_CNT_MAX]);
        assert_eq!(sel.check_ic_status(), Err(CheckError::IcFaulted));
        sel.set_ic_error_flag(ChargePath::MULTI);
        assert_eq!(sel.ic_error_cnt[0], 0);
    }
}
