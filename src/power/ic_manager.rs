/*
 * Path oriented facade over the direct charge switch ICs.
 *
 * Every operation resolves a (mode, path) pair to concrete IC slots and
 * applies itself to each slot in index order (main before aux). How the
 * per-IC results combine depends on the operation:
 *
 * FAIL FAST: lifecycle and safety operations. The first IC that fails
 *   aborts the call, a half configured multi-IC setup must never charge.
 * BEST EFFORT: telemetry adjacent operations. Every IC is visited and the
 *   error codes are summed into IcManagerError::Partial.
 * FIRST IC: identity and single value getters read the first resolved IC.
 * SUM / MIN / MAX: current and temperature telemetry.
 *
 * No retries happen here, retry policy belongs to the caller.
 */

use crate::drivers::charge_pump::{ChargePumpPair, CpMode, CpType};
use crate::drivers::dc_ic::{BatInfoOps, DcIcOps, FuelGauge, IcError, IcResult};

use super::comp::CompEngine;
use super::ic_para::IcModeConfig;
use super::{ChargeMode, ChargePath, IcIndexList, CHARGE_IC_MAX_NUM};

pub const INVALID_IC_NAME: &str = "invalid ic";

// ibat calibration gain is stored in parts per million
const IBAT_CALI_SCALE: i64 = 1_000_000;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IcManagerError {
    /// path names no known charge path
    IllegalPath,
    /// the working mode has no IC table
    ModeNotConfigured,
    /// more ICs matched than slots exist
    IndexOverflow,
    /// no IC is wired to the requested path, charging on it must not proceed
    NoEligibleIc,
    /// a fail fast operation stopped at this IC error
    OperationFailed(IcError),
    /// best effort aggregate, sum of the individual error codes
    Partial { sum: i32 },
    InvalidParam,
}

impl From<IcError> for IcManagerError {
    fn from(err: IcError) -> Self {
        IcManagerError::OperationFailed(err)
    }
}

/// Factory ibat calibration of one IC. A zero gain disables calibration.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct IbatCalibration {
    pub c_offset_a: i32,
    pub c_offset_b: i32,
}

impl IbatCalibration {
    pub fn apply(&self, ibat: i32) -> i32 {
        if self.c_offset_a == 0 {
            return ibat;
        }

        ((ibat as i64 * self.c_offset_a as i64 + self.c_offset_b as i64) / IBAT_CALI_SCALE) as i32
    }
}

fn sum_result(sum: i32) -> Result<(), IcManagerError> {
    if sum == 0 {
        Ok(())
    } else {
        Err(IcManagerError::Partial { sum })
    }
}

pub struct IcManager<'a> {
    config: IcModeConfig,
    ic_ops: [[Option<&'a mut dyn DcIcOps>; CHARGE_IC_MAX_NUM]; ChargeMode::COUNT],
    batinfo_ops: [Option<&'a mut dyn BatInfoOps>; CHARGE_IC_MAX_NUM],
    batinfo_names: [Option<&'a str>; CHARGE_IC_MAX_NUM],
    calibration: [IbatCalibration; CHARGE_IC_MAX_NUM],
    gauge: Option<&'a mut dyn FuelGauge>,
    comp: Option<CompEngine>,
    charge_pumps: ChargePumpPair<'a>,
}

impl<'a> IcManager<'a> {
    pub fn new(config: IcModeConfig) -> Self {
        Self {
            config,
            ic_ops: Default::default(),
            batinfo_ops: Default::default(),
            batinfo_names: [None; CHARGE_IC_MAX_NUM],
            calibration: [IbatCalibration::default(); CHARGE_IC_MAX_NUM],
            gauge: None,
            comp: None,
            charge_pumps: ChargePumpPair::empty(),
        }
    }

    pub fn config(&self) -> &IcModeConfig {
        &self.config
    }

    pub fn register_ic(&mut self, mode: ChargeMode, index: usize, ops: &'a mut dyn DcIcOps) -> Result<(), IcManagerError> {
        let slot = self.ic_ops[mode.index()]
            .get_mut(index)
            .ok_or(IcManagerError::InvalidParam)?;
        *slot = Some(ops);
        info!("mode {}, ic {} register ok", mode.as_str(), index);
        Ok(())
    }

    /// Registers the battery side telemetry of slot `index`. `name` is the
    /// chip name without mode suffix, used to look up compensation tables.
    pub fn register_batinfo(&mut self, index: usize, ops: &'a mut dyn BatInfoOps, name: &'a str) -> Result<(), IcManagerError> {
        if index >= CHARGE_IC_MAX_NUM {
            return Err(IcManagerError::InvalidParam);
        }

        self.batinfo_ops[index] = Some(ops);
        self.batinfo_names[index] = Some(name);
        info!("ic {} batinfo register ok", index);
        Ok(())
    }

    pub fn register_gauge(&mut self, gauge: &'a mut dyn FuelGauge) {
        self.gauge = Some(gauge);
    }

    pub fn set_charge_pumps(&mut self, pumps: ChargePumpPair<'a>) {
        self.charge_pumps = pumps;
    }

    pub fn set_calibration(&mut self, index: usize, cali: IbatCalibration) -> Result<(), IcManagerError> {
        let slot = self.calibration.get_mut(index).ok_or(IcManagerError::InvalidParam)?;
        *slot = cali;
        Ok(())
    }

    pub fn set_comp_engine(&mut self, comp: CompEngine) {
        self.comp = Some(comp);
    }

    pub fn comp_engine(&self) -> Option<&CompEngine> {
        self.comp.as_ref()
    }

    /// Names of the slots with battery telemetry registered, by IC role.
    pub fn registered_ic_names(&self) -> [Option<&'a str>; CHARGE_IC_MAX_NUM] {
        self.batinfo_names
    }

    fn ic(&mut self, mode: ChargeMode, index: usize) -> IcResult<&mut dyn DcIcOps> {
        let mode = mode.effective(self.config.use_two_stage);
        match self.ic_ops[mode.index()].get_mut(index) {
            Some(Some(ops)) => Ok(&mut **ops),
            _ => {
                error!("{} ic {} ops is null", mode.as_str(), index);
                Err(IcError::NotSupported)
            }
        }
    }

    fn batinfo(&mut self, index: usize) -> IcResult<&mut dyn BatInfoOps> {
        match self.batinfo_ops.get_mut(index) {
            Some(Some(ops)) => Ok(&mut **ops),
            _ => {
                error!("ic {} batinfo ops is null", index);
                Err(IcError::NotSupported)
            }
        }
    }

    fn resolve(&self, mode: ChargeMode, path: ChargePath, what: &str) -> Result<IcIndexList, IcManagerError> {
        let list = self.config.ic_index(mode, path);
        match &list {
            Ok(l) => info!("path {} num {}: {}", path.bits(), l.len(), what),
            Err(e) => warn!("path {}: {} skipped, {}", path.bits(), what, e),
        }
        list
    }

    fn fail_fast<F>(&mut self, mode: ChargeMode, path: ChargePath, what: &str, mut op: F) -> Result<(), IcManagerError>
    where
        F: FnMut(&mut dyn DcIcOps) -> IcResult,
    {
        for &index in self.resolve(mode, path, what)?.iter() {
            if let Err(err) = self.ic(mode, index).and_then(&mut op) {
                error!("ic {} {} fail", index, what);
                return Err(IcManagerError::OperationFailed(err));
            }
        }
        Ok(())
    }

    fn best_effort<F>(&mut self, mode: ChargeMode, path: ChargePath, what: &str, mut op: F) -> Result<(), IcManagerError>
    where
        F: FnMut(&mut dyn DcIcOps) -> IcResult,
    {
        let mut sum = 0;
        for &index in self.resolve(mode, path, what)?.iter() {
            if let Err(err) = self.ic(mode, index).and_then(&mut op) {
                warn!("ic {} {} fail", index, what);
                sum += err.errno();
            }
        }
        sum_result(sum)
    }

    fn first_ic(&self, mode: ChargeMode, path: ChargePath) -> Result<usize, IcManagerError> {
        Ok(self.config.ic_index(mode, path)?[0])
    }

    // fail fast

    pub fn init_ic(&mut self, mode: ChargeMode, path: ChargePath) -> Result<(), IcManagerError> {
        self.fail_fast(mode, path, "init ic", |ic| ic.ic_init())
    }

    pub fn exit_ic(&mut self, mode: ChargeMode, path: ChargePath) -> Result<(), IcManagerError> {
        self.fail_fast(mode, path, "exit ic", |ic| ic.ic_exit())
    }

    pub fn enable_ic(&mut self, mode: ChargeMode, path: ChargePath, enable: bool) -> Result<(), IcManagerError> {
        self.fail_fast(mode, path, "enable ic", |ic| ic.ic_enable(enable))
    }

    pub fn enable_irq(&mut self, mode: ChargeMode, path: ChargePath, enable: bool) -> Result<(), IcManagerError> {
        self.fail_fast(mode, path, "enable irq", |ic| ic.irq_enable(enable))
    }

    pub fn discharge_ic(&mut self, mode: ChargeMode, path: ChargePath, enable: bool) -> Result<(), IcManagerError> {
        self.fail_fast(mode, path, "discharge ic", |ic| ic.discharge(enable))
    }

    pub fn enable_ic_prepare(&mut self, mode: ChargeMode, path: ChargePath) -> Result<(), IcManagerError> {
        self.fail_fast(mode, path, "prepare enable ic", |ic| ic.ic_enable_prepare())
    }

    pub fn config_ic_watchdog(&mut self, mode: ChargeMode, path: ChargePath, time_ms: u32) -> Result<(), IcManagerError> {
        self.fail_fast(mode, path, "config watchdog", |ic| ic.config_watchdog(time_ms))
    }

    /// True once any targeted IC reports its switch closed.
    pub fn is_ic_close(&mut self, mode: ChargeMode, path: ChargePath) -> Result<bool, IcManagerError> {
        let mut closed = false;
        self.fail_fast(mode, path, "is ic close", |ic| {
            closed |= ic.is_ic_close()?;
            Ok(())
        })?;
        Ok(closed)
    }

    pub fn is_ic_support_prepare(&mut self, mode: ChargeMode, path: ChargePath) -> bool {
        let Ok(list) = self.config.ic_index(mode, path) else {
            return false;
        };

        list.iter()
            .all(|&index| self.ic(mode, index).map(|ic| ic.supports_prepare()).unwrap_or(false))
    }

    pub fn init_batinfo(&mut self, mode: ChargeMode, path: ChargePath) -> Result<(), IcManagerError> {
        for &index in self.resolve(mode, path, "init batinfo")?.iter() {
            self.batinfo(index)?.init()?;
        }
        Ok(())
    }

    pub fn exit_batinfo(&mut self, mode: ChargeMode, path: ChargePath) -> Result<(), IcManagerError> {
        for &index in self.resolve(mode, path, "exit batinfo")?.iter() {
            self.batinfo(index)?.exit()?;
        }
        Ok(())
    }

    // best effort

    pub fn enable_ic_adc(&mut self, mode: ChargeMode, path: ChargePath, enable: bool) -> Result<(), IcManagerError> {
        self.best_effort(mode, path, "enable adc", |ic| ic.adc_enable(enable))
    }

    pub fn kick_ic_watchdog(&mut self, mode: ChargeMode, path: ChargePath) -> Result<(), IcManagerError> {
        self.best_effort(mode, path, "kick watchdog", |ic| ic.kick_watchdog())
    }

    pub fn get_ic_status(&mut self, mode: ChargeMode, path: ChargePath) -> Result<(), IcManagerError> {
        self.best_effort(mode, path, "get status", |ic| ic.ic_status())
    }

    pub fn set_ic_buck_enable(&mut self, mode: ChargeMode, path: ChargePath, enable: bool) -> Result<(), IcManagerError> {
        self.best_effort(mode, path, "set buck enable", |ic| ic.set_buck_enable(enable))
    }

    pub fn reset_and_init_ic_reg(&mut self, mode: ChargeMode, path: ChargePath) -> Result<(), IcManagerError> {
        self.best_effort(mode, path, "reset and init reg", |ic| ic.reg_reset_and_init())
    }

    // first IC only

    pub fn ic_id(&mut self, mode: ChargeMode, path: ChargePath) -> Result<i32, IcManagerError> {
        let index = self.first_ic(mode, path)?;
        Ok(self.ic(mode, index)?.ic_id()?)
    }

    pub fn ic_freq(&mut self, mode: ChargeMode, path: ChargePath) -> Result<u32, IcManagerError> {
        let index = self.first_ic(mode, path)?;
        Ok(self.ic(mode, index)?.freq()?)
    }

    pub fn set_ic_freq(&mut self, mode: ChargeMode, path: ChargePath, freq: u32) -> Result<(), IcManagerError> {
        let index = self.first_ic(mode, path)?;
        Ok(self.ic(mode, index)?.set_freq(freq)?)
    }

    pub fn ic_name(&mut self, mode: ChargeMode, path: ChargePath) -> &str {
        let Ok(index) = self.first_ic(mode, path) else {
            return INVALID_IC_NAME;
        };

        match self.ic(mode, index) {
            Ok(ic) => ic.name(),
            Err(_) => INVALID_IC_NAME,
        }
    }

    pub fn ic_vpack(&mut self, mode: ChargeMode, path: ChargePath) -> Result<i32, IcManagerError> {
        let index = self.first_ic(mode, path)?;
        Ok(self.batinfo(index)?.bat_package_voltage()?)
    }

    pub fn ic_vbus(&mut self, mode: ChargeMode, path: ChargePath) -> Result<i32, IcManagerError> {
        let index = self.first_ic(mode, path)?;
        Ok(self.batinfo(index)?.vbus_voltage()?)
    }

    pub fn ic_vusb(&mut self, mode: ChargeMode, path: ChargePath) -> Result<i32, IcManagerError> {
        let index = self.first_ic(mode, path)?;
        Ok(self.batinfo(index)?.ic_vusb()?)
    }

    pub fn ic_vout(&mut self, mode: ChargeMode, path: ChargePath) -> Result<i32, IcManagerError> {
        let index = self.first_ic(mode, path)?;
        Ok(self.batinfo(index)?.ic_vout()?)
    }

    fn read_ibat(&mut self, index: usize) -> IcResult<i32> {
        let raw = self.batinfo(index)?.bat_current()?;
        let cali = self.calibration[index];
        let ibat = cali.apply(raw);
        debug!("ic {} ibat raw {} cali {}", index, raw, ibat);
        Ok(ibat)
    }

    pub fn ic_ibat(&mut self, mode: ChargeMode, path: ChargePath) -> Result<i32, IcManagerError> {
        let index = self.first_ic(mode, path)?;
        Ok(self.read_ibat(index)?)
    }

    // aggregated telemetry

    fn coul_ibat(&mut self) -> Option<i32> {
        if !self.config.use_coul_ibat {
            return None;
        }
        self.gauge.as_mut().map(|g| g.bat_current_now())
    }

    fn coul_vbat(&mut self) -> Option<i32> {
        if !self.config.use_coul_vbat {
            return None;
        }
        self.gauge.as_mut().map(|g| g.bat_voltage_now())
    }

    /// Battery current summed over one IC per sampling point.
    pub fn total_ibat(&mut self, mode: ChargeMode, path: ChargePath) -> Result<i32, IcManagerError> {
        let list = self.config.ic_index_for_ibat(mode, path)?;
        if let Some(ibat) = self.coul_ibat() {
            return Ok(ibat);
        }

        let mut total = 0;
        for &index in list.iter() {
            let ibat = self.read_ibat(index)?;
            info!("ic {} ibat is {}", index, ibat);
            total += ibat;
        }
        info!("total ibat is {}", total);
        Ok(total)
    }

    /// Parallel ICs add their rated currents.
    pub fn path_max_ibat(&mut self, mode: ChargeMode, path: ChargePath) -> Result<i32, IcManagerError> {
        let mut total = 0;
        for &index in self.config.ic_index(mode, path)?.iter() {
            total += self.config.ic_max_ibat(mode, index)?;
        }
        Ok(total)
    }

    /// The weakest IC caps the path. Unrated (0) ICs after the first are ignored.
    pub fn ic_max_ibat(&mut self, mode: ChargeMode, path: ChargePath) -> Result<i32, IcManagerError> {
        let list = self.config.ic_index(mode, path)?;
        let mut min_ibat = self.config.ic_max_ibat(mode, list[0])?;
        info!("ic {} max ibat is {}", list[0], min_ibat);
        for &index in list.iter().skip(1) {
            let ibat = self.config.ic_max_ibat(mode, index)?;
            info!("ic {} max ibat is {}", index, ibat);
            if ibat != 0 && ibat < min_ibat {
                min_ibat = ibat;
            }
        }
        Ok(min_ibat)
    }

    pub fn ic_ibus(&mut self, mode: ChargeMode, path: ChargePath) -> Result<i32, IcManagerError> {
        let mut total = 0;
        for &index in self.config.ic_index(mode, path)?.iter() {
            let ibus = self.batinfo(index)?.ic_ibus()?;
            debug!("ic {} ibus is {}", index, ibus);
            total += ibus;
        }
        Ok(total)
    }

    pub fn ic_temp(&mut self, mode: ChargeMode, path: ChargePath) -> Result<i32, IcManagerError> {
        let mut max_temp = 0;
        for &index in self.config.ic_index(mode, path)?.iter() {
            let temp = match self.batinfo(index) {
                Ok(ops) => ops.ic_temp()?,
                Err(_) => 0,
            };
            max_temp = max_temp.max(temp);
        }
        Ok(max_temp)
    }

    fn ic_vbat_comp(&mut self, role: usize) -> i32 {
        let Some(comp) = self.comp.as_ref() else {
            return 0;
        };

        let gauge = &mut self.gauge;
        comp.ic_vbat_comp(role, || gauge.as_mut().map_or(0, |g| g.bat_current_now()))
    }

    /// Battery terminal voltage of the first IC on `path`, corrected by the
    /// per-IC compensation. The coulomb counter voltage wins when configured.
    pub fn ic_vbtb(&mut self, mode: ChargeMode, path: ChargePath) -> Result<i32, IcManagerError> {
        if let Some(vbat) = self.coul_vbat() {
            return Ok(vbat);
        }

        let index = self.first_ic(mode, path)?;
        let vbat = self.batinfo(index)?.bat_btb_voltage()?;
        let comp = self.ic_vbat_comp(index);
        Ok(vbat + comp)
    }

    /// Board level compensation on top of [`Self::ic_vbtb`]. `board_comp` is
    /// `[main, aux]`, skipped when the per-IC engine already corrected.
    pub fn ic_vbtb_with_comp(&mut self, mode: ChargeMode, path: ChargePath, board_comp: &[i32; 2]) -> Result<i32, IcManagerError> {
        let vbat = self.ic_vbtb(mode, path)?;
        if vbat < 0 {
            return Err(IcManagerError::InvalidParam);
        }

        let engine_active = self.comp.as_ref().is_some_and(|c| c.is_active());
        if vbat == 0 || engine_active {
            return Ok(vbat);
        }

        let comp = path.table_index().map_or(0, |i| board_comp[i]);
        Ok(vbat + comp)
    }

    /// Worst case (highest) compensated voltage of main and aux, for over
    /// voltage protection.
    pub fn ic_max_vbtb_with_comp(&mut self, mode: ChargeMode, board_comp: &[i32; 2]) -> Result<i32, IcManagerError> {
        let main = self.ic_vbtb_with_comp(mode, ChargePath::MAIN, board_comp);
        let aux = self.ic_vbtb_with_comp(mode, ChargePath::AUX, board_comp);
        debug!("vbtb main {} aux {}", main.unwrap_or(-1), aux.unwrap_or(-1));

        match (main, aux) {
            (Ok(m), Ok(a)) => Ok(m.max(a)),
            (Ok(v), Err(_)) | (Err(_), Ok(v)) => Ok(v),
            (Err(e), Err(_)) => Err(e),
        }
    }

    // first level charge pumps

    pub fn init_first_level_ic(&mut self) -> Result<(), IcManagerError> {
        let mut sum = 0;
        for cp_type in [CpType::Main, CpType::Aux] {
            if let Err(err) = self.charge_pumps.chip_init(cp_type) {
                sum += err.errno();
            }
        }
        sum_result(sum)
    }

    pub fn enable_first_level_ic(&mut self, cp_type: CpType, enable: bool) {
        if self.charge_pumps.chip_enable(cp_type, enable).is_err() {
            warn!("charge pump {} enable {} fail", cp_type, enable);
        }
    }

    pub fn set_first_level_ic_mode(&mut self, mode: CpMode) -> Result<(), IcManagerError> {
        let mut sum = 0;
        for cp_type in [CpType::Main, CpType::Aux] {
            if let Err(err) = self.charge_pumps.set_mode(cp_type, mode) {
                sum += err.errno();
            }
        }
        sum_result(sum)
    }

    pub fn is_first_level_cp_open(&mut self, cp_type: CpType) -> bool {
        self.charge_pumps.is_cp_open(cp_type)
    }

    pub fn is_first_level_bp_open(&mut self, cp_type: CpType) -> bool {
        self.charge_pumps.is_bp_open(cp_type)
    }
}
