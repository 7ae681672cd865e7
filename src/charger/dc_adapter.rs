//! Direct charge view of the attached adapter.
//!
//! Routes every request to the selected protocol, keeps the sticky
//! stop-charging flag raised by failed adapter accesses, and owns the power
//! curve cache and the antifake (adapter authentication) bookkeeping.

use heapless::Vec;

use crate::config::{read_bool_or, read_i32_table, read_u32_or, PropertySource};
use crate::dsm::{dsm_message, DmdError, DmdReporter, DsmModule, UeventNotifier};
use crate::power::supply::ProtocolPowerSupply;
use crate::protocol::{
    AdapterDeviceInfo, AdapterInitData, AdapterProtocol, AdapterProtocolType, AdapterSupportMode, AdapterType,
    PowerCurvePoint, ProtocolError,
};
use crate::units::POWER_UW_PER_MW;

use super::{ChargerPlatform, ResetTarget};

pub const DC_ADP_CUR_LEVEL: usize = 6;
pub const DC_ADP_CUR_PARA_SIZE: usize = 3;
pub const DC_ADP_PC_LEVEL: usize = 16;
pub const DC_ADP_PC_PARA_SIZE: usize = 2;

pub const ADP_ANTIFAKE_FAIL_MAX_CURRENT: i32 = 2250;
pub const ADP_ANTIFAKE_CHECK_THLD: u32 = 4;
/// mV per cell
pub const BAT_RATED_VOLT: i32 = 5000;
/// mW, adapters at or below this are not authenticated
pub const POWER_TH_IGNORE_ANTIFAKE: i32 = 22500;

const OUTPUT_ENABLE_RETRY: usize = 3;
const EH_LOG_SIZE: usize = 8;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AdapterError {
    Protocol(ProtocolError),
    /// a previous adapter access failed in this session
    Stopped,
    NoProtocol,
    InvalidPowerCurve,
    NoMaxCurrent,
}

impl From<ProtocolError> for AdapterError {
    fn from(e: ProtocolError) -> Self {
        AdapterError::Protocol(e)
    }
}

pub type AdapterResult<T = ()> = Result<T, AdapterError>;

/// Adapter accesses whose failure stopped the session.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DcEh {
    GetVapt,
    GetIapt,
    GetAptCurrSet,
    GetAptMaxCurr,
    GetAptPwrDropCurr,
    GetAptTemp,
    SetAptVolt,
    SetAptCurr,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AntifakeState {
    Init = 0,
    Succ = 1,
    Fail = 2,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AdpCurPara {
    pub vol_min: i32,
    pub vol_max: i32,
    pub cur_th: i32,
}

pub type AdpCurTable = [AdpCurPara; DC_ADP_CUR_LEVEL];

const EMPTY_CUR_TABLE: AdpCurTable = [AdpCurPara { vol_min: 0, vol_max: 0, cur_th: 0 }; DC_ADP_CUR_LEVEL];

/// Current limit of the first row with `vol_min < val <= vol_max`, 0 if none.
pub fn adapter_volt_handler(val: i32, table: &AdpCurTable) -> i32 {
    table
        .iter()
        .find(|row| val > row.vol_min && val <= row.vol_max)
        .map_or(0, |row| row.cur_th)
}

/// Per adapter type current limits, keyed by requested voltage.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct AdpCurTables {
    pub adp_10v2p25a: AdpCurTable,
    pub adp_10v2p25a_car: AdpCurTable,
    pub adp_qtr_a_10v2p25a: AdpCurTable,
    pub adp_qtr_c_20v3a: AdpCurTable,
    pub adp_10v4a: AdpCurTable,
    pub adp_20v3p25a: AdpCurTable,
}

impl AdpCurTables {
    pub const EMPTY: Self = Self {
        adp_10v2p25a: EMPTY_CUR_TABLE,
        adp_10v2p25a_car: EMPTY_CUR_TABLE,
        adp_qtr_a_10v2p25a: EMPTY_CUR_TABLE,
        adp_qtr_c_20v3a: EMPTY_CUR_TABLE,
        adp_10v4a: EMPTY_CUR_TABLE,
        adp_20v3p25a: EMPTY_CUR_TABLE,
    };

    pub fn for_type(&self, adapter_type: AdapterType) -> Option<&AdpCurTable> {
        match adapter_type {
            AdapterType::Adp10V2P25A => Some(&self.adp_10v2p25a),
            AdapterType::Adp10V2P25ACar => Some(&self.adp_10v2p25a_car),
            AdapterType::QtrA10V2P25A => Some(&self.adp_qtr_a_10v2p25a),
            AdapterType::QtrC20V3A => Some(&self.adp_qtr_c_20v3a),
            AdapterType::Adp10V4A => Some(&self.adp_10v4a),
            AdapterType::Adp20V3P25A | AdapterType::Adp20V3P25AMax => Some(&self.adp_20v3p25a),
            _ => None,
        }
    }
}

fn parse_cur_table<S: PropertySource + ?Sized>(src: &S, key: &str) -> AdpCurTable {
    let mut table = EMPTY_CUR_TABLE;
    let Ok(data) = read_i32_table::<_, { DC_ADP_CUR_LEVEL * DC_ADP_CUR_PARA_SIZE }>(src, key, DC_ADP_CUR_PARA_SIZE)
    else {
        return table;
    };

    for (row, para) in table.iter_mut().zip(data.chunks_exact(DC_ADP_CUR_PARA_SIZE)) {
        *row = AdpCurPara { vol_min: para[0], vol_max: para[1], cur_th: para[2] };
        debug!("{} {} {} {}", key, row.vol_min, row.vol_max, row.cur_th);
    }
    table
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct DcAdapterConfig {
    /// mV
    pub max_adapter_vset: i32,
    /// mA
    pub max_adapter_iset: i32,
    /// ms
    pub adapter_watchdog_time: i32,
    /// charge pump conversion ratio (1 for LVC, 2 for SC, 4 for SC4)
    pub volt_ratio: i32,
    pub antifake_enable: bool,
    /// authentication failures cap the current, otherwise they are only logged
    pub antifake_execute_enable: bool,
    pub antifake_key_index: u32,
    pub cur_tables: AdpCurTables,
}

impl DcAdapterConfig {
    pub const DEFAULT: Self = Self {
        max_adapter_vset: 5500,
        max_adapter_iset: 5000,
        adapter_watchdog_time: 3,
        volt_ratio: 1,
        antifake_enable: false,
        antifake_execute_enable: false,
        antifake_key_index: 1,
        cur_tables: AdpCurTables::EMPTY,
    };

    pub fn parse<S: PropertySource + ?Sized>(src: &S) -> Self {
        let d = Self::DEFAULT;
        Self {
            max_adapter_vset: read_u32_or(src, "max_adapter_vset", d.max_adapter_vset as u32) as i32,
            max_adapter_iset: read_u32_or(src, "max_adapter_iset", d.max_adapter_iset as u32) as i32,
            adapter_watchdog_time: read_u32_or(src, "adapter_watchdog_time", d.adapter_watchdog_time as u32) as i32,
            volt_ratio: read_u32_or(src, "dc_volt_ratio", d.volt_ratio as u32) as i32,
            antifake_enable: read_bool_or(src, "adp_antifake_enable", d.antifake_enable),
            antifake_execute_enable: read_bool_or(src, "adp_antifake_execute_enable", d.antifake_execute_enable),
            antifake_key_index: read_u32_or(src, "adp_antifake_key_index", d.antifake_key_index),
            cur_tables: AdpCurTables {
                adp_10v2p25a: parse_cur_table(src, "adapter_10v2p25a_cur_para"),
                adp_10v2p25a_car: parse_cur_table(src, "adapter_10v2p25a_car_cur_para"),
                adp_qtr_a_10v2p25a: parse_cur_table(src, "adapter_qtr_a_10v2p25a_cur_para"),
                adp_qtr_c_20v3a: parse_cur_table(src, "adapter_qtr_c_20v3a_cur_para"),
                adp_10v4a: parse_cur_table(src, "adapter_10v4a_cur_para"),
                adp_20v3p25a: parse_cur_table(src, "adapter_20v3p25a_cur_para"),
            },
        }
    }
}

/// Registered protocol sessions, one slot per protocol type.
#[derive(Default)]
pub struct AdapterProtocols<'a> {
    scp: Option<&'a mut dyn AdapterProtocol>,
    fcp: Option<&'a mut dyn AdapterProtocol>,
    ufcs: Option<&'a mut dyn AdapterProtocol>,
}

impl<'a> AdapterProtocols<'a> {
    pub const fn new() -> Self {
        Self { scp: None, fcp: None, ufcs: None }
    }

    pub fn register(&mut self, prot: &'a mut dyn AdapterProtocol) {
        info!("{} protocol register", prot.type_name());
        match prot.protocol_type() {
            AdapterProtocolType::Scp => self.scp = Some(prot),
            AdapterProtocolType::Fcp => self.fcp = Some(prot),
            AdapterProtocolType::Ufcs => self.ufcs = Some(prot),
        }
    }

    pub fn get(&mut self, prot_type: AdapterProtocolType) -> Option<&mut (dyn AdapterProtocol + 'a)> {
        match prot_type {
            AdapterProtocolType::Scp => self.scp.as_deref_mut(),
            AdapterProtocolType::Fcp => self.fcp.as_deref_mut(),
            AdapterProtocolType::Ufcs => self.ufcs.as_deref_mut(),
        }
    }
}

pub struct DcAdapter<'a> {
    protocols: AdapterProtocols<'a>,
    prot: AdapterProtocolType,
    config: DcAdapterConfig,
    supply: Option<ProtocolPowerSupply<'a>>,

    stop_charging: bool,
    eh_log: Vec<DcEh, EH_LOG_SIZE>,

    pwr_curve: [PowerCurvePoint; DC_ADP_PC_LEVEL],
    power_curve_flag: bool,

    antifake_result: AntifakeState,
    antifake_failed_cnt: u32,

    adaptor_vset: i32,
    adaptor_vendor_id: i32,
}

impl<'a> DcAdapter<'a> {
    pub fn new(config: DcAdapterConfig, protocols: AdapterProtocols<'a>) -> Self {
        Self {
            protocols,
            prot: AdapterProtocolType::Scp,
            config,
            supply: None,
            stop_charging: false,
            eh_log: Vec::new(),
            pwr_curve: [PowerCurvePoint::default(); DC_ADP_PC_LEVEL],
            power_curve_flag: false,
            antifake_result: AntifakeState::Init,
            antifake_failed_cnt: 0,
            adaptor_vset: 0,
            adaptor_vendor_id: 0,
        }
    }

    pub fn config(&self) -> &DcAdapterConfig {
        &self.config
    }

    pub fn protocols_mut(&mut self) -> &mut AdapterProtocols<'a> {
        &mut self.protocols
    }

    pub fn set_power_supply(&mut self, supply: ProtocolPowerSupply<'a>) {
        info!("protocol power supply ops register ok");
        self.supply = Some(supply);
    }

    /// Powers the protocol side of the link. Failures are only logged.
    pub fn protocol_power_supply(&mut self, enable: bool) {
        match self.supply.as_mut() {
            Some(supply) => {
                let _ = supply.enable(enable);
            }
            None => error!("pps_ops or power_supply_enable is null"),
        }
    }

    pub fn protocol_type(&self) -> AdapterProtocolType {
        self.prot
    }

    /// Picks UFCS, then SCP, from a protocol capability mask. Falls back to
    /// SCP and reports an error when neither bit is set.
    pub fn select_protocol_type(&mut self, prot_bits: u32) -> AdapterResult {
        if prot_bits & AdapterProtocolType::Ufcs.bit() != 0 {
            self.prot = AdapterProtocolType::Ufcs;
            info!("select ufcs protocol");
            return Ok(());
        }

        self.prot = AdapterProtocolType::Scp;
        if prot_bits & AdapterProtocolType::Scp.bit() != 0 {
            info!("select scp protocol");
            return Ok(());
        }

        info!("default select scp protocol");
        Err(AdapterError::NoProtocol)
    }

    fn protocol(&mut self) -> AdapterResult<&mut (dyn AdapterProtocol + 'a)> {
        let prot = self.prot;
        self.protocols.get(prot).ok_or_else(|| {
            error!("{} protocol not registered", prot);
            AdapterError::NoProtocol
        })
    }

    pub fn stop_charging_flag(&self) -> bool {
        self.stop_charging
    }

    pub fn set_stop_charging_flag(&mut self, flag: bool) {
        self.stop_charging = flag;
        if !flag {
            self.eh_log.clear();
        }
    }

    /// Accesses that stopped the session, oldest first.
    pub fn eh_log(&self) -> &[DcEh] {
        &self.eh_log
    }

    fn stop_with(&mut self, eh: DcEh) {
        let _ = self.eh_log.push(eh);
        self.stop_charging = true;
    }

    fn check_stopped(&self) -> AdapterResult {
        if self.stop_charging {
            return Err(AdapterError::Stopped);
        }
        Ok(())
    }

    pub fn protocol_registered(&mut self) -> AdapterResult {
        if !self.protocol()?.is_registered() {
            error!("adapter protocol not ready");
            return Err(AdapterError::NoProtocol);
        }
        Ok(())
    }

    pub fn init_adapter(&mut self, init_vset: i32) -> AdapterResult {
        let data = AdapterInitData {
            scp_mode_enable: true,
            vset_boundary: self.config.max_adapter_vset,
            iset_boundary: self.config.max_adapter_iset,
            init_voltage: init_vset,
            watchdog_timer: self.config.adapter_watchdog_time,
        };
        Ok(self.protocol()?.set_init_data(&data)?)
    }

    pub fn reset_operate(&mut self, target: ResetTarget) -> AdapterResult {
        let prot = self.protocol()?;
        match target {
            ResetTarget::Adapter => {
                info!("soft reset adapter");
                Ok(prot.soft_reset_slave()?)
            }
            ResetTarget::Master => {
                info!("soft reset master");
                Ok(prot.soft_reset_master()?)
            }
        }
    }

    pub fn adapter_type(&mut self) -> AdapterType {
        match self.protocol() {
            Ok(prot) => prot.adapter_type().unwrap_or(AdapterType::Unknown),
            Err(_) => AdapterType::Unknown,
        }
    }

    pub fn support_mode(&mut self) -> AdapterSupportMode {
        match self.protocol() {
            Ok(prot) => prot.support_mode(),
            Err(_) => AdapterSupportMode::UNDEFINED,
        }
    }

    pub fn adapter_voltage(&mut self) -> AdapterResult<i32> {
        let ret = self.protocol()?.output_voltage();
        ret.map_err(|e| {
            self.stop_with(DcEh::GetVapt);
            error!("get adapter output voltage fail");
            e.into()
        })
    }

    pub fn max_voltage(&mut self) -> AdapterResult<i32> {
        Ok(self.protocol()?.max_voltage()?)
    }

    // refuses once stopped, stops the session on failure
    fn guarded_read(
        &mut self,
        eh: DcEh,
        read: impl FnOnce(&mut (dyn AdapterProtocol + 'a)) -> Result<i32, ProtocolError>,
    ) -> AdapterResult<i32> {
        self.check_stopped()?;
        let ret = read(self.protocol()?);
        ret.map_err(|e| {
            self.stop_with(eh);
            error!("get adapter {} fail", eh);
            e.into()
        })
    }

    pub fn adapter_current(&mut self) -> AdapterResult<i32> {
        self.guarded_read(DcEh::GetIapt, |prot| prot.output_current())
    }

    pub fn adapter_current_set(&mut self) -> AdapterResult<i32> {
        self.guarded_read(DcEh::GetAptCurrSet, |prot| prot.output_current_set())
    }

    pub fn power_drop_current(&mut self) -> AdapterResult<i32> {
        self.guarded_read(DcEh::GetAptPwrDropCurr, |prot| prot.power_drop_current())
    }

    pub fn adapter_temp(&mut self) -> AdapterResult<i32> {
        self.guarded_read(DcEh::GetAptTemp, |prot| prot.inside_temp())
    }

    fn max_cur_by_reg(&mut self) -> AdapterResult<i32> {
        self.guarded_read(DcEh::GetAptMaxCurr, |prot| prot.max_current())
    }

    fn max_cur_by_power_curve(&self, val: i32) -> i32 {
        self.pwr_curve.iter().find(|point| val <= point.volt).map_or(0, |point| point.cur)
    }

    fn max_cur_by_config(&mut self, val: i32) -> i32 {
        let adapter_type = self.adapter_type();
        self.config
            .cur_tables
            .for_type(adapter_type)
            .map_or(0, |table| adapter_volt_handler(val, table))
    }

    /// Largest current the adapter allows at `val` mV. 0 when nothing is
    /// known.
    pub fn max_current(&mut self, val: i32) -> i32 {
        if !self.config.antifake_execute_enable && self.antifake_failed_cnt >= ADP_ANTIFAKE_CHECK_THLD {
            info!("antifake check failed, set max current to {}", ADP_ANTIFAKE_FAIL_MAX_CURRENT);
            return ADP_ANTIFAKE_FAIL_MAX_CURRENT;
        }

        let mut max_cur = 0;
        if self.power_curve_flag {
            max_cur = self.max_cur_by_power_curve(val);
        }
        if max_cur <= 0 {
            max_cur = self.max_cur_by_config(val);
        }
        if max_cur <= 0 {
            max_cur = self.max_cur_by_reg().unwrap_or(0);
        }

        // charger current accuracy, the adapter really delivers 3250mA
        if max_cur == 3200 {
            max_cur = 3250;
        }
        max_cur
    }

    pub fn reset_power_curve(&mut self) {
        self.power_curve_flag = false;
        self.pwr_curve = [PowerCurvePoint::default(); DC_ADP_PC_LEVEL];
    }

    pub fn power_curve(&self) -> Option<&[PowerCurvePoint]> {
        self.power_curve_flag.then_some(&self.pwr_curve[..])
    }

    pub fn fetch_power_curve(&mut self) -> AdapterResult {
        self.reset_power_curve();
        self.check_stopped()?;

        let num = self.protocol()?.power_curve_num()?;
        if num == 0 || num > DC_ADP_PC_LEVEL {
            error!("invalid power curve num={}", num);
            return Err(AdapterError::InvalidPowerCurve);
        }

        let mut points = [PowerCurvePoint::default(); DC_ADP_PC_LEVEL];
        let read = self.protocol()?.power_curve(&mut points[..num])?;
        if read != num {
            error!("power curve size mismatch {} {}", read, num);
            return Err(AdapterError::InvalidPowerCurve);
        }

        self.pwr_curve[..num].copy_from_slice(&points[..num]);
        self.power_curve_flag = true;
        for (i, point) in self.pwr_curve.iter().enumerate() {
            info!("adp_pwr_curve[{}].volt={}, cur={}", i, point.volt, point.cur);
        }
        Ok(())
    }

    pub fn adaptor_vset(&self) -> i32 {
        self.adaptor_vset
    }

    pub fn set_adaptor_vset(&mut self, vset: i32) {
        self.adaptor_vset = vset;
    }

    /// Requests `value` mV, clamped to the configured maximum.
    pub fn set_voltage(&mut self, value: i32) -> AdapterResult {
        let max_vset = self.config.max_adapter_vset;
        info!("set adapter_volt={},max_volt={}", value, max_vset);

        let mut value = value;
        if value > max_vset {
            value = max_vset;
            self.adaptor_vset = max_vset;
        }

        let ret = self.protocol()?.set_output_voltage(value);
        ret.map_err(|e| {
            self.stop_with(DcEh::SetAptVolt);
            error!("set adapter voltage fail");
            e.into()
        })
    }

    /// Requests `value` mA, clamped to the configured maximum.
    pub fn set_current(&mut self, value: i32) -> AdapterResult {
        self.check_stopped()?;

        let max_iset = self.config.max_adapter_iset;
        info!("set adapter_cur={},max_cur={}", value, max_iset);

        let ret = self.protocol()?.set_output_current(value.min(max_iset));
        ret.map_err(|e| {
            self.stop_with(DcEh::SetAptCurr);
            error!("set adapter current fail");
            e.into()
        })
    }

    pub fn set_output_capability(&mut self, vol: i32, cur: i32, wdt_time: i32) -> AdapterResult {
        let data = AdapterInitData {
            scp_mode_enable: true,
            vset_boundary: vol,
            iset_boundary: cur,
            init_voltage: vol,
            watchdog_timer: wdt_time,
        };

        let prot = self.protocol()?;
        prot.set_init_data(&data)?;
        prot.set_output_voltage(vol)?;
        prot.set_output_current(cur)?;
        Ok(())
    }

    pub fn set_output_enable(&mut self, enable: bool) -> AdapterResult {
        info!("set adapter_output_enable={}", enable);

        let prot = self.protocol()?;
        let mut ret = Ok(());
        for _ in 0..OUTPUT_ENABLE_RETRY {
            ret = prot.set_output_enable(enable);
            if ret.is_ok() {
                break;
            }
        }
        Ok(ret?)
    }

    pub fn set_default_param(&mut self) {
        if let Ok(prot) = self.protocol() {
            prot.set_default_param();
        }
    }

    pub fn set_default_state(&mut self) -> AdapterResult {
        Ok(self.protocol()?.set_default_state()?)
    }

    pub fn vendor_id(&self) -> i32 {
        self.adaptor_vendor_id
    }

    pub fn update_adapter_info(&mut self) -> AdapterResult<AdapterDeviceInfo> {
        let prot = self.protocol()?;
        let info = prot.device_info().map_err(|e| {
            error!("get adapter info fail");
            e
        })?;
        info!(
            "adapter vendor_id={:#x} max_volt={} volt_cap={} max_pwr={}",
            info.vendor_id,
            info.max_volt,
            info.volt_cap,
            info.max_pwr
        );

        let vendor_id = prot.chip_vendor_id().map_err(|e| {
            error!("get adapter vendor id fail");
            e
        })?;
        self.adaptor_vendor_id = vendor_id;
        Ok(info)
    }

    /// Modes direct charge may use with this adapter, starting from LVC and SC.
    pub fn update_support_mode(&mut self) -> AdapterSupportMode {
        let mode = AdapterSupportMode::LVC.union(AdapterSupportMode::SC);
        match self.protocol() {
            Ok(prot) => prot.update_support_mode(mode),
            Err(_) => mode,
        }
    }

    /// False only when enforcement is on and the last authentication failed.
    pub fn antifake_result(&self) -> bool {
        if !self.config.antifake_execute_enable {
            return true;
        }
        self.antifake_result != AntifakeState::Fail
    }

    pub fn antifake_state(&self) -> AntifakeState {
        self.antifake_result
    }

    pub fn antifake_failed_cnt(&self) -> u32 {
        self.antifake_failed_cnt
    }

    pub fn increase_antifake_failed_cnt(&mut self) {
        self.antifake_failed_cnt = self.antifake_failed_cnt.saturating_add(1);
        info!("antifake failed cnt={}", self.antifake_failed_cnt);
    }

    pub fn reset_antifake(&mut self) {
        self.antifake_failed_cnt = 0;
        self.antifake_result = AntifakeState::Init;
    }

    /// Authenticates high power adapters. Returns the authentication result.
    pub fn check_antifake(
        &mut self,
        platform: &mut dyn ChargerPlatform,
        uevent: &mut dyn UeventNotifier,
        dsm: &mut dyn DmdReporter,
    ) -> AdapterResult {
        if !self.config.antifake_enable {
            return Ok(());
        }

        if platform.direct_charge_priority_inversion() {
            info!("antifake already checked");
            return Ok(());
        }

        let series = platform.battery_series();
        let volt_ratio = self.config.volt_ratio;
        let max_cur = self.max_current(series * BAT_RATED_VOLT * volt_ratio);
        if max_cur == 0 {
            return Err(AdapterError::NoMaxCurrent);
        }

        // mW
        let max_pwr = max_cur * BAT_RATED_VOLT * volt_ratio * series / POWER_UW_PER_MW;
        info!("max_cur={}, max_pwr={}", max_cur, max_pwr);
        if max_pwr <= POWER_TH_IGNORE_ANTIFAKE {
            return Ok(());
        }

        let key_index = self.config.antifake_key_index;
        let ret = self.protocol()?.auth_encrypt_start(key_index);
        self.report_antifake_result(platform, uevent, dsm, ret.is_err(), max_cur, max_pwr);
        Ok(ret?)
    }

    fn report_antifake_result(
        &mut self,
        platform: &mut dyn ChargerPlatform,
        uevent: &mut dyn UeventNotifier,
        dsm: &mut dyn DmdReporter,
        failed: bool,
        cur: i32,
        pwr: i32,
    ) {
        let state = if failed { AntifakeState::Fail } else { AntifakeState::Succ };
        if state == self.antifake_result {
            return;
        }
        self.antifake_result = state;

        if !platform.charger_online() {
            info!("charger has been removed, no need report event");
            return;
        }

        let adp_type = self.adapter_type();
        let adp_mode = self.support_mode();
        let Ok(prot) = self.protocol() else {
            return;
        };
        let vendor_id = prot.chip_vendor_id().unwrap_or_else(|_| {
            info!("get vendor id fail");
            0
        });
        let serial_num = prot.chip_serial_num().unwrap_or_else(|_| {
            info!("get serial num fail");
            0
        });

        let msg = dsm_message(format_args!(
            "BMS_EVT=EVT_ADAPTER_AUTH_UPDATE@vendor_id:{},serial_no:{},protocol:scp,adp_type:{},adp_mode:{},max_cur:{},max_pwr:{},auth_state:{}\n",
            vendor_id,
            serial_num,
            adp_type as i32,
            adp_mode.bits(),
            cur,
            pwr,
            state as i32
        ));

        if self.config.antifake_execute_enable {
            uevent.report_uevent(&msg);
        } else {
            info!("adapter antifake result:{}", msg.as_str());
        }

        if state == AntifakeState::Fail {
            dsm.report_dmd(DsmModule::Battery, DmdError::NonStandardChargerPlugged, &msg);
        }
    }
}
