#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::string::String;
use std::vec::Vec;

use embassy_time::Duration;

use direct_charge::charger::ChargerPlatform;
use direct_charge::drivers::charge_pump::ChargePumpOps;
use direct_charge::drivers::dc_ic::{BatInfoOps, DcIcOps, FuelGauge, IcError, IcResult};
use direct_charge::dsm::{DmdError, DmdReporter, DsmModule, UeventNotifier};
use direct_charge::power::multi_ic_check::{BatteryMonitor, BtbCheck, BtbSensor};
use direct_charge::protocol::fcp::{FcpDetect, FcpOps};
use direct_charge::protocol::{
    AdapterDeviceInfo, AdapterInitData, AdapterProtocol, AdapterProtocolType, AdapterSupportMode, AdapterType,
    DetectResult, PowerCurvePoint, ProtocolError, ProtocolResult, SlaveStatus,
};

pub type CallLog = Rc<RefCell<Vec<String>>>;

pub fn call_log() -> CallLog {
    Rc::new(RefCell::new(Vec::new()))
}

fn result(fail: bool) -> IcResult {
    if fail {
        Err(IcError::Io)
    } else {
        Ok(())
    }
}

/// Switch IC. Every call is appended to `log` as "<name>:<op>".
pub struct MockIc {
    pub name: &'static str,
    pub log: CallLog,
    pub fail_init: bool,
    pub fail_enable: bool,
    pub fail_adc: bool,
    pub fail_kick: bool,
    pub closed: bool,
    pub prepare: bool,
    pub freq: u32,
}

impl MockIc {
    pub fn new(name: &'static str, log: &CallLog) -> Self {
        Self {
            name,
            log: log.clone(),
            fail_init: false,
            fail_enable: false,
            fail_adc: false,
            fail_kick: false,
            closed: false,
            prepare: false,
            freq: 500,
        }
    }

    fn record(&self, op: &str) {
        self.log.borrow_mut().push(format!("{}:{}", self.name, op));
    }
}

impl DcIcOps for MockIc {
    fn name(&self) -> &str {
        self.name
    }

    fn ic_init(&mut self) -> IcResult {
        self.record("init");
        result(self.fail_init)
    }

    fn ic_exit(&mut self) -> IcResult {
        self.record("exit");
        Ok(())
    }

    fn ic_enable(&mut self, enable: bool) -> IcResult {
        self.record(if enable { "enable" } else { "disable" });
        result(self.fail_enable)
    }

    fn adc_enable(&mut self, _enable: bool) -> IcResult {
        self.record("adc");
        result(self.fail_adc)
    }

    fn is_ic_close(&mut self) -> IcResult<bool> {
        self.record("is_close");
        Ok(self.closed)
    }

    fn supports_prepare(&self) -> bool {
        self.prepare
    }

    fn kick_watchdog(&mut self) -> IcResult {
        self.record("kick");
        result(self.fail_kick)
    }

    fn freq(&mut self) -> IcResult<u32> {
        Ok(self.freq)
    }
}

#[derive(Default)]
pub struct MockBatInfo {
    pub vbtb: i32,
    pub vpack: i32,
    pub vbus: i32,
    pub ibat: i32,
    pub ibus: i32,
    pub temp: i32,
    pub fail_vbtb: bool,
}

impl BatInfoOps for MockBatInfo {
    fn init(&mut self) -> IcResult {
        Ok(())
    }

    fn exit(&mut self) -> IcResult {
        Ok(())
    }

    fn bat_btb_voltage(&mut self) -> IcResult<i32> {
        if self.fail_vbtb {
            return Err(IcError::Io);
        }
        Ok(self.vbtb)
    }

    fn bat_package_voltage(&mut self) -> IcResult<i32> {
        Ok(self.vpack)
    }

    fn vbus_voltage(&mut self) -> IcResult<i32> {
        Ok(self.vbus)
    }

    fn bat_current(&mut self) -> IcResult<i32> {
        Ok(self.ibat)
    }

    fn ic_ibus(&mut self) -> IcResult<i32> {
        Ok(self.ibus)
    }

    fn ic_temp(&mut self) -> IcResult<i32> {
        Ok(self.temp)
    }
}

pub struct MockGauge {
    pub current: i32,
    pub voltage: i32,
}

impl FuelGauge for MockGauge {
    fn bat_current_now(&mut self) -> i32 {
        self.current
    }

    fn bat_voltage_now(&mut self) -> i32 {
        self.voltage
    }
}

#[derive(Default)]
pub struct MockPump {
    pub fail_init: bool,
    pub cp_open: bool,
    pub enabled: bool,
}

impl ChargePumpOps for MockPump {
    fn chip_init(&mut self) -> IcResult {
        result(self.fail_init)
    }

    fn chip_enable(&mut self, enable: bool) -> IcResult {
        self.enabled = enable;
        Ok(())
    }

    fn set_bp_mode(&mut self) -> IcResult {
        self.cp_open = false;
        Ok(())
    }

    fn set_cp_mode(&mut self) -> IcResult {
        self.cp_open = true;
        Ok(())
    }

    fn is_cp_open(&mut self) -> bool {
        self.cp_open
    }

    fn is_bp_open(&mut self) -> bool {
        !self.cp_open
    }
}

#[derive(Default)]
pub struct MockBattery {
    pub btb_temp: [i32; 2],
    pub capacity: i32,
    pub current: i32,
    pub current_avg: i32,
    pub charger_type: u32,
    pub btb_volt_result: u32,
    pub btb_temp_result: u32,
}

impl BatteryMonitor for MockBattery {
    fn btb_temp(&mut self, sensor: BtbSensor) -> i32 {
        match sensor {
            BtbSensor::Main => self.btb_temp[0],
            BtbSensor::Aux => self.btb_temp[1],
        }
    }

    fn btb_rt_temp(&mut self, sensor: BtbSensor) -> i32 {
        self.btb_temp(sensor)
    }

    fn ui_capacity(&mut self) -> i32 {
        self.capacity
    }

    fn battery_current(&mut self) -> i32 {
        self.current
    }

    fn battery_current_avg(&mut self) -> i32 {
        self.current_avg
    }

    fn charger_type(&mut self) -> u32 {
        self.charger_type
    }

    fn btb_result(&mut self, check: BtbCheck) -> u32 {
        match check {
            BtbCheck::Volt => self.btb_volt_result,
            BtbCheck::Temp => self.btb_temp_result,
        }
    }
}

#[derive(Default)]
pub struct DmdLog {
    pub reports: Vec<(DsmModule, DmdError, String)>,
}

impl DmdLog {
    pub fn count(&self, error: DmdError) -> usize {
        self.reports.iter().filter(|(_, e, _)| *e == error).count()
    }
}

impl DmdReporter for DmdLog {
    fn report_dmd(&mut self, module: DsmModule, error: DmdError, msg: &str) {
        self.reports.push((module, error, msg.to_string()));
    }
}

#[derive(Default)]
pub struct UeventLog {
    pub events: Vec<String>,
}

impl UeventNotifier for UeventLog {
    fn report_uevent(&mut self, event: &str) {
        self.events.push(event.to_string());
    }
}

pub struct MockPlatform {
    pub not_pg: bool,
    pub online: bool,
    pub vbus: i32,
    pub battery_current: i32,
    pub series: i32,
    pub factory: bool,
    pub dc_failed: bool,
    pub mivr: Option<i32>,
    pub vbus_vset: Option<u32>,
    pub slept: Duration,
}

impl Default for MockPlatform {
    fn default() -> Self {
        Self {
            not_pg: false,
            online: true,
            vbus: 5000,
            battery_current: 0,
            series: 1,
            factory: false,
            dc_failed: false,
            mivr: None,
            vbus_vset: None,
            slept: Duration::from_ticks(0),
        }
    }
}

impl ChargerPlatform for MockPlatform {
    fn not_power_good(&mut self) -> bool {
        self.not_pg
    }

    fn charger_online(&mut self) -> bool {
        self.online
    }

    fn vbus(&mut self) -> i32 {
        self.vbus
    }

    fn battery_current(&mut self) -> i32 {
        self.battery_current
    }

    fn battery_series(&self) -> i32 {
        self.series
    }

    fn is_factory_mode(&self) -> bool {
        self.factory
    }

    fn set_mivr(&mut self, mv: i32) -> IcResult {
        self.mivr = Some(mv);
        Ok(())
    }

    fn set_vbus_vset(&mut self, volt: u32) -> IcResult {
        self.vbus_vset = Some(volt);
        Ok(())
    }

    fn direct_charge_failed(&self) -> bool {
        self.dc_failed
    }

    fn delay(&mut self, duration: Duration) {
        self.slept += duration;
    }
}

/// Scriptable adapter protocol. `None` results stand for transfer failures.
pub struct MockProtocol {
    pub prot_type: AdapterProtocolType,
    pub registered: bool,
    pub log: Vec<String>,
    pub detect: (DetectResult, AdapterSupportMode),
    pub mode: AdapterSupportMode,
    pub adapter_type: Option<AdapterType>,
    pub vendor_id: Option<i32>,
    pub output_voltage: Option<i32>,
    pub output_current: Option<i32>,
    pub max_current: Option<i32>,
    pub temp: Option<i32>,
    pub power_curve: Vec<PowerCurvePoint>,
    pub fail_set_voltage: bool,
    pub fail_set_current: bool,
    pub enable_failures: u32,
    pub auth_ok: bool,
    pub slave_status: Option<SlaveStatus>,
    pub master_ok: bool,
}

impl MockProtocol {
    pub fn new(prot_type: AdapterProtocolType) -> Self {
        Self {
            prot_type,
            registered: true,
            log: Vec::new(),
            detect: (DetectResult::Succ, AdapterSupportMode::HV),
            mode: AdapterSupportMode::UNDEFINED,
            adapter_type: Some(AdapterType::Unknown),
            vendor_id: Some(0x12),
            output_voltage: Some(9000),
            output_current: Some(2000),
            max_current: Some(3000),
            temp: Some(40),
            power_curve: Vec::new(),
            fail_set_voltage: false,
            fail_set_current: false,
            enable_failures: 0,
            auth_ok: true,
            slave_status: Some(SlaveStatus::Normal),
            master_ok: true,
        }
    }

    pub fn count(&self, op: &str) -> usize {
        self.log.iter().filter(|l| l.starts_with(op)).count()
    }
}

fn value<T>(v: Option<T>) -> ProtocolResult<T> {
    v.ok_or(ProtocolError::TransportFailure)
}

impl AdapterProtocol for MockProtocol {
    fn type_name(&self) -> &str {
        "mock"
    }

    fn protocol_type(&self) -> AdapterProtocolType {
        self.prot_type
    }

    fn set_default_param(&mut self) {
        self.log.push("set_default_param".into());
    }

    fn detect_adapter_support_mode(&mut self) -> (DetectResult, AdapterSupportMode) {
        self.log.push("detect".into());
        self.detect
    }

    fn support_mode(&self) -> AdapterSupportMode {
        self.mode
    }

    fn is_registered(&self) -> bool {
        self.registered
    }

    fn soft_reset_master(&mut self) -> ProtocolResult {
        self.log.push("reset_master".into());
        Ok(())
    }

    fn soft_reset_slave(&mut self) -> ProtocolResult {
        self.log.push("reset_slave".into());
        Ok(())
    }

    fn master_status(&mut self) -> ProtocolResult {
        if self.master_ok {
            Ok(())
        } else {
            Err(ProtocolError::TransportFailure)
        }
    }

    fn device_info(&mut self) -> ProtocolResult<AdapterDeviceInfo> {
        Ok(AdapterDeviceInfo { vendor_id: value(self.vendor_id)?, max_volt: 11000, volt_cap: 2, max_pwr: 40000 })
    }

    fn chip_vendor_id(&mut self) -> ProtocolResult<i32> {
        value(self.vendor_id)
    }

    fn chip_serial_num(&mut self) -> ProtocolResult<i32> {
        Ok(77)
    }

    fn adapter_type(&mut self) -> ProtocolResult<AdapterType> {
        value(self.adapter_type)
    }

    fn slave_status(&mut self) -> ProtocolResult<SlaveStatus> {
        value(self.slave_status)
    }

    fn set_init_data(&mut self, data: &AdapterInitData) -> ProtocolResult {
        self.log.push(format!("init_data:{}:{}:{}", data.vset_boundary, data.iset_boundary, data.init_voltage));
        Ok(())
    }

    fn set_output_enable(&mut self, enable: bool) -> ProtocolResult {
        self.log.push(format!("output_enable:{}", enable));
        if self.enable_failures > 0 {
            self.enable_failures -= 1;
            return Err(ProtocolError::TransportFailure);
        }
        Ok(())
    }

    fn set_output_voltage(&mut self, mv: i32) -> ProtocolResult {
        self.log.push(format!("set_voltage:{}", mv));
        if self.fail_set_voltage {
            return Err(ProtocolError::TransportFailure);
        }
        Ok(())
    }

    fn set_output_current(&mut self, ma: i32) -> ProtocolResult {
        self.log.push(format!("set_current:{}", ma));
        if self.fail_set_current {
            return Err(ProtocolError::TransportFailure);
        }
        Ok(())
    }

    fn output_voltage(&mut self) -> ProtocolResult<i32> {
        value(self.output_voltage)
    }

    fn output_current(&mut self) -> ProtocolResult<i32> {
        self.log.push("output_current".into());
        value(self.output_current)
    }

    fn max_current(&mut self) -> ProtocolResult<i32> {
        value(self.max_current)
    }

    fn inside_temp(&mut self) -> ProtocolResult<i32> {
        value(self.temp)
    }

    fn power_curve_num(&mut self) -> ProtocolResult<usize> {
        Ok(self.power_curve.len())
    }

    fn power_curve(&mut self, out: &mut [PowerCurvePoint]) -> ProtocolResult<usize> {
        let n = out.len().min(self.power_curve.len());
        out[..n].copy_from_slice(&self.power_curve[..n]);
        Ok(n)
    }

    fn auth_encrypt_start(&mut self, key_index: u32) -> ProtocolResult {
        self.log.push(format!("auth:{}", key_index));
        if self.auth_ok {
            Ok(())
        } else {
            Err(ProtocolError::TransportFailure)
        }
    }
}

/// FCP master chip backed by a register array.
pub struct MockFcpOps {
    pub chip_name: &'static str,
    pub regs: [u8; 256],
    pub fail_read: Vec<u8>,
    pub fail_write: Vec<u8>,
    /// registers whose reads return this value instead of the stored one
    pub read_override: BTreeMap<u8, u8>,
    pub writes: Vec<(u8, u8)>,
    pub reads: Vec<u8>,
    pub detect: FcpDetect,
    pub exits: Vec<&'static str>,
}

impl MockFcpOps {
    pub fn new(chip_name: &'static str) -> Self {
        Self {
            chip_name,
            regs: [0; 256],
            fail_read: Vec::new(),
            fail_write: Vec::new(),
            read_override: BTreeMap::new(),
            writes: Vec::new(),
            reads: Vec::new(),
            detect: FcpDetect::Succ,
            exits: Vec::new(),
        }
    }
}

impl FcpOps for MockFcpOps {
    fn chip_name(&self) -> &str {
        self.chip_name
    }

    fn reg_read(&mut self, reg: u8, buf: &mut [u8]) -> IcResult {
        self.reads.push(reg);
        if self.fail_read.contains(&reg) {
            return Err(IcError::Io);
        }
        for (i, b) in buf.iter_mut().enumerate() {
            let r = reg.wrapping_add(i as u8);
            *b = self.read_override.get(&r).copied().unwrap_or(self.regs[r as usize]);
        }
        Ok(())
    }

    fn reg_write(&mut self, reg: u8, buf: &[u8]) -> IcResult {
        if self.fail_write.contains(&reg) {
            return Err(IcError::Io);
        }
        for (i, b) in buf.iter().enumerate() {
            let r = reg.wrapping_add(i as u8);
            self.regs[r as usize] = *b;
            self.writes.push((r, *b));
        }
        Ok(())
    }

    fn detect_adapter(&mut self) -> FcpDetect {
        self.detect
    }

    fn soft_reset_master(&mut self) -> IcResult {
        Ok(())
    }

    fn soft_reset_slave(&mut self) -> IcResult {
        Ok(())
    }

    fn pre_exit(&mut self) -> IcResult {
        self.exits.push("pre_exit");
        Ok(())
    }

    fn post_exit(&mut self) -> IcResult {
        self.exits.push("post_exit");
        Ok(())
    }
}
