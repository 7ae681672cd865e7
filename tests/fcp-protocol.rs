mod common;

use common::MockFcpOps;

use direct_charge::protocol::fcp::{
    FcpDetect, FcpDeviceId, HwFcp, ScpPeer, HWFCP_ADAPTER_STATUS, HWFCP_ADP_TYPE1, HWFCP_DISCRETE_CAPABILITIES0,
    HWFCP_ID_OUT0, HWFCP_MAX_PWR, HWFCP_OCP_MASK, HWFCP_OTP_MASK, HWFCP_OUTPUT_CONTROL, HWFCP_OVP_MASK,
    HWFCP_UVP_MASK, HWFCP_VOUT_CONFIG,
};
use direct_charge::protocol::{
    AdapterDeviceInfo, AdapterProtocol, AdapterProtocolType, AdapterSupportMode, DetectResult, ProtocolError,
    SlaveStatus,
};

#[derive(Default)]
struct ScpStub {
    reg80_error: bool,
    registered: bool,
}

impl ScpPeer for ScpStub {
    fn reg80_rw_error(&self) -> bool {
        self.reg80_error
    }

    fn is_registered(&self) -> bool {
        self.registered
    }
}

fn fcp(chip: &'static str) -> HwFcp<MockFcpOps> {
    let mut fcp = HwFcp::new(());
    fcp.register(MockFcpOps::new(chip)).unwrap();
    fcp
}

fn fcp_with_scp(scp: ScpStub) -> HwFcp<MockFcpOps, ScpStub> {
    let mut fcp = HwFcp::new(scp);
    fcp.register(MockFcpOps::new("scharger_v600")).unwrap();
    fcp
}

fn regs(fcp: &mut HwFcp<MockFcpOps>) -> &mut MockFcpOps {
    fcp.ops_mut().unwrap()
}

#[test]
fn unknown_chip_is_refused() {
    let mut fcp: HwFcp<MockFcpOps> = HwFcp::new(());
    assert_eq!(fcp.register(MockFcpOps::new("sc8545_aux")), Err(ProtocolError::NotRegistered));
    assert!(!fcp.is_registered());
    assert_eq!(fcp.detect_adapter_support_mode(), (DetectResult::Other, AdapterSupportMode::UNDEFINED));
    assert_eq!(fcp.vendor_id(), Err(ProtocolError::NotRegistered));

    let fcp = self::fcp("fsa");
    assert_eq!(fcp.dev_id(), Some(FcpDeviceId::Fsa9685));
    assert_eq!(fcp.protocol_type(), AdapterProtocolType::Fcp);
    assert_eq!(fcp.type_name(), "hw_fcp");
}

#[test]
fn detect_without_scp() {
    let mut fcp = fcp("scharger_v600");
    assert_eq!(fcp.detect_adapter_support_mode(), (DetectResult::Succ, AdapterSupportMode::HV));
    assert_eq!(fcp.support_mode(), AdapterSupportMode::HV);
    // 0x80 is only probed when SCP exists
    assert!(!regs(&mut fcp).reads.contains(&HWFCP_ADP_TYPE1));

    regs(&mut fcp).detect = FcpDetect::Fail;
    assert_eq!(fcp.detect_adapter_support_mode(), (DetectResult::Fail, AdapterSupportMode::UNDEFINED));
    assert_eq!(fcp.support_mode(), AdapterSupportMode::UNDEFINED);

    regs(&mut fcp).detect = FcpDetect::Other;
    assert_eq!(fcp.detect_adapter_support_mode().0, DetectResult::Other);
}

#[test]
fn scp_capable_adapter_is_left_to_scp() {
    let mut fcp = fcp_with_scp(ScpStub { registered: true, ..Default::default() });
    assert_eq!(fcp.detect_adapter_support_mode(), (DetectResult::Other, AdapterSupportMode::UNDEFINED));
}

#[test]
fn failed_0x80_read_means_fcp_only_and_does_not_latch() {
    let mut fcp = fcp_with_scp(ScpStub { registered: true, ..Default::default() });
    let ops = fcp.ops_mut().unwrap();
    ops.fail_read.push(HWFCP_ADP_TYPE1);
    ops.regs[HWFCP_ID_OUT0 as usize] = 0x12;

    assert_eq!(fcp.detect_adapter_support_mode(), (DetectResult::Succ, AdapterSupportMode::HV));
    assert!(!fcp.session().rw_error_flag);
    assert_eq!(fcp.vendor_id(), Ok(0x12));
}

#[test]
fn scp_reg80_error_short_circuits_handshake() {
    let mut fcp = fcp_with_scp(ScpStub { reg80_error: true, registered: true });
    fcp.ops_mut().unwrap().detect = FcpDetect::Fail;
    assert_eq!(fcp.detect_adapter_support_mode(), (DetectResult::Succ, AdapterSupportMode::HV));
}

#[test]
fn cache_lives_until_redetect() {
    let mut fcp = fcp("scharger_v600");
    regs(&mut fcp).regs[HWFCP_ID_OUT0 as usize] = 0x12;
    assert_eq!(fcp.vendor_id(), Ok(0x12));

    regs(&mut fcp).regs[HWFCP_ID_OUT0 as usize] = 0x34;
    assert_eq!(fcp.vendor_id(), Ok(0x12));
    let reads = regs(&mut fcp).reads.iter().filter(|&&r| r == HWFCP_ID_OUT0).count();
    assert_eq!(reads, 1);

    fcp.detect_adapter_support_mode();
    assert_eq!(fcp.session().vid, None);
    assert_eq!(fcp.vendor_id(), Ok(0x34));
}

#[test]
fn transfer_failure_latches_until_redetect() {
    let mut fcp = fcp("scharger_v600");
    regs(&mut fcp).fail_read.push(HWFCP_DISCRETE_CAPABILITIES0);

    assert_eq!(fcp.voltage_capabilities(), Err(ProtocolError::TransportFailure));
    assert!(fcp.session().rw_error_flag);
    assert_eq!(fcp.vendor_id(), Err(ProtocolError::Latched));
    assert_eq!(fcp.vendor_id(), Err(ProtocolError::Latched));
    assert_eq!(fcp.reg_write(HWFCP_VOUT_CONFIG, &[50]), Err(ProtocolError::Latched));
    assert!(regs(&mut fcp).writes.is_empty());

    fcp.set_default_param();
    assert_eq!(fcp.vendor_id(), Ok(0));
}

#[test]
fn bad_transfer_length_is_rejected_without_latching() {
    let mut fcp = fcp("scharger_v600");
    let mut buf = [0u8; 3];
    assert_eq!(fcp.reg_read(HWFCP_ID_OUT0, &mut buf), Err(ProtocolError::InvalidTransferLength));
    assert_eq!(fcp.reg_write(HWFCP_VOUT_CONFIG, &[]), Err(ProtocolError::InvalidTransferLength));
    assert!(!fcp.session().rw_error_flag);
    assert!(regs(&mut fcp).reads.is_empty());

    let mut buf = [0u8; 2];
    assert_eq!(fcp.reg_read(HWFCP_ID_OUT0, &mut buf), Ok(()));
}

#[test]
fn output_voltage_written_then_enabled() {
    let mut fcp = fcp("scharger_v600");
    assert_eq!(fcp.set_output_voltage(9000), Ok(()));
    assert_eq!(regs(&mut fcp).writes, vec![(HWFCP_VOUT_CONFIG, 90), (HWFCP_OUTPUT_CONTROL, 1)]);
}

#[test]
fn output_voltage_readback_mismatch() {
    let mut fcp = fcp("scharger_v600");
    regs(&mut fcp).read_override.insert(HWFCP_VOUT_CONFIG, 50);

    assert_eq!(fcp.set_output_voltage(9000), Err(ProtocolError::VerifyMismatch));
    assert_eq!(regs(&mut fcp).writes, vec![(HWFCP_VOUT_CONFIG, 90)]);
    assert!(!fcp.session().rw_error_flag);
}

#[test]
fn output_voltage_unverified_chip() {
    let mut fcp = fcp("rt9466");
    regs(&mut fcp).read_override.insert(HWFCP_VOUT_CONFIG, 50);

    assert_eq!(fcp.set_output_voltage(9000), Ok(()));
    assert!(regs(&mut fcp).writes.contains(&(HWFCP_OUTPUT_CONTROL, 1)));
}

#[test]
fn device_info_and_rated_current() {
    let mut fcp = fcp("scharger_v600");
    let ops = regs(&mut fcp);
    ops.regs[HWFCP_ID_OUT0 as usize] = 0x34;
    ops.regs[HWFCP_DISCRETE_CAPABILITIES0 as usize] = 2;
    ops.regs[0x32] = 120;
    ops.regs[HWFCP_MAX_PWR as usize] = 36;

    assert_eq!(
        fcp.device_info(),
        Ok(AdapterDeviceInfo { vendor_id: 0x34, max_volt: 12000, volt_cap: 2, max_pwr: 18000 })
    );
    assert_eq!(fcp.max_voltage(), Ok(12000));
    assert_eq!(fcp.output_current(), Ok(1000));
    assert_eq!(fcp.chip_vendor_id(), Ok(0x34));
}

#[test]
fn invalid_capability_and_zero_voltage() {
    let mut fcp = fcp("scharger_v600");
    regs(&mut fcp).regs[HWFCP_DISCRETE_CAPABILITIES0 as usize] = 3;
    assert_eq!(fcp.voltage_capabilities(), Err(ProtocolError::InvalidValue));
    assert_eq!(fcp.session().volt_cap, None);

    regs(&mut fcp).regs[HWFCP_DISCRETE_CAPABILITIES0 as usize] = 0;
    regs(&mut fcp).regs[HWFCP_MAX_PWR as usize] = 36;
    assert_eq!(fcp.output_current(), Err(ProtocolError::InvalidValue));
}

#[test]
fn slave_status_priority() {
    let mut fcp = fcp("scharger_v600");
    let status = HWFCP_ADAPTER_STATUS as usize;

    regs(&mut fcp).regs[status] = HWFCP_OVP_MASK | HWFCP_OTP_MASK;
    assert_eq!(fcp.slave_status(), Ok(SlaveStatus::Ovp));
    regs(&mut fcp).regs[status] = HWFCP_UVP_MASK | HWFCP_OCP_MASK;
    assert_eq!(fcp.slave_status(), Ok(SlaveStatus::Uvp));
    regs(&mut fcp).regs[status] = HWFCP_OTP_MASK;
    assert_eq!(fcp.slave_status(), Ok(SlaveStatus::Otp));
    regs(&mut fcp).regs[status] = 0;
    assert_eq!(fcp.slave_status(), Ok(SlaveStatus::Normal));
}

#[test]
fn default_state_runs_exit_hooks() {
    let mut fcp = fcp("scharger_v600");
    assert_eq!(fcp.set_default_state(), Ok(()));
    assert_eq!(regs(&mut fcp).exits, vec!["pre_exit", "post_exit"]);
    assert_eq!(fcp.soft_reset_master(), Ok(()));
    assert!(!fcp.is_accp_charger_type());
}
