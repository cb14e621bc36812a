//! Cold-boot-to-NORMAL and cold-boot-to-CHARGE integration scenarios,
//! driving [`BmsService`] end to end with the mock ports.

use crate::mock_hw::{FakeContactor, FakeInterlock, FakeNvm, RecordingSink};

use bms_core::app::commands::AppCommand;
use bms_core::app::service::BmsService;
use bms_core::bms::BmsState;
use bms_core::config::SystemConfig;
use bms_core::telemetry::blocks::SupervisorExternalRequest;

fn make_service() -> (BmsService, FakeNvm) {
    let nvm = FakeNvm::default();
    let mut service = BmsService::new(SystemConfig::default(), &nvm);
    let mut sink = RecordingSink::default();
    service.start(&mut sink);
    (service, nvm)
}

/// Every 10 ms, poll the contactor/interlock and tick the BMS supervisor.
fn run_bms_ticks(
    service: &mut BmsService,
    contactor: &mut FakeContactor,
    interlock: &mut FakeInterlock,
    sink: &mut RecordingSink,
    from_ms: u32,
    count: u32,
) {
    for i in 0..count {
        service.trigger_10ms(from_ms + i * 10, contactor, interlock, sink);
        contactor.confirm_last_request();
    }
}

#[test]
fn cold_boot_reaches_idle_without_any_request() {
    let (mut service, _nvm) = make_service();
    let mut contactor = FakeContactor::default();
    let mut interlock = FakeInterlock::default();
    let mut sink = RecordingSink::default();

    assert_eq!(service.bms_state(), BmsState::Uninitialized);

    run_bms_ticks(&mut service, &mut contactor, &mut interlock, &mut sink, 0, 3);

    assert_eq!(service.bms_state(), BmsState::Idle);
}

#[test]
fn standby_then_normal_request_sequence_reaches_normal() {
    let (mut service, _nvm) = make_service();
    let mut contactor = FakeContactor::default();
    let mut interlock = FakeInterlock::default();
    let mut sink = RecordingSink::default();

    run_bms_ticks(&mut service, &mut contactor, &mut interlock, &mut sink, 0, 3);
    assert_eq!(service.bms_state(), BmsState::Idle);

    service.handle_command(AppCommand::SupervisorRequest(SupervisorExternalRequest::Standby));
    run_bms_ticks(&mut service, &mut contactor, &mut interlock, &mut sink, 30, 1);
    assert_eq!(service.bms_state(), BmsState::Standby);

    // NORMAL is only accepted from STANDBY.
    service.handle_command(AppCommand::SupervisorRequest(SupervisorExternalRequest::Normal));
    run_bms_ticks(&mut service, &mut contactor, &mut interlock, &mut sink, 40, 1);
    assert_eq!(service.bms_state(), BmsState::Precharge);

    // The precharge contactor confirms NORMAL; report main contactor feedback
    // closed so the plant-feedback check doesn't immediately fault the pack.
    let mut feedback = service.telemetry().read_contactor_feedback();
    feedback.main_plus_closed = true;
    feedback.main_minus_closed = true;
    service.telemetry().write_contactor_feedback(feedback);

    run_bms_ticks(&mut service, &mut contactor, &mut interlock, &mut sink, 50, 1);
    assert_eq!(service.bms_state(), BmsState::Normal);
}

#[test]
fn normal_request_from_idle_is_rejected() {
    let (mut service, _nvm) = make_service();
    let mut contactor = FakeContactor::default();
    let mut interlock = FakeInterlock::default();
    let mut sink = RecordingSink::default();

    run_bms_ticks(&mut service, &mut contactor, &mut interlock, &mut sink, 0, 3);
    assert_eq!(service.bms_state(), BmsState::Idle);

    service.handle_command(AppCommand::SupervisorRequest(SupervisorExternalRequest::Normal));
    run_bms_ticks(&mut service, &mut contactor, &mut interlock, &mut sink, 30, 1);

    assert_eq!(
        service.bms_state(),
        BmsState::Idle,
        "NORMAL is only valid from STANDBY; an invalid request must be dropped"
    );
}
