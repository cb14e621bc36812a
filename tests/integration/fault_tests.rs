//! Fault-latch and error-recovery integration scenarios.

use crate::mock_hw::{FakeContactor, FakeInterlock, FakeNvm, RecordingSink};

use bms_core::app::commands::AppCommand;
use bms_core::app::events::AppEvent;
use bms_core::app::service::BmsService;
use bms_core::bms::BmsState;
use bms_core::config::SystemConfig;
use bms_core::diagnosis::Channel;
use bms_core::telemetry::blocks::SupervisorExternalRequest;

fn make_service() -> (BmsService, FakeNvm) {
    let nvm = FakeNvm::default();
    let mut service = BmsService::new(SystemConfig::default(), &nvm);
    let mut sink = RecordingSink::default();
    service.start(&mut sink);
    (service, nvm)
}

fn boot_to_idle(
    service: &mut BmsService,
    contactor: &mut FakeContactor,
    interlock: &mut FakeInterlock,
    sink: &mut RecordingSink,
) {
    for i in 0..3 {
        service.trigger_10ms(i * 10, contactor, interlock, sink);
        contactor.confirm_last_request();
    }
    assert_eq!(service.bms_state(), BmsState::Idle);
}

/// An over-voltage cell reading must latch `OverVoltage` within
/// `sensitivity_voltage` consecutive cycles and force the supervisor to
/// `ERROR` on the next trigger, per the hard invariant that any latched
/// error flag drives the very next cycle's state to `ERROR`.
#[test]
fn overvoltage_latches_and_forces_error() {
    let (mut service, _nvm) = make_service();
    let mut contactor = FakeContactor::default();
    let mut interlock = FakeInterlock::default();
    let mut sink = RecordingSink::default();

    boot_to_idle(&mut service, &mut contactor, &mut interlock, &mut sink);

    let cfg = SystemConfig::default();
    let mut min_max = service.telemetry().read_min_max();
    min_max.voltage_max_mv = cfg.bc_voltmax_mv + 50;
    service.telemetry().write_min_max(min_max);

    for i in 0..cfg.sensitivity_voltage as u32 {
        service.trigger_10ms(30 + i * 10, &mut contactor, &mut interlock, &mut sink);
        contactor.confirm_last_request();
    }

    assert_eq!(
        service.bms_state(),
        BmsState::Error,
        "latched OverVoltage must force the supervisor into ERROR"
    );
    assert!(
        sink.faults_latched().any(|e| matches!(e, AppEvent::FaultLatched(Channel::OverVoltage))),
        "a FaultLatched(OverVoltage) event must have been emitted"
    );
}

/// `ERROR` can only be left once every error flag clears, STANDBY is
/// requested, and the interlock feedback reports closed.
#[test]
fn error_recovery_requires_clear_flags_standby_request_and_closed_interlock() {
    let (mut service, _nvm) = make_service();
    let mut contactor = FakeContactor::default();
    let mut interlock = FakeInterlock::default();
    let mut sink = RecordingSink::default();

    boot_to_idle(&mut service, &mut contactor, &mut interlock, &mut sink);

    service.handle_command(AppCommand::SupervisorRequest(SupervisorExternalRequest::Standby));
    service.trigger_10ms(30, &mut contactor, &mut interlock, &mut sink);
    contactor.confirm_last_request();
    assert_eq!(service.bms_state(), BmsState::Standby);

    let cfg = SystemConfig::default();
    let mut min_max = service.telemetry().read_min_max();
    min_max.voltage_max_mv = cfg.bc_voltmax_mv + 50;
    service.telemetry().write_min_max(min_max);

    for i in 0..cfg.sensitivity_voltage as u32 {
        service.trigger_10ms(40 + i * 10, &mut contactor, &mut interlock, &mut sink);
        contactor.confirm_last_request();
    }
    assert_eq!(service.bms_state(), BmsState::Error);

    // Clear the overvoltage condition and explicitly reset the channel —
    // the flag does not self-clear just because the measurement recovers.
    let mut min_max = service.telemetry().read_min_max();
    min_max.voltage_max_mv = cfg.bc_voltmax_mv - 100;
    service.telemetry().write_min_max(min_max);
    service.handle_command(AppCommand::DiagReset(Channel::OverVoltage));

    // Interlock still open: recovery must not happen yet.
    service.handle_command(AppCommand::SupervisorRequest(SupervisorExternalRequest::Standby));
    service.trigger_10ms(100, &mut contactor, &mut interlock, &mut sink);
    assert_eq!(
        service.bms_state(),
        BmsState::Error,
        "must stay in ERROR while the interlock feedback is open"
    );

    // Close the interlock out of band (as if a technician reset it) and retry.
    interlock.closed = true;
    service.handle_command(AppCommand::SupervisorRequest(SupervisorExternalRequest::Standby));
    service.trigger_10ms(110, &mut contactor, &mut interlock, &mut sink);
    assert_eq!(service.bms_state(), BmsState::Standby);
}
