//! Application service — the hexagonal core.
//!
//! [`BmsService`] owns every domain component (BAL, the BMS supervisor,
//! SOX, the diagnosis plane's liveness sweep) and the shared
//! [`TelemetryStore`] they all read and write through. It exposes three
//! trigger entry points, one per cadence named in §4:
//! `trigger_1ms`/`trigger_10ms`/`trigger_100ms`. All I/O flows through
//! port traits injected at call sites, making the entire service
//! testable with mock adapters.
//!
//! ```text
//!  ContactorPort ◀──┐                      ┌──▶ EventSink
//!  InterlockPort ◀──┤     BmsService        │
//!      NvmPort  ────┤  BAL · BMS · SOX      ├──▶ TelemetryStore
//!                   └──────────────────────┘
//! ```
//!
//! `MeasurementPort`/`CurrentSensorPort`/`CanRequestPort` are not called
//! here — per their doc comments in [`super::ports`], those collaborators
//! write telemetry at their own cadence and the core only ever reads
//! what they published.

use log::info;

use crate::bal::{BalContext, BalEngine, BalRequest, BalState};
use crate::bms::{
    BmsContext, BmsEngine, BmsRequest, BmsState, ContactorRequest as BmsContactorRequest,
    ContactorState as BmsContactorState, InterlockCommand,
};
use crate::config::{SystemConfig, MAX_CELLS};
use crate::diagnosis::{Outcome, SysMon, SysmonModule};
use crate::sox::SoxEngine;
use crate::telemetry::blocks::{BalExternalRequest, ErrorFlags, SupervisorExternalRequest};
use crate::telemetry::TelemetryStore;

use super::commands::AppCommand;
use super::events::AppEvent;
use super::ports::{
    ContactorDriverState, ContactorPort, ContactorStateRequest, EventSink, InterlockPort,
    InterlockStateRequest, NvmPort,
};

/// The application service orchestrates all domain logic.
pub struct BmsService {
    telemetry: TelemetryStore,
    bal_engine: BalEngine,
    bal_ctx: BalContext,
    bms_engine: BmsEngine,
    bms_ctx: BmsContext,
    sox_engine: SoxEngine,
    sysmon: SysMon,
}

impl BmsService {
    /// Construct the service from configuration. Does **not** start the
    /// state machines — call [`start`](Self::start) next.
    pub fn new(config: SystemConfig, nvm: &impl NvmPort) -> Self {
        let sysmon = SysMon::new([
            config.bal_tick_ms * 2,
            config.bms_tick_ms * 2,
            config.sox_tick_ms * 2,
        ]);
        let sox_engine = SoxEngine::new(&config, nvm);
        let bal_ctx = BalContext::new(config.clone());
        let bms_ctx = BmsContext::new(config);

        Self {
            telemetry: TelemetryStore::new(),
            bal_engine: BalEngine::new(),
            bal_ctx,
            bms_engine: BmsEngine::new(),
            bms_ctx,
            sox_engine,
            sysmon,
        }
    }

    /// Start both state machines in `UNINITIALIZED`.
    pub fn start(&mut self, sink: &mut impl EventSink) {
        self.bal_engine.start(&mut self.bal_ctx);
        self.bms_engine.start(&mut self.bms_ctx);
        info!("BmsService started: BAL={:?} BMS={:?}", self.bal_engine.current_state(), self.bms_engine.current_state());
        let _ = sink;
    }

    pub fn telemetry(&self) -> &TelemetryStore {
        &self.telemetry
    }

    pub fn bal_state(&self) -> BalState {
        self.bal_engine.current_state()
    }

    pub fn bms_state(&self) -> BmsState {
        self.bms_engine.current_state()
    }

    // ── Command handling ──────────────────────────────────────

    /// Process an external command (from the CAN decoder, a test
    /// harness, or a diagnostic tool), per §6/§7.
    pub fn handle_command(&mut self, cmd: AppCommand) {
        match cmd {
            AppCommand::SupervisorRequest(req) => {
                if let Some(request) = supervisor_request_to_bms(req) {
                    self.bms_engine.post_request(request);
                }
            }
            AppCommand::BalancingRequest(req) => {
                if let Some(request) = bal_external_to_request(req) {
                    self.bal_engine.post_request(request);
                }
            }
            AppCommand::DiagReset(channel) => {
                self.bms_ctx.diagnosis.notify(channel, Outcome::Reset, &mut self.bms_ctx.error_flags);
                self.bms_ctx.error_flags.recompute_general_error();
            }
        }
    }

    // ── Per-cadence triggers ──────────────────────────────────

    /// Run one 1 ms cycle: forward any pending CAN balancing request,
    /// tick BAL, then sweep sysmon liveness (§4.2's lowest-latency task).
    pub fn trigger_1ms(&mut self, now_ms: u32, sink: &mut impl EventSink) {
        self.drain_can_balancing_request();

        self.bal_ctx.cells.num_cells = MAX_CELLS;
        self.bal_ctx.cells.voltage_mv = self.telemetry.read_cell_voltage().voltage_mv;
        self.bal_ctx.cells.min_voltage_mv = self.telemetry.read_min_max().voltage_min_mv;
        self.bal_ctx.current_ma = self.telemetry.read_current().current_ma;

        let prev_bal = self.bal_engine.current_state();
        self.bal_engine.trigger(&mut self.bal_ctx);
        let next_bal = self.bal_engine.current_state();
        if next_bal != prev_bal {
            sink.emit(&AppEvent::BalStateChanged { from: prev_bal, to: next_bal });
        }

        self.publish_balancing_control();

        self.sysmon.notify(SysmonModule::Bal1ms, now_ms);
        if self.sysmon.sweep(now_ms) {
            self.bms_ctx.error_flags.sysmon_timeout = true;
            self.bms_ctx.error_flags.recompute_general_error();
        }
    }

    /// Run one 10 ms cycle: poll the contactor driver, forward the
    /// external supervisor request, tick BMS, then apply whatever
    /// contactor/interlock/balancing outputs it produced.
    pub fn trigger_10ms(
        &mut self,
        now_ms: u32,
        contactor: &mut impl ContactorPort,
        interlock: &mut impl InterlockPort,
        sink: &mut impl EventSink,
    ) {
        self.drain_can_supervisor_request();
        self.bms_ctx.contactor_state = driver_state_to_bms(contactor.get_state());

        let min_max = self.telemetry.read_min_max();
        let current = self.telemetry.read_current();
        let contactor_feedback = self.telemetry.read_contactor_feedback();
        let mut interlock_feedback = self.telemetry.read_interlock_feedback();
        interlock_feedback.closed = interlock.get_interlock_feedback();
        self.telemetry.write_interlock_feedback(interlock_feedback);

        let prev_flags = self.bms_ctx.error_flags;
        let prev_bms = self.bms_engine.current_state();
        self.bms_engine.trigger(&mut self.bms_ctx, &min_max, &current, &contactor_feedback, &interlock_feedback);
        let next_bms = self.bms_engine.current_state();

        emit_fault_diffs(prev_flags, self.bms_ctx.error_flags, sink);
        if next_bms != prev_bms {
            sink.emit(&AppEvent::BmsStateChanged { from: prev_bms, to: next_bms });
        }

        if let Some(request) = self.bms_ctx.contactor_request.take() {
            contactor.set_state_request(bms_request_to_driver(request));
        }
        if let Some(command) = self.bms_ctx.interlock_request.take() {
            interlock.set_state_request(interlock_command_to_driver(command));
        }
        if let Some(forward) = self.bms_ctx.bal_forward.take() {
            if let Some(request) = bal_external_to_request(forward) {
                self.bal_engine.post_request(request);
            }
        }
        if self.bms_ctx.bal_force_stop_override {
            self.bal_engine.post_request(BalRequest::StopOverrideInactive);
            self.bms_ctx.bal_force_stop_override = false;
        }

        self.publish_system_state();
        self.sysmon.notify(SysmonModule::Bms10ms, now_ms);
    }

    /// Run one 100 ms cycle: refresh SOC/SOF via [`SoxEngine`].
    pub fn trigger_100ms(&mut self, now_ms: u32, nvm: &mut impl NvmPort) {
        self.sox_engine.trigger_100ms(&self.telemetry, &self.bms_ctx.config, nvm);
        self.sysmon.notify(SysmonModule::Sox100ms, now_ms);
    }

    // ── Internal ──────────────────────────────────────────────

    fn drain_can_balancing_request(&mut self) {
        let mut block = self.telemetry.read_balancing_control();
        if block.external_request != BalExternalRequest::NoRequest {
            if let Some(request) = bal_external_to_request(block.external_request) {
                self.bal_engine.post_request(request);
            }
            block.external_request = BalExternalRequest::NoRequest;
            self.telemetry.write_balancing_control(block);
        }
    }

    fn drain_can_supervisor_request(&mut self) {
        let mut block = self.telemetry.read_state_request();
        if block.request != SupervisorExternalRequest::NoRequest {
            if let Some(request) = supervisor_request_to_bms(block.request) {
                self.bms_engine.post_request(request);
            }
            block.request = SupervisorExternalRequest::NoRequest;
            self.telemetry.write_state_request(block);
        }
    }

    fn publish_balancing_control(&self) {
        let mut block = self.telemetry.read_balancing_control();
        block.enable = self.bal_ctx.enable.clone();
        block.balancing_active = self.bal_ctx.balancing_active;
        block.threshold_mv = self.bal_ctx.threshold_mv;
        self.telemetry.write_balancing_control(block);
    }

    fn publish_system_state(&self) {
        let mut block = self.telemetry.read_system_state();
        block.bms_state = self.bms_engine.current_state() as u8;
        block.bms_substate = self.bms_ctx.substate as u8;
        block.bal_state = self.bal_engine.current_state() as u8;
        block.bal_substate = self.bal_ctx.substate as u8;
        block.errors = self.bms_ctx.error_flags;
        self.telemetry.write_system_state(block);
    }
}

fn bal_external_to_request(req: BalExternalRequest) -> Option<BalRequest> {
    match req {
        BalExternalRequest::NoRequest => None,
        BalExternalRequest::InactiveOverride => Some(BalRequest::InactiveOverride),
        BalExternalRequest::ActiveOverride => Some(BalRequest::ActiveOverride),
        BalExternalRequest::OutOfOverride => Some(BalRequest::OutOfOverride),
    }
}

fn supervisor_request_to_bms(req: SupervisorExternalRequest) -> Option<BmsRequest> {
    match req {
        SupervisorExternalRequest::NoRequest => None,
        SupervisorExternalRequest::Standby => Some(BmsRequest::Standby),
        SupervisorExternalRequest::Normal => Some(BmsRequest::Normal),
        SupervisorExternalRequest::Charge => Some(BmsRequest::Charge),
    }
}

fn driver_state_to_bms(state: ContactorDriverState) -> BmsContactorState {
    match state {
        ContactorDriverState::Undefined => BmsContactorState::Undefined,
        ContactorDriverState::Standby => BmsContactorState::Standby,
        ContactorDriverState::Precharge => BmsContactorState::Precharge,
        ContactorDriverState::Normal => BmsContactorState::Normal,
        ContactorDriverState::Charge => BmsContactorState::Charge,
        ContactorDriverState::Error => BmsContactorState::Error,
    }
}

fn bms_request_to_driver(req: BmsContactorRequest) -> ContactorStateRequest {
    match req {
        BmsContactorRequest::Init => ContactorStateRequest::Init,
        BmsContactorRequest::Standby => ContactorStateRequest::Standby,
        BmsContactorRequest::Normal => ContactorStateRequest::Normal,
        BmsContactorRequest::Charge => ContactorStateRequest::Charge,
        BmsContactorRequest::Error => ContactorStateRequest::Error,
        BmsContactorRequest::NoRequest => ContactorStateRequest::NoRequest,
    }
}

fn interlock_command_to_driver(cmd: InterlockCommand) -> InterlockStateRequest {
    match cmd {
        InterlockCommand::Open => InterlockStateRequest::Open,
        InterlockCommand::Close => InterlockStateRequest::Close,
    }
}

/// Compare two `ErrorFlags` snapshots and emit a `FaultLatched`/
/// `FaultCleared` event for every channel-backed flag that flipped.
fn emit_fault_diffs(prev: ErrorFlags, next: ErrorFlags, sink: &mut impl EventSink) {
    use crate::diagnosis::Channel;

    macro_rules! diff {
        ($field:ident, $channel:expr) => {
            if prev.$field != next.$field {
                if next.$field {
                    sink.emit(&AppEvent::FaultLatched($channel));
                } else {
                    sink.emit(&AppEvent::FaultCleared($channel));
                }
            }
        };
    }

    diff!(over_voltage, Channel::OverVoltage);
    diff!(under_voltage, Channel::UnderVoltage);
    diff!(over_temperature_charge, Channel::OverTemperatureCharge);
    diff!(over_temperature_discharge, Channel::OverTemperatureDischarge);
    diff!(under_temperature_charge, Channel::UnderTemperatureCharge);
    diff!(under_temperature_discharge, Channel::UnderTemperatureDischarge);
    diff!(over_current_charge, Channel::OverCurrentCharge);
    diff!(over_current_discharge, Channel::OverCurrentDischarge);
    diff!(contactor_main_plus_feedback, Channel::ContactorMainPlusFeedback);
    diff!(contactor_main_minus_feedback, Channel::ContactorMainMinusFeedback);
    diff!(contactor_precharge_feedback, Channel::ContactorPrechargeFeedback);
    diff!(contactor_charge_main_plus_feedback, Channel::ContactorChargeMainPlusFeedback);
    diff!(contactor_charge_main_minus_feedback, Channel::ContactorChargeMainMinusFeedback);
    diff!(contactor_charge_precharge_feedback, Channel::ContactorChargePrechargeFeedback);
    diff!(interlock_feedback, Channel::InterlockFeedback);
    diff!(current_sensor_not_responding, Channel::CurrentSensorResponding);
    diff!(pec_failure, Channel::Pec);
}
