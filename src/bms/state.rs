//! BMS Supervisor state machine. See §4.5.
//!
//! `UNINITIALIZED → INITIALIZATION → INITIALIZED → IDLE → STANDBY →
//! (PRECHARGE → NORMAL) | (CHARGE_PRECHARGE → CHARGE)`, plus `ERROR`.
//! Triggered every 10 ms. Per spec.md §9's last Design Note, the SOA
//! checks (voltage/temperature/current) run on *every* trigger
//! invocation regardless of whether the state machine itself is
//! pacing progression — preserved here by running them unconditionally
//! in [`BmsEngine::trigger`], outside the state table's `on_update`.

use log::info;

use crate::diagnosis::{Channel, Outcome};
use crate::engine::{StateDescriptor, StateId as EngineStateId, StateMachine};
use crate::mailbox::Mailbox;
use crate::telemetry::blocks::{
    ContactorFeedbackBlock, CurrentBlock, InterlockFeedbackBlock, MinMaxBlock,
    SupervisorExternalRequest,
};

use super::context::{BmsContext, BmsSubstate, ContactorState, ContactorRequest, InterlockCommand};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BmsState {
    Uninitialized = 0,
    Initialization = 1,
    Initialized = 2,
    Idle = 3,
    Standby = 4,
    Precharge = 5,
    Normal = 6,
    ChargePrecharge = 7,
    Charge = 8,
    Error = 9,
}

impl BmsState {
    pub const COUNT: usize = 10;
}

impl EngineStateId for BmsState {
    fn index(self) -> usize {
        self as usize
    }
}

/// External requests accepted by the supervisor, per §6's command
/// surface plus the always-accepted error preemption of §5.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BmsRequest {
    Standby,
    Normal,
    Charge,
    ErrorRequest,
}

/// Whether `req` is a legal request from `current`. Only `ErrorRequest`
/// is always accepted (§4.4's rule, applied identically to BMS by §5).
fn is_valid_request(current: BmsState, req: BmsRequest) -> bool {
    match req {
        BmsRequest::ErrorRequest => true,
        BmsRequest::Standby => matches!(
            current,
            BmsState::Idle
                | BmsState::Precharge
                | BmsState::Normal
                | BmsState::ChargePrecharge
                | BmsState::Charge
                | BmsState::Error
        ),
        BmsRequest::Normal => matches!(current, BmsState::Standby),
        BmsRequest::Charge => matches!(current, BmsState::Standby),
    }
}

fn table() -> [StateDescriptor<BmsState, BmsContext>; BmsState::COUNT] {
    [
        StateDescriptor {
            id: BmsState::Uninitialized,
            name: "UNINITIALIZED",
            on_enter: None,
            on_exit: None,
            on_update: |_ctx| Some(BmsState::Initialization),
        },
        StateDescriptor {
            id: BmsState::Initialization,
            name: "INITIALIZATION",
            on_enter: Some(|ctx| ctx.contactor_request = Some(ContactorRequest::Init)),
            on_exit: None,
            on_update: |_ctx| Some(BmsState::Initialized),
        },
        StateDescriptor {
            id: BmsState::Initialized,
            name: "INITIALIZED",
            on_enter: None,
            on_exit: None,
            on_update: |_ctx| Some(BmsState::Idle),
        },
        StateDescriptor {
            id: BmsState::Idle,
            name: "IDLE",
            on_enter: None,
            on_exit: None,
            on_update: idle_update,
        },
        StateDescriptor {
            id: BmsState::Standby,
            name: "STANDBY",
            on_enter: Some(standby_enter),
            on_exit: None,
            on_update: standby_update,
        },
        StateDescriptor {
            id: BmsState::Precharge,
            name: "PRECHARGE",
            on_enter: Some(|ctx| ctx.contactor_request = Some(ContactorRequest::Normal)),
            on_exit: None,
            on_update: precharge_update,
        },
        StateDescriptor {
            id: BmsState::Normal,
            name: "NORMAL",
            on_enter: None,
            on_exit: None,
            on_update: normal_update,
        },
        StateDescriptor {
            id: BmsState::ChargePrecharge,
            name: "CHARGE_PRECHARGE",
            on_enter: Some(|ctx| ctx.contactor_request = Some(ContactorRequest::Charge)),
            on_exit: None,
            on_update: charge_precharge_update,
        },
        StateDescriptor {
            id: BmsState::Charge,
            name: "CHARGE",
            on_enter: None,
            on_exit: None,
            on_update: charge_update,
        },
        StateDescriptor {
            id: BmsState::Error,
            name: "ERROR",
            on_enter: Some(error_enter),
            on_exit: None,
            on_update: error_update,
        },
    ]
}

fn standby_enter(ctx: &mut BmsContext) {
    ctx.contactor_request = Some(ContactorRequest::Standby);
    ctx.interlock_request = Some(InterlockCommand::Close);
}

fn error_enter(ctx: &mut BmsContext) {
    ctx.contactor_request = Some(ContactorRequest::Error);
    ctx.interlock_request = Some(InterlockCommand::Open);
    ctx.bal_force_stop_override = true;
}

/// `CHECK_ERROR_FLAGS`: shared by every running state. Returns `true`
/// if the supervisor must transition to `ERROR` this cycle.
fn check_error_flags(ctx: &mut BmsContext) -> bool {
    ctx.substate = BmsSubstate::CheckErrorFlags;
    ctx.error_flags.recompute_general_error();
    ctx.any_error_flag_set()
}

/// `CHECK_BALANCING_REQUESTS`: forward whatever external balancing mode
/// arrived this tick to BAL.
fn forward_balancing(ctx: &mut BmsContext) {
    ctx.substate = BmsSubstate::CheckBalancingRequests;
    ctx.bal_forward = ctx.incoming_bal_request.take();
}

fn idle_update(ctx: &mut BmsContext) -> Option<BmsState> {
    if check_error_flags(ctx) {
        return Some(BmsState::Error);
    }
    ctx.substate = BmsSubstate::CheckStateRequests;
    match ctx.external_request.take() {
        Some(SupervisorExternalRequest::Standby | SupervisorExternalRequest::Normal | SupervisorExternalRequest::Charge) => {
            Some(BmsState::Standby)
        }
        _ => None,
    }
}

fn standby_update(ctx: &mut BmsContext) -> Option<BmsState> {
    if check_error_flags(ctx) {
        return Some(BmsState::Error);
    }
    forward_balancing(ctx);

    ctx.substate = BmsSubstate::CheckStateRequests;
    match ctx.external_request.take() {
        Some(SupervisorExternalRequest::Normal) => Some(BmsState::Precharge),
        Some(SupervisorExternalRequest::Charge) if ctx.config.separate_powerlines => {
            Some(BmsState::ChargePrecharge)
        }
        _ => None,
    }
}

fn precharge_update(ctx: &mut BmsContext) -> Option<BmsState> {
    if check_error_flags(ctx) {
        return Some(BmsState::Error);
    }
    forward_balancing(ctx);

    ctx.substate = BmsSubstate::CheckStateRequests;
    if matches!(ctx.external_request.take(), Some(SupervisorExternalRequest::Standby)) {
        return Some(BmsState::Standby);
    }

    ctx.substate = BmsSubstate::CheckContactor;
    match ctx.contactor_state {
        ContactorState::Normal => Some(BmsState::Normal),
        ContactorState::Error => Some(BmsState::Error),
        _ => None,
    }
}

fn normal_update(ctx: &mut BmsContext) -> Option<BmsState> {
    if check_error_flags(ctx) {
        return Some(BmsState::Error);
    }
    forward_balancing(ctx);

    ctx.substate = BmsSubstate::CheckStateRequests;
    if matches!(ctx.external_request.take(), Some(SupervisorExternalRequest::Standby)) {
        return Some(BmsState::Standby);
    }
    None
}

fn charge_precharge_update(ctx: &mut BmsContext) -> Option<BmsState> {
    if check_error_flags(ctx) {
        return Some(BmsState::Error);
    }
    forward_balancing(ctx);

    ctx.substate = BmsSubstate::CheckStateRequests;
    if matches!(ctx.external_request.take(), Some(SupervisorExternalRequest::Standby)) {
        return Some(BmsState::Standby);
    }

    ctx.substate = BmsSubstate::CheckContactor;
    match ctx.contactor_state {
        ContactorState::Charge => Some(BmsState::Charge),
        ContactorState::Error => Some(BmsState::Error),
        _ => None,
    }
}

fn charge_update(ctx: &mut BmsContext) -> Option<BmsState> {
    if check_error_flags(ctx) {
        return Some(BmsState::Error);
    }
    forward_balancing(ctx);

    ctx.substate = BmsSubstate::CheckStateRequests;
    if matches!(ctx.external_request.take(), Some(SupervisorExternalRequest::Standby)) {
        return Some(BmsState::Standby);
    }
    None
}

/// The only path out of `ERROR` (§7): every latched flag cleared, an
/// external `STANDBY` request, and interlock feedback reading closed.
fn error_update(ctx: &mut BmsContext) -> Option<BmsState> {
    ctx.error_flags.recompute_general_error();
    ctx.substate = BmsSubstate::CheckStateRequests;
    let standby_requested = matches!(ctx.external_request.take(), Some(SupervisorExternalRequest::Standby));
    if !ctx.any_error_flag_set() && standby_requested && ctx.interlock_feedback.closed {
        info!("BMS: all error flags clear, STANDBY requested, interlock closed — leaving ERROR");
        return Some(BmsState::Standby);
    }
    None
}

/// Evaluate the SOA checks (voltage/temperature/current) against
/// `MinMax`/`Current` telemetry, reporting each outcome to the
/// diagnosis plane. Runs on every trigger regardless of cooldown
/// pacing, per §9's last Design Note.
fn run_soa_checks(ctx: &mut BmsContext, min_max: &MinMaxBlock, current: &CurrentBlock) {
    let over_voltage = min_max.voltage_max_mv > ctx.config.bc_voltmax_mv;
    ctx.diagnosis.notify(
        Channel::OverVoltage,
        if over_voltage { Outcome::Nok } else { Outcome::Ok },
        &mut ctx.error_flags,
    );
    let under_voltage = min_max.voltage_min_mv < ctx.config.bc_voltmin_mv;
    ctx.diagnosis.notify(
        Channel::UnderVoltage,
        if under_voltage { Outcome::Nok } else { Outcome::Ok },
        &mut ctx.error_flags,
    );

    // Positive current == discharge (per CurrentBlock's documented sign
    // convention); the four BC_TEMP* limits are selected by direction.
    let discharging = current.current_ma >= 0;
    let temp_max_c = min_max.temperature_max_decic as f32 / 10.0;
    let temp_min_c = min_max.temperature_min_decic as f32 / 10.0;

    if discharging {
        let over = temp_max_c > ctx.config.bc_tempmax_discharge_c as f32;
        ctx.diagnosis.notify(
            Channel::OverTemperatureDischarge,
            if over { Outcome::Nok } else { Outcome::Ok },
            &mut ctx.error_flags,
        );
        let under = temp_min_c < ctx.config.bc_tempmin_discharge_c as f32;
        ctx.diagnosis.notify(
            Channel::UnderTemperatureDischarge,
            if under { Outcome::Nok } else { Outcome::Ok },
            &mut ctx.error_flags,
        );
        ctx.diagnosis.notify(Channel::OverTemperatureCharge, Outcome::Ok, &mut ctx.error_flags);
        ctx.diagnosis.notify(Channel::UnderTemperatureCharge, Outcome::Ok, &mut ctx.error_flags);

        let over_current = current.current_ma > ctx.config.bc_currentmax_discharge_ma;
        ctx.diagnosis.notify(
            Channel::OverCurrentDischarge,
            if over_current { Outcome::Nok } else { Outcome::Ok },
            &mut ctx.error_flags,
        );
        ctx.diagnosis.notify(Channel::OverCurrentCharge, Outcome::Ok, &mut ctx.error_flags);
    } else {
        let over = temp_max_c > ctx.config.bc_tempmax_charge_c as f32;
        ctx.diagnosis.notify(
            Channel::OverTemperatureCharge,
            if over { Outcome::Nok } else { Outcome::Ok },
            &mut ctx.error_flags,
        );
        let under = temp_min_c < ctx.config.bc_tempmin_charge_c as f32;
        ctx.diagnosis.notify(
            Channel::UnderTemperatureCharge,
            if under { Outcome::Nok } else { Outcome::Ok },
            &mut ctx.error_flags,
        );
        ctx.diagnosis.notify(Channel::OverTemperatureDischarge, Outcome::Ok, &mut ctx.error_flags);
        ctx.diagnosis.notify(Channel::UnderTemperatureDischarge, Outcome::Ok, &mut ctx.error_flags);

        let over_current = current.current_ma.abs() > ctx.config.bc_currentmax_charge_ma;
        ctx.diagnosis.notify(
            Channel::OverCurrentCharge,
            if over_current { Outcome::Nok } else { Outcome::Ok },
            &mut ctx.error_flags,
        );
        ctx.diagnosis.notify(Channel::OverCurrentDischarge, Outcome::Ok, &mut ctx.error_flags);
    }
}

/// Plant feedback checks (§7): compare the main and charge contactor
/// lines' raw feedback bits, plus interlock feedback, against what the
/// current top-level state expects. The transient precharge lines are
/// not asserted here — their closed/open timing is driven entirely by
/// the contactor driver's own state machine, which BMS already polls
/// via `contactor_state`.
fn run_plant_feedback_checks(
    ctx: &mut BmsContext,
    state: BmsState,
    feedback: &ContactorFeedbackBlock,
    interlock: &InterlockFeedbackBlock,
) {
    let expect_main_closed = state == BmsState::Normal;
    let expect_charge_closed = state == BmsState::Charge;
    // Interlock CLOSE is only commanded on STANDBY entry (`standby_enter`)
    // and held through every state reachable from it; IDLE precedes that
    // command, so it must not be held to the same expectation.
    let expect_interlock_closed = matches!(
        state,
        BmsState::Standby
            | BmsState::Precharge
            | BmsState::Normal
            | BmsState::ChargePrecharge
            | BmsState::Charge
    );

    let main_plus_ok = feedback.main_plus_closed == expect_main_closed;
    ctx.diagnosis.notify(
        Channel::ContactorMainPlusFeedback,
        if main_plus_ok { Outcome::Ok } else { Outcome::Nok },
        &mut ctx.error_flags,
    );
    let main_minus_ok = feedback.main_minus_closed == expect_main_closed;
    ctx.diagnosis.notify(
        Channel::ContactorMainMinusFeedback,
        if main_minus_ok { Outcome::Ok } else { Outcome::Nok },
        &mut ctx.error_flags,
    );
    // Precharge contactor feedback is intentionally not asserted against
    // a fixed expectation — its closed window is transient and owned by
    // the contactor driver's own state machine.
    ctx.diagnosis.notify(Channel::ContactorPrechargeFeedback, Outcome::Ok, &mut ctx.error_flags);

    let charge_plus_ok = feedback.charge_main_plus_closed == expect_charge_closed;
    ctx.diagnosis.notify(
        Channel::ContactorChargeMainPlusFeedback,
        if charge_plus_ok { Outcome::Ok } else { Outcome::Nok },
        &mut ctx.error_flags,
    );
    let charge_minus_ok = feedback.charge_main_minus_closed == expect_charge_closed;
    ctx.diagnosis.notify(
        Channel::ContactorChargeMainMinusFeedback,
        if charge_minus_ok { Outcome::Ok } else { Outcome::Nok },
        &mut ctx.error_flags,
    );
    ctx.diagnosis.notify(Channel::ContactorChargePrechargeFeedback, Outcome::Ok, &mut ctx.error_flags);

    let interlock_ok = interlock.closed == expect_interlock_closed;
    ctx.diagnosis.notify(
        Channel::InterlockFeedback,
        if interlock_ok { Outcome::Ok } else { Outcome::Nok },
        &mut ctx.error_flags,
    );
}

/// Owns the state machine, the single-slot request mailbox, and the
/// re-entrance guard, exactly mirroring [`crate::bal::BalEngine`]'s
/// shape (§4.4/§4.5 share the same request-inbox idiom per §9).
pub struct BmsEngine {
    sm: StateMachine<BmsState, BmsContext, { BmsState::COUNT }>,
    mailbox: Mailbox<BmsRequest>,
    triggerentry: u8,
}

impl BmsEngine {
    pub fn new() -> Self {
        Self {
            sm: StateMachine::new(table(), BmsState::Uninitialized),
            mailbox: Mailbox::new(),
            triggerentry: 0,
        }
    }

    pub fn start(&mut self, ctx: &mut BmsContext) {
        self.sm.start(ctx);
    }

    /// Post a state request into the single-slot mailbox. Returns
    /// `true` if a previously pending, unconsumed request was displaced.
    pub fn post_request(&self, request: BmsRequest) -> bool {
        self.mailbox.post(request)
    }

    pub fn current_state(&self) -> BmsState {
        self.sm.current_state()
    }

    /// Run one 10 ms trigger. Latches `min_max`/`current`/`feedback`/
    /// `interlock` into `ctx`'s own copies before evaluating anything,
    /// so every handler — including `ERROR`'s exit condition — sees the
    /// same telemetry snapshot this cycle. `ctx.contactor_state` must
    /// already reflect the latest contactor driver poll before this call.
    pub fn trigger(
        &mut self,
        ctx: &mut BmsContext,
        min_max: &MinMaxBlock,
        current: &CurrentBlock,
        feedback: &ContactorFeedbackBlock,
        interlock: &InterlockFeedbackBlock,
    ) {
        debug_assert_eq!(self.triggerentry, 0, "BMS_Trigger re-entered");
        self.triggerentry += 1;

        ctx.min_max = *min_max;
        ctx.current = *current;
        ctx.contactor_feedback = *feedback;
        ctx.interlock_feedback = *interlock;

        let running = self.sm.current_state() != BmsState::Uninitialized;
        if running {
            let min_max = ctx.min_max;
            let current = ctx.current;
            let feedback = ctx.contactor_feedback;
            let interlock = ctx.interlock_feedback;
            run_soa_checks(ctx, &min_max, &current);
            run_plant_feedback_checks(ctx, self.sm.current_state(), &feedback, &interlock);
        }

        if let Some(request) = self.mailbox.take() {
            let current_state = self.sm.current_state();
            if is_valid_request(current_state, request) {
                match request {
                    BmsRequest::ErrorRequest => {
                        self.sm.force_transition(BmsState::Error, ctx);
                    }
                    BmsRequest::Standby => {
                        ctx.external_request = Some(SupervisorExternalRequest::Standby);
                    }
                    BmsRequest::Normal => {
                        ctx.external_request = Some(SupervisorExternalRequest::Normal);
                    }
                    BmsRequest::Charge => {
                        ctx.external_request = Some(SupervisorExternalRequest::Charge);
                    }
                }
            }
        }

        if ctx.cooldown_ticks > 0 {
            ctx.cooldown_ticks -= 1;
        } else {
            self.sm.tick(ctx);
        }

        self.triggerentry -= 1;
    }
}

impl Default for BmsEngine {
    fn default() -> Self {
        Self::new()
    }
}
