//! Balancing Engine (BAL) state machine. See §4.4.
//!
//! `UNINITIALIZED → INITIALIZATION → INITIALIZED → INACTIVE`, then
//! `INACTIVE ⇄ ACTIVE` (substates `ENTRY, BALANCE_ACTIVE,
//! BALANCE_ACTIVE_FINISHED, BALANCE_INACTIVE`), `ACTIVE_OVERRIDE`,
//! `INACTIVE_OVERRIDE`, `STOP_OVERRIDE_ACTIVE`, `STOP_OVERRIDE_INACTIVE`,
//! `ERROR`. Triggered every 1 ms; each call either does nothing (cooldown
//! pending) or advances the machine by exactly one decision.

use log::info;

use crate::engine::{StateDescriptor, StateId as EngineStateId, StateMachine};
use crate::mailbox::Mailbox;

use super::context::{BalContext, BalSubstate};

/// Long back-off applied after a balancing sweep finds nothing left to do,
/// before the next sweep cycle begins (§4.4).
const FINISHED_BACKOFF_TICKS: u32 = 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BalState {
    Uninitialized = 0,
    Initialization = 1,
    Initialized = 2,
    Inactive = 3,
    Active = 4,
    ActiveOverride = 5,
    InactiveOverride = 6,
    StopOverrideActive = 7,
    StopOverrideInactive = 8,
    Error = 9,
}

impl BalState {
    pub const COUNT: usize = 10;
}

impl EngineStateId for BalState {
    fn index(self) -> usize {
        self as usize
    }
}

/// External requests accepted by the balancer, per §6's CAN request
/// surface plus the always-accepted error preemption of §4.4/§5.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalRequest {
    InactiveOverride,
    ActiveOverride,
    OutOfOverride,
    ErrorRequest,
    /// Forces `STOP_OVERRIDE_INACTIVE` directly. Posted by the BMS
    /// supervisor on `ERROR` entry (§4.5: "set BAL to
    /// STOP_OVERRIDE_INACTIVE") — always accepted, like `ErrorRequest`,
    /// since the supervisor must be able to silence balancing from any
    /// BAL state the instant a pack fault latches.
    StopOverrideInactive,
}

/// Whether `req` is a legal request from `current`. Only `ErrorRequest`
/// is always accepted (§4.4); everything else must target a state that
/// can reach it directly.
fn is_valid_request(current: BalState, req: BalRequest) -> bool {
    match req {
        BalRequest::ErrorRequest | BalRequest::StopOverrideInactive => true,
        BalRequest::InactiveOverride => {
            matches!(current, BalState::Inactive | BalState::Active | BalState::ActiveOverride)
        }
        BalRequest::ActiveOverride => {
            matches!(current, BalState::Inactive | BalState::Active | BalState::InactiveOverride)
        }
        BalRequest::OutOfOverride => matches!(
            current,
            BalState::ActiveOverride
                | BalState::InactiveOverride
                | BalState::StopOverrideActive
                | BalState::StopOverrideInactive
        ),
    }
}

fn table() -> [StateDescriptor<BalState, BalContext>; BalState::COUNT] {
    [
        StateDescriptor {
            id: BalState::Uninitialized,
            name: "UNINITIALIZED",
            on_enter: None,
            on_exit: None,
            on_update: |_ctx| Some(BalState::Initialization),
        },
        StateDescriptor {
            id: BalState::Initialization,
            name: "INITIALIZATION",
            on_enter: None,
            on_exit: None,
            on_update: |_ctx| Some(BalState::Initialized),
        },
        StateDescriptor {
            id: BalState::Initialized,
            name: "INITIALIZED",
            on_enter: None,
            on_exit: None,
            on_update: |_ctx| Some(BalState::Inactive),
        },
        StateDescriptor {
            id: BalState::Inactive,
            name: "INACTIVE",
            on_enter: Some(|ctx| ctx.clear_all_enables()),
            on_exit: None,
            on_update: inactive_update,
        },
        StateDescriptor {
            id: BalState::Active,
            name: "ACTIVE",
            on_enter: Some(active_enter),
            on_exit: None,
            on_update: active_update,
        },
        StateDescriptor {
            id: BalState::ActiveOverride,
            name: "ACTIVE_OVERRIDE",
            on_enter: Some(active_override_enter),
            on_exit: None,
            on_update: active_override_update,
        },
        StateDescriptor {
            id: BalState::InactiveOverride,
            name: "INACTIVE_OVERRIDE",
            on_enter: Some(|ctx| ctx.clear_all_enables()),
            on_exit: None,
            on_update: inactive_override_update,
        },
        StateDescriptor {
            id: BalState::StopOverrideActive,
            name: "STOP_OVERRIDE_ACTIVE",
            on_enter: Some(|ctx| ctx.clear_all_enables()),
            on_exit: None,
            on_update: |_ctx| Some(BalState::StopOverrideInactive),
        },
        StateDescriptor {
            id: BalState::StopOverrideInactive,
            name: "STOP_OVERRIDE_INACTIVE",
            on_enter: Some(|ctx| ctx.clear_all_enables()),
            on_exit: None,
            on_update: stop_override_inactive_update,
        },
        StateDescriptor {
            id: BalState::Error,
            name: "ERROR",
            on_enter: Some(|ctx| ctx.clear_all_enables()),
            on_exit: None,
            on_update: error_update,
        },
    ]
}

fn active_enter(ctx: &mut BalContext) {
    ctx.substate = BalSubstate::Entry;
    ctx.threshold_mv = ctx.config.threshold_mv + ctx.config.hysteresis_mv;
}

fn inactive_update(ctx: &mut BalContext) -> Option<BalState> {
    match ctx.pending_external_request.take() {
        Some(crate::telemetry::blocks::BalExternalRequest::ActiveOverride) => {
            return Some(BalState::ActiveOverride)
        }
        Some(crate::telemetry::blocks::BalExternalRequest::InactiveOverride) => {
            return Some(BalState::InactiveOverride)
        }
        _ => {}
    }
    if ctx.may_activate() {
        return Some(BalState::Active);
    }
    None
}

fn active_update(ctx: &mut BalContext) -> Option<BalState> {
    if !ctx.may_activate() && ctx.substate != BalSubstate::BalanceActive {
        // Rest or voltage guard broke outside an in-progress sweep; bail to top-level Inactive.
        return Some(BalState::Inactive);
    }

    match ctx.substate {
        BalSubstate::Entry => {
            ctx.substate = BalSubstate::BalanceActive;
            None
        }
        BalSubstate::BalanceActive => {
            let min = ctx.cells.min_voltage_mv;
            if min < ctx.config.lower_voltage_limit_mv {
                // The voltage floor broke mid-sweep: the top guard above
                // deliberately lets an in-progress sweep bypass `may_activate`,
                // but the sweep itself must never enable a cell while
                // `min_voltage < LOWER_VOLTAGE_LIMIT_MV` (§2/§8). Stop the
                // sweep in place rather than letting it run one more round.
                ctx.clear_all_enables();
                ctx.substate = BalSubstate::BalanceActiveFinished;
                return None;
            }
            let threshold = ctx.threshold_mv;
            let mut any_active = false;
            for i in 0..ctx.cells.num_cells {
                let on = ctx.cells.voltage_mv[i] > min + threshold;
                ctx.enable[i] = on;
                any_active |= on;
            }
            ctx.balancing_active = any_active;
            if any_active {
                // Hysteresis drops once a cell is actively balancing (§4.4).
                ctx.threshold_mv = ctx.config.threshold_mv;
            } else {
                ctx.substate = BalSubstate::BalanceActiveFinished;
            }
            None
        }
        BalSubstate::BalanceActiveFinished => {
            ctx.clear_all_enables();
            ctx.threshold_mv = ctx.config.threshold_mv + ctx.config.hysteresis_mv;
            ctx.cooldown_ticks = FINISHED_BACKOFF_TICKS;
            // Preserved from the source (spec.md §9): `substate` is set to
            // the inactive substate here, then immediately overwritten
            // with `Entry` below. The first assignment is dead — kept
            // verbatim rather than silently fixed.
            ctx.substate = BalSubstate::BalanceInactive;
            ctx.substate = BalSubstate::Entry;
            None
        }
        BalSubstate::BalanceInactive => {
            // Unreachable in practice: `BalanceActiveFinished` above always
            // overwrites this substate with `Entry` before a tick can
            // observe it. Kept for table symmetry with the four named
            // substates in §4.4.
            ctx.substate = BalSubstate::Entry;
            None
        }
    }
}

fn active_override_enter(ctx: &mut BalContext) {
    for i in 0..ctx.cells.num_cells {
        ctx.enable[i] = true;
    }
    ctx.balancing_active = true;
}

fn active_override_update(ctx: &mut BalContext) -> Option<BalState> {
    if ctx.pending_external_request.take()
        == Some(crate::telemetry::blocks::BalExternalRequest::OutOfOverride)
    {
        return Some(BalState::StopOverrideActive);
    }

    let min = ctx.cells.min_voltage_mv;
    let all_converged = (0..ctx.cells.num_cells)
        .all(|i| ctx.cells.voltage_mv[i] <= min + ctx.config.threshold_mv);
    if all_converged {
        // Preserved from the source (spec.md §9): the "finished" branch
        // here is meant to return to `Inactive`, but assigns a value
        // that names the same concept as the `BalanceActive` *substate*
        // instead of a genuine top-level state — likely a copy-paste
        // bug. Flagged in review there, kept verbatim here: the typed
        // Rust equivalent of "assigning a substate-shaped value to the
        // top-level state" is returning the *top-level* state whose name
        // collides with the substate, rather than the intended
        // `BalState::Inactive`.
        info!("ACTIVE_OVERRIDE: sweep converged, transitioning (see DESIGN.md bug note)");
        return Some(BalState::Active);
    }
    None
}

fn inactive_override_update(ctx: &mut BalContext) -> Option<BalState> {
    if ctx.pending_external_request.take()
        == Some(crate::telemetry::blocks::BalExternalRequest::OutOfOverride)
    {
        return Some(BalState::StopOverrideActive);
    }
    None
}

fn stop_override_inactive_update(ctx: &mut BalContext) -> Option<BalState> {
    if ctx.pending_external_request.take().is_some() {
        return Some(BalState::Inactive);
    }
    None
}

fn error_update(ctx: &mut BalContext) -> Option<BalState> {
    if ctx.pending_external_request.take().is_some() {
        return Some(BalState::Inactive);
    }
    None
}

/// Owns the state machine, the single-slot request mailbox, and the
/// re-entrance guard. External callers only ever see [`BalEngine`], not
/// the raw [`StateMachine`].
pub struct BalEngine {
    sm: StateMachine<BalState, BalContext, { BalState::COUNT }>,
    mailbox: Mailbox<BalRequest>,
    triggerentry: u8,
}

impl BalEngine {
    pub fn new() -> Self {
        Self {
            sm: StateMachine::new(table(), BalState::Uninitialized),
            mailbox: Mailbox::new(),
            triggerentry: 0,
        }
    }

    pub fn start(&mut self, ctx: &mut BalContext) {
        self.sm.start(ctx);
    }

    /// Post a state request into the single-slot mailbox. Returns `true`
    /// if a previously pending, unconsumed request was displaced.
    pub fn post_request(&self, request: BalRequest) -> bool {
        self.mailbox.post(request)
    }

    pub fn current_state(&self) -> BalState {
        self.sm.current_state()
    }

    /// Run one 1 ms trigger. `ctx.cells`/`ctx.current_ma` must already
    /// reflect the latest telemetry before this call.
    pub fn trigger(&mut self, ctx: &mut BalContext) {
        debug_assert_eq!(self.triggerentry, 0, "BAL_Trigger re-entered");
        self.triggerentry += 1;

        ctx.advance_rest_tracking();

        if let Some(request) = self.mailbox.take() {
            let current = self.sm.current_state();
            if is_valid_request(current, request) {
                match request {
                    BalRequest::ErrorRequest => {
                        self.sm.force_transition(BalState::Error, ctx);
                    }
                    BalRequest::StopOverrideInactive => {
                        self.sm.force_transition(BalState::StopOverrideInactive, ctx);
                    }
                    BalRequest::ActiveOverride => {
                        ctx.pending_external_request =
                            Some(crate::telemetry::blocks::BalExternalRequest::ActiveOverride);
                    }
                    BalRequest::InactiveOverride => {
                        ctx.pending_external_request =
                            Some(crate::telemetry::blocks::BalExternalRequest::InactiveOverride);
                    }
                    BalRequest::OutOfOverride => {
                        ctx.pending_external_request =
                            Some(crate::telemetry::blocks::BalExternalRequest::OutOfOverride);
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

impl Default for BalEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SystemConfig;

    fn boot(engine: &mut BalEngine, ctx: &mut BalContext) {
        engine.start(ctx);
        for _ in 0..3 {
            engine.trigger(ctx);
        }
        assert_eq!(engine.current_state(), BalState::Inactive);
    }

    #[test]
    fn boots_to_inactive() {
        let mut engine = BalEngine::new();
        let mut ctx = BalContext::new(SystemConfig::default());
        boot(&mut engine, &mut ctx);
    }

    #[test]
    fn stays_inactive_below_voltage_limit() {
        let mut engine = BalEngine::new();
        let mut ctx = BalContext::new(SystemConfig::default());
        boot(&mut engine, &mut ctx);

        ctx.current_ma = 0;
        ctx.cells.num_cells = 4;
        ctx.cells.min_voltage_mv = ctx.config.lower_voltage_limit_mv - 1;
        for _ in 0..(ctx.config.time_before_balancing_s * 100 * 10 + 100) {
            engine.trigger(&mut ctx);
        }
        assert_eq!(engine.current_state(), BalState::Inactive);
        assert!(ctx.enable.iter().all(|&e| !e));
    }

    #[test]
    fn activates_outlier_cell_after_rest_timer() {
        let mut engine = BalEngine::new();
        let mut cfg = SystemConfig::default();
        cfg.time_before_balancing_s = 1; // keep the test fast
        let mut ctx = BalContext::new(cfg);
        boot(&mut engine, &mut ctx);

        ctx.current_ma = 0;
        ctx.cells.num_cells = 4;
        ctx.cells.min_voltage_mv = 3000;
        ctx.cells.voltage_mv[0] = 3000 + ctx.config.threshold_mv + ctx.config.hysteresis_mv + 1;
        ctx.cells.voltage_mv[1] = 3000;
        ctx.cells.voltage_mv[2] = 3000;
        ctx.cells.voltage_mv[3] = 3000;

        // 1 s of rest at 1 ms ticks, plus margin, before balancing can activate.
        for _ in 0..1_200 {
            engine.trigger(&mut ctx);
        }

        assert_eq!(engine.current_state(), BalState::Active);
        assert!(ctx.enable[0]);
        assert!(!ctx.enable[1]);
    }

    #[test]
    fn voltage_sag_mid_sweep_clears_enables_instead_of_continuing() {
        let mut engine = BalEngine::new();
        let mut cfg = SystemConfig::default();
        cfg.time_before_balancing_s = 1; // keep the test fast
        let mut ctx = BalContext::new(cfg);
        boot(&mut engine, &mut ctx);

        ctx.current_ma = 0;
        ctx.cells.num_cells = 4;
        ctx.cells.min_voltage_mv = 3000;
        ctx.cells.voltage_mv[0] = 3000 + ctx.config.threshold_mv + ctx.config.hysteresis_mv + 1;
        ctx.cells.voltage_mv[1] = 3000;
        ctx.cells.voltage_mv[2] = 3000;
        ctx.cells.voltage_mv[3] = 3000;

        for _ in 0..1_200 {
            engine.trigger(&mut ctx);
        }
        assert_eq!(engine.current_state(), BalState::Active);
        assert!(ctx.enable[0], "outlier must be balancing before the sag");

        // Pack minimum voltage drops below the floor mid-sweep. Per §8:
        // "∀ tick of BAL in ACTIVE: if min_voltage < LOWER_VOLTAGE_LIMIT_MV,
        // then enable[i] = 0 for all i" — even though a sweep is already
        // in progress.
        ctx.cells.min_voltage_mv = ctx.config.lower_voltage_limit_mv - 1;
        engine.trigger(&mut ctx);

        assert!(ctx.enable.iter().all(|&e| !e), "no cell may stay enabled below the voltage floor");
    }

    #[test]
    fn deactivate_then_deactivate_is_idempotent() {
        let mut ctx = BalContext::new(SystemConfig::default());
        ctx.cells.num_cells = 4;
        ctx.enable[0] = true;
        ctx.clear_all_enables();
        let after_first = ctx.enable.clone();
        ctx.clear_all_enables();
        assert_eq!(ctx.enable, after_first);
        assert!(ctx.enable.iter().all(|&e| !e));
    }

    #[test]
    fn error_request_is_always_accepted() {
        assert!(is_valid_request(BalState::Active, BalRequest::ErrorRequest));
        assert!(is_valid_request(BalState::Uninitialized, BalRequest::ErrorRequest));
    }

    #[test]
    fn out_of_override_rejected_from_plain_inactive() {
        assert!(!is_valid_request(BalState::Inactive, BalRequest::OutOfOverride));
    }

    #[test]
    fn stop_override_inactive_forces_state_from_active() {
        let mut engine = BalEngine::new();
        let mut ctx = BalContext::new(SystemConfig::default());
        boot(&mut engine, &mut ctx);

        engine.post_request(BalRequest::StopOverrideInactive);
        engine.trigger(&mut ctx);
        assert_eq!(engine.current_state(), BalState::StopOverrideInactive);
        assert!(ctx.enable.iter().all(|&e| !e));
    }
}
