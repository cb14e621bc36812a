//! Shared mutable context threaded through every BMS state handler.

use crate::config::SystemConfig;
use crate::diagnosis::DiagnosisPlane;
use crate::telemetry::blocks::{
    BalExternalRequest, ContactorFeedbackBlock, CurrentBlock, ErrorFlags, InterlockFeedbackBlock,
    MinMaxBlock, SupervisorExternalRequest,
};

/// Per-state substep, named after §4.5's `ENTRY → CHECK_ERROR_FLAGS →
/// CHECK_BALANCING_REQUESTS → CHECK_STATE_REQUESTS → CHECK_CONTACTOR_*`
/// pattern. Recorded for observability even though one trigger call
/// runs the full sequence to completion within its 10 ms slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BmsSubstate {
    Entry,
    CheckErrorFlags,
    CheckBalancingRequests,
    CheckStateRequests,
    CheckContactor,
}

/// Request posted to the contactor driver (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactorRequest {
    Init,
    Standby,
    Normal,
    Charge,
    Error,
    NoRequest,
}

/// State observed back from the contactor driver (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContactorState {
    #[default]
    Undefined,
    Standby,
    Precharge,
    Normal,
    Charge,
    Error,
}

/// Command posted to the interlock driver (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterlockCommand {
    Open,
    Close,
}

pub struct BmsContext {
    pub substate: BmsSubstate,
    pub cooldown_ticks: u32,

    pub config: SystemConfig,
    pub diagnosis: DiagnosisPlane,
    pub error_flags: ErrorFlags,

    /// Refreshed from telemetry before each trigger.
    pub min_max: MinMaxBlock,
    pub current: CurrentBlock,
    pub contactor_feedback: ContactorFeedbackBlock,
    pub interlock_feedback: InterlockFeedbackBlock,
    pub contactor_state: ContactorState,

    /// One-shot external request consumed from `StateRequestBlock`.
    pub external_request: Option<SupervisorExternalRequest>,
    /// One-shot external balancing mode consumed from `BalancingControlBlock`.
    pub incoming_bal_request: Option<BalExternalRequest>,

    /// Output: set by a handler, read and applied by the caller this tick.
    pub contactor_request: Option<ContactorRequest>,
    /// Output: set by a handler, read and applied by the caller this tick.
    pub interlock_request: Option<InterlockCommand>,
    /// Output: balancing mode to forward to BAL this tick.
    pub bal_forward: Option<BalExternalRequest>,
    /// Output: set on `ERROR` entry. The caller posts
    /// `BalRequest::StopOverrideInactive` into BAL's mailbox and clears
    /// this flag (§4.5: "set BAL to STOP_OVERRIDE_INACTIVE").
    pub bal_force_stop_override: bool,
}

impl BmsContext {
    pub fn new(config: SystemConfig) -> Self {
        let diagnosis = DiagnosisPlane::new(
            config.sensitivity_voltage,
            config.sensitivity_temperature,
            config.sensitivity_current,
            config.sensitivity_feedback,
        );
        Self {
            substate: BmsSubstate::Entry,
            cooldown_ticks: 0,
            config,
            diagnosis,
            error_flags: ErrorFlags::default(),
            min_max: MinMaxBlock::default(),
            current: CurrentBlock::default(),
            contactor_feedback: ContactorFeedbackBlock::default(),
            interlock_feedback: InterlockFeedbackBlock::default(),
            contactor_state: ContactorState::default(),
            external_request: None,
            incoming_bal_request: None,
            contactor_request: None,
            interlock_request: None,
            bal_forward: None,
            bal_force_stop_override: false,
        }
    }

    /// `CheckAnyErrorFlagSet` (§4.2/§4.5): the OR of every latched flag.
    pub fn any_error_flag_set(&self) -> bool {
        self.error_flags.general_error
    }
}
