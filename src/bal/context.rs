//! Shared mutable context threaded through every BAL state handler.

use heapless::Vec;

use crate::config::{SystemConfig, MAX_CELLS};
use crate::telemetry::blocks::BalExternalRequest;

/// Substates entered only while the top-level state is `Active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalSubstate {
    Entry,
    BalanceActive,
    BalanceActiveFinished,
    BalanceInactive,
}

/// Per-cell voltages and the pack minimum, refreshed from telemetry
/// before each trigger.
#[derive(Debug, Clone, Copy, Default)]
pub struct CellSnapshot {
    pub voltage_mv: [i32; MAX_CELLS],
    pub min_voltage_mv: i32,
    pub num_cells: usize,
}

/// The context passed to every BAL state handler function.
pub struct BalContext {
    pub substate: BalSubstate,

    /// Cooldown in 1 ms ticks before the next decision is made.
    pub cooldown_ticks: u32,

    /// Countdown, in 10 ms units, until balancing may activate. Armed to
    /// `TIME_BEFORE_BALANCING_S * 100` when the pack transitions from
    /// moving to resting (§4.4).
    pub rest_timer_10ms: u32,
    /// Prescaler counting 1 ms trigger invocations up to 10, so
    /// `rest_timer_10ms` decrements once per 10 ms of wall time even
    /// though the trigger itself runs every 1 ms.
    pub ms_prescaler: u8,
    /// Whether the pack was resting as of the previous tick (edge detection).
    pub was_resting: bool,

    /// Active balancing threshold above pack minimum, in mV. Starts at
    /// `THRESHOLD_MV + HYSTERESIS_MV` and drops to `THRESHOLD_MV` once a
    /// cell is actively balancing (§4.4).
    pub threshold_mv: i32,

    pub cells: CellSnapshot,
    pub current_ma: i32,

    pub enable: Vec<bool, MAX_CELLS>,
    pub balancing_active: bool,

    pub config: SystemConfig,

    /// Forwarded from the supervisor or the CAN decoder (§6).
    pub pending_external_request: Option<BalExternalRequest>,
}

impl BalContext {
    pub fn new(config: SystemConfig) -> Self {
        let mut enable = Vec::new();
        let _ = enable.resize_default(MAX_CELLS);
        Self {
            substate: BalSubstate::Entry,
            cooldown_ticks: 0,
            rest_timer_10ms: 0,
            ms_prescaler: 0,
            was_resting: false,
            threshold_mv: config.threshold_mv + config.hysteresis_mv,
            cells: CellSnapshot::default(),
            current_ma: 0,
            enable,
            balancing_active: false,
            config,
            pending_external_request: None,
        }
    }

    /// True iff `|current| < REST_CURRENT`.
    pub fn is_resting(&self) -> bool {
        self.current_ma.abs() < self.config.rest_current_ma
    }

    /// Advance rest-state bookkeeping for one 1 ms tick. Arms the rest
    /// timer on the moving→resting edge; decrements it once every 10
    /// ticks while resting.
    pub fn advance_rest_tracking(&mut self) {
        let resting = self.is_resting();
        if resting && !self.was_resting {
            self.rest_timer_10ms = self.config.time_before_balancing_s * 100;
        }
        if resting {
            self.ms_prescaler += 1;
            if self.ms_prescaler >= 10 {
                self.ms_prescaler = 0;
                self.rest_timer_10ms = self.rest_timer_10ms.saturating_sub(1);
            }
        } else {
            self.ms_prescaler = 0;
        }
        self.was_resting = resting;
    }

    /// Whether balancing is permitted to activate right now.
    pub fn may_activate(&self) -> bool {
        self.is_resting()
            && self.rest_timer_10ms == 0
            && self.cells.min_voltage_mv >= self.config.lower_voltage_limit_mv
    }

    /// All cells off — the idempotent "deactivate" sweep.
    pub fn clear_all_enables(&mut self) {
        for e in self.enable.iter_mut() {
            *e = false;
        }
        self.balancing_active = false;
    }
}
