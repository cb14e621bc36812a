//! Port traits — the hexagonal boundary between domain logic and the
//! outside world, per spec.md §1/§6.
//!
//! ```text
//!   Driver/collaborator ──▶ Port trait ──▶ BmsService (domain)
//! ```
//!
//! Every external collaborator named in spec.md §6 gets one trait here
//! so the control core stays free of CAN wire formatting, contactor
//! actuation, NVM I/O, and RTOS tick sourcing — all explicitly out of
//! scope per §1. The core consumes these traits through generics; it
//! never touches hardware directly.

use crate::telemetry::blocks::{CellTemperatureBlock, CellVoltageBlock, CurrentBlock, MinMaxBlock};

// ───────────────────────────────────────────────────────────────
// Contactor port (driven adapter: domain → contactor state machine)
// ───────────────────────────────────────────────────────────────

/// Request posted to the contactor driver. Mirrors
/// `Contactor.SetStateRequest(req)` in §6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactorStateRequest {
    Init,
    Standby,
    Normal,
    Charge,
    Error,
    NoRequest,
}

/// State observed back from the contactor driver. Mirrors
/// `Contactor.GetState()` in §6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContactorDriverState {
    #[default]
    Undefined,
    Standby,
    Precharge,
    Normal,
    Charge,
    Error,
}

/// `Contactor.SetStateRequest` / `Contactor.GetState` (§6). The request
/// is posted (fire-and-forget); the state is observed by polling.
pub trait ContactorPort {
    fn set_state_request(&mut self, request: ContactorStateRequest);
    fn get_state(&self) -> ContactorDriverState;
}

// ───────────────────────────────────────────────────────────────
// Interlock port
// ───────────────────────────────────────────────────────────────

/// `Interlock.SetStateRequest(OPEN | CLOSE)` (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterlockStateRequest {
    Open,
    Close,
}

/// `Interlock.GetInterlockFeedback()` returning `{ON, OFF}` (§6),
/// represented here as a plain bool (`true` == closed/`ON`).
pub trait InterlockPort {
    fn set_state_request(&mut self, request: InterlockStateRequest);
    fn get_interlock_feedback(&self) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Measurement / current sensor ports
// ───────────────────────────────────────────────────────────────

/// `Measurement` writes `CellVoltage`, `CellTemperature`, `MinMax` at
/// its own cadence (§6). The core never calls into this port — it is
/// specified so the ambient test harness can drive a deterministic
/// fake at a known cadence instead of inventing an untyped mock.
pub trait MeasurementPort {
    fn read_cell_voltage(&mut self, now_ms: u32) -> CellVoltageBlock;
    fn read_cell_temperature(&mut self, now_ms: u32) -> CellTemperatureBlock;
    fn read_min_max(&mut self, now_ms: u32) -> MinMaxBlock;
}

/// `CurrentSensor` writes `Current` and the A·s / W·h counters (§6).
pub trait CurrentSensorPort {
    fn read_current(&mut self, now_ms: u32) -> CurrentBlock;
}

// ───────────────────────────────────────────────────────────────
// NVM port
// ───────────────────────────────────────────────────────────────

/// The persisted `{min, max, mean}` SOC triplet (§6). Format beyond
/// this triplet is opaque to the core — operating-hours counters and
/// diagnostic event memory are owned entirely by the NVM collaborator
/// and never touched here.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SocTriplet {
    pub mean_pct: f32,
    pub min_pct: f32,
    pub max_pct: f32,
}

/// `NVM.Get_soc` / `NVM.Set_soc` (§6).
pub trait NvmPort {
    fn get_soc(&self) -> SocTriplet;
    fn set_soc(&mut self, soc: SocTriplet);
}

// ───────────────────────────────────────────────────────────────
// CAN request surface
// ───────────────────────────────────────────────────────────────

/// The external CAN decoder posts requests into `StateRequest`/
/// `BalancingControl.external_request` at its own cadence (§6). Like
/// [`MeasurementPort`], the core never calls this directly — it reads
/// the telemetry blocks those posts land in. Specified here purely so
/// test harnesses can drive a deterministic request sequence without
/// reaching into telemetry internals.
pub trait CanRequestPort {
    fn poll_supervisor_request(
        &mut self,
        now_ms: u32,
    ) -> Option<crate::telemetry::blocks::SupervisorExternalRequest>;
    fn poll_balancing_request(
        &mut self,
        now_ms: u32,
    ) -> Option<crate::telemetry::blocks::BalExternalRequest>;
}

// ───────────────────────────────────────────────────────────────
// Clock port
// ───────────────────────────────────────────────────────────────

/// `MCU.GetTimeStamp()` (§6): monotonic milliseconds since boot.
/// Wraparound after ≥ 2^32 ms is explicitly not handled, per §6.
pub trait ClockPort {
    fn now_ms(&self) -> u32;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / CAN / UI)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port. Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}
