//! Telemetry record types.
//!
//! One Rust type per block named in the data model: `CellVoltageBlock`,
//! `CellTemperatureBlock`, `CurrentBlock`, `MinMaxBlock`, `SoxBlock`,
//! `BalancingControlBlock`, `StateRequestBlock`, `SystemStateBlock`,
//! `ContactorFeedbackBlock`, `InterlockFeedbackBlock`. Every block
//! carries `timestamp`/`previous_timestamp` milliseconds fields and
//! derives `Clone + Copy + Default`, so a record that has never been
//! written reads back as all zeroes per §4.1.

use heapless::Vec;
use serde::{Deserialize, Serialize};

use crate::config::{MAX_CELLS, MAX_MODULES, MAX_TEMP_SENSORS};

/// Fields common to every telemetry record.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Timestamps {
    pub timestamp_ms: u32,
    pub previous_timestamp_ms: u32,
}

impl Timestamps {
    /// Advance to `now`, keeping the invariant `timestamp >= previous_timestamp`.
    pub fn advance(&mut self, now_ms: u32) {
        self.previous_timestamp_ms = self.timestamp_ms;
        self.timestamp_ms = now_ms.max(self.timestamp_ms);
    }
}

/// Per-cell voltage (mV) and per-module PEC validity, written by the
/// measurement front-end.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CellVoltageBlock {
    pub ts: Timestamps,
    pub voltage_mv: [i32; MAX_CELLS],
    /// One bit per module; `1` means that module's last frame failed PEC.
    pub module_pec_invalid: u32,
    pub module_sum_mv: [i32; MAX_MODULES],
}

impl Default for CellVoltageBlock {
    fn default() -> Self {
        Self {
            ts: Timestamps::default(),
            voltage_mv: [0; MAX_CELLS],
            module_pec_invalid: 0,
            module_sum_mv: [0; MAX_MODULES],
        }
    }
}

/// Per-sensor temperature (°C ×10 for sub-degree resolution without
/// floats on the wire) and per-module validity, written by the
/// measurement front-end.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CellTemperatureBlock {
    pub ts: Timestamps,
    pub temperature_decic: [i16; MAX_TEMP_SENSORS],
    pub module_valid: u32,
}

impl Default for CellTemperatureBlock {
    fn default() -> Self {
        Self {
            ts: Timestamps::default(),
            temperature_decic: [0; MAX_TEMP_SENSORS],
            module_valid: 0,
        }
    }
}

/// Pack current and accumulated charge/energy counters, written by the
/// current-sensor driver.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CurrentBlock {
    pub ts: Timestamps,
    /// Signed pack current (mA); sign convention: positive = discharge.
    pub current_ma: i32,
    /// Coulomb counter, ampere-seconds, present only if the sensor supports it.
    pub charge_counter_as: i64,
    /// Energy counter, watt-hours.
    pub energy_counter_wh: i64,
    /// Derived instantaneous power (mW).
    pub power_mw: i64,
}

/// Pack min/max/mean voltage and temperature plus the indices of the
/// extrema, written by the measurement front-end.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct MinMaxBlock {
    pub ts: Timestamps,
    pub voltage_min_mv: i32,
    pub voltage_max_mv: i32,
    pub voltage_mean_mv: i32,
    pub voltage_min_index: u16,
    pub voltage_max_index: u16,
    pub temperature_min_decic: i16,
    pub temperature_max_decic: i16,
    pub temperature_mean_decic: i16,
    pub temperature_min_index: u16,
    pub temperature_max_index: u16,
}

/// State-of-charge and state-of-function outputs, written by the SOX
/// estimator.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SoxBlock {
    pub ts: Timestamps,
    pub soc_mean_pct: f32,
    pub soc_min_pct: f32,
    pub soc_max_pct: f32,
    pub sof_continuous_discharge_ma: f32,
    pub sof_peak_discharge_ma: f32,
    pub sof_continuous_charge_ma: f32,
    pub sof_peak_charge_ma: f32,
}

/// Per-cell balancing enable bits and the active threshold, written by
/// the balancing engine and consumed by the contactor driver / CAN.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BalancingControlBlock {
    pub ts: Timestamps,
    pub enable: Vec<bool, MAX_CELLS>,
    pub balancing_active: bool,
    pub threshold_mv: i32,
    pub external_request: BalExternalRequest,
}

impl Default for BalancingControlBlock {
    fn default() -> Self {
        let mut enable = Vec::new();
        let _ = enable.resize_default(MAX_CELLS);
        Self {
            ts: Timestamps::default(),
            enable,
            balancing_active: false,
            threshold_mv: 0,
            external_request: BalExternalRequest::NoRequest,
        }
    }
}

/// Command/request surface posted by the external CAN decoder for the
/// balancing engine, per §6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BalExternalRequest {
    #[default]
    NoRequest,
    InactiveOverride,
    ActiveOverride,
    OutOfOverride,
}

/// Externally requested top-level mode, posted by the CAN decoder for
/// the supervisor, per §6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StateRequestBlock {
    pub ts: Timestamps,
    pub request: SupervisorExternalRequest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SupervisorExternalRequest {
    #[default]
    NoRequest,
    Standby,
    Normal,
    Charge,
}

/// Supervisor state plus the complete error-flag record, written by
/// the supervisor and the diagnosis plane, read by everyone.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SystemStateBlock {
    pub ts: Timestamps,
    pub bms_state: u8,
    pub bms_substate: u8,
    pub bal_state: u8,
    pub bal_substate: u8,
    pub errors: ErrorFlags,
}

/// One bit per latched SOA/plant/liveness error, mirroring
/// `DATA_BLOCK_ERRORSTATE_s` in the originating platform.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorFlags {
    pub over_voltage: bool,
    pub under_voltage: bool,
    pub over_temperature_charge: bool,
    pub over_temperature_discharge: bool,
    pub under_temperature_charge: bool,
    pub under_temperature_discharge: bool,
    pub over_current_charge: bool,
    pub over_current_discharge: bool,
    pub contactor_main_plus_feedback: bool,
    pub contactor_main_minus_feedback: bool,
    pub contactor_precharge_feedback: bool,
    pub contactor_charge_main_plus_feedback: bool,
    pub contactor_charge_main_minus_feedback: bool,
    pub contactor_charge_precharge_feedback: bool,
    pub interlock_feedback: bool,
    pub current_sensor_not_responding: bool,
    pub pec_failure: bool,
    pub sysmon_timeout: bool,
    /// OR of every flag above, computed by `CheckAnyErrorFlagSet` each cycle.
    pub general_error: bool,
}

impl ErrorFlags {
    /// Recompute `general_error` as the OR of every other flag.
    pub fn recompute_general_error(&mut self) {
        self.general_error = self.over_voltage
            || self.under_voltage
            || self.over_temperature_charge
            || self.over_temperature_discharge
            || self.under_temperature_charge
            || self.under_temperature_discharge
            || self.over_current_charge
            || self.over_current_discharge
            || self.contactor_main_plus_feedback
            || self.contactor_main_minus_feedback
            || self.contactor_precharge_feedback
            || self.contactor_charge_main_plus_feedback
            || self.contactor_charge_main_minus_feedback
            || self.contactor_charge_precharge_feedback
            || self.interlock_feedback
            || self.current_sensor_not_responding
            || self.pec_failure
            || self.sysmon_timeout;
    }
}

/// Raw contactor feedback bitfield, written by the contactor driver.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ContactorFeedbackBlock {
    pub ts: Timestamps,
    pub main_plus_closed: bool,
    pub main_minus_closed: bool,
    pub precharge_closed: bool,
    pub charge_main_plus_closed: bool,
    pub charge_main_minus_closed: bool,
    pub charge_precharge_closed: bool,
}

impl ContactorFeedbackBlock {
    /// Whether the pack main contactors (discharge path) are both closed.
    pub fn main_contactors_closed(&self) -> bool {
        self.main_plus_closed && self.main_minus_closed
    }
}

/// Single-boolean interlock feedback, written by the interlock driver.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct InterlockFeedbackBlock {
    pub ts: Timestamps,
    pub closed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zeroed_blocks_are_all_zero() {
        let cv = CellVoltageBlock::default();
        assert!(cv.voltage_mv.iter().all(|&v| v == 0));
        let sox = SoxBlock::default();
        assert_eq!(sox.soc_mean_pct, 0.0);
    }

    #[test]
    fn timestamps_advance_monotonically() {
        let mut ts = Timestamps::default();
        ts.advance(10);
        ts.advance(20);
        assert!(ts.timestamp_ms >= ts.previous_timestamp_ms);
        assert_eq!(ts.previous_timestamp_ms, 10);
        assert_eq!(ts.timestamp_ms, 20);
    }
}
