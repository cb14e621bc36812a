//! System configuration parameters.
//!
//! All tunable parameters for the BMS control core. Values mirror the
//! battery-cell configuration constants the platform ships with; they
//! can be overridden at runtime (e.g. loaded via [`crate::app::ports::NvmPort`]
//! at boot) but the core never persists them itself.

use serde::{Deserialize, Serialize};

/// Maximum number of cell modules a pack instance can report telemetry for.
pub const MAX_MODULES: usize = 3;
/// Maximum number of cells per module.
pub const MAX_CELLS_PER_MODULE: usize = 12;
/// Maximum number of cells across the whole pack.
pub const MAX_CELLS: usize = MAX_MODULES * MAX_CELLS_PER_MODULE;
/// Maximum number of temperature sensors across the whole pack.
pub const MAX_TEMP_SENSORS: usize = MAX_CELLS;

/// Battery cell and pack configuration.
///
/// Defaults reproduce the constants shipped in the platform's
/// `batterycell_cfg.h` / `batterysystem_cfg.h`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConfig {
    // --- Safe operating area (SOA) ---
    /// Maximum allowed single-cell voltage (mV) before `over_voltage` latches.
    pub bc_voltmax_mv: i32,
    /// Minimum allowed single-cell voltage (mV) before `under_voltage` latches.
    pub bc_voltmin_mv: i32,
    /// Nominal single-cell voltage (mV), used as a reference point by SOF.
    pub bc_volt_nominal_mv: i32,

    /// Maximum allowed temperature (°C) while discharging.
    pub bc_tempmax_discharge_c: i32,
    /// Minimum allowed temperature (°C) while discharging.
    pub bc_tempmin_discharge_c: i32,
    /// Maximum allowed temperature (°C) while charging.
    pub bc_tempmax_charge_c: i32,
    /// Minimum allowed temperature (°C) while charging.
    pub bc_tempmin_charge_c: i32,

    /// Maximum discharge current magnitude (mA).
    pub bc_currentmax_discharge_ma: i32,
    /// Maximum charge current magnitude (mA).
    pub bc_currentmax_charge_ma: i32,

    /// Nominal single-cell capacity (mAh), used by SOC integration.
    pub bc_capacity_mah: u32,

    // --- Balancing ---
    /// Current magnitude (mA) below which the pack is considered "at rest".
    pub rest_current_ma: i32,
    /// Seconds of continuous rest required before balancing may activate.
    pub time_before_balancing_s: u32,
    /// Pack minimum voltage (mV) below which balancing is inhibited.
    pub lower_voltage_limit_mv: i32,
    /// Balancing activation threshold above pack minimum (mV), steady state.
    pub threshold_mv: i32,
    /// Extra hysteresis (mV) added to the threshold on first activation.
    pub hysteresis_mv: i32,

    // --- System topology ---
    /// Whether the charge and discharge power lines use separate contactors
    /// (enables `CHARGE_PRECHARGE`/`CHARGE` states in the supervisor).
    pub separate_powerlines: bool,

    // --- SOF derating curves ---
    pub sof: SofCurveConfig,

    // --- Timing ---
    /// BAL trigger period (milliseconds). Fixed at 1 ms by the platform.
    pub bal_tick_ms: u32,
    /// BMS trigger period (milliseconds). Fixed at 10 ms by the platform.
    pub bms_tick_ms: u32,
    /// SOX trigger period (milliseconds). Fixed at 100 ms by the platform.
    pub sox_tick_ms: u32,

    /// Diagnosis sensitivity (consecutive NOK reports) for voltage channels.
    pub sensitivity_voltage: u8,
    /// Diagnosis sensitivity for temperature channels.
    pub sensitivity_temperature: u8,
    /// Diagnosis sensitivity for current channels.
    pub sensitivity_current: u8,
    /// Diagnosis sensitivity for contactor/interlock feedback channels.
    pub sensitivity_feedback: u8,

    /// Whether a coulomb-counting current sensor is present (selects the
    /// SOC integration mode — see `crate::sox::soc`).
    pub coulomb_counter_present: bool,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            bc_voltmax_mv: 2800,
            bc_voltmin_mv: 1700,
            bc_volt_nominal_mv: 2500,

            bc_tempmax_discharge_c: 55,
            bc_tempmin_discharge_c: -20,
            bc_tempmax_charge_c: 45,
            bc_tempmin_charge_c: -20,

            bc_currentmax_discharge_ma: 180_000,
            bc_currentmax_charge_ma: 180_000,

            bc_capacity_mah: 3500,

            rest_current_ma: 1_000,
            time_before_balancing_s: 600,
            lower_voltage_limit_mv: 2_000,
            threshold_mv: 20,
            hysteresis_mv: 10,

            separate_powerlines: true,

            sof: SofCurveConfig::default(),

            bal_tick_ms: 1,
            bms_tick_ms: 10,
            sox_tick_ms: 100,

            sensitivity_voltage: 3,
            sensitivity_temperature: 3,
            sensitivity_current: 3,
            sensitivity_feedback: 5,

            coulomb_counter_present: false,
        }
    }
}

/// One three-region piecewise-linear derating curve definition: below
/// `limit` the curve clamps to `floor`; above `cutoff` it clamps to the
/// rated maximum; in between it interpolates linearly. See
/// [`crate::sox::curve`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DeratingPoint {
    /// The input value (voltage mV, SOC %, or temperature °C) at which the
    /// curve still reads `floor` (discharge: low side, charge: high side).
    pub limit: f32,
    /// The input value beyond which the full rated current is allowed.
    pub cutoff: f32,
    /// Output at/beyond `limit` (typically 0, sometimes a limp-home value).
    pub floor: f32,
}

/// All derating curve inputs needed to compute the four SOF outputs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SofCurveConfig {
    pub voltage_discharge: DeratingPoint,
    pub voltage_charge: DeratingPoint,
    pub soc_discharge: DeratingPoint,
    pub soc_charge: DeratingPoint,
    pub temperature_discharge: DeratingPoint,
    pub temperature_charge: DeratingPoint,

    /// Rated continuous discharge current (mA), the curves' asymptote.
    pub i_discharge_max_cont_ma: f32,
    /// Rated peak discharge current (mA).
    pub i_discharge_max_peak_ma: f32,
    /// Rated continuous charge current (mA).
    pub i_charge_max_cont_ma: f32,
    /// Rated peak charge current (mA).
    pub i_charge_max_peak_ma: f32,
}

impl Default for SofCurveConfig {
    fn default() -> Self {
        Self {
            voltage_discharge: DeratingPoint { limit: 1_800.0, cutoff: 2_000.0, floor: 0.0 },
            voltage_charge: DeratingPoint { limit: 2_750.0, cutoff: 2_650.0, floor: 0.0 },
            soc_discharge: DeratingPoint { limit: 5.0, cutoff: 10.0, floor: 0.0 },
            soc_charge: DeratingPoint { limit: 95.0, cutoff: 90.0, floor: 0.0 },
            temperature_discharge: DeratingPoint { limit: -15.0, cutoff: -5.0, floor: 0.0 },
            temperature_charge: DeratingPoint { limit: -15.0, cutoff: -5.0, floor: 0.0 },

            i_discharge_max_cont_ma: 120_000.0,
            i_discharge_max_peak_ma: 180_000.0,
            i_charge_max_cont_ma: 60_000.0,
            i_charge_max_peak_ma: 90_000.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_platform_constants() {
        let cfg = SystemConfig::default();
        assert_eq!(cfg.bc_voltmax_mv, 2800);
        assert_eq!(cfg.bc_voltmin_mv, 1700);
        assert_eq!(cfg.bc_capacity_mah, 3500);
        assert_eq!(cfg.bc_currentmax_discharge_ma, 180_000);
        assert_eq!(cfg.bc_currentmax_charge_ma, 180_000);
        assert_eq!(cfg.bc_tempmax_discharge_c, 55);
        assert_eq!(cfg.bc_tempmin_discharge_c, -20);
        assert_eq!(cfg.bc_tempmax_charge_c, 45);
        assert_eq!(cfg.bc_tempmin_charge_c, -20);
    }

    #[test]
    fn sof_curves_are_ordered() {
        let cfg = SystemConfig::default();
        assert!(cfg.sof.voltage_discharge.limit < cfg.sof.voltage_discharge.cutoff);
        assert!(cfg.sof.voltage_charge.limit > cfg.sof.voltage_charge.cutoff);
        assert!(cfg.sof.i_discharge_max_cont_ma <= cfg.sof.i_discharge_max_peak_ma);
        assert!(cfg.sof.i_charge_max_cont_ma <= cfg.sof.i_charge_max_peak_ma);
    }
}
