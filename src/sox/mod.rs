//! SOX Estimator: state-of-charge and state-of-function. See §4.3.
//!
//! Read-only consumer of current/voltage/temperature telemetry;
//! writer of the `Sox` block other components (BMS, CAN) read.
//! None of its operations fail — every input is read-through
//! telemetry and every output is unconditionally saturated, per
//! spec.md §4.3's "Failure" note.

pub mod curve;
pub mod soc;
pub mod sof;

pub use curve::DeratingCurve;
pub use sof::{SofCurves, SofOutputs};
pub use soc::SocEstimator;

use crate::app::ports::NvmPort;
use crate::config::SystemConfig;
use crate::telemetry::TelemetryStore;

/// Owns the SOC estimator and precomputed SOF curves; orchestrates one
/// 100 ms tick across both.
pub struct SoxEngine {
    soc: SocEstimator,
    sof: SofCurves,
}

impl SoxEngine {
    pub fn new(config: &SystemConfig, nvm: &impl NvmPort) -> Self {
        Self { soc: SocEstimator::new(config, nvm), sof: SofCurves::new(&config.sof) }
    }

    /// Run one 100 ms trigger: refresh SOC from `Current`, recompute
    /// SOF from `MinMax`/`Sox.soc_mean`, force SOF to zero if the main
    /// contactors are reported open, and publish the result.
    pub fn trigger_100ms(&mut self, telemetry: &TelemetryStore, config: &SystemConfig, nvm: &mut impl NvmPort) {
        let current = telemetry.read_current();
        self.soc.tick(&current, config, nvm);

        let min_max = telemetry.read_min_max();
        let contactor_feedback = telemetry.read_contactor_feedback();

        let sof = if contactor_feedback.main_contactors_closed() {
            self.sof.compute(
                min_max.voltage_min_mv as f32,
                self.soc.mean_pct(),
                min_max.temperature_min_decic as f32 / 10.0,
            )
        } else {
            SofOutputs::zero()
        };

        let mut block = telemetry.read_sox();
        block.ts.advance(current.ts.timestamp_ms);
        block.soc_mean_pct = self.soc.mean_pct();
        block.soc_min_pct = self.soc.min_pct();
        block.soc_max_pct = self.soc.max_pct();
        block.sof_continuous_discharge_ma = sof.continuous_discharge_ma;
        block.sof_peak_discharge_ma = sof.peak_discharge_ma;
        block.sof_continuous_charge_ma = sof.continuous_charge_ma;
        block.sof_peak_charge_ma = sof.peak_charge_ma;
        telemetry.write_sox(block);
    }
}
