//! SOF (state-of-function) derating: four output currents, each the
//! pointwise minimum of three independently computed curves (voltage,
//! SOC, temperature). See spec.md §4.3.

use crate::config::SofCurveConfig;

use super::curve::DeratingCurve;

/// The four SOF outputs, in milliamps.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SofOutputs {
    pub continuous_discharge_ma: f32,
    pub peak_discharge_ma: f32,
    pub continuous_charge_ma: f32,
    pub peak_charge_ma: f32,
}

impl SofOutputs {
    /// All outputs forced to zero — the contactor-open special case.
    pub const fn zero() -> Self {
        Self {
            continuous_discharge_ma: 0.0,
            peak_discharge_ma: 0.0,
            continuous_charge_ma: 0.0,
            peak_charge_ma: 0.0,
        }
    }
}

/// All twelve precomputed curves (voltage/soc/temperature × cont./peak
/// × charge/discharge collapse down to six curve *shapes*, each reused
/// at both continuous and peak rating).
pub struct SofCurves {
    voltage_discharge: DeratingCurve,
    voltage_charge: DeratingCurve,
    soc_discharge: DeratingCurve,
    soc_charge: DeratingCurve,
    temperature_discharge: DeratingCurve,
    temperature_charge: DeratingCurve,

    i_discharge_max_cont_ma: f32,
    i_discharge_max_peak_ma: f32,
    i_charge_max_cont_ma: f32,
    i_charge_max_peak_ma: f32,
}

impl SofCurves {
    /// Precompute every curve's slope/offset once, at `SOF_Init` time.
    pub fn new(cfg: &SofCurveConfig) -> Self {
        Self {
            // Preserved from the source (spec.md §9): the voltage-based
            // discharge curve's coefficients are computed from the SOC
            // discharge curve's limit/cutoff pair instead of its own —
            // a likely copy-paste error in the originating platform,
            // kept verbatim rather than silently fixed. The curve is
            // still *evaluated* against the voltage input; only its
            // slope/offset are borrowed from the wrong point.
            voltage_discharge: DeratingCurve::new_with_borrowed_coefficients(
                cfg.voltage_discharge,
                cfg.soc_discharge,
                cfg.i_discharge_max_cont_ma,
            ),
            voltage_charge: DeratingCurve::new(cfg.voltage_charge, cfg.i_charge_max_cont_ma),
            soc_discharge: DeratingCurve::new(cfg.soc_discharge, cfg.i_discharge_max_cont_ma),
            soc_charge: DeratingCurve::new(cfg.soc_charge, cfg.i_charge_max_cont_ma),
            temperature_discharge: DeratingCurve::new(
                cfg.temperature_discharge,
                cfg.i_discharge_max_cont_ma,
            ),
            temperature_charge: DeratingCurve::new(cfg.temperature_charge, cfg.i_charge_max_cont_ma),

            i_discharge_max_cont_ma: cfg.i_discharge_max_cont_ma,
            i_discharge_max_peak_ma: cfg.i_discharge_max_peak_ma,
            i_charge_max_cont_ma: cfg.i_charge_max_cont_ma,
            i_charge_max_peak_ma: cfg.i_charge_max_peak_ma,
        }
    }

    /// Compute the four SOF outputs from the current voltage/SOC/
    /// temperature readings. Each output is the pointwise minimum of
    /// its three curves, scaled from the continuous rating up to the
    /// peak rating by the ratio of peak/continuous (so the curves only
    /// need to be evaluated once per direction).
    pub fn compute(&self, voltage_mv: f32, soc_pct: f32, temperature_c: f32) -> SofOutputs {
        let discharge_fraction = [
            self.voltage_discharge.evaluate(voltage_mv) / self.i_discharge_max_cont_ma,
            self.soc_discharge.evaluate(soc_pct) / self.i_discharge_max_cont_ma,
            self.temperature_discharge.evaluate(temperature_c) / self.i_discharge_max_cont_ma,
        ]
        .into_iter()
        .fold(f32::INFINITY, f32::min)
        .clamp(0.0, 1.0);

        let charge_fraction = [
            self.voltage_charge.evaluate(voltage_mv) / self.i_charge_max_cont_ma,
            self.soc_charge.evaluate(soc_pct) / self.i_charge_max_cont_ma,
            self.temperature_charge.evaluate(temperature_c) / self.i_charge_max_cont_ma,
        ]
        .into_iter()
        .fold(f32::INFINITY, f32::min)
        .clamp(0.0, 1.0);

        SofOutputs {
            continuous_discharge_ma: discharge_fraction * self.i_discharge_max_cont_ma,
            peak_discharge_ma: discharge_fraction * self.i_discharge_max_peak_ma,
            continuous_charge_ma: charge_fraction * self.i_charge_max_cont_ma,
            peak_charge_ma: charge_fraction * self.i_charge_max_peak_ma,
        }
    }
}
