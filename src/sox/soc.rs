//! SOC (state-of-charge) estimation: classic current integration when
//! no coulomb-counting sensor is present, or direct use of the
//! sensor's running ampere-second counter when one is. See spec.md
//! §4.3.
//!
//! (ADDED, spec.md §9 Design Notes) The no-counter path accumulates
//! charge in integer milliampere-milliseconds rather than repeatedly
//! subtracting a freshly computed floating-point `δSOC` from a
//! mutating percentage each tick; the percentage is derived from the
//! accumulator only when a reading is needed. This avoids the drift a
//! long-running float accumulator would otherwise pick up over a
//! multi-day mission without changing any observable behaviour.

use crate::app::ports::{NvmPort, SocTriplet};
use crate::config::SystemConfig;
use crate::telemetry::blocks::CurrentBlock;

#[derive(Debug, Clone, Copy)]
enum SocMode {
    /// No coulomb counter: integrate `current_ma * Δt_ms` ourselves.
    Integrating { accumulated_ma_ms: i64, last_seen_timestamp_ms: u32, seen_once: bool },
    /// Coulomb counter present: scale the sensor's running A·s counter.
    CoulombCounting { cc_scaling: f32, initialized: bool },
}

/// Tracks mean/min/max SOC (%) for the pack.
pub struct SocEstimator {
    base_mean_pct: f32,
    base_min_pct: f32,
    base_max_pct: f32,
    mean_pct: f32,
    min_pct: f32,
    max_pct: f32,
    mode: SocMode,
}

impl SocEstimator {
    /// Restore the persisted SOC triplet from NVM and pick the
    /// estimation mode from config.
    pub fn new(config: &SystemConfig, nvm: &impl NvmPort) -> Self {
        let triplet = nvm.get_soc();
        let mode = if config.coulomb_counter_present {
            SocMode::CoulombCounting { cc_scaling: 0.0, initialized: false }
        } else {
            SocMode::Integrating { accumulated_ma_ms: 0, last_seen_timestamp_ms: 0, seen_once: false }
        };
        Self {
            base_mean_pct: triplet.mean_pct,
            base_min_pct: triplet.min_pct,
            base_max_pct: triplet.max_pct,
            mean_pct: triplet.mean_pct,
            min_pct: triplet.min_pct,
            max_pct: triplet.max_pct,
            mode,
        }
    }

    pub fn mean_pct(&self) -> f32 {
        self.mean_pct
    }

    pub fn min_pct(&self) -> f32 {
        self.min_pct
    }

    pub fn max_pct(&self) -> f32 {
        self.max_pct
    }

    /// Advance the estimate from the latest `Current` telemetry and
    /// persist the result. A no-op unless `current.ts.timestamp_ms`
    /// has advanced since the last call (per spec.md §4.3: "on every
    /// tick where `current.timestamp` advanced").
    pub fn tick(&mut self, current: &CurrentBlock, config: &SystemConfig, nvm: &mut impl NvmPort) {
        match &mut self.mode {
            SocMode::Integrating { accumulated_ma_ms, last_seen_timestamp_ms, seen_once } => {
                if *seen_once && current.ts.timestamp_ms == *last_seen_timestamp_ms {
                    return;
                }
                let delta_ms = current.ts.timestamp_ms.saturating_sub(current.ts.previous_timestamp_ms);
                *accumulated_ma_ms += i64::from(current.current_ma) * i64::from(delta_ms);
                *last_seen_timestamp_ms = current.ts.timestamp_ms;
                *seen_once = true;

                let capacity_mah = f64::from(config.bc_capacity_mah);
                let delta_soc_pct = (*accumulated_ma_ms as f64) / 3_600_000.0 / capacity_mah * 100.0;

                self.mean_pct = saturate(self.base_mean_pct as f64 - delta_soc_pct);
                self.min_pct = saturate(self.base_min_pct as f64 - delta_soc_pct);
                self.max_pct = saturate(self.base_max_pct as f64 - delta_soc_pct);
            }
            SocMode::CoulombCounting { cc_scaling, initialized } => {
                let capacity_as = f64::from(config.bc_capacity_mah) / 1000.0 * 3600.0;
                let scale = 100.0 / capacity_as;
                if !*initialized {
                    *cc_scaling = (f64::from(self.base_mean_pct) + scale * current.charge_counter_as as f64) as f32;
                    *initialized = true;
                }
                let mean = f64::from(*cc_scaling) - scale * current.charge_counter_as as f64;
                self.mean_pct = saturate(mean);
                self.min_pct = self.mean_pct;
                self.max_pct = self.mean_pct;
            }
        }

        nvm.set_soc(SocTriplet { mean_pct: self.mean_pct, min_pct: self.min_pct, max_pct: self.max_pct });
    }
}

/// Clamp to `[0, 100]` per spec.md §3's `0 ≤ soc_* ≤ 100` invariant.
fn saturate(pct: f64) -> f32 {
    pct.clamp(0.0, 100.0) as f32
}
