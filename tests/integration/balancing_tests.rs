//! Balancing-activation integration scenario: an outlier cell gets
//! balanced down once the pack has rested long enough.

use crate::mock_hw::{FakeNvm, RecordingSink};

use bms_core::app::service::BmsService;
use bms_core::bal::BalState;
use bms_core::config::SystemConfig;

#[test]
fn outlier_cell_activates_after_rest_timer_elapses() {
    let mut config = SystemConfig::default();
    config.time_before_balancing_s = 1; // keep the test fast

    let nvm = FakeNvm::default();
    let mut service = BmsService::new(config.clone(), &nvm);
    let mut sink = RecordingSink::default();
    service.start(&mut sink);

    // Boot BAL to INACTIVE (UNINITIALIZED -> INITIALIZATION -> INITIALIZED -> INACTIVE).
    for i in 0..3 {
        service.trigger_1ms(i, &mut sink);
    }
    assert_eq!(service.bal_state(), BalState::Inactive);

    let mut cell_voltage = service.telemetry().read_cell_voltage();
    for v in cell_voltage.voltage_mv.iter_mut() {
        *v = 3000;
    }
    cell_voltage.voltage_mv[0] = 3000 + config.threshold_mv + config.hysteresis_mv + 1;
    service.telemetry().write_cell_voltage(cell_voltage);

    let mut min_max = service.telemetry().read_min_max();
    min_max.voltage_min_mv = 3000;
    service.telemetry().write_min_max(min_max);

    let mut current = service.telemetry().read_current();
    current.current_ma = 0;
    service.telemetry().write_current(current);

    // 1 s of rest at 1 ms ticks, plus margin, before balancing may activate.
    for i in 0..1_200u32 {
        service.trigger_1ms(3 + i, &mut sink);
    }

    assert_eq!(service.bal_state(), BalState::Active);
    let control = service.telemetry().read_balancing_control();
    assert!(control.enable[0], "the outlier cell must be selected for balancing");
    assert!(!control.enable[1], "a cell at the pack minimum must not be balanced");
}
