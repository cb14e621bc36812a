//! `TickScheduler` driving the real [`BmsService`] end to end, in place
//! of the hand-rolled `run_bms_ticks`-style loops the other integration
//! modules use — this exercises the scheduler against live triggers
//! instead of a toy FSM.

use crate::mock_hw::{FakeContactor, FakeInterlock, FakeNvm, RecordingSink};

use bms_core::app::scheduler::TickScheduler;
use bms_core::app::service::BmsService;
use bms_core::bms::BmsState;
use bms_core::config::SystemConfig;

#[test]
fn scheduler_drives_service_from_cold_boot_to_idle() {
    let nvm = FakeNvm::default();
    let mut service = BmsService::new(SystemConfig::default(), &nvm);
    let mut sink = RecordingSink::default();
    service.start(&mut sink);

    let mut contactor = FakeContactor::default();
    let mut interlock = FakeInterlock::default();
    let mut nvm = nvm;
    let mut sched = TickScheduler::new(1, 10, 100);

    assert_eq!(service.bms_state(), BmsState::Uninitialized);

    // Drive 100 ms of wall-clock one millisecond at a time; the
    // scheduler alone decides which cadence(s) fire on each tick.
    for now_ms in 0..=100u32 {
        let due = sched.due(now_ms);
        if due.bal_1ms {
            service.trigger_1ms(now_ms, &mut sink);
        }
        if due.bms_10ms {
            service.trigger_10ms(now_ms, &mut contactor, &mut interlock, &mut sink);
            contactor.confirm_last_request();
        }
        if due.sox_100ms {
            service.trigger_100ms(now_ms, &mut nvm);
        }
    }

    assert_eq!(service.bms_state(), BmsState::Idle);
}

#[test]
fn scheduler_never_fires_a_cadence_off_its_own_period() {
    let mut sched = TickScheduler::new(1, 10, 100);
    let mut bms_fires = 0u32;
    let mut sox_fires = 0u32;

    for now_ms in 0..=1000u32 {
        let due = sched.due(now_ms);
        if due.bms_10ms {
            bms_fires += 1;
        }
        if due.sox_100ms {
            sox_fires += 1;
        }
    }

    // Cold-start tick at 0 counts once, then every period thereafter:
    // 10 ms over [0, 1000] -> 101 fires; 100 ms over [0, 1000] -> 11 fires.
    assert_eq!(bms_fires, 101);
    assert_eq!(sox_fires, 11);
}
