//! Fixed-period tick scheduler.
//!
//! Determines which of BAL's 1 ms, BMS's 10 ms, and SOX's 100 ms
//! triggers are due at a given timestamp, in priority order, mirroring
//! `enginetask_cfg.c`'s `ENG_Cyclic_{1,10,100}ms` split (§5: "a fixed
//! tick source... triggers component `Trigger` entry points in
//! priority order"). Reimplements the teacher's `scheduler.rs`
//! table-driven delegate idiom as plain fixed-period dispatch: no
//! quiet hours, no boost mode, no one-shot timers — none of those have
//! a counterpart in this spec, only the "decide what's due, let the
//! caller drive it" shape survives.

use super::ports::ClockPort;

/// Which cadences are due at a given tick, in priority order — the
/// balancer (1 ms) is checked first, the estimator (100 ms) last.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickDue {
    pub bal_1ms: bool,
    pub bms_10ms: bool,
    pub sox_100ms: bool,
}

/// Computes which periodic triggers are due from a monotonic clock.
/// Does not itself own the clock or call into [`super::service::BmsService`]
/// — the caller (embedded main loop, or a test harness) reads
/// [`TickDue`] and invokes `trigger_1ms`/`trigger_10ms`/`trigger_100ms`
/// in that priority order.
pub struct TickScheduler {
    bal_period_ms: u32,
    bms_period_ms: u32,
    sox_period_ms: u32,
    last_bal_ms: Option<u32>,
    last_bms_ms: Option<u32>,
    last_sox_ms: Option<u32>,
}

impl TickScheduler {
    /// Build a scheduler from each component's period. Periods are
    /// fixed at 1/10/100 ms by the platform (§2), but are taken from
    /// config here rather than hard-coded, matching
    /// `SystemConfig::{bal,bms,sox}_tick_ms`.
    pub fn new(bal_period_ms: u32, bms_period_ms: u32, sox_period_ms: u32) -> Self {
        Self {
            bal_period_ms,
            bms_period_ms,
            sox_period_ms,
            last_bal_ms: None,
            last_bms_ms: None,
            last_sox_ms: None,
        }
    }

    /// Check which cadences are due at `now_ms`, marking any due
    /// cadence as serviced. The first call at any timestamp always
    /// reports every cadence due (cold start).
    pub fn due(&mut self, now_ms: u32) -> TickDue {
        TickDue {
            bal_1ms: Self::poll(&mut self.last_bal_ms, self.bal_period_ms, now_ms),
            bms_10ms: Self::poll(&mut self.last_bms_ms, self.bms_period_ms, now_ms),
            sox_100ms: Self::poll(&mut self.last_sox_ms, self.sox_period_ms, now_ms),
        }
    }

    /// Convenience wrapper over [`due`](Self::due) reading the
    /// timestamp from a [`ClockPort`] (`MCU.GetTimeStamp()`, §6).
    pub fn due_from_clock(&mut self, clock: &impl ClockPort) -> TickDue {
        self.due(clock.now_ms())
    }

    fn poll(last: &mut Option<u32>, period_ms: u32, now_ms: u32) -> bool {
        match *last {
            None => {
                *last = Some(now_ms);
                true
            }
            Some(prev) if now_ms.saturating_sub(prev) >= period_ms => {
                *last = Some(now_ms);
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_poll_fires_every_cadence() {
        let mut sched = TickScheduler::new(1, 10, 100);
        let due = sched.due(0);
        assert!(due.bal_1ms);
        assert!(due.bms_10ms);
        assert!(due.sox_100ms);
    }

    #[test]
    fn cadences_fire_at_their_own_period() {
        let mut sched = TickScheduler::new(1, 10, 100);
        sched.due(0);

        let due_at_1 = sched.due(1);
        assert!(due_at_1.bal_1ms);
        assert!(!due_at_1.bms_10ms);
        assert!(!due_at_1.sox_100ms);

        let due_at_10 = sched.due(10);
        assert!(due_at_10.bal_1ms);
        assert!(due_at_10.bms_10ms);
        assert!(!due_at_10.sox_100ms);

        let due_at_100 = sched.due(100);
        assert!(due_at_100.bal_1ms);
        assert!(due_at_100.bms_10ms);
        assert!(due_at_100.sox_100ms);
    }

    #[test]
    fn sub_period_ticks_never_fire() {
        let mut sched = TickScheduler::new(1, 10, 100);
        sched.due(0);
        let due = sched.due(5);
        assert!(!due.bms_10ms, "5 ms < 10 ms period, must not fire yet");
    }

    struct FixedClock(u32);
    impl ClockPort for FixedClock {
        fn now_ms(&self) -> u32 {
            self.0
        }
    }

    #[test]
    fn due_from_clock_reads_clock_port() {
        let mut sched = TickScheduler::new(1, 10, 100);
        let clock = FixedClock(0);
        let due = sched.due_from_clock(&clock);
        assert!(due.bal_1ms && due.bms_10ms && due.sox_100ms);
    }
}
