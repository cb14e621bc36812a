//! Periodic-task liveness monitor.
//!
//! Mirrors `diag_sysmon_ch_cfg[]`: one row per monitored periodic task,
//! each with a deadline in milliseconds. `notify` records the last time
//! a module was seen alive; `sweep` compares the current time against
//! each deadline and reports a miss, which the caller latches into
//! `ErrorFlags::sysmon_timeout` and `general_error` via
//! `DiagnosisPlane::notify(Channel::Pec, ..)`-style handling — here
//! exposed directly since sysmon has no debounce (a single missed
//! deadline is itself the fault).

use log::error;

/// The closed set of periodically monitored modules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Module {
    Bal1ms = 0,
    Bms10ms = 1,
    Sox100ms = 2,
}

impl Module {
    pub const COUNT: usize = 3;

    fn index(self) -> usize {
        self as usize
    }

    fn name(self) -> &'static str {
        match self {
            Self::Bal1ms => "bal_1ms",
            Self::Bms10ms => "bms_10ms",
            Self::Sox100ms => "sox_100ms",
        }
    }
}

/// Per-module liveness tracking: last-alive timestamp plus its deadline.
#[derive(Debug, Clone, Copy)]
struct ModuleState {
    last_alive_ms: u32,
    deadline_ms: u32,
    missed: bool,
}

/// The sysmon liveness sweep, run from the lowest-latency periodic task
/// (the 1 ms trigger) per §4.2.
pub struct SysMon {
    modules: [ModuleState; Module::COUNT],
}

impl SysMon {
    pub fn new(deadlines_ms: [u32; Module::COUNT]) -> Self {
        let modules = core::array::from_fn(|i| ModuleState {
            last_alive_ms: 0,
            deadline_ms: deadlines_ms[i],
            missed: false,
        });
        Self { modules }
    }

    /// Record that `module` is alive as of `now_ms`.
    pub fn notify(&mut self, module: Module, now_ms: u32) {
        self.modules[module.index()].last_alive_ms = now_ms;
    }

    /// Sweep every module for a missed deadline. Returns `true` if any
    /// module is newly (or still) in violation.
    pub fn sweep(&mut self, now_ms: u32) -> bool {
        let mut any_timeout = false;
        for (i, state) in self.modules.iter_mut().enumerate() {
            let elapsed = now_ms.saturating_sub(state.last_alive_ms);
            let module = match i {
                0 => Module::Bal1ms,
                1 => Module::Bms10ms,
                _ => Module::Sox100ms,
            };
            if elapsed > state.deadline_ms {
                if !state.missed {
                    error!("sysmon deadline miss: {} ({} ms elapsed, deadline {} ms)", module.name(), elapsed, state.deadline_ms);
                }
                state.missed = true;
                any_timeout = true;
            } else {
                state.missed = false;
            }
        }
        any_timeout
    }
}
