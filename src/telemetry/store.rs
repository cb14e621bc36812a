//! The telemetry store: a compile-time-keyed collection of locked
//! blocks, one accessor per record type, replacing the source's
//! integer-block-ID `DATA_GetTable` lookup with a statically typed
//! field per §9.
//!
//! Every block gets its own `parking_lot::Mutex` (the short critical
//! section from §4.1's "guarded by a short critical section" — the
//! "DOUBLE" buffering policy is satisfied trivially here because a
//! `Mutex<T>` already hands the reader a cloned, fully-formed snapshot
//! with no possibility of observing a partial write, for SINGLE- and
//! DOUBLE-buffered blocks alike).

use parking_lot::Mutex;

use super::blocks::{
    BalancingControlBlock, CellTemperatureBlock, CellVoltageBlock, ContactorFeedbackBlock,
    CurrentBlock, InterlockFeedbackBlock, MinMaxBlock, SoxBlock, StateRequestBlock,
    SystemStateBlock,
};

/// One lock-guarded slot per telemetry block. `read`/`write` never fail.
#[derive(Default)]
pub struct TelemetryStore {
    cell_voltage: Mutex<CellVoltageBlock>,
    cell_temperature: Mutex<CellTemperatureBlock>,
    current: Mutex<CurrentBlock>,
    min_max: Mutex<MinMaxBlock>,
    sox: Mutex<SoxBlock>,
    balancing_control: Mutex<BalancingControlBlock>,
    state_request: Mutex<StateRequestBlock>,
    system_state: Mutex<SystemStateBlock>,
    contactor_feedback: Mutex<ContactorFeedbackBlock>,
    interlock_feedback: Mutex<InterlockFeedbackBlock>,
}

/// Defines one `read_x`/`write_x` accessor pair for a telemetry block.
macro_rules! block_accessor {
    ($field:ident, $ty:ty, $read:ident, $write:ident) => {
        /// Copy the current committed snapshot. Never fails; returns the
        /// zero record if never written.
        pub fn $read(&self) -> $ty {
            *self.$field.lock()
        }

        /// Commit the full record atomically.
        pub fn $write(&self, record: $ty) {
            *self.$field.lock() = record;
        }
    };
}

impl TelemetryStore {
    pub fn new() -> Self {
        Self::default()
    }

    block_accessor!(cell_voltage, CellVoltageBlock, read_cell_voltage, write_cell_voltage);
    block_accessor!(
        cell_temperature,
        CellTemperatureBlock,
        read_cell_temperature,
        write_cell_temperature
    );
    block_accessor!(current, CurrentBlock, read_current, write_current);
    block_accessor!(min_max, MinMaxBlock, read_min_max, write_min_max);
    block_accessor!(sox, SoxBlock, read_sox, write_sox);
    block_accessor!(
        state_request,
        StateRequestBlock,
        read_state_request,
        write_state_request
    );
    block_accessor!(
        system_state,
        SystemStateBlock,
        read_system_state,
        write_system_state
    );
    block_accessor!(
        contactor_feedback,
        ContactorFeedbackBlock,
        read_contactor_feedback,
        write_contactor_feedback
    );
    block_accessor!(
        interlock_feedback,
        InterlockFeedbackBlock,
        read_interlock_feedback,
        write_interlock_feedback
    );

    /// `BalancingControlBlock` doesn't fit the `Copy` macro above (it
    /// embeds a `heapless::Vec`), so its accessors are written out by hand.
    pub fn read_balancing_control(&self) -> BalancingControlBlock {
        self.balancing_control.lock().clone()
    }

    pub fn write_balancing_control(&self, record: BalancingControlBlock) {
        *self.balancing_control.lock() = record;
    }
}
