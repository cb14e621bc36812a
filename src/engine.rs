//! Function-pointer finite state machine engine.
//!
//! Classic embedded FSM pattern, generalized so both the balancing
//! engine and the BMS supervisor can instantiate their own state table
//! over their own context type:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  StateTable<S, Ctx, N>                                   │
//! │  ┌────────┬───────────┬──────────┬───────────────────┐   │
//! │  │ S       │ on_enter  │ on_exit  │ on_update         │   │
//! │  ├────────┼───────────┼──────────┼───────────────────┤   │
//! │  │ ...     │ fn(ctx)   │ fn(ctx)  │ fn(ctx)->Option<> │   │
//! │  └────────┴───────────┴──────────┴───────────────────┘   │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Each tick the engine calls `on_update` for the **current** state. If
//! it returns `Some(next)`, the engine runs `on_exit` for the current
//! state, then `on_enter` for the next, and updates the current index.
//! All handlers receive `&mut Ctx`.

use log::info;

/// A state identity usable as a row index into a fixed-size table.
pub trait StateId: Copy + Eq + core::fmt::Debug {
    /// Convert this state to its table row index.
    fn index(self) -> usize;
}

/// Signature for `on_enter` and `on_exit` actions. Run exactly once on
/// each state transition.
pub type StateActionFn<Ctx> = fn(&mut Ctx);

/// Signature for the per-tick update handler. Returns `Some(next)` to
/// trigger a transition, or `None` to stay.
pub type StateUpdateFn<S, Ctx> = fn(&mut Ctx) -> Option<S>;

/// Static descriptor for a single engine state. Stored in a fixed-size
/// array — no heap, no `dyn`.
pub struct StateDescriptor<S, Ctx> {
    pub id: S,
    pub name: &'static str,
    pub on_enter: Option<StateActionFn<Ctx>>,
    pub on_exit: Option<StateActionFn<Ctx>>,
    pub on_update: StateUpdateFn<S, Ctx>,
}

/// The finite state machine engine.
///
/// Owns the state table (array of [`StateDescriptor`]) and drives a
/// mutable context through every handler call. `N` must equal the
/// number of rows in `table` (enforced by construction, not by the
/// type system, since `S`'s variant count is not itself a const
/// generic).
pub struct StateMachine<S, Ctx, const N: usize> {
    table: [StateDescriptor<S, Ctx>; N],
    current: usize,
    tick_count: u64,
    state_entry_tick: u64,
}

impl<S, Ctx, const N: usize> StateMachine<S, Ctx, N>
where
    S: StateId,
{
    /// Construct a new engine with the given state table, starting in `initial`.
    pub fn new(table: [StateDescriptor<S, Ctx>; N], initial: S) -> Self {
        Self {
            table,
            current: initial.index(),
            tick_count: 0,
            state_entry_tick: 0,
        }
    }

    /// Run the initial `on_enter` for the starting state. Call once
    /// after construction, before the first `tick()`.
    pub fn start(&mut self, ctx: &mut Ctx) {
        info!("engine starting in state: {}", self.table[self.current].name);
        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }

    /// Advance the engine by one tick: run `on_update` for the current
    /// state and, if it requests a transition, run the exit/enter pair.
    pub fn tick(&mut self, ctx: &mut Ctx) -> u64 {
        self.tick_count += 1;
        let ticks_in_state = self.tick_count - self.state_entry_tick;

        let next = (self.table[self.current].on_update)(ctx);
        if let Some(next_id) = next {
            self.transition(next_id, ctx);
        }

        ticks_in_state
    }

    /// Force an immediate transition, bypassing `on_update` (used when an
    /// always-accepted request, e.g. `ERROR_REQUEST`, must preempt
    /// whatever the current state's handler would otherwise decide).
    pub fn force_transition(&mut self, next: S, ctx: &mut Ctx) {
        if next.index() != self.current {
            self.transition(next, ctx);
        }
    }

    /// The current state's identity.
    pub fn current_state(&self) -> S {
        self.table[self.current].id
    }

    /// How many ticks the engine has been in the current state.
    pub fn ticks_in_current_state(&self) -> u64 {
        self.tick_count - self.state_entry_tick
    }

    /// Total ticks the engine has processed since construction.
    pub fn total_ticks(&self) -> u64 {
        self.tick_count
    }

    fn transition(&mut self, next_id: S, ctx: &mut Ctx) {
        let next_idx = next_id.index();

        info!(
            "engine transition: {} -> {}",
            self.table[self.current].name, self.table[next_idx].name
        );

        if let Some(exit) = self.table[self.current].on_exit {
            exit(ctx);
        }

        self.current = next_idx;
        self.state_entry_tick = self.tick_count;

        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Toy {
        A,
        B,
    }

    impl StateId for Toy {
        fn index(self) -> usize {
            self as usize
        }
    }

    struct ToyCtx {
        flips: u32,
    }

    fn a_update(ctx: &mut ToyCtx) -> Option<Toy> {
        if ctx.flips > 0 {
            Some(Toy::B)
        } else {
            None
        }
    }

    fn b_update(_ctx: &mut ToyCtx) -> Option<Toy> {
        None
    }

    fn table() -> [StateDescriptor<Toy, ToyCtx>; 2] {
        [
            StateDescriptor { id: Toy::A, name: "A", on_enter: None, on_exit: None, on_update: a_update },
            StateDescriptor { id: Toy::B, name: "B", on_enter: None, on_exit: None, on_update: b_update },
        ]
    }

    #[test]
    fn stays_until_condition_met() {
        let mut sm = StateMachine::new(table(), Toy::A);
        let mut ctx = ToyCtx { flips: 0 };
        sm.start(&mut ctx);
        sm.tick(&mut ctx);
        assert_eq!(sm.current_state(), Toy::A);

        ctx.flips = 1;
        sm.tick(&mut ctx);
        assert_eq!(sm.current_state(), Toy::B);
    }

    #[test]
    fn force_transition_is_a_noop_for_current_state() {
        let mut sm = StateMachine::new(table(), Toy::A);
        let mut ctx = ToyCtx { flips: 0 };
        sm.start(&mut ctx);
        sm.force_transition(Toy::A, &mut ctx);
        assert_eq!(sm.ticks_in_current_state(), 0);
    }
}
