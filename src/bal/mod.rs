//! Balancing Engine (BAL). See §4.4.

pub mod context;
pub mod state;

pub use context::{BalContext, BalSubstate, CellSnapshot};
pub use state::{BalEngine, BalRequest, BalState};
