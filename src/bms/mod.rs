//! BMS Supervisor. See §4.5.

pub mod context;
pub mod state;

pub use context::{BmsContext, BmsSubstate, ContactorRequest, ContactorState, InterlockCommand};
pub use state::{BmsEngine, BmsRequest, BmsState};
