//! Outbound application events.
//!
//! [`BmsService`](super::service::BmsService) emits these through the
//! [`EventSink`](super::ports::EventSink)-shaped callback passed to its
//! trigger entry points. Adapters on the other side decide what to do
//! with them — log, publish over CAN, surface to a UI.

use crate::bal::BalState;
use crate::bms::BmsState;
use crate::diagnosis::Channel;

/// Structured events emitted by the application core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEvent {
    /// The BMS supervisor transitioned between top-level states.
    BmsStateChanged { from: BmsState, to: BmsState },
    /// The balancing engine transitioned between top-level states.
    BalStateChanged { from: BalState, to: BalState },
    /// A diagnosis channel latched, forcing `general_error` on.
    FaultLatched(Channel),
    /// A diagnosis channel was explicitly reset.
    FaultCleared(Channel),
}
