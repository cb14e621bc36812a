//! Inbound commands to the application service.
//!
//! These represent the command/request surface of spec.md §6 — what
//! the external CAN decoder posts, plus the explicit fault-remediation
//! `RESET` notifications described in §7. [`BmsService`](super::service::BmsService)
//! interprets and forwards them to the relevant component's mailbox.

use crate::diagnosis::Channel;
use crate::telemetry::blocks::{BalExternalRequest, SupervisorExternalRequest};

/// Commands that an external adapter (CAN decoder, test harness) can
/// send into the application core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppCommand {
    /// Top-level mode request for the BMS supervisor (§6).
    SupervisorRequest(SupervisorExternalRequest),
    /// Balancing override request for BAL (§6).
    BalancingRequest(BalExternalRequest),
    /// Explicit `RESET` notification on a diagnosis channel, per §7 —
    /// the only way to clear a latched error flag once remediated.
    DiagReset(Channel),
}
