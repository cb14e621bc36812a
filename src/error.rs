//! Unified error types for the BMS control core.
//!
//! A single `Error` enum that every subsystem can convert into, keeping
//! the top-level tick entry points' error handling uniform. All variants
//! are `Copy` so they can be cheaply passed through the diagnosis plane
//! and the state machines without allocation.

use core::fmt;

/// Every fallible operation in the core funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Telemetry plane misuse (unknown block ID) — a programming bug, fatal.
    Telemetry(TelemetryError),
    /// Diagnosis plane misuse (unknown channel or module ID).
    Diagnosis(DiagnosisError),
    /// Balancing engine rejected a state request or mailbox operation.
    Bal(BalError),
    /// BMS supervisor rejected a state request.
    Bms(BmsError),
    /// SOX estimator could not produce a value (currently infallible by design).
    Sox(SoxError),
    /// A collaborator behind a port trait violated its contract.
    Port(PortError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Telemetry(e) => write!(f, "telemetry: {e}"),
            Self::Diagnosis(e) => write!(f, "diagnosis: {e}"),
            Self::Bal(e) => write!(f, "balancing: {e}"),
            Self::Bms(e) => write!(f, "supervisor: {e}"),
            Self::Sox(e) => write!(f, "sox: {e}"),
            Self::Port(e) => write!(f, "port: {e}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Telemetry plane errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelemetryError {
    /// A block ID was requested that has no backing slot. Per spec this is
    /// a programming bug and the caller should treat it as fatal.
    UnknownBlock,
}

impl fmt::Display for TelemetryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownBlock => write!(f, "unknown telemetry block id"),
        }
    }
}

impl From<TelemetryError> for Error {
    fn from(e: TelemetryError) -> Self {
        Self::Telemetry(e)
    }
}

// ---------------------------------------------------------------------------
// Diagnosis plane errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosisError {
    /// Channel index out of range of the fixed channel table.
    UnknownChannel,
    /// Sysmon module ID out of range of the fixed sysmon table.
    UnknownModule,
}

impl fmt::Display for DiagnosisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownChannel => write!(f, "unknown diagnosis channel"),
            Self::UnknownModule => write!(f, "unknown sysmon module"),
        }
    }
}

impl From<DiagnosisError> for Error {
    fn from(e: DiagnosisError) -> Self {
        Self::Diagnosis(e)
    }
}

// ---------------------------------------------------------------------------
// Balancing engine errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalError {
    /// A state request was posted while one was already pending in the
    /// mailbox; the new request is dropped (counted, not latched).
    RequestInboxFull,
    /// The requested transition is illegal from the current state.
    IllegalTransition,
}

impl fmt::Display for BalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RequestInboxFull => write!(f, "request inbox full"),
            Self::IllegalTransition => write!(f, "illegal state transition"),
        }
    }
}

impl From<BalError> for Error {
    fn from(e: BalError) -> Self {
        Self::Bal(e)
    }
}

// ---------------------------------------------------------------------------
// BMS supervisor errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BmsError {
    /// A state request was posted while one was already pending.
    RequestInboxFull,
    /// The requested transition is illegal from the current state.
    IllegalTransition,
}

impl fmt::Display for BmsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RequestInboxFull => write!(f, "request inbox full"),
            Self::IllegalTransition => write!(f, "illegal state transition"),
        }
    }
}

impl From<BmsError> for Error {
    fn from(e: BmsError) -> Self {
        Self::Bms(e)
    }
}

// ---------------------------------------------------------------------------
// SOX estimator errors
// ---------------------------------------------------------------------------

/// Reserved for future use — per spec.md §4.3, none of SOX's operations
/// currently fail; saturation is unconditional and inputs are read-through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoxError {}

impl fmt::Display for SoxError {
    fn fmt(&self, _f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {}
    }
}

impl From<SoxError> for Error {
    fn from(e: SoxError) -> Self {
        Self::Sox(e)
    }
}

// ---------------------------------------------------------------------------
// Port boundary errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortError {
    /// The NVM collaborator failed to return a persisted SOC triplet.
    NvmReadFailed,
    /// The NVM collaborator failed to persist a SOC triplet.
    NvmWriteFailed,
    /// A CAN request surface value was outside its closed enumeration.
    InvalidRequestCode,
}

impl fmt::Display for PortError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NvmReadFailed => write!(f, "NVM read failed"),
            Self::NvmWriteFailed => write!(f, "NVM write failed"),
            Self::InvalidRequestCode => write!(f, "invalid request code"),
        }
    }
}

impl From<PortError> for Error {
    fn from(e: PortError) -> Self {
        Self::Port(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
