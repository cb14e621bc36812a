//! Diagnosis Plane (DP).
//!
//! Debounces raw anomaly reports into latched `SystemState` error
//! flags, and monitors periodic-task liveness. See §4.2.

pub mod channels;
pub mod sysmon;

pub use channels::{Channel, DiagnosisPlane, Outcome};
pub use sysmon::{Module as SysmonModule, SysMon};
