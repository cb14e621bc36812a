//! Telemetry Plane (TP).
//!
//! A process-wide mapping from a small closed set of block identifiers
//! to fixed-shape telemetry records, providing consistent read/write
//! snapshots for every other component. See §4.1.

pub mod blocks;
pub mod store;

pub use store::TelemetryStore;
