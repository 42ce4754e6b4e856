//! gw-metrics — observability state for the GoodWe exporter.
//!
//! Folds sensor batches read from the reader process into a labelled
//! gauge vector and renders it in the Prometheus text exposition format.
//!
//! # Architecture
//!
//! ```text
//! SensorGauges (private Registry + gw_sensor{id, name} GaugeVec)
//!   ├── apply_line() ← called by the supervisor for every response line
//!   └── value()      → point reads for callers and tests
//!
//! Prometheus exposition
//!   └── render_prometheus() → text/plain for the /metrics endpoint
//! ```

pub mod collector;
pub mod exposition;

pub use collector::{BatchOutcome, SensorGauges};
pub use exposition::{render_prometheus, TEXT_CONTENT_TYPE};
