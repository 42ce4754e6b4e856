//! gw-core — shared building blocks for the GoodWe exporter.
//!
//! Holds the protocol constants, the environment-driven
//! [`ExporterConfig`], the [`SensorReading`] record decoded from the
//! reader process, and the [`ReportSink`] seam that connects the
//! supervisor to the metrics sink.

pub mod config;
pub mod error;
pub mod types;

use std::time::Duration;

pub use config::ExporterConfig;
pub use error::ConfigError;
pub use types::*;

/// Path of the Prometheus scrape endpoint.
pub const METRICS_PATH: &str = "/metrics";

/// Port used when `METRICS_PORT` is absent or unusable.
pub const DEFAULT_METRICS_PORT: u16 = 2112;

/// Reader executable, relative to the working directory.
pub const DEFAULT_SCRIPT_PATH: &str = "scripts/gw";

/// Interval between sensor requests, also used as the restart cooldown.
pub const REPORT_INTERVAL: Duration = Duration::from_secs(5);

/// Request line written to the reader process on every tick.
pub const GET_SENSORS_COMMAND: &[u8] = b"get_sensors\n";

/// Name of the exported sensor gauge.
pub const SENSOR_METRIC_NAME: &str = "gw_sensor";

/// Help text of the exported sensor gauge.
pub const SENSOR_METRIC_HELP: &str = "GoodWe sensors";

/// Label names of the exported sensor gauge, in order.
pub const SENSOR_METRIC_LABELS: [&str; 2] = ["id", "name"];

/// Body returned for every path other than `/` and `/metrics`.
pub const FORBIDDEN_BODY: &str = "403 HTTP status code returned!";
