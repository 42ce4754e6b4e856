//! Sensor gauge state: the latest value per (id, name).
//!
//! Gauges use set semantics, so replaying a batch never accumulates.
//! Series are created on first sight and never removed; a sensor that
//! disappears from the reader output keeps reporting its last value.

use gw_core::{
    decode_batch, ReportSink, SENSOR_METRIC_HELP, SENSOR_METRIC_LABELS, SENSOR_METRIC_NAME,
};
use prometheus::proto::MetricFamily;
use prometheus::{GaugeVec, Opts, Registry};
use tracing::{debug, error, info};

/// What happened to a single response line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOutcome {
    /// The line was not a JSON array of sensor records; nothing changed.
    Rejected,
    /// The line decoded; `applied` gauges were set and `skipped` records
    /// carried a non-numeric value.
    Applied { applied: usize, skipped: usize },
}

/// Process-wide gauge state, shared between the supervisor (writer) and
/// the scrape handler (reader).
///
/// Cloning is cheap; clones share the same registry.
#[derive(Clone)]
pub struct SensorGauges {
    registry: Registry,
    gauge: GaugeVec,
}

impl SensorGauges {
    /// Create an empty gauge set with its own registry.
    ///
    /// On Linux the registry also carries the `process_*` collector for
    /// this process (CPU, memory, file descriptors, start time).
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();
        let gauge = GaugeVec::new(
            Opts::new(SENSOR_METRIC_NAME, SENSOR_METRIC_HELP),
            &SENSOR_METRIC_LABELS,
        )?;
        registry.register(Box::new(gauge.clone()))?;

        #[cfg(target_os = "linux")]
        registry.register(Box::new(
            prometheus::process_collector::ProcessCollector::for_self(),
        ))?;

        Ok(Self { registry, gauge })
    }

    /// Decode one response line and fold it into the gauges.
    pub fn apply_line(&self, line: &[u8]) -> BatchOutcome {
        let readings = match decode_batch(line) {
            Ok(readings) => readings,
            Err(e) => {
                error!(
                    error = %e,
                    response = %String::from_utf8_lossy(line).trim_end(),
                    "error during json deserialization"
                );
                return BatchOutcome::Rejected;
            }
        };

        info!("received ok response from process");

        let mut applied = 0;
        let mut skipped = 0;
        for reading in &readings {
            match reading.numeric_value() {
                Some(value) => {
                    self.set(&reading.id, &reading.name, value);
                    applied += 1;
                }
                None => skipped += 1,
            }
        }

        debug!(applied, skipped, "sensor batch applied");
        BatchOutcome::Applied { applied, skipped }
    }

    /// Set the gauge for one sensor, replacing any previous value.
    pub fn set(&self, id: &str, name: &str, value: f64) {
        self.gauge.with_label_values(&[id, name]).set(value);
    }

    /// Current value for a sensor, or `None` if it was never set.
    pub fn value(&self, id: &str, name: &str) -> Option<f64> {
        self.sensor_family()?
            .get_metric()
            .iter()
            .find(|m| {
                let labels = m.get_label();
                label(labels, "id") == Some(id) && label(labels, "name") == Some(name)
            })
            .map(|m| m.get_gauge().get_value())
    }

    /// Number of (id, name) series currently exported.
    pub fn series_count(&self) -> usize {
        self.sensor_family()
            .map(|family| family.get_metric().len())
            .unwrap_or(0)
    }

    /// The registry backing the exposition endpoint.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    fn sensor_family(&self) -> Option<MetricFamily> {
        self.registry
            .gather()
            .into_iter()
            .find(|family| family.get_name() == SENSOR_METRIC_NAME)
    }
}

impl ReportSink for SensorGauges {
    fn report(&self, line: &[u8]) {
        self.apply_line(line);
    }
}

fn label<'a>(labels: &'a [prometheus::proto::LabelPair], name: &str) -> Option<&'a str> {
    labels
        .iter()
        .find(|pair| pair.get_name() == name)
        .map(|pair| pair.get_value())
}
