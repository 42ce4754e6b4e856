//! Prometheus text exposition format.
//!
//! Renders the sensor gauges, and on Linux the process collector, for
//! scraping by a Prometheus server or compatible agent.

use prometheus::{Encoder, TextEncoder};

use crate::collector::SensorGauges;

/// Content type of the text exposition format.
pub const TEXT_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Render every registered metric into Prometheus text format.
pub fn render_prometheus(gauges: &SensorGauges) -> anyhow::Result<String> {
    let families = gauges.registry().gather();
    let mut buf = Vec::new();
    TextEncoder::new().encode(&families, &mut buf)?;
    Ok(String::from_utf8(buf)?)
}
