//! Sensor records exchanged with the reader process.

use std::fmt;

use serde::de::{self, Deserializer, IgnoredAny, MapAccess, Visitor};
use serde::{Deserialize, Serialize};

/// One sensor value as printed by the reader process.
///
/// Every field arrives as a JSON string, including `Value`. Keys match
/// case-insensitively, and a missing or `null` field stays empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SensorReading {
    #[serde(rename = "Id")]
    pub id: String,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Value")]
    pub value: String,
    /// Carried on the wire but not exported.
    #[serde(rename = "Unit")]
    pub unit: String,
}

impl<'de> Deserialize<'de> for SensorReading {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ReadingVisitor)
    }
}

struct ReadingVisitor;

impl<'de> Visitor<'de> for ReadingVisitor {
    type Value = SensorReading;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a sensor record object")
    }

    // A `null` record decodes to an empty one.
    fn visit_unit<E: de::Error>(self) -> Result<SensorReading, E> {
        Ok(SensorReading::default())
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<SensorReading, A::Error> {
        let mut reading = SensorReading::default();
        while let Some(key) = map.next_key::<String>()? {
            match reading.field_mut(&key) {
                Some(slot) => {
                    if let Some(value) = map.next_value::<Option<String>>()? {
                        *slot = value;
                    }
                }
                None => {
                    map.next_value::<IgnoredAny>()?;
                }
            }
        }
        Ok(reading)
    }
}

impl SensorReading {
    fn field_mut(&mut self, key: &str) -> Option<&mut String> {
        if key.eq_ignore_ascii_case("id") {
            Some(&mut self.id)
        } else if key.eq_ignore_ascii_case("name") {
            Some(&mut self.name)
        } else if key.eq_ignore_ascii_case("value") {
            Some(&mut self.value)
        } else if key.eq_ignore_ascii_case("unit") {
            Some(&mut self.unit)
        } else {
            None
        }
    }

    /// Numeric value of the reading, if it parses.
    pub fn numeric_value(&self) -> Option<f64> {
        parse_sensor_value(&self.value)
    }
}

/// Decode one response line into a batch of readings.
///
/// A top-level `null` decodes to an empty batch.
pub fn decode_batch(line: &[u8]) -> Result<Vec<SensorReading>, serde_json::Error> {
    serde_json::from_slice::<Option<Vec<SensorReading>>>(line).map(Option::unwrap_or_default)
}

/// Parse a sensor value with single-precision semantics.
///
/// The string is parsed as `f32` and widened, so `"245.3"` yields the
/// nearest `f32`. Finite values outside the `f32` range are rejected;
/// explicit infinities and NaN are kept.
pub fn parse_sensor_value(raw: &str) -> Option<f64> {
    let value = raw.parse::<f32>().ok()?;
    if value.is_infinite() && !spells_infinity(raw) {
        return None;
    }
    Some(f64::from(value))
}

fn spells_infinity(raw: &str) -> bool {
    let unsigned = raw.trim_start_matches(|c: char| c == '+' || c == '-');
    unsigned
        .get(..3)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("inf"))
}

/// Consumer of raw response lines.
///
/// The supervisor hands every successfully read line to a sink; the sink
/// owns decoding and error reporting.
pub trait ReportSink: Send + Sync {
    fn report(&self, line: &[u8]);
}
