//! Environment configuration.
//!
//! The exporter is configured through two environment variables:
//!
//! | Variable | Required | Meaning |
//! |---|---|---|
//! | `INVERTER_IP` | yes | Inverter address handed to the reader process. |
//! | `METRICS_PORT` | no | Port of the scrape endpoint, default `2112`. |

use std::net::IpAddr;
use std::path::PathBuf;

use crate::error::ConfigError;
use crate::{DEFAULT_METRICS_PORT, DEFAULT_SCRIPT_PATH};

pub const INVERTER_IP_VAR: &str = "INVERTER_IP";
pub const METRICS_PORT_VAR: &str = "METRICS_PORT";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExporterConfig {
    /// Validated inverter address. Only forwarded to the reader process.
    pub inverter_ip: IpAddr,
    /// Port the scrape endpoint listens on.
    pub metrics_port: u16,
    /// Reader executable spawned by the supervisor.
    pub script_path: PathBuf,
}

impl ExporterConfig {
    /// Load the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load the configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw_ip = lookup(INVERTER_IP_VAR).unwrap_or_default();
        let inverter_ip = raw_ip
            .parse::<IpAddr>()
            .map_err(|_| ConfigError::InvalidInverterIp(raw_ip.clone()))?;

        let metrics_port = lookup(METRICS_PORT_VAR)
            .as_deref()
            .and_then(parse_port)
            .unwrap_or(DEFAULT_METRICS_PORT);

        Ok(Self {
            inverter_ip,
            metrics_port,
            script_path: PathBuf::from(DEFAULT_SCRIPT_PATH),
        })
    }

    /// Replace the reader executable.
    pub fn with_script_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.script_path = path.into();
        self
    }
}

/// Parse an unsigned decimal port. Signs, whitespace and overflow are rejected.
fn parse_port(s: &str) -> Option<u16> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse::<u16>().ok()
}
