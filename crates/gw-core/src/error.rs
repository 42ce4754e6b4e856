//! Configuration error types.

use thiserror::Error;

/// Errors raised while loading the exporter configuration.
///
/// All of them are startup errors; the daemon exits instead of retrying.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid inverter IP address (env: INVERTER_IP) {0:?}")]
    InvalidInverterIp(String),
}
