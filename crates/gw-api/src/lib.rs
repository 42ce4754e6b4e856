//! gw-api — HTTP surface of the GoodWe exporter.
//!
//! # Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | any | `/metrics` | Prometheus exposition of the sensor gauges |
//! | any | `/` | `307` redirect to `/metrics` |
//! | any | anything else | `403` with a fixed body |

pub mod handlers;

use std::sync::Arc;

use axum::routing::any;
use axum::Router;

use gw_core::METRICS_PATH;
use gw_metrics::SensorGauges;

/// Shared state for the handlers.
#[derive(Clone)]
pub struct ApiState {
    pub gauges: Arc<SensorGauges>,
}

/// Build the complete router.
pub fn build_router(gauges: Arc<SensorGauges>) -> Router {
    Router::new()
        .route(METRICS_PATH, any(handlers::prometheus_metrics))
        .fallback(handlers::fallback)
        .with_state(ApiState { gauges })
}
