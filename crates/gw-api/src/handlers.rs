//! Request handlers.

use axum::extract::State;
use axum::http::{header, StatusCode, Uri};
use axum::response::{IntoResponse, Redirect, Response};
use tracing::error;

use gw_core::{FORBIDDEN_BODY, METRICS_PATH};
use gw_metrics::{render_prometheus, TEXT_CONTENT_TYPE};

use crate::ApiState;

/// GET /metrics: Prometheus text exposition.
pub async fn prometheus_metrics(State(state): State<ApiState>) -> Response {
    match render_prometheus(&state.gauges) {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, TEXT_CONTENT_TYPE)],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("error encoding metrics: {e}"),
            )
                .into_response()
        }
    }
}

/// Everything that is not `/metrics`: the root redirects, the rest is forbidden.
pub async fn fallback(uri: Uri) -> Response {
    if uri.path() == "/" {
        Redirect::temporary(METRICS_PATH).into_response()
    } else {
        (StatusCode::FORBIDDEN, FORBIDDEN_BODY).into_response()
    }
}
