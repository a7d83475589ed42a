pub(crate) mod health;
pub(crate) mod metrics;
pub(crate) mod recommendations;

use axum::{
    Router,
    routing::{get, post},
};

use crate::app::AppState;

pub(crate) fn router(state: AppState) -> Router {
    Router::new()
        .route("/health/ready", get(health::ready))
        .route("/health/live", get(health::live))
        .route("/metrics", get(metrics::exporter))
        .route("/v1/recommendations", post(recommendations::recommend))
        .with_state(state)
}
