use axum::{extract::State, response::IntoResponse};

use crate::app::AppState;

/// GET /metrics
/// Prometheusテキスト形式でメトリクスを返す。
pub(crate) async fn exporter(State(state): State<AppState>) -> impl IntoResponse {
    state.telemetry().render_prometheus()
}
