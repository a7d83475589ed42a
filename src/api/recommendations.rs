use axum::{Json, extract::State, http::StatusCode};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::app::AppState;
use crate::engine::RecommendationRequest;
use crate::schema::{MAX_LIMIT, RecommendationRequestBody, RecommendationResponse};

#[derive(Debug, Serialize)]
pub(crate) struct ErrorResponse {
    error: String,
}

/// POST /v1/recommendations
/// 現在のユーザー向けの書籍推薦を返す。
///
/// エンジンは内部エラーを常にフォールバック結果へ変換するため、
/// このハンドラが500を返すのは境界検証のみ。
pub(crate) async fn recommend(
    State(state): State<AppState>,
    Json(body): Json<RecommendationRequestBody>,
) -> Result<Json<RecommendationResponse>, (StatusCode, Json<ErrorResponse>)> {
    if body.limit < 1 || body.limit > MAX_LIMIT {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: format!("limit must be between 1 and {MAX_LIMIT}"),
            }),
        ));
    }

    let request = RecommendationRequest {
        request_id: Uuid::new_v4(),
        user_id: body.user_id,
        limit: body.limit,
        strategy: body.recommendation_type.into(),
        genre: body.genre,
    };

    info!(
        request_id = %request.request_id,
        user_id = request.user_id,
        limit = request.limit,
        genre = ?request.genre,
        "recommendation requested"
    );

    let result = state.engine().recommend(&request).await;
    Ok(Json(result.into()))
}
