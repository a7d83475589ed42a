//! JSON contracts for the recommendation endpoint.

use serde::{Deserialize, Serialize};

use crate::engine::{Recommendations, ScoredCandidate, StrategyKind};

/// limit未指定時の既定値。
pub(crate) const DEFAULT_LIMIT: usize = 10;
/// limitの上限（境界で検証される）。
pub(crate) const MAX_LIMIT: usize = 50;

/// ワイヤ上の推薦種別。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum RecommendationType {
    #[default]
    TopRated,
    Similar,
    Ai,
}

impl From<RecommendationType> for StrategyKind {
    fn from(value: RecommendationType) -> Self {
        match value {
            RecommendationType::TopRated => StrategyKind::TopRated,
            RecommendationType::Similar => StrategyKind::Similar,
            RecommendationType::Ai => StrategyKind::Ai,
        }
    }
}

impl From<StrategyKind> for RecommendationType {
    fn from(value: StrategyKind) -> Self {
        match value {
            StrategyKind::TopRated => RecommendationType::TopRated,
            StrategyKind::Similar => RecommendationType::Similar,
            StrategyKind::Ai => RecommendationType::Ai,
        }
    }
}

/// POST /v1/recommendations のリクエストボディ。
#[derive(Debug, Deserialize)]
pub(crate) struct RecommendationRequestBody {
    pub(crate) user_id: i64,
    #[serde(default = "default_limit")]
    pub(crate) limit: usize,
    #[serde(default)]
    pub(crate) recommendation_type: RecommendationType,
    #[serde(default)]
    pub(crate) genre: Option<String>,
}

const fn default_limit() -> usize {
    DEFAULT_LIMIT
}

/// 推薦1件分のレスポンス表現。
#[derive(Debug, Serialize)]
pub(crate) struct BookRecommendation {
    pub(crate) book_id: i64,
    pub(crate) title: String,
    pub(crate) author: String,
    pub(crate) genres: Vec<String>,
    pub(crate) average_rating: f32,
    pub(crate) rating_count: i32,
    pub(crate) relevance_score: f32,
    pub(crate) recommendation_reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) publication_year: Option<i32>,
}

impl From<ScoredCandidate> for BookRecommendation {
    fn from(item: ScoredCandidate) -> Self {
        Self {
            book_id: item.book.id,
            title: item.book.title,
            author: item.book.author,
            genres: item.book.genres,
            average_rating: item.book.average_rating,
            rating_count: item.book.review_count,
            relevance_score: item.score,
            recommendation_reason: item.reason,
            publication_year: item.book.publication_year,
        }
    }
}

/// POST /v1/recommendations のレスポンスボディ。
#[derive(Debug, Serialize)]
pub(crate) struct RecommendationResponse {
    pub(crate) recommendations: Vec<BookRecommendation>,
    pub(crate) is_fallback: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) fallback_reason: Option<String>,
    pub(crate) recommendation_type: RecommendationType,
    pub(crate) is_ai_powered: bool,
}

impl From<Recommendations> for RecommendationResponse {
    fn from(result: Recommendations) -> Self {
        Self {
            recommendations: result.items.into_iter().map(Into::into).collect(),
            is_fallback: result.is_fallback,
            fallback_reason: result.fallback_reason,
            recommendation_type: result.strategy_used.into(),
            is_ai_powered: result.ai_powered,
        }
    }
}
