//! Fallback orchestration and ranking for recommendation requests.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::time::timeout;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use super::cache::VectorCache;
use super::candidates::CandidateSelector;
use super::embedding::{Embedder, EmbeddingStrategy};
use super::profile::{PreferenceProfile, UserHistory};
use super::scoring::{genre_similarity, sort_candidates, top_rated};
use super::strategy::{Recommendations, ScoredCandidate, StrategyKind, StrategyStep, chain_for};
use crate::observability::metrics::Metrics;
use crate::store::dao::CatalogDao;
use crate::store::kv::KvCache;

const AI_UNAVAILABLE_REASON: &str = "AI recommendations unavailable";
const NO_PROFILE_REASON: &str = "No preference history available";
const ENGINE_ERROR_REASON: &str = "Error processing recommendations";
const POPULAR_BOOK_REASON: &str = "Popular book with high ratings";

/// エンジンの動作設定。
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    /// Embedding戦略全体のタイムアウト（超過はプロバイダ失敗と同一扱い）。
    pub ai_timeout: Duration,
    /// 埋め込み呼び出しの最大並列数。
    pub embed_concurrency: usize,
    /// 埋め込みベクトルのキャッシュTTL。
    pub cache_ttl: Duration,
}

/// 1件の推薦リクエスト。`limit`は境界で1..=50に検証済みの不変入力。
#[derive(Debug, Clone)]
pub struct RecommendationRequest {
    pub request_id: Uuid,
    pub user_id: i64,
    pub limit: usize,
    pub strategy: StrategyKind,
    pub genre: Option<String>,
}

/// 推薦エンジン本体。
///
/// 要求種別ごとの戦略連鎖を歩き、最初の非例外・非空出力を採用する。
/// 内部エラーは決して呼び出し側へ伝播せず、常に[`Recommendations`]を返す。
pub struct RecommendationEngine {
    dao: Arc<dyn CatalogDao>,
    selector: CandidateSelector,
    embedding: Option<EmbeddingStrategy>,
    ai_timeout: Duration,
    metrics: Arc<Metrics>,
}

impl RecommendationEngine {
    #[must_use]
    pub fn new(
        dao: Arc<dyn CatalogDao>,
        embedder: Option<Arc<dyn Embedder>>,
        kv: Option<Arc<dyn KvCache>>,
        config: EngineConfig,
        metrics: Arc<Metrics>,
    ) -> Self {
        let cache = VectorCache::new(kv, config.cache_ttl, Arc::clone(&metrics));
        let embedding =
            embedder.map(|embedder| EmbeddingStrategy::new(embedder, cache, config.embed_concurrency));

        if embedding.is_none() {
            warn!("embedding provider not configured, AI strategy degraded to fallback chain");
        }

        Self {
            dao: Arc::clone(&dao),
            selector: CandidateSelector::new(dao),
            embedding,
            ai_timeout: config.ai_timeout,
            metrics,
        }
    }

    /// 推薦を実行する。
    ///
    /// 予期しない内部エラーはすべて終端の人気書籍フォールバックへ変換される。
    #[instrument(skip_all, fields(
        request_id = %request.request_id,
        user_id = request.user_id,
        strategy = request.strategy.as_str(),
    ))]
    pub async fn recommend(&self, request: &RecommendationRequest) -> Recommendations {
        let timer = self.metrics.recommend_duration.start_timer();
        self.metrics.recommendations_total.inc();

        let result = match self.resolve(request).await {
            Ok(result) => result,
            Err(err) => {
                error!(error = ?err, "recommendation resolution failed, serving popular fallback");
                self.metrics.engine_failures_total.inc();
                self.popular_fallback(request, ENGINE_ERROR_REASON).await
            }
        };

        if result.is_fallback {
            self.metrics.fallback_total.inc();
        }
        if result.ai_powered {
            self.metrics.ai_success_total.inc();
        }
        info!(
            returned = result.items.len(),
            strategy_used = result.strategy_used.as_str(),
            is_fallback = result.is_fallback,
            ai_powered = result.ai_powered,
            "recommendation request completed"
        );
        timer.observe_duration();
        result
    }

    async fn resolve(&self, request: &RecommendationRequest) -> Result<Recommendations> {
        let exclude = self.dao.excluded_book_ids(request.user_id).await?;
        let genre = request.genre.as_deref();

        let candidates = match self.selector.select(&exclude, genre).await {
            Ok(candidates) => candidates,
            Err(err) => {
                warn!(error = ?err, "candidate read failed, treating as empty set");
                Vec::new()
            }
        };

        if candidates.is_empty() {
            // 候補ゼロはジャンルフィルタを無視した人気書籍クエリへ縮退する
            return Ok(self
                .popular_fallback(request, &no_candidates_reason(genre))
                .await);
        }

        if request.strategy == StrategyKind::TopRated {
            let mut items = top_rated(&candidates, genre);
            rank(&mut items, request.limit);
            return Ok(Recommendations::primary(items, StrategyKind::TopRated, false));
        }

        let history = UserHistory {
            favorites: self.dao.favorited_books(request.user_id).await?,
            reviews: self.dao.reviewed_books(request.user_id).await?,
        };
        let profile = PreferenceProfile::from_favorites(&history.favorites);
        let requested = request.strategy;

        for step in chain_for(requested) {
            match step {
                StrategyStep::Embedding => {
                    let Some(strategy) = &self.embedding else {
                        info!("embedding strategy unavailable, walking fallback chain");
                        continue;
                    };
                    let outcome = timeout(
                        self.ai_timeout,
                        strategy.score(request.user_id, &candidates, &history, genre),
                    )
                    .await;
                    match outcome {
                        Ok(Ok(mut items)) if !items.is_empty() => {
                            rank(&mut items, request.limit);
                            return Ok(Recommendations::primary(items, requested, true));
                        }
                        Ok(Ok(_)) => {
                            info!("embedding strategy produced no output, walking fallback chain");
                        }
                        Ok(Err(err)) => {
                            warn!(error = %err, "embedding provider failed, walking fallback chain");
                            self.metrics.provider_errors_total.inc();
                        }
                        Err(_) => {
                            warn!(timeout = ?self.ai_timeout, "embedding strategy timed out, walking fallback chain");
                            self.metrics.provider_errors_total.inc();
                        }
                    }
                }
                StrategyStep::GenreSimilarity => {
                    let mut items = genre_similarity(&candidates, &profile, &history.favorites);
                    if items.is_empty() {
                        continue;
                    }
                    rank(&mut items, request.limit);
                    if requested == StrategyKind::Ai {
                        return Ok(Recommendations::fallback(
                            items,
                            StrategyKind::Similar,
                            AI_UNAVAILABLE_REASON,
                        ));
                    }
                    return Ok(Recommendations::primary(items, StrategyKind::Similar, false));
                }
                StrategyStep::TopRated => {
                    let mut items = top_rated(&candidates, genre);
                    rank(&mut items, request.limit);
                    let reason = if requested == StrategyKind::Ai {
                        AI_UNAVAILABLE_REASON
                    } else {
                        NO_PROFILE_REASON
                    };
                    return Ok(Recommendations::fallback(
                        items,
                        StrategyKind::TopRated,
                        reason,
                    ));
                }
            }
        }

        // 連鎖は終端戦略で必ず返るため通常ここには到達しない
        Ok(self.popular_fallback(request, ENGINE_ERROR_REASON).await)
    }

    /// 終端の人気書籍フォールバック。決して失敗しない（最悪でも空の結果）。
    async fn popular_fallback(
        &self,
        request: &RecommendationRequest,
        reason: &str,
    ) -> Recommendations {
        let exclude = match self.dao.excluded_book_ids(request.user_id).await {
            Ok(exclude) => exclude,
            Err(err) => {
                warn!(error = ?err, "exclusion read failed during popular fallback");
                return Recommendations::empty_fallback(reason);
            }
        };

        let limit = i64::try_from(request.limit).unwrap_or(i64::MAX);
        let books = match self.dao.popular_books(&exclude, limit).await {
            Ok(books) => books,
            Err(err) => {
                warn!(error = ?err, "popular books query failed, returning empty result");
                Vec::new()
            }
        };

        // 順序はクエリ由来（レビュー数降順、評価降順）。再ソートしない。
        let mut items: Vec<ScoredCandidate> = books
            .into_iter()
            .map(|book| {
                let score = book.average_rating;
                ScoredCandidate {
                    book,
                    score,
                    reason: POPULAR_BOOK_REASON.to_string(),
                }
            })
            .collect();
        items.truncate(request.limit);

        Recommendations::fallback(items, StrategyKind::TopRated, reason)
    }
}

/// ランカー: 決定的ソート、ID重複排除、limitへの切り詰め。
///
/// 切り詰めは採点後の最終段でのみ行う（採点は全候補を見る必要がある）。
pub(crate) fn rank(items: &mut Vec<ScoredCandidate>, limit: usize) {
    sort_candidates(items);
    let mut seen = HashSet::new();
    items.retain(|item| seen.insert(item.book.id));
    items.truncate(limit);
}

fn no_candidates_reason(genre: Option<&str>) -> String {
    match genre {
        Some(genre) => format!("No {genre} books found"),
        None => "No books found".to_string(),
    }
}
