/// Prometheusメトリクス定義。
use prometheus::{
    Counter, Histogram, Registry, register_counter_with_registry,
    register_histogram_with_registry,
};

/// メトリクスコレクター。
#[derive(Debug, Clone)]
pub struct Metrics {
    // カウンター
    pub recommendations_total: Counter,
    pub fallback_total: Counter,
    pub ai_success_total: Counter,
    pub provider_errors_total: Counter,
    pub engine_failures_total: Counter,
    pub embedding_cache_hits: Counter,
    pub embedding_cache_misses: Counter,

    // ヒストグラム
    pub recommend_duration: Histogram,
}

impl Metrics {
    /// 新しいメトリクスコレクターを作成する。
    ///
    /// # Errors
    /// 同名メトリクスの二重登録など、レジストリへの登録に失敗した場合はエラーを返す。
    pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        Ok(Self {
            recommendations_total: register_counter_with_registry!(
                "shelf_recommendations_total",
                "Total number of recommendation requests served",
                registry
            )?,
            fallback_total: register_counter_with_registry!(
                "shelf_recommendation_fallback_total",
                "Total number of responses produced by a fallback strategy",
                registry
            )?,
            ai_success_total: register_counter_with_registry!(
                "shelf_recommendation_ai_success_total",
                "Total number of responses produced by the embedding strategy",
                registry
            )?,
            provider_errors_total: register_counter_with_registry!(
                "shelf_embedding_provider_errors_total",
                "Total number of embedding provider failures or timeouts",
                registry
            )?,
            engine_failures_total: register_counter_with_registry!(
                "shelf_engine_failures_total",
                "Total number of unexpected engine errors converted to fallback",
                registry
            )?,
            embedding_cache_hits: register_counter_with_registry!(
                "shelf_embedding_cache_hits_total",
                "Total number of embedding vectors served from the cache",
                registry
            )?,
            embedding_cache_misses: register_counter_with_registry!(
                "shelf_embedding_cache_misses_total",
                "Total number of embedding vectors computed via the provider",
                registry
            )?,
            recommend_duration: register_histogram_with_registry!(
                "shelf_recommend_duration_seconds",
                "End-to-end latency of one recommendation request",
                vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0],
                registry
            )?,
        })
    }
}
