use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use sqlx::postgres::PgPoolOptions;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::{
    api,
    clients::embedding::{EmbeddingClient, EmbeddingProviderConfig},
    config::Config,
    engine::{EngineConfig, RecommendationEngine, embedding::Embedder},
    observability::Telemetry,
    store::dao::{CatalogDao, PgCatalogDao},
    store::kv::{KvCache, PgKvCache},
    util::retry::RetryConfig,
};

#[derive(Clone)]
pub(crate) struct AppState {
    registry: Arc<ComponentRegistry>,
}

pub struct ComponentRegistry {
    config: Arc<Config>,
    telemetry: Telemetry,
    dao: Arc<dyn CatalogDao>,
    engine: Arc<RecommendationEngine>,
}

impl AppState {
    pub(crate) fn new(registry: ComponentRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    pub(crate) fn telemetry(&self) -> &Telemetry {
        &self.registry.telemetry
    }

    pub(crate) fn dao(&self) -> Arc<dyn CatalogDao> {
        Arc::clone(&self.registry.dao)
    }

    pub(crate) fn engine(&self) -> Arc<RecommendationEngine> {
        Arc::clone(&self.registry.engine)
    }
}

impl ComponentRegistry {
    /// 構成情報と依存をまとめて初期化し、アプリケーションの共有レジストリを構築する。
    ///
    /// # Errors
    /// Telemetry の初期化、接続プールの構成、HTTP クライアント構築が失敗した場合は
    /// エラーを返す。
    pub fn build(config: Config) -> Result<Self> {
        let config = Arc::new(config);
        let telemetry = Telemetry::new()?;
        let metrics = telemetry.metrics_arc();

        let pool = PgPoolOptions::new()
            .max_connections(config.db_max_connections())
            .acquire_timeout(config.db_acquire_timeout())
            .test_before_acquire(true)
            .connect_lazy(config.catalog_db_dsn())
            .context("failed to configure catalog connection pool")?;

        let dao: Arc<dyn CatalogDao> = Arc::new(PgCatalogDao::new(pool.clone()));

        let kv: Option<Arc<dyn KvCache>> = if config.embedding_cache_enabled() {
            Some(Arc::new(PgKvCache::new(pool)))
        } else {
            None
        };

        let embedder: Option<Arc<dyn Embedder>> = match config.embedding_provider_base_url() {
            Some(base_url) => {
                let provider_config = EmbeddingProviderConfig {
                    base_url: base_url.to_string(),
                    model: config.embedding_model().to_string(),
                    connect_timeout: config.embedding_connect_timeout(),
                    total_timeout: config.embedding_total_timeout(),
                    service_token: config
                        .embedding_provider_service_token()
                        .map(ToString::to_string),
                    retry: RetryConfig::new(
                        config.http_max_retries(),
                        config.http_backoff_base_ms(),
                        config.http_backoff_cap_ms(),
                    ),
                };
                match EmbeddingClient::new(provider_config) {
                    Ok(client) => Some(Arc::new(client) as Arc<dyn Embedder>),
                    Err(error) => {
                        warn!(error = ?error, "failed to build embedding client, AI strategy disabled");
                        None
                    }
                }
            }
            None => None,
        };

        let engine = Arc::new(RecommendationEngine::new(
            Arc::clone(&dao),
            embedder,
            kv,
            EngineConfig {
                ai_timeout: config.ai_strategy_timeout(),
                embed_concurrency: config.embed_max_concurrency(),
                cache_ttl: config.embedding_cache_ttl(),
            },
            metrics,
        ));

        Ok(Self {
            config,
            telemetry,
            dao,
            engine,
        })
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }
}

/// ルーターを組み立てる。
pub fn build_router(registry: ComponentRegistry) -> Router {
    let state = AppState::new(registry);
    api::router(state).layer(TraceLayer::new_for_http())
}
