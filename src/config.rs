use std::{env, net::SocketAddr, time::Duration};

use thiserror::Error;

/// 埋め込み並列度の下限／上限（環境変数で明示されない場合のクランプ帯）。
const EMBED_CONCURRENCY_MIN: usize = 8;
const EMBED_CONCURRENCY_MAX: usize = 16;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    http_bind: SocketAddr,
    catalog_db_dsn: String,
    db_max_connections: u32,
    db_acquire_timeout: Duration,
    embedding_provider_base_url: Option<String>,
    embedding_provider_service_token: Option<String>,
    embedding_model: String,
    embedding_connect_timeout: Duration,
    embedding_total_timeout: Duration,
    http_max_retries: usize,
    http_backoff_base_ms: u64,
    http_backoff_cap_ms: u64,
    ai_strategy_timeout: Duration,
    embed_max_concurrency: usize,
    embedding_cache_enabled: bool,
    embedding_cache_ttl: Duration,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing environment variable: {0}")]
    Missing(&'static str),
    #[error("invalid value for {name}: {source}")]
    Invalid {
        name: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

impl Config {
    /// 環境変数から推薦サービスの設定値を読み込み、検証する。
    ///
    /// 埋め込みプロバイダのURLは任意。未設定の場合、エンジンはAI戦略を
    /// 持たない縮退構成で起動する。
    ///
    /// # Errors
    /// `SHELF_DB_DSN` が未設定、もしくは各種値のパースに失敗した場合は
    /// [`ConfigError`] を返す。
    pub fn from_env() -> Result<Self, ConfigError> {
        let catalog_db_dsn = env_var("SHELF_DB_DSN")?;
        let http_bind = parse_socket_addr("SHELF_HTTP_BIND", "0.0.0.0:9010")?;
        let db_max_connections = parse_u32("SHELF_DB_MAX_CONNECTIONS", 10)?;
        let db_acquire_timeout = parse_duration_ms("SHELF_DB_ACQUIRE_TIMEOUT_MS", 3000)?;

        // 埋め込みプロバイダ設定（任意の外部能力）
        let embedding_provider_base_url = env::var("EMBEDDING_PROVIDER_BASE_URL").ok();
        let embedding_provider_service_token = env::var("EMBEDDING_PROVIDER_SERVICE_TOKEN").ok();
        let embedding_model = env::var("EMBEDDING_MODEL")
            .unwrap_or_else(|_| "text-embedding-3-small".to_string());
        let embedding_connect_timeout = parse_duration_ms("EMBEDDING_CONNECT_TIMEOUT_MS", 3000)?;
        let embedding_total_timeout = parse_duration_ms("EMBEDDING_TOTAL_TIMEOUT_MS", 10000)?;

        // 再試行設定（指数バックオフ+ジッター）
        let http_max_retries = parse_usize("HTTP_MAX_RETRIES", 2)?;
        let http_backoff_base_ms = parse_u64("HTTP_BACKOFF_BASE_MS", 250)?;
        let http_backoff_cap_ms = parse_u64("HTTP_BACKOFF_CAP_MS", 2000)?;

        // AI戦略全体のタイムアウト（超過はプロバイダ失敗と同一扱い）
        let ai_strategy_timeout = parse_duration_ms("AI_STRATEGY_TIMEOUT_MS", 15000)?;

        // 埋め込み呼び出しの並列度。既定はCPU数を8..=16にクランプ
        let default_concurrency = num_cpus::get().clamp(EMBED_CONCURRENCY_MIN, EMBED_CONCURRENCY_MAX);
        let embed_max_concurrency = parse_usize("EMBED_MAX_CONCURRENCY", default_concurrency)?;

        // キャッシュ設定
        let embedding_cache_enabled = parse_bool("EMBEDDING_CACHE_ENABLED", true)?;
        let embedding_cache_ttl =
            Duration::from_secs(parse_u64("EMBEDDING_CACHE_TTL_SECONDS", 86_400)?);

        Ok(Self {
            http_bind,
            catalog_db_dsn,
            db_max_connections,
            db_acquire_timeout,
            embedding_provider_base_url,
            embedding_provider_service_token,
            embedding_model,
            embedding_connect_timeout,
            embedding_total_timeout,
            http_max_retries,
            http_backoff_base_ms,
            http_backoff_cap_ms,
            ai_strategy_timeout,
            embed_max_concurrency,
            embedding_cache_enabled,
            embedding_cache_ttl,
        })
    }

    #[must_use]
    pub fn http_bind(&self) -> SocketAddr {
        self.http_bind
    }

    #[must_use]
    pub fn catalog_db_dsn(&self) -> &str {
        &self.catalog_db_dsn
    }

    #[must_use]
    pub fn db_max_connections(&self) -> u32 {
        self.db_max_connections
    }

    #[must_use]
    pub fn db_acquire_timeout(&self) -> Duration {
        self.db_acquire_timeout
    }

    #[must_use]
    pub fn embedding_provider_base_url(&self) -> Option<&str> {
        self.embedding_provider_base_url.as_deref()
    }

    #[must_use]
    pub fn embedding_provider_service_token(&self) -> Option<&str> {
        self.embedding_provider_service_token.as_deref()
    }

    #[must_use]
    pub fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    #[must_use]
    pub fn embedding_connect_timeout(&self) -> Duration {
        self.embedding_connect_timeout
    }

    #[must_use]
    pub fn embedding_total_timeout(&self) -> Duration {
        self.embedding_total_timeout
    }

    #[must_use]
    pub fn http_max_retries(&self) -> usize {
        self.http_max_retries
    }

    #[must_use]
    pub fn http_backoff_base_ms(&self) -> u64 {
        self.http_backoff_base_ms
    }

    #[must_use]
    pub fn http_backoff_cap_ms(&self) -> u64 {
        self.http_backoff_cap_ms
    }

    #[must_use]
    pub fn ai_strategy_timeout(&self) -> Duration {
        self.ai_strategy_timeout
    }

    #[must_use]
    pub fn embed_max_concurrency(&self) -> usize {
        self.embed_max_concurrency
    }

    #[must_use]
    pub fn embedding_cache_enabled(&self) -> bool {
        self.embedding_cache_enabled
    }

    #[must_use]
    pub fn embedding_cache_ttl(&self) -> Duration {
        self.embedding_cache_ttl
    }
}

fn env_var(name: &'static str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::Missing(name))
}

fn parse_socket_addr(name: &'static str, default: &str) -> Result<SocketAddr, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    raw.parse().map_err(|err| ConfigError::Invalid {
        name,
        source: anyhow::Error::new(err),
    })
}

fn parse_usize(name: &'static str, default: usize) -> Result<usize, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.parse().map_err(|err| ConfigError::Invalid {
            name,
            source: anyhow::Error::new(err),
        }),
        Err(_) => Ok(default),
    }
}

fn parse_u32(name: &'static str, default: u32) -> Result<u32, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.parse().map_err(|err| ConfigError::Invalid {
            name,
            source: anyhow::Error::new(err),
        }),
        Err(_) => Ok(default),
    }
}

fn parse_u64(name: &'static str, default: u64) -> Result<u64, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.parse().map_err(|err| ConfigError::Invalid {
            name,
            source: anyhow::Error::new(err),
        }),
        Err(_) => Ok(default),
    }
}

fn parse_duration_ms(name: &'static str, default_ms: u64) -> Result<Duration, ConfigError> {
    Ok(Duration::from_millis(parse_u64(name, default_ms)?))
}

fn parse_bool(name: &'static str, default: bool) -> Result<bool, ConfigError> {
    match env::var(name) {
        Ok(raw) => match raw.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::Invalid {
                name,
                source: anyhow::anyhow!("expected a boolean, got {raw:?}"),
            }),
        },
        Err(_) => Ok(default),
    }
}
