//! Configuration loading tests exercising the public config surface.

use std::time::Duration;

use shelf_recommender::config::{Config, ConfigError};

#[test]
fn from_env_requires_the_database_dsn() {
    temp_env::with_vars_unset(["SHELF_DB_DSN"], || {
        let error = Config::from_env().expect_err("missing DSN must fail");
        assert!(matches!(error, ConfigError::Missing("SHELF_DB_DSN")));
    });
}

#[test]
fn from_env_applies_defaults() {
    temp_env::with_vars(
        [
            ("SHELF_DB_DSN", Some("postgres://localhost/shelf")),
            ("SHELF_HTTP_BIND", None),
            ("EMBEDDING_PROVIDER_BASE_URL", None),
            ("AI_STRATEGY_TIMEOUT_MS", None),
            ("EMBEDDING_CACHE_TTL_SECONDS", None),
            ("EMBED_MAX_CONCURRENCY", None),
        ],
        || {
            let config = Config::from_env().expect("config should load");

            assert_eq!(config.http_bind().port(), 9010);
            assert_eq!(config.catalog_db_dsn(), "postgres://localhost/shelf");
            assert!(config.embedding_provider_base_url().is_none());
            assert_eq!(config.ai_strategy_timeout(), Duration::from_millis(15000));
            assert_eq!(config.embedding_cache_ttl(), Duration::from_secs(86_400));
            assert!(config.embedding_cache_enabled());
            // 既定の並列度は8..=16の帯にクランプされる
            assert!((8..=16).contains(&config.embed_max_concurrency()));
        },
    );
}

#[test]
fn from_env_reads_embedding_provider_settings() {
    temp_env::with_vars(
        [
            ("SHELF_DB_DSN", Some("postgres://localhost/shelf")),
            ("EMBEDDING_PROVIDER_BASE_URL", Some("http://embedder:9400")),
            ("EMBEDDING_PROVIDER_SERVICE_TOKEN", Some("secret")),
            ("EMBEDDING_MODEL", Some("custom-model")),
            ("EMBED_MAX_CONCURRENCY", Some("4")),
            ("EMBEDDING_CACHE_ENABLED", Some("false")),
        ],
        || {
            let config = Config::from_env().expect("config should load");

            assert_eq!(
                config.embedding_provider_base_url(),
                Some("http://embedder:9400")
            );
            assert_eq!(config.embedding_provider_service_token(), Some("secret"));
            assert_eq!(config.embedding_model(), "custom-model");
            assert_eq!(config.embed_max_concurrency(), 4);
            assert!(!config.embedding_cache_enabled());
        },
    );
}

#[test]
fn invalid_numeric_values_are_rejected() {
    temp_env::with_vars(
        [
            ("SHELF_DB_DSN", Some("postgres://localhost/shelf")),
            ("HTTP_MAX_RETRIES", Some("not-a-number")),
        ],
        || {
            let error = Config::from_env().expect_err("bad number must fail");
            assert!(matches!(
                error,
                ConfigError::Invalid {
                    name: "HTTP_MAX_RETRIES",
                    ..
                }
            ));
        },
    );
}

#[test]
fn invalid_bool_values_are_rejected() {
    temp_env::with_vars(
        [
            ("SHELF_DB_DSN", Some("postgres://localhost/shelf")),
            ("EMBEDDING_CACHE_ENABLED", Some("maybe")),
        ],
        || {
            let error = Config::from_env().expect_err("bad bool must fail");
            assert!(matches!(
                error,
                ConfigError::Invalid {
                    name: "EMBEDDING_CACHE_ENABLED",
                    ..
                }
            ));
        },
    );
}
