/// 外部キーバリューキャッシュの契約と実装。
///
/// エンジン側は`KvCache`トレイトのみを参照し、到達不能な場合は
/// パススルーに縮退します（`engine::cache`参照）。
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;

#[async_trait]
pub trait KvCache: Send + Sync {
    /// キーに対応する値を返す。期限切れ・未登録の場合は`None`。
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// 値をTTL付きで保存する。既存キーは上書きされる。
    async fn set_with_expiry(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()>;
}

/// PostgreSQLテーブルを背にしたキャッシュストア。
#[derive(Debug, Clone)]
pub struct PgKvCache {
    pool: PgPool,
}

impl PgKvCache {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl KvCache for PgKvCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let payload: Option<Vec<u8>> = sqlx::query_scalar(
            r"
            SELECT payload FROM embedding_cache
            WHERE cache_key = $1 AND expires_at > NOW()
            ",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .context("cache read failed")?;
        Ok(payload)
    }

    async fn set_with_expiry(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()> {
        let ttl = chrono::Duration::from_std(ttl).context("cache ttl out of range")?;
        let expires_at = Utc::now() + ttl;
        sqlx::query(
            r"
            INSERT INTO embedding_cache (cache_key, payload, expires_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (cache_key)
            DO UPDATE SET payload = EXCLUDED.payload, expires_at = EXCLUDED.expires_at
            ",
        )
        .bind(key)
        .bind(value)
        .bind(expires_at)
        .execute(&self.pool)
        .await
        .context("cache write failed")?;
        Ok(())
    }
}
