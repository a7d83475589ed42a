//! Best-effort vector cache wrapping the embedding provider.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::clients::embedding::EmbeddingError;
use crate::observability::metrics::Metrics;
use crate::store::kv::KvCache;

/// 埋め込みベクトルのキャッシュ。
///
/// ストアが未設定・到達不能な場合はパススルー（常にミス）に縮退し、
/// リクエストを失敗させない。書き込み失敗は無視される（ベストエフォート）。
#[derive(Clone)]
pub struct VectorCache {
    store: Option<Arc<dyn KvCache>>,
    ttl: Duration,
    metrics: Arc<Metrics>,
}

impl VectorCache {
    #[must_use]
    pub fn new(store: Option<Arc<dyn KvCache>>, ttl: Duration, metrics: Arc<Metrics>) -> Self {
        Self {
            store,
            ttl,
            metrics,
        }
    }

    /// キャッシュヒット時はデシリアライズ結果を返し、プロバイダは呼ばない。
    /// ミス時は`compute`を実行し、結果をTTL付きで保存してから返す。
    /// 保存はリクエスト完了をブロックしない（fire-and-forget）。
    ///
    /// # Errors
    /// `compute`（プロバイダ呼び出し）の失敗のみを伝播する。キャッシュ自体の
    /// 失敗は決して伝播しない。
    pub async fn get_or_compute<F, Fut>(&self, key: &str, compute: F) -> Result<Vec<f32>, EmbeddingError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<f32>, EmbeddingError>>,
    {
        if let Some(store) = &self.store {
            match store.get(key).await {
                Ok(Some(payload)) => match serde_json::from_slice::<Vec<f32>>(&payload) {
                    Ok(vector) => {
                        self.metrics.embedding_cache_hits.inc();
                        return Ok(vector);
                    }
                    Err(error) => {
                        warn!(key, %error, "undecodable cache payload, recomputing");
                    }
                },
                Ok(None) => {}
                Err(error) => {
                    warn!(key, error = ?error, "cache unavailable, treating as miss");
                }
            }
        }

        self.metrics.embedding_cache_misses.inc();
        let vector = compute().await?;

        if let Some(store) = &self.store {
            if let Ok(payload) = serde_json::to_vec(&vector) {
                let store = Arc::clone(store);
                let key = key.to_string();
                let ttl = self.ttl;
                tokio::spawn(async move {
                    if let Err(error) = store.set_with_expiry(&key, &payload, ttl).await {
                        debug!(key = %key, error = ?error, "cache write failed, ignoring");
                    }
                });
            }
        }

        Ok(vector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::test_support::{MemoryKv, test_metrics};

    fn cache_with(store: Option<Arc<dyn KvCache>>) -> VectorCache {
        VectorCache::new(store, Duration::from_secs(86_400), test_metrics())
    }

    #[tokio::test]
    async fn hit_skips_the_provider() {
        let kv = Arc::new(MemoryKv::default());
        kv.set_with_expiry(
            "book:1",
            &serde_json::to_vec(&vec![1.0_f32, 0.0]).expect("encode"),
            Duration::from_secs(60),
        )
        .await
        .expect("seed");

        let cache = cache_with(Some(kv));
        let vector = cache
            .get_or_compute("book:1", || async { panic!("provider must not be called") })
            .await
            .expect("cached vector");

        assert_eq!(vector, vec![1.0, 0.0]);
    }

    #[tokio::test]
    async fn miss_computes_and_stores() {
        let kv = Arc::new(MemoryKv::default());
        let cache = cache_with(Some(Arc::clone(&kv) as Arc<dyn KvCache>));

        let vector = cache
            .get_or_compute("book:2", || async { Ok(vec![0.5, 0.5]) })
            .await
            .expect("computed vector");
        assert_eq!(vector, vec![0.5, 0.5]);

        // fire-and-forgetの書き込みを待つ
        let mut stored = None;
        for _ in 0..50 {
            tokio::task::yield_now().await;
            stored = kv.get("book:2").await.expect("kv read");
            if stored.is_some() {
                break;
            }
        }
        assert!(stored.is_some());
    }

    #[tokio::test]
    async fn unreachable_store_degrades_to_pass_through() {
        let cache = cache_with(Some(Arc::new(MemoryKv::failing())));

        let vector = cache
            .get_or_compute("user:9", || async { Ok(vec![0.25]) })
            .await
            .expect("pass-through compute");
        assert_eq!(vector, vec![0.25]);
    }

    #[tokio::test]
    async fn absent_store_is_a_pure_pass_through() {
        let cache = cache_with(None);
        let vector = cache
            .get_or_compute("user:1", || async { Ok(vec![1.0]) })
            .await
            .expect("compute");
        assert_eq!(vector, vec![1.0]);
    }

    #[tokio::test]
    async fn undecodable_payload_triggers_recompute() {
        let kv = Arc::new(MemoryKv::default());
        kv.set_with_expiry("book:3", b"not-json", Duration::from_secs(60))
            .await
            .expect("seed");

        let cache = cache_with(Some(kv));
        let vector = cache
            .get_or_compute("book:3", || async { Ok(vec![0.75]) })
            .await
            .expect("recomputed");
        assert_eq!(vector, vec![0.75]);
    }
}
