//! Shared deterministic fakes and fixtures for engine tests.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Result, bail};
use async_trait::async_trait;
use prometheus::Registry;

use crate::clients::embedding::EmbeddingError;
use crate::engine::embedding::Embedder;
use crate::observability::metrics::Metrics;
use crate::store::dao::CatalogDao;
use crate::store::kv::KvCache;
use crate::store::models::{BookRecord, ReviewedBook};

pub(crate) fn book(id: i64, genres: &[&str], rating: f32, reviews: i32) -> BookRecord {
    BookRecord {
        id,
        title: format!("Book {id}"),
        author: format!("Author {id}"),
        genres: genres.iter().map(ToString::to_string).collect(),
        average_rating: rating,
        review_count: reviews,
        publication_year: Some(2020),
        description: None,
    }
}

pub(crate) fn reviewed(book: BookRecord, rating: i32) -> ReviewedBook {
    ReviewedBook { book, rating }
}

pub(crate) fn test_metrics() -> Arc<Metrics> {
    Arc::new(Metrics::new(&Registry::new()).expect("metrics registration"))
}

/// クロージャで応答を決めるフェイク埋め込みプロバイダ。
pub(crate) struct ClosureEmbedder<F>
where
    F: Fn(&str) -> Result<Vec<f32>, EmbeddingError> + Send + Sync,
{
    respond: F,
}

impl<F> ClosureEmbedder<F>
where
    F: Fn(&str) -> Result<Vec<f32>, EmbeddingError> + Send + Sync,
{
    pub(crate) fn new(respond: F) -> Self {
        Self { respond }
    }
}

#[async_trait]
impl<F> Embedder for ClosureEmbedder<F>
where
    F: Fn(&str) -> Result<Vec<f32>, EmbeddingError> + Send + Sync,
{
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        (self.respond)(text)
    }
}

/// 常に失敗するフェイク埋め込みプロバイダ。
pub(crate) struct FailingEmbedder;

#[async_trait]
impl Embedder for FailingEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Err(EmbeddingError::Malformed("provider down".to_string()))
    }
}

/// HashMapベースのインメモリKVストア。TTLは保持しない（テストでは時間を進めない）。
#[derive(Default)]
pub(crate) struct MemoryKv {
    entries: Mutex<HashMap<String, Vec<u8>>>,
    failing: bool,
}

impl MemoryKv {
    pub(crate) fn failing() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            failing: true,
        }
    }
}

#[async_trait]
impl KvCache for MemoryKv {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        if self.failing {
            bail!("kv store unreachable");
        }
        Ok(self.entries.lock().expect("kv lock").get(key).cloned())
    }

    async fn set_with_expiry(&self, key: &str, value: &[u8], _ttl: Duration) -> Result<()> {
        if self.failing {
            bail!("kv store unreachable");
        }
        self.entries
            .lock()
            .expect("kv lock")
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }
}

/// インメモリカタログ。ユーザー単位のお気に入り・レビューを保持する。
#[derive(Default)]
pub(crate) struct MemoryCatalog {
    books: Vec<BookRecord>,
    favorites: HashMap<i64, Vec<BookRecord>>,
    reviews: HashMap<i64, Vec<ReviewedBook>>,
    failing: bool,
}

impl MemoryCatalog {
    pub(crate) fn new(books: Vec<BookRecord>) -> Self {
        Self {
            books,
            ..Self::default()
        }
    }

    pub(crate) fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub(crate) fn with_favorites(mut self, user_id: i64, favorites: Vec<BookRecord>) -> Self {
        self.favorites.insert(user_id, favorites);
        self
    }

    pub(crate) fn with_reviews(mut self, user_id: i64, reviews: Vec<ReviewedBook>) -> Self {
        self.reviews.insert(user_id, reviews);
        self
    }
}

#[async_trait]
impl CatalogDao for MemoryCatalog {
    async fn ping(&self) -> Result<()> {
        if self.failing {
            bail!("catalog unreachable");
        }
        Ok(())
    }

    async fn list_candidates(
        &self,
        exclude_ids: &HashSet<i64>,
        genre: Option<&str>,
    ) -> Result<Vec<BookRecord>> {
        if self.failing {
            bail!("catalog unreachable");
        }
        Ok(self
            .books
            .iter()
            .filter(|book| !exclude_ids.contains(&book.id))
            .filter(|book| genre.is_none_or(|wanted| book.has_genre(wanted)))
            .cloned()
            .collect())
    }

    async fn excluded_book_ids(&self, user_id: i64) -> Result<HashSet<i64>> {
        if self.failing {
            bail!("catalog unreachable");
        }
        let mut ids = HashSet::new();
        if let Some(favorites) = self.favorites.get(&user_id) {
            ids.extend(favorites.iter().map(|book| book.id));
        }
        if let Some(reviews) = self.reviews.get(&user_id) {
            ids.extend(reviews.iter().map(|review| review.book.id));
        }
        Ok(ids)
    }

    async fn favorited_books(&self, user_id: i64) -> Result<Vec<BookRecord>> {
        if self.failing {
            bail!("catalog unreachable");
        }
        Ok(self.favorites.get(&user_id).cloned().unwrap_or_default())
    }

    async fn reviewed_books(&self, user_id: i64) -> Result<Vec<ReviewedBook>> {
        if self.failing {
            bail!("catalog unreachable");
        }
        Ok(self.reviews.get(&user_id).cloned().unwrap_or_default())
    }

    async fn popular_books(
        &self,
        exclude_ids: &HashSet<i64>,
        limit: i64,
    ) -> Result<Vec<BookRecord>> {
        if self.failing {
            bail!("catalog unreachable");
        }
        let mut popular: Vec<BookRecord> = self
            .books
            .iter()
            .filter(|book| !exclude_ids.contains(&book.id))
            .filter(|book| book.average_rating >= 3.5 && book.review_count > 0)
            .cloned()
            .collect();
        popular.sort_by(|a, b| {
            b.review_count
                .cmp(&a.review_count)
                .then_with(|| {
                    b.average_rating
                        .partial_cmp(&a.average_rating)
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .then_with(|| a.id.cmp(&b.id))
        });
        popular.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(popular)
    }
}
