//! Embedding-Similarity strategy (the AI path).

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::debug;

use super::cache::VectorCache;
use super::profile::UserHistory;
use super::scoring::{cosine_similarity, sort_candidates};
use super::strategy::ScoredCandidate;
use crate::clients::embedding::EmbeddingError;
use crate::store::models::BookRecord;

/// ジャンルフィルタ一致時の類似度ブースト係数。
const GENRE_BOOST: f32 = 1.2;

/// テキスト埋め込み能力のシーム。テストでは決定的なフェイクに差し替える。
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;
}

/// Embedding-Similarity戦略。
///
/// ユーザー興味ベクトルと候補ベクトルの余弦類似度で採点する。
/// プロバイダの失敗は戦略全体を中断し（候補単位の部分縮退はしない）、
/// オーケストレータへのフォールバック信号となる。
pub struct EmbeddingStrategy {
    embedder: Arc<dyn Embedder>,
    cache: VectorCache,
    concurrency: usize,
}

impl EmbeddingStrategy {
    #[must_use]
    pub fn new(embedder: Arc<dyn Embedder>, cache: VectorCache, concurrency: usize) -> Self {
        Self {
            embedder,
            cache,
            concurrency,
        }
    }

    /// 候補集合を採点する。
    ///
    /// 埋め込み計算は有界の並列度でファンアウトされる。完了順序は
    /// スコアで再ソートされるため無関係だが、候補と結果の対応は
    /// インデックスで保存される。
    ///
    /// # Errors
    /// いずれかのプロバイダ呼び出しが失敗した場合は[`EmbeddingError`]を
    /// 返し、戦略全体が中断される。
    pub async fn score(
        &self,
        user_id: i64,
        candidates: &[BookRecord],
        history: &UserHistory,
        genre: Option<&str>,
    ) -> Result<Vec<ScoredCandidate>, EmbeddingError> {
        let Some(interest) = interest_summary(history) else {
            debug!(user_id, "no interest signal, embedding strategy yields nothing");
            return Ok(Vec::new());
        };

        let user_key = format!("user:{user_id}");
        let embedder = Arc::clone(&self.embedder);
        let user_vector = self
            .cache
            .get_or_compute(&user_key, move || async move {
                embedder.embed(&interest).await
            })
            .await?;
        let user_vector = user_vector.as_slice();

        let jobs: Vec<(usize, String, String)> = candidates
            .iter()
            .enumerate()
            .map(|(index, book)| (index, format!("book:{}", book.id), candidate_summary(book)))
            .collect();

        let similarities: Vec<(usize, f32)> = stream::iter(jobs)
            .map(|(index, key, text)| {
                let embedder = Arc::clone(&self.embedder);
                let cache = self.cache.clone();
                async move {
                    let vector = cache
                        .get_or_compute(&key, move || async move { embedder.embed(&text).await })
                        .await?;
                    Ok::<_, EmbeddingError>((index, cosine_similarity(user_vector, &vector)))
                }
            })
            .buffer_unordered(self.concurrency.max(1))
            .try_collect()
            .await?;

        let mut items = Vec::with_capacity(similarities.len());
        for (index, similarity) in similarities {
            let book = &candidates[index];
            let matched_genre = genre.filter(|wanted| book.has_genre(wanted));
            let score = if matched_genre.is_some() {
                similarity * GENRE_BOOST
            } else {
                similarity
            };
            let reason = match matched_genre {
                Some(genre) => format!("AI-powered match for your {genre} interests"),
                None => "AI-powered recommendation based on your reading history".to_string(),
            };
            items.push(ScoredCandidate {
                book: book.clone(),
                score,
                reason,
            });
        }
        sort_candidates(&mut items);
        Ok(items)
    }
}

/// お気に入りとレビューからユーザー興味の文章要約を構築する。
///
/// お気に入りが主シグナル、レビュー由来の感情タグが副シグナル。
/// どちらも無い場合は`None`（フォールバックのトリガ）。
#[must_use]
pub(crate) fn interest_summary(history: &UserHistory) -> Option<String> {
    if history.is_empty() {
        return None;
    }

    let mut parts: Vec<String> = Vec::new();
    if !history.favorites.is_empty() {
        let favorites = history
            .favorites
            .iter()
            .map(|book| {
                format!(
                    "{} by {} ({})",
                    book.title,
                    book.author,
                    book.genres.join("/")
                )
            })
            .collect::<Vec<_>>()
            .join("; ");
        parts.push(format!("Favorite books: {favorites}"));
    }
    for review in &history.reviews {
        parts.push(format!(
            "Reader {} {}",
            sentiment(review.rating),
            review.book.title
        ));
    }
    Some(parts.join(". "))
}

/// 評価値を感情タグへ変換する。
fn sentiment(rating: i32) -> &'static str {
    if rating >= 4 {
        "likes"
    } else if rating == 3 {
        "neutral about"
    } else {
        "dislikes"
    }
}

/// 候補書籍の文章要約（タイトル・著者・ジャンル・説明）。
#[must_use]
pub(crate) fn candidate_summary(book: &BookRecord) -> String {
    let mut summary = format!("{} by {}", book.title, book.author);
    if !book.genres.is_empty() {
        summary.push_str(&format!(". Genres: {}", book.genres.join(", ")));
    }
    if let Some(description) = &book.description {
        summary.push_str(&format!(". {description}"));
    }
    summary
}
