/// CatalogDaoトレイト - カタログ／インタラクションデータアクセス層の抽象化
use std::collections::HashSet;

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::PgPool;

use super::models::{BookRecord, ReviewedBook};

const BOOK_COLUMNS: &str = r"
    b.id::BIGINT AS id,
    b.title,
    b.author,
    COALESCE(b.genres, '{}') AS genres,
    b.average_rating::REAL AS average_rating,
    b.total_reviews AS review_count,
    EXTRACT(YEAR FROM b.publication_date)::INT AS publication_year,
    b.description
";

#[async_trait]
pub trait CatalogDao: Send + Sync {
    /// 接続確認。readinessプローブから呼ばれる。
    async fn ping(&self) -> Result<()>;

    /// 除外集合に含まれない候補書籍を取得する。
    /// `genre`が指定された場合、そのジャンルを含む書籍のみを返す（大文字小文字は区別）。
    async fn list_candidates(
        &self,
        exclude_ids: &HashSet<i64>,
        genre: Option<&str>,
    ) -> Result<Vec<BookRecord>>;

    /// ユーザーがレビューまたはお気に入り済みの書籍ID集合を返す。
    async fn excluded_book_ids(&self, user_id: i64) -> Result<HashSet<i64>>;

    /// ユーザーのお気に入り書籍を返す。
    async fn favorited_books(&self, user_id: i64) -> Result<Vec<BookRecord>>;

    /// ユーザーのレビュー済み書籍（評価値付き）を返す。削除済みレビューは含まない。
    async fn reviewed_books(&self, user_id: i64) -> Result<Vec<ReviewedBook>>;

    /// 人気書籍の終端フォールバッククエリ。
    /// 評価3.5以上かつレビュー1件以上の書籍を、レビュー数降順・評価降順で返す。
    async fn popular_books(
        &self,
        exclude_ids: &HashSet<i64>,
        limit: i64,
    ) -> Result<Vec<BookRecord>>;
}

/// PostgreSQL実装。
#[derive(Debug, Clone)]
pub struct PgCatalogDao {
    pool: PgPool,
}

impl PgCatalogDao {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn exclude_vec(exclude_ids: &HashSet<i64>) -> Vec<i64> {
        exclude_ids.iter().copied().collect()
    }
}

#[async_trait]
impl CatalogDao for PgCatalogDao {
    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .context("catalog database ping failed")?;
        Ok(())
    }

    async fn list_candidates(
        &self,
        exclude_ids: &HashSet<i64>,
        genre: Option<&str>,
    ) -> Result<Vec<BookRecord>> {
        let sql = format!(
            r"
            SELECT {BOOK_COLUMNS}
            FROM books b
            WHERE b.id <> ALL($1)
              AND ($2::TEXT IS NULL OR $2 = ANY(b.genres))
            "
        );
        let books = sqlx::query_as::<_, BookRecord>(&sql)
            .bind(Self::exclude_vec(exclude_ids))
            .bind(genre)
            .fetch_all(&self.pool)
            .await
            .context("failed to load candidate books")?;
        Ok(books)
    }

    async fn excluded_book_ids(&self, user_id: i64) -> Result<HashSet<i64>> {
        let ids: Vec<i64> = sqlx::query_scalar(
            r"
            SELECT r.book_id::BIGINT FROM reviews r
            WHERE r.user_id = $1 AND NOT r.is_deleted
            UNION
            SELECT f.book_id::BIGINT FROM user_favorites f
            WHERE f.user_id = $1
            ",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .context("failed to load interacted book ids")?;
        Ok(ids.into_iter().collect())
    }

    async fn favorited_books(&self, user_id: i64) -> Result<Vec<BookRecord>> {
        let sql = format!(
            r"
            SELECT {BOOK_COLUMNS}
            FROM books b
            JOIN user_favorites f ON f.book_id = b.id
            WHERE f.user_id = $1
            ORDER BY f.created_at
            "
        );
        let books = sqlx::query_as::<_, BookRecord>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .context("failed to load favorited books")?;
        Ok(books)
    }

    async fn reviewed_books(&self, user_id: i64) -> Result<Vec<ReviewedBook>> {
        let sql = format!(
            r"
            SELECT {BOOK_COLUMNS}, r.rating
            FROM books b
            JOIN reviews r ON r.book_id = b.id
            WHERE r.user_id = $1 AND NOT r.is_deleted
            ORDER BY r.created_at
            "
        );
        let books = sqlx::query_as::<_, ReviewedBook>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .context("failed to load reviewed books")?;
        Ok(books)
    }

    async fn popular_books(
        &self,
        exclude_ids: &HashSet<i64>,
        limit: i64,
    ) -> Result<Vec<BookRecord>> {
        let sql = format!(
            r"
            SELECT {BOOK_COLUMNS}
            FROM books b
            WHERE b.id <> ALL($1)
              AND b.average_rating >= 3.5
              AND b.total_reviews > 0
            ORDER BY b.total_reviews DESC, b.average_rating DESC, b.id ASC
            LIMIT $2
            "
        );
        let books = sqlx::query_as::<_, BookRecord>(&sql)
            .bind(Self::exclude_vec(exclude_ids))
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .context("failed to load popular books")?;
        Ok(books)
    }
}
