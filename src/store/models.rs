use sqlx::FromRow;

/// カタログ上の書籍レコード（エンジンからは読み取り専用）。
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct BookRecord {
    pub id: i64,
    pub title: String,
    pub author: String,
    pub genres: Vec<String>,
    pub average_rating: f32,
    pub review_count: i32,
    pub publication_year: Option<i32>,
    pub description: Option<String>,
}

impl BookRecord {
    /// ジャンルが設定されているかどうか。
    #[must_use]
    pub fn has_genre(&self, genre: &str) -> bool {
        self.genres.iter().any(|g| g == genre)
    }
}

/// ユーザーがレビュー済みの書籍と評価値。
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct ReviewedBook {
    #[sqlx(flatten)]
    pub book: BookRecord,
    pub rating: i32,
}
