//! User preference modeling derived from favorited books.

use std::collections::BTreeSet;

use rustc_hash::FxHashMap;

use crate::store::models::{BookRecord, ReviewedBook};

/// ユーザーの嗜好シグナル（お気に入り＋レビュー）。
#[derive(Debug, Clone, Default)]
pub struct UserHistory {
    pub favorites: Vec<BookRecord>,
    pub reviews: Vec<ReviewedBook>,
}

impl UserHistory {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.favorites.is_empty() && self.reviews.is_empty()
    }
}

/// ジャンル名から重みへのマッピング。お気に入り書籍から導出される。
///
/// 空でないプロファイルの重みは合計1.0になる。空のプロファイルは
/// 「嗜好履歴なし」を表す定義済み状態であり、エラーではない。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PreferenceProfile {
    weights: FxHashMap<String, f32>,
}

impl PreferenceProfile {
    /// お気に入り書籍からプロファイルを構築する。
    ///
    /// 各書籍のジャンル集合は一度だけ数える（重複ジャンルは書籍単位で除去）。
    /// 重みはジャンル出現数の合計で正規化され、合計1.0となる。
    #[must_use]
    pub fn from_favorites(favorites: &[BookRecord]) -> Self {
        let mut counts: FxHashMap<String, u32> = FxHashMap::default();
        for book in favorites {
            let distinct: BTreeSet<&str> = book.genres.iter().map(String::as_str).collect();
            for genre in distinct {
                *counts.entry(genre.to_string()).or_insert(0) += 1;
            }
        }

        let total: u32 = counts.values().sum();
        if total == 0 {
            return Self::default();
        }

        #[allow(clippy::cast_precision_loss)]
        let total = total as f32;
        let weights = counts
            .into_iter()
            .map(|(genre, count)| {
                #[allow(clippy::cast_precision_loss)]
                let count = count as f32;
                (genre, count / total)
            })
            .collect();
        Self { weights }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// 指定ジャンルの重みを返す。未登録の場合は0.0。
    #[must_use]
    pub fn weight(&self, genre: &str) -> f32 {
        self.weights.get(genre).copied().unwrap_or(0.0)
    }

    #[must_use]
    pub fn contains(&self, genre: &str) -> bool {
        self.weights.contains_key(genre)
    }
}
