//! Candidate selection over the catalog store.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;

use crate::store::dao::CatalogDao;
use crate::store::models::BookRecord;

/// 候補セレクタ。カタログから除外集合外の書籍を読み出す。
///
/// 出力の順序は保証しない（順序付けは各戦略の責務）。副作用なし。
pub struct CandidateSelector {
    dao: Arc<dyn CatalogDao>,
}

impl CandidateSelector {
    #[must_use]
    pub fn new(dao: Arc<dyn CatalogDao>) -> Self {
        Self { dao }
    }

    /// 除外集合に含まれない候補書籍を取得する。
    ///
    /// `genre`指定時はそのジャンルを厳密一致（大文字小文字区別）で含む
    /// 書籍のみを残す。
    ///
    /// # Errors
    /// カタログ自体のI/O失敗のみを伝播する。オーケストレータはこれを
    /// 「候補なし」として扱う。
    pub async fn select(
        &self,
        exclude_ids: &HashSet<i64>,
        genre: Option<&str>,
    ) -> Result<Vec<BookRecord>> {
        let candidates = self.dao.list_candidates(exclude_ids, genre).await?;
        debug_assert!(
            candidates.iter().all(|book| !exclude_ids.contains(&book.id)),
            "catalog returned an excluded book id"
        );
        Ok(candidates)
    }
}
