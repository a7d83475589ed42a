//! Strategy variants and outcome types for the recommendation engine.

use crate::store::models::BookRecord;

/// 要求可能な推薦戦略の種別。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    TopRated,
    Similar,
    Ai,
}

impl StrategyKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            StrategyKind::TopRated => "top_rated",
            StrategyKind::Similar => "similar",
            StrategyKind::Ai => "ai",
        }
    }
}

/// フォールバック連鎖内の1ステップ。
///
/// 要求種別ごとの連鎖は順序付きテーブルで表現し、オーケストレータは
/// 先頭から歩いて最初の非例外・非空出力で停止する。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StrategyStep {
    Embedding,
    GenreSimilarity,
    TopRated,
}

/// 要求種別に対応する戦略連鎖を返す。
pub(crate) fn chain_for(kind: StrategyKind) -> &'static [StrategyStep] {
    match kind {
        StrategyKind::TopRated => &[StrategyStep::TopRated],
        // 埋め込み戦略はジャンル一致では捉えられないパターンを拾えるため、
        // コストが高くても先に試行する
        StrategyKind::Similar | StrategyKind::Ai => &[
            StrategyStep::Embedding,
            StrategyStep::GenreSimilarity,
            StrategyStep::TopRated,
        ],
    }
}

/// 戦略が算出した候補とスコア。スコアは戦略内でのみ比較可能。
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCandidate {
    pub book: BookRecord,
    pub score: f32,
    pub reason: String,
}

/// 1リクエスト分の推薦結果。返却後は不変。
#[derive(Debug, Clone, PartialEq)]
pub struct Recommendations {
    pub items: Vec<ScoredCandidate>,
    pub strategy_used: StrategyKind,
    pub is_fallback: bool,
    pub fallback_reason: Option<String>,
    pub ai_powered: bool,
}

impl Recommendations {
    /// 要求された戦略がそのまま成功した結果。
    #[must_use]
    pub(crate) fn primary(items: Vec<ScoredCandidate>, strategy_used: StrategyKind, ai_powered: bool) -> Self {
        Self {
            items,
            strategy_used,
            is_fallback: false,
            fallback_reason: None,
            ai_powered,
        }
    }

    /// フォールバック戦略による結果。
    #[must_use]
    pub(crate) fn fallback(
        items: Vec<ScoredCandidate>,
        strategy_used: StrategyKind,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            items,
            strategy_used,
            is_fallback: true,
            fallback_reason: Some(reason.into()),
            ai_powered: false,
        }
    }

    /// 全段失敗時の空結果。呼び出し側へ例外は決して伝播しない。
    #[must_use]
    pub(crate) fn empty_fallback(reason: impl Into<String>) -> Self {
        Self::fallback(Vec::new(), StrategyKind::TopRated, reason)
    }
}
