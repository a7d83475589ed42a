//! Pure scoring functions for the recommendation strategies.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use super::profile::PreferenceProfile;
use super::strategy::ScoredCandidate;
use crate::store::models::BookRecord;

/// レビュー数ボーナスの上限。評価0.1刻みの段差を越えないよう抑える。
const REVIEW_BONUS_CAP: f32 = 0.1;
const REVIEW_BONUS_DIVISOR: f32 = 1000.0;

/// ジャンル嗜好スコアの倍率（ジャンル一致が評価値を支配するように拡大）。
const PREFERENCE_SCALE: f32 = 100.0;
const MATCH_PERCENTAGE_SCALE: f32 = 10.0;
const EXACT_SET_BONUS: f32 = 50.0;
const RATING_TIEBREAK_DIVISOR: f32 = 1000.0;

/// Top-Rated score: average rating plus a capped review-count bonus.
///
/// The bonus only breaks ties between equally-rated books; it can never
/// reorder two different rating tiers.
#[must_use]
pub fn top_rated_score(book: &BookRecord) -> f32 {
    #[allow(clippy::cast_precision_loss)]
    let review_count = book.review_count.max(0) as f32;
    book.average_rating + (review_count / REVIEW_BONUS_DIVISOR).min(REVIEW_BONUS_CAP)
}

/// Top-Rated戦略。空でない候補に対しては決して失敗せず、空も返さない。
#[must_use]
pub fn top_rated(candidates: &[BookRecord], genre: Option<&str>) -> Vec<ScoredCandidate> {
    let mut items: Vec<ScoredCandidate> = candidates
        .iter()
        .map(|book| {
            let reason = match genre {
                Some(genre) => format!("Top-rated {genre} book"),
                None => format!(
                    "Rated {:.1} across {} reviews",
                    book.average_rating, book.review_count
                ),
            };
            ScoredCandidate {
                book: book.clone(),
                score: top_rated_score(book),
                reason,
            }
        })
        .collect();
    sort_candidates(&mut items);
    items
}

/// Genre-Similarity戦略。
///
/// 空のプロファイルでは即座に空を返す（次戦略へのフォールバック信号）。
/// プロファイルと重なるジャンルを持たない候補はスコア0ではなく除外される。
#[must_use]
pub fn genre_similarity(
    candidates: &[BookRecord],
    profile: &PreferenceProfile,
    favorites: &[BookRecord],
) -> Vec<ScoredCandidate> {
    if profile.is_empty() {
        return Vec::new();
    }

    let favorite_sets: Vec<BTreeSet<&str>> = favorites
        .iter()
        .map(|book| book.genres.iter().map(String::as_str).collect())
        .collect();

    let mut items: Vec<ScoredCandidate> = candidates
        .iter()
        .filter_map(|book| {
            let genre_set: BTreeSet<&str> = book.genres.iter().map(String::as_str).collect();
            let matching: Vec<&str> = genre_set
                .iter()
                .copied()
                .filter(|genre| profile.contains(genre))
                .collect();
            if matching.is_empty() {
                return None;
            }

            let preference_score: f32 = matching.iter().map(|genre| profile.weight(genre)).sum();
            let base_score = preference_score * PREFERENCE_SCALE;

            #[allow(clippy::cast_precision_loss)]
            let match_percentage = matching.len() as f32 / genre_set.len() as f32;
            let percentage_bonus = match_percentage * MATCH_PERCENTAGE_SCALE;

            let exact_set_bonus = if favorite_sets.iter().any(|set| *set == genre_set) {
                EXACT_SET_BONUS
            } else {
                0.0
            };

            // 微小項。符号は負になり得るが、僅差の順位のみを動かす
            let rating_tiebreak = (book.average_rating - 3.0) / RATING_TIEBREAK_DIVISOR;

            let score = base_score + percentage_bonus + exact_set_bonus + rating_tiebreak;
            let reason = format!("Matches your interest in {}", matching.join(", "));

            Some(ScoredCandidate {
                book: book.clone(),
                score,
                reason,
            })
        })
        .collect();
    sort_candidates(&mut items);
    items
}

/// 共通の決定的ソート: スコア降順、同点は評価降順、さらに同点はID昇順。
pub fn sort_candidates(items: &mut [ScoredCandidate]) {
    items.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| {
                b.book
                    .average_rating
                    .partial_cmp(&a.book.average_rating)
                    .unwrap_or(Ordering::Equal)
            })
            .then_with(|| a.book.id.cmp(&b.book.id))
    });
}

/// Compute cosine similarity between two vectors.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot_product: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::test_support::book;

    #[test]
    fn review_bonus_is_capped_below_a_rating_step() {
        let few_reviews = book(1, &[], 4.2, 10);
        let many_reviews = book(2, &[], 4.2, 1000);

        let low = top_rated_score(&few_reviews);
        let high = top_rated_score(&many_reviews);

        assert!(high >= low, "more reviews must never score lower");
        assert!(
            (high - low).abs() <= REVIEW_BONUS_CAP + f32::EPSILON,
            "identical ratings must differ by at most the bonus cap"
        );
    }

    #[test]
    fn review_bonus_never_crosses_rating_tiers() {
        let lower_tier = book(1, &[], 4.1, 1_000_000);
        let upper_tier = book(2, &[], 4.2, 0);
        assert!(top_rated_score(&upper_tier) > top_rated_score(&lower_tier));
    }

    #[test]
    fn top_rated_reason_names_genre_when_filtered() {
        let candidates = vec![book(1, &["Mystery"], 4.0, 100)];

        let with_genre = top_rated(&candidates, Some("Mystery"));
        assert!(with_genre[0].reason.contains("Mystery"));

        let without_genre = top_rated(&candidates, None);
        assert!(without_genre[0].reason.contains("4.0"));
        assert!(without_genre[0].reason.contains("100"));
    }

    #[test]
    fn genre_similarity_requires_a_profile() {
        let candidates = vec![book(1, &["Mystery"], 4.0, 10)];
        let profile = PreferenceProfile::from_favorites(&[]);
        assert!(genre_similarity(&candidates, &profile, &[]).is_empty());
    }

    #[test]
    fn full_genre_match_beats_partial_match_beats_no_overlap() {
        // お気に入り: {Mystery, Thriller} の1冊
        let favorites = vec![book(10, &["Mystery", "Thriller"], 4.0, 50)];
        let profile = PreferenceProfile::from_favorites(&favorites);

        let candidate_a = book(1, &["Mystery", "Thriller"], 3.8, 20);
        let candidate_b = book(2, &["Mystery"], 3.9, 30);
        // Cは無関係ジャンルだが評価は最高
        let candidate_c = book(3, &["Romance"], 5.0, 900);
        let candidates = vec![candidate_c.clone(), candidate_b.clone(), candidate_a.clone()];

        let scored = genre_similarity(&candidates, &profile, &favorites);

        // Cはジャンル重複なしのため除外される
        assert_eq!(scored.len(), 2);
        assert_eq!(scored[0].book.id, 1, "full match must rank first");
        assert_eq!(scored[1].book.id, 2);
        assert!(scored[0].score > scored[1].score);
    }

    #[test]
    fn exact_set_bonus_applies_only_on_set_equality() {
        let favorites = vec![book(10, &["Mystery", "Thriller"], 4.0, 50)];
        let profile = PreferenceProfile::from_favorites(&favorites);

        // 同一集合（順序違い）はボーナス対象
        let exact = book(1, &["Thriller", "Mystery"], 3.0, 10);
        // 上位集合は対象外
        let superset = book(2, &["Mystery", "Thriller", "Horror"], 3.0, 10);
        let scored = genre_similarity(&[exact, superset], &profile, &favorites);

        assert_eq!(scored[0].book.id, 1);
        // 完全一致: 100 + 10 + 50; 上位集合: 100 + (2/3)*10
        assert!(scored[0].score - scored[1].score > 40.0);
    }

    #[test]
    fn matching_genres_are_reported_in_the_reason() {
        let favorites = vec![book(10, &["Mystery", "Thriller"], 4.0, 50)];
        let profile = PreferenceProfile::from_favorites(&favorites);
        let scored = genre_similarity(
            &[book(1, &["Thriller", "Mystery"], 4.0, 10)],
            &profile,
            &favorites,
        );
        assert_eq!(scored[0].reason, "Matches your interest in Mystery, Thriller");
    }

    #[test]
    fn sort_is_deterministic_for_equal_scores() {
        let mut items = vec![
            ScoredCandidate {
                book: book(3, &[], 4.0, 10),
                score: 1.0,
                reason: String::new(),
            },
            ScoredCandidate {
                book: book(1, &[], 4.0, 10),
                score: 1.0,
                reason: String::new(),
            },
            ScoredCandidate {
                book: book(2, &[], 4.5, 10),
                score: 1.0,
                reason: String::new(),
            },
        ];
        sort_candidates(&mut items);

        // 同点スコアは評価降順、次にID昇順
        let ids: Vec<i64> = items.iter().map(|item| item.book.id).collect();
        assert_eq!(ids, vec![2, 1, 3]);
    }

    #[test]
    fn cosine_similarity_handles_zero_vectors() {
        assert!((cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]) - 0.0).abs() < f32::EPSILON);
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]) - 0.0).abs() < 1e-6);
    }
}
