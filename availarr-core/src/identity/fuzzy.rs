//! Title/year scoring used when an item carries no usable identifier.

use crate::providers::CatalogMatch;

/// Lowest total score accepted as a match.
pub const MIN_ACCEPT_SCORE: f64 = 50.0;
/// Candidates considered per search, in catalog relevance order.
pub const MAX_CANDIDATES: usize = 5;

const EXACT_TITLE: f64 = 100.0;
const PARTIAL_TITLE: f64 = 50.0;
const EXACT_YEAR: f64 = 50.0;
const NEAR_YEAR: f64 = 25.0;
const POPULARITY_CEILING: f64 = 1000.0;
const POPULARITY_WEIGHT: f64 = 0.5;

/// Lowercases, drops punctuation and collapses whitespace.
pub fn normalize_title(title: &str) -> String {
    let kept: String = title
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect();
    kept.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn score_candidate(title: &str, year: Option<i32>, candidate: &CatalogMatch) -> f64 {
    let wanted = normalize_title(title);
    let found = normalize_title(&candidate.title);

    let mut score = if !wanted.is_empty() && wanted == found {
        EXACT_TITLE
    } else if !wanted.is_empty()
        && !found.is_empty()
        && (found.contains(&wanted) || wanted.contains(&found))
    {
        PARTIAL_TITLE
    } else {
        0.0
    };

    if let (Some(wanted), Some(found)) = (year, candidate.year) {
        match (wanted - found).abs() {
            0 => score += EXACT_YEAR,
            1 => score += NEAR_YEAR,
            _ => {}
        }
    }

    // Tiebreak only: never worth a full point.
    let popularity = candidate.popularity.clamp(0.0, POPULARITY_CEILING);
    score + popularity / POPULARITY_CEILING * POPULARITY_WEIGHT
}

/// Best of the first [`MAX_CANDIDATES`] candidates, if it clears
/// [`MIN_ACCEPT_SCORE`].
pub fn best_match<'a>(
    title: &str,
    year: Option<i32>,
    candidates: &'a [CatalogMatch],
) -> Option<(&'a CatalogMatch, f64)> {
    candidates
        .iter()
        .take(MAX_CANDIDATES)
        .map(|candidate| (candidate, score_candidate(title, year, candidate)))
        .fold(None, |best: Option<(&CatalogMatch, f64)>, (candidate, score)| match best {
            Some((_, best_score)) if best_score >= score => best,
            _ => Some((candidate, score)),
        })
        .filter(|(_, score)| *score >= MIN_ACCEPT_SCORE)
}
