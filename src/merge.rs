//! Completeness policy for reconciling two versions of the same charity.
//!
//! This is a one-directional heuristic, not a field-wise merge: the first rule
//! that favors the candidate decides the whole outcome.

use crate::models::Charity;

/// Whether `candidate` should replace `existing` in the cache.
///
/// Rules are evaluated in order and short-circuit:
/// 1. candidate has a hero image and existing does not
/// 2. candidate has a logo image and existing does not
/// 3. descriptions differ
/// 4. locations differ
/// 5. candidate has more primary tags
pub fn supersedes(candidate: &Charity, existing: &Charity) -> bool {
    (candidate.hero_image.is_some() && existing.hero_image.is_none())
        || (candidate.logo_image.is_some() && existing.logo_image.is_none())
        || candidate.description != existing.description
        || candidate.location != existing.location
        || candidate.primary_tags.len() > existing.primary_tags.len()
}

/// Pick the version to keep. Ties keep `existing`.
pub fn select_better<'a>(existing: &'a Charity, candidate: &'a Charity) -> &'a Charity {
    if supersedes(candidate, existing) {
        candidate
    } else {
        existing
    }
}
