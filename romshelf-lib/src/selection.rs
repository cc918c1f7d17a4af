//! One-game-one-ROM selection scoring.
//!
//! Given duplicate copies of one game, score each candidate under a
//! region/verification/revision policy and pick the lowest score. The
//! function is pure: persisting the result is the caller's job.

use serde::{Deserialize, Serialize};

/// Policy knobs for picking the preferred copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionPolicy {
    /// Most preferred region first.
    pub region_priority: Vec<String>,
    pub prefer_verified: bool,
    pub prefer_highest_revision: bool,
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        Self {
            region_priority: vec!["USA".to_string(), "Europe".to_string(), "Japan".to_string()],
            prefer_verified: true,
            prefer_highest_revision: true,
        }
    }
}

/// One copy competing for "preferred".
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub artifact_id: i64,
    pub region: Option<String>,
    pub verified: bool,
    pub revision: Option<f64>,
}

/// Outcome of a selection run.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub winner_id: i64,
    /// Every other candidate, best first.
    pub secondary: Vec<i64>,
    /// Score per candidate, in input order. Lower is better.
    pub scores: Vec<(i64, f64)>,
}

/// Score a single candidate. Lower is better.
pub fn score(candidate: &Candidate, policy: &SelectionPolicy) -> f64 {
    let len = policy.region_priority.len();
    let mut score = match &candidate.region {
        Some(region) => policy
            .region_priority
            .iter()
            .position(|r| r.eq_ignore_ascii_case(region))
            .unwrap_or(len) as f64,
        None => (len + 1) as f64,
    };

    if policy.prefer_verified && !candidate.verified {
        score += (len + 2) as f64;
    }

    if policy.prefer_highest_revision {
        // A missing revision counts as -inf, which pushes the score to +inf.
        score -= candidate.revision.unwrap_or(f64::NEG_INFINITY) / 1000.0;
    }

    score
}

/// Pick exactly one winner among `candidates`.
///
/// Sorting is stable, so equal scores keep their input order and the
/// earliest candidate wins the tie. Returns `None` for an empty slice.
pub fn select(candidates: &[Candidate], policy: &SelectionPolicy) -> Option<Selection> {
    let scores: Vec<(i64, f64)> = candidates
        .iter()
        .map(|c| (c.artifact_id, score(c, policy)))
        .collect();

    let mut ranked = scores.clone();
    ranked.sort_by(|a, b| a.1.total_cmp(&b.1));

    let mut ids = ranked.into_iter().map(|(id, _)| id);
    let winner_id = ids.next()?;
    Some(Selection {
        winner_id,
        secondary: ids.collect(),
        scores,
    })
}

/// Parse a catalog revision label into a number.
///
/// Accepts plain numbers (`"1"`, `"1.02"`), prefixed forms (`"Rev 2"`,
/// `"v1.1"`, `"Revision 3"`) and single letters (`"A"` = 1, `"B"` = 2).
pub fn parse_revision(label: &str) -> Option<f64> {
    let trimmed = label.trim();
    let lower = trimmed.to_ascii_lowercase();
    let rest = ["revision", "rev", "v"]
        .iter()
        .find_map(|prefix| lower.strip_prefix(prefix))
        .map(|r| r.trim_start_matches(['.', ' ']).trim())
        .unwrap_or(lower.trim());

    if rest.is_empty() {
        return None;
    }
    if let Ok(n) = rest.parse::<f64>() {
        return n.is_finite().then_some(n);
    }

    let mut chars = rest.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii_alphabetic() => {
            Some((c.to_ascii_uppercase() as u8 - b'A' + 1) as f64)
        }
        _ => None,
    }
}

#[cfg(test)]
#[path = "tests/selection_tests.rs"]
mod tests;
