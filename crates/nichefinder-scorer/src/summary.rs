use serde::Serialize;

use crate::scorer::ScoredProductRecord;

/// Headline numbers for a scored batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreSummary {
    pub total: usize,
    pub meeting_criteria: usize,
    pub unranked: usize,
    /// Title and score of the best-scored product that meets the criteria.
    pub best: Option<(String, f64)>,
}

/// Summarizes scorer output. Expects the ascending order [`crate::score`]
/// produces, so the first qualifying record is the best.
#[must_use]
pub fn summarize(scored: &[ScoredProductRecord]) -> ScoreSummary {
    let best = scored
        .iter()
        .filter(|s| s.meets_criteria())
        .find_map(|s| {
            s.opportunity_score()
                .map(|score| (s.product().title().to_owned(), score))
        });

    ScoreSummary {
        total: scored.len(),
        meeting_criteria: scored.iter().filter(|s| s.meets_criteria()).count(),
        unranked: scored
            .iter()
            .filter(|s| s.opportunity_score().is_none())
            .count(),
        best,
    }
}
