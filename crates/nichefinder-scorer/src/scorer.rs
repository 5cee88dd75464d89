//! Opportunity scoring over a completed product batch.

use nichefinder_core::{FilterCriteria, ProductRecord};
use serde::Serialize;

/// A product with its criteria verdict and opportunity score.
///
/// Only [`score`] builds these; lower scores are better opportunities.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredProductRecord {
    #[serde(flatten)]
    product: ProductRecord,
    meets_criteria: bool,
    opportunity_score: Option<f64>,
}

impl ScoredProductRecord {
    #[must_use]
    pub fn product(&self) -> &ProductRecord {
        &self.product
    }

    #[must_use]
    pub fn meets_criteria(&self) -> bool {
        self.meets_criteria
    }

    /// `None` when the product has no rank.
    #[must_use]
    pub fn opportunity_score(&self) -> Option<f64> {
        self.opportunity_score
    }

    #[must_use]
    pub fn into_product(self) -> ProductRecord {
        self.product
    }
}

/// `rank + review_count * review_weight`, or `None` without a rank.
#[must_use]
#[allow(clippy::cast_precision_loss)] // ranks and review counts are far below 2^52
pub fn opportunity_score(product: &ProductRecord, criteria: &FilterCriteria) -> Option<f64> {
    product
        .rank()
        .map(|rank| rank as f64 + product.review_count() as f64 * criteria.review_weight)
}

/// Price within the inclusive band, rank present and at most `max_rank`,
/// reviews at most `max_reviews`.
#[must_use]
pub fn meets_criteria(product: &ProductRecord, criteria: &FilterCriteria) -> bool {
    criteria.price_in_band(product.price())
        && product.rank().is_some_and(|rank| rank <= criteria.max_rank)
        && product.review_count() <= criteria.max_reviews
}

/// Scores every record and orders them ascending by opportunity score.
///
/// Ties keep input order. Records without a rank cannot be scored: they
/// follow all ranked records, in input order, never meeting the criteria.
/// The output depends only on the arguments.
#[must_use]
pub fn score(records: &[ProductRecord], criteria: &FilterCriteria) -> Vec<ScoredProductRecord> {
    let (mut ranked, unranked): (Vec<_>, Vec<_>) = records
        .iter()
        .map(|product| ScoredProductRecord {
            product: product.clone(),
            meets_criteria: meets_criteria(product, criteria),
            opportunity_score: opportunity_score(product, criteria),
        })
        .partition(|scored| scored.opportunity_score.is_some());

    // `sort_by` is stable, so equal scores keep input order.
    ranked.sort_by(|a, b| {
        let a = a.opportunity_score.unwrap_or(f64::INFINITY);
        let b = b.opportunity_score.unwrap_or(f64::INFINITY);
        a.total_cmp(&b)
    });

    ranked.extend(unranked);
    ranked
}
