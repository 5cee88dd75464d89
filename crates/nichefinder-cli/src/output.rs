//! CSV tables for each pipeline's results.

use std::path::Path;

use anyhow::Context;
use rust_decimal::Decimal;
use serde::Serialize;

use nichefinder_core::{CategoryRecord, ProductRecord};
use nichefinder_scorer::ScoredProductRecord;

#[derive(Debug, Serialize)]
pub(crate) struct ProductRow<'a> {
    #[serde(rename = "Title")]
    title: &'a str,
    #[serde(rename = "Price")]
    price: Decimal,
    #[serde(rename = "Review Count")]
    review_count: u64,
    #[serde(rename = "URL")]
    url: &'a str,
}

impl<'a> From<&'a ProductRecord> for ProductRow<'a> {
    fn from(p: &'a ProductRecord) -> Self {
        Self {
            title: p.title(),
            price: p.price(),
            review_count: p.review_count(),
            url: p.source_url(),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct CategoryRow<'a> {
    #[serde(rename = "Category")]
    name: &'a str,
    #[serde(rename = "URL")]
    url: &'a str,
}

impl<'a> From<&'a CategoryRecord> for CategoryRow<'a> {
    fn from(c: &'a CategoryRecord) -> Self {
        Self {
            name: c.name(),
            url: c.target_url(),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct NicheRow<'a> {
    #[serde(rename = "Title")]
    title: &'a str,
    #[serde(rename = "Price")]
    price: Decimal,
    #[serde(rename = "Reviews")]
    reviews: u64,
    #[serde(rename = "BSR")]
    rank: Option<u64>,
    #[serde(rename = "URL")]
    url: &'a str,
    #[serde(rename = "Meets Criteria")]
    meets_criteria: bool,
    #[serde(rename = "Opportunity Score")]
    opportunity_score: Option<f64>,
}

impl<'a> From<&'a ScoredProductRecord> for NicheRow<'a> {
    fn from(s: &'a ScoredProductRecord) -> Self {
        let p = s.product();
        Self {
            title: p.title(),
            price: p.price(),
            reviews: p.review_count(),
            rank: p.rank(),
            url: p.source_url(),
            meets_criteria: s.meets_criteria(),
            opportunity_score: s.opportunity_score(),
        }
    }
}

/// Writes `rows` with a header row to `path`.
///
/// An empty sequence writes nothing and returns `Ok(false)`.
///
/// # Errors
///
/// Returns an error if the file cannot be created or a row fails to
/// serialize.
pub(crate) fn write_table<R: Serialize>(path: &Path, rows: &[R]) -> anyhow::Result<bool> {
    if rows.is_empty() {
        tracing::info!(path = %path.display(), "no records collected; output not written");
        return Ok(false);
    }

    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    for row in rows {
        writer
            .serialize(row)
            .with_context(|| format!("failed to write row to {}", path.display()))?;
    }
    writer
        .flush()
        .with_context(|| format!("failed to flush {}", path.display()))?;

    tracing::info!(path = %path.display(), rows = rows.len(), "wrote output");
    Ok(true)
}
