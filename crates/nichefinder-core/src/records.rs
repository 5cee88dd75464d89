//! Typed records produced by page extraction.
//!
//! Constructors enforce the record invariants, so a record that exists is
//! always complete: titles and names are non-empty, prices are non-negative
//! and ranks are positive.

use rust_decimal::Decimal;
use serde::Serialize;

use crate::CoreError;

/// Product details pulled from one product page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductRecord {
    title: String,
    price: Decimal,
    review_count: u64,
    rank: Option<u64>,
    source_url: String,
}

impl ProductRecord {
    /// Builds a product record, trimming the title.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidRecord`] if the title is blank, the price
    /// is negative, or the rank is zero.
    pub fn new(
        title: &str,
        price: Decimal,
        review_count: u64,
        rank: Option<u64>,
        source_url: &str,
    ) -> Result<Self, CoreError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(CoreError::InvalidRecord(format!(
                "product at {source_url} has an empty title"
            )));
        }
        if price < Decimal::ZERO {
            return Err(CoreError::InvalidRecord(format!(
                "product at {source_url} has negative price {price}"
            )));
        }
        if rank == Some(0) {
            return Err(CoreError::InvalidRecord(format!(
                "product at {source_url} has rank 0; ranks start at 1"
            )));
        }

        Ok(Self {
            title: title.to_owned(),
            price,
            review_count,
            rank,
            source_url: source_url.to_owned(),
        })
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn price(&self) -> Decimal {
        self.price
    }

    #[must_use]
    pub fn review_count(&self) -> u64 {
        self.review_count
    }

    /// Best-seller rank, when the page exposed one.
    #[must_use]
    pub fn rank(&self) -> Option<u64> {
        self.rank
    }

    #[must_use]
    pub fn source_url(&self) -> &str {
        &self.source_url
    }
}

/// A named link harvested from a directory or listing page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryRecord {
    name: String,
    target_url: String,
}

impl CategoryRecord {
    /// Builds a category record from trimmed link text and an absolute URL.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidRecord`] if the name is blank or the URL
    /// is not absolute.
    pub fn new(name: &str, target_url: &str) -> Result<Self, CoreError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CoreError::InvalidRecord(format!(
                "link to {target_url} has no visible text"
            )));
        }
        let parsed = url::Url::parse(target_url.trim()).map_err(|e| {
            CoreError::InvalidRecord(format!("link \"{name}\" has non-absolute URL: {e}"))
        })?;
        if parsed.cannot_be_a_base() {
            return Err(CoreError::InvalidRecord(format!(
                "link \"{name}\" points at {parsed}, which is not a navigable URL"
            )));
        }

        Ok(Self {
            name: name.to_owned(),
            target_url: parsed.to_string(),
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn target_url(&self) -> &str {
        &self.target_url
    }
}

/// One successfully extracted record of either kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Record {
    Product(ProductRecord),
    Category(CategoryRecord),
}

impl Record {
    #[must_use]
    pub fn as_product(&self) -> Option<&ProductRecord> {
        match self {
            Record::Product(p) => Some(p),
            Record::Category(_) => None,
        }
    }

    #[must_use]
    pub fn as_category(&self) -> Option<&CategoryRecord> {
        match self {
            Record::Category(c) => Some(c),
            Record::Product(_) => None,
        }
    }
}
