use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::CoreError;

/// Thresholds a product must meet to count as a niche opportunity, plus the
/// weight applied to review counts in the opportunity score.
///
/// Passed explicitly into scoring; nothing reads these from global state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterCriteria {
    pub min_price: Decimal,
    pub max_price: Decimal,
    pub max_rank: u64,
    pub max_reviews: u64,
    pub review_weight: f64,
}

impl Default for FilterCriteria {
    fn default() -> Self {
        Self {
            min_price: Decimal::from(300),
            max_price: Decimal::from(800),
            max_rank: 20_000,
            max_reviews: 400,
            review_weight: 50.0,
        }
    }
}

impl FilterCriteria {
    /// Checks that the price band is ordered and the weight is usable.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidCriteria`] when `min_price > max_price`,
    /// either bound is negative, or `review_weight` is negative or not finite.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.min_price < Decimal::ZERO || self.max_price < Decimal::ZERO {
            return Err(CoreError::InvalidCriteria(
                "price bounds must be non-negative".to_string(),
            ));
        }
        if self.min_price > self.max_price {
            return Err(CoreError::InvalidCriteria(format!(
                "min_price {} exceeds max_price {}",
                self.min_price, self.max_price
            )));
        }
        if !self.review_weight.is_finite() || self.review_weight < 0.0 {
            return Err(CoreError::InvalidCriteria(format!(
                "review_weight must be a finite non-negative number, got {}",
                self.review_weight
            )));
        }
        Ok(())
    }

    /// Inclusive price-band check.
    #[must_use]
    pub fn price_in_band(&self, price: Decimal) -> bool {
        price >= self.min_price && price <= self.max_price
    }
}
