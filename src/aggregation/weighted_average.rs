//! Weighted Average
//!
//! `sum(percent * value) / sum(percent)` over components with a numeric
//! value. Nulls have already been dropped or replaced by the filter step,
//! so a null replaced by zero counts in the denominator.

use super::ComponentRating;
use crate::utils::value::{Cell, RatingValue};

/// Returns the summed contributing percent and the average; both are
/// `None` when nothing contributes
pub fn weighted_average(components: &[ComponentRating]) -> (Option<f64>, Cell) {
    let (weighted, total) = components
        .iter()
        .filter_map(|c| c.value.as_ref().and_then(RatingValue::as_f64).map(|v| (c.percent, v)))
        .fold((0.0, 0.0), |(num, den), (pct, v)| (num + pct * v, den + pct));

    if total <= 0.0 {
        return (None, None);
    }
    (Some(total), Some(RatingValue::Number(weighted / total)))
}
