//! Percent Present
//!
//! Sum of the percents of components whose value meets the condition,
//! clamped to 0-100. Always a number, never null.

use super::ComponentRating;
use crate::config::PresenceCondition;
use crate::utils::value::{Cell, RatingValue};

pub fn percent_present(
    components: &[ComponentRating],
    condition: &PresenceCondition,
) -> (Option<f64>, Cell) {
    let present: f64 = components
        .iter()
        .filter(|c| condition.matches(&c.value))
        .map(|c| c.percent)
        .sum();
    let present = present.clamp(0.0, 100.0);
    (Some(present), Some(RatingValue::Number(present)))
}
