//! Tie-Break Sorter
//!
//! Every aggregation strategy ends in the same primitive: order candidates
//! by value (descending when the attribute prefers higher values), then by
//! component percent descending, and take the first.

use crate::error::{RatingError, RatingResult};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Direction used to break ties between ratings
///
/// Interpretation rules label these "Most Limiting" / "Least Limiting";
/// both labels map onto domain rank order regardless of whether the rule is
/// a limitation or a suitability rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TieBreak {
    #[default]
    #[serde(alias = "higher", alias = "Most Limiting", alias = "most_limiting")]
    Higher,
    #[serde(alias = "lower", alias = "Least Limiting", alias = "least_limiting")]
    Lower,
}

impl TieBreak {
    pub fn prefer_high(self) -> bool {
        self == TieBreak::Higher
    }

    /// Parse one of the labels shown to users
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "higher" | "high" | "most limiting" | "max" | "maximum" => Some(TieBreak::Higher),
            "lower" | "low" | "least limiting" | "min" | "minimum" => Some(TieBreak::Lower),
            _ => None,
        }
    }

    pub fn label(self, interpretation: bool) -> &'static str {
        match (self, interpretation) {
            (TieBreak::Higher, false) => "Higher",
            (TieBreak::Lower, false) => "Lower",
            (TieBreak::Higher, true) => "Most Limiting",
            (TieBreak::Lower, true) => "Least Limiting",
        }
    }
}

/// Pick the winning `(percent, value)` pair
///
/// `compare` orders two values ascending; `prefer_high` flips it. Equal
/// values fall back to the larger percent, and after that the earlier
/// candidate wins.
pub fn pick_winner<T, F>(
    candidates: &[(f64, T)],
    prefer_high: bool,
    compare: F,
    context: &str,
) -> RatingResult<(f64, T)>
where
    T: Clone,
    F: Fn(&T, &T) -> Ordering,
{
    candidates
        .iter()
        .min_by(|a, b| {
            let by_value = compare(&a.1, &b.1);
            let by_value = if prefer_high { by_value.reverse() } else { by_value };
            by_value.then_with(|| b.0.total_cmp(&a.0))
        })
        .map(|(pct, value)| (*pct, value.clone()))
        .ok_or_else(|| RatingError::empty_set(context))
}
