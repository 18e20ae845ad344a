//! Rating values
//!
//! A rating cell is either numeric (bulk density, AWS, fuzzy values) or a
//! class label (drainage class, interpretation rating). `Cell` is the
//! nullable form used everywhere a record can be missing its value.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// A single non-null attribute value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RatingValue {
    Number(f64),
    Text(String),
}

/// Nullable attribute value as read from a survey table
pub type Cell = Option<RatingValue>;

impl RatingValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            RatingValue::Number(v) => Some(*v),
            RatingValue::Text(s) => s.trim().parse::<f64>().ok(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            RatingValue::Text(s) => Some(s.as_str()),
            RatingValue::Number(_) => None,
        }
    }

    pub fn is_number(&self) -> bool {
        matches!(self, RatingValue::Number(_))
    }

    /// Parse raw text into a numeric value, falling back to text
    pub fn parse(raw: &str) -> Self {
        match raw.trim().parse::<f64>() {
            Ok(v) if v.is_finite() => RatingValue::Number(v),
            _ => RatingValue::Text(raw.to_string()),
        }
    }

    /// Case-insensitive key used for grouping qualitative values
    pub fn group_key(&self) -> String {
        match self {
            RatingValue::Number(v) => format!("{}", v),
            RatingValue::Text(s) => s.trim().to_uppercase(),
        }
    }

    /// Numeric order for numbers; text compares case-insensitively.
    /// Numbers sort ahead of text.
    pub fn natural_cmp(&self, other: &RatingValue) -> Ordering {
        match (self, other) {
            (RatingValue::Number(a), RatingValue::Number(b)) => a.total_cmp(b),
            (RatingValue::Number(_), RatingValue::Text(_)) => Ordering::Less,
            (RatingValue::Text(_), RatingValue::Number(_)) => Ordering::Greater,
            (RatingValue::Text(a), RatingValue::Text(b)) => {
                a.to_uppercase().cmp(&b.to_uppercase())
            }
        }
    }
}

impl fmt::Display for RatingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RatingValue::Number(v) => write!(f, "{}", v),
            RatingValue::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<f64> for RatingValue {
    fn from(v: f64) -> Self {
        RatingValue::Number(v)
    }
}

impl From<&str> for RatingValue {
    fn from(s: &str) -> Self {
        RatingValue::Text(s.to_string())
    }
}

impl From<String> for RatingValue {
    fn from(s: String) -> Self {
        RatingValue::Text(s)
    }
}
