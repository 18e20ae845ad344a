//! Error taxonomy for rating runs
//!
//! Boundary code (store reads, config loading, the engine) returns
//! `anyhow::Result` and wraps these variants with context. Callers that need
//! to react to a specific failure can `downcast_ref::<RatingError>()`.

use thiserror::Error;

/// Result type alias using RatingError.
pub type RatingResult<T> = Result<T, RatingError>;

/// Failures raised by the aggregation core.
#[derive(Debug, Error)]
pub enum RatingError {
    /// A required hierarchy level returned zero rows.
    #[error("required source table '{table}' has no rows")]
    MissingSourceTable { table: String },

    /// A tie-break was asked to pick from nothing.
    #[error("no candidates to aggregate for {context}")]
    EmptyAggregationSet { context: String },

    /// Observed value missing from the declared domain list.
    #[error("value '{value}' is not in the domain for '{attribute}'; ranked at trailing index {rank}")]
    UnrankedDomainValue {
        attribute: String,
        value: String,
        rank: usize,
    },

    #[error("table '{table}' is missing column '{column}' (available: {available:?})")]
    MissingColumn {
        table: String,
        column: String,
        available: Vec<String>,
    },

    #[error("invalid attribute config '{attribute}': {reason}")]
    InvalidConfig { attribute: String, reason: String },

    #[error("store error on table '{table}': {message}")]
    Store { table: String, message: String },
}

impl RatingError {
    pub fn empty_set(context: impl Into<String>) -> Self {
        RatingError::EmptyAggregationSet {
            context: context.into(),
        }
    }

    pub fn invalid_config(attribute: &str, reason: impl Into<String>) -> Self {
        RatingError::InvalidConfig {
            attribute: attribute.to_string(),
            reason: reason.into(),
        }
    }

    /// True for failures that end the current attribute's run.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, RatingError::UnrankedDomainValue { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_carry_keys() {
        let err = RatingError::empty_set("map unit 123456");
        assert!(err.to_string().contains("123456"));

        let err = RatingError::MissingSourceTable {
            table: "chorizon".to_string(),
        };
        assert!(err.to_string().contains("chorizon"));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_unranked_value_is_recoverable() {
        let err = RatingError::UnrankedDomainValue {
            attribute: "drainagecl".to_string(),
            value: "Subaqueous".to_string(),
            rank: 9,
        };
        assert!(!err.is_fatal());
        assert!(err.to_string().contains("Subaqueous"));
    }
}
