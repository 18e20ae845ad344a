//! Domain Value Catalog
//!
//! Ranks the legal values of a qualitative attribute so ratings can be
//! compared and grouped. Rank 0 is reserved for missing values. A declared
//! "not rated" phrase is pinned to rank 1, below every substantive rating;
//! the declared values follow in their declared order. Values that show up
//! in the data without being declared are appended at the end.

use crate::error::RatingError;
use crate::utils::frame::{i64_column, str_column};
use polars::prelude::*;
use rustc_hash::FxHashMap;
use tracing::warn;

/// Rank given to null / missing ratings
pub const NULL_RANK: usize = 0;

/// One legal value of an attribute
#[derive(Debug, Clone, PartialEq)]
pub struct DomainValue {
    pub order: usize,
    pub value: String,
    pub label: Option<String>,
}

/// Ordered legal values for one attribute
#[derive(Debug, Clone, Default)]
pub struct DomainCatalog {
    attribute: String,
    entries: Vec<DomainValue>,
    index: FxHashMap<String, usize>,
    not_rated: Option<String>,
    declared: usize,
}

fn key(value: &str) -> String {
    value.trim().to_uppercase()
}

impl DomainCatalog {
    /// Build from declared values in rank order (lowest first)
    pub fn new<S: AsRef<str>>(attribute: &str, values: &[S], not_rated: Option<&str>) -> Self {
        let mut catalog = DomainCatalog {
            attribute: attribute.to_string(),
            ..Default::default()
        };

        if let Some(phrase) = not_rated.filter(|p| !p.trim().is_empty()) {
            catalog.not_rated = Some(key(phrase));
            catalog.push(phrase, None);
        }

        for value in values {
            catalog.push(value.as_ref(), None);
        }
        catalog.declared = catalog.entries.len();
        catalog
    }

    /// Build from `(sequence, value, label)` rows, e.g. a domain detail table
    pub fn from_entries(
        attribute: &str,
        mut rows: Vec<(i64, String, Option<String>)>,
        not_rated: Option<&str>,
    ) -> Self {
        rows.sort_by_key(|(seq, _, _)| *seq);
        let values: Vec<&str> = rows.iter().map(|(_, v, _)| v.as_str()).collect();
        let mut catalog = Self::new(attribute, &values, not_rated);
        for (_, value, label) in rows {
            if let Some(&rank) = catalog.index.get(&key(&value)) {
                catalog.entries[rank - 1].label = label;
            }
        }
        catalog
    }

    /// Build from a domain frame with sequence, value, and optional label columns
    pub fn from_frame(
        attribute: &str,
        df: &DataFrame,
        sequence_col: &str,
        value_col: &str,
        label_col: Option<&str>,
        not_rated: Option<&str>,
    ) -> anyhow::Result<Self> {
        let table = format!("domain:{}", attribute);
        let sequences = i64_column(df, &table, sequence_col)?;
        let values = str_column(df, &table, value_col)?;
        let labels = match label_col {
            Some(name) => str_column(df, &table, name)?,
            None => vec![None; df.height()],
        };

        let rows = sequences
            .into_iter()
            .zip(values)
            .zip(labels)
            .enumerate()
            .filter_map(|(i, ((seq, value), label))| {
                value.map(|v| (seq.unwrap_or(i as i64), v, label))
            })
            .collect();

        Ok(Self::from_entries(attribute, rows, not_rated))
    }

    fn push(&mut self, value: &str, label: Option<String>) -> usize {
        let k = key(value);
        if let Some(&rank) = self.index.get(&k) {
            return rank;
        }
        let rank = self.entries.len() + 1;
        self.entries.push(DomainValue {
            order: rank,
            value: value.trim().to_string(),
            label,
        });
        self.index.insert(k, rank);
        rank
    }

    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    /// Rank of a value; unknown values rank just past the current end
    pub fn rank(&self, value: Option<&str>) -> usize {
        match value {
            None => NULL_RANK,
            Some(v) => self
                .index
                .get(&key(v))
                .copied()
                .unwrap_or(self.entries.len() + 1),
        }
    }

    /// Register a value seen in the data, appending it when undeclared
    pub fn observe(&mut self, value: &str) -> usize {
        if value.trim().is_empty() {
            return NULL_RANK;
        }
        if let Some(&rank) = self.index.get(&key(value)) {
            return rank;
        }
        let rank = self.push(value, None);
        let drift = RatingError::UnrankedDomainValue {
            attribute: self.attribute.clone(),
            value: value.to_string(),
            rank,
        };
        warn!("{}", drift);
        rank
    }

    /// Rank values in the order given without warning
    ///
    /// Used for attributes that declare no domain, where every observed
    /// value is expected to be undeclared.
    pub fn extend_undeclared<S: AsRef<str>>(&mut self, values: &[S]) {
        for value in values {
            if !value.as_ref().trim().is_empty() {
                self.push(value.as_ref(), None);
            }
        }
    }

    /// True when the catalog declares substantive values, not just a
    /// not-rated phrase
    pub fn has_declared_values(&self) -> bool {
        self.declared > usize::from(self.not_rated.is_some())
    }

    /// Declared spelling for a value matched case-insensitively
    pub fn canonical(&self, value: &str) -> Option<&str> {
        self.index
            .get(&key(value))
            .map(|&rank| self.entries[rank - 1].value.as_str())
    }

    pub fn is_not_rated(&self, value: &str) -> bool {
        self.not_rated.as_deref() == Some(key(value).as_str())
    }

    pub fn not_rated_phrase(&self) -> Option<&str> {
        self.not_rated
            .as_ref()
            .and_then(|k| self.index.get(k))
            .map(|&rank| self.entries[rank - 1].value.as_str())
    }

    pub fn contains(&self, value: &str) -> bool {
        self.index.contains_key(&key(value))
    }

    /// Number of declared values (excludes values appended from data)
    pub fn declared_len(&self) -> usize {
        self.declared
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in rank order, for legend rendering
    pub fn legend(&self) -> &[DomainValue] {
        &self.entries
    }
}
