//! Attribute configuration
//!
//! One `AttributeConfig` describes how a single survey attribute is read,
//! reduced to one value per component, and aggregated to the map unit.
//! Configs are plain JSON:
//!
//! ```json
//! {
//!   "name": "drainagecl",
//!   "table": "component",
//!   "column": "drainagecl",
//!   "level": "Component",
//!   "shape": "Qualitative",
//!   "method": "DominantCondition",
//!   "tie_break": "Higher",
//!   "domain": ["Excessively drained", "Well drained", "Poorly drained"]
//! }
//! ```

use crate::error::RatingError;
use crate::horizon::integrate::DepthWindow;
use crate::utils::tiebreak::TieBreak;
use crate::utils::value::{Cell, RatingValue};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Hierarchy level an attribute's source table lives at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum AttributeLevel {
    #[serde(alias = "mapunit", alias = "map_unit")]
    MapUnit,
    #[default]
    #[serde(alias = "component")]
    Component,
    #[serde(alias = "horizon")]
    Horizon,
    #[serde(alias = "month")]
    Month,
}

impl AttributeLevel {
    /// Key column joining the source table to the hierarchy
    pub fn key_column(self) -> &'static str {
        match self {
            AttributeLevel::MapUnit => "mukey",
            AttributeLevel::Component => "cokey",
            AttributeLevel::Horizon => "chkey",
            AttributeLevel::Month => "comonthkey",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum DataShape {
    #[default]
    #[serde(alias = "numeric", alias = "Float", alias = "Integer")]
    Numeric,
    #[serde(alias = "qualitative", alias = "Choice", alias = "String")]
    Qualitative,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum AggregationMethod {
    #[default]
    #[serde(alias = "Dominant Component")]
    DominantComponent,
    #[serde(alias = "Dominant Condition")]
    DominantCondition,
    #[serde(alias = "Weighted Average")]
    WeightedAverage,
    #[serde(alias = "Minimum or Maximum")]
    MinimumOrMaximum,
    #[serde(alias = "Percent Present")]
    PercentPresent,
}

/// What to do with records whose value is null
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub enum NullHandling {
    /// Drop null-valued records before aggregating
    #[default]
    Exclude,
    /// Keep them; they rank below every rating
    Include,
    /// Substitute a fixed value
    Replace(RatingValue),
}

impl NullHandling {
    /// "Treat null as zero"
    pub fn treat_as_zero() -> Self {
        NullHandling::Replace(RatingValue::Number(0.0))
    }

    /// Apply to one cell. `None` means the record is dropped.
    pub fn apply(&self, cell: Cell) -> Option<Cell> {
        match (self, cell) {
            (_, Some(v)) => Some(Some(v)),
            (NullHandling::Exclude, None) => None,
            (NullHandling::Include, None) => Some(None),
            (NullHandling::Replace(v), None) => Some(Some(v.clone())),
        }
    }
}

/// Inclusive month range by sequence number, wrapping past December when
/// `begin > end` (e.g. November to February)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthWindow {
    pub begin: u8,
    pub end: u8,
}

impl MonthWindow {
    pub const ALL: MonthWindow = MonthWindow { begin: 1, end: 12 };

    pub fn contains(&self, month: u8) -> bool {
        if self.begin <= self.end {
            month >= self.begin && month <= self.end
        } else {
            month >= self.begin || month <= self.end
        }
    }

    pub fn is_valid(&self) -> bool {
        (1..=12).contains(&self.begin) && (1..=12).contains(&self.end)
    }
}

/// Condition a component value must meet to count toward Percent Present
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PresenceCondition {
    /// Value equals one of these, case-insensitively
    Matches(Vec<String>),
    /// Numeric value within `[min, max]`
    Between { min: f64, max: f64 },
}

impl PresenceCondition {
    pub fn matches(&self, cell: &Cell) -> bool {
        let Some(value) = cell else {
            return false;
        };
        match self {
            PresenceCondition::Matches(targets) => {
                let key = value.group_key();
                targets.iter().any(|t| RatingValue::parse(t).group_key() == key)
            }
            PresenceCondition::Between { min, max } => value
                .as_f64()
                .map_or(false, |v| v >= *min && v <= *max),
        }
    }
}

/// Equality filter on the source table, e.g. an interpretation rule name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnFilter {
    pub column: String,
    pub value: String,
}

/// Validated description of one rated attribute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AttributeConfig {
    pub name: String,
    pub table: String,
    pub column: String,
    #[serde(default)]
    pub level: AttributeLevel,
    #[serde(default)]
    pub shape: DataShape,
    #[serde(default)]
    pub method: AggregationMethod,
    #[serde(default)]
    pub tie_break: TieBreak,
    #[serde(default)]
    pub percent_cutoff: f64,
    #[serde(default)]
    pub null_handling: NullHandling,
    /// Legal values, lowest rank first
    #[serde(default)]
    pub domain: Vec<String>,
    #[serde(default)]
    pub not_rated: Option<String>,
    /// Store table holding the domain as `choicesequence`, `choice`, and
    /// optionally `choicelabel` rows; used instead of `domain`
    #[serde(default)]
    pub domain_table: Option<String>,
    #[serde(default)]
    pub depth_window: Option<DepthWindow>,
    #[serde(default)]
    pub month_window: Option<MonthWindow>,
    #[serde(default)]
    pub presence: Option<PresenceCondition>,
    #[serde(default)]
    pub filters: Vec<ColumnFilter>,
    #[serde(default)]
    pub major_only: bool,
    /// Interpretation rating: tie-break labels read as Most/Least Limiting
    #[serde(default)]
    pub interpretation: bool,
    #[serde(default)]
    pub output_table: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(Box<AttributeConfig>),
    Many(Vec<AttributeConfig>),
}

impl AttributeConfig {
    /// Load one config or a list of configs from a JSON file
    pub fn load(path: &Path) -> Result<Vec<Self>> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read attribute config: {:?}", path))?;
        Self::from_json(&contents).with_context(|| format!("In attribute config {:?}", path))
    }

    pub fn from_json(json: &str) -> Result<Vec<Self>> {
        let parsed: OneOrMany =
            serde_json::from_str(json).with_context(|| "Failed to parse attribute config JSON")?;
        let configs = match parsed {
            OneOrMany::One(config) => vec![*config],
            OneOrMany::Many(configs) => configs,
        };
        for config in &configs {
            config.validate()?;
        }
        Ok(configs)
    }

    pub fn output_table(&self) -> String {
        self.output_table
            .clone()
            .unwrap_or_else(|| format!("{}_rating", self.name))
    }

    pub fn tie_break_label(&self) -> &'static str {
        self.tie_break.label(self.interpretation)
    }

    /// Reject combinations the engine cannot rate
    pub fn validate(&self) -> Result<(), RatingError> {
        let fail = |reason: &str| -> Result<(), RatingError> {
            Err(RatingError::invalid_config(&self.name, reason))
        };

        if self.name.trim().is_empty() {
            return fail("name is empty");
        }
        if self.table.trim().is_empty() || self.column.trim().is_empty() {
            return fail("source table and column are required");
        }
        if !(0.0..=100.0).contains(&self.percent_cutoff) {
            return fail("percent cutoff must be within 0-100");
        }
        if self.domain_table.is_some() && !self.domain.is_empty() {
            return fail("give the domain inline or as a table, not both");
        }
        if self.method == AggregationMethod::WeightedAverage && self.shape == DataShape::Qualitative {
            return fail("weighted average needs numeric data");
        }
        if self.level == AttributeLevel::Horizon && self.depth_window.is_none() {
            return fail("horizon attributes need a depth window");
        }
        if let Some(window) = self.depth_window {
            if !window.is_valid() {
                return fail("depth window top must be >= 0 and above its bottom");
            }
        }
        if let Some(months) = self.month_window {
            if !months.is_valid() {
                return fail("months must be within 1-12");
            }
        }
        match (&self.method, &self.presence) {
            (AggregationMethod::PercentPresent, None) => {
                return fail("percent present needs a presence condition");
            }
            (_, Some(PresenceCondition::Between { min, max })) if min > max => {
                return fail("presence range is inverted");
            }
            (_, Some(PresenceCondition::Matches(values))) if values.is_empty() => {
                return fail("presence match list is empty");
            }
            _ => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> AttributeConfig {
        AttributeConfig {
            name: "awc_r".into(),
            table: "chorizon".into(),
            column: "awc_r".into(),
            level: AttributeLevel::Horizon,
            method: AggregationMethod::WeightedAverage,
            depth_window: Some(DepthWindow::new(0.0, 25.0)),
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_single_and_list() {
        let json = r#"{
            "name": "drainagecl",
            "table": "component",
            "column": "drainagecl",
            "shape": "Qualitative",
            "method": "Dominant Condition",
            "tie_break": "Most Limiting",
            "domain": ["Well drained", "Poorly drained"]
        }"#;
        let configs = AttributeConfig::from_json(json).unwrap();
        assert_eq!(configs.len(), 1);
        let c = &configs[0];
        assert_eq!(c.level, AttributeLevel::Component);
        assert_eq!(c.method, AggregationMethod::DominantCondition);
        assert_eq!(c.tie_break, TieBreak::Higher);
        assert_eq!(c.null_handling, NullHandling::Exclude);
        assert_eq!(c.output_table(), "drainagecl_rating");

        let list = format!("[{}, {}]", json, json);
        assert_eq!(AttributeConfig::from_json(&list).unwrap().len(), 2);
    }

    #[test]
    fn test_null_replacement_from_json() {
        let json = r#"{
            "name": "flood", "table": "comonth", "column": "flodfreqcl",
            "level": "Month", "shape": "Qualitative", "method": "DominantCondition",
            "null_handling": {"Replace": "None"},
            "month_window": {"begin": 11, "end": 2}
        }"#;
        let c = &AttributeConfig::from_json(json).unwrap()[0];
        assert_eq!(c.null_handling, NullHandling::Replace(RatingValue::from("None")));
        let months = c.month_window.unwrap();
        assert!(months.contains(12) && months.contains(1) && !months.contains(6));
    }

    #[test]
    fn test_validate_rejects_bad_combinations() {
        assert!(base().validate().is_ok());

        let mut c = base();
        c.shape = DataShape::Qualitative;
        assert!(c.validate().is_err());

        let mut c = base();
        c.depth_window = None;
        assert!(c.validate().is_err());

        let mut c = base();
        c.depth_window = Some(DepthWindow::new(50.0, 20.0));
        assert!(c.validate().is_err());

        let mut c = base();
        c.percent_cutoff = 120.0;
        assert!(c.validate().is_err());

        let mut c = base();
        c.month_window = Some(MonthWindow { begin: 0, end: 12 });
        assert!(c.validate().is_err());

        let mut c = base();
        c.method = AggregationMethod::PercentPresent;
        let err = c.validate().unwrap_err();
        assert!(err.to_string().contains("awc_r"));
        c.presence = Some(PresenceCondition::Between { min: 0.1, max: 0.2 });
        assert!(c.validate().is_ok());

        let mut c = base();
        c.domain_table = Some("drainage_domain".into());
        assert!(c.validate().is_ok());
        c.domain = vec!["Well drained".into()];
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_null_handling_apply() {
        assert_eq!(NullHandling::Exclude.apply(None), None);
        assert_eq!(NullHandling::Include.apply(None), Some(None));
        assert_eq!(
            NullHandling::treat_as_zero().apply(None),
            Some(Some(RatingValue::Number(0.0)))
        );
        let v = Some(RatingValue::Number(3.0));
        assert_eq!(NullHandling::treat_as_zero().apply(v.clone()), Some(v));
    }

    #[test]
    fn test_presence_condition() {
        let hydric = PresenceCondition::Matches(vec!["Yes".into()]);
        assert!(hydric.matches(&Some(RatingValue::from("yes"))));
        assert!(!hydric.matches(&Some(RatingValue::from("No"))));
        assert!(!hydric.matches(&None));

        let range = PresenceCondition::Between { min: 0.0, max: 50.0 };
        assert!(range.matches(&Some(RatingValue::Number(50.0))));
        assert!(!range.matches(&Some(RatingValue::Number(50.5))));
    }
}
