//! Component/Map-Unit Aggregation Engine
//!
//! An attribute is rated in two steps:
//!   1. **Reduce** each component to one value (`reduce`): a component-level
//!      value is used as is; horizon- and month-level values are collapsed
//!      over the configured depth or month window.
//!   2. **Aggregate** the component values of a map unit with one of five
//!      strategies, after the percent-cutoff / major-only / null filters.
//!
//! The pair is chosen once per attribute by `plan_for`, keyed by
//! (attribute level, data shape), so the per-map-unit loop never branches
//! on configuration flags.

pub mod dominant_component;
pub mod dominant_condition;
pub mod filter;
pub mod min_max;
pub mod percent_present;
pub mod reduce;
pub mod weighted_average;

pub use dominant_component::dominant_component;
pub use dominant_condition::dominant_condition;
pub use filter::qualifying_components;
pub use min_max::minimum_or_maximum;
pub use percent_present::percent_present;
pub use reduce::reduce_component;
pub use weighted_average::weighted_average;

use crate::config::{
    AggregationMethod, AttributeConfig, AttributeLevel, DataShape, MonthWindow, NullHandling,
    PresenceCondition,
};
use crate::data::SoilHierarchy;
use crate::domain::{DomainCatalog, NULL_RANK};
use crate::error::{RatingError, RatingResult};
use crate::horizon::integrate::DepthWindow;
use crate::output::{AggregatedRating, RatingTable};
use crate::utils::tiebreak::TieBreak;
use crate::utils::value::{Cell, RatingValue};
use rustc_hash::{FxHashMap, FxHashSet};
use std::cmp::Ordering;
use tracing::{debug, warn};

// ============================================================================
// Dispatch
// ============================================================================

/// Map-unit aggregation strategy
#[derive(Debug, Clone, PartialEq)]
pub enum Strategy {
    DominantComponent,
    DominantCondition,
    WeightedAverage,
    MinimumOrMaximum,
    PercentPresent(PresenceCondition),
}

/// How one component's value is obtained
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ComponentReduction {
    /// Component-level attribute
    Direct,
    /// Thickness-weighted mean of horizon values inside the window
    HorizonWeightedAverage(DepthWindow),
    /// Lowest or highest horizon value inside the window, per tie-break
    HorizonExtreme(DepthWindow),
    /// Value of the thickest horizon inside the window
    HorizonThickest(DepthWindow),
    /// Lowest or highest numeric month value, per tie-break
    MonthExtreme(MonthWindow),
    /// Ranked winner among qualitative month values, per tie-break
    MonthRanked(MonthWindow),
}

/// Rating plan for one attribute
#[derive(Debug, Clone, PartialEq)]
pub enum Plan {
    /// Map-unit attributes need no aggregation
    PassThrough,
    Aggregate {
        reduction: ComponentReduction,
        strategy: Strategy,
    },
}

/// Build the plan for a validated config
pub fn plan_for(config: &AttributeConfig) -> RatingResult<Plan> {
    let strategy = match (config.method, &config.presence) {
        (AggregationMethod::DominantComponent, _) => Strategy::DominantComponent,
        (AggregationMethod::DominantCondition, _) => Strategy::DominantCondition,
        (AggregationMethod::WeightedAverage, _) => Strategy::WeightedAverage,
        (AggregationMethod::MinimumOrMaximum, _) => Strategy::MinimumOrMaximum,
        (AggregationMethod::PercentPresent, Some(condition)) => {
            Strategy::PercentPresent(condition.clone())
        }
        (AggregationMethod::PercentPresent, None) => {
            return Err(RatingError::invalid_config(
                &config.name,
                "percent present needs a presence condition",
            ))
        }
    };

    let window = || {
        config.depth_window.ok_or_else(|| {
            RatingError::invalid_config(&config.name, "horizon attributes need a depth window")
        })
    };
    let months = config.month_window.unwrap_or(MonthWindow::ALL);

    let reduction = match (config.level, config.shape) {
        (AttributeLevel::MapUnit, _) => return Ok(Plan::PassThrough),
        (AttributeLevel::Component, _) => ComponentReduction::Direct,
        (AttributeLevel::Horizon, DataShape::Numeric) => {
            if strategy == Strategy::MinimumOrMaximum {
                ComponentReduction::HorizonExtreme(window()?)
            } else {
                ComponentReduction::HorizonWeightedAverage(window()?)
            }
        }
        (AttributeLevel::Horizon, DataShape::Qualitative) => {
            ComponentReduction::HorizonThickest(window()?)
        }
        (AttributeLevel::Month, DataShape::Numeric) => ComponentReduction::MonthExtreme(months),
        (AttributeLevel::Month, DataShape::Qualitative) => ComponentReduction::MonthRanked(months),
    };

    Ok(Plan::Aggregate {
        reduction,
        strategy,
    })
}

// ============================================================================
// Inputs
// ============================================================================

/// Filters and tie-break shared by every strategy
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateOptions {
    pub percent_cutoff: f64,
    pub null_handling: NullHandling,
    pub tie_break: TieBreak,
    pub major_only: bool,
    pub shape: DataShape,
}

impl Default for AggregateOptions {
    fn default() -> Self {
        AggregateOptions {
            percent_cutoff: 0.0,
            null_handling: NullHandling::Exclude,
            tie_break: TieBreak::Higher,
            major_only: false,
            shape: DataShape::Numeric,
        }
    }
}

impl From<&AttributeConfig> for AggregateOptions {
    fn from(config: &AttributeConfig) -> Self {
        AggregateOptions {
            percent_cutoff: config.percent_cutoff,
            null_handling: config.null_handling.clone(),
            tie_break: config.tie_break,
            major_only: config.major_only,
            shape: config.shape,
        }
    }
}

/// Attribute values keyed by the level's record key
/// (`mukey`, `cokey`, `chkey` or `comonthkey`)
#[derive(Debug, Clone, Default)]
pub struct AttributeValues {
    values: FxHashMap<String, Cell>,
}

impl AttributeValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Later rows for the same key are ignored
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, Cell)>,
    {
        let mut values = FxHashMap::default();
        for (key, cell) in pairs {
            values.entry(key).or_insert(cell);
        }
        AttributeValues { values }
    }

    pub fn insert(&mut self, key: &str, cell: Cell) {
        self.values.insert(key.to_string(), cell);
    }

    /// Value of a record; `None` for both missing records and null values
    pub fn get(&self, key: &str) -> Option<&RatingValue> {
        self.values.get(key).and_then(Option::as_ref)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Distinct non-empty text values, sorted
    fn distinct_text(&self) -> Vec<String> {
        let mut seen = FxHashSet::default();
        let mut out: Vec<String> = self
            .values
            .values()
            .flatten()
            .map(|v| v.to_string())
            .filter(|s| !s.trim().is_empty() && seen.insert(s.trim().to_uppercase()))
            .collect();
        out.sort_by(|a, b| label_cmp(a, b));
        out
    }
}

/// Numeric labels compare as numbers and sort ahead of text labels;
/// text compares case-insensitively
fn label_cmp(a: &str, b: &str) -> Ordering {
    match (a.trim().parse::<f64>(), b.trim().parse::<f64>()) {
        (Ok(x), Ok(y)) => x.total_cmp(&y),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.to_uppercase().cmp(&b.to_uppercase()),
    }
}

/// One component's reduced value, ready for map-unit aggregation
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentRating {
    pub cokey: String,
    pub percent: f64,
    pub major: bool,
    pub value: Cell,
}

// ============================================================================
// Value ordering
// ============================================================================

/// Grouping key for Dominant Condition
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConditionKey {
    Null,
    Rank(usize),
    Raw(String),
}

/// Compares rating values: by domain rank for qualitative attributes,
/// numerically otherwise. Nulls sort lowest.
#[derive(Debug, Clone, Copy)]
pub struct ValueOrder<'a> {
    catalog: &'a DomainCatalog,
    shape: DataShape,
}

impl<'a> ValueOrder<'a> {
    pub fn new(catalog: &'a DomainCatalog, shape: DataShape) -> Self {
        ValueOrder { catalog, shape }
    }

    pub fn rank(&self, cell: &Cell) -> usize {
        match cell {
            None => NULL_RANK,
            Some(v) => self.catalog.rank(Some(v.to_string().as_str())),
        }
    }

    pub fn compare(&self, a: &Cell, b: &Cell) -> Ordering {
        match self.shape {
            DataShape::Qualitative => self.rank(a).cmp(&self.rank(b)),
            DataShape::Numeric => match (a, b) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
                (Some(x), Some(y)) => x.natural_cmp(y),
            },
        }
    }

    pub fn is_not_rated(&self, cell: &Cell) -> bool {
        match cell {
            Some(RatingValue::Text(s)) => self.catalog.is_not_rated(s),
            _ => false,
        }
    }

    /// Null and not-rated values lose every tie they take part in
    pub fn is_demoted(&self, cell: &Cell) -> bool {
        cell.is_none() || self.is_not_rated(cell)
    }

    /// Comparator for `pick_winner` that keeps demoted values last in
    /// either direction
    pub fn demoting_cmp(self, prefer_high: bool) -> impl Fn(&Cell, &Cell) -> Ordering + 'a {
        move |a, b| match (self.is_demoted(a), self.is_demoted(b)) {
            (true, false) if prefer_high => Ordering::Less,
            (true, false) => Ordering::Greater,
            (false, true) if prefer_high => Ordering::Greater,
            (false, true) => Ordering::Less,
            _ => self.compare(a, b),
        }
    }

    pub fn condition_key(&self, cell: &Cell) -> ConditionKey {
        match (cell, self.shape) {
            (None, _) => ConditionKey::Null,
            (Some(_), DataShape::Qualitative) => ConditionKey::Rank(self.rank(cell)),
            (Some(v), DataShape::Numeric) => ConditionKey::Raw(v.group_key()),
        }
    }

    /// Declared spelling of a qualitative value
    pub fn canonical(&self, cell: Cell) -> Cell {
        match (cell, self.shape) {
            (Some(RatingValue::Text(s)), DataShape::Qualitative) => {
                let spelled = self.catalog.canonical(&s).map(str::to_string).unwrap_or(s);
                Some(RatingValue::Text(spelled))
            }
            (cell, _) => cell,
        }
    }
}

/// Rank every qualitative value before aggregation
///
/// Without a declared domain the observed values are ranked in sorted
/// order; with one, undeclared values are appended with a warning.
pub fn prepare_catalog(catalog: &mut DomainCatalog, values: &AttributeValues, shape: DataShape) {
    if shape != DataShape::Qualitative {
        return;
    }
    let observed = values.distinct_text();
    if catalog.has_declared_values() {
        for value in &observed {
            catalog.observe(value);
        }
    } else {
        debug!(
            "No declared domain for '{}'; ranking {} observed values in sorted order",
            catalog.attribute(),
            observed.len()
        );
        catalog.extend_undeclared(&observed);
    }
}

// ============================================================================
// Aggregation
// ============================================================================

/// Aggregate one map unit's qualifying components
///
/// `components` must be non-empty; an empty set is an `EmptyAggregationSet`.
pub fn aggregate_components(
    strategy: &Strategy,
    mukey: &str,
    components: &[ComponentRating],
    order: ValueOrder<'_>,
    tie_break: TieBreak,
) -> RatingResult<AggregatedRating> {
    let context = format!("map unit {}", mukey);
    if components.is_empty() {
        return Err(RatingError::empty_set(context));
    }
    let prefer_high = tie_break.prefer_high();

    let (percent, value) = match strategy {
        Strategy::DominantComponent => dominant_component(components, order, prefer_high, &context)?,
        Strategy::DominantCondition => dominant_condition(components, order, prefer_high, &context)?,
        Strategy::WeightedAverage => weighted_average(components),
        Strategy::MinimumOrMaximum => minimum_or_maximum(components, order, prefer_high, &context)?,
        Strategy::PercentPresent(condition) => percent_present(components, condition),
    };
    Ok(AggregatedRating::new(mukey, percent, value))
}

/// Rate every map unit in `hierarchy`
///
/// Map units whose components are all filtered out are still emitted with a
/// null rating (0 for Percent Present) as long as some component anywhere
/// carries a percent.
pub fn aggregate(
    attribute: &str,
    plan: &Plan,
    values: &AttributeValues,
    hierarchy: &SoilHierarchy,
    options: &AggregateOptions,
    catalog: &mut DomainCatalog,
) -> RatingResult<RatingTable> {
    prepare_catalog(catalog, values, options.shape);
    let order = ValueOrder::new(catalog, options.shape);
    let mut table = RatingTable::new(attribute);

    let (reduction, strategy) = match plan {
        Plan::PassThrough => {
            for mu in hierarchy.map_units() {
                let cell = values.get(&mu.mukey).cloned();
                let value = options.null_handling.apply(cell).flatten();
                table.push(AggregatedRating::new(&mu.mukey, None, order.canonical(value)));
            }
            return Ok(table);
        }
        Plan::Aggregate {
            reduction,
            strategy,
        } => (*reduction, strategy),
    };

    let has_percent_data = hierarchy.has_percent_data();
    if !has_percent_data {
        warn!(
            "No component percent data in this survey; '{}' map units without qualifying components are omitted",
            attribute
        );
    }

    for mu in hierarchy.map_units() {
        let reduced: Vec<ComponentRating> = hierarchy
            .components(&mu.mukey)
            .iter()
            .map(|comp| ComponentRating {
                cokey: comp.cokey.clone(),
                percent: comp.percent_or_zero(),
                major: comp.major,
                value: reduce_component(reduction, comp, values, hierarchy, order, options.tie_break),
            })
            .collect();

        let qualifying = qualifying_components(reduced, options);
        if qualifying.is_empty() {
            match strategy {
                Strategy::PercentPresent(_) => table.push(AggregatedRating::new(
                    &mu.mukey,
                    Some(0.0),
                    Some(RatingValue::Number(0.0)),
                )),
                _ if has_percent_data => table.push(AggregatedRating::unrated(&mu.mukey)),
                _ => {}
            }
            continue;
        }

        let rating = aggregate_components(strategy, &mu.mukey, &qualifying, order, options.tie_break)?;
        table.push(rating);
    }

    debug!(
        "'{}': {} map units, {} rated",
        attribute,
        table.len(),
        table.rated_count()
    );
    Ok(table)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::data::{Component, MapUnit};

    pub fn rating(cokey: &str, percent: f64, value: Cell) -> ComponentRating {
        ComponentRating {
            cokey: cokey.into(),
            percent,
            major: true,
            value,
        }
    }

    pub fn text(s: &str) -> Cell {
        Some(RatingValue::from(s))
    }

    pub fn num(v: f64) -> Cell {
        Some(RatingValue::Number(v))
    }

    pub fn drainage() -> DomainCatalog {
        DomainCatalog::new(
            "drainagecl",
            &[
                "Well drained",
                "Moderately well drained",
                "Somewhat poorly drained",
                "Poorly drained",
            ],
            None,
        )
    }

    pub fn interp() -> DomainCatalog {
        DomainCatalog::new(
            "interp",
            &["Not limited", "Somewhat limited", "Very limited"],
            Some("Not rated"),
        )
    }

    pub fn map_unit(mukey: &str) -> MapUnit {
        MapUnit {
            mukey: mukey.into(),
            symbol: None,
            name: None,
            area_symbol: None,
        }
    }

    pub fn component(mukey: &str, cokey: &str, percent: Option<f64>, major: bool) -> Component {
        Component {
            cokey: cokey.into(),
            mukey: mukey.into(),
            percent,
            major,
            ..Default::default()
        }
    }
}
