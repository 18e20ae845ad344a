//! Rating Output Builder
//!
//! Collects one `AggregatedRating` per map unit and writes the flat rating
//! table through the store as a single frame keyed on `mukey`: rows for map
//! units already in the table are replaced, the rest are added.

use crate::horizon::profile::{profile_columns, DepthProfile};
use crate::horizon::integrate::{DepthAttribute, DepthWindow};
use crate::horizon::root_zone::MapUnitRootZone;
use crate::store::TabularStore;
use crate::utils::value::{Cell, RatingValue};
use anyhow::{Context, Result};
use polars::prelude::*;
use rustc_hash::FxHashMap;
use tracing::debug;

pub use crate::store::WriteSummary;

/// Output column holding the representative percent
pub const PERCENT_COLUMN: &str = "comppct_r";

/// Final rating of one map unit
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedRating {
    pub mukey: String,
    pub percent: Option<f64>,
    pub value: Cell,
}

impl AggregatedRating {
    pub fn new(mukey: &str, percent: Option<f64>, value: Cell) -> Self {
        AggregatedRating {
            mukey: mukey.to_string(),
            percent,
            value,
        }
    }

    /// Emitted row for a map unit with nothing to rate
    pub fn unrated(mukey: &str) -> Self {
        Self::new(mukey, None, None)
    }

    pub fn is_rated(&self) -> bool {
        self.value.is_some()
    }
}

/// Ratings for every map unit of one attribute, ordered by map-unit key
#[derive(Debug, Clone, Default)]
pub struct RatingTable {
    attribute: String,
    rows: Vec<AggregatedRating>,
    index: FxHashMap<String, usize>,
}

impl RatingTable {
    pub fn new(attribute: &str) -> Self {
        RatingTable {
            attribute: attribute.to_string(),
            ..Default::default()
        }
    }

    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    /// Add a row; a second row for the same map unit replaces the first
    pub fn push(&mut self, rating: AggregatedRating) {
        match self.index.get(&rating.mukey) {
            Some(&i) => self.rows[i] = rating,
            None => {
                self.index.insert(rating.mukey.clone(), self.rows.len());
                self.rows.push(rating);
            }
        }
    }

    pub fn get(&self, mukey: &str) -> Option<&AggregatedRating> {
        self.index.get(mukey).map(|&i| &self.rows[i])
    }

    pub fn rows(&self) -> &[AggregatedRating] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of map units that received a non-null rating
    pub fn rated_count(&self) -> usize {
        self.rows.iter().filter(|r| r.is_rated()).count()
    }

    /// Sort rows by map-unit key
    pub fn sort(&mut self) {
        self.rows.sort_by(|a, b| a.mukey.cmp(&b.mukey));
        self.index = self
            .rows
            .iter()
            .enumerate()
            .map(|(i, r)| (r.mukey.clone(), i))
            .collect();
    }

    /// As a frame: `mukey`, `comppct_r`, and the attribute column
    ///
    /// The rating column is numeric when every rated value is a number.
    pub fn to_frame(&self) -> Result<DataFrame> {
        let rows: Vec<Vec<Cell>> = self
            .rows
            .iter()
            .map(|r| {
                vec![
                    Some(RatingValue::Text(r.mukey.clone())),
                    r.percent.map(RatingValue::Number),
                    r.value.clone(),
                ]
            })
            .collect();
        frame_from_rows(&["mukey", PERCENT_COLUMN, self.attribute.as_str()], &rows)
            .with_context(|| format!("Failed to build rating frame for '{}'", self.attribute))
    }

    /// Write one row per map unit to `table`
    pub fn write_to<S: TabularStore + ?Sized>(&self, store: &mut S, table: &str) -> Result<WriteSummary> {
        write_frame(store, table, &self.to_frame()?)
    }
}

/// Column-wise frame from row cells
///
/// A column is Float64 when every present cell is a number, text otherwise.
pub fn frame_from_rows(fields: &[&str], rows: &[Vec<Cell>]) -> Result<DataFrame> {
    let columns = fields
        .iter()
        .enumerate()
        .map(|(i, &name)| {
            let cells = rows.iter().map(|r| r.get(i).cloned().flatten());
            let numeric = rows
                .iter()
                .filter_map(|r| r.get(i).and_then(Option::as_ref))
                .all(RatingValue::is_number);
            if numeric {
                let v: Vec<Option<f64>> = cells.map(|c| c.as_ref().and_then(RatingValue::as_f64)).collect();
                Column::new(name.into(), v)
            } else {
                let v: Vec<Option<String>> = cells.map(|c| c.map(|v| v.to_string())).collect();
                Column::new(name.into(), v)
            }
        })
        .collect();
    DataFrame::new(columns).context("Failed to assemble output rows")
}

fn write_frame<S: TabularStore + ?Sized>(store: &mut S, table: &str, frame: &DataFrame) -> Result<WriteSummary> {
    let summary = store.upsert(table, "mukey", frame)?;
    debug!(
        "Wrote '{}': {} inserted, {} updated",
        table, summary.inserted, summary.updated
    );
    Ok(summary)
}

/// Root-zone columns, one row per map unit
pub const ROOT_ZONE_FIELDS: [&str; 6] = [
    "mukey",
    "pctearthmc",
    "rootznemc",
    "rootznaws",
    "droughty",
    "pctdroughty",
];

pub fn write_root_zone<S: TabularStore + ?Sized>(
    store: &mut S,
    table: &str,
    zones: &FxHashMap<String, MapUnitRootZone>,
) -> Result<WriteSummary> {
    let mut keys: Vec<&String> = zones.keys().collect();
    keys.sort();
    let rows: Vec<Vec<Cell>> = keys
        .into_iter()
        .map(|mukey| {
            let z = &zones[mukey];
            vec![
                Some(RatingValue::Text(mukey.clone())),
                Some(RatingValue::Number(z.percent)),
                Some(RatingValue::Number(z.root_zone_depth)),
                Some(RatingValue::Number(z.root_zone_available_water)),
                Some(RatingValue::from(if z.droughty { "Yes" } else { "No" })),
                Some(RatingValue::Number(z.droughty_percent)),
            ]
        })
        .collect();
    write_frame(store, table, &frame_from_rows(&ROOT_ZONE_FIELDS, &rows)?)
}

/// Write a depth profile as `mukey` plus one value and one thickness column per window
pub fn write_profile<S: TabularStore + ?Sized>(
    store: &mut S,
    table: &str,
    attribute: DepthAttribute,
    windows: &[DepthWindow],
    profiles: &FxHashMap<String, DepthProfile>,
) -> Result<WriteSummary> {
    let columns = profile_columns(attribute, windows);
    let mut fields: Vec<&str> = vec!["mukey"];
    for (value_col, thick_col) in &columns {
        fields.push(value_col.as_str());
        fields.push(thick_col.as_str());
    }

    let mut keys: Vec<&String> = profiles.keys().collect();
    keys.sort();
    let rows: Vec<Vec<Cell>> = keys
        .into_iter()
        .map(|mukey| {
            let p = &profiles[mukey];
            let mut cells: Vec<Cell> = vec![Some(RatingValue::Text(mukey.clone()))];
            for i in 0..windows.len() {
                cells.push(p.value(i).map(RatingValue::Number));
                cells.push(
                    p.thickness
                        .get(i)
                        .copied()
                        .flatten()
                        .map(RatingValue::Number),
                );
            }
            cells
        })
        .collect();
    write_frame(store, table, &frame_from_rows(&fields, &rows)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{FrameStore, ReadRequest};
    use crate::utils::frame::{f64_column, str_column};

    fn table() -> RatingTable {
        let mut t = RatingTable::new("drainagecl");
        t.push(AggregatedRating::unrated("m3"));
        t.push(AggregatedRating::new("m1", Some(60.0), Some("Well drained".into())));
        t.push(AggregatedRating::new("m2", Some(85.0), Some("Poorly drained".into())));
        t
    }

    #[test]
    fn test_push_replaces_same_map_unit() {
        let mut t = table();
        t.push(AggregatedRating::new("m1", Some(70.0), Some("Moderately well drained".into())));
        assert_eq!(t.len(), 3);
        assert_eq!(t.get("m1").unwrap().percent, Some(70.0));
        assert_eq!(t.rated_count(), 2);
    }

    #[test]
    fn test_to_frame_types() {
        let df = table().to_frame().unwrap();
        assert_eq!(df.height(), 3);
        assert_eq!(df.column("drainagecl").unwrap().dtype(), &DataType::String);

        let mut numeric = RatingTable::new("awc_r");
        numeric.push(AggregatedRating::new("m1", Some(100.0), Some(0.15.into())));
        numeric.push(AggregatedRating::unrated("m2"));
        let df = numeric.to_frame().unwrap();
        assert_eq!(df.column("awc_r").unwrap().dtype(), &DataType::Float64);
    }

    #[test]
    fn test_write_inserts_then_updates() {
        let mut store = FrameStore::new();
        let mut t = table();
        t.sort();

        let summary = t.write_to(&mut store, "drainagecl_rating").unwrap();
        assert_eq!(summary, WriteSummary { inserted: 3, updated: 0 });

        t.push(AggregatedRating::new("m3", Some(100.0), Some("Well drained".into())));
        let summary = t.write_to(&mut store, "drainagecl_rating").unwrap();
        assert_eq!(summary, WriteSummary { inserted: 0, updated: 3 });

        let df = store
            .read(&ReadRequest::new("drainagecl_rating").order_by("mukey", false))
            .unwrap();
        assert_eq!(df.height(), 3);
        let values = str_column(&df, "out", "drainagecl").unwrap();
        assert_eq!(values[2].as_deref(), Some("Well drained"));
        let pct = f64_column(&df, "out", PERCENT_COLUMN).unwrap();
        assert_eq!(pct, vec![Some(60.0), Some(85.0), Some(100.0)]);
    }

    #[test]
    fn test_rewrite_over_existing_rows_keeps_one_row_per_map_unit() {
        let mut store = FrameStore::new();
        let mut first = table();
        first.sort();
        first.write_to(&mut store, "drainagecl_rating").unwrap();

        // m2 and m3 again, m4 new; m1 untouched
        let mut second = RatingTable::new("drainagecl");
        second.push(AggregatedRating::new("m4", Some(55.0), Some("Well drained".into())));
        second.push(AggregatedRating::new("m2", Some(90.0), Some("Somewhat poorly drained".into())));
        second.push(AggregatedRating::new("m3", Some(100.0), Some("Poorly drained".into())));
        let summary = second.write_to(&mut store, "drainagecl_rating").unwrap();
        assert_eq!(summary, WriteSummary { inserted: 1, updated: 2 });

        let df = store
            .read(&ReadRequest::new("drainagecl_rating").order_by("mukey", false))
            .unwrap();
        let keys: Vec<String> = str_column(&df, "out", "mukey").unwrap().into_iter().flatten().collect();
        assert_eq!(keys, vec!["m1", "m2", "m3", "m4"]);
        let values = str_column(&df, "out", "drainagecl").unwrap();
        assert_eq!(values[0].as_deref(), Some("Well drained"));
        assert_eq!(values[1].as_deref(), Some("Somewhat poorly drained"));
        assert_eq!(values[2].as_deref(), Some("Poorly drained"));
        let pct = f64_column(&df, "out", PERCENT_COLUMN).unwrap();
        assert_eq!(pct, vec![Some(60.0), Some(90.0), Some(100.0), Some(55.0)]);
    }

    #[test]
    fn test_frame_from_rows_column_types() {
        let rows = vec![
            vec![Some("m1".into()), Some(RatingValue::Number(1.0)), None],
            vec![Some("m2".into()), None, None],
        ];
        let df = frame_from_rows(&["mukey", "value", "empty"], &rows).unwrap();
        assert_eq!(df.column("mukey").unwrap().dtype(), &DataType::String);
        assert_eq!(df.column("value").unwrap().dtype(), &DataType::Float64);
        assert_eq!(df.column("empty").unwrap().null_count(), 2);
    }
}
