//! Tabular store boundary
//!
//! The aggregation core never talks to a database directly. It reads ordered
//! rows through `TabularStore::read` and writes one output row per map unit
//! through `insert` / `update`. `FrameStore` is the in-memory implementation
//! backed by Polars DataFrames, loadable from delimited text exports.

use crate::error::RatingError;
use crate::utils::frame::{cell_column, column_names, has_column, require_columns, str_column};
use crate::utils::value::{Cell, RatingValue};
use anyhow::{Context, Result};
use polars::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};
use std::path::Path;
use tracing::{debug, info};

/// Row filter understood by every store
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Eq(String, RatingValue),
    NotEq(String, RatingValue),
    In(String, Vec<RatingValue>),
    IsNull(String),
    IsNotNull(String),
}

impl Predicate {
    pub fn eq(column: &str, value: impl Into<RatingValue>) -> Self {
        Predicate::Eq(column.to_string(), value.into())
    }

    pub fn column(&self) -> &str {
        match self {
            Predicate::Eq(c, _)
            | Predicate::NotEq(c, _)
            | Predicate::In(c, _)
            | Predicate::IsNull(c)
            | Predicate::IsNotNull(c) => c,
        }
    }

    fn to_expr(&self) -> Expr {
        match self {
            Predicate::Eq(c, v) => col(c.as_str()).eq(value_lit(v)),
            Predicate::NotEq(c, v) => col(c.as_str()).neq(value_lit(v)),
            Predicate::In(c, values) => values
                .iter()
                .map(|v| col(c.as_str()).eq(value_lit(v)))
                .reduce(|a, b| a.or(b))
                .unwrap_or_else(|| lit(false)),
            Predicate::IsNull(c) => col(c.as_str()).is_null(),
            Predicate::IsNotNull(c) => col(c.as_str()).is_not_null(),
        }
    }
}

fn value_lit(value: &RatingValue) -> Expr {
    match value {
        RatingValue::Number(v) => lit(*v),
        RatingValue::Text(s) => lit(s.clone()),
    }
}

fn cell_lit(cell: &Cell, dtype: &DataType) -> Expr {
    match cell {
        Some(v) => value_lit(v).cast(dtype.clone()),
        None => lit(NULL).cast(dtype.clone()),
    }
}

/// Ordering key for a read
#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub column: String,
    pub descending: bool,
}

/// One read against the store
///
/// An empty field list selects every column.
#[derive(Debug, Clone, Default)]
pub struct ReadRequest {
    pub table: String,
    pub fields: Vec<String>,
    pub filter: Vec<Predicate>,
    pub order: Vec<OrderBy>,
}

impl ReadRequest {
    pub fn new(table: &str) -> Self {
        ReadRequest {
            table: table.to_string(),
            ..Default::default()
        }
    }

    pub fn fields(mut self, fields: &[&str]) -> Self {
        self.fields = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.filter.push(predicate);
        self
    }

    pub fn order_by(mut self, column: &str, descending: bool) -> Self {
        self.order.push(OrderBy {
            column: column.to_string(),
            descending,
        });
        self
    }
}

/// Counts from one keyed write
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteSummary {
    pub inserted: usize,
    pub updated: usize,
}

/// Read/insert/update access to survey tables
pub trait TabularStore {
    fn has_table(&self, table: &str) -> bool;

    /// Rows matching every predicate, in the requested order
    fn read(&self, request: &ReadRequest) -> Result<DataFrame>;

    /// Append one row; fields not listed are null
    fn insert(&mut self, table: &str, fields: &[&str], row: &[Cell]) -> Result<()>;

    /// Overwrite `fields` on rows matching `predicate`; returns rows touched
    fn update(
        &mut self,
        table: &str,
        fields: &[&str],
        row: &[Cell],
        predicate: &Predicate,
    ) -> Result<usize>;

    /// Write every row of `frame`, replacing existing rows with the same `key`
    ///
    /// Goes row by row through `update` and `insert`; stores that can swap
    /// whole frames override it.
    fn upsert(&mut self, table: &str, key: &str, frame: &DataFrame) -> Result<WriteSummary> {
        require_columns(frame, table, &[key])?;
        let fields = column_names(frame);
        let fields: Vec<&str> = fields.iter().map(String::as_str).collect();
        let keys = str_column(frame, table, key)?;
        let columns = fields
            .iter()
            .map(|&f| frame_cells(frame, table, f))
            .collect::<Result<Vec<_>>>()?;

        let mut summary = WriteSummary::default();
        for (i, k) in keys.iter().enumerate() {
            let Some(k) = k else {
                continue;
            };
            let row: Vec<Cell> = columns.iter().map(|c| c[i].clone()).collect();
            let touched = if self.has_table(table) {
                self.update(table, &fields, &row, &Predicate::eq(key, k.as_str()))
                    .with_context(|| format!("Failed to update {} {} in '{}'", key, k, table))?
            } else {
                0
            };
            if touched == 0 {
                self.insert(table, &fields, &row)
                    .with_context(|| format!("Failed to insert {} {} into '{}'", key, k, table))?;
                summary.inserted += 1;
            } else {
                summary.updated += 1;
            }
        }
        Ok(summary)
    }
}

/// Cells of one frame column; text columns stay text, everything else is read as numbers
fn frame_cells(frame: &DataFrame, table: &str, name: &str) -> Result<Vec<Cell>> {
    let numeric = frame.column(name)?.dtype() != &DataType::String;
    cell_column(frame, table, name, numeric)
}

fn sorted_by_key(df: DataFrame, key: &str) -> Result<DataFrame> {
    df.lazy()
        .sort_by_exprs(
            vec![col(key)],
            SortMultipleOptions::default()
                .with_nulls_last(true)
                .with_maintain_order(true),
        )
        .collect()
        .with_context(|| format!("Failed to sort by '{}'", key))
}

/// In-memory store over Polars DataFrames
#[derive(Debug, Default, Clone)]
pub struct FrameStore {
    tables: FxHashMap<String, DataFrame>,
}

impl FrameStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, name: &str, df: DataFrame) -> Self {
        self.tables.insert(name.to_string(), df);
        self
    }

    pub fn put_table(&mut self, name: &str, df: DataFrame) {
        self.tables.insert(name.to_string(), df);
    }

    pub fn table(&self, name: &str) -> Option<&DataFrame> {
        self.tables.get(name)
    }

    /// Load `<table>.txt` / `<table>.csv` exports from a directory
    ///
    /// Every column is read as text; typed parsing happens when records are
    /// built. Tables without a file are skipped.
    pub fn load_dir(dir: &Path, tables: &[&str], separator: u8) -> Result<Self> {
        let mut store = FrameStore::new();
        for &table in tables {
            let candidates = [
                dir.join(format!("{}.txt", table)),
                dir.join(format!("{}.csv", table)),
            ];
            let Some(path) = candidates.iter().find(|p| p.exists()) else {
                debug!("No export found for table '{}' in {:?}", table, dir);
                continue;
            };

            let df = CsvReadOptions::default()
                .with_has_header(true)
                .with_infer_schema_length(Some(0))
                .map_parse_options(|opts| opts.with_separator(separator))
                .try_into_reader_with_file_path(Some(path.clone()))
                .with_context(|| format!("Failed to create CSV reader: {:?}", path))?
                .finish()
                .with_context(|| format!("Failed to load table '{}' from {:?}", table, path))?;

            info!("Loaded table '{}' ({} rows)", table, df.height());
            store.tables.insert(table.to_string(), df);
        }
        Ok(store)
    }

    /// Write one table as a delimited text file with a header row
    pub fn save_table(&self, table: &str, path: &Path, separator: u8) -> Result<()> {
        let mut df = self.table_or_err(table)?.clone();
        let mut file = std::fs::File::create(path)
            .with_context(|| format!("Failed to create {:?}", path))?;
        CsvWriter::new(&mut file)
            .include_header(true)
            .with_separator(separator)
            .finish(&mut df)
            .with_context(|| format!("Failed to write table '{}' to {:?}", table, path))?;
        info!("Saved table '{}' ({} rows) to {:?}", table, df.height(), path);
        Ok(())
    }

    pub fn table_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tables.keys().map(String::as_str).collect();
        names.sort();
        names
    }

    fn table_or_err(&self, table: &str) -> Result<&DataFrame, RatingError> {
        self.tables
            .get(table)
            .ok_or_else(|| RatingError::MissingSourceTable {
                table: table.to_string(),
            })
    }
}

impl TabularStore for FrameStore {
    fn has_table(&self, table: &str) -> bool {
        self.tables.contains_key(table)
    }

    fn read(&self, request: &ReadRequest) -> Result<DataFrame> {
        let df = self.table_or_err(&request.table)?;

        let mut referenced: Vec<&str> = request.fields.iter().map(String::as_str).collect();
        referenced.extend(request.filter.iter().map(Predicate::column));
        referenced.extend(request.order.iter().map(|o| o.column.as_str()));
        require_columns(df, &request.table, &referenced)?;

        let mut lazy = df.clone().lazy();
        for predicate in &request.filter {
            lazy = lazy.filter(predicate.to_expr());
        }

        if !request.order.is_empty() {
            let by: Vec<Expr> = request.order.iter().map(|o| col(o.column.as_str())).collect();
            let descending: Vec<bool> = request.order.iter().map(|o| o.descending).collect();
            lazy = lazy.sort_by_exprs(
                by,
                SortMultipleOptions::default()
                    .with_order_descending_multi(descending)
                    .with_nulls_last(true)
                    .with_maintain_order(true),
            );
        }

        if !request.fields.is_empty() {
            let fields: Vec<Expr> = request.fields.iter().map(|f| col(f.as_str())).collect();
            lazy = lazy.select(fields);
        }

        lazy.collect()
            .with_context(|| format!("Failed to read table '{}'", request.table))
    }

    fn insert(&mut self, table: &str, fields: &[&str], row: &[Cell]) -> Result<()> {
        if fields.len() != row.len() {
            return Err(RatingError::Store {
                table: table.to_string(),
                message: format!("{} fields but {} values", fields.len(), row.len()),
            }
            .into());
        }

        let Some(existing) = self.tables.get_mut(table) else {
            let columns: Vec<Column> = fields
                .iter()
                .zip(row)
                .map(|(&name, cell)| single_cell_column(name, cell, None))
                .collect();
            let df = DataFrame::new(columns)
                .with_context(|| format!("Failed to create table '{}'", table))?;
            self.tables.insert(table.to_string(), df);
            return Ok(());
        };

        for &field in fields {
            if !has_column(existing, field) {
                return Err(RatingError::MissingColumn {
                    table: table.to_string(),
                    column: field.to_string(),
                    available: column_names(existing),
                }
                .into());
            }
        }

        // New row in the table's own column order and dtypes
        let schema = existing.schema().clone();
        let columns: Vec<Column> = schema
            .iter()
            .map(|(name, dtype)| {
                let cell = fields
                    .iter()
                    .position(|&f| f == name.as_str())
                    .and_then(|i| row[i].clone());
                single_cell_column(name.as_str(), &cell, Some(dtype))
            })
            .collect();
        let new_row = DataFrame::new(columns)
            .with_context(|| format!("Failed to build row for table '{}'", table))?;

        existing
            .vstack_mut(&new_row)
            .with_context(|| format!("Failed to insert into table '{}'", table))?;
        Ok(())
    }

    fn update(
        &mut self,
        table: &str,
        fields: &[&str],
        row: &[Cell],
        predicate: &Predicate,
    ) -> Result<usize> {
        let df = self.table_or_err(table)?;
        require_columns(df, table, fields)?;
        require_columns(df, table, &[predicate.column()])?;

        let touched = df
            .clone()
            .lazy()
            .filter(predicate.to_expr())
            .collect()
            .with_context(|| format!("Failed to evaluate update predicate on '{}'", table))?
            .height();
        if touched == 0 {
            return Ok(0);
        }

        let schema = df.schema().clone();
        let assignments: Vec<Expr> = fields
            .iter()
            .zip(row)
            .map(|(&field, cell)| {
                let dtype = schema.get(field).cloned().unwrap_or(DataType::String);
                when(predicate.to_expr())
                    .then(cell_lit(cell, &dtype))
                    .otherwise(col(field))
                    .alias(field)
            })
            .collect();

        let updated = df
            .clone()
            .lazy()
            .with_columns(assignments)
            .collect()
            .with_context(|| format!("Failed to update table '{}'", table))?;
        self.tables.insert(table.to_string(), updated);
        Ok(touched)
    }

    /// Whole-frame upsert: drop the replaced keys, stack the new rows once
    fn upsert(&mut self, table: &str, key: &str, frame: &DataFrame) -> Result<WriteSummary> {
        require_columns(frame, table, &[key])?;
        let new_keys: FxHashSet<String> = str_column(frame, table, key)?.into_iter().flatten().collect();

        let Some(existing) = self.tables.get(table) else {
            let df = sorted_by_key(frame.clone(), key)?;
            self.tables.insert(table.to_string(), df);
            return Ok(WriteSummary {
                inserted: frame.height(),
                updated: 0,
            });
        };

        require_columns(existing, table, &[key])?;
        for name in frame.get_column_names() {
            if !has_column(existing, name.as_str()) {
                return Err(RatingError::MissingColumn {
                    table: table.to_string(),
                    column: name.to_string(),
                    available: column_names(existing),
                }
                .into());
            }
        }

        let existing_keys = str_column(existing, table, key)?;
        let present: FxHashSet<&str> = existing_keys.iter().flatten().map(String::as_str).collect();
        let updated = new_keys.iter().filter(|k| present.contains(k.as_str())).count();

        let keep: Vec<bool> = existing_keys
            .iter()
            .map(|k| k.as_ref().map_or(true, |k| !new_keys.contains(k)))
            .collect();
        let mask = Series::new("keep".into(), keep);
        let mut kept = existing
            .filter(mask.bool()?)
            .with_context(|| format!("Failed to drop replaced rows from '{}'", table))?;

        // New rows in the table's column order; mismatched dtypes widen to text
        let schema = existing.schema().clone();
        let mut columns: Vec<Column> = Vec::with_capacity(schema.len());
        for (name, dtype) in schema.iter() {
            let incoming = match frame.column(name.as_str()) {
                Ok(c) => c.clone(),
                Err(_) => Column::full_null(name.clone(), frame.height(), dtype),
            };
            let target = if incoming.dtype() == dtype || incoming.null_count() == incoming.len() {
                dtype.clone()
            } else if incoming.dtype() == &DataType::String || dtype == &DataType::String {
                DataType::String
            } else {
                dtype.clone()
            };
            if &target != dtype {
                let widened = kept.column(name.as_str())?.cast(&target)?;
                kept.with_column(widened)?;
            }
            columns.push(incoming.cast(&target)?);
        }
        let incoming = DataFrame::new(columns)
            .with_context(|| format!("Failed to align rows for '{}'", table))?;

        kept.vstack_mut(&incoming)
            .with_context(|| format!("Failed to upsert into '{}'", table))?;
        let merged = sorted_by_key(kept, key)?;
        self.tables.insert(table.to_string(), merged);

        let summary = WriteSummary {
            inserted: frame.height() - updated,
            updated,
        };
        debug!(
            "Upserted '{}': {} inserted, {} updated",
            table, summary.inserted, summary.updated
        );
        Ok(summary)
    }
}

/// One-row column for a cell, cast to `dtype` when given
fn single_cell_column(name: &str, cell: &Cell, dtype: Option<&DataType>) -> Column {
    let series = match cell {
        Some(RatingValue::Number(v)) => Series::new(name.into(), &[*v]),
        Some(RatingValue::Text(s)) => Series::new(name.into(), &[s.as_str()]),
        None => Series::full_null(name.into(), 1, dtype.unwrap_or(&DataType::String)),
    };
    let series = match dtype {
        Some(dt) if series.dtype() != dt => series
            .cast(dt)
            .unwrap_or_else(|_| Series::full_null(name.into(), 1, dt)),
        _ => series,
    };
    Column::from(series)
}
