//! DataFrame access helpers with column validation
//!
//! Survey tables arrive as text (every column read as a string) or as
//! typed frames built in memory. These helpers validate that the requested
//! columns exist and pull them out as plain Rust vectors, casting as needed.

use crate::error::RatingError;
use crate::utils::value::{Cell, RatingValue};
use anyhow::{Context, Result};
use polars::prelude::*;

/// Column names of a frame as owned strings
pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names()
        .into_iter()
        .map(|s| s.to_string())
        .collect()
}

pub fn has_column(df: &DataFrame, name: &str) -> bool {
    df.get_column_names().iter().any(|c| c.as_str() == name)
}

/// Fail with the available column list when any requested column is absent
pub fn require_columns(df: &DataFrame, table: &str, columns: &[&str]) -> Result<(), RatingError> {
    for &expected in columns {
        if !has_column(df, expected) {
            return Err(RatingError::MissingColumn {
                table: table.to_string(),
                column: expected.to_string(),
                available: column_names(df),
            });
        }
    }
    Ok(())
}

/// Text values of a column; blank strings come back as `None`
pub fn str_column(df: &DataFrame, table: &str, name: &str) -> Result<Vec<Option<String>>> {
    require_columns(df, table, &[name])?;
    let casted = df
        .column(name)?
        .cast(&DataType::String)
        .with_context(|| format!("{}: column '{}' is not readable as text", table, name))?;

    let values = casted
        .as_materialized_series()
        .str()?
        .into_iter()
        .map(|opt| {
            opt.map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| s.to_string())
        })
        .collect();
    Ok(values)
}

/// Numeric values of a column; unparseable text comes back as `None`
pub fn f64_column(df: &DataFrame, table: &str, name: &str) -> Result<Vec<Option<f64>>> {
    require_columns(df, table, &[name])?;
    let source = df.column(name)?;

    // Text columns may carry padding; trim before casting
    if source.dtype() == &DataType::String {
        let values = source
            .as_materialized_series()
            .str()?
            .into_iter()
            .map(|opt| opt.and_then(|s| s.trim().parse::<f64>().ok()))
            .collect();
        return Ok(values);
    }

    let casted = source
        .cast(&DataType::Float64)
        .with_context(|| format!("{}: column '{}' is not numeric", table, name))?;
    let values = casted.as_materialized_series().f64()?.into_iter().collect();
    Ok(values)
}

pub fn i64_column(df: &DataFrame, table: &str, name: &str) -> Result<Vec<Option<i64>>> {
    Ok(f64_column(df, table, name)?
        .into_iter()
        .map(|v| v.map(|x| x.round() as i64))
        .collect())
}

/// Like `f64_column`, but an absent column reads as all-null
pub fn optional_f64_column(df: &DataFrame, table: &str, name: &str) -> Result<Vec<Option<f64>>> {
    if has_column(df, name) {
        f64_column(df, table, name)
    } else {
        Ok(vec![None; df.height()])
    }
}

pub fn optional_str_column(
    df: &DataFrame,
    table: &str,
    name: &str,
) -> Result<Vec<Option<String>>> {
    if has_column(df, name) {
        str_column(df, table, name)
    } else {
        Ok(vec![None; df.height()])
    }
}

/// Attribute values as cells, numeric or textual
pub fn cell_column(df: &DataFrame, table: &str, name: &str, numeric: bool) -> Result<Vec<Cell>> {
    if numeric {
        Ok(f64_column(df, table, name)?
            .into_iter()
            .map(|v| v.map(RatingValue::Number))
            .collect())
    } else {
        Ok(str_column(df, table, name)?
            .into_iter()
            .map(|v| v.map(RatingValue::Text))
            .collect())
    }
}
