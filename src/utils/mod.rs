//! Shared utilities
//!
//! - `value`: rating cell type (number or class label)
//! - `tiebreak`: the winner-picking primitive every strategy ends in
//! - `frame`: DataFrame column access with validation

pub mod frame;
pub mod tiebreak;
pub mod value;

pub use frame::require_columns;
pub use tiebreak::{pick_winner, TieBreak};
pub use value::{Cell, RatingValue};
