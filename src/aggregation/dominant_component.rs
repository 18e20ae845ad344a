//! Dominant Component
//!
//! The rating of the component with the largest percent. When several
//! components share that percent, the tie-break on rating value decides;
//! null and not-rated values lose that tie in either direction.

use super::{ComponentRating, ValueOrder};
use crate::error::RatingResult;
use crate::utils::tiebreak::pick_winner;
use crate::utils::value::Cell;

pub fn dominant_component(
    components: &[ComponentRating],
    order: ValueOrder<'_>,
    prefer_high: bool,
    context: &str,
) -> RatingResult<(Option<f64>, Cell)> {
    let top = components
        .iter()
        .map(|c| c.percent)
        .fold(f64::NEG_INFINITY, f64::max);

    let candidates: Vec<(f64, Cell)> = components
        .iter()
        .filter(|c| c.percent == top)
        .map(|c| (c.percent, c.value.clone()))
        .collect();

    let (percent, value) = pick_winner(&candidates, prefer_high, order.demoting_cmp(prefer_high), context)?;
    Ok((Some(percent), order.canonical(value)))
}
