//! Dominant Condition
//!
//! Components are grouped by rating (domain rank for qualitative values,
//! raw equality for numbers) and their percents summed. The condition with
//! the largest total wins; equal totals go to the tie-break on rank, with
//! null and not-rated conditions losing to any substantive rating.

use super::{ComponentRating, ConditionKey, ValueOrder};
use crate::error::RatingResult;
use crate::utils::tiebreak::pick_winner;
use crate::utils::value::Cell;

/// Summed percent tolerance when comparing condition totals
const PERCENT_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone)]
struct Condition {
    key: ConditionKey,
    value: Cell,
    percent: f64,
}

fn tally(components: &[ComponentRating], order: ValueOrder<'_>) -> Vec<Condition> {
    components.iter().fold(Vec::new(), |mut acc, c| {
        let key = order.condition_key(&c.value);
        match acc.iter_mut().find(|cond: &&mut Condition| cond.key == key) {
            Some(cond) => cond.percent += c.percent,
            None => acc.push(Condition {
                key,
                value: c.value.clone(),
                percent: c.percent,
            }),
        }
        acc
    })
}

pub fn dominant_condition(
    components: &[ComponentRating],
    order: ValueOrder<'_>,
    prefer_high: bool,
    context: &str,
) -> RatingResult<(Option<f64>, Cell)> {
    let conditions = tally(components, order);
    let best = conditions
        .iter()
        .map(|c| c.percent)
        .fold(f64::NEG_INFINITY, f64::max);

    let tied: Vec<(f64, Cell)> = conditions
        .into_iter()
        .filter(|c| (best - c.percent).abs() <= PERCENT_EPSILON)
        .map(|c| (c.percent, c.value))
        .collect();

    let (percent, value) = pick_winner(&tied, prefer_high, order.demoting_cmp(prefer_high), context)?;
    Ok((Some(percent), order.canonical(value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::test_support::*;
    use crate::config::DataShape;

    #[test]
    fn test_summed_percent_beats_single_largest_component() {
        let catalog = drainage();
        let order = ValueOrder::new(&catalog, DataShape::Qualitative);
        let comps = vec![
            rating("c1", 40.0, text("Well drained")),
            rating("c2", 35.0, text("Poorly drained")),
            rating("c3", 25.0, text("POORLY DRAINED")),
        ];
        let (pct, value) = dominant_condition(&comps, order, true, "m1").unwrap();
        assert_eq!(pct, Some(60.0));
        assert_eq!(value, text("Poorly drained"));
    }

    #[test]
    fn test_equal_totals_broken_by_rank() {
        let catalog = drainage();
        let order = ValueOrder::new(&catalog, DataShape::Qualitative);
        let comps = vec![
            rating("c1", 50.0, text("Well drained")),
            rating("c2", 30.0, text("Somewhat poorly drained")),
            rating("c3", 20.0, text("Somewhat poorly drained")),
        ];
        let (_, high) = dominant_condition(&comps, order, true, "m1").unwrap();
        assert_eq!(high, text("Somewhat poorly drained"));
        let (_, low) = dominant_condition(&comps, order, false, "m1").unwrap();
        assert_eq!(low, text("Well drained"));
    }

    #[test]
    fn test_not_rated_loses_ties_in_both_directions() {
        let catalog = interp();
        let order = ValueOrder::new(&catalog, DataShape::Qualitative);
        let comps = vec![
            rating("c1", 50.0, text("Not rated")),
            rating("c2", 50.0, text("Somewhat limited")),
        ];
        for prefer_high in [true, false] {
            let (_, value) = dominant_condition(&comps, order, prefer_high, "m1").unwrap();
            assert_eq!(value, text("Somewhat limited"));
        }

        // Unless it is the only rating present
        let only = vec![rating("c1", 80.0, text("not rated"))];
        let (pct, value) = dominant_condition(&only, order, true, "m1").unwrap();
        assert_eq!(pct, Some(80.0));
        assert_eq!(value, text("Not rated"));
    }

    #[test]
    fn test_null_condition_when_included() {
        let catalog = drainage();
        let order = ValueOrder::new(&catalog, DataShape::Qualitative);
        let comps = vec![
            rating("c1", 60.0, None),
            rating("c2", 40.0, text("Well drained")),
        ];
        let (pct, value) = dominant_condition(&comps, order, true, "m1").unwrap();
        assert_eq!(pct, Some(60.0));
        assert_eq!(value, None);
    }

    #[test]
    fn test_numeric_conditions_group_by_value() {
        let catalog = drainage();
        let order = ValueOrder::new(&catalog, DataShape::Numeric);
        let comps = vec![
            rating("c1", 40.0, num(0.32)),
            rating("c2", 30.0, num(0.28)),
            rating("c3", 30.0, num(0.28)),
        ];
        let (pct, value) = dominant_condition(&comps, order, true, "m1").unwrap();
        assert_eq!(pct, Some(60.0));
        assert_eq!(value, num(0.28));
    }
}
