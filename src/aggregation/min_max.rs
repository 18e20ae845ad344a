//! Minimum or Maximum ("Least / Most Limiting" for interpretations)
//!
//! The single lowest or highest ranked value across every qualifying
//! component. Null and not-rated values only win when nothing else is
//! present.

use super::{ComponentRating, ValueOrder};
use crate::error::RatingResult;
use crate::utils::tiebreak::pick_winner;
use crate::utils::value::Cell;

pub fn minimum_or_maximum(
    components: &[ComponentRating],
    order: ValueOrder<'_>,
    prefer_high: bool,
    context: &str,
) -> RatingResult<(Option<f64>, Cell)> {
    // Substantive ratings first, then not-rated, then nulls
    let substantive: Vec<&ComponentRating> = components
        .iter()
        .filter(|c| !order.is_demoted(&c.value))
        .collect();
    let non_null: Vec<&ComponentRating> = components.iter().filter(|c| c.value.is_some()).collect();
    let pool = if !substantive.is_empty() {
        substantive
    } else if !non_null.is_empty() {
        non_null
    } else {
        components.iter().collect()
    };
    let candidates: Vec<(f64, Cell)> = pool.iter().map(|c| (c.percent, c.value.clone())).collect();

    let (percent, value) = pick_winner(&candidates, prefer_high, |a, b| order.compare(a, b), context)?;
    Ok((Some(percent), order.canonical(value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::test_support::*;
    use crate::config::DataShape;
    use crate::utils::tiebreak::TieBreak;

    #[test]
    fn test_extreme_across_all_components() {
        let catalog = drainage();
        let order = ValueOrder::new(&catalog, DataShape::Qualitative);
        let comps = vec![
            rating("c1", 70.0, text("Well drained")),
            rating("c2", 20.0, text("Moderately well drained")),
            rating("c3", 10.0, text("Poorly drained")),
        ];
        let (pct, value) = minimum_or_maximum(&comps, order, true, "m1").unwrap();
        assert_eq!(value, text("Poorly drained"));
        assert_eq!(pct, Some(10.0));
        let (_, value) = minimum_or_maximum(&comps, order, false, "m1").unwrap();
        assert_eq!(value, text("Well drained"));
    }

    #[test]
    fn test_not_rated_excluded_unless_alone() {
        let catalog = interp();
        let order = ValueOrder::new(&catalog, DataShape::Qualitative);
        let comps = vec![
            rating("c1", 60.0, text("Not rated")),
            rating("c2", 40.0, text("Somewhat limited")),
        ];
        let (_, value) = minimum_or_maximum(&comps, order, false, "m1").unwrap();
        assert_eq!(value, text("Somewhat limited"));

        let comps = vec![rating("c1", 60.0, text("Not rated")), rating("c2", 40.0, None)];
        let (pct, value) = minimum_or_maximum(&comps, order, false, "m1").unwrap();
        assert_eq!(value, text("Not rated"));
        assert_eq!(pct, Some(60.0));
    }

    #[test]
    fn test_limiting_labels_follow_rank_order_for_every_rule_type() {
        // Least Limiting reads as Lower and Most Limiting as Higher on the
        // domain rank, whether the rule rates limitations or suitability.
        let limitation = interp();
        let suitability = crate::domain::DomainCatalog::new(
            "suitability",
            &["Well suited", "Moderately suited", "Poorly suited"],
            Some("Not rated"),
        );
        let cases = [
            (&limitation, ["Not limited", "Very limited"]),
            (&suitability, ["Well suited", "Poorly suited"]),
        ];
        for (catalog, [low, high]) in cases {
            let order = ValueOrder::new(catalog, DataShape::Qualitative);
            let comps = vec![rating("c1", 50.0, text(low)), rating("c2", 50.0, text(high))];

            let least = TieBreak::from_label("Least Limiting").unwrap();
            let (_, value) = minimum_or_maximum(&comps, order, least.prefer_high(), "m1").unwrap();
            assert_eq!(value, text(low));

            let most = TieBreak::from_label("Most Limiting").unwrap();
            let (_, value) = minimum_or_maximum(&comps, order, most.prefer_high(), "m1").unwrap();
            assert_eq!(value, text(high));
        }
    }

    #[test]
    fn test_numeric_extreme() {
        let catalog = drainage();
        let order = ValueOrder::new(&catalog, DataShape::Numeric);
        let comps = vec![rating("c1", 60.0, num(25.0)), rating("c2", 40.0, num(8.0))];
        let (pct, value) = minimum_or_maximum(&comps, order, false, "m1").unwrap();
        assert_eq!((pct, value), (Some(40.0), num(8.0)));
    }
}
