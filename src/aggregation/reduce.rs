//! Component reductions
//!
//! Collapse horizon- and month-level values to one value per component
//! before map-unit aggregation. Records without a value are skipped here;
//! null handling applies to the reduced component value.

use super::{AttributeValues, ComponentReduction, ValueOrder};
use crate::config::MonthWindow;
use crate::data::{Component, SoilHierarchy};
use crate::horizon::integrate::DepthWindow;
use crate::utils::tiebreak::{pick_winner, TieBreak};
use crate::utils::value::{Cell, RatingValue};

pub fn reduce_component(
    reduction: ComponentReduction,
    component: &Component,
    values: &AttributeValues,
    hierarchy: &SoilHierarchy,
    order: ValueOrder<'_>,
    tie_break: TieBreak,
) -> Cell {
    let prefer_high = tie_break.prefer_high();
    match reduction {
        ComponentReduction::Direct => values.get(&component.cokey).cloned(),
        ComponentReduction::HorizonWeightedAverage(window) => {
            let (weighted, thickness) = horizon_values(component, values, hierarchy, window)
                .filter_map(|(t, v)| v.as_f64().map(|v| (t, v)))
                .fold((0.0, 0.0), |(sum, thick), (t, v)| (sum + v * t, thick + t));
            (thickness > 0.0).then(|| RatingValue::Number(weighted / thickness))
        }
        ComponentReduction::HorizonExtreme(window) => extreme(
            horizon_values(component, values, hierarchy, window).filter_map(|(_, v)| v.as_f64()),
            prefer_high,
        ),
        ComponentReduction::HorizonThickest(window) => {
            // Strictly thicker replaces, so the shallower horizon keeps ties
            horizon_values(component, values, hierarchy, window)
                .fold(None::<(f64, &RatingValue)>, |best, (t, v)| match best {
                    Some((best_t, _)) if t <= best_t => best,
                    _ => Some((t, v)),
                })
                .map(|(_, v)| v.clone())
        }
        ComponentReduction::MonthExtreme(months) => extreme(
            month_values(component, values, hierarchy, months).filter_map(RatingValue::as_f64),
            prefer_high,
        ),
        ComponentReduction::MonthRanked(months) => {
            let candidates: Vec<(f64, Cell)> = month_values(component, values, hierarchy, months)
                .map(|v| (0.0, Some(v.clone())))
                .collect();
            if candidates.is_empty() {
                return None;
            }
            let context = format!("component {}", component.cokey);
            pick_winner(&candidates, prefer_high, order.demoting_cmp(prefer_high), &context)
                .ok()
                .and_then(|(_, v)| v)
        }
    }
}

/// `(thickness in window, value)` for each horizon with a value
fn horizon_values<'a>(
    component: &Component,
    values: &'a AttributeValues,
    hierarchy: &'a SoilHierarchy,
    window: DepthWindow,
) -> impl Iterator<Item = (f64, &'a RatingValue)> + 'a {
    hierarchy
        .horizons(&component.cokey)
        .iter()
        .filter_map(move |hz| {
            let t = window.overlap(hz.top, hz.bottom, f64::INFINITY);
            if t <= 0.0 {
                return None;
            }
            values.get(&hz.chkey).map(|v| (t, v))
        })
}

fn month_values<'a>(
    component: &Component,
    values: &'a AttributeValues,
    hierarchy: &'a SoilHierarchy,
    months: MonthWindow,
) -> impl Iterator<Item = &'a RatingValue> + 'a {
    hierarchy
        .months(&component.cokey)
        .iter()
        .filter(move |m| months.contains(m.month_seq))
        .filter_map(move |m| values.get(&m.comonthkey))
}

fn extreme(numbers: impl Iterator<Item = f64>, prefer_high: bool) -> Cell {
    numbers
        .reduce(|a, b| if prefer_high { a.max(b) } else { a.min(b) })
        .map(RatingValue::Number)
}
