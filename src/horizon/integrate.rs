//! Depth-Integrated Horizon Aggregator
//!
//! Integrates a horizon property over a depth window, clipped at the
//! component's restriction depth, then rolls component totals up to the
//! map unit by component percent.
//!
//! Per horizon the contributing thickness is
//! `min(bottom, window.to, restriction) - max(top, window.from)`. Horizons
//! with no thickness left, and organic horizons in the unbroken run at the
//! surface, are skipped.

use crate::data::{Component, Horizon, SoilHierarchy};
use crate::horizon::classifier::is_organic_horizon;
use crate::horizon::restriction::{component_restriction_depth, ROOT_ZONE_FLOOR, UNBOUNDED_FLOOR};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Organic matter to organic carbon (Van Bemmelen factor)
pub const OM_TO_OC: f64 = 1.724;

/// Depth range in cm, top inclusive
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DepthWindow {
    pub from: f64,
    pub to: f64,
}

impl DepthWindow {
    pub const fn new(from: f64, to: f64) -> Self {
        DepthWindow { from, to }
    }

    pub fn is_valid(&self) -> bool {
        self.from >= 0.0 && self.from < self.to
    }

    /// Thickness of a horizon inside this window and above `limit`
    pub fn overlap(&self, top: f64, bottom: f64, limit: f64) -> f64 {
        bottom.min(self.to).min(limit) - top.max(self.from)
    }

    /// Column suffix such as `0_150`
    pub fn suffix(&self) -> String {
        format!("{}_{}", self.from, self.to)
    }
}

impl fmt::Display for DepthWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{} cm", self.from, self.to)
    }
}

/// Horizon properties that can be depth-integrated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DepthAttribute {
    /// Available water supply, mm
    AvailableWater,
    /// Soil organic carbon stock, g C / m2
    OrganicCarbon,
}

impl DepthAttribute {
    /// Restriction floor used when clipping this property
    pub fn floor(self) -> f64 {
        match self {
            DepthAttribute::AvailableWater => ROOT_ZONE_FLOOR,
            DepthAttribute::OrganicCarbon => UNBOUNDED_FLOOR,
        }
    }

    /// Scaled contribution of `thickness` cm of a horizon
    pub fn horizon_value(self, horizon: &Horizon, component: &Component, thickness: f64) -> Option<f64> {
        match self {
            DepthAttribute::AvailableWater => horizon.awc.map(|awc| awc * thickness * 10.0),
            DepthAttribute::OrganicCarbon => {
                let om = horizon.organic_matter?;
                let db = horizon.bulk_density?;
                let frag = horizon.frag_volume.unwrap_or(0.0);
                let pct = component.percent?;
                Some(
                    thickness * (om / OM_TO_OC) * db / 100.0 * ((100.0 - frag) / 100.0)
                        * (pct * 100.0),
                )
            }
        }
    }

    pub fn rollup(self) -> Rollup {
        match self {
            DepthAttribute::AvailableWater => Rollup::PercentWeighted,
            // Component totals already carry the percent weight
            DepthAttribute::OrganicCarbon => Rollup::PreWeighted,
        }
    }
}

/// How component totals combine into a map-unit total
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rollup {
    /// `sum(total * pct) / sum(pct)`
    PercentWeighted,
    /// `sum(total) * 100 / sum(pct)`
    PreWeighted,
}

/// Integrated total for one component
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComponentDepthTotal {
    pub cokey: String,
    pub mukey: String,
    pub percent: f64,
    /// Thickness (cm) of horizons that contributed a value
    pub thickness: f64,
    pub total: f64,
    /// False when no horizon contributed data at all
    pub contributed: bool,
}

/// Integrated total for one map unit
#[derive(Debug, Clone, PartialEq)]
pub struct MapUnitDepthTotal {
    pub mukey: String,
    /// Sum of contributing component percents
    pub percent: f64,
    pub total: f64,
    /// Percent-weighted mean contributing thickness
    pub thickness: f64,
}

#[derive(Default)]
struct HorizonScan {
    mineral_seen: bool,
    thickness: f64,
    total: f64,
    contributed: bool,
}

/// Integrate one component's horizons over `window`, clipped at `restriction_depth`
///
/// `value_fn` returns the scaled contribution for a horizon given its
/// contributing thickness, or `None` when the horizon has no data.
pub fn integrate<F>(
    component: &Component,
    horizons: &[Horizon],
    window: DepthWindow,
    restriction_depth: f64,
    value_fn: F,
) -> ComponentDepthTotal
where
    F: Fn(&Horizon, f64) -> Option<f64>,
{
    let scan = horizons.iter().fold(HorizonScan::default(), |mut acc, hz| {
        let organic = is_organic_horizon(hz, component);
        if organic && !acc.mineral_seen {
            return acc;
        }
        acc.mineral_seen = true;

        let t = window.overlap(hz.top, hz.bottom, restriction_depth);
        if t <= 0.0 {
            return acc;
        }
        if let Some(value) = value_fn(hz, t) {
            acc.thickness += t;
            acc.total += value;
            acc.contributed = true;
        }
        acc
    });

    ComponentDepthTotal {
        cokey: component.cokey.clone(),
        mukey: component.mukey.clone(),
        percent: component.percent_or_zero(),
        thickness: scan.thickness,
        total: scan.total,
        contributed: scan.contributed,
    }
}

/// Combine component totals into a map-unit total
///
/// Components that contributed no data are left out of the denominator.
/// Returns `None` when nothing contributed.
pub fn roll_up(mukey: &str, components: &[ComponentDepthTotal], rollup: Rollup) -> Option<MapUnitDepthTotal> {
    let contributors: Vec<&ComponentDepthTotal> = components
        .iter()
        .filter(|c| c.contributed && c.percent > 0.0)
        .collect();
    let sum_pct: f64 = contributors.iter().map(|c| c.percent).sum();
    if sum_pct <= 0.0 {
        return None;
    }

    let thickness: f64 = contributors
        .iter()
        .map(|c| c.thickness * c.percent / sum_pct)
        .sum();
    let total: f64 = match rollup {
        Rollup::PercentWeighted => contributors.iter().map(|c| c.total * c.percent / sum_pct).sum(),
        Rollup::PreWeighted => contributors.iter().map(|c| c.total).sum::<f64>() * 100.0 / sum_pct,
    };

    Some(MapUnitDepthTotal {
        mukey: mukey.to_string(),
        percent: sum_pct,
        total,
        thickness,
    })
}

/// Components that take part in depth integration
pub fn earthy_components<'a>(
    hierarchy: &'a SoilHierarchy,
    mukey: &str,
) -> impl Iterator<Item = &'a Component> + 'a {
    hierarchy
        .components(mukey)
        .iter()
        .filter(|c| !c.is_miscellaneous_area() && c.percent.map_or(false, |p| p > 0.0))
}

/// Integrate `attribute` over `window` for every map unit
///
/// Map units where no component contributed data are absent from the result.
pub fn integrate_depth(
    attribute: DepthAttribute,
    window: DepthWindow,
    hierarchy: &SoilHierarchy,
) -> FxHashMap<String, MapUnitDepthTotal> {
    integrate_depth_with_floor(attribute, window, attribute.floor(), hierarchy)
}

/// Same as [`integrate_depth`] with an explicit restriction floor
pub fn integrate_depth_with_floor(
    attribute: DepthAttribute,
    window: DepthWindow,
    floor: f64,
    hierarchy: &SoilHierarchy,
) -> FxHashMap<String, MapUnitDepthTotal> {
    let mut out = FxHashMap::default();
    for mu in hierarchy.map_units() {
        let totals: Vec<ComponentDepthTotal> = earthy_components(hierarchy, &mu.mukey)
            .map(|comp| {
                let horizons = hierarchy.horizons(&comp.cokey);
                let restriction = component_restriction_depth(
                    comp,
                    horizons,
                    hierarchy.restrictions(&comp.cokey),
                    floor,
                );
                integrate(comp, horizons, window, restriction.depth, |hz, t| {
                    attribute.horizon_value(hz, comp, t)
                })
            })
            .collect();

        if let Some(total) = roll_up(&mu.mukey, &totals, attribute.rollup()) {
            out.insert(mu.mukey.clone(), total);
        }
    }
    out
}
