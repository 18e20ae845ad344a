//! Root-zone available water
//!
//! Root-zone depth is the component's restriction depth (floor 150 cm).
//! Available water is integrated from the surface down to it, skipping the
//! leading organic horizons. A map unit with 152 mm or less of root-zone
//! water is droughty.

use crate::data::{Component, Horizon, Restriction, SoilHierarchy};
use crate::horizon::integrate::{
    earthy_components, integrate, roll_up, ComponentDepthTotal, DepthAttribute, DepthWindow, Rollup,
};
use crate::horizon::restriction::{component_restriction_depth, ComponentRestriction, ROOT_ZONE_FLOOR};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Root-zone thresholds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RootZoneConfig {
    /// Deepest the root zone can reach, cm
    pub floor_depth: f64,
    /// Root-zone AWS at or below which a soil is droughty, mm
    pub droughty_threshold_mm: f64,
}

impl Default for RootZoneConfig {
    fn default() -> Self {
        Self {
            floor_depth: ROOT_ZONE_FLOOR,
            droughty_threshold_mm: 152.0,
        }
    }
}

/// Root zone of one component
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentRootZone {
    pub cokey: String,
    pub mukey: String,
    pub percent: f64,
    pub restriction: ComponentRestriction,
    /// Contributing thickness, cm
    pub depth: f64,
    /// Root-zone available water, mm
    pub available_water: f64,
    pub droughty: bool,
    pub contributed: bool,
}

/// Root zone of one map unit
#[derive(Debug, Clone, PartialEq)]
pub struct MapUnitRootZone {
    pub mukey: String,
    /// Sum of contributing component percents
    pub percent: f64,
    pub root_zone_depth: f64,
    pub root_zone_available_water: f64,
    pub droughty: bool,
    /// Percent of the map unit in droughty components
    pub droughty_percent: f64,
}

/// Clamp integrated thickness to the floor, scaling water with it
///
/// Overlapping horizon records can add up to more soil than the floor
/// allows; both totals are reduced proportionally.
fn clamp_to_floor(total: &mut ComponentDepthTotal, floor: f64) {
    if total.thickness > floor && total.thickness > 0.0 {
        let scale = floor / total.thickness;
        total.thickness = floor;
        total.total *= scale;
    }
}

pub fn component_root_zone(
    component: &Component,
    horizons: &[Horizon],
    restrictions: &[Restriction],
    config: &RootZoneConfig,
) -> ComponentRootZone {
    let restriction =
        component_restriction_depth(component, horizons, restrictions, config.floor_depth);
    let window = DepthWindow::new(0.0, config.floor_depth);

    let mut total = integrate(component, horizons, window, restriction.depth, |hz, t| {
        DepthAttribute::AvailableWater.horizon_value(hz, component, t)
    });
    clamp_to_floor(&mut total, config.floor_depth);

    ComponentRootZone {
        cokey: component.cokey.clone(),
        mukey: component.mukey.clone(),
        percent: total.percent,
        restriction,
        depth: total.thickness,
        available_water: total.total,
        droughty: total.contributed && total.total <= config.droughty_threshold_mm,
        contributed: total.contributed,
    }
}

/// Root-zone rating for every map unit with data
pub fn root_zone(
    hierarchy: &SoilHierarchy,
    config: &RootZoneConfig,
) -> FxHashMap<String, MapUnitRootZone> {
    let mut out = FxHashMap::default();

    for mu in hierarchy.map_units() {
        let components: Vec<ComponentRootZone> = earthy_components(hierarchy, &mu.mukey)
            .map(|comp| {
                component_root_zone(
                    comp,
                    hierarchy.horizons(&comp.cokey),
                    hierarchy.restrictions(&comp.cokey),
                    config,
                )
            })
            .collect();

        if let Some(mu_zone) = map_unit_root_zone(&mu.mukey, &components, config) {
            out.insert(mu.mukey.clone(), mu_zone);
        }
    }
    out
}

pub fn map_unit_root_zone(
    mukey: &str,
    components: &[ComponentRootZone],
    config: &RootZoneConfig,
) -> Option<MapUnitRootZone> {
    let totals: Vec<ComponentDepthTotal> = components
        .iter()
        .map(|c| ComponentDepthTotal {
            cokey: c.cokey.clone(),
            mukey: c.mukey.clone(),
            percent: c.percent,
            thickness: c.depth,
            total: c.available_water,
            contributed: c.contributed,
        })
        .collect();

    let rolled = roll_up(mukey, &totals, Rollup::PercentWeighted)?;
    let droughty_percent: f64 = components
        .iter()
        .filter(|c| c.droughty)
        .map(|c| c.percent)
        .sum();

    Some(MapUnitRootZone {
        mukey: mukey.to_string(),
        percent: rolled.percent,
        root_zone_depth: rolled.thickness.min(config.floor_depth),
        root_zone_available_water: rolled.total,
        droughty: rolled.total <= config.droughty_threshold_mm,
        droughty_percent,
    })
}
