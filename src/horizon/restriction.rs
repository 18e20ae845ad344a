//! Component restriction depth
//!
//! The depth at which roots (and water movement) are considered blocked.
//! Horizons are scanned shallowest first; the first horizon that is a dense
//! layer, strongly acid, saline, or contains a declared restrictive feature
//! fixes the depth. The result never exceeds the caller's floor.

use crate::data::{Component, Horizon, Restriction, RestrictionKind};
use crate::horizon::classifier::{is_dense_layer, is_organic_horizon};
use smallvec::SmallVec;
use tracing::debug;

/// Floor for root-zone calculations (cm)
pub const ROOT_ZONE_FLOOR: f64 = 150.0;

/// Floor for organic-carbon calculations: effectively none
pub const UNBOUNDED_FLOOR: f64 = f64::INFINITY;

/// pH at or below which a horizon restricts roots
pub const ACID_PH_LIMIT: f64 = 3.5;

/// EC (dS/m) at or above which a horizon restricts roots
pub const SALINE_EC_LIMIT: f64 = 16.0;

/// What stopped the root zone
#[derive(Debug, Clone, PartialEq)]
pub enum RestrictionTrigger {
    DenseLayer,
    Acid,
    Saline,
    Declared(RestrictionKind),
}

impl RestrictionTrigger {
    pub fn label(&self) -> &str {
        match self {
            RestrictionTrigger::DenseLayer => "Dense layer",
            RestrictionTrigger::Acid => "pH <= 3.5",
            RestrictionTrigger::Saline => "EC >= 16",
            RestrictionTrigger::Declared(kind) => kind.label(),
        }
    }
}

/// Restriction depth of one component and the features that set it
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentRestriction {
    pub cokey: String,
    pub depth: f64,
    pub triggers: SmallVec<[RestrictionTrigger; 4]>,
}

impl ComponentRestriction {
    /// True when something other than the floor set the depth
    pub fn is_restricted(&self) -> bool {
        !self.triggers.is_empty()
    }

    pub fn kinds(&self) -> String {
        self.triggers
            .iter()
            .map(RestrictionTrigger::label)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Compute the restriction depth of a component
///
/// `horizons` must be ordered by top depth ascending. Declared restrictions
/// outside every scanned horizon still apply through the final minimum.
pub fn component_restriction_depth(
    component: &Component,
    horizons: &[Horizon],
    restrictions: &[Restriction],
    floor: f64,
) -> ComponentRestriction {
    let histosol = component.is_histosol();

    if restrictions.is_empty() {
        debug!("Component {} has no restriction rows; treated as unrestricted", component.cokey);
    }
    // Unrecognized kinds (`RestrictionKind::Other`, e.g. "Abrupt textural
    // change") are not root-limiting and never set the depth
    let declared: Vec<(&RestrictionKind, f64)> = restrictions
        .iter()
        .filter(|r| r.kind.restricts_roots())
        .filter_map(|r| r.top.map(|top| (&r.kind, top)))
        .collect();

    let mut depth = floor;
    let mut triggers: SmallVec<[RestrictionTrigger; 4]> = SmallVec::new();

    for hz in horizons.iter().take_while(|hz| hz.top < floor) {
        let mut fired: SmallVec<[RestrictionTrigger; 4]> = SmallVec::new();

        if !histosol
            && !is_organic_horizon(hz, component)
            && is_dense_layer(hz.sand, hz.silt, hz.clay, hz.bulk_density)
        {
            fired.push(RestrictionTrigger::DenseLayer);
        }
        if !histosol && hz.ph.map_or(false, |ph| ph <= ACID_PH_LIMIT) {
            fired.push(RestrictionTrigger::Acid);
        }
        if !histosol && hz.ec.map_or(false, |ec| ec >= SALINE_EC_LIMIT) {
            fired.push(RestrictionTrigger::Saline);
        }

        let mut declared_top: Option<f64> = None;
        for &(kind, top) in declared.iter().filter(|(_, top)| *top >= hz.top && *top < hz.bottom) {
            fired.push(RestrictionTrigger::Declared(kind.clone()));
            declared_top = Some(declared_top.map_or(top, |d: f64| d.min(top)));
        }

        if !fired.is_empty() {
            let hz_depth = declared_top.unwrap_or(hz.top);
            debug!(
                "Component {} restricted at {} cm by horizon {} ({:?})",
                component.cokey, hz_depth, hz.chkey, fired
            );
            if hz_depth < depth {
                depth = hz_depth;
                triggers = fired;
            }
            break;
        }
    }

    // Declared features in gaps or below the horizon data
    for &(kind, top) in &declared {
        if top < depth {
            depth = top;
            triggers = SmallVec::from_elem(RestrictionTrigger::Declared(kind.clone()), 1);
        }
    }

    ComponentRestriction {
        cokey: component.cokey.clone(),
        depth,
        triggers,
    }
}
