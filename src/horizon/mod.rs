//! Horizon-level soil calculations
//!
//! - `classifier`: organic horizon and dense-layer tests
//! - `restriction`: component restriction depth
//! - `integrate`: depth-window integration and map-unit rollup
//! - `root_zone`: root-zone available water and droughtiness
//! - `profile`: available water and organic carbon over standard depths

pub mod classifier;
pub mod integrate;
pub mod profile;
pub mod restriction;
pub mod root_zone;

pub use classifier::{is_dense_layer, is_organic_horizon};
pub use integrate::{
    integrate, integrate_depth, roll_up, ComponentDepthTotal, DepthAttribute, DepthWindow,
    MapUnitDepthTotal, Rollup,
};
pub use profile::{depth_profile, DepthProfile, STANDARD_WINDOWS};
pub use restriction::{
    component_restriction_depth, ComponentRestriction, RestrictionTrigger, ROOT_ZONE_FLOOR,
    UNBOUNDED_FLOOR,
};
pub use root_zone::{root_zone, ComponentRootZone, MapUnitRootZone, RootZoneConfig};
