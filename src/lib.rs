//! Soil survey rating engine
//!
//! Condenses component-, horizon-, and month-level soil survey records into
//! one rating per map unit, and integrates horizon properties over depth
//! for root-zone available water, available-water supply, and organic
//! carbon.
//!
//! - `domain`: ranked legal values of qualitative attributes
//! - `data`: survey hierarchy (map unit -> component -> horizon / month)
//! - `horizon/`: organic and dense-layer tests, restriction depth, depth integration
//! - `aggregation/`: component reductions and the five map-unit strategies
//! - `output`: rating tables and their writes back to the store
//! - `engine`: end-to-end runs over a `TabularStore`

pub mod aggregation;
pub mod config;
pub mod data;
pub mod domain;
pub mod engine;
pub mod error;
pub mod horizon;
pub mod output;
pub mod store;
pub mod utils;

// Re-export commonly used types
pub use aggregation::{aggregate, plan_for, AggregateOptions, AttributeValues, Plan, Strategy};
pub use config::{AggregationMethod, AttributeConfig, AttributeLevel, DataShape, NullHandling};
pub use data::{HierarchyNeeds, SoilHierarchy};
pub use domain::DomainCatalog;
pub use engine::{BatchReport, RatingEngine};
pub use error::{RatingError, RatingResult};
pub use horizon::{integrate_depth, root_zone, DepthWindow, RootZoneConfig};
pub use output::{AggregatedRating, RatingTable};
pub use store::{FrameStore, Predicate, ReadRequest, TabularStore, WriteSummary};
pub use utils::{Cell, RatingValue, TieBreak};
