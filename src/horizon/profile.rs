//! Standard-depth profiles of available water and organic carbon
//!
//! Each map unit gets one value per standard window, written out as
//! columns such as `aws0_150` and `soc0_999`.

use crate::data::SoilHierarchy;
use crate::horizon::integrate::{
    integrate_depth_with_floor, DepthAttribute, DepthWindow, MapUnitDepthTotal,
};
use rustc_hash::FxHashMap;
use tracing::debug;

/// Fixed depth slices and cumulative depths reported for every map unit
pub const STANDARD_WINDOWS: [DepthWindow; 11] = [
    DepthWindow::new(0.0, 5.0),
    DepthWindow::new(5.0, 20.0),
    DepthWindow::new(20.0, 50.0),
    DepthWindow::new(50.0, 100.0),
    DepthWindow::new(100.0, 150.0),
    DepthWindow::new(150.0, 999.0),
    DepthWindow::new(0.0, 25.0),
    DepthWindow::new(0.0, 50.0),
    DepthWindow::new(0.0, 100.0),
    DepthWindow::new(0.0, 150.0),
    DepthWindow::new(0.0, 999.0),
];

/// One map unit's values across a set of windows
#[derive(Debug, Clone, PartialEq)]
pub struct DepthProfile {
    pub mukey: String,
    /// Same order as the windows that produced it; `None` where no
    /// component had data in that window
    pub values: Vec<Option<f64>>,
    /// Contributing thickness per window
    pub thickness: Vec<Option<f64>>,
}

impl DepthProfile {
    pub fn value(&self, index: usize) -> Option<f64> {
        self.values.get(index).copied().flatten()
    }
}

/// Column prefix for a depth attribute (`aws`, `soc`)
pub fn column_prefix(attribute: DepthAttribute) -> &'static str {
    match attribute {
        DepthAttribute::AvailableWater => "aws",
        DepthAttribute::OrganicCarbon => "soc",
    }
}

/// Restriction floor for a profile window
///
/// Available water below the root zone is still reported in the deep
/// windows, so the floor follows the window bottom past 150 cm.
pub fn profile_floor(attribute: DepthAttribute, window: DepthWindow) -> f64 {
    attribute.floor().max(window.to)
}

/// Column names for `windows`, e.g. `aws0_5`, `tk0_5a`
pub fn profile_columns(attribute: DepthAttribute, windows: &[DepthWindow]) -> Vec<(String, String)> {
    let prefix = column_prefix(attribute);
    let thick_suffix = &prefix[..1];
    windows
        .iter()
        .map(|w| {
            (
                format!("{}{}", prefix, w.suffix()),
                format!("tk{}{}", w.suffix(), thick_suffix),
            )
        })
        .collect()
}

/// Integrate `attribute` over every window and collect per map unit
///
/// Map units with no data in any window are absent.
pub fn depth_profile(
    attribute: DepthAttribute,
    windows: &[DepthWindow],
    hierarchy: &SoilHierarchy,
) -> FxHashMap<String, DepthProfile> {
    let per_window: Vec<FxHashMap<String, MapUnitDepthTotal>> = windows
        .iter()
        .map(|w| {
            let totals =
                integrate_depth_with_floor(attribute, *w, profile_floor(attribute, *w), hierarchy);
            debug!("{:?} {}: {} map units with data", attribute, w, totals.len());
            totals
        })
        .collect();

    let mut out: FxHashMap<String, DepthProfile> = FxHashMap::default();
    for mu in hierarchy.map_units() {
        let values: Vec<Option<f64>> = per_window
            .iter()
            .map(|totals| totals.get(&mu.mukey).map(|t| t.total))
            .collect();
        if values.iter().all(Option::is_none) {
            continue;
        }
        let thickness = per_window
            .iter()
            .map(|totals| totals.get(&mu.mukey).map(|t| t.thickness))
            .collect();
        out.insert(
            mu.mukey.clone(),
            DepthProfile {
                mukey: mu.mukey.clone(),
                values,
                thickness,
            },
        );
    }
    out
}
