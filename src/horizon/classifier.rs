//! Horizon organic / dense-layer classification
//!
//! Organic horizons are left out of mineral-soil water and carbon math.
//! Histosols (and histic subgroups) are the exception: their horizons are
//! all treated as mineral so the whole profile counts.

use crate::data::{Component, Horizon};

/// Texture classes and abbreviations that denote organic material
const ORGANIC_TEXTURES: &[&str] = &[
    "CE",
    "COPROGENOUS EARTH",
    "COP-MAT",
    "HPM",
    "HIGHLY DECOMPOSED PLANT MATERIAL",
    "MPM",
    "MODERATELY DECOMPOSED PLANT MATERIAL",
    "SPM",
    "SLIGHTLY DECOMPOSED PLANT MATERIAL",
    "UDOM",
    "UNDECOMPOSED ORGANIC MATERIAL",
    "PDOM",
    "PARTIALLY DECOMPOSED ORGANIC MATERIAL",
    "DOM",
    "DECOMPOSED ORGANIC MATERIAL",
    "MUCK",
    "MPT",
    "MUCKY PEAT",
    "PEAT",
];

/// Master designations of organic horizons
const ORGANIC_MASTERS: &[&str] = &["O", "L"];

fn is_organic_texture(texture: Option<&str>) -> bool {
    texture
        .map(|t| t.trim().to_uppercase())
        .map(|t| ORGANIC_TEXTURES.contains(&t.as_str()))
        .unwrap_or(false)
}

/// Whether a horizon is organic for root-zone purposes
///
/// 1. Histosol order or histic subgroup: never organic
/// 2. O or L master designation: organic
/// 3. Organic texture or in-lieu texture: organic
pub fn is_organic_horizon(horizon: &Horizon, component: &Component) -> bool {
    if component.is_histosol() {
        return false;
    }

    let master_is_organic = horizon
        .desgn_master
        .as_deref()
        .map(|m| ORGANIC_MASTERS.contains(&m.trim().to_uppercase().as_str()))
        .unwrap_or(false);
    if master_is_organic {
        return true;
    }

    is_organic_texture(horizon.texture.as_deref())
        || is_organic_texture(horizon.lieu_texture.as_deref())
}

/// Computed dense-layer test from particle size and bulk density
///
/// Bulk density must be present. One missing fraction is derived as
/// `100 - (other two)`; two or more missing, or fractions that do not sum
/// to exactly 100.0 after rounding to one decimal, is not dense.
pub fn is_dense_layer(
    sand: Option<f64>,
    silt: Option<f64>,
    clay: Option<f64>,
    bulk_density: Option<f64>,
) -> bool {
    let Some(db) = bulk_density else {
        return false;
    };

    let (sand, silt, clay) = match (sand, silt, clay) {
        (Some(sa), Some(si), Some(cl)) => (sa, si, cl),
        (None, Some(si), Some(cl)) => (100.0 - (si + cl), si, cl),
        (Some(sa), None, Some(cl)) => (sa, 100.0 - (sa + cl), cl),
        (Some(sa), Some(si), None) => (sa, si, 100.0 - (sa + si)),
        _ => return false,
    };

    // Strict gate: no tolerance beyond one-decimal rounding
    let total = ((sand + silt + clay) * 10.0).round() / 10.0;
    if total != 100.0 {
        return false;
    }

    let a = db - ((sand * 1.65) / 100.0 + (silt * 1.30) / 100.0 + (clay * 1.25) / 100.0);
    let b = (0.002081 * sand) + (0.003912 * silt) + (0.0024351 * clay);
    a > b
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hz(master: Option<&str>, texture: Option<&str>) -> Horizon {
        Horizon {
            chkey: "h".into(),
            cokey: "c".into(),
            desgn_master: master.map(String::from),
            texture: texture.map(String::from),
            top: 0.0,
            bottom: 10.0,
            ..Default::default()
        }
    }

    fn mineral_component() -> Component {
        Component {
            cokey: "c".into(),
            tax_order: Some("Alfisols".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_master_designation_marks_organic() {
        let comp = mineral_component();
        assert!(is_organic_horizon(&hz(Some("O"), None), &comp));
        assert!(is_organic_horizon(&hz(Some("l"), None), &comp));
        assert!(!is_organic_horizon(&hz(Some("A"), Some("Silt loam")), &comp));
    }

    #[test]
    fn test_organic_texture_vocabulary() {
        let comp = mineral_component();
        assert!(is_organic_horizon(&hz(Some("A"), Some("muck")), &comp));
        assert!(is_organic_horizon(&hz(None, Some("SPM")), &comp));
        let mut h = hz(Some("C"), Some("Loam"));
        h.lieu_texture = Some("Coprogenous earth".into());
        assert!(is_organic_horizon(&h, &comp));
    }

    #[test]
    fn test_histosols_never_organic() {
        let orders = [
            Component {
                tax_order: Some("Histosols".into()),
                ..Default::default()
            },
            Component {
                tax_order: Some("Inceptisols".into()),
                tax_subgroup: Some("Histic Humaquepts".into()),
                ..Default::default()
            },
        ];
        let horizons = [
            hz(Some("O"), Some("Peat")),
            hz(Some("L"), None),
            hz(None, Some("MUCK")),
            hz(Some("A"), Some("Loam")),
        ];
        for comp in &orders {
            for h in &horizons {
                assert!(!is_organic_horizon(h, comp));
            }
        }
    }

    #[test]
    fn test_dense_layer_worked_example() {
        // a = 1.5 - 1.43 = 0.07, b ≈ 0.288: not dense
        assert!(!is_dense_layer(Some(40.0), Some(40.0), Some(20.0), Some(1.5)));
    }

    #[test]
    fn test_dense_layer_high_bulk_density() {
        // a = 2.0 - 1.43 = 0.57 > b
        assert!(is_dense_layer(Some(40.0), Some(40.0), Some(20.0), Some(2.0)));
    }

    #[test]
    fn test_dense_layer_one_missing_fraction_derived() {
        assert_eq!(
            is_dense_layer(None, Some(40.0), Some(20.0), Some(2.0)),
            is_dense_layer(Some(40.0), Some(40.0), Some(20.0), Some(2.0))
        );
        assert_eq!(
            is_dense_layer(Some(40.0), None, Some(20.0), Some(2.0)),
            is_dense_layer(Some(40.0), Some(40.0), Some(20.0), Some(2.0))
        );
        assert!(is_dense_layer(Some(40.0), Some(40.0), None, Some(2.0)));
    }

    #[test]
    fn test_dense_layer_requires_exact_total() {
        // Sums to 99.9: rejected even though the bulk density is extreme
        assert!(!is_dense_layer(Some(40.0), Some(39.9), Some(20.0), Some(2.5)));
        // Rounds to 100.0 at one decimal
        assert!(is_dense_layer(Some(40.0), Some(40.04), Some(20.0), Some(2.5)));
    }

    #[test]
    fn test_dense_layer_missing_inputs() {
        assert!(!is_dense_layer(Some(40.0), Some(40.0), Some(20.0), None));
        assert!(!is_dense_layer(None, None, Some(20.0), Some(2.0)));
    }
}
