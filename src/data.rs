//! Survey hierarchy loading
//!
//! Materializes the map unit → component → horizon hierarchy (plus the
//! restriction and component-month side tables) for one rating run.
//! Everything is keyed by map-unit key and component key so the aggregation
//! code works on plain in-memory records.

use crate::error::RatingError;
use crate::store::{ReadRequest, TabularStore};
use crate::utils::frame::{f64_column, optional_f64_column, optional_str_column, str_column};
use anyhow::{Context, Result};
use rustc_hash::FxHashMap;
use tracing::{info, warn};

pub const MAPUNIT_TABLE: &str = "mapunit";
pub const COMPONENT_TABLE: &str = "component";
pub const HORIZON_TABLE: &str = "chorizon";
pub const RESTRICTION_TABLE: &str = "corestrictions";
pub const MONTH_TABLE: &str = "comonth";
pub const FRAGMENT_TABLE: &str = "chfrags";

/// Top-level polygon classification unit
#[derive(Debug, Clone, PartialEq)]
pub struct MapUnit {
    pub mukey: String,
    pub symbol: Option<String>,
    pub name: Option<String>,
    pub area_symbol: Option<String>,
}

/// A soil or miscellaneous area occupying part of a map unit
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Component {
    pub cokey: String,
    pub mukey: String,
    /// Percent of the map unit (0-100)
    pub percent: Option<f64>,
    pub name: Option<String>,
    pub kind: Option<String>,
    pub major: bool,
    pub tax_order: Option<String>,
    pub tax_subgroup: Option<String>,
    pub local_phase: Option<String>,
    pub other_phase: Option<String>,
}

impl Component {
    /// Histosols and histic subgroups are treated as mineral for root-zone work
    pub fn is_histosol(&self) -> bool {
        let order = self
            .tax_order
            .as_deref()
            .map(|o| o.trim().eq_ignore_ascii_case("histosols"))
            .unwrap_or(false);
        let subgroup = self
            .tax_subgroup
            .as_deref()
            .map(|s| s.to_lowercase().contains("histic"))
            .unwrap_or(false);
        order || subgroup
    }

    pub fn is_miscellaneous_area(&self) -> bool {
        self.kind
            .as_deref()
            .map(|k| k.trim().eq_ignore_ascii_case("miscellaneous area"))
            .unwrap_or(false)
    }

    pub fn percent_or_zero(&self) -> f64 {
        self.percent.unwrap_or(0.0)
    }
}

/// Depth-bounded layer of a component (depths in cm)
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Horizon {
    pub chkey: String,
    pub cokey: String,
    pub name: Option<String>,
    pub desgn_master: Option<String>,
    pub top: f64,
    pub bottom: f64,
    pub texture: Option<String>,
    pub lieu_texture: Option<String>,
    /// Available water capacity, cm/cm
    pub awc: Option<f64>,
    /// Bulk density at 1/3 bar, g/cm3
    pub bulk_density: Option<f64>,
    pub ph: Option<f64>,
    /// Electrical conductivity, dS/m
    pub ec: Option<f64>,
    pub organic_matter: Option<f64>,
    pub sand: Option<f64>,
    pub silt: Option<f64>,
    pub clay: Option<f64>,
    pub frag_volume: Option<f64>,
}

impl Horizon {
    pub fn thickness(&self) -> f64 {
        self.bottom - self.top
    }
}

/// Month record of a component (sequence 1-12)
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentMonth {
    pub comonthkey: String,
    pub cokey: String,
    pub month_seq: u8,
    pub month: Option<String>,
}

/// Root-restricting feature types
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RestrictionKind {
    LithicBedrock,
    ParalithicBedrock,
    DensicBedrock,
    DensicMaterial,
    Fragipan,
    Duripan,
    Sulfuric,
    Petrocalcic,
    Petrogypsic,
    Petroferric,
    Placic,
    Ortstein,
    CementedHorizon,
    ManufacturedLayer,
    Other(String),
}

impl RestrictionKind {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "lithic bedrock" => RestrictionKind::LithicBedrock,
            "paralithic bedrock" => RestrictionKind::ParalithicBedrock,
            "densic bedrock" => RestrictionKind::DensicBedrock,
            "densic material" => RestrictionKind::DensicMaterial,
            "fragipan" => RestrictionKind::Fragipan,
            "duripan" => RestrictionKind::Duripan,
            "sulfuric" => RestrictionKind::Sulfuric,
            "petrocalcic" => RestrictionKind::Petrocalcic,
            "petrogypsic" => RestrictionKind::Petrogypsic,
            "petroferric" => RestrictionKind::Petroferric,
            "placic" => RestrictionKind::Placic,
            "ortstein" => RestrictionKind::Ortstein,
            "cemented horizon" => RestrictionKind::CementedHorizon,
            "manufactured layer" => RestrictionKind::ManufacturedLayer,
            _ => RestrictionKind::Other(raw.trim().to_string()),
        }
    }

    /// Kinds that stop root growth; every named kind does, `Other` does not
    pub fn restricts_roots(&self) -> bool {
        !matches!(self, RestrictionKind::Other(_))
    }

    pub fn label(&self) -> &str {
        match self {
            RestrictionKind::LithicBedrock => "Lithic bedrock",
            RestrictionKind::ParalithicBedrock => "Paralithic bedrock",
            RestrictionKind::DensicBedrock => "Densic bedrock",
            RestrictionKind::DensicMaterial => "Densic material",
            RestrictionKind::Fragipan => "Fragipan",
            RestrictionKind::Duripan => "Duripan",
            RestrictionKind::Sulfuric => "Sulfuric",
            RestrictionKind::Petrocalcic => "Petrocalcic",
            RestrictionKind::Petrogypsic => "Petrogypsic",
            RestrictionKind::Petroferric => "Petroferric",
            RestrictionKind::Placic => "Placic",
            RestrictionKind::Ortstein => "Ortstein",
            RestrictionKind::CementedHorizon => "Cemented horizon",
            RestrictionKind::ManufacturedLayer => "Manufactured layer",
            RestrictionKind::Other(s) => s.as_str(),
        }
    }
}

/// Declared restrictive feature of a component
#[derive(Debug, Clone, PartialEq)]
pub struct Restriction {
    pub cokey: String,
    pub kind: RestrictionKind,
    pub top: Option<f64>,
}

/// Which optional levels a run needs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HierarchyNeeds {
    pub horizons: bool,
    pub restrictions: bool,
    pub months: bool,
}

impl HierarchyNeeds {
    pub fn components_only() -> Self {
        Self::default()
    }

    pub fn depth_integration() -> Self {
        HierarchyNeeds {
            horizons: true,
            restrictions: true,
            months: false,
        }
    }
}

/// Snapshot of the survey hierarchy for one run
#[derive(Debug, Clone, Default)]
pub struct SoilHierarchy {
    map_units: Vec<MapUnit>,
    components: FxHashMap<String, Vec<Component>>,
    horizons: FxHashMap<String, Vec<Horizon>>,
    restrictions: FxHashMap<String, Vec<Restriction>>,
    months: FxHashMap<String, Vec<ComponentMonth>>,
}

impl SoilHierarchy {
    /// Build from records already in memory
    ///
    /// Components are ordered by percent descending within each map unit,
    /// horizons by top depth ascending within each component. Horizons whose
    /// top is not above their bottom are dropped.
    pub fn from_parts(
        mut map_units: Vec<MapUnit>,
        components: Vec<Component>,
        horizons: Vec<Horizon>,
        restrictions: Vec<Restriction>,
        months: Vec<ComponentMonth>,
    ) -> Self {
        map_units.sort_by(|a, b| a.mukey.cmp(&b.mukey));
        map_units.dedup_by(|a, b| a.mukey == b.mukey);

        let mut by_mukey: FxHashMap<String, Vec<Component>> = FxHashMap::default();
        for comp in components {
            by_mukey.entry(comp.mukey.clone()).or_default().push(comp);
        }
        for comps in by_mukey.values_mut() {
            comps.sort_by(|a, b| {
                b.percent
                    .unwrap_or(f64::NEG_INFINITY)
                    .total_cmp(&a.percent.unwrap_or(f64::NEG_INFINITY))
                    .then_with(|| a.cokey.cmp(&b.cokey))
            });
        }

        let mut by_cokey: FxHashMap<String, Vec<Horizon>> = FxHashMap::default();
        let mut dropped = 0usize;
        for hz in horizons {
            if !(hz.top < hz.bottom) {
                dropped += 1;
                continue;
            }
            by_cokey.entry(hz.cokey.clone()).or_default().push(hz);
        }
        if dropped > 0 {
            warn!("Dropped {} horizons with top depth not above bottom depth", dropped);
        }
        for hzs in by_cokey.values_mut() {
            hzs.sort_by(|a, b| a.top.total_cmp(&b.top).then_with(|| a.chkey.cmp(&b.chkey)));
        }

        let mut res_by_cokey: FxHashMap<String, Vec<Restriction>> = FxHashMap::default();
        for res in restrictions {
            res_by_cokey.entry(res.cokey.clone()).or_default().push(res);
        }
        for res in res_by_cokey.values_mut() {
            res.sort_by(|a, b| {
                a.top
                    .unwrap_or(f64::INFINITY)
                    .total_cmp(&b.top.unwrap_or(f64::INFINITY))
            });
        }

        let mut months_by_cokey: FxHashMap<String, Vec<ComponentMonth>> = FxHashMap::default();
        for m in months {
            months_by_cokey.entry(m.cokey.clone()).or_default().push(m);
        }
        for ms in months_by_cokey.values_mut() {
            ms.sort_by_key(|m| m.month_seq);
        }

        SoilHierarchy {
            map_units,
            components: by_mukey,
            horizons: by_cokey,
            restrictions: res_by_cokey,
            months: months_by_cokey,
        }
    }

    /// Read the hierarchy through a store
    pub fn load<S: TabularStore + ?Sized>(store: &S, needs: HierarchyNeeds) -> Result<Self> {
        let map_units = load_map_units(store)?;
        let components = load_components(store)?;

        let horizons = if needs.horizons {
            load_horizons(store)?
        } else {
            Vec::new()
        };

        let restrictions = if needs.restrictions && store.has_table(RESTRICTION_TABLE) {
            load_restrictions(store)?
        } else {
            Vec::new()
        };

        let months = if needs.months {
            load_months(store)?
        } else {
            Vec::new()
        };

        info!(
            "Loaded hierarchy: {} map units, {} components, {} horizons, {} restrictions, {} component months",
            map_units.len(),
            components.len(),
            horizons.len(),
            restrictions.len(),
            months.len()
        );

        Ok(Self::from_parts(map_units, components, horizons, restrictions, months))
    }

    pub fn map_units(&self) -> &[MapUnit] {
        &self.map_units
    }

    /// Components of a map unit, highest percent first
    pub fn components(&self, mukey: &str) -> &[Component] {
        self.components.get(mukey).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Horizons of a component, shallowest first
    pub fn horizons(&self, cokey: &str) -> &[Horizon] {
        self.horizons.get(cokey).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn restrictions(&self, cokey: &str) -> &[Restriction] {
        self.restrictions.get(cokey).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn months(&self, cokey: &str) -> &[ComponentMonth] {
        self.months.get(cokey).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn all_components(&self) -> impl Iterator<Item = &Component> {
        self.map_units
            .iter()
            .flat_map(move |mu| self.components(&mu.mukey).iter())
    }

    pub fn component_count(&self) -> usize {
        self.components.values().map(Vec::len).sum()
    }

    pub fn horizon_count(&self) -> usize {
        self.horizons.values().map(Vec::len).sum()
    }

    /// True when at least one component anywhere carries a percent
    pub fn has_percent_data(&self) -> bool {
        self.all_components().any(|c| c.percent.is_some())
    }
}

fn read_required<S: TabularStore + ?Sized>(
    store: &S,
    request: ReadRequest,
) -> Result<polars::prelude::DataFrame> {
    let table = request.table.clone();
    if !store.has_table(&table) {
        return Err(RatingError::MissingSourceTable { table }.into());
    }
    let df = store.read(&request)?;
    if df.height() == 0 {
        return Err(RatingError::MissingSourceTable { table }.into());
    }
    Ok(df)
}

fn load_map_units<S: TabularStore + ?Sized>(store: &S) -> Result<Vec<MapUnit>> {
    let df = read_required(store, ReadRequest::new(MAPUNIT_TABLE).order_by("mukey", false))?;
    let t = MAPUNIT_TABLE;
    let keys = str_column(&df, t, "mukey")?;
    let symbols = optional_str_column(&df, t, "musym")?;
    let names = optional_str_column(&df, t, "muname")?;
    let areas = optional_str_column(&df, t, "areasymbol")?;

    Ok(keys
        .into_iter()
        .zip(symbols)
        .zip(names)
        .zip(areas)
        .filter_map(|(((mukey, symbol), name), area_symbol)| {
            mukey.map(|mukey| MapUnit {
                mukey,
                symbol,
                name,
                area_symbol,
            })
        })
        .collect())
}

fn load_components<S: TabularStore + ?Sized>(store: &S) -> Result<Vec<Component>> {
    let df = read_required(
        store,
        ReadRequest::new(COMPONENT_TABLE)
            .order_by("mukey", false)
            .order_by("comppct_r", true),
    )?;
    let t = COMPONENT_TABLE;
    let cokeys = str_column(&df, t, "cokey")?;
    let mukeys = str_column(&df, t, "mukey")?;
    let percents = f64_column(&df, t, "comppct_r")?;
    let names = optional_str_column(&df, t, "compname")?;
    let kinds = optional_str_column(&df, t, "compkind")?;
    let majors = optional_str_column(&df, t, "majcompflag")?;
    let orders = optional_str_column(&df, t, "taxorder")?;
    let subgroups = optional_str_column(&df, t, "taxsubgrp")?;
    let local = optional_str_column(&df, t, "localphase")?;
    let other = optional_str_column(&df, t, "otherph")?;

    let mut out = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let (Some(cokey), Some(mukey)) = (cokeys[i].clone(), mukeys[i].clone()) else {
            continue;
        };
        out.push(Component {
            cokey,
            mukey,
            percent: percents[i],
            name: names[i].clone(),
            kind: kinds[i].clone(),
            major: majors[i]
                .as_deref()
                .map(|m| m.eq_ignore_ascii_case("yes") || m == "1")
                .unwrap_or(false),
            tax_order: orders[i].clone(),
            tax_subgroup: subgroups[i].clone(),
            local_phase: local[i].clone(),
            other_phase: other[i].clone(),
        });
    }
    Ok(out)
}

fn load_fragment_volumes<S: TabularStore + ?Sized>(store: &S) -> Result<FxHashMap<String, f64>> {
    let df = store.read(&ReadRequest::new(FRAGMENT_TABLE).fields(&["chkey", "fragvol_r"]))?;
    let keys = str_column(&df, FRAGMENT_TABLE, "chkey")?;
    let vols = f64_column(&df, FRAGMENT_TABLE, "fragvol_r")?;

    Ok(keys
        .into_iter()
        .zip(vols)
        .filter_map(|(k, v)| k.map(|k| (k, v.unwrap_or(0.0))))
        .fold(FxHashMap::default(), |mut acc, (k, v)| {
            *acc.entry(k).or_insert(0.0) += v;
            acc
        }))
}

fn load_horizons<S: TabularStore + ?Sized>(store: &S) -> Result<Vec<Horizon>> {
    let df = read_required(
        store,
        ReadRequest::new(HORIZON_TABLE)
            .order_by("cokey", false)
            .order_by("hzdept_r", false),
    )?;
    let t = HORIZON_TABLE;
    let chkeys = str_column(&df, t, "chkey")?;
    let cokeys = str_column(&df, t, "cokey")?;
    let tops = f64_column(&df, t, "hzdept_r")?;
    let bottoms = f64_column(&df, t, "hzdepb_r")?;
    let names = optional_str_column(&df, t, "hzname")?;
    let masters = optional_str_column(&df, t, "desgnmaster")?;
    let textures = optional_str_column(&df, t, "texcl")?;
    let lieu = optional_str_column(&df, t, "lieutex")?;
    let awc = optional_f64_column(&df, t, "awc_r")?;
    let db = optional_f64_column(&df, t, "dbthirdbar_r")?;
    let ph = optional_f64_column(&df, t, "ph1to1h2o_r")?;
    let ec = optional_f64_column(&df, t, "ec_r")?;
    let om = optional_f64_column(&df, t, "om_r")?;
    let sand = optional_f64_column(&df, t, "sandtotal_r")?;
    let silt = optional_f64_column(&df, t, "silttotal_r")?;
    let clay = optional_f64_column(&df, t, "claytotal_r")?;
    let frag = optional_f64_column(&df, t, "fragvol_r")?;

    let fragments = if store.has_table(FRAGMENT_TABLE) {
        load_fragment_volumes(store).context("Failed to sum horizon fragment volumes")?
    } else {
        FxHashMap::default()
    };

    let mut out = Vec::with_capacity(df.height());
    let mut missing_depth = 0usize;
    for i in 0..df.height() {
        let (Some(chkey), Some(cokey)) = (chkeys[i].clone(), cokeys[i].clone()) else {
            continue;
        };
        let (Some(top), Some(bottom)) = (tops[i], bottoms[i]) else {
            missing_depth += 1;
            continue;
        };
        let frag_volume = fragments.get(&chkey).copied().or(frag[i]);
        out.push(Horizon {
            chkey,
            cokey,
            name: names[i].clone(),
            desgn_master: masters[i].clone(),
            top,
            bottom,
            texture: textures[i].clone(),
            lieu_texture: lieu[i].clone(),
            awc: awc[i],
            bulk_density: db[i],
            ph: ph[i],
            ec: ec[i],
            organic_matter: om[i],
            sand: sand[i],
            silt: silt[i],
            clay: clay[i],
            frag_volume,
        });
    }
    if missing_depth > 0 {
        warn!("Dropped {} horizons with missing depths", missing_depth);
    }
    Ok(out)
}

fn load_restrictions<S: TabularStore + ?Sized>(store: &S) -> Result<Vec<Restriction>> {
    let df = store.read(
        &ReadRequest::new(RESTRICTION_TABLE)
            .order_by("cokey", false)
            .order_by("resdept_r", false),
    )?;
    let t = RESTRICTION_TABLE;
    let cokeys = str_column(&df, t, "cokey")?;
    let kinds = str_column(&df, t, "reskind")?;
    let tops = f64_column(&df, t, "resdept_r")?;

    Ok(cokeys
        .into_iter()
        .zip(kinds)
        .zip(tops)
        .filter_map(|((cokey, kind), top)| {
            Some(Restriction {
                cokey: cokey?,
                kind: RestrictionKind::parse(&kind?),
                top,
            })
        })
        .collect())
}

fn load_months<S: TabularStore + ?Sized>(store: &S) -> Result<Vec<ComponentMonth>> {
    let df = read_required(
        store,
        ReadRequest::new(MONTH_TABLE)
            .order_by("cokey", false)
            .order_by("monthseq", false),
    )?;
    let t = MONTH_TABLE;
    let keys = str_column(&df, t, "comonthkey")?;
    let cokeys = str_column(&df, t, "cokey")?;
    let seqs = f64_column(&df, t, "monthseq")?;
    let names = optional_str_column(&df, t, "month")?;

    Ok(keys
        .into_iter()
        .zip(cokeys)
        .zip(seqs)
        .zip(names)
        .filter_map(|(((key, cokey), seq), month)| {
            let seq = seq?;
            if !(1.0..=12.0).contains(&seq) {
                return None;
            }
            Some(ComponentMonth {
                comonthkey: key?,
                cokey: cokey?,
                month_seq: seq as u8,
                month,
            })
        })
        .collect())
}
