//! Rating engine
//!
//! Ties the pieces together for one store: load the hierarchy snapshot,
//! read an attribute's values, aggregate, and write the rating table.
//! Everything between the read and the write is in memory and owned by the
//! run.

use crate::aggregation::{aggregate, plan_for, AggregateOptions, AttributeValues};
use crate::config::{AttributeConfig, AttributeLevel, DataShape};
use crate::data::{HierarchyNeeds, SoilHierarchy};
use crate::domain::DomainCatalog;
use crate::horizon::integrate::DepthAttribute;
use crate::horizon::profile::{depth_profile, DepthProfile, STANDARD_WINDOWS};
use crate::horizon::root_zone::{root_zone, MapUnitRootZone, RootZoneConfig};
use crate::output::{write_profile, write_root_zone, RatingTable, WriteSummary};
use crate::store::{Predicate, ReadRequest, TabularStore};
use crate::utils::frame::{cell_column, has_column, str_column};
use crate::utils::value::RatingValue;
use anyhow::{Context, Result};
use rustc_hash::FxHashMap;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Domain table columns
const DOMAIN_SEQUENCE: &str = "choicesequence";
const DOMAIN_VALUE: &str = "choice";
const DOMAIN_LABEL: &str = "choicelabel";

/// Outcome of a batch of attributes
#[derive(Debug, Default)]
pub struct BatchReport {
    pub completed: Vec<(String, WriteSummary)>,
    pub failed: Vec<BatchFailure>,
}

#[derive(Debug)]
pub struct BatchFailure {
    pub attribute: String,
    pub error: anyhow::Error,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn failed_attributes(&self) -> Vec<&str> {
        self.failed.iter().map(|f| f.attribute.as_str()).collect()
    }
}

/// Hierarchy levels an attribute needs loaded
pub fn needs_for(config: &AttributeConfig) -> HierarchyNeeds {
    HierarchyNeeds {
        horizons: config.level == AttributeLevel::Horizon,
        restrictions: false,
        months: config.level == AttributeLevel::Month,
    }
}

fn union(a: HierarchyNeeds, b: HierarchyNeeds) -> HierarchyNeeds {
    HierarchyNeeds {
        horizons: a.horizons || b.horizons,
        restrictions: a.restrictions || b.restrictions,
        months: a.months || b.months,
    }
}

pub struct RatingEngine<S: TabularStore> {
    store: S,
    root_zone: RootZoneConfig,
}

impl<S: TabularStore> RatingEngine<S> {
    pub fn new(store: S) -> Self {
        RatingEngine {
            store,
            root_zone: RootZoneConfig::default(),
        }
    }

    pub fn with_root_zone(mut self, config: RootZoneConfig) -> Self {
        self.root_zone = config;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    pub fn load_hierarchy(&self, needs: HierarchyNeeds) -> Result<SoilHierarchy> {
        let start = Instant::now();
        let hierarchy = SoilHierarchy::load(&self.store, needs)?;
        info!(
            "Loaded {} map units, {} components, {} horizons in {:.2?}",
            hierarchy.map_units().len(),
            hierarchy.component_count(),
            hierarchy.horizon_count(),
            start.elapsed()
        );
        Ok(hierarchy)
    }

    /// Read an attribute's values keyed by its level's record key
    pub fn read_values(&self, config: &AttributeConfig) -> Result<AttributeValues> {
        let key = config.level.key_column();
        let mut request = ReadRequest::new(&config.table)
            .fields(&[key, config.column.as_str()])
            .order_by(key, false);
        for filter in &config.filters {
            request = request.filter(Predicate::eq(
                &filter.column,
                RatingValue::Text(filter.value.clone()),
            ));
        }

        let df = self.store.read(&request)?;
        let keys = str_column(&df, &config.table, key)?;
        let cells = cell_column(
            &df,
            &config.table,
            &config.column,
            config.shape == DataShape::Numeric,
        )?;

        Ok(AttributeValues::from_pairs(
            keys.into_iter()
                .zip(cells)
                .filter_map(|(key, cell)| key.map(|k| (k, cell))),
        ))
    }

    /// Rate one attribute against an already loaded hierarchy
    pub fn rate(&self, config: &AttributeConfig, hierarchy: &SoilHierarchy) -> Result<RatingTable> {
        config.validate()?;
        let plan = plan_for(config)?;
        let values = self.read_values(config)?;
        let mut catalog = self.load_catalog(config)?;

        let mut table = aggregate(
            &config.name,
            &plan,
            &values,
            hierarchy,
            &AggregateOptions::from(config),
            &mut catalog,
        )?;
        table.sort();

        if catalog.has_declared_values() {
            let appended: Vec<&str> = catalog.legend()[catalog.declared_len()..]
                .iter()
                .map(|v| v.value.as_str())
                .collect();
            if !appended.is_empty() {
                warn!(
                    "'{}': {} value(s) outside the declared domain ranked last: {:?}",
                    config.name,
                    appended.len(),
                    appended
                );
            }
        }
        Ok(table)
    }

    /// Domain catalog from the inline list or from a `domain_table` in the store
    pub fn load_catalog(&self, config: &AttributeConfig) -> Result<DomainCatalog> {
        let Some(domain_table) = config.domain_table.as_deref() else {
            return Ok(DomainCatalog::new(
                &config.name,
                config.domain.as_slice(),
                config.not_rated.as_deref(),
            ));
        };
        let df = self
            .store
            .read(&ReadRequest::new(domain_table))
            .with_context(|| format!("Reading domain table '{}'", domain_table))?;
        let label = has_column(&df, DOMAIN_LABEL).then_some(DOMAIN_LABEL);
        let catalog = DomainCatalog::from_frame(
            &config.name,
            &df,
            DOMAIN_SEQUENCE,
            DOMAIN_VALUE,
            label,
            config.not_rated.as_deref(),
        )?;
        debug!(
            "'{}': {} domain values from '{}'",
            config.name,
            catalog.declared_len(),
            domain_table
        );
        Ok(catalog)
    }

    /// Load, rate, and write one attribute
    pub fn rate_attribute(&mut self, config: &AttributeConfig) -> Result<(RatingTable, WriteSummary)> {
        let hierarchy = self.load_hierarchy(needs_for(config))?;
        self.rate_and_write(config, &hierarchy)
    }

    fn rate_and_write(
        &mut self,
        config: &AttributeConfig,
        hierarchy: &SoilHierarchy,
    ) -> Result<(RatingTable, WriteSummary)> {
        let start = Instant::now();
        let table = self
            .rate(config, hierarchy)
            .with_context(|| format!("Rating attribute '{}'", config.name))?;
        let output = config.output_table();
        let summary = table
            .write_to(&mut self.store, &output)
            .with_context(|| format!("Writing attribute '{}'", config.name))?;
        info!(
            "Rated '{}' ({} tie-break): {} map units, {} rated, written to '{}' in {:.2?}",
            config.name,
            config.tie_break_label(),
            table.len(),
            table.rated_count(),
            output,
            start.elapsed()
        );
        Ok((table, summary))
    }

    /// Rate several attributes over one hierarchy snapshot
    ///
    /// A failure stops only the attribute it happened in; output already
    /// written for other attributes stays.
    pub fn rate_attributes(&mut self, configs: &[AttributeConfig]) -> BatchReport {
        let mut report = BatchReport::default();
        let needs = configs
            .iter()
            .map(needs_for)
            .fold(HierarchyNeeds::components_only(), union);

        let hierarchy = match self.load_hierarchy(needs) {
            Ok(h) => h,
            Err(e) => {
                error!("Hierarchy load failed; no attributes rated: {:#}", e);
                let message = format!("{:#}", e);
                report.failed = configs
                    .iter()
                    .map(|c| BatchFailure {
                        attribute: c.name.clone(),
                        error: anyhow::anyhow!("{}", message),
                    })
                    .collect();
                return report;
            }
        };

        for config in configs {
            match self.rate_and_write(config, &hierarchy) {
                Ok((_, summary)) => report.completed.push((config.name.clone(), summary)),
                Err(e) => {
                    error!("Attribute '{}' failed: {:#}", config.name, e);
                    report.failed.push(BatchFailure {
                        attribute: config.name.clone(),
                        error: e,
                    });
                }
            }
        }

        info!(
            "Batch finished: {} rated, {} failed",
            report.completed.len(),
            report.failed.len()
        );
        report
    }

    /// Root-zone depth, available water, and droughtiness per map unit
    pub fn rate_root_zone(&mut self, table: &str) -> Result<FxHashMap<String, MapUnitRootZone>> {
        let hierarchy = self.load_hierarchy(HierarchyNeeds::depth_integration())?;
        let zones = root_zone(&hierarchy, &self.root_zone);
        let summary = write_root_zone(&mut self.store, table, &zones)?;
        info!(
            "Root zone: {} map units written to '{}' ({} inserted, {} updated)",
            zones.len(),
            table,
            summary.inserted,
            summary.updated
        );
        Ok(zones)
    }

    /// Available water or organic carbon over the standard depth windows
    pub fn rate_depth_profile(
        &mut self,
        attribute: DepthAttribute,
        table: &str,
    ) -> Result<FxHashMap<String, DepthProfile>> {
        let hierarchy = self.load_hierarchy(HierarchyNeeds::depth_integration())?;
        let profiles = depth_profile(attribute, &STANDARD_WINDOWS, &hierarchy);
        write_profile(&mut self.store, table, attribute, &STANDARD_WINDOWS, &profiles)?;
        info!(
            "{:?} profile: {} map units written to '{}'",
            attribute,
            profiles.len(),
            table
        );
        Ok(profiles)
    }
}
