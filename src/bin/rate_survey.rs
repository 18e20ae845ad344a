//! Rate a soil survey export
//!
//! Usage:
//!   rate_survey <table_dir> <attributes.json> [--root-zone] [--profiles] [--out <dir>]
//!
//! Reads pipe-delimited `<table>.txt` exports, rates every attribute in the
//! config file, and writes each output table back as `<table>.txt` in the
//! output directory (default: the table directory).

use anyhow::{bail, Context, Result};
use soil_rating_rust::horizon::DepthAttribute;
use soil_rating_rust::{AttributeConfig, FrameStore, RatingEngine};
use std::path::PathBuf;
use std::time::Instant;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const CORE_TABLES: [&str; 6] = ["mapunit", "component", "chorizon", "corestrictions", "comonth", "chfrags"];

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "soil_rating_rust=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let out_value = args.iter().position(|a| a == "--out").map(|i| i + 1);
    let positional: Vec<&String> = args
        .iter()
        .enumerate()
        .filter(|(i, a)| !a.starts_with("--") && Some(*i) != out_value)
        .map(|(_, a)| a)
        .collect();
    if positional.len() < 2 {
        bail!("usage: rate_survey <table_dir> <attributes.json> [--root-zone] [--profiles] [--out <dir>]");
    }
    let table_dir = PathBuf::from(positional[0]);
    let config_path = PathBuf::from(positional[1]);
    let out_dir = out_value
        .and_then(|i| args.get(i))
        .map(PathBuf::from)
        .unwrap_or_else(|| table_dir.clone());
    let root_zone = args.iter().any(|a| a == "--root-zone");
    let profiles = args.iter().any(|a| a == "--profiles");

    let start = Instant::now();
    let configs = AttributeConfig::load(&config_path)?;

    let mut tables: Vec<&str> = CORE_TABLES.to_vec();
    for config in &configs {
        for table in std::iter::once(&config.table).chain(&config.domain_table) {
            if !tables.contains(&table.as_str()) {
                tables.push(table.as_str());
            }
        }
    }
    let store = FrameStore::load_dir(&table_dir, &tables, b'|')
        .with_context(|| format!("Loading tables from {:?}", table_dir))?;

    let inputs: Vec<String> = store.table_names().into_iter().map(str::to_string).collect();

    let mut engine = RatingEngine::new(store);
    let report = engine.rate_attributes(&configs);
    if root_zone {
        engine.rate_root_zone("rootzone")?;
    }
    if profiles {
        engine.rate_depth_profile(DepthAttribute::AvailableWater, "aws_profile")?;
        engine.rate_depth_profile(DepthAttribute::OrganicCarbon, "soc_profile")?;
    }

    // Every table the run created
    let store = engine.into_store();
    for table in store.table_names() {
        if inputs.iter().any(|t| t == table) {
            continue;
        }
        store.save_table(table, &out_dir.join(format!("{}.txt", table)), b'|')?;
    }

    for failure in &report.failed {
        eprintln!("FAILED {}: {:#}", failure.attribute, failure.error);
    }
    println!(
        "Rated {} of {} attributes in {:.2?}",
        report.completed.len(),
        configs.len(),
        start.elapsed()
    );
    if !report.is_success() {
        bail!("{} attribute(s) failed", report.failed.len());
    }
    Ok(())
}
