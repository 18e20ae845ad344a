//! Engine Integration Tests
//!
//! Runs the full read -> reduce -> aggregate -> write pipeline over a small
//! survey held in a FrameStore. Tables are built with text columns, the way
//! they arrive from a delimited export.

use approx::assert_relative_eq;
use polars::prelude::*;
use soil_rating_rust::config::{ColumnFilter, PresenceCondition};
use soil_rating_rust::horizon::DepthAttribute;
use soil_rating_rust::utils::frame::{f64_column, str_column};
use soil_rating_rust::{
    AggregationMethod, AttributeConfig, AttributeLevel, DataShape, DepthWindow, FrameStore,
    RatingEngine, RatingError, RatingValue, ReadRequest, TabularStore, TieBreak,
};

fn survey() -> FrameStore {
    FrameStore::new()
        .with_table(
            "mapunit",
            df![
                "mukey" => &["m1", "m2", "m3"],
                "musym" => &["SaB", "WdA", "Ro"],
            ]
            .unwrap(),
        )
        .with_table(
            "component",
            df![
                "cokey" => &["c1", "c2", "c3", "c4"],
                "mukey" => &["m1", "m1", "m2", "m3"],
                "comppct_r" => &["60", "40", "100", "100"],
                "compname" => &["Sable", "Wadena", "Wadena", "Rock outcrop"],
                "compkind" => &["Series", "Series", "Series", "Miscellaneous area"],
                "majcompflag" => &["Yes", "Yes", "Yes", "Yes"],
                "taxorder" => &[Some("Mollisols"), Some("Mollisols"), Some("Mollisols"), None],
                "drainagecl" => &[
                    Some("Somewhat poorly drained"),
                    Some("Well drained"),
                    Some("Well drained"),
                    None,
                ],
                "hydricrating" => &[Some("Yes"), Some("No"), Some("No"), None],
            ]
            .unwrap(),
        )
        .with_table(
            "chorizon",
            df![
                "chkey" => &["h1", "h2", "h3", "h4"],
                "cokey" => &["c1", "c1", "c2", "c3"],
                "hzname" => &["Ap", "Bg", "A", "A"],
                "desgnmaster" => &["A", "B", "A", "A"],
                "hzdept_r" => &["0", "20", "0", "0"],
                "hzdepb_r" => &["20", "100", "50", "25"],
                "awc_r" => &["0.2", "0.1", "0.15", "0.3"],
            ]
            .unwrap(),
        )
        .with_table(
            "corestrictions",
            df![
                "cokey" => &["c1"],
                "reskind" => &["Lithic bedrock"],
                "resdept_r" => &["50"],
            ]
            .unwrap(),
        )
        .with_table(
            "cointerp",
            df![
                "cokey" => &["c1", "c2", "c3", "c1"],
                "mrulename" => &["ENG - Dwellings", "ENG - Dwellings", "ENG - Dwellings", "ENG - Septic"],
                "interphrc" => &["Very limited", "Not limited", "Not rated", "Not limited"],
            ]
            .unwrap(),
        )
}

fn drainage() -> AttributeConfig {
    AttributeConfig {
        name: "drainagecl".into(),
        table: "component".into(),
        column: "drainagecl".into(),
        shape: DataShape::Qualitative,
        method: AggregationMethod::DominantCondition,
        domain: vec![
            "Well drained".into(),
            "Moderately well drained".into(),
            "Somewhat poorly drained".into(),
            "Poorly drained".into(),
        ],
        ..Default::default()
    }
}

fn hydric() -> AttributeConfig {
    AttributeConfig {
        name: "hydricrating".into(),
        table: "component".into(),
        column: "hydricrating".into(),
        shape: DataShape::Qualitative,
        method: AggregationMethod::PercentPresent,
        presence: Some(PresenceCondition::Matches(vec!["Yes".into()])),
        ..Default::default()
    }
}

fn text(s: &str) -> Option<RatingValue> {
    Some(RatingValue::from(s))
}

#[test]
fn test_dominant_condition_and_component_agree_on_scenario() {
    let mut engine = RatingEngine::new(survey());

    let (table, summary) = engine.rate_attribute(&drainage()).unwrap();
    assert_eq!(summary.inserted, 3);
    let m1 = table.get("m1").unwrap();
    assert_eq!(m1.percent, Some(60.0));
    assert_eq!(m1.value, text("Somewhat poorly drained"));
    assert_eq!(table.get("m2").unwrap().value, text("Well drained"));
    // Only a null-rated component: emitted, unrated
    let m3 = table.get("m3").unwrap();
    assert_eq!((m3.percent, m3.value.clone()), (None, None));

    let mut dominant = drainage();
    dominant.name = "drainagecl_dcp".into();
    dominant.method = AggregationMethod::DominantComponent;
    let (table, _) = engine.rate_attribute(&dominant).unwrap();
    assert_eq!(table.get("m1").unwrap().value, text("Somewhat poorly drained"));
    assert_eq!(table.get("m1").unwrap().percent, Some(60.0));
}

#[test]
fn test_rating_rows_written_to_store() {
    let mut engine = RatingEngine::new(survey());
    engine.rate_attribute(&drainage()).unwrap();
    // A second run updates rows in place
    let (_, summary) = engine.rate_attribute(&drainage()).unwrap();
    assert_eq!(summary.updated, 3);
    assert_eq!(summary.inserted, 0);

    let store = engine.into_store();
    let df = store
        .read(&ReadRequest::new("drainagecl_rating").order_by("mukey", false))
        .unwrap();
    assert_eq!(df.height(), 3);
    let keys: Vec<Option<String>> = str_column(&df, "out", "mukey").unwrap();
    assert_eq!(keys[0].as_deref(), Some("m1"));
    let pct = f64_column(&df, "out", "comppct_r").unwrap();
    assert_eq!(pct, vec![Some(60.0), Some(100.0), None]);
}

#[test]
fn test_percent_present_covers_every_map_unit() {
    let mut engine = RatingEngine::new(survey());
    let (table, _) = engine.rate_attribute(&hydric()).unwrap();
    assert_eq!(table.len(), 3);
    assert_eq!(table.get("m1").unwrap().percent, Some(60.0));
    assert_eq!(table.get("m2").unwrap().percent, Some(0.0));
    assert_eq!(table.get("m3").unwrap().value, Some(RatingValue::Number(0.0)));
}

#[test]
fn test_horizon_weighted_average() {
    let config = AttributeConfig {
        name: "awc_r".into(),
        table: "chorizon".into(),
        column: "awc_r".into(),
        level: AttributeLevel::Horizon,
        method: AggregationMethod::WeightedAverage,
        depth_window: Some(DepthWindow::new(0.0, 25.0)),
        ..Default::default()
    };
    let mut engine = RatingEngine::new(survey());
    let (table, _) = engine.rate_attribute(&config).unwrap();

    // c1: (0.2 * 20 + 0.1 * 5) / 25 = 0.18, c2: 0.15
    let m1 = table.get("m1").unwrap().value.as_ref().and_then(RatingValue::as_f64).unwrap();
    assert_relative_eq!(m1, 0.6 * 0.18 + 0.4 * 0.15, epsilon = 1e-12);
    let m2 = table.get("m2").unwrap().value.as_ref().and_then(RatingValue::as_f64).unwrap();
    assert_relative_eq!(m2, 0.3, epsilon = 1e-12);
    assert!(table.get("m3").unwrap().value.is_none());
}

#[test]
fn test_interpretation_most_limiting() {
    let config = AttributeConfig {
        name: "dwellings".into(),
        table: "cointerp".into(),
        column: "interphrc".into(),
        shape: DataShape::Qualitative,
        method: AggregationMethod::MinimumOrMaximum,
        tie_break: TieBreak::from_label("Most Limiting").unwrap(),
        domain: vec!["Not limited".into(), "Somewhat limited".into(), "Very limited".into()],
        not_rated: Some("Not rated".into()),
        filters: vec![ColumnFilter {
            column: "mrulename".into(),
            value: "ENG - Dwellings".into(),
        }],
        interpretation: true,
        ..Default::default()
    };
    assert_eq!(config.tie_break_label(), "Most Limiting");

    let mut engine = RatingEngine::new(survey());
    let (table, _) = engine.rate_attribute(&config).unwrap();
    assert_eq!(table.get("m1").unwrap().value, text("Very limited"));
    // Not rated only when nothing else is present
    assert_eq!(table.get("m2").unwrap().value, text("Not rated"));
    assert!(table.get("m3").unwrap().value.is_none());
}

#[test]
fn test_batch_failure_is_isolated() {
    let mut broken = drainage();
    broken.name = "broken".into();
    broken.column = "no_such_column".into();

    let mut engine = RatingEngine::new(survey());
    let report = engine.rate_attributes(&[drainage(), broken, hydric()]);
    assert!(!report.is_success());
    assert_eq!(report.failed_attributes(), vec!["broken"]);
    assert_eq!(report.completed.len(), 2);

    let failure = &report.failed[0];
    let missing = failure
        .error
        .chain()
        .find_map(|e| e.downcast_ref::<RatingError>())
        .unwrap();
    assert!(matches!(missing, RatingError::MissingColumn { .. }));

    let store = engine.into_store();
    assert!(store.has_table("drainagecl_rating"));
    assert!(store.has_table("hydricrating_rating"));
    assert!(!store.has_table("broken_rating"));
}

#[test]
fn test_missing_horizon_table_is_fatal_for_that_attribute() {
    let store = FrameStore::new()
        .with_table("mapunit", df!["mukey" => &["m1"]].unwrap())
        .with_table(
            "component",
            df!["cokey" => &["c1"], "mukey" => &["m1"], "comppct_r" => &["100"]].unwrap(),
        );
    let config = AttributeConfig {
        name: "awc_r".into(),
        table: "chorizon".into(),
        column: "awc_r".into(),
        level: AttributeLevel::Horizon,
        method: AggregationMethod::WeightedAverage,
        depth_window: Some(DepthWindow::new(0.0, 25.0)),
        ..Default::default()
    };
    let mut engine = RatingEngine::new(store);
    let err = engine.rate_attribute(&config).unwrap_err();
    let cause = err.downcast_ref::<RatingError>().unwrap();
    assert!(matches!(cause, RatingError::MissingSourceTable { table } if table == "chorizon"));
}

#[test]
fn test_root_zone_rating() {
    let mut engine = RatingEngine::new(survey());
    let zones = engine.rate_root_zone("rootzone").unwrap();

    // c1 stops at the bedrock: 0.2 * 20 * 10 + 0.1 * 30 * 10 = 70 mm
    // c2: 0.15 * 50 * 10 = 75 mm
    let m1 = &zones["m1"];
    assert_relative_eq!(m1.root_zone_available_water, 0.6 * 70.0 + 0.4 * 75.0, epsilon = 1e-9);
    assert_relative_eq!(m1.root_zone_depth, 50.0, epsilon = 1e-9);
    assert!(m1.droughty);
    assert_relative_eq!(m1.droughty_percent, 100.0);
    // Miscellaneous areas take no part
    assert!(!zones.contains_key("m3"));

    let store = engine.into_store();
    let df = store.read(&ReadRequest::new("rootzone").order_by("mukey", false)).unwrap();
    assert_eq!(df.height(), 2);
    let flags = str_column(&df, "rootzone", "droughty").unwrap();
    assert_eq!(flags, vec![Some("Yes".to_string()), Some("Yes".to_string())]);
}

#[test]
fn test_available_water_profile_written() {
    let mut engine = RatingEngine::new(survey());
    let profiles = engine
        .rate_depth_profile(DepthAttribute::AvailableWater, "aws_profile")
        .unwrap();
    // 0-5 cm: every component has 5 cm of surface horizon
    let m2 = &profiles["m2"];
    assert_relative_eq!(m2.value(0).unwrap(), 0.3 * 5.0 * 10.0, epsilon = 1e-9);

    let store = engine.into_store();
    let df = store.read(&ReadRequest::new("aws_profile")).unwrap();
    assert!(df.column("aws0_150").is_ok());
    assert!(df.column("tk0_150a").is_ok());
}

#[test]
fn test_domain_read_from_store_table() {
    let store = survey().with_table(
        "drainage_domain",
        df![
            "choicesequence" => &["2", "1", "3", "4"],
            "choice" => &[
                "Moderately well drained",
                "Well drained",
                "Somewhat poorly drained",
                "Poorly drained",
            ],
            "choicelabel" => &[Some("MWD"), Some("WD"), None, Some("PD")],
        ]
        .unwrap(),
    );
    let mut config = drainage();
    config.domain.clear();
    config.domain_table = Some("drainage_domain".into());
    config.method = AggregationMethod::MinimumOrMaximum;

    let mut engine = RatingEngine::new(store);
    let catalog = engine.load_catalog(&config).unwrap();
    assert_eq!(catalog.declared_len(), 4);
    let legend: Vec<&str> = catalog.legend().iter().map(|v| v.value.as_str()).collect();
    assert_eq!(
        legend,
        vec!["Well drained", "Moderately well drained", "Somewhat poorly drained", "Poorly drained"]
    );
    assert_eq!(catalog.legend()[0].label.as_deref(), Some("WD"));
    assert_eq!(catalog.legend()[2].label, None);

    // Ranks come from the table, not the inline list
    let (by_table, _) = engine.rate_attribute(&config).unwrap();
    let mut inline = drainage();
    inline.method = AggregationMethod::MinimumOrMaximum;
    inline.name = "drainagecl_inline".into();
    let (by_list, _) = engine.rate_attribute(&inline).unwrap();
    for mukey in ["m1", "m2", "m3"] {
        assert_eq!(by_table.get(mukey).unwrap().value, by_list.get(mukey).unwrap().value);
    }

    config.domain_table = Some("no_such_domain".into());
    assert!(engine.rate_attribute(&config).is_err());
}
