use std::collections::BTreeMap;

use food_access_rater::analyzers::AnalysisError;
use food_access_rater::analyzers::access::{
    assess_all, classify_all, rank_deserts, rank_highest_need,
};
use food_access_rater::analyzers::seasonality::{
    extract_seasonal_profile, extract_weighted_profile,
};
use food_access_rater::analyzers::trends::{
    Indicator, TrendDirection, anomaly_window, cost_of_hunger, detect_spikes, household_trend,
    indicator_series, lagged_correlation, purchasing_power, recession_lag, strongest_lag,
};
use food_access_rater::analyzers::types::{AccessCategory, MonthlyParticipation, YearMonth};
use food_access_rater::config::{AnalysisConfig, ClassifierConfig};
use food_access_rater::parser::{
    AreaFilter, STATEWIDE, parse_annual_participation, parse_county_indicators,
    parse_food_environment, parse_monthly_participation,
};
use food_access_rater::stats::AccessSummary;

const MRFEI: &str = include_str!("fixtures/mrfei_sample.csv");
const MRFEI_INVALID: &str = include_str!("fixtures/mrfei_invalid.csv");
const SNAP_MONTHLY: &str = include_str!("fixtures/snap_monthly.csv");
const SNAP_ANNUAL: &str = include_str!("fixtures/snap_annual.csv");
const COUNTY_INDICATORS: &str = include_str!("fixtures/county_indicators.csv");

fn monthly_series() -> Vec<MonthlyParticipation> {
    parse_monthly_participation(SNAP_MONTHLY)
        .expect("Failed to parse monthly fixture")
        .iter()
        .map(|r| r.participation())
        .collect()
}

#[test]
fn test_access_pipeline() {
    let areas = parse_food_environment(MRFEI.as_bytes(), &AreaFilter::default())
        .expect("Failed to parse food environment fixture");
    assert_eq!(areas.len(), 7);

    let config = ClassifierConfig::default();
    let classifications = classify_all(&areas, &config).unwrap();
    assert_eq!(classifications.len(), areas.len());

    let assessments = assess_all(&areas, &config).unwrap();
    let summary = AccessSummary::from_assessments(&assessments);
    assert_eq!(summary.deserts, 2);
    assert_eq!(summary.swamps, 2);
    assert_eq!(summary.healthy, 3);
    assert_eq!(summary.scarce, 0);

    let deserts = rank_deserts(&areas, &config, |a| a.area_id.clone()).unwrap();
    let ids: Vec<&str> = deserts.iter().map(|a| a.area_id.as_str()).collect();
    assert_eq!(ids, vec!["6013303102", "6013355112"]);

    let need = rank_highest_need(&areas, 3);
    let ids: Vec<&str> = need.iter().map(|a| a.area_id.as_str()).collect();
    assert_eq!(ids, vec!["6013303102", "6013339002", "6013313101"]);
}

#[test]
fn test_access_pipeline_with_scarce_config() {
    let config = AnalysisConfig::from_json(r#"{ "classifier": { "scarce_retailer_threshold": 3 } }"#)
        .unwrap();
    let areas = parse_food_environment(MRFEI.as_bytes(), &AreaFilter::default()).unwrap();
    let assessments = assess_all(&areas, &config.classifier).unwrap();

    let scarce: Vec<&str> = assessments
        .iter()
        .filter(|a| a.category == AccessCategory::Scarce)
        .map(|a| a.area_id.as_str())
        .collect();
    assert_eq!(scarce, vec!["6013320001"]);
}

#[test]
fn test_invalid_area_records_are_reported() {
    let areas = parse_food_environment(MRFEI_INVALID.as_bytes(), &AreaFilter::default()).unwrap();
    assert_eq!(areas.len(), 3);

    let err = classify_all(&areas, &ClassifierConfig::default()).unwrap_err();
    match err {
        AnalysisError::InvalidAreaRecord { area_id, .. } => assert_eq!(area_id, "6013339002"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_seasonality_pipeline_finds_october() {
    let series = monthly_series();
    assert_eq!(series.len(), 48);

    let profile = extract_seasonal_profile(&series).unwrap();
    assert_eq!(profile.peak_month_name(), "October");
    assert!(profile.gaps.is_empty());
    assert_eq!(profile.month(10).unwrap().observations, 3);

    let weights: BTreeMap<i32, f64> = (2019..=2023).map(|y| (y, 1.0)).collect();
    let weighted = extract_weighted_profile(&series, &weights).unwrap();
    assert_eq!(weighted.peak_month, profile.peak_month);
}

#[test]
fn test_spikes_and_household_trend() {
    let spikes = detect_spikes(&monthly_series(), 2.0).unwrap();
    assert_eq!(spikes.len(), 3);
    assert!(spikes.iter().all(|s| s.month == 10));

    let records = parse_monthly_participation(SNAP_MONTHLY).unwrap();
    let trend = household_trend(&records).unwrap();
    assert_eq!(trend.direction, TrendDirection::Decreasing);
    assert_eq!(trend.points.len(), 48);
}

#[test]
fn test_single_month_is_insufficient() {
    let series = vec![monthly_series()[0]];
    assert_eq!(
        extract_seasonal_profile(&series).unwrap_err(),
        AnalysisError::InsufficientData {
            months: (1..=12).collect()
        }
    );
}

#[test]
fn test_cost_of_hunger_pipeline() {
    let records = parse_monthly_participation(SNAP_MONTHLY).unwrap();
    let trend = cost_of_hunger(&records).unwrap();

    assert_eq!(trend.points.len(), 48);
    assert_eq!(trend.points[0].cost_per_participant, 180.0);
    assert!(trend.participant_growth < 0.0);
    assert!((trend.cost_per_participant_growth - (240.0 / 180.0 - 1.0)).abs() < 1e-9);
    assert!(trend.cost_outpaces_demand());
}

#[test]
fn test_purchasing_power_pipeline() {
    let records = parse_annual_participation(SNAP_ANNUAL).unwrap();
    assert_eq!(records.len(), 11);

    let power = purchasing_power(&records, 2020).unwrap();
    assert_eq!(power.points.first().map(|p| p.year), Some(2014));
    assert_eq!(power.points.last().map(|p| p.year), Some(2024));
    assert_eq!(power.peak_participation_year, Some(2014));
    assert!((power.benefit_growth - (187.20 / 125.01 - 1.0)).abs() < 1e-12);

    let y2021 = power.points.iter().find(|p| p.year == 2021).unwrap();
    assert!((y2021.change.unwrap() - (218.19 / 155.06 - 1.0)).abs() < 1e-12);
    assert!(power.recent_volatility.unwrap() > 0.1);
}

#[test]
fn test_unemployment_drivers_pipeline() {
    let records = parse_county_indicators(COUNTY_INDICATORS, STATEWIDE).unwrap();
    assert_eq!(records.len(), 48);

    let households = indicator_series(&records, Indicator::Households);
    let unemployment = indicator_series(&records, Indicator::Unemployment);

    let correlations = lagged_correlation(&households, &unemployment, 6);
    assert_eq!(correlations.len(), 7);
    assert_eq!(correlations[0].pairs, 48);
    assert_eq!(correlations[5].pairs, 43);
    assert_eq!(strongest_lag(&correlations).map(|c| c.lag), Some(5));

    let lag = recession_lag(&households, &unemployment, 3, 2020..=2021).unwrap();
    assert_eq!(lag.driver_peak, YearMonth::new(2020, 6));
    assert_eq!(lag.demand_peak, YearMonth::new(2021, 2));
    assert_eq!(lag.lag_months, 8);
}

#[test]
fn test_county_indicators_for_one_county() {
    let records = parse_county_indicators(COUNTY_INDICATORS, "Contra Costa").unwrap();
    assert_eq!(records.len(), 48);
    assert_eq!(records[0].persons, Some(86000.0));
    assert_eq!(records[0].unemployment, Some(4.0));
}

#[test]
fn test_anomaly_window_around_october() {
    let window = anomaly_window(&monthly_series(), YearMonth::new(2021, 10), 3).unwrap();
    assert_eq!(window.len(), 7);
    assert_eq!(window[0].month, 7);
    assert_eq!(window[6].month, 1);

    let october = window.iter().find(|p| p.month == 10).unwrap();
    assert!(october.change.unwrap() > 0.04);
}
