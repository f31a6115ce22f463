//! Seasonal profile extraction from a multi-year monthly series.
//!
//! Month-over-month changes are only computed between calendar-adjacent
//! records; a missing month breaks the chain. Changes are grouped by
//! calendar month, averaged across years, and the month with the largest
//! mean change is the peak.

use crate::analyzers::error::AnalysisError;
use crate::analyzers::types::{
    MonthStats, MonthlyChange, MonthlyParticipation, SeasonalProfile, month_name,
};
use crate::analyzers::utility::{weighted_mean, weighted_sample_stddev};
use std::collections::BTreeMap;
use tracing::{debug, warn};

const DEFAULT_WEIGHT: f64 = 1.0;

impl SeasonalProfile {
    /// Stats for `month`, or `InsufficientData` if the month is a gap.
    pub fn month(&self, month: u32) -> Result<&MonthStats, AnalysisError> {
        self.months
            .iter()
            .find(|m| m.month == month)
            .ok_or_else(|| AnalysisError::InsufficientData {
                months: vec![month],
            })
    }

    pub fn peak_month_name(&self) -> &'static str {
        month_name(self.peak_month)
    }

    pub fn peak(&self) -> Option<&MonthStats> {
        self.months.iter().find(|m| m.month == self.peak_month)
    }
}

/// Validates and sorts `series`, then returns every month-over-month change
/// between calendar-adjacent records in chronological order.
///
/// # Errors
///
/// [`AnalysisError::InvalidSeriesRecord`] for a month outside 1–12, a
/// negative or non-finite participant count, or a duplicated month.
pub fn month_over_month_changes(
    series: &[MonthlyParticipation],
) -> Result<Vec<MonthlyChange>, AnalysisError> {
    for r in series {
        if !(1..=12).contains(&r.month) {
            return Err(invalid_record(r, "month out of range"));
        }
        if !r.participants.is_finite() || r.participants < 0.0 {
            return Err(invalid_record(
                r,
                format!("invalid participant count {}", r.participants),
            ));
        }
    }

    let mut sorted: Vec<&MonthlyParticipation> = series.iter().collect();
    sorted.sort_by_key(|r| r.period());

    let mut changes = Vec::with_capacity(sorted.len().saturating_sub(1));
    for pair in sorted.windows(2) {
        let (prev, cur) = (pair[0], pair[1]);

        if prev.period() == cur.period() {
            return Err(invalid_record(cur, "duplicate month"));
        }
        if prev.period().succ() != cur.period() {
            debug!(from = %prev.period(), to = %cur.period(), "Gap in series, skipping transition");
            continue;
        }
        if prev.participants == 0.0 {
            warn!(month = %prev.period(), "Zero participants, change undefined");
            continue;
        }

        changes.push(MonthlyChange {
            year: cur.year,
            month: cur.month,
            change: (cur.participants - prev.participants) / prev.participants,
        });
    }

    Ok(changes)
}

/// Extracts the unweighted seasonal profile of `series`.
///
/// # Errors
///
/// [`AnalysisError::InsufficientData`] listing all twelve months when the
/// series has no valid transition at all.
pub fn extract_seasonal_profile(
    series: &[MonthlyParticipation],
) -> Result<SeasonalProfile, AnalysisError> {
    extract_weighted_profile(series, &BTreeMap::new())
}

/// Extracts a seasonal profile where each transition is weighted by the
/// weight of its year. Years missing from `weights` weigh 1.0.
#[tracing::instrument(skip_all, fields(records = series.len(), weighted_years = weights.len()))]
pub fn extract_weighted_profile(
    series: &[MonthlyParticipation],
    weights: &BTreeMap<i32, f64>,
) -> Result<SeasonalProfile, AnalysisError> {
    for (&year, &weight) in weights {
        if !weight.is_finite() || weight < 0.0 {
            return Err(AnalysisError::InvalidWeight { year, weight });
        }
    }

    let changes = month_over_month_changes(series)?;
    if changes.is_empty() {
        return Err(AnalysisError::insufficient_all());
    }

    let mut by_month: BTreeMap<u32, Vec<(f64, f64)>> = BTreeMap::new();
    for c in &changes {
        let weight = weights.get(&c.year).copied().unwrap_or(DEFAULT_WEIGHT);
        by_month.entry(c.month).or_default().push((c.change, weight));
    }

    let mut months = Vec::new();
    let mut gaps = Vec::new();

    for month in 1..=12u32 {
        let samples = match by_month.get(&month) {
            Some(s) => s,
            None => {
                gaps.push(month);
                continue;
            }
        };
        let Some(mean_change) = weighted_mean(samples) else {
            gaps.push(month);
            continue;
        };

        months.push(MonthStats {
            month,
            month_name: month_name(month),
            mean_change,
            std_dev: weighted_sample_stddev(samples, mean_change),
            observations: samples.len(),
            total_weight: samples.iter().map(|(_, w)| w).sum(),
        });
    }

    // Strict comparison keeps the earliest month on ties.
    let peak_month = months
        .iter()
        .fold(None::<&MonthStats>, |best, m| match best {
            Some(b) if m.mean_change <= b.mean_change => Some(b),
            _ => Some(m),
        })
        .map(|m| m.month)
        .ok_or_else(AnalysisError::insufficient_all)?;

    if !gaps.is_empty() {
        warn!(?gaps, "Seasonal profile has months without data");
    }
    debug!(
        peak_month = month_name(peak_month),
        transitions = changes.len(),
        "Seasonal profile extracted"
    );

    Ok(SeasonalProfile {
        peak_month,
        months,
        gaps,
        transitions: changes.len(),
    })
}

fn invalid_record(r: &MonthlyParticipation, reason: impl Into<String>) -> AnalysisError {
    AnalysisError::InvalidSeriesRecord {
        year: r.year,
        month: r.month,
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Four years of flat participation with October raised 20%.
    fn october_series() -> Vec<MonthlyParticipation> {
        let mut series = Vec::new();
        for year in 2019..=2022 {
            for month in 1..=12 {
                let value = if month == 10 { 1200.0 } else { 1000.0 };
                series.push(MonthlyParticipation::new(year, month, value));
            }
        }
        series
    }

    #[test]
    fn test_october_peak() {
        let profile = extract_seasonal_profile(&october_series()).unwrap();
        assert_eq!(profile.peak_month, 10);
        assert_eq!(profile.peak_month_name(), "October");
        assert!(profile.gaps.is_empty());

        let oct = profile.month(10).unwrap();
        assert!((oct.mean_change - 0.2).abs() < 1e-12);
        assert_eq!(oct.observations, 4);
        assert!(oct.std_dev.unwrap() < 1e-12);

        let nov = profile.month(11).unwrap();
        assert!((nov.mean_change - (-200.0 / 1200.0)).abs() < 1e-12);
    }

    #[test]
    fn test_january_observed_only_after_first_year() {
        let profile = extract_seasonal_profile(&october_series()).unwrap();
        // First January has no predecessor.
        assert_eq!(profile.month(1).unwrap().observations, 3);
        assert_eq!(profile.transitions, 47);
    }

    #[test]
    fn test_unsorted_input_is_sorted() {
        let mut series = october_series();
        series.reverse();
        let sorted = extract_seasonal_profile(&october_series()).unwrap();
        let reversed = extract_seasonal_profile(&series).unwrap();
        assert_eq!(sorted, reversed);
    }

    #[test]
    fn test_equal_weights_agree_with_unweighted() {
        let series = october_series();
        let weights: BTreeMap<i32, f64> = (2019..=2022).map(|y| (y, 1.0)).collect();

        let unweighted = extract_seasonal_profile(&series).unwrap();
        let weighted = extract_weighted_profile(&series, &weights).unwrap();
        assert_eq!(unweighted.peak_month, weighted.peak_month);
        assert_eq!(unweighted, weighted);
    }

    #[test]
    fn test_recent_weight_shifts_peak() {
        // 2021: March jumps; 2022: May jumps.
        let mut series = Vec::new();
        for (year, spike) in [(2021, 3), (2022, 5)] {
            for month in 1..=12 {
                let value = if month == spike { 1100.0 } else { 1000.0 };
                series.push(MonthlyParticipation::new(year, month, value));
            }
        }

        let unweighted = extract_seasonal_profile(&series).unwrap();
        assert_eq!(unweighted.peak_month, 3);

        let weights = BTreeMap::from([(2022, 3.0)]);
        let weighted = extract_weighted_profile(&series, &weights).unwrap();
        // March and May tie unweighted; weighting 2022 makes May win.
        assert_eq!(weighted.peak_month, 5);
    }

    #[test]
    fn test_single_record_is_insufficient_for_every_month() {
        let series = vec![MonthlyParticipation::new(2022, 10, 1000.0)];
        let err = extract_seasonal_profile(&series).unwrap_err();
        assert_eq!(
            err,
            AnalysisError::InsufficientData {
                months: (1..=12).collect()
            }
        );
    }

    #[test]
    fn test_empty_series_is_insufficient() {
        assert!(matches!(
            extract_seasonal_profile(&[]),
            Err(AnalysisError::InsufficientData { .. })
        ));
    }

    #[test]
    fn test_gap_breaks_chain() {
        let series = vec![
            MonthlyParticipation::new(2022, 1, 100.0),
            MonthlyParticipation::new(2022, 3, 500.0),
        ];
        assert!(month_over_month_changes(&series).unwrap().is_empty());
        assert!(matches!(
            extract_seasonal_profile(&series),
            Err(AnalysisError::InsufficientData { .. })
        ));
    }

    #[test]
    fn test_partial_profile_reports_gaps() {
        let series = vec![
            MonthlyParticipation::new(2022, 1, 100.0),
            MonthlyParticipation::new(2022, 2, 110.0),
            MonthlyParticipation::new(2022, 3, 99.0),
        ];
        let profile = extract_seasonal_profile(&series).unwrap();
        assert_eq!(profile.months.len(), 2);
        assert_eq!(profile.gaps, vec![1, 4, 5, 6, 7, 8, 9, 10, 11, 12]);
        assert_eq!(profile.peak_month, 2);

        let feb = profile.month(2).unwrap();
        assert_eq!(feb.std_dev, None);
        assert_eq!(
            profile.month(7).unwrap_err(),
            AnalysisError::InsufficientData { months: vec![7] }
        );
    }

    #[test]
    fn test_december_to_january_is_adjacent() {
        let series = vec![
            MonthlyParticipation::new(2021, 12, 100.0),
            MonthlyParticipation::new(2022, 1, 150.0),
        ];
        let changes = month_over_month_changes(&series).unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].year, 2022);
        assert_eq!(changes[0].month, 1);
        assert!((changes[0].change - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_tie_prefers_earliest_month() {
        let series = vec![
            MonthlyParticipation::new(2022, 1, 100.0),
            MonthlyParticipation::new(2022, 2, 110.0),
            MonthlyParticipation::new(2022, 3, 100.0),
            MonthlyParticipation::new(2022, 4, 100.0),
            MonthlyParticipation::new(2022, 8, 100.0),
            MonthlyParticipation::new(2022, 9, 110.0),
        ];
        let profile = extract_seasonal_profile(&series).unwrap();
        assert_eq!(profile.peak_month, 2);
    }

    /// March and September receive the same increments, in opposite year order.
    fn mirrored_series() -> Vec<MonthlyParticipation> {
        let increments = [0.1, 0.7, 0.515, 0.05];
        let mut series = Vec::new();
        for (i, year) in (2019..=2022).enumerate() {
            for month in 1..=12 {
                let value = match month {
                    3 => 1000.0 * (1.0 + increments[i]),
                    9 => 1000.0 * (1.0 + increments[3 - i]),
                    _ => 1000.0,
                };
                series.push(MonthlyParticipation::new(year, month, value));
            }
        }
        series
    }

    #[test]
    fn test_tie_with_reordered_changes_prefers_earliest_month() {
        let profile = extract_seasonal_profile(&mirrored_series()).unwrap();
        let march = profile.month(3).unwrap().mean_change;
        let september = profile.month(9).unwrap().mean_change;
        assert_eq!(march.to_bits(), september.to_bits());
        assert_eq!(profile.peak_month, 3);
    }

    #[test]
    fn test_equal_non_unit_weights_agree_with_unweighted() {
        for series in [mirrored_series(), october_series()] {
            let unweighted = extract_seasonal_profile(&series).unwrap();
            for w in [1e-3, 0.1, 0.3, 3.0, 7.0] {
                let weights: BTreeMap<i32, f64> = (2019..=2022).map(|y| (y, w)).collect();
                let weighted = extract_weighted_profile(&series, &weights).unwrap();

                assert_eq!(weighted.peak_month, unweighted.peak_month, "weight {w}");
                for (a, b) in weighted.months.iter().zip(&unweighted.months) {
                    assert_eq!(a.mean_change.to_bits(), b.mean_change.to_bits());
                }
            }
        }
    }

    #[test]
    fn test_zero_predecessor_is_skipped() {
        let series = vec![
            MonthlyParticipation::new(2022, 1, 0.0),
            MonthlyParticipation::new(2022, 2, 100.0),
            MonthlyParticipation::new(2022, 3, 120.0),
        ];
        let changes = month_over_month_changes(&series).unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].month, 3);
    }

    #[test]
    fn test_invalid_records_rejected() {
        let bad_month = vec![MonthlyParticipation::new(2022, 13, 1.0)];
        let negative = vec![MonthlyParticipation::new(2022, 1, -5.0)];
        let nan = vec![MonthlyParticipation::new(2022, 1, f64::NAN)];
        let duplicate = vec![
            MonthlyParticipation::new(2022, 1, 1.0),
            MonthlyParticipation::new(2022, 1, 2.0),
        ];

        for series in [bad_month, negative, nan, duplicate] {
            assert!(matches!(
                month_over_month_changes(&series),
                Err(AnalysisError::InvalidSeriesRecord { .. })
            ));
        }
    }

    #[test]
    fn test_invalid_weight_rejected() {
        let weights = BTreeMap::from([(2022, -1.0)]);
        let err = extract_weighted_profile(&october_series(), &weights).unwrap_err();
        assert_eq!(
            err,
            AnalysisError::InvalidWeight {
                year: 2022,
                weight: -1.0
            }
        );
    }

    #[test]
    fn test_zero_weight_year_becomes_gap() {
        let series = vec![
            MonthlyParticipation::new(2022, 1, 100.0),
            MonthlyParticipation::new(2022, 2, 110.0),
            MonthlyParticipation::new(2023, 5, 100.0),
            MonthlyParticipation::new(2023, 6, 150.0),
        ];
        let weights = BTreeMap::from([(2023, 0.0)]);
        let profile = extract_weighted_profile(&series, &weights).unwrap();
        assert!(profile.gaps.contains(&6));
        assert_eq!(profile.peak_month, 2);
    }

    #[test]
    fn test_profile_is_repeatable() {
        let a = extract_seasonal_profile(&october_series()).unwrap();
        let b = extract_seasonal_profile(&october_series()).unwrap();
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }
}
