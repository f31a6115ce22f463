//! Demand trend analyses over participation and unemployment data.

use crate::analyzers::error::AnalysisError;
use crate::analyzers::seasonality::month_over_month_changes;
use crate::analyzers::types::{
    AnnualRecord, IndicatorRecord, MonthlyParticipation, MonthlyRecord, YearMonth,
};
use crate::analyzers::utility::{mean, pearson, sample_stddev};
use serde::Serialize;
use std::collections::BTreeMap;
use std::ops::RangeInclusive;
use tracing::debug;

/// A monthly series keyed by calendar month.
pub type MonthlySeries = BTreeMap<YearMonth, f64>;

/// A month whose growth is statistically unusual for the series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DemandSpike {
    pub year: i32,
    pub month: u32,
    pub change: f64,
    pub z_score: f64,
}

/// Flags month-over-month changes whose z-score exceeds `z_threshold`.
///
/// Returns spikes in chronological order. A series with no variation in
/// its changes has no spikes.
pub fn detect_spikes(
    series: &[MonthlyParticipation],
    z_threshold: f64,
) -> Result<Vec<DemandSpike>, AnalysisError> {
    let changes = month_over_month_changes(series)?;
    let values: Vec<f64> = changes.iter().map(|c| c.change).collect();

    let avg = mean(&values);
    let Some(sd) = sample_stddev(&values, avg) else {
        return Err(AnalysisError::insufficient_all());
    };
    if sd == 0.0 {
        return Ok(Vec::new());
    }

    let spikes: Vec<DemandSpike> = changes
        .iter()
        .filter_map(|c| {
            let z = (c.change - avg) / sd;
            (z > z_threshold).then_some(DemandSpike {
                year: c.year,
                month: c.month,
                change: c.change,
                z_score: z,
            })
        })
        .collect();

    debug!(
        changes = changes.len(),
        spikes = spikes.len(),
        z_threshold,
        "Spike detection complete"
    );
    Ok(spikes)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TrendDirection {
    Increasing,
    Decreasing,
}

impl TrendDirection {
    /// What the procurement mix should lean towards.
    pub fn procurement_advice(&self) -> &'static str {
        match self {
            TrendDirection::Increasing => "Buy more family packs",
            TrendDirection::Decreasing => {
                "Buy fewer family packs; buy more single-serving meals"
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HouseholdPoint {
    pub year: i32,
    pub month: u32,
    pub persons_per_household: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HouseholdTrend {
    pub points: Vec<HouseholdPoint>,
    pub direction: TrendDirection,
}

/// Tracks persons per household over time.
///
/// Records without a positive household count are skipped. The direction
/// compares the last ratio with the first.
pub fn household_trend(records: &[MonthlyRecord]) -> Result<HouseholdTrend, AnalysisError> {
    let mut sorted: Vec<&MonthlyRecord> = records.iter().collect();
    sorted.sort_by_key(|r| YearMonth::new(r.year, r.month));

    let points: Vec<HouseholdPoint> = sorted
        .into_iter()
        .filter_map(|r| match r.households {
            Some(h) if h > 0.0 && r.persons.is_finite() => Some(HouseholdPoint {
                year: r.year,
                month: r.month,
                persons_per_household: r.persons / h,
            }),
            _ => None,
        })
        .collect();

    let (Some(first), Some(last)) = (points.first(), points.last()) else {
        return Err(AnalysisError::insufficient_all());
    };
    if points.len() < 2 {
        // One point has no trend.
        return Err(AnalysisError::insufficient_all());
    }

    let direction = if last.persons_per_household > first.persons_per_household {
        TrendDirection::Increasing
    } else {
        TrendDirection::Decreasing
    };

    Ok(HouseholdTrend { points, direction })
}

/// One year of the heat calendar. `months[0]` is January.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeatRow {
    pub year: i32,
    pub months: [Option<f64>; 12],
}

/// Pivots participation into a year × month grid, years ascending.
/// Records with a month outside 1–12 are ignored; a repeated month keeps
/// the last value seen.
pub fn heat_calendar(series: &[MonthlyParticipation]) -> Vec<HeatRow> {
    let mut grid: BTreeMap<i32, [Option<f64>; 12]> = BTreeMap::new();
    for r in series {
        if !(1..=12).contains(&r.month) {
            continue;
        }
        grid.entry(r.year).or_insert([None; 12])[(r.month - 1) as usize] = Some(r.participants);
    }

    grid.into_iter()
        .map(|(year, months)| HeatRow { year, months })
        .collect()
}

/// Monthly participants next to what their benefits cost.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CostPoint {
    pub year: i32,
    pub month: u32,
    pub participants: f64,
    pub benefit_cost: f64,
    pub cost_per_participant: f64,
}

/// Growth of demand against growth of spending, first month to last.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostTrend {
    pub points: Vec<CostPoint>,
    pub participant_growth: f64,
    pub cost_growth: f64,
    pub cost_per_participant_growth: f64,
}

impl CostTrend {
    /// Spending rising faster than the number of people points at price
    /// inflation rather than demand.
    pub fn cost_outpaces_demand(&self) -> bool {
        self.cost_growth > self.participant_growth
    }
}

/// Compares benefit cost growth with participant growth.
///
/// Months without a positive cost or participant count are skipped.
pub fn cost_of_hunger(records: &[MonthlyRecord]) -> Result<CostTrend, AnalysisError> {
    let mut sorted: Vec<&MonthlyRecord> = records.iter().collect();
    sorted.sort_by_key(|r| YearMonth::new(r.year, r.month));

    let points: Vec<CostPoint> = sorted
        .into_iter()
        .filter_map(|r| match r.benefit_cost {
            Some(cost) if cost > 0.0 && r.persons > 0.0 && r.persons.is_finite() => {
                Some(CostPoint {
                    year: r.year,
                    month: r.month,
                    participants: r.persons,
                    benefit_cost: cost,
                    cost_per_participant: cost / r.persons,
                })
            }
            _ => None,
        })
        .collect();

    let (Some(first), Some(last)) = (points.first(), points.last()) else {
        return Err(AnalysisError::insufficient_all());
    };
    if points.len() < 2 {
        return Err(AnalysisError::insufficient_all());
    }

    let growth = |from: f64, to: f64| to / from - 1.0;
    Ok(CostTrend {
        participant_growth: growth(first.participants, last.participants),
        cost_growth: growth(first.benefit_cost, last.benefit_cost),
        cost_per_participant_growth: growth(
            first.cost_per_participant,
            last.cost_per_participant,
        ),
        points,
    })
}

/// One year of the benefit history.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BenefitPoint {
    pub year: i32,
    pub participants: Option<f64>,
    pub benefit_per_person: f64,
    /// Change against the previous year; `None` after a missing year.
    pub change: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PurchasingPower {
    pub points: Vec<BenefitPoint>,
    /// Benefit per person, first year to last.
    pub benefit_growth: f64,
    /// Year with the most participants; the earliest on ties.
    pub peak_participation_year: Option<i32>,
    /// Sample standard deviation of yearly benefit changes from the recent
    /// era onwards.
    pub recent_volatility: Option<f64>,
}

/// Tracks the average benefit per person across years.
///
/// Years without a positive benefit are skipped. `recent_from` marks the
/// first year counted as recent.
pub fn purchasing_power(
    records: &[AnnualRecord],
    recent_from: i32,
) -> Result<PurchasingPower, AnalysisError> {
    let mut sorted: Vec<(&AnnualRecord, f64)> = records
        .iter()
        .filter_map(|r| match r.benefit_per_person {
            Some(b) if b > 0.0 && b.is_finite() => Some((r, b)),
            _ => None,
        })
        .collect();
    sorted.sort_by_key(|(r, _)| r.year);

    let mut points: Vec<BenefitPoint> = Vec::with_capacity(sorted.len());
    for (r, benefit) in sorted {
        let change = points
            .last()
            .filter(|p| p.year + 1 == r.year)
            .map(|p| benefit / p.benefit_per_person - 1.0);
        points.push(BenefitPoint {
            year: r.year,
            participants: r.participants,
            benefit_per_person: benefit,
            change,
        });
    }

    let (Some(first), Some(last)) = (points.first(), points.last()) else {
        return Err(AnalysisError::insufficient_all());
    };
    if points.len() < 2 {
        return Err(AnalysisError::insufficient_all());
    }
    let benefit_growth = last.benefit_per_person / first.benefit_per_person - 1.0;

    let peak_participation_year = points
        .iter()
        .filter_map(|p| p.participants.map(|n| (p.year, n)))
        .fold(None::<(i32, f64)>, |best, (year, n)| match best {
            Some((_, b)) if n <= b => best,
            _ => Some((year, n)),
        })
        .map(|(year, _)| year);

    let recent: Vec<f64> = points
        .iter()
        .filter(|p| p.year >= recent_from)
        .filter_map(|p| p.change)
        .collect();
    let recent_volatility = sample_stddev(&recent, mean(&recent));

    Ok(PurchasingPower {
        points,
        benefit_growth,
        peak_participation_year,
        recent_volatility,
    })
}

/// Which column of the indicator sheet to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Indicator {
    Households,
    Persons,
    Unemployment,
}

/// Collects one indicator into a monthly series, skipping missing cells.
pub fn indicator_series(records: &[IndicatorRecord], indicator: Indicator) -> MonthlySeries {
    records
        .iter()
        .filter_map(|r| {
            let value = match indicator {
                Indicator::Households => r.households,
                Indicator::Persons => r.persons,
                Indicator::Unemployment => r.unemployment,
            }?;
            Some((r.period(), value))
        })
        .collect()
}

/// Correlation of demand with the driver `lag` months earlier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LagCorrelation {
    pub lag: u32,
    pub pairs: usize,
    pub correlation: Option<f64>,
}

/// Pearson correlation between `demand` and `driver` shifted forward by
/// 0 to `max_lag` months. Only months present in both series pair up.
pub fn lagged_correlation(
    demand: &MonthlySeries,
    driver: &MonthlySeries,
    max_lag: u32,
) -> Vec<LagCorrelation> {
    (0..=max_lag)
        .map(|lag| {
            let pairs: Vec<(f64, f64)> = demand
                .iter()
                .filter_map(|(period, d)| {
                    driver
                        .get(&period.offset(-i64::from(lag)))
                        .map(|x| (*d, *x))
                })
                .collect();
            LagCorrelation {
                lag,
                pairs: pairs.len(),
                correlation: pearson(&pairs),
            }
        })
        .collect()
}

/// The lag with the highest correlation; the shortest on ties.
pub fn strongest_lag(correlations: &[LagCorrelation]) -> Option<&LagCorrelation> {
    correlations
        .iter()
        .filter(|c| c.correlation.is_some())
        .fold(None::<&LagCorrelation>, |best, c| match best {
            Some(b) if c.correlation <= b.correlation => Some(b),
            _ => Some(c),
        })
}

/// Trailing `window`-month mean. A month is only smoothed when every month
/// of its window is present.
pub fn rolling_mean(series: &MonthlySeries, window: usize) -> MonthlySeries {
    let window = window.max(1);
    series
        .keys()
        .filter_map(|&period| {
            let values: Option<Vec<f64>> = (0..window as i64)
                .map(|k| series.get(&period.offset(-k)).copied())
                .collect();
            values.map(|v| (period, mean(&v)))
        })
        .collect()
}

/// How long demand took to peak after the driver peaked.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RecessionLag {
    pub driver_peak: YearMonth,
    pub driver_peak_value: f64,
    pub demand_peak: YearMonth,
    pub demand_peak_value: f64,
    /// Negative when demand peaked first.
    pub lag_months: i64,
}

/// Finds the peaks of the smoothed series within `years` and the distance
/// between them in months. Ties go to the earliest month.
#[tracing::instrument(skip(demand, driver))]
pub fn recession_lag(
    demand: &MonthlySeries,
    driver: &MonthlySeries,
    window: usize,
    years: RangeInclusive<i32>,
) -> Result<RecessionLag, AnalysisError> {
    let peak = |series: &MonthlySeries| {
        rolling_mean(series, window)
            .into_iter()
            .filter(|(p, _)| years.contains(&p.year))
            .fold(None::<(YearMonth, f64)>, |best, (p, v)| match best {
                Some((_, b)) if v <= b => best,
                _ => Some((p, v)),
            })
    };

    let (Some((driver_peak, driver_peak_value)), Some((demand_peak, demand_peak_value))) =
        (peak(driver), peak(demand))
    else {
        return Err(AnalysisError::insufficient_all());
    };

    let lag_months = driver_peak.months_until(demand_peak);
    debug!(%driver_peak, %demand_peak, lag_months, "Recession lag measured");
    Ok(RecessionLag {
        driver_peak,
        driver_peak_value,
        demand_peak,
        demand_peak_value,
        lag_months,
    })
}

/// A month around an anomaly, with its month-over-month change.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WindowPoint {
    pub year: i32,
    pub month: u32,
    pub participants: f64,
    pub change: Option<f64>,
}

/// The months within `radius` of `center`, in chronological order.
pub fn anomaly_window(
    series: &[MonthlyParticipation],
    center: YearMonth,
    radius: u32,
) -> Result<Vec<WindowPoint>, AnalysisError> {
    let changes: BTreeMap<YearMonth, f64> = month_over_month_changes(series)?
        .into_iter()
        .map(|c| (YearMonth::new(c.year, c.month), c.change))
        .collect();

    let radius = i64::from(radius);
    let (from, to) = (center.offset(-radius), center.offset(radius));

    let mut window: Vec<WindowPoint> = series
        .iter()
        .filter(|r| (from..=to).contains(&r.period()))
        .map(|r| WindowPoint {
            year: r.year,
            month: r.month,
            participants: r.participants,
            change: changes.get(&r.period()).copied(),
        })
        .collect();
    window.sort_by_key(|p| YearMonth::new(p.year, p.month));
    Ok(window)
}
