//! Data types shared by the classifier and the seasonality pipeline.

use serde::Serialize;
use std::fmt;

/// Retailer counts for a single geographic unit (usually a census tract).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AreaFoodAccess {
    pub area_id: String,
    pub region: Option<String>,
    /// All food-selling outlets. Signed so malformed input survives loading
    /// and is rejected by the classifier.
    pub total_retailers: i64,
    pub healthy_retailers: Option<i64>,
    /// mRFEI score, 0 means no healthy retailers were found.
    pub healthy_score: Option<f64>,
}

impl AreaFoodAccess {
    pub fn new(area_id: &str, total_retailers: i64, healthy_score: Option<f64>) -> Self {
        Self {
            area_id: area_id.to_string(),
            region: None,
            total_retailers,
            healthy_retailers: None,
            healthy_score,
        }
    }

    pub fn with_region(mut self, region: &str) -> Self {
        self.region = Some(region.to_string());
        self
    }

    pub fn with_healthy_retailers(mut self, healthy: i64) -> Self {
        self.healthy_retailers = Some(healthy);
        self
    }

    /// Share of outlets that are healthy. `None` without retailers or a
    /// healthy count.
    pub fn healthy_ratio(&self) -> Option<f64> {
        if self.total_retailers <= 0 {
            return None;
        }
        self.healthy_retailers
            .map(|h| h as f64 / self.total_retailers as f64)
    }
}

pub const DESERT_COLOR: &str = "red";
pub const SCARCE_COLOR: &str = "orange";
pub const SWAMP_COLOR: &str = "gold";
pub const HEALTHY_COLOR: &str = "green";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum AccessCategory {
    Desert,
    Scarce,
    Swamp,
    #[serde(rename = "Healthy Access")]
    HealthyAccess,
}

impl AccessCategory {
    pub fn label(&self) -> &'static str {
        match self {
            AccessCategory::Desert => "Desert",
            AccessCategory::Scarce => "Scarce",
            AccessCategory::Swamp => "Swamp",
            AccessCategory::HealthyAccess => "Healthy Access",
        }
    }

    /// Chart color used by the rendering side for this category.
    pub fn color(&self) -> &'static str {
        match self {
            AccessCategory::Desert => DESERT_COLOR,
            AccessCategory::Scarce => SCARCE_COLOR,
            AccessCategory::Swamp => SWAMP_COLOR,
            AccessCategory::HealthyAccess => HEALTHY_COLOR,
        }
    }
}

impl fmt::Display for AccessCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Priority::High => "HIGH",
            Priority::Medium => "MEDIUM",
            Priority::Low => "LOW",
        };
        f.write_str(s)
    }
}

/// Outcome of classifying one area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub category: AccessCategory,
    pub priority: Priority,
    pub action: &'static str,
}

/// An area with its classification flattened into a single output row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccessAssessment {
    pub area_id: String,
    pub tract_name: String,
    pub region: Option<String>,
    pub total_retailers: i64,
    pub healthy_retailers: Option<i64>,
    pub healthy_score: Option<f64>,
    pub healthy_ratio: Option<f64>,
    pub category: AccessCategory,
    pub priority: Priority,
    pub action: &'static str,
    pub color: &'static str,
}

/// A calendar month within a specific year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Self {
        Self { year, month }
    }

    /// The calendar month immediately following this one.
    pub fn succ(self) -> Self {
        if self.month >= 12 {
            Self::new(self.year + 1, 1)
        } else {
            Self::new(self.year, self.month + 1)
        }
    }

    /// Months elapsed since January of year 0.
    pub fn ordinal(self) -> i64 {
        i64::from(self.year) * 12 + i64::from(self.month) - 1
    }

    pub fn from_ordinal(ordinal: i64) -> Self {
        Self::new(ordinal.div_euclid(12) as i32, ordinal.rem_euclid(12) as u32 + 1)
    }

    /// The month `months` away from this one; negative goes back in time.
    pub fn offset(self, months: i64) -> Self {
        Self::from_ordinal(self.ordinal() + months)
    }

    /// Signed number of months from `self` to `later`.
    pub fn months_until(self, later: YearMonth) -> i64 {
        later.ordinal() - self.ordinal()
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:02}", self.year, self.month)
    }
}

/// Participation count for one month of one year.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MonthlyParticipation {
    pub year: i32,
    pub month: u32,
    pub participants: f64,
}

impl MonthlyParticipation {
    pub fn new(year: i32, month: u32, participants: f64) -> Self {
        Self {
            year,
            month,
            participants,
        }
    }

    pub fn period(&self) -> YearMonth {
        YearMonth::new(self.year, self.month)
    }
}

/// A row of the monthly participation sheet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyRecord {
    pub year: i32,
    pub month: u32,
    pub persons: f64,
    pub households: Option<f64>,
    pub benefit_cost: Option<f64>,
}

impl MonthlyRecord {
    pub fn participation(&self) -> MonthlyParticipation {
        MonthlyParticipation::new(self.year, self.month, self.persons)
    }
}

/// A year of the national annual participation history.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AnnualRecord {
    pub year: i32,
    pub participants: Option<f64>,
    pub benefit_per_person: Option<f64>,
}

/// One month of a county indicator sheet: program demand next to the
/// unemployment rate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IndicatorRecord {
    pub year: i32,
    pub month: u32,
    pub households: Option<f64>,
    pub persons: Option<f64>,
    /// Percent, as published.
    pub unemployment: Option<f64>,
}

impl IndicatorRecord {
    pub fn period(&self) -> YearMonth {
        YearMonth::new(self.year, self.month)
    }
}

/// Month-over-month change, attributed to the later of the two months.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MonthlyChange {
    pub year: i32,
    pub month: u32,
    pub change: f64,
}

/// Aggregate change for one calendar month across all observed years.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthStats {
    pub month: u32,
    pub month_name: &'static str,
    pub mean_change: f64,
    /// Sample standard deviation; `None` with a single observation.
    pub std_dev: Option<f64>,
    pub observations: usize,
    pub total_weight: f64,
}

/// The typical month-over-month pattern of a participation series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeasonalProfile {
    /// Months that have data, January first.
    pub months: Vec<MonthStats>,
    /// Months without a single valid transition.
    pub gaps: Vec<u32>,
    pub peak_month: u32,
    pub transitions: usize,
}

/// Returns the English name of a month number, or `"Unknown"`.
pub fn month_name(month: u32) -> &'static str {
    u8::try_from(month)
        .ok()
        .and_then(|m| chrono::Month::try_from(m).ok())
        .map(|m| m.name())
        .unwrap_or("Unknown")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_year_month_succ_rolls_over_december() {
        assert_eq!(YearMonth::new(2022, 12).succ(), YearMonth::new(2023, 1));
        assert_eq!(YearMonth::new(2022, 3).succ(), YearMonth::new(2022, 4));
    }

    #[test]
    fn test_year_month_ordering_is_chronological() {
        assert!(YearMonth::new(2021, 12) < YearMonth::new(2022, 1));
        assert!(YearMonth::new(2022, 2) < YearMonth::new(2022, 10));
    }

    #[test]
    fn test_year_month_offset() {
        let april = YearMonth::new(2020, 4);
        assert_eq!(april.offset(-4), YearMonth::new(2019, 12));
        assert_eq!(april.offset(9), YearMonth::new(2021, 1));
        assert_eq!(april.offset(0), april);
        assert_eq!(april.months_until(YearMonth::new(2021, 1)), 9);
        assert_eq!(YearMonth::new(2021, 1).months_until(april), -9);
        assert_eq!(YearMonth::from_ordinal(april.ordinal()), april);
    }

    #[test]
    fn test_healthy_ratio() {
        let area = AreaFoodAccess::new("6013355112", 20, Some(5.0)).with_healthy_retailers(1);
        assert_eq!(area.healthy_ratio(), Some(0.05));

        let desert = AreaFoodAccess::new("6013310000", 0, None).with_healthy_retailers(0);
        assert_eq!(desert.healthy_ratio(), None);
    }

    #[test]
    fn test_month_name() {
        assert_eq!(month_name(1), "January");
        assert_eq!(month_name(10), "October");
        assert_eq!(month_name(13), "Unknown");
    }

    #[test]
    fn test_category_labels_and_colors() {
        assert_eq!(AccessCategory::HealthyAccess.to_string(), "Healthy Access");
        assert_eq!(AccessCategory::Desert.color(), "red");
        assert_eq!(AccessCategory::Swamp.color(), "gold");
        assert_eq!(Priority::Medium.to_string(), "MEDIUM");
    }
}
