use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::analyzers::types::{AccessAssessment, AccessCategory};

/// Per-run tally of area categories, appended to the summary history.
#[derive(Debug, Default, Serialize)]
pub struct AccessSummary {
    pub timestamp: DateTime<Utc>,
    pub county: Option<String>,
    pub total_areas: usize,

    pub deserts: usize,
    pub scarce: usize,
    pub swamps: usize,
    pub healthy: usize,

    pub desert_pct: f64,
    pub swamp_pct: f64,
}

impl AccessSummary {
    pub fn from_assessments(assessments: &[AccessAssessment]) -> Self {
        let mut s = AccessSummary {
            timestamp: Utc::now(),
            total_areas: assessments.len(),
            ..Default::default()
        };

        for a in assessments {
            match a.category {
                AccessCategory::Desert => s.deserts += 1,
                AccessCategory::Scarce => s.scarce += 1,
                AccessCategory::Swamp => s.swamps += 1,
                AccessCategory::HealthyAccess => s.healthy += 1,
            }
        }

        s.desert_pct = Self::pct(s.deserts, s.total_areas);
        s.swamp_pct = Self::pct(s.swamps, s.total_areas);
        s
    }

    pub fn pct(part: usize, total: usize) -> f64 {
        if total == 0 {
            0.0
        } else {
            (part as f64 / total as f64) * 100.0
        }
    }

    /// Set the county the areas were filtered to
    pub fn with_county(mut self, county: Option<&str>) -> Self {
        self.county = county.map(str::to_string);
        self
    }
}
