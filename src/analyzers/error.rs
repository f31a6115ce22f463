use thiserror::Error;

/// Errors raised by the classifier and the seasonality pipeline.
///
/// All of them are deterministic functions of the input.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisError {
    /// An area violates the record invariants (negative count, missing score).
    #[error("Invalid area record {area_id}: {reason}")]
    InvalidAreaRecord { area_id: String, reason: String },

    /// No valid month-over-month transition exists for these months.
    #[error("Insufficient data for month(s) {months:?}")]
    InsufficientData { months: Vec<u32> },

    /// A participation record is malformed.
    #[error("Invalid series record {year}-{month:02}: {reason}")]
    InvalidSeriesRecord {
        year: i32,
        month: u32,
        reason: String,
    },

    /// A per-year weight is negative or not finite.
    #[error("Invalid weight {weight} for year {year}")]
    InvalidWeight { year: i32, weight: f64 },
}

impl AnalysisError {
    pub(crate) fn invalid_area(area_id: &str, reason: impl Into<String>) -> Self {
        AnalysisError::InvalidAreaRecord {
            area_id: area_id.to_string(),
            reason: reason.into(),
        }
    }

    /// Every calendar month lacks data.
    pub(crate) fn insufficient_all() -> Self {
        AnalysisError::InsufficientData {
            months: (1..=12).collect(),
        }
    }
}
