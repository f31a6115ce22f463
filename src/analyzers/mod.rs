//! Food access classification and participation seasonality.
//!
//! [`access`] turns per-area retailer counts into a desert / swamp /
//! healthy-access assessment. [`seasonality`] reduces a multi-year monthly
//! participation series to its typical month-over-month pattern and peak
//! month. [`trends`] covers the rest of the demand picture: spikes,
//! household size, benefit costs and how demand lags unemployment.

pub mod access;
pub mod error;
pub mod seasonality;
pub mod trends;
pub mod types;
pub mod utility;

pub use error::AnalysisError;
