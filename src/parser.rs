//! CSV loaders for the food environment index, the SNAP participation
//! sheets and the county indicator sheet.

use anyhow::{Context, Result, bail};
use chrono::{Datelike, NaiveDate};
use flate2::read::GzDecoder;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;
use tracing::{debug, warn};

use crate::analyzers::types::{
    AnnualRecord, AreaFoodAccess, IndicatorRecord, MonthlyRecord, YearMonth,
};
use crate::analyzers::utility::mean;

pub const DEFAULT_COUNTY: &str = "Contra Costa";
pub const DEFAULT_GEOTYPE: &str = "CT";

/// How many leading lines are searched for a sheet's header.
const HEADER_SEARCH_LINES: usize = 20;
const PERSONS_COLUMN: &str = "Participation Persons";
const HOUSEHOLDS_COLUMN: &str = "Participation Households";
const COST_COLUMN: &str = "Benefit Costs";
const ANNUAL_PARTICIPATION_COLUMN: &str = "Average Participation";
const ANNUAL_BENEFIT_COLUMN: &str = "Average Benefit Per Person";
const INDICATOR_DATE_COLUMN: &str = "Date";
const INDICATOR_COUNTY_COLUMN: &str = "County";
const INDICATOR_HOUSEHOLDS_COLUMN: &str = "CalFresh Households";
const INDICATOR_PERSONS_COLUMN: &str = "CalFresh Persons";
const INDICATOR_UNEMPLOYMENT_COLUMN: &str = "Unemployment Monthly";
/// County label of the pre-aggregated statewide rows.
pub const STATEWIDE: &str = "Statewide";

/// Reads an input file to a string, gunzipping `*.gz` files.
pub fn open_input(path: &str) -> Result<String> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read '{path}'"))?;

    if Path::new(path).extension().and_then(|e| e.to_str()) == Some("gz") {
        let mut text = String::new();
        GzDecoder::new(bytes.as_slice())
            .read_to_string(&mut text)
            .with_context(|| format!("Failed to decompress '{path}'"))?;
        Ok(text)
    } else {
        String::from_utf8(bytes).with_context(|| format!("'{path}' is not UTF-8"))
    }
}

/// Row filter for the food environment index. `None` keeps every value.
#[derive(Debug, Clone, PartialEq)]
pub struct AreaFilter {
    pub county: Option<String>,
    pub geotype: Option<String>,
}

impl Default for AreaFilter {
    fn default() -> Self {
        Self {
            county: Some(DEFAULT_COUNTY.to_string()),
            geotype: Some(DEFAULT_GEOTYPE.to_string()),
        }
    }
}

impl AreaFilter {
    pub fn all() -> Self {
        Self {
            county: None,
            geotype: None,
        }
    }

    fn matches(&self, row: &FoodEnvironmentRow) -> bool {
        let county_ok = match &self.county {
            Some(c) => row.county_name.as_deref().map(str::trim) == Some(c.as_str()),
            None => true,
        };
        let geotype_ok = match &self.geotype {
            Some(g) => row.geotype.as_deref().map(str::trim) == Some(g.as_str()),
            None => true,
        };
        county_ok && geotype_ok
    }
}

/// One row of the modified Retail Food Environment Index export.
/// Columns not listed here are ignored.
#[derive(Debug, Deserialize)]
struct FoodEnvironmentRow {
    #[serde(default)]
    county_name: Option<String>,
    #[serde(default)]
    geotype: Option<String>,
    geotypevalue: String,
    #[serde(default)]
    region_name: Option<String>,
    #[serde(default)]
    numerator: Option<String>,
    #[serde(default)]
    denominator: Option<String>,
    #[serde(default)]
    estimate: Option<String>,
}

/// Parses the food environment index CSV, keeping rows that match `filter`.
///
/// # Errors
///
/// Fails on malformed CSV, or a row whose retailer count is missing or
/// not a whole number.
pub fn parse_food_environment<R: Read>(
    reader: R,
    filter: &AreaFilter,
) -> Result<Vec<AreaFoodAccess>> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut areas = Vec::new();
    let mut skipped = 0usize;

    for (i, result) in rdr.deserialize().enumerate() {
        let row: FoodEnvironmentRow = result.with_context(|| format!("Malformed row {}", i + 1))?;
        if !filter.matches(&row) {
            skipped += 1;
            continue;
        }

        let area_id = normalize_area_id(&row.geotypevalue);
        let Some(total) = row.denominator.as_deref().and_then(parse_number) else {
            bail!("Row {} ({area_id}): missing retailer count", i + 1);
        };
        let total_retailers = whole_number(total)
            .with_context(|| format!("Row {} ({area_id}): retailer count {total}", i + 1))?;
        let healthy_retailers = match row.numerator.as_deref().and_then(parse_number) {
            Some(n) => Some(
                whole_number(n)
                    .with_context(|| format!("Row {} ({area_id}): healthy count {n}", i + 1))?,
            ),
            None => None,
        };

        areas.push(AreaFoodAccess {
            area_id,
            region: row.region_name.filter(|r| !r.is_empty()),
            total_retailers,
            healthy_retailers,
            healthy_score: row.estimate.as_deref().and_then(parse_number),
        });
    }

    debug!(loaded = areas.len(), skipped, "Food environment rows parsed");
    Ok(areas)
}

/// Parses the monthly SNAP participation sheet.
///
/// The sheet starts with free-form title lines; the header is the first
/// line mentioning "Participation Persons". Fiscal-year and annual summary
/// rows, and rows without a `Mon YYYY` date, are skipped.
pub fn parse_monthly_participation(text: &str) -> Result<Vec<MonthlyRecord>> {
    let Some(offset) = header_offset(text, |line| line.contains(PERSONS_COLUMN)) else {
        bail!("No '{PERSONS_COLUMN}' header in the first {HEADER_SEARCH_LINES} lines");
    };

    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text[offset..].as_bytes());

    let headers = rdr.headers()?.clone();
    let find = |name: &str| headers.iter().position(|h| h.contains(name));
    let Some(persons_idx) = find(PERSONS_COLUMN) else {
        bail!("Missing '{PERSONS_COLUMN}' column");
    };
    let households_idx = find(HOUSEHOLDS_COLUMN);
    let cost_idx = find(COST_COLUMN);

    let mut records = Vec::new();
    for result in rdr.records() {
        let row = result?;
        let label = row.get(0).unwrap_or_default();
        if label.starts_with("FY") || label.contains("ANNUAL") {
            continue;
        }
        let Some(date) = parse_month_label(label) else {
            debug!(label, "Skipping row without a month date");
            continue;
        };

        let cell = |idx: Option<usize>| idx.and_then(|i| row.get(i)).and_then(parse_number);
        let Some(persons) = cell(Some(persons_idx)) else {
            warn!(label, "Skipping month without a participant count");
            continue;
        };

        records.push(MonthlyRecord {
            year: date.year(),
            month: date.month(),
            persons,
            households: cell(households_idx),
            benefit_cost: cell(cost_idx),
        });
    }

    debug!(months = records.len(), "Monthly participation parsed");
    Ok(records)
}

/// Parses the annual participation history sheet.
///
/// The header is the first line naming both "Average Participation" and
/// "Average Benefit Per Person". Rows whose first cell is not a year are
/// skipped. Records come back in ascending year order.
pub fn parse_annual_participation(text: &str) -> Result<Vec<AnnualRecord>> {
    let is_header = |line: &str| {
        line.contains(ANNUAL_PARTICIPATION_COLUMN) && line.contains(ANNUAL_BENEFIT_COLUMN)
    };
    let Some(offset) = header_offset(text, is_header) else {
        bail!(
            "No '{ANNUAL_PARTICIPATION_COLUMN}' / '{ANNUAL_BENEFIT_COLUMN}' header in the first {HEADER_SEARCH_LINES} lines"
        );
    };

    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text[offset..].as_bytes());

    let headers = rdr.headers()?.clone();
    let find = |name: &str| headers.iter().position(|h| h.contains(name));
    let (Some(part_idx), Some(benefit_idx)) =
        (find(ANNUAL_PARTICIPATION_COLUMN), find(ANNUAL_BENEFIT_COLUMN))
    else {
        bail!("Missing annual participation columns");
    };

    let mut by_year = BTreeMap::new();
    for result in rdr.records() {
        let row = result?;
        let label = row.get(0).unwrap_or_default();
        let Some(year) = parse_number(label).and_then(|y| whole_number(y).ok()) else {
            debug!(label, "Skipping row without a year");
            continue;
        };
        let Ok(year) = i32::try_from(year) else {
            warn!(label, "Skipping row with an out-of-range year");
            continue;
        };

        let cell = |i: usize| row.get(i).and_then(parse_number);
        by_year.insert(
            year,
            AnnualRecord {
                year,
                participants: cell(part_idx),
                benefit_per_person: cell(benefit_idx),
            },
        );
    }

    debug!(years = by_year.len(), "Annual participation parsed");
    Ok(by_year.into_values().collect())
}

/// Parses the monthly county indicator sheet, keeping rows for `county`.
///
/// Dates are `Jan-14` style. When `county` is [`STATEWIDE`] and the sheet
/// carries no statewide rows, counties are combined per month: demand is
/// summed and the unemployment rate averaged.
pub fn parse_county_indicators(text: &str, county: &str) -> Result<Vec<IndicatorRecord>> {
    let Some(offset) = header_offset(text, |line| line.contains(INDICATOR_PERSONS_COLUMN)) else {
        bail!("No '{INDICATOR_PERSONS_COLUMN}' header in the first {HEADER_SEARCH_LINES} lines");
    };

    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text[offset..].as_bytes());

    let headers = rdr.headers()?.clone();
    let exact = |name: &str| headers.iter().position(|h| h == name);
    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h.contains(name))
            .with_context(|| format!("Missing '{name}' column"))
    };
    let date_idx = exact(INDICATOR_DATE_COLUMN)
        .with_context(|| format!("Missing '{INDICATOR_DATE_COLUMN}' column"))?;
    let county_idx = exact(INDICATOR_COUNTY_COLUMN)
        .with_context(|| format!("Missing '{INDICATOR_COUNTY_COLUMN}' column"))?;
    let households_idx = column(INDICATOR_HOUSEHOLDS_COLUMN)?;
    let persons_idx = column(INDICATOR_PERSONS_COLUMN)?;
    let unemployment_idx = column(INDICATOR_UNEMPLOYMENT_COLUMN)?;

    let mut selected = BTreeMap::new();
    let mut all_counties: BTreeMap<YearMonth, Vec<IndicatorRecord>> = BTreeMap::new();
    for result in rdr.records() {
        let row = result?;
        let label = row.get(date_idx).unwrap_or_default();
        let Some(date) = parse_short_month_label(label) else {
            debug!(label, "Skipping row without a month date");
            continue;
        };

        let cell = |i: usize| row.get(i).and_then(parse_number);
        let record = IndicatorRecord {
            year: date.year(),
            month: date.month(),
            households: cell(households_idx),
            persons: cell(persons_idx),
            unemployment: cell(unemployment_idx),
        };

        let row_county = row.get(county_idx).unwrap_or_default();
        if row_county == county {
            if selected.insert(record.period(), record).is_some() {
                bail!("Duplicate {county} row for {}", record.period());
            }
        } else if row_county != STATEWIDE {
            all_counties.entry(record.period()).or_default().push(record);
        }
    }

    if selected.is_empty() && county == STATEWIDE {
        warn!("No '{STATEWIDE}' rows found, combining counties");
        return Ok(all_counties.values().map(|rows| combine(rows)).collect());
    }

    debug!(county, months = selected.len(), "County indicators parsed");
    Ok(selected.into_values().collect())
}

/// Combines the rows of one month across counties.
fn combine(rows: &[IndicatorRecord]) -> IndicatorRecord {
    let sum = |f: fn(&IndicatorRecord) -> Option<f64>| {
        rows.iter().filter_map(f).reduce(|a, b| a + b)
    };
    let rates: Vec<f64> = rows.iter().filter_map(|r| r.unemployment).collect();
    IndicatorRecord {
        year: rows[0].year,
        month: rows[0].month,
        households: sum(|r| r.households),
        persons: sum(|r| r.persons),
        unemployment: (!rates.is_empty()).then(|| mean(&rates)),
    }
}

/// Byte offset of the first line matching `is_header`, if found.
fn header_offset(text: &str, is_header: impl Fn(&str) -> bool) -> Option<usize> {
    let mut offset = 0;
    for line in text.split_inclusive('\n').take(HEADER_SEARCH_LINES) {
        if is_header(line) {
            return Some(offset);
        }
        offset += line.len();
    }
    None
}

/// Parses `Oct 2022` style labels.
pub fn parse_month_label(label: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(&format!("1 {}", label.trim()), "%d %b %Y").ok()
}

/// Parses `Jan-14` style labels.
pub fn parse_short_month_label(label: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(&format!("1-{}", label.trim()), "%d-%b-%y").ok()
}

/// Parses a `2020-04` period.
pub fn parse_period(s: &str) -> Option<YearMonth> {
    let date = NaiveDate::parse_from_str(&format!("{}-01", s.trim()), "%Y-%m-%d").ok()?;
    Some(YearMonth::new(date.year(), date.month()))
}

/// Parses a numeric cell, tolerating thousands separators, `%`, `*`,
/// `$` and `]` footnote marks. Blank, `NA` and non-finite cells are `None`.
pub fn parse_number(cell: &str) -> Option<f64> {
    let cleaned: String = cell
        .chars()
        .filter(|c| !matches!(c, ',' | '%' | '*' | '$' | ']'))
        .collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() || cleaned.eq_ignore_ascii_case("na") || cleaned.eq_ignore_ascii_case("n/a")
    {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn whole_number(value: f64) -> Result<i64> {
    if !value.is_finite() || value.fract() != 0.0 {
        bail!("not a whole number");
    }
    Ok(value as i64)
}

/// Spreadsheet exports sometimes turn tract codes into `6013355112.0`.
fn normalize_area_id(raw: &str) -> String {
    raw.trim().trim_end_matches(".0").to_string()
}
