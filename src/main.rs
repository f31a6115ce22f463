//! CLI entry point for the food access rater.
//!
//! Provides subcommands for classifying census tracts by food access and
//! for reading demand patterns out of SNAP participation data: the
//! seasonal profile, spikes, household size, benefit costs and the lag
//! between unemployment and demand.

use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand, ValueEnum};
use food_access_rater::analyzers::access::{assess, rank_highest_need, tract_display_name};
use food_access_rater::analyzers::seasonality::extract_weighted_profile;
use food_access_rater::analyzers::trends::{
    Indicator, anomaly_window, cost_of_hunger, detect_spikes, heat_calendar, household_trend,
    indicator_series, lagged_correlation, purchasing_power, recession_lag, strongest_lag,
};
use food_access_rater::analyzers::types::{AccessCategory, MonthlyParticipation, YearMonth};
use food_access_rater::{
    config::AnalysisConfig,
    output::{append_record, print_json, print_pretty, write_records},
    parser::{
        AreaFilter, STATEWIDE, open_input, parse_annual_participation, parse_county_indicators,
        parse_food_environment, parse_monthly_participation, parse_period,
    },
    stats::AccessSummary,
};
use std::ffi::OsStr;
use std::path::Path;
use tracing::{error, info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "food_access_rater")]
#[command(about = "Food access and SNAP demand analysis for county operations", long_about = None)]
struct Cli {
    /// JSON analysis config (defaults to $FOOD_ACCESS_CONFIG when set)
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify census tracts as food deserts, swamps or healthy access
    Access {
        /// Food environment index CSV (optionally .gz)
        #[arg(short, long)]
        input: String,

        /// County to keep ("all" keeps every county)
        #[arg(long, default_value = "Contra Costa")]
        county: String,

        /// Geography type to keep ("all" keeps every type)
        #[arg(long, default_value = "CT")]
        geotype: String,

        /// CSV file to write per-area assessments to
        #[arg(short, long, default_value = "assessments.csv")]
        output: String,

        /// Optional: CSV file to append a run summary to
        #[arg(long)]
        summary: Option<String>,

        /// Number of highest-need areas to list (overrides config)
        #[arg(long)]
        top: Option<usize>,
    },
    /// Extract the seasonal month-over-month profile and peak month
    Seasonality {
        /// Monthly participation CSV (optionally .gz)
        #[arg(short, long)]
        input: String,

        /// Per-year weight as YEAR=WEIGHT, repeatable (overrides config)
        #[arg(short, long, value_parser = parse_year_weight)]
        weight: Vec<(i32, f64)>,

        /// CSV file to write per-month stats to
        #[arg(short, long, default_value = "seasonal_profile.csv")]
        output: String,
    },
    /// Flag months with unusually large month-over-month growth
    Spikes {
        /// Monthly participation CSV (optionally .gz)
        #[arg(short, long)]
        input: String,

        /// Z-score above which a change is a spike (overrides config)
        #[arg(short, long)]
        z_threshold: Option<f64>,

        /// CSV file to write spikes to
        #[arg(short, long, default_value = "demand_spikes.csv")]
        output: String,
    },
    /// Track persons per household and its direction
    Households {
        /// Monthly participation CSV (optionally .gz)
        #[arg(short, long)]
        input: String,

        /// CSV file to write the ratio series to
        #[arg(short, long, default_value = "household_complexity.csv")]
        output: String,
    },
    /// Print the year x month participation grid as JSON
    HeatCalendar {
        /// Monthly participation CSV (optionally .gz)
        #[arg(short, long)]
        input: String,
    },
    /// Compare benefit cost growth with participant growth
    Cost {
        /// Monthly participation CSV with a benefit cost column (optionally .gz)
        #[arg(short, long)]
        input: String,

        /// CSV file to write monthly cost per participant to
        #[arg(short, long, default_value = "cost_of_hunger.csv")]
        output: String,
    },
    /// Track the average benefit per person across years
    PurchasingPower {
        /// Annual participation history CSV (optionally .gz)
        #[arg(short, long)]
        input: String,

        /// First year counted as recent (overrides config)
        #[arg(long)]
        recent_from: Option<i32>,

        /// CSV file to write the yearly series to
        #[arg(short, long, default_value = "purchasing_power.csv")]
        output: String,
    },
    /// Correlate demand with earlier unemployment and measure the recession lag
    Drivers {
        /// County indicator CSV (optionally .gz)
        #[arg(short, long)]
        input: String,

        /// County to analyse
        #[arg(long, default_value = STATEWIDE)]
        county: String,

        /// Demand measure to compare with unemployment
        #[arg(long, value_enum, default_value_t = DemandMeasure::Households)]
        demand: DemandMeasure,

        /// Largest lag in months (overrides config)
        #[arg(long)]
        max_lag: Option<u32>,

        /// CSV file to write per-lag correlations to
        #[arg(short, long, default_value = "lag_correlation.csv")]
        output: String,
    },
    /// Show the months around a suspected anomaly
    Anomaly {
        /// Monthly participation CSV (optionally .gz)
        #[arg(short, long)]
        input: String,

        /// Month to centre on, as YYYY-MM
        #[arg(short, long, value_parser = parse_period_arg)]
        month: YearMonth,

        /// Months shown on each side
        #[arg(short, long, default_value_t = 3)]
        radius: u32,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DemandMeasure {
    Households,
    Persons,
}

impl From<DemandMeasure> for Indicator {
    fn from(measure: DemandMeasure) -> Self {
        match measure {
            DemandMeasure::Households => Indicator::Households,
            DemandMeasure::Persons => Indicator::Persons,
        }
    }
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path = std::env::var("LOG_FILE_PATH")
        .unwrap_or_else(|_| "logs/food_access_rater.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("food_access_rater.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    let config_path = cli
        .config
        .or_else(|| std::env::var("FOOD_ACCESS_CONFIG").ok());
    let mut config = AnalysisConfig::load_or_default(config_path.as_deref())?;

    match cli.command {
        Commands::Access {
            input,
            county,
            geotype,
            output,
            summary,
            top,
        } => {
            if let Some(top) = top {
                config.ranking.highest_need_limit = top;
            }
            let filter = AreaFilter {
                county: filter_value(county),
                geotype: filter_value(geotype),
            };
            run_access(&input, &filter, &config, &output, summary.as_deref())?;
        }
        Commands::Seasonality {
            input,
            weight,
            output,
        } => {
            config.seasonality.year_weights.extend(weight);
            run_seasonality(&input, &config, &output)?;
        }
        Commands::Spikes {
            input,
            z_threshold,
            output,
        } => {
            if let Some(z) = z_threshold {
                config.spikes.z_threshold = z;
            }
            run_spikes(&input, &config, &output)?;
        }
        Commands::Households { input, output } => {
            run_households(&input, &output)?;
        }
        Commands::HeatCalendar { input } => {
            let series = load_series(&input)?;
            print_json(&heat_calendar(&series))?;
        }
        Commands::Cost { input, output } => {
            run_cost(&input, &output)?;
        }
        Commands::PurchasingPower {
            input,
            recent_from,
            output,
        } => {
            if let Some(year) = recent_from {
                config.history.recent_from_year = year;
            }
            run_purchasing_power(&input, &config, &output)?;
        }
        Commands::Drivers {
            input,
            county,
            demand,
            max_lag,
            output,
        } => {
            if let Some(lag) = max_lag {
                config.drivers.max_lag = lag;
            }
            run_drivers(&input, &county, demand.into(), &config, &output)?;
        }
        Commands::Anomaly {
            input,
            month,
            radius,
        } => {
            let series = load_series(&input)?;
            let window = anomaly_window(&series, month, radius)?;
            if window.is_empty() {
                warn!(%month, "No data around month");
            }
            for p in &window {
                info!(
                    year = p.year,
                    month = p.month,
                    participants = p.participants,
                    change = p.change,
                    "Anomaly window"
                );
            }
        }
    }

    Ok(())
}

/// Classifies every area, reporting each invalid record before failing.
#[tracing::instrument(skip(filter, config, summary_path), fields(county = ?filter.county))]
fn run_access(
    input: &str,
    filter: &AreaFilter,
    config: &AnalysisConfig,
    output: &str,
    summary_path: Option<&str>,
) -> Result<()> {
    let text = open_input(input)?;
    let areas = parse_food_environment(text.as_bytes(), filter)?;
    info!(areas = areas.len(), "Food environment loaded");

    let mut assessments = Vec::with_capacity(areas.len());
    let mut invalid = 0usize;
    for area in &areas {
        match assess(area, &config.classifier) {
            Ok(a) => assessments.push(a),
            Err(e) => {
                error!(error = %e, "Invalid area record");
                invalid += 1;
            }
        }
    }
    if invalid > 0 {
        bail!("{invalid} of {} area records are invalid", areas.len());
    }

    write_records(output, &assessments)?;
    info!(output, rows = assessments.len(), "Assessments written");

    let mut deserts: Vec<_> = assessments
        .iter()
        .filter(|a| a.category == AccessCategory::Desert)
        .collect();
    deserts.sort_by(|a, b| (&a.region, &a.area_id).cmp(&(&b.region, &b.area_id)));
    for area in &deserts {
        info!(
            area_id = %area.area_id,
            tract = %area.tract_name,
            region = area.region.as_deref().unwrap_or("-"),
            "Food desert"
        );
    }

    for (rank, area) in rank_highest_need(&areas, config.ranking.highest_need_limit)
        .iter()
        .enumerate()
    {
        info!(
            rank = rank + 1,
            tract = %tract_display_name(&area.area_id),
            score = area.healthy_score,
            stores = area.total_retailers,
            "Highest need"
        );
    }

    let summary = AccessSummary::from_assessments(&assessments).with_county(filter.county.as_deref());
    print_pretty(&summary);
    info!(
        total = summary.total_areas,
        deserts = summary.deserts,
        scarce = summary.scarce,
        swamps = summary.swamps,
        healthy = summary.healthy,
        "Access summary"
    );

    if let Some(path) = summary_path {
        append_record(path, &summary)?;
    }

    Ok(())
}

#[tracing::instrument(skip(config))]
fn run_seasonality(input: &str, config: &AnalysisConfig, output: &str) -> Result<()> {
    let series = load_series(input)?;
    let profile = extract_weighted_profile(&series, &config.seasonality.year_weights)?;

    for m in &profile.months {
        info!(
            month = m.month_name,
            mean_change = m.mean_change,
            std_dev = m.std_dev,
            observations = m.observations,
            "Seasonal change"
        );
    }
    for gap in &profile.gaps {
        warn!(month = gap, "No valid transition for month");
    }
    info!(
        peak_month = profile.peak_month_name(),
        peak_change = profile.peak().map(|m| m.mean_change),
        transitions = profile.transitions,
        "Demand peaks in {}",
        profile.peak_month_name()
    );

    write_records(output, &profile.months)?;
    Ok(())
}

#[tracing::instrument(skip(config))]
fn run_spikes(input: &str, config: &AnalysisConfig, output: &str) -> Result<()> {
    let series = load_series(input)?;
    let spikes = detect_spikes(&series, config.spikes.z_threshold)?;

    if spikes.is_empty() {
        info!("No demand spikes detected");
    }
    for s in &spikes {
        info!(year = s.year, month = s.month, change = s.change, z_score = s.z_score, "Demand spike");
    }

    write_records(output, &spikes)?;
    Ok(())
}

#[tracing::instrument]
fn run_households(input: &str, output: &str) -> Result<()> {
    let text = open_input(input)?;
    let records = parse_monthly_participation(&text)?;
    let trend = household_trend(&records)?;

    info!(
        direction = ?trend.direction,
        points = trend.points.len(),
        advice = trend.direction.procurement_advice(),
        "Household complexity trend"
    );

    write_records(output, &trend.points)?;
    Ok(())
}

#[tracing::instrument]
fn run_cost(input: &str, output: &str) -> Result<()> {
    let text = open_input(input)?;
    let records = parse_monthly_participation(&text)?;
    let trend = cost_of_hunger(&records)?;

    info!(
        months = trend.points.len(),
        participant_growth = trend.participant_growth,
        cost_growth = trend.cost_growth,
        cost_per_participant_growth = trend.cost_per_participant_growth,
        cost_outpaces_demand = trend.cost_outpaces_demand(),
        "Cost of hunger"
    );

    write_records(output, &trend.points)?;
    Ok(())
}

#[tracing::instrument(skip(config))]
fn run_purchasing_power(input: &str, config: &AnalysisConfig, output: &str) -> Result<()> {
    let text = open_input(input)?;
    let records = parse_annual_participation(&text)
        .with_context(|| format!("Failed to parse annual participation from '{input}'"))?;
    let power = purchasing_power(&records, config.history.recent_from_year)?;

    info!(
        years = power.points.len(),
        benefit_growth = power.benefit_growth,
        peak_participation_year = power.peak_participation_year,
        recent_volatility = power.recent_volatility,
        "Purchasing power"
    );

    write_records(output, &power.points)?;
    Ok(())
}

#[tracing::instrument(skip(config))]
fn run_drivers(
    input: &str,
    county: &str,
    demand: Indicator,
    config: &AnalysisConfig,
    output: &str,
) -> Result<()> {
    let text = open_input(input)?;
    let records = parse_county_indicators(&text, county)
        .with_context(|| format!("Failed to parse county indicators from '{input}'"))?;
    if records.is_empty() {
        bail!("No indicator rows for county '{county}'");
    }
    info!(months = records.len(), "County indicators loaded");

    let demand = indicator_series(&records, demand);
    let unemployment = indicator_series(&records, Indicator::Unemployment);

    let correlations = lagged_correlation(&demand, &unemployment, config.drivers.max_lag);
    for c in &correlations {
        info!(lag = c.lag, pairs = c.pairs, correlation = c.correlation, "Lagged correlation");
    }
    if let Some(best) = strongest_lag(&correlations) {
        info!(lag = best.lag, correlation = best.correlation, "Strongest lag");
    }
    write_records(output, &correlations)?;

    let years = config.drivers.peak_from_year..=config.drivers.peak_to_year;
    match recession_lag(&demand, &unemployment, config.drivers.smoothing_window, years) {
        Ok(lag) => info!(
            driver_peak = %lag.driver_peak,
            demand_peak = %lag.demand_peak,
            lag_months = lag.lag_months,
            "Demand peaks {} months after unemployment",
            lag.lag_months
        ),
        Err(e) => warn!(error = %e, "No recession lag in the configured years"),
    }

    Ok(())
}

fn load_series(input: &str) -> Result<Vec<MonthlyParticipation>> {
    let text = open_input(input)?;
    let records = parse_monthly_participation(&text)
        .with_context(|| format!("Failed to parse monthly participation from '{input}'"))?;
    info!(months = records.len(), "Monthly participation loaded");
    Ok(records.iter().map(|r| r.participation()).collect())
}

fn filter_value(value: String) -> Option<String> {
    if value.eq_ignore_ascii_case("all") {
        None
    } else {
        Some(value)
    }
}

fn parse_year_weight(s: &str) -> Result<(i32, f64)> {
    let (year, weight) = s
        .split_once('=')
        .ok_or_else(|| anyhow!("expected YEAR=WEIGHT, got '{s}'"))?;
    Ok((year.trim().parse()?, weight.trim().parse()?))
}

fn parse_period_arg(s: &str) -> Result<YearMonth> {
    parse_period(s).ok_or_else(|| anyhow!("expected YYYY-MM, got '{s}'"))
}
