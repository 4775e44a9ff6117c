//! Lapscope CLI - Command-line interface for Lapscope
//!
//! Commands:
//! - summary: Places gained or lost per driver
//! - windows: Lap windows of one driver
//! - telemetry: Telemetry of one lap
//! - importance: Lap-time feature importance
//! - views: Driver selector, lap options and strategy views
//! - validate: Check a table without running an analysis

use clap::{ArgGroup, Parser, Subcommand, ValueEnum};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use lapscope::tables::{validate_laps, validate_results, validate_telemetry};
use lapscope::types::{LapRecord, ResultRecord, TelemetrySample};
use lapscope::{
    AnalysisConfig, AnalysisError, BoundaryPolicy, ErrorKind, Report, ReportEncoder, ReportKind,
    SessionAnalyzer, TableFormat, TableReader, ValidationReport, LAPSCOPE_VERSION,
};

/// Lapscope - race session analysis over lap, results and telemetry tables
#[derive(Parser)]
#[command(name = "lapscope")]
#[command(version = LAPSCOPE_VERSION)]
#[command(about = "Analyse race session tables", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Analysis configuration (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Input table format
    #[arg(long, global = true, default_value = "json")]
    input_format: InputFormat,

    /// Output format
    #[arg(long, global = true, default_value = "json-pretty")]
    output_format: OutputFormat,

    /// Output file path (use - for stdout)
    #[arg(short, long, global = true, default_value = "-")]
    output: PathBuf,

    /// Session label recorded in the report
    #[arg(long, global = true)]
    session: Option<String>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Places gained or lost between grid and classification
    Summary {
        /// Results table (use - for stdin)
        #[arg(long)]
        results: PathBuf,
    },

    /// Lap windows of one driver
    Windows {
        /// Lap table (use - for stdin)
        #[arg(long)]
        laps: PathBuf,

        /// Driver identifier
        #[arg(long)]
        driver: String,
    },

    /// Telemetry of one lap
    Telemetry {
        /// Lap table
        #[arg(long)]
        laps: PathBuf,

        /// Telemetry table
        #[arg(long)]
        telemetry: PathBuf,

        /// Driver identifier
        #[arg(long)]
        driver: String,

        /// Lap number
        #[arg(long)]
        lap: u32,

        /// Overrides the configured boundary policy
        #[arg(long, value_enum)]
        boundary: Option<BoundaryArg>,
    },

    /// Rank lap attributes by their importance for lap time
    Importance {
        /// Lap table (use - for stdin)
        #[arg(long)]
        laps: PathBuf,
    },

    /// Driver selector, lap options, position evolution and compound stints
    Views {
        /// Lap table (use - for stdin)
        #[arg(long)]
        laps: PathBuf,

        /// Driver for the per-driver views (default selection when omitted)
        #[arg(long)]
        driver: Option<String>,
    },

    /// Check a table without running an analysis
    #[command(group(ArgGroup::new("table").required(true).args(["laps", "results", "telemetry"])))]
    Validate {
        /// Lap table
        #[arg(long)]
        laps: Option<PathBuf>,

        /// Results table
        #[arg(long)]
        results: Option<PathBuf>,

        /// Telemetry table
        #[arg(long)]
        telemetry: Option<PathBuf>,
    },
}

#[derive(Clone, ValueEnum)]
enum InputFormat {
    /// Newline-delimited JSON (one row per line)
    Ndjson,
    /// JSON array of rows
    Json,
}

impl From<InputFormat> for TableFormat {
    fn from(format: InputFormat) -> Self {
        match format {
            InputFormat::Ndjson => TableFormat::Ndjson,
            InputFormat::Json => TableFormat::Json,
        }
    }
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// One compact report per line
    Ndjson,
    /// Compact JSON
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

#[derive(Clone, Copy, ValueEnum)]
enum BoundaryArg {
    /// A sample on a lap boundary belongs to both laps
    InclusiveInclusive,
    /// A sample on a lap boundary belongs to the later lap only
    HalfOpen,
}

impl From<BoundaryArg> for BoundaryPolicy {
    fn from(arg: BoundaryArg) -> Self {
        match arg {
            BoundaryArg::InclusiveInclusive => BoundaryPolicy::InclusiveInclusive,
            BoundaryArg::HalfOpen => BoundaryPolicy::HalfOpen,
        }
    }
}

/// Shared state of one invocation
struct Context {
    config: AnalysisConfig,
    input_format: TableFormat,
    output_format: OutputFormat,
    output: PathBuf,
    encoder: ReportEncoder,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn run(cli: Cli) -> Result<(), LapscopeCliError> {
    let config = match &cli.config {
        Some(path) => AnalysisConfig::from_json(&read_input(path)?)?,
        None => AnalysisConfig::default(),
    };
    let encoder = match cli.session {
        Some(session) => ReportEncoder::new().for_session(session),
        None => ReportEncoder::new(),
    };
    let ctx = Context {
        config,
        input_format: cli.input_format.into(),
        output_format: cli.output_format,
        output: cli.output,
        encoder,
    };

    match cli.command {
        Commands::Summary { results } => cmd_summary(&ctx, &results),
        Commands::Windows { laps, driver } => cmd_windows(&ctx, &laps, &driver),
        Commands::Telemetry {
            laps,
            telemetry,
            driver,
            lap,
            boundary,
        } => cmd_telemetry(&ctx, &laps, &telemetry, &driver, lap, boundary),
        Commands::Importance { laps } => cmd_importance(&ctx, &laps),
        Commands::Views { laps, driver } => cmd_views(&ctx, &laps, driver.as_deref()),
        Commands::Validate {
            laps,
            results,
            telemetry,
        } => cmd_validate(&ctx, laps, results, telemetry),
    }
}

fn cmd_summary(ctx: &Context, results: &Path) -> Result<(), LapscopeCliError> {
    let results: Vec<ResultRecord> = read_table(ctx, results)?;
    if results.is_empty() {
        return Err(LapscopeCliError::NoRows("results"));
    }

    let analyzer = SessionAnalyzer::new(ctx.config.clone())?.with_results(results);
    write_report(ctx, &ctx.encoder.encode(ReportKind::Summary, analyzer.race_summary()))
}

fn cmd_windows(ctx: &Context, laps: &Path, driver: &str) -> Result<(), LapscopeCliError> {
    let analyzer = load_laps(ctx, laps, ctx.config.clone())?;
    let windows = analyzer.driver_windows(driver)?;
    write_report(ctx, &ctx.encoder.encode(ReportKind::LapWindows, windows))
}

fn cmd_telemetry(
    ctx: &Context,
    laps: &Path,
    telemetry: &Path,
    driver: &str,
    lap: u32,
    boundary: Option<BoundaryArg>,
) -> Result<(), LapscopeCliError> {
    let mut config = ctx.config.clone();
    if let Some(boundary) = boundary {
        config.boundary_policy = boundary.into();
    }

    let analyzer = load_laps(ctx, laps, config)?;
    let samples: Vec<TelemetrySample> = read_table(ctx, telemetry)?;
    let segment = analyzer.lap_telemetry(driver, lap, &samples)?;

    if segment.is_empty() {
        eprintln!(
            "{}",
            serde_json::to_string(&CliNotice {
                status: "EMPTY_RESULT".to_string(),
                message: format!("No telemetry inside lap {lap} of driver {driver}"),
            })?
        );
    }

    write_report(ctx, &ctx.encoder.encode(ReportKind::SegmentedLap, segment))
}

fn cmd_importance(ctx: &Context, laps: &Path) -> Result<(), LapscopeCliError> {
    let analyzer = load_laps(ctx, laps, ctx.config.clone())?;
    let report = analyzer.feature_importance()?;
    write_report(ctx, &ctx.encoder.encode(ReportKind::FeatureImportance, report))
}

fn cmd_views(ctx: &Context, laps: &Path, driver: Option<&str>) -> Result<(), LapscopeCliError> {
    let analyzer = load_laps(ctx, laps, ctx.config.clone())?;
    let views = analyzer.session_views(driver)?;
    write_report(ctx, &ctx.encoder.encode(ReportKind::SessionViews, views))
}

fn cmd_validate(
    ctx: &Context,
    laps: Option<PathBuf>,
    results: Option<PathBuf>,
    telemetry: Option<PathBuf>,
) -> Result<(), LapscopeCliError> {
    let report: ValidationReport = if let Some(path) = laps {
        validate_laps(&read_table::<LapRecord>(ctx, &path)?)
    } else if let Some(path) = results {
        validate_results(&read_table::<ResultRecord>(ctx, &path)?)
    } else if let Some(path) = telemetry {
        validate_telemetry(&read_table::<TelemetrySample>(ctx, &path)?)
    } else {
        return Err(LapscopeCliError::NoRows("validation input"));
    };

    let issues = report.issues.len();
    write_report(ctx, &ctx.encoder.encode(ReportKind::Validation, report))?;

    if issues > 0 {
        Err(LapscopeCliError::ValidationFailed(issues))
    } else {
        Ok(())
    }
}

// Helper functions

fn read_input(path: &Path) -> Result<String, LapscopeCliError> {
    if path.to_string_lossy() == "-" {
        if atty::is(atty::Stream::Stdin) {
            tracing::warn!("reading table from an interactive terminal; end input with Ctrl-D");
        }
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(path)?)
    }
}

fn read_table<T: DeserializeOwned>(ctx: &Context, path: &Path) -> Result<Vec<T>, LapscopeCliError> {
    let data = read_input(path)?;
    Ok(TableReader::parse(&data, ctx.input_format)?)
}

fn load_laps(
    ctx: &Context,
    path: &Path,
    config: AnalysisConfig,
) -> Result<SessionAnalyzer, LapscopeCliError> {
    let laps: Vec<LapRecord> = read_table(ctx, path)?;
    if laps.is_empty() {
        return Err(LapscopeCliError::NoRows("laps"));
    }
    Ok(SessionAnalyzer::new(config)?.with_laps(&laps)?)
}

fn format_output<T: Serialize>(
    report: &Report<T>,
    format: &OutputFormat,
) -> Result<String, LapscopeCliError> {
    match format {
        OutputFormat::Ndjson => Ok(serde_json::to_string(report)? + "\n"),
        OutputFormat::Json => Ok(serde_json::to_string(report)?),
        OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(report)? + "\n"),
    }
}

fn write_report<T: Serialize>(ctx: &Context, report: &Report<T>) -> Result<(), LapscopeCliError> {
    let output_data = format_output(report, &ctx.output_format)?;

    if ctx.output.to_string_lossy() == "-" {
        print!("{}", output_data);
    } else {
        fs::write(&ctx.output, output_data)?;
    }
    Ok(())
}

// Error types

enum LapscopeCliError {
    Io(io::Error),
    Analysis(AnalysisError),
    Json(serde_json::Error),
    NoRows(&'static str),
    ValidationFailed(usize),
}

impl From<io::Error> for LapscopeCliError {
    fn from(e: io::Error) -> Self {
        LapscopeCliError::Io(e)
    }
}

impl From<AnalysisError> for LapscopeCliError {
    fn from(e: AnalysisError) -> Self {
        LapscopeCliError::Analysis(e)
    }
}

impl From<serde_json::Error> for LapscopeCliError {
    fn from(e: serde_json::Error) -> Self {
        LapscopeCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

#[derive(serde::Serialize)]
struct CliNotice {
    status: String,
    message: String,
}

impl From<LapscopeCliError> for CliError {
    fn from(e: LapscopeCliError) -> Self {
        match e {
            LapscopeCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            LapscopeCliError::Analysis(e) => {
                let (code, hint) = match e.kind() {
                    ErrorKind::MalformedInput => (
                        "MALFORMED_INPUT",
                        "Run 'lapscope validate' on the table for details",
                    ),
                    ErrorKind::NotFound => (
                        "NOT_FOUND",
                        "Run 'lapscope views' to list drivers and laps",
                    ),
                    ErrorKind::InsufficientData => (
                        "INSUFFICIENT_DATA",
                        "The model needs at least two laps with a recorded lap time",
                    ),
                    ErrorKind::ModelFit => ("MODEL_FIT_FAILED", "Check the lap table for extreme values"),
                    ErrorKind::Config => ("INVALID_CONFIG", "Check the --config file"),
                };
                CliError {
                    code: code.to_string(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            LapscopeCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            LapscopeCliError::NoRows(table) => CliError {
                code: "NO_ROWS".to_string(),
                message: format!("No rows found in {}", table),
                hint: Some("Ensure input file is not empty".to_string()),
            },
            LapscopeCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} validation issues", count),
                hint: Some("Fix validation errors and retry".to_string()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_validation_failure_counts_issues() {
        let err = CliError::from(LapscopeCliError::ValidationFailed(3));
        assert_eq!(err.code, "VALIDATION_FAILED");
        assert_eq!(err.message, "3 validation issues");
    }

    #[test]
    fn test_analysis_error_codes() {
        let err = CliError::from(LapscopeCliError::Analysis(AnalysisError::InsufficientData {
            required: 2,
            available: 1,
        }));
        assert_eq!(err.code, "INSUFFICIENT_DATA");
    }
}
