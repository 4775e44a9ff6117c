//! Lapscope - race session analysis over lap, results and telemetry tables
//!
//! Lapscope turns the tables of a motorsport session into the data behind a race
//! dashboard through a deterministic pipeline: table ingestion → timebase
//! normalization → lap windowing → telemetry segmentation, alongside the race
//! summary and lap-time feature importance analyses.
//!
//! ## Modules
//!
//! - **Lap telemetry**: lap windows and per-lap telemetry slices
//! - **Race summary**: places gained or lost between grid and classification
//! - **Feature importance**: which lap attributes drive lap time

pub mod config;
pub mod encoder;
pub mod error;
pub mod importance;
pub mod pipeline;
pub mod segmenter;
pub mod summary;
pub mod tables;
pub mod timebase;
pub mod types;
pub mod views;
pub mod windows;

pub use config::{AnalysisConfig, BoundaryPolicy, ImportanceConfig, MissingTargetPolicy};
pub use encoder::{Report, ReportEncoder, ReportKind};
pub use error::{AnalysisError, ErrorKind};
pub use importance::{FeatureImportancePipeline, FittedLapTimeModel};
pub use pipeline::{
    laps_to_importance_json, laps_to_windows_json, results_to_summary_json, SessionAnalyzer,
    SessionViews,
};
pub use segmenter::TelemetrySegmenter;
pub use summary::RaceSummaryCalculator;
pub use tables::{TableFormat, TableReader, ValidationReport};
pub use timebase::Normalizer;
pub use windows::LapWindowIndexer;

/// Lapscope version embedded in all reports
pub const LAPSCOPE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for reports
pub const PRODUCER_NAME: &str = "lapscope";
