//! Report encoding
//!
//! This module wraps output tables into a self-describing JSON envelope that
//! records which producer computed them, for which session, and when.

use crate::error::AnalysisError;
use crate::{LAPSCOPE_VERSION, PRODUCER_NAME};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What a report's rows contain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    Summary,
    LapWindows,
    SegmentedLap,
    FeatureImportance,
    SessionViews,
    Validation,
}

/// Producer metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Producer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

/// Envelope around one output table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report<T> {
    pub producer: Producer,
    /// Free-form session label supplied by the caller (e.g. "2023 Monza R")
    pub session: Option<String>,
    /// RFC 3339 timestamp of when the report was computed
    pub computed_at_utc: String,
    pub kind: ReportKind,
    pub rows: T,
}

/// Encoder for report envelopes
pub struct ReportEncoder {
    instance_id: String,
    session: Option<String>,
}

impl Default for ReportEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportEncoder {
    /// Create a new encoder with a unique instance ID
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
            session: None,
        }
    }

    /// Create an encoder with a specific instance ID
    pub fn with_instance_id(instance_id: String) -> Self {
        Self {
            instance_id,
            session: None,
        }
    }

    /// Label every report from this encoder with a session
    pub fn for_session(mut self, session: impl Into<String>) -> Self {
        self.session = Some(session.into());
        self
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    pub fn encode<T: Serialize>(&self, kind: ReportKind, rows: T) -> Report<T> {
        Report {
            producer: Producer {
                name: PRODUCER_NAME.to_string(),
                version: LAPSCOPE_VERSION.to_string(),
                instance_id: self.instance_id.clone(),
            },
            session: self.session.clone(),
            computed_at_utc: Utc::now().to_rfc3339(),
            kind,
            rows,
        }
    }

    /// Encode to a pretty JSON string
    pub fn encode_to_json<T: Serialize>(
        &self,
        kind: ReportKind,
        rows: T,
    ) -> Result<String, AnalysisError> {
        let report = self.encode(kind, rows);
        serde_json::to_string_pretty(&report).map_err(AnalysisError::JsonError)
    }
}
