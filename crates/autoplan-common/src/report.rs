//! Execution results and the final report document.

use crate::failure::FailureMetadata;
use crate::plan::DataRow;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowStatus {
    Success,
    Partial,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Success,
    Partial,
    Failed,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionResult {
    #[serde(rename = "type")]
    pub action_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub skipped: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_metadata: Option<FailureMetadata>,
}

impl ActionResult {
    pub fn succeeded(action_type: &str, target: Option<&str>) -> Self {
        Self {
            action_type: action_type.to_string(),
            target: target.map(str::to_string),
            success: true,
            error: None,
            skipped: false,
            reason: None,
            failure_metadata: None,
        }
    }

    /// A skipped action counts as successful; `reason` says why nothing happened.
    pub fn skipped(action_type: &str, target: Option<&str>, reason: impl Into<String>) -> Self {
        Self {
            skipped: true,
            reason: Some(reason.into()),
            ..Self::succeeded(action_type, target)
        }
    }

    pub fn failed(
        action_type: &str,
        target: Option<&str>,
        error: impl Into<String>,
        metadata: FailureMetadata,
    ) -> Self {
        Self {
            action_type: action_type.to_string(),
            target: target.map(str::to_string),
            success: false,
            error: Some(error.into()),
            skipped: false,
            reason: None,
            failure_metadata: Some(metadata),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowExecutionResult {
    pub row_index: usize,
    pub status: RowStatus,
    pub data: DataRow,
    pub actions: Vec<ActionResult>,
    #[serde(default)]
    pub warnings: Vec<String>,
    /// Wall time in milliseconds.
    pub duration: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_metadata: Option<FailureMetadata>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub total: usize,
    pub success: usize,
    pub failed: usize,
    pub partial: usize,
}

impl Summary {
    pub fn tally(results: &[RowExecutionResult]) -> Self {
        results.iter().fold(
            Summary {
                total: results.len(),
                ..Summary::default()
            },
            |mut acc, r| {
                match r.status {
                    RowStatus::Success => acc.success += 1,
                    RowStatus::Failed => acc.failed += 1,
                    RowStatus::Partial => acc.partial += 1,
                }
                acc
            },
        )
    }

    /// Overall status for a run that completed without an uncaught error.
    pub fn status(&self) -> ReportStatus {
        if self.failed == 0 {
            ReportStatus::Success
        } else if self.success == 0 {
            ReportStatus::Failed
        } else {
            ReportStatus::Partial
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionReport {
    pub status: ReportStatus,
    pub summary: Summary,
    pub results: Vec<RowExecutionResult>,
    /// Wall time in milliseconds.
    pub duration: u64,
    pub safe_run: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl ExecutionReport {
    /// Builds the report once the run is over. A run-level `error` forces
    /// `status: error` regardless of the rows collected so far.
    pub fn assemble(
        results: Vec<RowExecutionResult>,
        safe_run: bool,
        started_at: DateTime<Utc>,
        error: Option<String>,
    ) -> Self {
        let summary = Summary::tally(&results);
        let status = if error.is_some() {
            ReportStatus::Error
        } else {
            summary.status()
        };
        let finished_at = Utc::now();
        let duration = (finished_at - started_at).num_milliseconds().max(0) as u64;

        Self {
            status,
            summary,
            results,
            duration,
            safe_run,
            error,
            started_at,
            finished_at,
        }
    }

    /// Every failure record in the report, row-level first, then action-level
    /// records not already attached to their row.
    pub fn failures(&self) -> Vec<&FailureMetadata> {
        let mut out: Vec<&FailureMetadata> = Vec::new();
        for row in &self.results {
            if let Some(meta) = &row.failure_metadata {
                out.push(meta);
            }
            for action in &row.actions {
                if let Some(meta) = &action.failure_metadata
                    && !out.iter().any(|m| m.id == meta.id)
                {
                    out.push(meta);
                }
            }
        }
        out
    }
}
