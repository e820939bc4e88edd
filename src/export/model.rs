// SPDX-License-Identifier: MIT
//! Wire types for the export operation.
//!
//! Field names follow the export contract: `total`, `tasks`, the
//! pagination block when paging was requested, and per-annotation
//! `completed_by_info` identity snapshots.

use serde::{Deserialize, Serialize};

pub const DEFAULT_DATE_FIELD: &str = "source_created_at";

fn default_date_field() -> String {
    DEFAULT_DATE_FIELD.to_string()
}

/// One export request. All filters are optional except `project_id`;
/// absent filters are no-ops, never default-to-all-zero.
#[derive(Debug, Clone, Deserialize)]
pub struct ExportRequest {
    pub project_id: i64,
    /// Inclusive lower bound over the date field, ISO 8601 or
    /// `YYYY-MM-DD HH:MM:SS`. Naive values are read as UTC.
    pub date_from: Option<String>,
    /// Inclusive upper bound, same formats as `date_from`.
    pub date_to: Option<String>,
    /// Name of the date field inside the task `data` map.
    #[serde(default = "default_date_field")]
    pub date_field_name: String,
    pub model_version: Option<String>,
    pub confirmed_by_user_id: Option<i64>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

impl ExportRequest {
    /// Minimal request: project scope only.
    pub fn for_project(project_id: i64) -> Self {
        Self {
            project_id,
            date_from: None,
            date_to: None,
            date_field_name: default_date_field(),
            model_version: None,
            confirmed_by_user_id: None,
            page: None,
            page_size: None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ExportResponse {
    /// Matching task count before pagination.
    pub total: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_size: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_pages: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_next: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_previous: Option<bool>,
    pub tasks: Vec<TaskExport>,
}

#[derive(Debug, Serialize)]
pub struct TaskExport {
    pub id: i64,
    pub project_id: i64,
    pub data: serde_json::Value,
    pub meta: serde_json::Value,
    pub created_at: String,
    pub updated_at: String,
    pub is_labeled: bool,
    pub annotations: Vec<AnnotationExport>,
    pub predictions: Vec<PredictionExport>,
}

#[derive(Debug, Serialize)]
pub struct AnnotationExport {
    pub id: i64,
    pub completed_by: Option<i64>,
    /// Denormalized completer identity, present when a completer exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_by_info: Option<CompletedByInfo>,
    pub result: serde_json::Value,
    pub was_cancelled: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Serialize)]
pub struct PredictionExport {
    pub id: i64,
    pub model_version: Option<String>,
    pub score: Option<f64>,
    pub result: serde_json::Value,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompletedByInfo {
    pub id: i64,
    pub email: String,
    pub username: String,
    pub is_superuser: bool,
}
