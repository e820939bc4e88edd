// SPDX-License-Identifier: MIT
//! Row types for the task store tables.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct ProjectRow {
    pub id: i64,
    pub title: String,
    pub created_at: String,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct UserRow {
    pub id: i64,
    pub email: String,
    pub username: String,
    pub is_superuser: bool,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct TaskRow {
    pub id: i64,
    pub project_id: i64,
    /// JSON object text — the task's open-ended attribute map.
    pub data: String,
    /// JSON object text.
    pub meta: String,
    pub is_labeled: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct PredictionRow {
    pub id: i64,
    pub task_id: i64,
    pub model_version: Option<String>,
    pub score: Option<f64>,
    /// JSON array text.
    pub result: String,
    pub created_at: String,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct AnnotationRow {
    pub id: i64,
    pub task_id: i64,
    pub completed_by: Option<i64>,
    /// JSON array text.
    pub result: String,
    pub was_cancelled: bool,
    pub created_at: String,
    pub updated_at: String,
}
