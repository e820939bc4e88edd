// SPDX-License-Identifier: MIT
//! The filtered task query engine.
//!
//! One export call is a bounded set of reads: resolve the project,
//! fetch the project-scoped tasks with the SQL-expressible predicates,
//! apply the date-range filter after instant normalization, slice the
//! requested page, then prefetch the window's children in batched
//! queries. Strictly read-only; concurrent calls are independent.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::storage::model::{AnnotationRow, PredictionRow, TaskRow, UserRow};
use crate::storage::with_timeout;

use super::model::{
    AnnotationExport, CompletedByInfo, ExportRequest, ExportResponse, PredictionExport, TaskExport,
};
use super::timestamp::parse_instant;
use super::validate::{validate, ExportError, Paging, ValidatedRequest};

#[derive(Clone)]
pub struct ExportEngine {
    pool: SqlitePool,
}

impl ExportEngine {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Run one export request. Validation failures short-circuit before
    /// any query executes.
    pub async fn export(&self, req: &ExportRequest) -> Result<ExportResponse, ExportError> {
        let v = validate(req)?;

        let pool = self.pool.clone();
        let project_id = v.project_id;
        let project: Option<(i64,)> = with_timeout(async move {
            Ok(sqlx::query_as("SELECT id FROM projects WHERE id = ?")
                .bind(project_id)
                .fetch_optional(&pool)
                .await?)
        })
        .await
        .map_err(ExportError::Store)?;
        if project.is_none() {
            return Err(ExportError::ProjectNotFound(v.project_id));
        }

        let mut tasks = self.fetch_candidate_tasks(&v).await?;

        if v.date_from.is_some() || v.date_to.is_some() {
            // Absent, non-string, or unparsable field values exclude the
            // task from date-bounded queries.
            tasks.retain(|t| {
                date_field_instant(&t.data, &v.date_field_name)
                    .map(|at| within_bounds(at, v.date_from, v.date_to))
                    .unwrap_or(false)
            });
        }

        let total = tasks.len() as i64;
        let (window, paging) = page_window(tasks, v.paging);
        debug!(
            project_id = v.project_id,
            total,
            window = window.len(),
            "export query resolved"
        );

        let tasks = self.expand_tasks(window).await?;

        let mut response = ExportResponse {
            total,
            page: None,
            page_size: None,
            total_pages: None,
            has_next: None,
            has_previous: None,
            tasks,
        };
        if let Some(p) = paging {
            response.page = Some(p.page);
            response.page_size = Some(p.page_size);
            // ceil(total / page_size)
            response.total_pages = Some((total + p.page_size - 1) / p.page_size);
            // Saturating: a page number near i64::MAX is simply past the
            // end, never an overflow.
            response.has_next = Some(p.page.saturating_mul(p.page_size) < total);
            response.has_previous = Some(p.page > 1);
        }
        Ok(response)
    }

    /// Project-scoped fetch with the SQL-expressible narrowing
    /// predicates. The SQL text is assembled from fixed fragments only;
    /// every caller value travels as a bound parameter.
    async fn fetch_candidate_tasks(
        &self,
        v: &ValidatedRequest,
    ) -> Result<Vec<TaskRow>, ExportError> {
        let mut sql = String::from("SELECT * FROM tasks WHERE project_id = ?");
        if v.model_version.is_some() {
            sql.push_str(
                " AND EXISTS (SELECT 1 FROM predictions p \
                 WHERE p.task_id = tasks.id AND p.model_version = ?)",
            );
        }
        if v.confirmed_by_user_id.is_some() {
            // Only an elevated completer counts as a confirmer.
            sql.push_str(
                " AND EXISTS (SELECT 1 FROM annotations a \
                 JOIN users u ON u.id = a.completed_by \
                 WHERE a.task_id = tasks.id AND a.completed_by = ? AND u.is_superuser = 1)",
            );
        }
        // Newest first; id breaks created_at ties so pagination stays
        // deterministic across calls.
        sql.push_str(" ORDER BY created_at DESC, id DESC");

        let mut query = sqlx::query_as::<_, TaskRow>(&sql).bind(v.project_id);
        if let Some(mv) = &v.model_version {
            query = query.bind(mv.as_str());
        }
        if let Some(uid) = v.confirmed_by_user_id {
            query = query.bind(uid);
        }

        let pool = self.pool.clone();
        with_timeout(async move { Ok(query.fetch_all(&pool).await?) })
            .await
            .map_err(ExportError::Store)
    }

    /// Attach each window task's full prediction and annotation sets and
    /// the completer identity snapshots. Children are fetched for the
    /// window only, in one batched query per table.
    async fn expand_tasks(&self, window: Vec<TaskRow>) -> Result<Vec<TaskExport>, ExportError> {
        let ids: Vec<i64> = window.iter().map(|t| t.id).collect();
        let mut predictions = self.fetch_predictions(&ids).await?;
        let mut annotations = self.fetch_annotations(&ids).await?;

        let completer_ids: Vec<i64> = {
            let mut ids: Vec<i64> = annotations
                .values()
                .flatten()
                .filter_map(|a| a.completed_by)
                .collect();
            ids.sort_unstable();
            ids.dedup();
            ids
        };
        let users = self.fetch_users(&completer_ids).await?;

        Ok(window
            .into_iter()
            .map(|t| {
                let preds = predictions.remove(&t.id).unwrap_or_default();
                let anns = annotations.remove(&t.id).unwrap_or_default();
                assemble_task(t, preds, anns, &users)
            })
            .collect())
    }

    async fn fetch_predictions(
        &self,
        task_ids: &[i64],
    ) -> Result<HashMap<i64, Vec<PredictionRow>>, ExportError> {
        if task_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let sql = format!(
            "SELECT * FROM predictions WHERE task_id IN ({}) \
             ORDER BY created_at DESC, id DESC",
            placeholders(task_ids.len())
        );
        let mut query = sqlx::query_as::<_, PredictionRow>(&sql);
        for id in task_ids {
            query = query.bind(*id);
        }
        let pool = self.pool.clone();
        let rows = with_timeout(async move { Ok(query.fetch_all(&pool).await?) })
            .await
            .map_err(ExportError::Store)?;
        Ok(group_by(rows, |r| r.task_id))
    }

    async fn fetch_annotations(
        &self,
        task_ids: &[i64],
    ) -> Result<HashMap<i64, Vec<AnnotationRow>>, ExportError> {
        if task_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let sql = format!(
            "SELECT * FROM annotations WHERE task_id IN ({}) \
             ORDER BY created_at DESC, id DESC",
            placeholders(task_ids.len())
        );
        let mut query = sqlx::query_as::<_, AnnotationRow>(&sql);
        for id in task_ids {
            query = query.bind(*id);
        }
        let pool = self.pool.clone();
        let rows = with_timeout(async move { Ok(query.fetch_all(&pool).await?) })
            .await
            .map_err(ExportError::Store)?;
        Ok(group_by(rows, |r| r.task_id))
    }

    /// Side-table identity lookup keyed by user id — a read-time join,
    /// never a stored snapshot.
    async fn fetch_users(&self, user_ids: &[i64]) -> Result<HashMap<i64, UserRow>, ExportError> {
        if user_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let sql = format!(
            "SELECT * FROM users WHERE id IN ({})",
            placeholders(user_ids.len())
        );
        let mut query = sqlx::query_as::<_, UserRow>(&sql);
        for id in user_ids {
            query = query.bind(*id);
        }
        let pool = self.pool.clone();
        let rows = with_timeout(async move { Ok(query.fetch_all(&pool).await?) })
            .await
            .map_err(ExportError::Store)?;
        Ok(rows.into_iter().map(|u| (u.id, u)).collect())
    }
}

/// `?,?,?` list for an IN clause. The count comes from our own id
/// vector, never from caller text.
fn placeholders(n: usize) -> String {
    vec!["?"; n].join(",")
}

fn group_by<T, F: Fn(&T) -> i64>(rows: Vec<T>, key: F) -> HashMap<i64, Vec<T>> {
    let mut map: HashMap<i64, Vec<T>> = HashMap::new();
    for row in rows {
        map.entry(key(&row)).or_default().push(row);
    }
    map
}

/// Read the named field out of a task's `data` JSON and normalize it to
/// an instant. `None` when the field is missing, not a string, or not a
/// recognized timestamp.
fn date_field_instant(data: &str, field: &str) -> Option<DateTime<Utc>> {
    let map: serde_json::Value = serde_json::from_str(data).ok()?;
    parse_instant(map.get(field)?.as_str()?)
}

fn within_bounds(
    at: DateTime<Utc>,
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
) -> bool {
    // Both bounds are inclusive.
    from.map_or(true, |f| at >= f) && to.map_or(true, |t| at <= t)
}

/// Slice the `[(page-1)*page_size, page*page_size)` window, or pass the
/// full set through when no paging was requested.
fn page_window(tasks: Vec<TaskRow>, paging: Option<Paging>) -> (Vec<TaskRow>, Option<Paging>) {
    match paging {
        None => (tasks, None),
        Some(p) => {
            // Saturating: an out-of-range page yields an empty window
            // rather than overflowing the offset arithmetic.
            let start = (p.page - 1).saturating_mul(p.page_size);
            let window = tasks
                .into_iter()
                .skip(usize::try_from(start).unwrap_or(usize::MAX))
                .take(p.page_size as usize)
                .collect();
            (window, Some(p))
        }
    }
}

fn assemble_task(
    task: TaskRow,
    predictions: Vec<PredictionRow>,
    annotations: Vec<AnnotationRow>,
    users: &HashMap<i64, UserRow>,
) -> TaskExport {
    TaskExport {
        id: task.id,
        project_id: task.project_id,
        data: parse_json_or(&task.data, serde_json::json!({})),
        meta: parse_json_or(&task.meta, serde_json::json!({})),
        created_at: task.created_at,
        updated_at: task.updated_at,
        is_labeled: task.is_labeled,
        annotations: annotations
            .into_iter()
            .map(|a| {
                let completed_by_info = a
                    .completed_by
                    .and_then(|uid| users.get(&uid))
                    .map(|u| CompletedByInfo {
                        id: u.id,
                        email: u.email.clone(),
                        username: u.username.clone(),
                        is_superuser: u.is_superuser,
                    });
                AnnotationExport {
                    id: a.id,
                    completed_by: a.completed_by,
                    completed_by_info,
                    result: parse_json_or(&a.result, serde_json::json!([])),
                    was_cancelled: a.was_cancelled,
                    created_at: a.created_at,
                    updated_at: a.updated_at,
                }
            })
            .collect(),
        predictions: predictions
            .into_iter()
            .map(|p| PredictionExport {
                id: p.id,
                model_version: p.model_version,
                score: p.score,
                result: parse_json_or(&p.result, serde_json::json!([])),
                created_at: p.created_at,
            })
            .collect(),
    }
}

fn parse_json_or(raw: &str, fallback: serde_json::Value) -> serde_json::Value {
    serde_json::from_str(raw).unwrap_or(fallback)
}
