// SPDX-License-Identifier: MIT
//! SQLite task store: pool lifecycle, migrations, and the write surface
//! used by the seeder and tests. The export engine only reads.

pub mod model;
pub mod seed;

use anyhow::{Context as _, Result};
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteConnectOptions, ConnectOptions, SqlitePool};
use std::{path::Path, str::FromStr};

use model::{AnnotationRow, PredictionRow, ProjectRow, TaskRow, UserRow};

/// Default timeout for individual SQLite queries.
/// Prevents hung queries from blocking a caller indefinitely.
const QUERY_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

/// Execute a future with the standard query timeout.
/// Returns an error if the operation takes longer than `QUERY_TIMEOUT`.
pub(crate) async fn with_timeout<T>(
    fut: impl std::future::Future<Output = Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(QUERY_TIMEOUT, fut).await {
        Ok(result) => result,
        Err(_) => Err(anyhow::anyhow!(
            "database query timed out after {}s",
            QUERY_TIMEOUT.as_secs()
        )),
    }
}

#[derive(Clone)]
pub struct Storage {
    pool: SqlitePool,
}

impl Storage {
    /// Open (or create) the task store under `data_dir` and bring the
    /// schema up to date.
    pub async fn new(data_dir: &Path, db_file: &str) -> Result<Self> {
        Self::new_with_slow_query(data_dir, db_file, 0).await
    }

    /// Open the store with slow-query logging enabled.
    ///
    /// `slow_query_ms` is the threshold in milliseconds — queries exceeding
    /// it are logged at WARN level. Set to 0 to disable slow-query logging.
    pub async fn new_with_slow_query(
        data_dir: &Path,
        db_file: &str,
        slow_query_ms: u64,
    ) -> Result<Self> {
        tokio::fs::create_dir_all(data_dir).await?;
        let db_path = data_dir.join(db_file);
        let mut opts =
            SqliteConnectOptions::from_str(&format!("sqlite://{}?mode=rwc", db_path.display()))?
                .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
                .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
                .create_if_missing(true);

        if slow_query_ms > 0 {
            opts = opts.log_slow_statements(
                log::LevelFilter::Warn,
                std::time::Duration::from_millis(slow_query_ms),
            );
        }

        let pool = SqlitePool::connect_with(opts).await?;
        Self::migrate(&pool).await?;
        Ok(Self { pool })
    }

    /// Wrap an existing pool (tests use this with an in-memory database).
    pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
        Self::migrate(&pool).await?;
        Ok(Self { pool })
    }

    /// Return a clone of the connection pool (cheap — Arc-backed).
    /// Used to create an `ExportEngine` sharing the same connection.
    pub fn pool(&self) -> SqlitePool {
        self.pool.clone()
    }

    async fn migrate(pool: &SqlitePool) -> Result<()> {
        sqlx::migrate!("src/storage/migrations")
            .run(pool)
            .await
            .context("Failed to run database migrations")?;
        Ok(())
    }

    // ─── Projects ─────────────────────────────────────────────────────────────

    pub async fn create_project(&self, title: &str) -> Result<ProjectRow> {
        let now = now_rfc3339();
        let id = sqlx::query("INSERT INTO projects (title, created_at) VALUES (?, ?)")
            .bind(title)
            .bind(&now)
            .execute(&self.pool)
            .await?
            .last_insert_rowid();
        self.get_project(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("project not found after insert"))
    }

    pub async fn get_project(&self, id: i64) -> Result<Option<ProjectRow>> {
        Ok(sqlx::query_as("SELECT * FROM projects WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    // ─── Users ────────────────────────────────────────────────────────────────

    pub async fn create_user(
        &self,
        email: &str,
        username: &str,
        is_superuser: bool,
    ) -> Result<UserRow> {
        let id = sqlx::query("INSERT INTO users (email, username, is_superuser) VALUES (?, ?, ?)")
            .bind(email)
            .bind(username)
            .bind(is_superuser)
            .execute(&self.pool)
            .await?
            .last_insert_rowid();
        self.get_user(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("user not found after insert"))
    }

    pub async fn get_user(&self, id: i64) -> Result<Option<UserRow>> {
        Ok(sqlx::query_as("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    // ─── Tasks ────────────────────────────────────────────────────────────────

    /// Insert a task. `created_at` defaults to now; the seeder passes an
    /// explicit value so fixture ordering is reproducible.
    pub async fn create_task(
        &self,
        project_id: i64,
        data: &serde_json::Value,
        meta: Option<&serde_json::Value>,
        is_labeled: bool,
        created_at: Option<DateTime<Utc>>,
    ) -> Result<TaskRow> {
        let created = created_at
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(now_rfc3339);
        let meta_json = meta
            .map(|m| m.to_string())
            .unwrap_or_else(|| "{}".to_string());
        let id = sqlx::query(
            "INSERT INTO tasks (project_id, data, meta, is_labeled, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(project_id)
        .bind(data.to_string())
        .bind(&meta_json)
        .bind(is_labeled)
        .bind(&created)
        .bind(&created)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();
        self.get_task(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("task not found after insert"))
    }

    pub async fn get_task(&self, id: i64) -> Result<Option<TaskRow>> {
        Ok(sqlx::query_as("SELECT * FROM tasks WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    // ─── Predictions ──────────────────────────────────────────────────────────

    pub async fn add_prediction(
        &self,
        task_id: i64,
        model_version: Option<&str>,
        score: Option<f64>,
        result: &serde_json::Value,
        created_at: Option<DateTime<Utc>>,
    ) -> Result<PredictionRow> {
        let created = created_at
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(now_rfc3339);
        let id = sqlx::query(
            "INSERT INTO predictions (task_id, model_version, score, result, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(task_id)
        .bind(model_version)
        .bind(score)
        .bind(result.to_string())
        .bind(&created)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();
        Ok(
            sqlx::query_as("SELECT * FROM predictions WHERE id = ?")
                .bind(id)
                .fetch_one(&self.pool)
                .await?,
        )
    }

    // ─── Annotations ──────────────────────────────────────────────────────────

    pub async fn add_annotation(
        &self,
        task_id: i64,
        completed_by: Option<i64>,
        result: &serde_json::Value,
        was_cancelled: bool,
        created_at: Option<DateTime<Utc>>,
    ) -> Result<AnnotationRow> {
        let created = created_at
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(now_rfc3339);
        let id = sqlx::query(
            "INSERT INTO annotations (task_id, completed_by, result, was_cancelled, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(task_id)
        .bind(completed_by)
        .bind(result.to_string())
        .bind(was_cancelled)
        .bind(&created)
        .bind(&created)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();
        Ok(
            sqlx::query_as("SELECT * FROM annotations WHERE id = ?")
                .bind(id)
                .fetch_one(&self.pool)
                .await?,
        )
    }
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    // One connection only — each `sqlite::memory:` connection is its
    // own database.
    async fn make_storage() -> Storage {
        let opts = SqliteConnectOptions::from_str("sqlite::memory:")
            .unwrap()
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(opts)
            .await
            .unwrap();
        Storage::from_pool(pool).await.unwrap()
    }

    #[tokio::test]
    async fn test_create_and_get_project() {
        let s = make_storage().await;
        let p = s.create_project("Sentiment").await.unwrap();
        let fetched = s.get_project(p.id).await.unwrap().expect("should exist");
        assert_eq!(fetched.title, "Sentiment");
    }

    #[tokio::test]
    async fn test_create_task_defaults() {
        let s = make_storage().await;
        let p = s.create_project("P").await.unwrap();
        let t = s
            .create_task(p.id, &serde_json::json!({"text": "hi"}), None, false, None)
            .await
            .unwrap();
        assert_eq!(t.project_id, p.id);
        assert_eq!(t.meta, "{}");
        assert!(!t.is_labeled);
        assert_eq!(t.created_at, t.updated_at);
    }

    #[tokio::test]
    async fn test_children_attach_to_task() {
        let s = make_storage().await;
        let p = s.create_project("P").await.unwrap();
        let t = s
            .create_task(p.id, &serde_json::json!({}), None, false, None)
            .await
            .unwrap();
        let u = s.create_user("a@b.c", "a", true).await.unwrap();
        let pred = s
            .add_prediction(t.id, Some("bert-v1"), Some(0.9), &serde_json::json!([]), None)
            .await
            .unwrap();
        let ann = s
            .add_annotation(t.id, Some(u.id), &serde_json::json!([]), false, None)
            .await
            .unwrap();
        assert_eq!(pred.task_id, t.id);
        assert_eq!(pred.model_version.as_deref(), Some("bert-v1"));
        assert_eq!(ann.completed_by, Some(u.id));
    }
}
