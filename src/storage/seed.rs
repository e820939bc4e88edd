// SPDX-License-Identifier: MIT
//! JSON fixture loading for `exportd seed`.
//!
//! A fixture file declares projects, users, tasks, predictions, and
//! annotations. Cross-references use the declaration index (0-based)
//! within the same file, so fixtures stay portable across databases
//! whose auto-increment counters differ.

use anyhow::{bail, Context as _, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::info;

use super::Storage;

#[derive(Debug, Deserialize)]
pub struct Fixture {
    #[serde(default)]
    pub projects: Vec<FixtureProject>,
    #[serde(default)]
    pub users: Vec<FixtureUser>,
    #[serde(default)]
    pub tasks: Vec<FixtureTask>,
}

#[derive(Debug, Deserialize)]
pub struct FixtureProject {
    pub title: String,
}

#[derive(Debug, Deserialize)]
pub struct FixtureUser {
    pub email: String,
    pub username: String,
    #[serde(default)]
    pub is_superuser: bool,
}

#[derive(Debug, Deserialize)]
pub struct FixtureTask {
    /// Index into `projects` above.
    pub project: usize,
    #[serde(default = "default_data")]
    pub data: serde_json::Value,
    pub meta: Option<serde_json::Value>,
    #[serde(default)]
    pub is_labeled: bool,
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub predictions: Vec<FixturePrediction>,
    #[serde(default)]
    pub annotations: Vec<FixtureAnnotation>,
}

#[derive(Debug, Deserialize)]
pub struct FixturePrediction {
    pub model_version: Option<String>,
    pub score: Option<f64>,
    #[serde(default = "default_result")]
    pub result: serde_json::Value,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct FixtureAnnotation {
    /// Index into `users` above. None = anonymous completion.
    pub completed_by: Option<usize>,
    #[serde(default = "default_result")]
    pub result: serde_json::Value,
    #[serde(default)]
    pub was_cancelled: bool,
    pub created_at: Option<DateTime<Utc>>,
}

fn default_data() -> serde_json::Value {
    serde_json::json!({})
}

fn default_result() -> serde_json::Value {
    serde_json::json!([])
}

impl Fixture {
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).context("malformed fixture JSON")
    }

    /// Insert the fixture's records. Returns the number of tasks created.
    pub async fn apply(&self, storage: &Storage) -> Result<usize> {
        let mut project_ids = Vec::with_capacity(self.projects.len());
        for p in &self.projects {
            project_ids.push(storage.create_project(&p.title).await?.id);
        }
        let mut user_ids = Vec::with_capacity(self.users.len());
        for u in &self.users {
            user_ids.push(
                storage
                    .create_user(&u.email, &u.username, u.is_superuser)
                    .await?
                    .id,
            );
        }

        for (i, t) in self.tasks.iter().enumerate() {
            let Some(&project_id) = project_ids.get(t.project) else {
                bail!("task {} references unknown project index {}", i, t.project);
            };
            let task = storage
                .create_task(project_id, &t.data, t.meta.as_ref(), t.is_labeled, t.created_at)
                .await?;
            for p in &t.predictions {
                storage
                    .add_prediction(
                        task.id,
                        p.model_version.as_deref(),
                        p.score,
                        &p.result,
                        p.created_at,
                    )
                    .await?;
            }
            for a in &t.annotations {
                let completed_by = match a.completed_by {
                    Some(idx) => match user_ids.get(idx) {
                        Some(&id) => Some(id),
                        None => bail!("task {} references unknown user index {}", i, idx),
                    },
                    None => None,
                };
                storage
                    .add_annotation(task.id, completed_by, &a.result, a.was_cancelled, a.created_at)
                    .await?;
            }
        }

        info!(
            projects = self.projects.len(),
            users = self.users.len(),
            tasks = self.tasks.len(),
            "fixture applied"
        );
        Ok(self.tasks.len())
    }
}
