// SPDX-License-Identifier: MIT
//! App configuration (`config.toml` + CLI/env overrides).

use anyhow::{Context as _, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

const DEFAULT_DB_FILE: &str = "tasks.db";

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory holding the SQLite task store.
    pub data_dir: PathBuf,
    /// Database filename inside `data_dir`.
    pub db_file: String,
    /// Slow-query WARN threshold in milliseconds. 0 disables it.
    pub slow_query_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            db_file: DEFAULT_DB_FILE.to_string(),
            slow_query_ms: 0,
        }
    }
}

impl AppConfig {
    /// Load from a TOML file; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Self = toml::from_str(&raw)
            .with_context(|| format!("parsing config {}", path.display()))?;
        info!(path = %path.display(), "config loaded");
        Ok(config)
    }
}
