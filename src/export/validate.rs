// SPDX-License-Identifier: MIT
//! Request validation and the export error taxonomy.
//!
//! Validation is fail-fast and runs before any store access: a rejected
//! request never executes a query and never yields partial results.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use super::model::{ExportRequest, DEFAULT_DATE_FIELD};
use super::timestamp::parse_instant;

/// Safelist for the caller-chosen date field name. The name indexes
/// into each task's `data` map; constraining it here keeps caller text
/// out of anything resembling query construction.
static FIELD_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("static pattern"));

pub const MAX_FIELD_NAME_LEN: usize = 64;
pub const MAX_PAGE_SIZE: i64 = 10_000;

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// Unknown project id — distinct from validation failures.
    #[error("project with id {0} does not exist")]
    ProjectNotFound(i64),
    #[error("invalid date field name {name:?}: {reason}")]
    InvalidFieldName { name: String, reason: &'static str },
    #[error("invalid pagination: {0}")]
    InvalidPagination(String),
    #[error("invalid request: {0}")]
    Validation(String),
    /// Underlying store failure — opaque to callers of this engine.
    #[error("store error: {0}")]
    Store(#[source] anyhow::Error),
}

impl From<sqlx::Error> for ExportError {
    fn from(e: sqlx::Error) -> Self {
        ExportError::Store(e.into())
    }
}

/// A request that passed validation: bounds are absolute instants and
/// paging is either fully present or fully absent.
#[derive(Debug, Clone)]
pub struct ValidatedRequest {
    pub project_id: i64,
    pub date_field_name: String,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    pub model_version: Option<String>,
    pub confirmed_by_user_id: Option<i64>,
    pub paging: Option<Paging>,
}

#[derive(Debug, Clone, Copy)]
pub struct Paging {
    pub page: i64,
    pub page_size: i64,
}

pub fn validate(req: &ExportRequest) -> Result<ValidatedRequest, ExportError> {
    let date_field_name = validate_field_name(&req.date_field_name)?;
    let paging = validate_paging(req.page, req.page_size)?;
    let date_from = parse_bound("date_from", req.date_from.as_deref())?;
    let date_to = parse_bound("date_to", req.date_to.as_deref())?;

    Ok(ValidatedRequest {
        project_id: req.project_id,
        date_field_name,
        date_from,
        date_to,
        model_version: req.model_version.clone().filter(|v| !v.is_empty()),
        confirmed_by_user_id: req.confirmed_by_user_id,
        paging,
    })
}

/// Empty names fall back to the default; anything else must match the
/// safelist pattern and length cap.
fn validate_field_name(name: &str) -> Result<String, ExportError> {
    if name.is_empty() {
        return Ok(DEFAULT_DATE_FIELD.to_string());
    }
    if name.len() > MAX_FIELD_NAME_LEN {
        return Err(ExportError::InvalidFieldName {
            name: name.to_string(),
            reason: "longer than 64 characters",
        });
    }
    if !FIELD_NAME_RE.is_match(name) {
        return Err(ExportError::InvalidFieldName {
            name: name.to_string(),
            reason: "must contain only letters, digits, and underscores, \
                     and must not start with a digit",
        });
    }
    Ok(name.to_string())
}

fn validate_paging(page: Option<i64>, page_size: Option<i64>) -> Result<Option<Paging>, ExportError> {
    match (page, page_size) {
        (None, None) => Ok(None),
        (Some(_), None) | (None, Some(_)) => Err(ExportError::InvalidPagination(
            "page and page_size must be supplied together".to_string(),
        )),
        (Some(page), Some(page_size)) => {
            if page < 1 {
                return Err(ExportError::InvalidPagination(format!(
                    "page must be >= 1, got {page}"
                )));
            }
            if !(1..=MAX_PAGE_SIZE).contains(&page_size) {
                return Err(ExportError::InvalidPagination(format!(
                    "page_size must be in 1..={MAX_PAGE_SIZE}, got {page_size}"
                )));
            }
            Ok(Some(Paging { page, page_size }))
        }
    }
}

fn parse_bound(field: &str, raw: Option<&str>) -> Result<Option<DateTime<Utc>>, ExportError> {
    match raw {
        None => Ok(None),
        Some(s) => match parse_instant(s) {
            Some(t) => Ok(Some(t)),
            None => Err(ExportError::Validation(format!(
                "{field} is not a recognized timestamp: {s:?}"
            ))),
        },
    }
}
