// SPDX-License-Identifier: MIT
//! Filtered task export.
//!
//! Read-only query engine over the task store: scope to one project,
//! optionally narrow by a date range over a caller-named field of the
//! task's `data` map, by prediction model version, and by an elevated
//! confirming annotator, then return the matching tasks newest-first
//! with their full prediction/annotation sets and optional pagination
//! metadata.
//!
//! The narrowing predicates choose *which tasks* qualify; a qualifying
//! task's children are always returned in full. Downstream model
//! performance computation depends on seeing every annotation and
//! prediction of a task, not just the matching ones.

pub mod engine;
pub mod model;
pub mod timestamp;
pub mod validate;

pub use engine::ExportEngine;
pub use model::{ExportRequest, ExportResponse};
pub use validate::ExportError;
