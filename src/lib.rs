// SPDX-License-Identifier: MIT
//! exportd — filtered task export engine over an annotation task store.
//!
//! The library surface is three modules: [`storage`] owns the SQLite
//! store (pool, migrations, seed/write surface), [`export`] is the
//! read-only query engine, and [`config`] is file-based configuration
//! for the binary.

pub mod config;
pub mod export;
pub mod storage;
