//! Per-project status snapshot.
//!
//! One small JSON file per project, rewritten atomically on every phase
//! change so dashboards and `kiln status` can poll it cheaply.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::{read_json, write_json, PersistError};

pub const STATUS_FILE: &str = "status.json";

/// Snapshot of where a project loop currently is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectStatus {
    pub project: String,
    /// Current scheduling phase, lowercase snake_case.
    pub phase: String,
    /// When the current phase was entered (RFC 3339).
    pub since: String,
    pub label: String,
    pub paused: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_build: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_successful_build: Option<String>,
    /// Outcome of the most recent attempted build: "success",
    /// "failed", or "timed_out".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_outcome: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_build_at: Option<String>,
    pub updated_at: String,
}

pub fn status_path(log_dir: &Path) -> PathBuf {
    log_dir.join(STATUS_FILE)
}

/// Write the status snapshot. Callers treat failures as non-fatal; a
/// stale status file must never stop a build.
pub fn write_status(log_dir: &Path, status: &ProjectStatus) -> Result<(), PersistError> {
    write_json(&status_path(log_dir), status)
}

pub fn read_status(log_dir: &Path) -> Result<Option<ProjectStatus>, PersistError> {
    read_json(&status_path(log_dir))
}

pub fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default()
}
