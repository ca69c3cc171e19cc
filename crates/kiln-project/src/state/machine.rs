use anyhow::{bail, Result};
use kiln_core::ConfigError;
use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

// ── Phases ──

/// Where a project loop currently is in its cycle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProjectPhase {
    Waiting,
    CheckingModifications,
    Bootstrapping,
    Building,
    Labeling,
    Logging,
    Publishing,
}

impl ProjectPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectPhase::Waiting => "waiting",
            ProjectPhase::CheckingModifications => "checking_modifications",
            ProjectPhase::Bootstrapping => "bootstrapping",
            ProjectPhase::Building => "building",
            ProjectPhase::Labeling => "labeling",
            ProjectPhase::Logging => "logging",
            ProjectPhase::Publishing => "publishing",
        }
    }
}

// ── Valid transitions ──

const VALID_TRANSITIONS: &[(ProjectPhase, &[ProjectPhase])] = &[
    (ProjectPhase::Waiting, &[ProjectPhase::CheckingModifications]),
    (
        ProjectPhase::CheckingModifications,
        &[ProjectPhase::Waiting, ProjectPhase::Bootstrapping],
    ),
    (
        ProjectPhase::Bootstrapping,
        // A bootstrapper failure records a failed build without running
        // the build command, so Building may be skipped.
        &[ProjectPhase::Building, ProjectPhase::Labeling],
    ),
    (ProjectPhase::Building, &[ProjectPhase::Labeling]),
    (ProjectPhase::Labeling, &[ProjectPhase::Logging]),
    (ProjectPhase::Logging, &[ProjectPhase::Publishing]),
    (ProjectPhase::Publishing, &[ProjectPhase::Waiting]),
];

fn is_valid_transition(from: ProjectPhase, to: ProjectPhase) -> bool {
    VALID_TRANSITIONS
        .iter()
        .any(|(f, targets)| *f == from && targets.contains(&to))
}

/// Move the project to `to`. An attempted transition outside the table
/// is a programming error, never silently performed.
pub fn transition(state: &mut ProjectState, to: ProjectPhase) -> Result<()> {
    if !is_valid_transition(state.phase, to) {
        bail!(
            "invalid phase transition: {} {:?} → {to:?}",
            state.project,
            state.phase
        );
    }
    state.phase = to;
    Ok(())
}

// ── State ──

/// The durable per-project record. Owned exclusively by the project's
/// loop; everyone else reads snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectState {
    pub project: String,
    pub phase: ProjectPhase,
    /// Label the next successful build will carry.
    pub label: String,
    /// Upper bound of the last consumed poll window (RFC 3339). The
    /// next window starts exactly here; never reused, never rewound.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_build: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_successful_build: Option<String>,
    /// "success", "failed", or "timed_out".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_outcome: Option<String>,
}

impl ProjectState {
    pub fn new(project: &str, label: &str) -> Self {
        ProjectState {
            project: project.to_string(),
            phase: ProjectPhase::Waiting,
            label: label.to_string(),
            last_build: None,
            last_successful_build: None,
            last_outcome: None,
        }
    }

    /// Parse the persisted window boundary back into an instant.
    pub fn last_build_time(&self) -> Result<Option<OffsetDateTime>, ConfigError> {
        match self.last_build.as_deref() {
            None => Ok(None),
            Some(raw) => OffsetDateTime::parse(raw, &Rfc3339)
                .map(Some)
                .map_err(|e| {
                    ConfigError::invalid("project state", "last_build", e.to_string())
                }),
        }
    }

    pub fn previously_successful(&self) -> bool {
        self.last_outcome.as_deref() == Some("success")
    }
}
