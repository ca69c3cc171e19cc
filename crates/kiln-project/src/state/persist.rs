use crate::state::machine::ProjectState;
use kiln_store::PersistError;
use std::path::{Path, PathBuf};
use tracing::warn;

pub const STATE_FILE: &str = "state.json";

pub fn state_path(log_dir: &Path) -> PathBuf {
    log_dir.join(STATE_FILE)
}

/// Load state from disk. Returns None if the file doesn't exist.
pub fn load_state(log_dir: &Path) -> Result<Option<ProjectState>, PersistError> {
    kiln_store::read_json(&state_path(log_dir))
}

/// Save state atomically. A failure here is fatal to the project loop:
/// losing the window boundary risks re-processing or skipping changes.
pub fn save_state(log_dir: &Path, state: &ProjectState) -> Result<(), PersistError> {
    kiln_store::write_json(&state_path(log_dir), state)
}

/// Load the persisted state, or start fresh with the incrementer's
/// default label. A state file written for a different project name is
/// discarded rather than trusted.
pub fn load_or_init(
    log_dir: &Path,
    project: &str,
    default_label: &str,
) -> Result<ProjectState, PersistError> {
    match load_state(log_dir)? {
        Some(state) if state.project == project => Ok(state),
        Some(state) => {
            warn!(
                project = project,
                found = %state.project,
                "state file belongs to another project, starting fresh"
            );
            Ok(ProjectState::new(project, default_label))
        }
        None => Ok(ProjectState::new(project, default_label)),
    }
}
