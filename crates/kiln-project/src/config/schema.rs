use kiln_build::{BootstrapperSpec, BuilderSpec};
use kiln_label::LabelSpec;
use kiln_publish::{PublishGate, PublisherSpec, SuccessPolicy};
use kiln_scm::SourceControlSpec;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level configuration: one file declares every project on the host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KilnConfig {
    pub projects: Vec<ProjectConfig>,
    /// Cap on how many projects may be in their build path at once.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_concurrent_builds: Option<usize>,
}

/// One continuously built project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Kebab-case project name, unique within the file.
    pub name: String,
    /// Poll interval in seconds.
    pub interval: u64,
    /// Absolute scheduling: the next poll lands on the smallest multiple
    /// of `interval` past UTC midnight that is still in the future.
    /// Relative scheduling (the default) re-arms from cycle completion.
    #[serde(default)]
    pub absolute: bool,
    /// Directory for state, status, and archived build logs.
    pub log_dir: PathBuf,
    /// Build once on the very first cycle of a never-built project.
    #[serde(default = "default_initial_build")]
    pub initial_build: bool,
    /// Advance the poll window boundary on cycles that build nothing.
    #[serde(default)]
    pub advance_on_idle: bool,
    #[serde(default)]
    pub report_success: SuccessPolicy,
    #[serde(default)]
    pub spam_while_broken: bool,
    pub source_controls: Vec<SourceControlSpec>,
    #[serde(default)]
    pub bootstrappers: Vec<BootstrapperSpec>,
    pub builder: BuilderSpec,
    #[serde(default)]
    pub label: LabelSpec,
    #[serde(default)]
    pub publishers: Vec<PublisherSpec>,
}

impl ProjectConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.interval)
    }

    /// Project-level gate defaults; individual publishers may override.
    pub fn gate(&self) -> PublishGate {
        PublishGate {
            report_success: self.report_success,
            spam_while_broken: self.spam_while_broken,
        }
    }
}

fn default_initial_build() -> bool {
    true
}
