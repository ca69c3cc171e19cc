//! Bootstrappers.
//!
//! Bounded commands run sequentially before the build proper, typically
//! to sync sources or clean the tree. The first failure fails the cycle
//! and the build command never runs.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::info;

use kiln_core::ConfigError;

use crate::runner::{run_command, RunSpec, RunStatus};

const PLUGIN: &str = "exec bootstrapper";

const DEFAULT_BOOTSTRAP_TIMEOUT_SECS: u64 = 120;

/// Trait for one pre-build step. Implemented by MockBootstrapper (tests)
/// and ExecBootstrapper (real).
#[async_trait::async_trait]
pub trait Bootstrapper: Send + Sync {
    /// Short description for log entries when the step fails.
    fn describe(&self) -> String;

    /// Run the step. Any `Err` fails the cycle.
    async fn bootstrap(&self, cancel: &CancellationToken) -> Result<()>;
}

#[async_trait::async_trait]
impl<B: Bootstrapper + ?Sized> Bootstrapper for std::sync::Arc<B> {
    fn describe(&self) -> String {
        (**self).describe()
    }

    async fn bootstrap(&self, cancel: &CancellationToken) -> Result<()> {
        (**self).bootstrap(cancel).await
    }
}

/// Raw exec bootstrapper settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootstrapperSettings {
    /// Command line, run through the platform shell.
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
    /// Hard deadline in seconds.
    #[serde(default = "default_bootstrap_timeout")]
    pub timeout: u64,
}

fn default_bootstrap_timeout() -> u64 {
    DEFAULT_BOOTSTRAP_TIMEOUT_SECS
}

/// Shells out to the configured command; success is exit code zero.
#[derive(Debug)]
pub struct ExecBootstrapper {
    settings: BootstrapperSettings,
    timeout: Duration,
}

impl ExecBootstrapper {
    pub fn new(settings: BootstrapperSettings) -> Result<Self, ConfigError> {
        if settings.command.trim().is_empty() {
            return Err(ConfigError::required(PLUGIN, "command"));
        }
        if settings.timeout == 0 {
            return Err(ConfigError::invalid(PLUGIN, "timeout", "must be positive"));
        }
        let timeout = Duration::from_secs(settings.timeout);
        Ok(ExecBootstrapper { settings, timeout })
    }
}

#[async_trait::async_trait]
impl Bootstrapper for ExecBootstrapper {
    fn describe(&self) -> String {
        format!("bootstrapper `{}`", self.settings.command)
    }

    async fn bootstrap(&self, cancel: &CancellationToken) -> Result<()> {
        let mut spec = RunSpec::shell(&self.settings.command, self.timeout);
        spec.dir = self.settings.dir.clone();
        spec.env = self.settings.env.clone();
        info!(command = %self.settings.command, "running bootstrapper");
        let transcript = run_command(&spec, None, cancel).await?;
        match transcript.status {
            RunStatus::Completed { exit_code: Some(0) } => Ok(()),
            RunStatus::Completed { exit_code } => {
                bail!(
                    "{} exited with code {}",
                    self.describe(),
                    exit_code.map_or_else(|| "unknown".to_string(), |c| c.to_string())
                )
            }
            RunStatus::TimedOut => bail!(
                "{} timed out after {}s",
                self.describe(),
                self.timeout.as_secs()
            ),
            RunStatus::Cancelled => bail!("{} cancelled", self.describe()),
        }
    }
}

/// Bootstrapper configuration, selected by `type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BootstrapperSpec {
    Exec(BootstrapperSettings),
}

impl BootstrapperSpec {
    pub fn build(&self) -> Result<Box<dyn Bootstrapper>, ConfigError> {
        match self {
            BootstrapperSpec::Exec(settings) => {
                Ok(Box::new(ExecBootstrapper::new(settings.clone())?))
            }
        }
    }
}

/// Mock bootstrapper for testing. Scripted failures, counted calls.
pub struct MockBootstrapper {
    name: String,
    failures: Mutex<Vec<String>>,
    calls: Mutex<u32>,
}

impl MockBootstrapper {
    pub fn new(name: &str) -> Self {
        MockBootstrapper {
            name: name.to_string(),
            failures: Mutex::new(Vec::new()),
            calls: Mutex::new(0),
        }
    }

    pub fn push_failure(&self, message: &str) {
        self.failures.lock().unwrap().push(message.to_string());
    }

    pub fn calls(&self) -> u32 {
        *self.calls.lock().unwrap()
    }
}

#[async_trait::async_trait]
impl Bootstrapper for MockBootstrapper {
    fn describe(&self) -> String {
        format!("bootstrapper `{}`", self.name)
    }

    async fn bootstrap(&self, _cancel: &CancellationToken) -> Result<()> {
        *self.calls.lock().unwrap() += 1;
        let mut failures = self.failures.lock().unwrap();
        if failures.is_empty() {
            Ok(())
        } else {
            bail!("{}", failures.remove(0))
        }
    }
}
