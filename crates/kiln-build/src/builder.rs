//! Builder seam.
//!
//! A builder produces one classified [`BuildResult`] per invocation. The
//! exec builder shells out to a configured command line through the
//! bounded runner; the mock builder scripts results for cycle tests.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::info;

use kiln_core::{BuildResult, ConfigError};

use crate::classify::{classify, compile_recognizers, Recognizer, RecognizerSpec};
use crate::runner::{run_command, RunSpec};

const PLUGIN: &str = "exec builder";

const DEFAULT_BUILD_TIMEOUT_SECS: u64 = 600;

/// Trait for producing a build result. Implemented by MockBuilder (tests)
/// and ExecBuilder (real).
#[async_trait::async_trait]
pub trait Builder: Send + Sync {
    /// Run one build. `tee` optionally mirrors raw output to a live log
    /// file. The returned result is already classified; runner-level
    /// failures (the command could not even be spawned) surface as `Err`.
    async fn build(&self, tee: Option<&Path>, cancel: &CancellationToken) -> Result<BuildResult>;
}

#[async_trait::async_trait]
impl<B: Builder + ?Sized> Builder for std::sync::Arc<B> {
    async fn build(&self, tee: Option<&Path>, cancel: &CancellationToken) -> Result<BuildResult> {
        (**self).build(tee, cancel).await
    }
}

/// Raw exec builder settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecSettings {
    /// Command line, run through the platform shell.
    pub command: String,
    /// Extra arguments appended to the command line.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
    /// Hard deadline in seconds.
    #[serde(default = "default_build_timeout")]
    pub timeout: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recognizers: Vec<RecognizerSpec>,
}

fn default_build_timeout() -> u64 {
    DEFAULT_BUILD_TIMEOUT_SECS
}

/// Shells out to the configured command and classifies its output.
#[derive(Debug)]
pub struct ExecBuilder {
    command_line: String,
    dir: Option<PathBuf>,
    env: BTreeMap<String, String>,
    timeout: Duration,
    recognizers: Vec<Recognizer>,
}

impl ExecBuilder {
    pub fn new(settings: ExecSettings) -> Result<Self, ConfigError> {
        if settings.command.trim().is_empty() {
            return Err(ConfigError::required(PLUGIN, "command"));
        }
        if settings.timeout == 0 {
            return Err(ConfigError::invalid(PLUGIN, "timeout", "must be positive"));
        }
        let recognizers = compile_recognizers(PLUGIN, &settings.recognizers)?;
        let mut command_line = settings.command.clone();
        for arg in &settings.args {
            command_line.push(' ');
            command_line.push_str(arg);
        }
        Ok(ExecBuilder {
            command_line,
            dir: settings.dir,
            env: settings.env,
            timeout: Duration::from_secs(settings.timeout),
            recognizers,
        })
    }
}

#[async_trait::async_trait]
impl Builder for ExecBuilder {
    async fn build(&self, tee: Option<&Path>, cancel: &CancellationToken) -> Result<BuildResult> {
        let mut spec = RunSpec::shell(&self.command_line, self.timeout);
        spec.dir = self.dir.clone();
        spec.env = self.env.clone();
        info!(command = %self.command_line, "starting build command");
        let transcript = run_command(&spec, tee, cancel).await?;
        Ok(classify(&transcript, &self.recognizers))
    }
}

/// Builder configuration, selected by `type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BuilderSpec {
    Exec(ExecSettings),
}

impl BuilderSpec {
    pub fn build(&self) -> Result<Box<dyn Builder>, ConfigError> {
        match self {
            BuilderSpec::Exec(settings) => Ok(Box::new(ExecBuilder::new(settings.clone())?)),
        }
    }
}

/// Mock builder for testing. Pops a scripted result per call; when
/// exhausted, returns a clean success.
pub struct MockBuilder {
    scripted: Mutex<Vec<Result<BuildResult>>>,
    calls: Mutex<u32>,
}

impl Default for MockBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBuilder {
    pub fn new() -> Self {
        MockBuilder {
            scripted: Mutex::new(Vec::new()),
            calls: Mutex::new(0),
        }
    }

    pub fn push_result(&self, result: BuildResult) {
        self.scripted.lock().unwrap().push(Ok(result));
    }

    pub fn push_error(&self, message: &str) {
        self.scripted
            .lock()
            .unwrap()
            .push(Err(anyhow::anyhow!("{message}")));
    }

    pub fn calls(&self) -> u32 {
        *self.calls.lock().unwrap()
    }
}

#[async_trait::async_trait]
impl Builder for MockBuilder {
    async fn build(&self, _tee: Option<&Path>, _cancel: &CancellationToken) -> Result<BuildResult> {
        *self.calls.lock().unwrap() += 1;
        let mut scripted = self.scripted.lock().unwrap();
        if scripted.is_empty() {
            return Ok(BuildResult {
                success: true,
                elapsed_ms: 10,
                exit_code: Some(0),
                ..BuildResult::default()
            });
        }
        scripted.remove(0)
    }
}
