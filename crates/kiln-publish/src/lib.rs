//! Build outcome publishing.
//!
//! After a cycle archives its build record, every configured publisher is
//! offered the outcome. The gate decides per publisher whether to fire,
//! from four facts: did this build succeed, did the previous one, was a
//! build actually attempted, and the publisher's own policy knobs. A
//! publisher that fails is logged and skipped; it can never stall the
//! cycle or starve the publishers after it.

use std::sync::Mutex;
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use kiln_core::ConfigError;

// ── Gate ──

/// When to announce a successful build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuccessPolicy {
    /// Every success.
    #[default]
    Always,
    /// No successes, failures only.
    Never,
    /// Only the first success after a failure.
    Fixes,
}

/// Per-publisher gate settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishGate {
    #[serde(default)]
    pub report_success: SuccessPolicy,
    /// Keep announcing repeat failures of an already-broken build.
    #[serde(default)]
    pub spam_while_broken: bool,
}

/// Facts about the cycle that just ended.
#[derive(Debug, Clone, Copy)]
pub struct GateInput {
    pub build_successful: bool,
    /// The build before this cycle had succeeded.
    pub previously_successful: bool,
    /// A build actually ran this cycle (false when the failure came
    /// before the build command, e.g. a bootstrapper).
    pub build_attempted: bool,
}

impl PublishGate {
    pub fn should_publish(&self, input: GateInput) -> bool {
        if input.build_successful {
            return match self.report_success {
                SuccessPolicy::Always => true,
                SuccessPolicy::Never => false,
                SuccessPolicy::Fixes => !input.previously_successful,
            };
        }
        // a repeat failure of a known-broken build stays quiet unless
        // spam_while_broken asks for it
        !(!input.previously_successful && input.build_attempted && !self.spam_while_broken)
    }
}

// ── Announcement ──

/// The outcome document handed to every publisher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Announcement {
    pub project: String,
    /// Label of this build; present only on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub success: bool,
    pub timed_out: bool,
    /// First green build after a red one.
    pub fixed: bool,
    pub started_at: String,
    pub elapsed_ms: u64,
    pub error_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Announcement {
    /// One-line human summary, used by the stdout publisher.
    pub fn summary(&self) -> String {
        let verdict = if self.success {
            if self.fixed {
                "fixed"
            } else {
                "success"
            }
        } else if self.timed_out {
            "timed out"
        } else {
            "failed"
        };
        let label = self.label.as_deref().unwrap_or("-");
        format!(
            "[{}] {} ({}, {} errors, {:.1}s)",
            self.project,
            verdict,
            label,
            self.error_count,
            self.elapsed_ms as f64 / 1000.0
        )
    }
}

// ── Contract ──

/// Trait for announcing one build outcome. Implemented by MockPublisher
/// (tests), StdoutPublisher, and WebhookPublisher.
#[async_trait::async_trait]
pub trait Publisher: Send + Sync {
    /// Publisher name for logs.
    fn name(&self) -> &str;

    async fn publish(&self, announcement: &Announcement) -> Result<()>;
}

#[async_trait::async_trait]
impl<P: Publisher + ?Sized> Publisher for std::sync::Arc<P> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn publish(&self, announcement: &Announcement) -> Result<()> {
        (**self).publish(announcement).await
    }
}

/// A publisher paired with its effective gate.
pub struct ConfiguredPublisher {
    pub gate: PublishGate,
    pub publisher: Box<dyn Publisher>,
}

impl std::fmt::Debug for ConfiguredPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfiguredPublisher")
            .field("gate", &self.gate)
            .field("publisher", &self.publisher.name())
            .finish()
    }
}

/// Gate and fire every publisher. Failures are logged and isolated.
pub async fn publish_all(
    publishers: &[ConfiguredPublisher],
    input: GateInput,
    announcement: &Announcement,
) {
    for configured in publishers {
        let name = configured.publisher.name();
        if !configured.gate.should_publish(input) {
            debug!(publisher = name, "publish gated off");
            continue;
        }
        if let Err(e) = configured.publisher.publish(announcement).await {
            error!(publisher = name, error = %e, "publisher failed");
        }
    }
}

// ── Config ──

const WEBHOOK_PLUGIN: &str = "webhook publisher";

const DEFAULT_WEBHOOK_TIMEOUT_SECS: u64 = 5;

fn default_webhook_timeout() -> u64 {
    DEFAULT_WEBHOOK_TIMEOUT_SECS
}

/// Publisher configuration, selected by `type`. The gate fields override
/// the project-wide gate when present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PublisherSpec {
    Stdout {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        report_success: Option<SuccessPolicy>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        spam_while_broken: Option<bool>,
    },
    Webhook {
        url: String,
        /// Request timeout in seconds.
        #[serde(default = "default_webhook_timeout")]
        timeout: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        report_success: Option<SuccessPolicy>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        spam_while_broken: Option<bool>,
    },
}

impl PublisherSpec {
    /// Instantiate the publisher, merging its gate overrides over the
    /// project-wide gate.
    pub fn build(&self, project_gate: PublishGate) -> Result<ConfiguredPublisher, ConfigError> {
        match self {
            PublisherSpec::Stdout {
                report_success,
                spam_while_broken,
            } => Ok(ConfiguredPublisher {
                gate: merge_gate(project_gate, *report_success, *spam_while_broken),
                publisher: Box::new(StdoutPublisher),
            }),
            PublisherSpec::Webhook {
                url,
                timeout,
                report_success,
                spam_while_broken,
            } => {
                if url.is_empty() {
                    return Err(ConfigError::required(WEBHOOK_PLUGIN, "url"));
                }
                if !url.starts_with("http://") && !url.starts_with("https://") {
                    return Err(ConfigError::invalid(
                        WEBHOOK_PLUGIN,
                        "url",
                        format!("{url:?} is not an http or https URL"),
                    ));
                }
                if *timeout == 0 {
                    return Err(ConfigError::invalid(WEBHOOK_PLUGIN, "timeout", "must be positive"));
                }
                Ok(ConfiguredPublisher {
                    gate: merge_gate(project_gate, *report_success, *spam_while_broken),
                    publisher: Box::new(WebhookPublisher {
                        url: url.clone(),
                        timeout: Duration::from_secs(*timeout),
                    }),
                })
            }
        }
    }
}

fn merge_gate(
    base: PublishGate,
    report_success: Option<SuccessPolicy>,
    spam_while_broken: Option<bool>,
) -> PublishGate {
    PublishGate {
        report_success: report_success.unwrap_or(base.report_success),
        spam_while_broken: spam_while_broken.unwrap_or(base.spam_while_broken),
    }
}

// ── Stdout ──

/// Writes the one-line summary to standard output.
pub struct StdoutPublisher;

#[async_trait::async_trait]
impl Publisher for StdoutPublisher {
    fn name(&self) -> &str {
        "stdout"
    }

    async fn publish(&self, announcement: &Announcement) -> Result<()> {
        println!("{}", announcement.summary());
        Ok(())
    }
}

// ── Webhook ──

/// POSTs the announcement as JSON. The blocking HTTP client runs on the
/// blocking pool so a slow endpoint cannot stall the project loops.
pub struct WebhookPublisher {
    url: String,
    timeout: Duration,
}

#[async_trait::async_trait]
impl Publisher for WebhookPublisher {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn publish(&self, announcement: &Announcement) -> Result<()> {
        let url = self.url.clone();
        let timeout = self.timeout;
        let payload = serde_json::to_string(announcement)?;
        tokio::task::spawn_blocking(move || -> Result<()> {
            let agent = ureq::Agent::config_builder()
                .timeout_global(Some(timeout))
                .build()
                .new_agent();
            agent
                .post(&url)
                .header("Content-Type", "application/json")
                .send(payload)?;
            Ok(())
        })
        .await??;
        Ok(())
    }
}

// ── Mock ──

/// Mock publisher for testing. Records every announcement it was fired
/// with; optional scripted failures.
pub struct MockPublisher {
    name: String,
    sent: Mutex<Vec<Announcement>>,
    failures: Mutex<Vec<String>>,
}

impl MockPublisher {
    pub fn new(name: &str) -> Self {
        MockPublisher {
            name: name.to_string(),
            sent: Mutex::new(Vec::new()),
            failures: Mutex::new(Vec::new()),
        }
    }

    pub fn push_failure(&self, message: &str) {
        self.failures.lock().unwrap().push(message.to_string());
    }

    pub fn sent(&self) -> Vec<Announcement> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Publisher for MockPublisher {
    fn name(&self) -> &str {
        &self.name
    }

    async fn publish(&self, announcement: &Announcement) -> Result<()> {
        self.sent.lock().unwrap().push(announcement.clone());
        let mut failures = self.failures.lock().unwrap();
        if failures.is_empty() {
            Ok(())
        } else {
            anyhow::bail!("{}", failures.remove(0))
        }
    }
}

// ── Tests ──
