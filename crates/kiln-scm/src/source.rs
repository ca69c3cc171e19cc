use std::collections::BTreeMap;
use std::sync::Mutex;

use anyhow::Result;

use kiln_core::{Modification, PollWindow};

/// What one adaptor saw in one poll window.
#[derive(Debug, Clone, Default)]
pub struct PollReport {
    /// Modifications inside the window, adaptor-local order.
    pub modifications: Vec<Modification>,
    /// Side properties triggered during the scan, e.g. "a deletion was
    /// seen". Produced fresh on every poll.
    pub properties: BTreeMap<String, String>,
}

impl PollReport {
    pub fn with_modifications(modifications: Vec<Modification>) -> Self {
        PollReport {
            modifications,
            properties: BTreeMap::new(),
        }
    }
}

/// Trait for polling one source control system. Implemented by
/// MockSourceControl (tests) and JournalSourceControl (real).
#[async_trait::async_trait]
pub trait SourceControl: Send + Sync {
    /// Adaptor name for logs.
    fn name(&self) -> &str;

    /// Scan for modifications strictly inside `window`.
    async fn poll(&self, window: PollWindow) -> Result<PollReport>;
}

#[async_trait::async_trait]
impl<S: SourceControl + ?Sized> SourceControl for std::sync::Arc<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn poll(&self, window: PollWindow) -> Result<PollReport> {
        (**self).poll(window).await
    }
}

impl std::fmt::Debug for dyn SourceControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceControl")
            .field("name", &self.name())
            .finish()
    }
}

/// Mock adaptor for testing. Pops a scripted report on each poll; when
/// exhausted, reports no modifications. Records every window it was
/// polled with.
pub struct MockSourceControl {
    name: String,
    scripted: Mutex<Vec<Result<PollReport>>>,
    windows: Mutex<Vec<PollWindow>>,
}

impl MockSourceControl {
    pub fn new(name: &str) -> Self {
        MockSourceControl {
            name: name.to_string(),
            scripted: Mutex::new(Vec::new()),
            windows: Mutex::new(Vec::new()),
        }
    }

    pub fn push_report(&self, report: PollReport) {
        self.scripted.lock().unwrap().push(Ok(report));
    }

    pub fn push_error(&self, message: &str) {
        self.scripted
            .lock()
            .unwrap()
            .push(Err(anyhow::anyhow!("{message}")));
    }

    /// Windows observed so far, in poll order.
    pub fn polled_windows(&self) -> Vec<PollWindow> {
        self.windows.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl SourceControl for MockSourceControl {
    fn name(&self) -> &str {
        &self.name
    }

    async fn poll(&self, window: PollWindow) -> Result<PollReport> {
        self.windows.lock().unwrap().push(window);
        let mut scripted = self.scripted.lock().unwrap();
        if scripted.is_empty() {
            return Ok(PollReport::default());
        }
        scripted.remove(0)
    }
}
