//! Modification aggregation across adaptors.
//!
//! Every configured adaptor is polled with the same window; one adaptor
//! failing must not hide what the others saw.

use std::collections::BTreeMap;

use tracing::error;

use kiln_core::{Modification, PollWindow};

use crate::source::SourceControl;

/// Combined answer from polling every adaptor once.
#[derive(Debug, Clone, Default)]
pub struct AggregatedReport {
    /// All modifications, sorted by timestamp ascending. Ties keep
    /// adaptor registration order, then adaptor-local order.
    pub modifications: Vec<Modification>,
    pub properties: BTreeMap<String, String>,
}

impl AggregatedReport {
    pub fn build_necessary(&self) -> bool {
        !self.modifications.is_empty()
    }
}

/// Poll every adaptor. An adaptor error is logged and contributes
/// nothing; the cycle continues with whatever the rest reported.
pub async fn poll_all(
    sources: &[Box<dyn SourceControl>],
    window: PollWindow,
) -> AggregatedReport {
    let mut report = AggregatedReport::default();
    for source in sources {
        match source.poll(window).await {
            Ok(mut polled) => {
                report.modifications.append(&mut polled.modifications);
                report.properties.extend(polled.properties);
            }
            Err(e) => {
                error!(source = source.name(), error = %e, "source control poll failed");
            }
        }
    }
    report.modifications.sort_by_key(|m| m.modified_at);
    report
}
