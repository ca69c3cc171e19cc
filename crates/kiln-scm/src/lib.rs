//! Source control adaptors for kiln.
//!
//! An adaptor answers one question per cycle: which modifications landed
//! inside the poll window? The aggregator fans that question out to every
//! configured adaptor and merges the answers; the journal adaptor is the
//! bundled implementation, reading a vendor-style line-oriented change
//! journal from disk.

pub mod aggregate;
pub mod journal;
pub mod source;

use serde::{Deserialize, Serialize};

use kiln_core::ConfigError;

pub use aggregate::{poll_all, AggregatedReport};
pub use journal::{JournalSettings, JournalSourceControl};
pub use source::{MockSourceControl, PollReport, SourceControl};

/// Adaptor configuration, selected by `type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceControlSpec {
    Journal(JournalSettings),
}

impl SourceControlSpec {
    /// Instantiate the configured adaptor, failing fast on bad settings.
    pub fn build(&self) -> Result<Box<dyn SourceControl>, ConfigError> {
        match self {
            SourceControlSpec::Journal(settings) => {
                Ok(Box::new(JournalSourceControl::new(settings.clone())?))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_deserializes_journal_by_type_tag() {
        let spec: SourceControlSpec = serde_json::from_str(
            r#"{"type":"journal","journal_file":"/var/log/changes.txt","scope":"/web"}"#,
        )
        .unwrap();
        let SourceControlSpec::Journal(settings) = &spec;
        assert_eq!(settings.journal_file.to_str(), Some("/var/log/changes.txt"));
        assert_eq!(settings.scope.as_deref(), Some("/web"));
        assert!(spec.build().is_ok());
    }

    #[test]
    fn spec_build_rejects_empty_journal_file() {
        let spec: SourceControlSpec =
            serde_json::from_str(r#"{"type":"journal","journal_file":""}"#).unwrap();
        let err = spec.build().unwrap_err();
        assert_eq!(err.to_string(), "'journal_file' is required for journal source control");
    }
}
