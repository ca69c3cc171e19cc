//! Build archive.
//!
//! Every attempted build leaves one JSON record in the project's log
//! directory. Successful builds carry their label in the file name,
//! `log20240301103000LKILN_4_INT.json`, so the most recent good build
//! can be spotted without opening anything.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use kiln_core::{BuildResult, Modification, ModifiedFile};

use crate::{read_json, write_json, PersistError};

/// Serialized record of one attempted build.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildRecord {
    pub project: String,
    /// When the cycle left the waiting phase (RFC 3339).
    pub started_at: String,
    /// Label assigned to this build. Present only on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub forced: bool,
    pub result: BuildResult,
    pub modifications: Vec<ArchivedModification>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,
}

/// A change set flattened for the archive, timestamps as RFC 3339.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchivedModification {
    pub author: String,
    pub comment: String,
    pub modified_at: String,
    pub files: Vec<ModifiedFile>,
}

impl From<&Modification> for ArchivedModification {
    fn from(m: &Modification) -> Self {
        ArchivedModification {
            author: m.author.clone(),
            comment: m.comment.clone(),
            modified_at: m.modified_at.format(&Rfc3339).unwrap_or_default(),
            files: m.files.clone(),
        }
    }
}

/// `log<YYYYMMDDHHMMSS>.json`, with an `L<label>` segment when the
/// build succeeded.
pub fn archive_file_name(started_at: OffsetDateTime, label: Option<&str>) -> String {
    let ts = compact_timestamp(started_at);
    match label {
        Some(label) => format!("log{ts}L{label}.json"),
        None => format!("log{ts}.json"),
    }
}

fn compact_timestamp(t: OffsetDateTime) -> String {
    format!(
        "{:04}{:02}{:02}{:02}{:02}{:02}",
        t.year(),
        u8::from(t.month()),
        t.day(),
        t.hour(),
        t.minute(),
        t.second()
    )
}

/// Write the record into `log_dir` and return the path it landed at.
pub fn write_record(
    log_dir: &Path,
    started_at: OffsetDateTime,
    record: &BuildRecord,
) -> Result<PathBuf, PersistError> {
    let path = log_dir.join(archive_file_name(started_at, record.label.as_deref()));
    write_json(&path, record)?;
    Ok(path)
}

pub fn read_record(path: &Path) -> Result<Option<BuildRecord>, PersistError> {
    read_json(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_core::{FileAction, Severity};

    fn ts(s: &str) -> OffsetDateTime {
        OffsetDateTime::parse(s, &Rfc3339).expect("valid rfc3339")
    }

    #[test]
    fn file_name_without_label() {
        let name = archive_file_name(ts("2024-03-01T10:30:00Z"), None);
        assert_eq!(name, "log20240301103000.json");
    }

    #[test]
    fn file_name_with_label() {
        let name = archive_file_name(ts("2024-03-01T10:30:00Z"), Some("KILN_4_INT"));
        assert_eq!(name, "log20240301103000LKILN_4_INT.json");
    }

    #[test]
    fn record_round_trips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let started = ts("2024-03-01T10:30:00Z");
        let modification = Modification {
            author: "alice".into(),
            comment: "fix crash on empty input".into(),
            modified_at: ts("2024-03-01T10:12:00Z"),
            files: vec![ModifiedFile {
                file_name: "parser.rs".into(),
                folder_name: "src".into(),
                action: FileAction::Checkin,
            }],
        };
        let result = BuildResult {
            success: true,
            elapsed_ms: 1200,
            exit_code: Some(0),
            ..BuildResult::default()
        };
        let record = BuildRecord {
            project: "web".into(),
            started_at: "2024-03-01T10:30:00Z".into(),
            label: Some("KILN_4_INT".into()),
            forced: false,
            result,
            modifications: vec![ArchivedModification::from(&modification)],
            properties: BTreeMap::new(),
        };
        let path = write_record(dir.path(), started, &record).expect("write");
        assert!(path.ends_with("log20240301103000LKILN_4_INT.json"));
        let got = read_record(&path).expect("read").expect("present");
        assert_eq!(got.project, "web");
        assert_eq!(got.label.as_deref(), Some("KILN_4_INT"));
        assert_eq!(got.modifications.len(), 1);
        assert_eq!(got.modifications[0].author, "alice");
        assert!(got.result.success);
        assert_eq!(got.result.entries.iter().filter(|e| e.severity == Severity::Error).count(), 0);
    }

    #[test]
    fn empty_properties_are_omitted() {
        let record = BuildRecord {
            project: "web".into(),
            started_at: "2024-03-01T10:30:00Z".into(),
            label: None,
            forced: true,
            result: BuildResult::default(),
            modifications: Vec::new(),
            properties: BTreeMap::new(),
        };
        let json = serde_json::to_string(&record).expect("serialize");
        assert!(!json.contains("properties"));
        assert!(!json.contains("label"));
    }
}
