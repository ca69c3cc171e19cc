//! Journal adaptor.
//!
//! Reads a vendor-style change journal: a plain-text file of entries
//! separated by blank lines. Each entry names a path, a `User:`/`Date:`/
//! `Time:` header, an action line, and a free-form comment:
//!
//! ```text
//! /web/src/parser.rs
//! Version: 12
//! User: alice  Date: 03/01/2024  Time: 10:12a
//! Checked in
//! fix crash on empty input
//! ```
//!
//! The whole file is re-read on every poll; the window filter keeps only
//! entries strictly inside the current poll window.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use time::format_description::{self, OwnedFormatItem};
use time::PrimitiveDateTime;
use tracing::{debug, warn};

use kiln_core::{ConfigError, FileAction, Modification, ModifiedFile, PollWindow};

use crate::source::{PollReport, SourceControl};

const PLUGIN: &str = "journal source control";

const DEFAULT_DATE_FORMAT: &str = "[month]/[day]/[year]";
const DEFAULT_TIME_FORMAT: &str = "[hour repr:12]:[minute][period case:lower]";

/// Raw journal adaptor settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalSettings {
    pub journal_file: PathBuf,
    /// Sub-tree to watch. `/` (the default) means everything.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// Side property set to "true" when the scan found any modification.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property: Option<String>,
    /// Side property set to "true" when a deletion or rename was seen.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property_on_delete: Option<String>,
    /// Format-description override for the `Date:` token. Supplying one
    /// disables the vendor quirk corrections.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_format: Option<String>,
    /// Format-description override for the `Time:` token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_format: Option<String>,
}

/// Journal-file adaptor. See the module docs for the entry layout.
#[derive(Debug)]
pub struct JournalSourceControl {
    settings: JournalSettings,
    scope: String,
    stamp_format: OwnedFormatItem,
    quirk_fixups: bool,
}

impl JournalSourceControl {
    pub fn new(settings: JournalSettings) -> Result<Self, ConfigError> {
        if settings.journal_file.as_os_str().is_empty() {
            return Err(ConfigError::required(PLUGIN, "journal_file"));
        }
        let scope = normalize_scope(settings.scope.as_deref().unwrap_or("/"));
        let date_format = settings
            .date_format
            .clone()
            .unwrap_or_else(|| DEFAULT_DATE_FORMAT.to_string());
        let time_format = settings
            .time_format
            .clone()
            .unwrap_or_else(|| DEFAULT_TIME_FORMAT.to_string());
        for (attribute, value) in [("date_format", &date_format), ("time_format", &time_format)] {
            if let Err(e) = format_description::parse_owned::<2>(value) {
                return Err(ConfigError::invalid(PLUGIN, attribute, e.to_string()));
            }
        }
        let stamp_format =
            format_description::parse_owned::<2>(&format!("{date_format} {time_format}"))
                .map_err(|e| ConfigError::invalid(PLUGIN, "date_format", e.to_string()))?;
        // the quirks below are artifacts of the vendor's default patterns
        let quirk_fixups = settings.date_format.is_none();
        Ok(JournalSourceControl {
            settings,
            scope,
            stamp_format,
            quirk_fixups,
        })
    }

    fn in_scope(&self, path: &str) -> bool {
        if self.scope == "/" {
            return true;
        }
        path.starts_with(&self.scope)
            && (path.len() == self.scope.len() || path.as_bytes()[self.scope.len()] == b'/')
    }

    fn parse_entry(&self, lines: &[&str]) -> Option<Modification> {
        let path_line = lines.first().copied().unwrap_or_default();
        if lines.len() < 4 {
            debug!(entry = path_line, "skipping truncated journal entry");
            return None;
        }
        if !self.in_scope(path_line) {
            return None;
        }
        let action_line = lines[3];
        // label operations are not content changes
        if action_line.starts_with("Labeled") {
            return None;
        }
        let (author, modified_at) = match self.parse_header(lines[2]) {
            Some(parsed) => parsed,
            None => {
                warn!(
                    entry = path_line,
                    header = lines[2],
                    "skipping journal entry with unparseable header"
                );
                return None;
            }
        };
        let file = match self.parse_action(path_line, action_line) {
            Some(file) => file,
            None => {
                warn!(
                    entry = path_line,
                    action = action_line,
                    "skipping journal entry with unrecognized action"
                );
                return None;
            }
        };
        Some(Modification {
            author,
            comment: lines[4..].join(" ").trim().to_string(),
            modified_at,
            files: vec![file],
        })
    }

    fn parse_header(&self, line: &str) -> Option<(String, time::OffsetDateTime)> {
        let rest = line.strip_prefix("User:")?;
        let (author, rest) = rest.split_once("Date:")?;
        let (date, time) = rest.split_once("Time:")?;
        let author = author.trim().to_string();
        let mut date = date.trim().to_string();
        let mut time = time.trim().to_string();
        if self.quirk_fixups {
            // the vendor writes "12/:3/2024" for day 03
            if date.contains("/:") {
                date = date.replace(':', "0");
            }
            // and a bare meridiem marker, "10:12a"
            if time.ends_with('a') || time.ends_with('p') {
                time.push('m');
            }
        }
        let stamp = format!("{date} {time}");
        let parsed = PrimitiveDateTime::parse(&stamp, &self.stamp_format).ok()?;
        Some((author, parsed.assume_utc()))
    }

    fn parse_action(&self, path_line: &str, action_line: &str) -> Option<ModifiedFile> {
        if action_line.starts_with("Checked in") {
            let (folder_name, file_name) = split_path(path_line);
            return Some(ModifiedFile {
                file_name,
                folder_name,
                action: FileAction::Checkin,
            });
        }
        // renames and moves collapse to one synthetic deletion of the old
        // name, forcing a clean rebuild
        if action_line.contains(" renamed to ") || action_line.contains(" moved to ") {
            let file_name = action_line.split(' ').next()?.to_string();
            return Some(ModifiedFile {
                file_name,
                folder_name: path_line.to_string(),
                action: FileAction::RenameDelete,
            });
        }
        let (file_name, verb) = action_line.rsplit_once(' ')?;
        let action = match verb {
            "added" => FileAction::Add,
            "deleted" => FileAction::Delete,
            "recovered" => FileAction::Recover,
            "shared" => FileAction::Branch,
            _ => return None,
        };
        Some(ModifiedFile {
            file_name: file_name.trim().to_string(),
            folder_name: path_line.to_string(),
            action,
        })
    }
}

#[async_trait::async_trait]
impl SourceControl for JournalSourceControl {
    fn name(&self) -> &str {
        "journal"
    }

    async fn poll(&self, window: PollWindow) -> Result<PollReport> {
        let path = &self.settings.journal_file;
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading journal {}", path.display()))?;
        let mut report = PollReport::default();
        let mut deletion_seen = false;
        for entry in split_entries(&text) {
            let Some(modification) = self.parse_entry(&entry) else {
                continue;
            };
            if !window.contains(modification.modified_at) {
                continue;
            }
            deletion_seen |= modification.files.iter().any(|f| f.action.is_deletion());
            report.modifications.push(modification);
        }
        if !report.modifications.is_empty() {
            if let Some(name) = &self.settings.property {
                report.properties.insert(name.clone(), "true".to_string());
            }
            if deletion_seen {
                if let Some(name) = &self.settings.property_on_delete {
                    report.properties.insert(name.clone(), "true".to_string());
                }
            }
        }
        debug!(
            journal = %path.display(),
            modifications = report.modifications.len(),
            "journal poll complete"
        );
        Ok(report)
    }
}

fn normalize_scope(raw: &str) -> String {
    let trimmed = raw.trim();
    let mut scope = if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    };
    while scope.len() > 1 && scope.ends_with('/') {
        scope.pop();
    }
    scope
}

fn split_path(path: &str) -> (String, String) {
    match path.rsplit_once('/') {
        Some(("", file)) => ("/".to_string(), file.to_string()),
        Some((folder, file)) => (folder.to_string(), file.to_string()),
        None => ("/".to_string(), path.to_string()),
    }
}

fn split_entries(text: &str) -> Vec<Vec<&str>> {
    let mut entries = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in text.lines() {
        let line = line.trim_end();
        if line.is_empty() {
            if !current.is_empty() {
                entries.push(std::mem::take(&mut current));
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        entries.push(current);
    }
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use time::format_description::well_known::Rfc3339;
    use time::OffsetDateTime;

    fn ts(s: &str) -> OffsetDateTime {
        OffsetDateTime::parse(s, &Rfc3339).unwrap()
    }

    fn day_window() -> PollWindow {
        PollWindow::new(ts("2024-03-01T00:00:00Z"), ts("2024-03-02T00:00:00Z"))
    }

    fn settings(journal_file: &Path) -> JournalSettings {
        JournalSettings {
            journal_file: journal_file.to_path_buf(),
            scope: None,
            property: None,
            property_on_delete: None,
            date_format: None,
            time_format: None,
        }
    }

    fn write_journal(body: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("journal.txt");
        std::fs::write(&path, body).unwrap();
        (dir, path)
    }

    async fn poll(settings: JournalSettings, window: PollWindow) -> PollReport {
        JournalSourceControl::new(settings)
            .unwrap()
            .poll(window)
            .await
            .unwrap()
    }

    const CHECKIN: &str = "\
/web/src/parser.rs
Version: 12
User: alice  Date: 03/01/2024  Time: 10:12a
Checked in
fix crash on empty input
";

    #[tokio::test]
    async fn checkin_entry_parses_path_author_and_comment() {
        let (_dir, path) = write_journal(CHECKIN);
        let report = poll(settings(&path), day_window()).await;
        assert_eq!(report.modifications.len(), 1);
        let m = &report.modifications[0];
        assert_eq!(m.author, "alice");
        assert_eq!(m.comment, "fix crash on empty input");
        assert_eq!(m.modified_at, ts("2024-03-01T10:12:00Z"));
        assert_eq!(m.files[0].file_name, "parser.rs");
        assert_eq!(m.files[0].folder_name, "/web/src");
        assert_eq!(m.files[0].action, FileAction::Checkin);
    }

    #[tokio::test]
    async fn action_verbs_map_to_file_actions() {
        let body = "\
/web/docs
Version: 4
User: bob  Date: 03/01/2024  Time: 11:30am
manual.md added
first draft

/web/docs
Version: 5
User: bob  Date: 03/01/2024  Time: 11:31am
draft.md deleted

/web/docs
Version: 6
User: bob  Date: 03/01/2024  Time: 11:32am
old.md recovered

/web/docs
Version: 7
User: bob  Date: 03/01/2024  Time: 11:33am
common.md shared
";
        let (_dir, path) = write_journal(body);
        let report = poll(settings(&path), day_window()).await;
        let actions: Vec<FileAction> = report
            .modifications
            .iter()
            .map(|m| m.files[0].action)
            .collect();
        assert_eq!(
            actions,
            vec![
                FileAction::Add,
                FileAction::Delete,
                FileAction::Recover,
                FileAction::Branch
            ]
        );
        assert_eq!(report.modifications[0].files[0].file_name, "manual.md");
        assert_eq!(report.modifications[0].files[0].folder_name, "/web/docs");
    }

    #[tokio::test]
    async fn label_entries_are_dropped() {
        let body = "\
/web
Version: 20
User: alice  Date: 03/01/2024  Time: 09:00am
Labeled v1.0
tagging the release
";
        let (_dir, path) = write_journal(body);
        let report = poll(settings(&path), day_window()).await;
        assert!(report.modifications.is_empty());
    }

    #[tokio::test]
    async fn rename_collapses_to_single_deletion_of_old_name() {
        let body = "\
/web/src
Version: 9
User: carol  Date: 03/01/2024  Time: 02:05pm
util.rs renamed to helpers.rs
";
        let (_dir, path) = write_journal(body);
        let report = poll(settings(&path), day_window()).await;
        assert_eq!(report.modifications.len(), 1);
        let file = &report.modifications[0].files[0];
        assert_eq!(file.file_name, "util.rs");
        assert_eq!(file.action, FileAction::RenameDelete);
        assert!(file.action.is_deletion());
    }

    #[tokio::test]
    async fn move_collapses_like_rename() {
        let body = "\
/web/src
Version: 10
User: carol  Date: 03/01/2024  Time: 02:06pm
legacy.rs moved to /attic
";
        let (_dir, path) = write_journal(body);
        let report = poll(settings(&path), day_window()).await;
        assert_eq!(report.modifications.len(), 1);
        assert_eq!(report.modifications[0].files[0].file_name, "legacy.rs");
        assert_eq!(
            report.modifications[0].files[0].action,
            FileAction::RenameDelete
        );
    }

    #[tokio::test]
    async fn scope_matches_at_path_boundaries_only() {
        let body = "\
/web/src/main.rs
Version: 1
User: alice  Date: 03/01/2024  Time: 10:00am
Checked in

/web2/src/main.rs
Version: 1
User: alice  Date: 03/01/2024  Time: 10:01am
Checked in

/web
Version: 2
User: alice  Date: 03/01/2024  Time: 10:02am
notes.txt added
";
        let (_dir, path) = write_journal(body);
        let mut s = settings(&path);
        s.scope = Some("/web".into());
        let report = poll(s, day_window()).await;
        // "/web2" shares the prefix but not the boundary
        assert_eq!(report.modifications.len(), 2);
        assert_eq!(report.modifications[0].files[0].file_name, "main.rs");
        assert_eq!(report.modifications[1].files[0].file_name, "notes.txt");
    }

    #[tokio::test]
    async fn root_scope_keeps_everything() {
        let (_dir, path) = write_journal(CHECKIN);
        let mut s = settings(&path);
        s.scope = Some("/".into());
        let report = poll(s, day_window()).await;
        assert_eq!(report.modifications.len(), 1);
    }

    #[tokio::test]
    async fn scope_is_normalized_before_matching() {
        let (_dir, path) = write_journal(CHECKIN);
        let mut s = settings(&path);
        s.scope = Some("web/".into());
        let report = poll(s, day_window()).await;
        assert_eq!(report.modifications.len(), 1);
    }

    #[tokio::test]
    async fn window_lower_bound_is_exclusive() {
        let (_dir, path) = write_journal(CHECKIN);
        let window = PollWindow::new(ts("2024-03-01T10:12:00Z"), ts("2024-03-02T00:00:00Z"));
        let report = poll(settings(&path), window).await;
        assert!(report.modifications.is_empty());
    }

    #[tokio::test]
    async fn out_of_window_entries_are_dropped() {
        let (_dir, path) = write_journal(CHECKIN);
        let window = PollWindow::new(ts("2024-03-01T11:00:00Z"), ts("2024-03-02T00:00:00Z"));
        let report = poll(settings(&path), window).await;
        assert!(report.modifications.is_empty());
    }

    #[tokio::test]
    async fn date_quirks_are_corrected_under_default_formats() {
        let body = "\
/web/src/a.rs
Version: 3
User: dave  Date: 03/:3/2024  Time: 10:12a
Checked in
";
        let (_dir, path) = write_journal(body);
        let window = PollWindow::new(ts("2024-03-01T00:00:00Z"), ts("2024-03-04T00:00:00Z"));
        let report = poll(settings(&path), window).await;
        assert_eq!(report.modifications.len(), 1);
        assert_eq!(
            report.modifications[0].modified_at,
            ts("2024-03-03T10:12:00Z")
        );
    }

    #[tokio::test]
    async fn custom_date_format_disables_quirks() {
        let body = "\
/web/src/a.rs
Version: 3
User: dave  Date: 2024-03-01  Time: 10:12a
Checked in
";
        let (_dir, path) = write_journal(body);
        let mut s = settings(&path);
        s.date_format = Some("[year]-[month]-[day]".into());
        // bare "a" no longer completed to "am", so the entry is skipped
        let report = poll(s, day_window()).await;
        assert!(report.modifications.is_empty());
    }

    #[tokio::test]
    async fn custom_formats_parse_when_entry_matches() {
        let body = "\
/web/src/a.rs
Version: 3
User: dave  Date: 2024-03-01  Time: 14:12
Checked in
";
        let (_dir, path) = write_journal(body);
        let mut s = settings(&path);
        s.date_format = Some("[year]-[month]-[day]".into());
        s.time_format = Some("[hour]:[minute]".into());
        let report = poll(s, day_window()).await;
        assert_eq!(report.modifications.len(), 1);
        assert_eq!(
            report.modifications[0].modified_at,
            ts("2024-03-01T14:12:00Z")
        );
    }

    #[tokio::test]
    async fn bad_entries_do_not_poison_the_rest_of_the_file() {
        let body = "\
/web/short

/web/src/b.rs
Version: 2
User: erin  Date: garbage  Time: nonsense
Checked in

/web/src/c.rs
Version: 3
User: erin  Date: 03/01/2024  Time: 10:30am
c.rs frobnicated

/web/src/d.rs
Version: 4
User: erin  Date: 03/01/2024  Time: 10:31am
Checked in
still standing
";
        let (_dir, path) = write_journal(body);
        let report = poll(settings(&path), day_window()).await;
        assert_eq!(report.modifications.len(), 1);
        assert_eq!(report.modifications[0].files[0].file_name, "d.rs");
    }

    #[tokio::test]
    async fn side_properties_fire_only_when_triggered() {
        let body = "\
/web/docs
Version: 5
User: bob  Date: 03/01/2024  Time: 11:31am
draft.md deleted
";
        let (_dir, path) = write_journal(body);
        let mut s = settings(&path);
        s.property = Some("changes_found".into());
        s.property_on_delete = Some("deletion_found".into());
        let report = poll(s.clone(), day_window()).await;
        assert_eq!(report.properties.get("changes_found").map(String::as_str), Some("true"));
        assert_eq!(report.properties.get("deletion_found").map(String::as_str), Some("true"));

        // nothing in this window, so the map stays empty
        let later = PollWindow::new(ts("2024-03-05T00:00:00Z"), ts("2024-03-06T00:00:00Z"));
        let report = poll(s, later).await;
        assert!(report.properties.is_empty());
    }

    #[tokio::test]
    async fn checkin_without_deletion_leaves_delete_property_unset() {
        let (_dir, path) = write_journal(CHECKIN);
        let mut s = settings(&path);
        s.property = Some("changes_found".into());
        s.property_on_delete = Some("deletion_found".into());
        let report = poll(s, day_window()).await;
        assert!(report.properties.contains_key("changes_found"));
        assert!(!report.properties.contains_key("deletion_found"));
    }

    #[tokio::test]
    async fn missing_journal_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let s = settings(&dir.path().join("absent.txt"));
        let scm = JournalSourceControl::new(s).unwrap();
        assert!(scm.poll(day_window()).await.is_err());
    }

    #[test]
    fn empty_journal_file_setting_is_rejected() {
        let s = settings(Path::new(""));
        let err = JournalSourceControl::new(s).unwrap_err();
        assert_eq!(
            err.to_string(),
            "'journal_file' is required for journal source control"
        );
    }

    #[test]
    fn unparseable_format_override_is_rejected() {
        let mut s = settings(Path::new("/tmp/journal.txt"));
        s.time_format = Some("[bogus".into());
        let err = JournalSourceControl::new(s).unwrap_err();
        assert!(err.to_string().contains("'time_format'"));
    }
}
