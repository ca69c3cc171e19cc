use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// What happened to one file in a source-control change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FileAction {
    Add,
    Delete,
    Checkin,
    Recover,
    Branch,
    /// Synthetic deletion standing in for a rename or move of the old path.
    RenameDelete,
    #[serde(other)]
    Unknown,
}

impl FileAction {
    /// Deletions in both flavors trigger the delete side-property.
    pub fn is_deletion(self) -> bool {
        matches!(self, FileAction::Delete | FileAction::RenameDelete)
    }
}

/// One file touched by a [`Modification`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifiedFile {
    pub file_name: String,
    pub folder_name: String,
    pub action: FileAction,
}

/// A single source-control change detected during one poll.
///
/// Instants are UTC. The record lives only for the cycle that consumed it;
/// only the window boundary is persisted across cycles.
#[derive(Debug, Clone, PartialEq)]
pub struct Modification {
    pub author: String,
    pub comment: String,
    pub modified_at: OffsetDateTime,
    pub files: Vec<ModifiedFile>,
}

impl Modification {
    /// A modification touching zero files is invalid; adaptors drop such
    /// records before they reach the aggregator.
    pub fn is_valid(&self) -> bool {
        !self.files.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::OffsetDateTime;

    fn mod_with_files(files: Vec<ModifiedFile>) -> Modification {
        Modification {
            author: "etucker".into(),
            comment: "checked in".into(),
            modified_at: OffsetDateTime::now_utc(),
            files,
        }
    }

    #[test]
    fn modification_without_files_is_invalid() {
        assert!(!mod_with_files(vec![]).is_valid());
    }

    #[test]
    fn modification_with_files_is_valid() {
        let m = mod_with_files(vec![ModifiedFile {
            file_name: "main.c".into(),
            folder_name: "/widgets/src".into(),
            action: FileAction::Checkin,
        }]);
        assert!(m.is_valid());
    }

    #[test]
    fn file_action_serializes_kebab_case() {
        let json = serde_json::to_string(&FileAction::RenameDelete).unwrap();
        assert_eq!(json, "\"rename-delete\"");
        let back: FileAction = serde_json::from_str("\"checkin\"").unwrap();
        assert_eq!(back, FileAction::Checkin);
    }

    #[test]
    fn unrecognized_action_deserializes_as_unknown() {
        let action: FileAction = serde_json::from_str("\"pinned\"").unwrap();
        assert_eq!(action, FileAction::Unknown);
    }

    #[test]
    fn deletion_covers_both_delete_flavors() {
        assert!(FileAction::Delete.is_deletion());
        assert!(FileAction::RenameDelete.is_deletion());
        assert!(!FileAction::Add.is_deletion());
        assert!(!FileAction::Checkin.is_deletion());
    }
}
