//! # status: the ledger of the last successful reconciliation
//!
//! The ledger holds the current [`DataStatus`] plus every status it
//! superseded, newest first. It is the only persisted record of what a pass
//! converged to; the rendering view and `update`/`destroy` read remote ids
//! from it.
//!
//! Saving is change-gated: when the file on disk already holds an equal
//! status nothing is written, so idempotent re-runs neither touch the file
//! nor grow the history.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::content::Format;
use crate::error::LedgerError;

/// Recorded state of one document: desired fields merged with remote identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentStatus {
    /// Logical name from the configuration.
    pub name: String,
    /// Name as stored remotely.
    pub name_remote: String,
    pub uuid: String,
    #[serde(default)]
    pub deleted: bool,
    pub description: String,
    pub content_file: PathBuf,
    pub format_in: Format,
    pub format_out: Format,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionStatus {
    pub name: String,
    pub name_remote: String,
    pub uuid: String,
    #[serde(default)]
    pub deleted: bool,
    pub description: String,
    /// Ids of the documents assigned to this collection, sorted.
    #[serde(default)]
    pub assignments: Vec<String>,
}

/// Everything one reconciliation pass produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataStatus {
    pub identifier: String,
    pub path_docs: PathBuf,
    pub collection: CollectionStatus,
    pub documents: BTreeMap<String, DocumentStatus>,
}

impl DataStatus {
    pub fn get(&self, name: &str) -> Option<&DocumentStatus> {
        self.documents.get(name)
    }

    /// True when every record has been destroyed.
    pub fn is_destroyed(&self) -> bool {
        self.collection.deleted && self.documents.values().all(|d| d.deleted)
    }
}

/// What [`StatusLedger::save`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// No file existed; the ledger was written as-is.
    Created,
    /// The status changed; the previous one was pushed onto the history.
    Appended,
    /// The status on disk is equal; the file was not touched.
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusLedger {
    pub status: DataStatus,
    /// Superseded statuses, newest first.
    #[serde(default)]
    pub history: Vec<DataStatus>,
}

impl StatusLedger {
    pub fn new(status: DataStatus) -> Self {
        Self {
            status,
            history: Vec::new(),
        }
    }

    pub fn load(path: &Path) -> Result<Self, LedgerError> {
        debug!(path = %path.display(), "Loading status ledger");
        let raw = fs::read_to_string(path).map_err(|source| LedgerError::FileUnreadable {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&raw).map_err(|source| LedgerError::ParseError {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Like [`StatusLedger::load`], but a missing file is `None`.
    pub fn load_optional(path: &Path) -> Result<Option<Self>, LedgerError> {
        if !path.exists() {
            debug!(path = %path.display(), "No status ledger yet");
            return Ok(None);
        }
        Self::load(path).map(Some)
    }

    /// Persist this ledger's status at `path`, keeping whatever history the
    /// file already has.
    pub fn save(&self, path: &Path) -> Result<SaveOutcome, LedgerError> {
        let (to_dump, outcome) = match Self::load_optional(path)? {
            Some(existing) if existing.status == self.status => {
                debug!(path = %path.display(), "No changes in status");
                return Ok(SaveOutcome::Unchanged);
            }
            Some(existing) => {
                info!(path = %path.display(), "Found change in status");
                let mut history = Vec::with_capacity(existing.history.len() + 1);
                history.push(existing.status);
                history.extend(existing.history);
                let ledger = StatusLedger {
                    status: self.status.clone(),
                    history,
                };
                (ledger, SaveOutcome::Appended)
            }
            None => (self.clone(), SaveOutcome::Created),
        };

        let raw = serde_yaml::to_string(&to_dump).map_err(LedgerError::SerializeError)?;
        info!(path = %path.display(), history_len = to_dump.history.len(), "Writing status ledger");
        fs::write(path, raw).map_err(|source| LedgerError::WriteError {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn status(description: &str) -> DataStatus {
        let mut documents = BTreeMap::new();
        documents.insert(
            "resume".to_string(),
            DocumentStatus {
                name: "resume".into(),
                name_remote: "resume-xyz-html".into(),
                uuid: "d-1".into(),
                deleted: false,
                description: description.into(),
                content_file: PathBuf::from("a.rst"),
                format_in: Format::Rst,
                format_out: Format::Html,
                tags: vec![],
            },
        );
        DataStatus {
            identifier: "xyz".into(),
            path_docs: PathBuf::from("/srv/docs"),
            collection: CollectionStatus {
                name: "cv".into(),
                name_remote: "cv-xyz".into(),
                uuid: "c-1".into(),
                deleted: false,
                description: "Curriculum vitae".into(),
                assignments: vec!["d-1".into()],
            },
            documents,
        }
    }

    #[test]
    fn first_save_creates_file_with_empty_history() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".text.status.yaml");

        let outcome = StatusLedger::new(status("one")).save(&path).unwrap();
        assert_eq!(outcome, SaveOutcome::Created);

        let loaded = StatusLedger::load(&path).unwrap();
        assert_eq!(loaded.status, status("one"));
        assert!(loaded.history.is_empty());
    }

    #[test]
    fn history_is_change_gated_and_newest_first() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".text.status.yaml");

        StatusLedger::new(status("one")).save(&path).unwrap();
        let outcome = StatusLedger::new(status("two")).save(&path).unwrap();
        assert_eq!(outcome, SaveOutcome::Appended);

        let after_second = fs::read(&path).unwrap();
        let loaded = StatusLedger::load(&path).unwrap();
        assert_eq!(loaded.status, status("two"));
        assert_eq!(loaded.history, vec![status("one")]);

        let outcome = StatusLedger::new(status("two")).save(&path).unwrap();
        assert_eq!(outcome, SaveOutcome::Unchanged);
        assert_eq!(fs::read(&path).unwrap(), after_second);

        StatusLedger::new(status("three")).save(&path).unwrap();
        let loaded = StatusLedger::load(&path).unwrap();
        assert_eq!(loaded.history, vec![status("two"), status("one")]);
    }

    #[test]
    fn deleted_flag_counts_as_a_change() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".text.status.yaml");
        StatusLedger::new(status("one")).save(&path).unwrap();

        let mut destroyed = status("one");
        destroyed.collection.deleted = true;
        let outcome = StatusLedger::new(destroyed).save(&path).unwrap();
        assert_eq!(outcome, SaveOutcome::Appended);
    }

    #[test]
    fn missing_file_is_unreadable() {
        let dir = tempdir().unwrap();
        let err = StatusLedger::load(&dir.path().join("nope.yaml")).unwrap_err();
        assert!(matches!(err, LedgerError::FileUnreadable { .. }));
        assert!(StatusLedger::load_optional(&dir.path().join("nope.yaml"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn garbage_is_a_parse_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".text.status.yaml");
        fs::write(&path, "status: [not, a, status]\n").unwrap();
        assert!(matches!(
            StatusLedger::load(&path),
            Err(LedgerError::ParseError { .. })
        ));
    }
}
