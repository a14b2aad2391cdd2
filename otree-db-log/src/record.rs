//! Log records: the JSON-equivalent units the transaction log commits
//! atomically.
//!
//! A commit is an ordered list of records. `AddFile` registers an immutable
//! data file with its index tags, `RemoveFile` logically removes one (the
//! bytes stay until garbage-collected externally), and `Metadata` installs a
//! revision plus the table schema. Re-adding an existing path replaces its
//! tags, which is how metadata-only state transitions (announce) are
//! expressed without rewriting data.

use serde::{Deserialize, Serialize};

use otree_db_core::batch::FieldInfo;
use otree_db_core::{BlockTags, Revision};

/// A data file registered in the log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AddFile {
    /// Path relative to the table root.
    pub path: String,
    /// File size in bytes, read back from the filesystem after close.
    pub size: u64,
    /// File modification time (ms since epoch).
    pub modification_time: i64,
    /// Index tags: cube, weight interval, state, revision, element count.
    pub tags: BlockTags,
}

/// Table-level metadata installed by a commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TableMetadata {
    /// The revision being installed.
    pub revision: Revision,
    /// Full table schema, so blocks can be decoded without external context.
    pub schema: Vec<FieldInfo>,
}

/// One record inside a commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum LogRecord {
    AddFile(AddFile),
    RemoveFile { path: String },
    Metadata(TableMetadata),
}

impl LogRecord {
    pub fn is_add(&self) -> bool {
        matches!(self, LogRecord::AddFile(_))
    }

    pub fn is_remove(&self) -> bool {
        matches!(self, LogRecord::RemoveFile { .. })
    }

    pub fn is_metadata(&self) -> bool {
        matches!(self, LogRecord::Metadata(_))
    }
}

/// A committed transaction: records plus the version they installed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Commit {
    /// Version this commit installed; the first commit is version 1.
    pub version: u64,
    /// Commit wall-clock time (ms since epoch).
    pub timestamp_ms: i64,
    /// The records applied atomically by this commit.
    pub records: Vec<LogRecord>,
}

impl Commit {
    /// Whether the commit only registers new files.
    ///
    /// Append-only commits are safe to rebase over; commits that remove
    /// files or change metadata force the conflicting writer to fail.
    pub fn is_append_only(&self) -> bool {
        self.records.iter().all(LogRecord::is_add)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use otree_db_core::batch::FieldType;
    use otree_db_core::{CubeId, CubeState, Weight, MAX_WEIGHT};

    fn sample_add(path: &str) -> LogRecord {
        LogRecord::AddFile(AddFile {
            path: path.to_string(),
            size: 1024,
            modification_time: 1_700_000_000_000,
            tags: BlockTags {
                cube: CubeId::root(2).child(1),
                min_weight: Weight(-100),
                max_weight: MAX_WEIGHT,
                state: CubeState::Flooded,
                revision_id: 1,
                element_count: 10,
            },
        })
    }

    #[test]
    fn test_record_json_tagging() {
        let record = sample_add("data/a.json");
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["action"], "add-file");
        let back: LogRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);

        let remove = LogRecord::RemoveFile {
            path: "data/a.json".to_string(),
        };
        let json = serde_json::to_value(&remove).unwrap();
        assert_eq!(json["action"], "remove-file");
    }

    #[test]
    fn test_metadata_record() {
        let record = LogRecord::Metadata(TableMetadata {
            revision: Revision::staging(vec!["a".to_string()], 100, 0),
            schema: vec![FieldInfo::new("a", FieldType::Int64, false)],
        });
        let json = serde_json::to_string(&record).unwrap();
        let back: LogRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
        assert!(back.is_metadata());
    }

    #[test]
    fn test_append_only() {
        let append = Commit {
            version: 1,
            timestamp_ms: 0,
            records: vec![sample_add("a"), sample_add("b")],
        };
        assert!(append.is_append_only());

        let mixed = Commit {
            version: 2,
            timestamp_ms: 0,
            records: vec![
                sample_add("c"),
                LogRecord::RemoveFile {
                    path: "a".to_string(),
                },
            ],
        };
        assert!(!mixed.is_append_only());
    }
}
