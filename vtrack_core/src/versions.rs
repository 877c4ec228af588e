//! Version log: one record per tracked state change.
//!
//! Each line of `versions-table` has eight whitespace-separated fields:
//!
//! ```text
//! DATE       TIME  LABEL  VERSION ORIGFILE   FILE                AUTHOR  DIGEST
//! 2024-05-02 14:31 report 0       none       none                none    none
//! 2024-05-02 14:40 report 1       draft.docx quarterly_1_XX.docx a@x.com 9f2c...
//! ```
//!
//! Version 0 is written by `track` and carries `none` in the last four
//! fields; every later version carries concrete values.

use crate::error::{Error, Result};
use crate::hash::Hash;
use crate::naming::NONE_SENTINEL;
use crate::table::Table;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::Serialize;
use std::path::Path;

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M";
const TABLE_NAME: &str = "versions-table";

/// The file-level details of a committed update (version >= 1).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Revision {
    /// Base name of the file that was submitted.
    pub original: String,
    /// Name of the working file the submission was renamed to.
    pub stored: String,
    /// Who submitted it.
    pub author: String,
    /// Digest of the submitted bytes; also the archive key.
    pub digest: Hash,
}

/// One line of the version log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionRecord {
    pub date: NaiveDate,
    #[serde(serialize_with = "serialize_time")]
    pub time: NaiveTime,
    pub label: String,
    pub version: u32,
    /// `None` exactly when `version == 0`.
    #[serde(flatten)]
    pub revision: Option<Revision>,
}

fn serialize_time<S: serde::Serializer>(
    time: &NaiveTime,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&time.format(TIME_FORMAT).to_string())
}

impl VersionRecord {
    /// The version-0 record written when a label starts being tracked.
    pub fn tracked(label: impl Into<String>, at: NaiveDateTime) -> Self {
        Self {
            date: at.date(),
            time: truncate_to_minute(at.time()),
            label: label.into(),
            version: 0,
            revision: None,
        }
    }

    /// A record for a committed update.
    pub fn updated(
        label: impl Into<String>,
        version: u32,
        revision: Revision,
        at: NaiveDateTime,
    ) -> Self {
        Self {
            date: at.date(),
            time: truncate_to_minute(at.time()),
            label: label.into(),
            version,
            revision: Some(revision),
        }
    }

    /// Digest of this version's content, if it has any.
    pub fn digest(&self) -> Option<Hash> {
        self.revision.as_ref().map(|r| r.digest)
    }

    /// Serialize the record to a table line.
    pub fn to_line(&self) -> String {
        let (original, stored, author, digest) = match &self.revision {
            Some(r) => (
                r.original.as_str(),
                r.stored.as_str(),
                r.author.as_str(),
                r.digest.to_hex(),
            ),
            None => (
                NONE_SENTINEL,
                NONE_SENTINEL,
                NONE_SENTINEL,
                NONE_SENTINEL.to_string(),
            ),
        };

        format!(
            "{} {} {} {} {} {} {} {}",
            self.date.format(DATE_FORMAT),
            self.time.format(TIME_FORMAT),
            self.label,
            self.version,
            original,
            stored,
            author,
            digest
        )
    }

    /// Parse a record from a table line.
    pub fn from_line(line: &str) -> Result<Self> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        let [date, time, label, version, original, stored, author, digest] = fields[..] else {
            return Err(Error::corrupted_table(
                TABLE_NAME,
                format!("expected 8 fields, got {}: {:?}", fields.len(), line),
            ));
        };

        let bad = |reason: String| Error::corrupted_table(TABLE_NAME, reason);

        let date = NaiveDate::parse_from_str(date, DATE_FORMAT)
            .map_err(|e| bad(format!("invalid date {:?}: {}", date, e)))?;
        let time = NaiveTime::parse_from_str(time, TIME_FORMAT)
            .map_err(|e| bad(format!("invalid time {:?}: {}", time, e)))?;
        let version = version
            .parse::<u32>()
            .map_err(|_| bad(format!("invalid version {:?}", version)))?;

        let sentinels = [original, stored, author, digest]
            .iter()
            .filter(|f| **f == NONE_SENTINEL)
            .count();

        let revision = match (version, sentinels) {
            (0, 4) => None,
            (0, _) => return Err(bad(format!("version 0 of {} must be all none", label))),
            (_, 0) => Some(Revision {
                original: original.to_string(),
                stored: stored.to_string(),
                author: author.to_string(),
                digest: Hash::from_hex(digest)
                    .map_err(|e| bad(format!("invalid digest {:?}: {}", digest, e)))?,
            }),
            (v, _) => {
                return Err(bad(format!(
                    "version {} of {} has a none field",
                    v, label
                )));
            }
        };

        Ok(Self {
            date,
            time,
            label: label.to_string(),
            version,
            revision,
        })
    }
}

fn truncate_to_minute(time: NaiveTime) -> NaiveTime {
    NaiveTime::from_hms_opt(time.hour(), time.minute(), 0).unwrap_or(time)
}

/// What the tail of the log represents, for undo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum Operation {
    /// A label started being tracked.
    Track { label: String },
    /// New content was committed under a label.
    Update { record: VersionRecord },
}

impl From<VersionRecord> for Operation {
    fn from(record: VersionRecord) -> Self {
        if record.revision.is_none() {
            Operation::Track {
                label: record.label,
            }
        } else {
            Operation::Update { record }
        }
    }
}

/// The append-only version log.
#[derive(Debug)]
pub struct VersionLog {
    table: Table,
}

impl VersionLog {
    /// Open or create the log at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self {
            table: Table::open(path)?,
        })
    }

    /// Append a record. Sequencing is the caller's responsibility.
    pub fn append(&self, record: &VersionRecord) -> Result<()> {
        self.table.append(&record.to_line())
    }

    /// Every record, in append order.
    pub fn all(&self) -> Result<Vec<VersionRecord>> {
        self.table
            .lines()?
            .iter()
            .map(|line| VersionRecord::from_line(line))
            .collect()
    }

    /// The most recent record for `label`.
    pub fn latest_for(&self, label: &str) -> Result<Option<VersionRecord>> {
        Ok(self.all()?.into_iter().rev().find(|r| r.label == label))
    }

    /// The record whose content has this digest.
    pub fn find_by_digest(&self, digest: &Hash) -> Result<Option<VersionRecord>> {
        Ok(self
            .all()?
            .into_iter()
            .find(|r| r.digest().as_ref() == Some(digest)))
    }

    /// The most recent record across all labels.
    pub fn last(&self) -> Result<Option<VersionRecord>> {
        self.table
            .lines()?
            .last()
            .map(|line| VersionRecord::from_line(line))
            .transpose()
    }

    /// The operation that produced the most recent record.
    pub fn last_operation(&self) -> Result<Option<Operation>> {
        Ok(self.last()?.map(Operation::from))
    }

    /// Remove the most recent record.
    pub fn remove_last(&self) -> Result<Option<VersionRecord>> {
        self.table
            .remove_last()?
            .map(|line| VersionRecord::from_line(&line))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 2)
            .unwrap()
            .and_hms_opt(h, m, 42)
            .unwrap()
    }

    fn revision(content: &[u8], original: &str, stored: &str) -> Revision {
        Revision {
            original: original.to_string(),
            stored: stored.to_string(),
            author: "a@x.com".to_string(),
            digest: Hash::hash_bytes(content),
        }
    }

    #[test]
    fn test_tracked_line_uses_sentinels() {
        let record = VersionRecord::tracked("report", at(14, 31));
        assert_eq!(
            record.to_line(),
            "2024-05-02 14:31 report 0 none none none none"
        );
        assert_eq!(VersionRecord::from_line(&record.to_line()).unwrap(), record);
    }

    #[test]
    fn test_updated_line() {
        let rev = revision(b"v1", "draft.docx", "quarterly_1_XX.docx");
        let digest = rev.digest;
        let record = VersionRecord::updated("report", 1, rev, at(9, 5));

        assert_eq!(
            record.to_line(),
            format!(
                "2024-05-02 09:05 report 1 draft.docx quarterly_1_XX.docx a@x.com {}",
                digest
            )
        );
        assert_eq!(VersionRecord::from_line(&record.to_line()).unwrap(), record);
    }

    #[test]
    fn test_from_line_rejects_mixed_sentinels() {
        let digest = Hash::hash_bytes(b"x");
        let line = format!("2024-05-02 09:05 report 0 a.txt none none {}", digest);
        assert!(VersionRecord::from_line(&line).is_err());

        let line = "2024-05-02 09:05 report 2 none none none none";
        assert!(VersionRecord::from_line(line).is_err());
    }

    #[test]
    fn test_from_line_rejects_garbage() {
        assert!(VersionRecord::from_line("2024-05-02 09:05 report").is_err());
        assert!(VersionRecord::from_line("yesterday 09:05 r 0 none none none none").is_err());
        assert!(VersionRecord::from_line("2024-05-02 9am r 0 none none none none").is_err());
        assert!(VersionRecord::from_line("2024-05-02 09:05 r -1 none none none none").is_err());
        assert!(VersionRecord::from_line("2024-05-02 09:05 r 1 a b c deadbeef").is_err());
    }

    #[test]
    fn test_latest_for_and_find_by_digest() {
        let temp_dir = TempDir::new().unwrap();
        let log = VersionLog::open(temp_dir.path().join("versions-table")).unwrap();

        log.append(&VersionRecord::tracked("report", at(9, 0))).unwrap();
        log.append(&VersionRecord::tracked("memo", at(9, 1))).unwrap();
        let r1 = VersionRecord::updated("report", 1, revision(b"one", "a.txt", "q_1_XX.txt"), at(9, 2));
        let m1 = VersionRecord::updated("memo", 1, revision(b"memo", "m.txt", "m_1_XX.txt"), at(9, 3));
        log.append(&r1).unwrap();
        log.append(&m1).unwrap();

        assert_eq!(log.latest_for("report").unwrap(), Some(r1.clone()));
        assert_eq!(log.latest_for("memo").unwrap(), Some(m1.clone()));
        assert_eq!(log.latest_for("ghost").unwrap(), None);

        assert_eq!(
            log.find_by_digest(&Hash::hash_bytes(b"one")).unwrap(),
            Some(r1)
        );
        assert_eq!(log.find_by_digest(&Hash::hash_bytes(b"nope")).unwrap(), None);
        assert_eq!(log.last().unwrap(), Some(m1));
    }

    #[test]
    fn test_last_operation() {
        let temp_dir = TempDir::new().unwrap();
        let log = VersionLog::open(temp_dir.path().join("versions-table")).unwrap();

        assert_eq!(log.last_operation().unwrap(), None);

        log.append(&VersionRecord::tracked("report", at(9, 0))).unwrap();
        assert_eq!(
            log.last_operation().unwrap(),
            Some(Operation::Track {
                label: "report".to_string()
            })
        );

        let r1 = VersionRecord::updated("report", 1, revision(b"one", "a.txt", "q_1_XX.txt"), at(9, 2));
        log.append(&r1).unwrap();
        assert_eq!(
            log.last_operation().unwrap(),
            Some(Operation::Update { record: r1 })
        );
    }

    #[test]
    fn test_remove_last() {
        let temp_dir = TempDir::new().unwrap();
        let log = VersionLog::open(temp_dir.path().join("versions-table")).unwrap();

        let t = VersionRecord::tracked("report", at(9, 0));
        log.append(&t).unwrap();

        assert_eq!(log.remove_last().unwrap(), Some(t));
        assert_eq!(log.remove_last().unwrap(), None);
        assert!(log.all().unwrap().is_empty());
    }

    #[test]
    fn test_record_json_shape() {
        let record = VersionRecord::updated(
            "report",
            1,
            revision(b"v1", "draft.docx", "quarterly_1_XX.docx"),
            at(14, 31),
        );
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["date"], "2024-05-02");
        assert_eq!(json["time"], "14:31");
        assert_eq!(json["version"], 1);
        assert_eq!(json["stored"], "quarterly_1_XX.docx");
        assert_eq!(json["digest"], Hash::hash_bytes(b"v1").to_hex());
    }

    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 128,
            ..ProptestConfig::default()
        })]

        /// Any record built from valid fields survives the table format.
        #[test]
        fn prop_line_codec(
            label in "[a-z][a-z0-9_-]{0,15}",
            original in "[A-Za-z0-9_.-]{1,20}",
            version in 1u32..10_000,
            hour in 0u32..24,
            minute in 0u32..60,
            content in prop::collection::vec(any::<u8>(), 0..64),
        ) {
            let record = VersionRecord::updated(
                label.clone(),
                version,
                Revision {
                    original,
                    stored: format!("{}_{}_XX", label, version),
                    author: "someone@example.com".to_string(),
                    digest: Hash::hash_bytes(&content),
                },
                at(hour, minute),
            );
            prop_assert_eq!(VersionRecord::from_line(&record.to_line())?, record);
        }
    }
}
