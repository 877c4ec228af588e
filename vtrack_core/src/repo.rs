//! The version engine.
//!
//! A [`Repository`] owns a working directory `W` and its data directory
//! `W/vtrack-data/`. Working files, undo renames and `restored_*` outputs
//! all live directly in `W`.
//!
//! Multi-step operations (`update`, `undo`) are not transactional. Every
//! validation runs before the first mutation, but an I/O failure midway can
//! leave partial state behind, such as an archive entry no record points to.
//! Such leftovers are reported by [`Repository::orphans`] and never repaired
//! automatically.

use crate::archive::Archive;
use crate::config::RepoConfig;
use crate::error::{Error, Result};
use crate::hash::Hash;
use crate::labels::{LabelEntry, LabelRegistry};
use crate::naming::{base_name, stored_filename, validate_field, validate_name};
use crate::versions::{Operation, Revision, VersionLog, VersionRecord};
use serde::Serialize;
use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Name of the data directory inside the working directory.
pub const DATA_DIR: &str = "vtrack-data";

const CONFIG_FILE: &str = "config";
const LABELS_TABLE: &str = "labels-table";
const VERSIONS_TABLE: &str = "versions-table";
const ARCHIVES_DIR: &str = "archives";
/// Version-log length right after the last undo.
const UNDO_MARK: &str = "undo-mark";

/// Prefix of files written by [`Repository::restore`].
pub const RESTORED_PREFIX: &str = "restored_";

/// Everything an update is about to do, shown to the confirmation callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdatePlan {
    pub label: String,
    pub input: PathBuf,
    pub author: String,
    pub digest: Hash,
    pub version: u32,
    /// Name the input will be renamed to inside the working directory.
    pub stored: String,
}

/// What happened to the working file of the version an update superseded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Supersede {
    /// The superseded record was the version-0 track record; nothing to check.
    Initial,
    /// The file still matched its archived digest and was deleted.
    Removed { path: PathBuf },
    /// The file was edited after it was archived and has been left in place.
    Drifted {
        path: PathBuf,
        expected: Hash,
        actual: Hash,
    },
    /// The file was already gone.
    Missing { path: PathBuf },
    /// The file could not be checked and has been left in place.
    Unchecked { path: PathBuf, reason: String },
}

/// Result of a committed update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateReport {
    pub record: VersionRecord,
    pub working_file: PathBuf,
    pub previous: Supersede,
}

/// Outcome of [`Repository::update`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    Committed(UpdateReport),
    /// The confirmation callback said no; nothing was changed.
    Declined,
}

/// Result of [`Repository::restore`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RestoreReport {
    pub record: VersionRecord,
    pub path: PathBuf,
}

/// What undo did with the working file of the version that became current again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Reinstated {
    /// The label is back at version 0; there is no working file.
    Initial,
    /// Decompressed from the archive.
    Extracted { path: PathBuf },
    /// A file with that name was already present and was left alone.
    Kept { path: PathBuf },
}

/// Result of [`Repository::undo`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "undone", rename_all = "snake_case")]
pub enum UndoReport {
    /// A `track` was undone; the label is unknown again.
    Track { label: String },
    /// An `update` was undone.
    Update {
        record: VersionRecord,
        /// Where the undone version's file now lives (its original name).
        reverted_to: PathBuf,
        /// True when the working file was gone and had to be decompressed.
        from_archive: bool,
        previous: Reinstated,
    },
}

impl UndoReport {
    /// The operation that was undone.
    pub fn operation(&self) -> Operation {
        match self {
            UndoReport::Track { label } => Operation::Track {
                label: label.clone(),
            },
            UndoReport::Update { record, .. } => Operation::Update {
                record: record.clone(),
            },
        }
    }
}

/// State of a label's current working file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum WorkingState {
    /// The label has no content yet (version 0).
    Initial,
    /// The file matches its archived digest.
    Clean,
    /// The file differs from its archived digest.
    Drifted { actual: Hash },
    /// The file is not in the working directory.
    Missing,
}

/// Per-label summary returned by [`Repository::status`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabelStatus {
    pub label: String,
    pub template: String,
    pub current: Option<VersionRecord>,
    pub working: WorkingState,
}

/// A version-tracking repository.
#[derive(Debug)]
pub struct Repository {
    workdir: PathBuf,
    data_dir: PathBuf,
    config: RepoConfig,
    labels: LabelRegistry,
    versions: VersionLog,
    archive: Archive,
}

impl Repository {
    /// Initialize a new repository in `workdir`.
    ///
    /// Creates the layout:
    /// - `vtrack-data/config` with version, algorithm and tag
    /// - `vtrack-data/labels-table` and `vtrack-data/versions-table`
    /// - `vtrack-data/archives/` for compressed content
    pub fn init<P: AsRef<Path>>(workdir: P, config: RepoConfig) -> Result<Self> {
        let workdir = workdir.as_ref().to_path_buf();
        let data_dir = workdir.join(DATA_DIR);

        let config_path = data_dir.join(CONFIG_FILE);
        if config_path.exists() {
            return Err(Error::already_initialized(&data_dir));
        }

        fs::create_dir_all(data_dir.join(ARCHIVES_DIR))?;
        fs::write(&config_path, config.to_file_content())?;

        let labels = LabelRegistry::open(data_dir.join(LABELS_TABLE))?;
        let versions = VersionLog::open(data_dir.join(VERSIONS_TABLE))?;
        let archive = Archive::open(data_dir.join(ARCHIVES_DIR));

        info!(workdir = %workdir.display(), tag = %config.tag, "initialized repository");

        Ok(Self {
            workdir,
            data_dir,
            config,
            labels,
            versions,
            archive,
        })
    }

    /// Open an existing repository in `workdir`.
    ///
    /// Validates the layout and reads the configuration.
    pub fn open<P: AsRef<Path>>(workdir: P) -> Result<Self> {
        let workdir = workdir.as_ref().to_path_buf();
        let data_dir = workdir.join(DATA_DIR);

        if !data_dir.is_dir() {
            return Err(Error::invalid_repository(
                &workdir,
                format!("{} directory not found", DATA_DIR),
            ));
        }

        let config_path = data_dir.join(CONFIG_FILE);
        if !config_path.is_file() {
            return Err(Error::invalid_repository(&workdir, "config file not found"));
        }
        let config = RepoConfig::parse(&fs::read_to_string(&config_path)?)?;

        for table in [LABELS_TABLE, VERSIONS_TABLE] {
            if !data_dir.join(table).is_file() {
                return Err(Error::invalid_repository(
                    &workdir,
                    format!("{} missing", table),
                ));
            }
        }

        if !data_dir.join(ARCHIVES_DIR).is_dir() {
            return Err(Error::invalid_repository(
                &workdir,
                "archives directory missing",
            ));
        }

        Ok(Self {
            labels: LabelRegistry::open(data_dir.join(LABELS_TABLE))?,
            versions: VersionLog::open(data_dir.join(VERSIONS_TABLE))?,
            archive: Archive::open(data_dir.join(ARCHIVES_DIR)),
            workdir,
            data_dir,
            config,
        })
    }

    /// Get the working directory.
    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Get the data directory.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Get the repository configuration.
    pub fn config(&self) -> &RepoConfig {
        &self.config
    }

    /// Get the label registry.
    pub fn label_registry(&self) -> &LabelRegistry {
        &self.labels
    }

    /// Get the version log.
    pub fn version_log(&self) -> &VersionLog {
        &self.versions
    }

    /// Get the content archive.
    pub fn archive(&self) -> &Archive {
        &self.archive
    }

    /// Start tracking `label`, naming its working files after `template`.
    pub fn track(&self, label: &str, template: &str) -> Result<VersionRecord> {
        validate_name("label", label)?;
        validate_name("template", template)?;

        self.labels.create(label, template)?;

        let record = VersionRecord::tracked(label, now());
        self.versions.append(&record)?;

        info!(label, template, "tracking label");
        Ok(record)
    }

    /// Commit the contents of `input` as the next version of `label`.
    ///
    /// `confirm` sees the fully validated plan and may decline it, in which
    /// case nothing is changed. On commit the input file is archived, renamed
    /// to its versioned name in the working directory, and the previous
    /// version's working file is deleted if it still matches its archive.
    pub fn update<F>(
        &self,
        label: &str,
        input: &Path,
        author: &str,
        confirm: F,
    ) -> Result<UpdateOutcome>
    where
        F: FnOnce(&UpdatePlan) -> bool,
    {
        let template = self
            .labels
            .lookup(label)?
            .ok_or_else(|| Error::label_not_found(label))?;

        let data = fs::read(input).map_err(|e| Error::source_unreadable(input, e))?;
        let original = base_name(input).ok_or_else(|| {
            Error::invalid_field(
                "file name",
                format!("{} has no usable file name", input.display()),
            )
        })?;
        validate_field("file name", &original)?;

        let digest = Hash::hash_bytes(&data);
        if self.archive.exists(&digest) {
            return Err(Error::duplicate_content(digest.to_hex()));
        }

        let previous = self.versions.latest_for(label)?;
        let version = previous.as_ref().map_or(1, |r| r.version + 1);
        let stored = stored_filename(&template, version, &self.config.tag, input);
        let target = self.workdir.join(&stored);
        if target.exists() {
            return Err(Error::path_exists(target));
        }

        validate_field("author", author)?;

        let plan = UpdatePlan {
            label: label.to_string(),
            input: input.to_path_buf(),
            author: author.to_string(),
            digest,
            version,
            stored: stored.clone(),
        };
        if !confirm(&plan) {
            info!(label, "update declined");
            return Ok(UpdateOutcome::Declined);
        }

        self.archive.put(&data)?;

        fs::rename(input, &target).map_err(|e| Error::rename_failed(input, &target, e))?;
        debug!(from = %input.display(), to = %target.display(), "renamed input");

        let superseded = self.supersede(previous.as_ref());

        let record = VersionRecord::updated(
            label,
            version,
            Revision {
                original,
                stored,
                author: author.to_string(),
                digest,
            },
            now(),
        );
        self.versions.append(&record)?;

        info!(label, version, digest = %digest, "committed update");
        Ok(UpdateOutcome::Committed(UpdateReport {
            record,
            working_file: target,
            previous: superseded,
        }))
    }

    /// Drift check on the working file of the version being superseded.
    ///
    /// Runs after the input is archived and renamed, so a failure here is
    /// reported in the result instead of stopping the record append.
    fn supersede(&self, previous: Option<&VersionRecord>) -> Supersede {
        let Some(revision) = previous.and_then(|r| r.revision.as_ref()) else {
            return Supersede::Initial;
        };

        self.remove_if_clean(revision).unwrap_or_else(|err| {
            let path = self.workdir.join(&revision.stored);
            warn!(
                path = %path.display(),
                error = %err,
                "could not check previous working file; leaving it in place"
            );
            Supersede::Unchecked {
                path,
                reason: err.to_string(),
            }
        })
    }

    fn remove_if_clean(&self, revision: &Revision) -> Result<Supersede> {
        let path = self.workdir.join(&revision.stored);
        match self.working_state(revision)? {
            WorkingState::Clean => {
                fs::remove_file(&path)?;
                debug!(path = %path.display(), "removed superseded working file");
                Ok(Supersede::Removed { path })
            }
            WorkingState::Drifted { actual } => {
                warn!(
                    path = %path.display(),
                    expected = %revision.digest,
                    actual = %actual,
                    "previous version differs from its archive; leaving it in place"
                );
                Ok(Supersede::Drifted {
                    path,
                    expected: revision.digest,
                    actual,
                })
            }
            WorkingState::Missing | WorkingState::Initial => {
                warn!(path = %path.display(), "previous working file is missing");
                Ok(Supersede::Missing { path })
            }
        }
    }

    /// Compare a working file against the digest it was archived under.
    fn working_state(&self, revision: &Revision) -> Result<WorkingState> {
        let path = self.workdir.join(&revision.stored);
        if !path.exists() {
            return Ok(WorkingState::Missing);
        }

        let actual = Hash::hash_file(&path)?;
        if actual == revision.digest {
            Ok(WorkingState::Clean)
        } else {
            Ok(WorkingState::Drifted { actual })
        }
    }

    /// Decompress the content archived under `digest` to
    /// `restored_<original name>` in the working directory.
    ///
    /// Read-only with respect to the logs and working files; an earlier
    /// restore of the same name is overwritten.
    pub fn restore(&self, digest: &Hash) -> Result<RestoreReport> {
        let record = self
            .versions
            .find_by_digest(digest)?
            .ok_or_else(|| Error::unknown_digest(digest.to_hex()))?;
        let Some(revision) = record.revision.as_ref() else {
            return Err(Error::unknown_digest(digest.to_hex()));
        };

        let path = self
            .workdir
            .join(format!("{}{}", RESTORED_PREFIX, revision.original));
        self.archive.extract_to(digest, &path)?;

        info!(digest = %digest, path = %path.display(), "restored");
        Ok(RestoreReport { record, path })
    }

    /// Undo the most recent `track` or `update`, across all labels.
    ///
    /// Only one step is kept: once an operation has been undone, `undo`
    /// fails with `AlreadyUndone` until a new `track` or `update` is made.
    pub fn undo(&self) -> Result<UndoReport> {
        let operation = self
            .versions
            .last_operation()?
            .ok_or(Error::NothingToUndo)?;

        let records = self.versions.all()?.len();
        if self.undo_mark()? == Some(records) {
            return Err(Error::AlreadyUndone);
        }

        let report = match operation {
            Operation::Track { label } => self.undo_track(label)?,
            Operation::Update { record } => self.undo_update(record)?,
        };

        fs::write(self.data_dir.join(UNDO_MARK), format!("{}\n", records - 1))?;
        Ok(report)
    }

    fn undo_mark(&self) -> Result<Option<usize>> {
        let path = self.data_dir.join(UNDO_MARK);
        if !path.is_file() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)?;
        content
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| {
                Error::corrupted_table(UNDO_MARK, format!("bad log length {:?}", content.trim()))
            })
    }

    fn undo_track(&self, label: String) -> Result<UndoReport> {
        let last = self.labels.last()?;
        if last.as_ref().map(|e| e.label.as_str()) != Some(label.as_str()) {
            return Err(Error::corrupted_table(
                LABELS_TABLE,
                format!(
                    "last label entry is {:?}, expected {:?}",
                    last.map(|e| e.label),
                    label
                ),
            ));
        }

        self.labels.remove_last()?;
        self.versions.remove_last()?;

        info!(label = %label, "undid track");
        Ok(UndoReport::Track { label })
    }

    fn undo_update(&self, record: VersionRecord) -> Result<UndoReport> {
        let Some(revision) = record.revision.clone() else {
            return Err(Error::corrupted_table(
                VERSIONS_TABLE,
                "update record without content",
            ));
        };

        let working = self.workdir.join(&revision.stored);
        let reverted_to = self.workdir.join(&revision.original);
        let renaming = working != reverted_to;
        if renaming && reverted_to.exists() {
            return Err(Error::path_exists(reverted_to));
        }

        let from_archive = if working.is_file() {
            if renaming {
                fs::rename(&working, &reverted_to)
                    .map_err(|e| Error::rename_failed(&working, &reverted_to, e))?;
            }
            false
        } else {
            warn!(
                path = %working.display(),
                "working file is missing; recovering it from the archive"
            );
            self.archive.extract_to(&revision.digest, &reverted_to)?;
            true
        };

        self.archive.remove(&revision.digest)?;
        self.versions.remove_last()?;

        let previous = match self.versions.latest_for(&record.label)? {
            Some(VersionRecord {
                revision: Some(prior),
                ..
            }) => {
                let path = self.workdir.join(&prior.stored);
                if path.exists() {
                    Reinstated::Kept { path }
                } else {
                    self.archive.extract_to(&prior.digest, &path)?;
                    Reinstated::Extracted { path }
                }
            }
            _ => Reinstated::Initial,
        };

        info!(label = %record.label, version = record.version, "undid update");
        Ok(UndoReport::Update {
            record,
            reverted_to,
            from_archive,
            previous,
        })
    }

    /// Every version record, oldest first.
    pub fn history(&self) -> Result<Vec<VersionRecord>> {
        self.versions.all()
    }

    /// Every registered label, oldest first.
    pub fn labels(&self) -> Result<Vec<LabelEntry>> {
        self.labels.all()
    }

    /// Current version and working-file state of every label.
    pub fn status(&self) -> Result<Vec<LabelStatus>> {
        let records = self.versions.all()?;

        self.labels
            .all()?
            .into_iter()
            .map(|entry| -> Result<LabelStatus> {
                let current = records
                    .iter()
                    .rev()
                    .find(|r| r.label == entry.label)
                    .cloned();
                let working = match current.as_ref().and_then(|r| r.revision.as_ref()) {
                    Some(revision) => self.working_state(revision)?,
                    None => WorkingState::Initial,
                };
                Ok(LabelStatus {
                    label: entry.label,
                    template: entry.template,
                    current,
                    working,
                })
            })
            .collect()
    }

    /// Archive entries that no version record references.
    pub fn orphans(&self) -> Result<Vec<Hash>> {
        let referenced: HashSet<Hash> = self
            .versions
            .all()?
            .iter()
            .filter_map(VersionRecord::digest)
            .collect();

        Ok(self
            .archive
            .list()?
            .into_iter()
            .filter(|hash| !referenced.contains(hash))
            .collect())
    }

    /// Write the archived content of `digest` to a writer.
    pub fn cat<W: Write>(&self, digest: &Hash, writer: W) -> Result<()> {
        self.archive.to_writer(digest, writer)
    }
}

fn now() -> chrono::NaiveDateTime {
    chrono::Local::now().naive_local()
}
