//! # vtrack Core
//!
//! A single-user, local version tracker for document revisions.
//!
//! A *label* names a logical document and binds it to a filename template.
//! Each *update* archives new file contents under their BLAKE3 digest,
//! renames the submitted file to its versioned working name, and appends a
//! record to an append-only version log. Any past revision can be restored
//! by digest, and the most recent `track` or `update` can be undone.
//!
//! ## Features
//!
//! - Append-only text tables for labels and versions
//! - Content-addressed, gzip-compressed archive with hard deduplication
//! - Drift detection before superseded working files are deleted
//! - Single-step undo of the most recent operation
//!
//! ## Example
//!
//! ```no_run
//! use vtrack_core::{RepoConfig, Repository, UpdateOutcome};
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let repo = Repository::init(".", RepoConfig::new("FD")?)?;
//!
//! repo.track("report", "quarterly")?;
//!
//! let outcome = repo.update("report", Path::new("/tmp/draft.docx"), "a@x.com", |_plan| true)?;
//! if let UpdateOutcome::Committed(report) = outcome {
//!     println!("stored as {}", report.working_file.display());
//!
//!     // Bring the bytes back later as restored_draft.docx
//!     let digest = report.record.digest().expect("updates carry a digest");
//!     repo.restore(&digest)?;
//! }
//!
//! // Roll back the update
//! repo.undo()?;
//! # Ok(())
//! # }
//! ```

mod archive;
mod config;
mod error;
mod hash;
mod labels;
mod naming;
mod repo;
mod table;
mod versions;

pub use archive::Archive;
pub use config::{DEFAULT_TAG, RepoConfig};
pub use error::{Error, ErrorKind, Result};
pub use hash::{Algorithm, Hash};
pub use labels::{LabelEntry, LabelRegistry};
pub use naming::stored_filename;
pub use repo::{
    DATA_DIR, LabelStatus, Reinstated, Repository, RestoreReport, Supersede, UndoReport,
    UpdateOutcome, UpdatePlan, UpdateReport, WorkingState,
};
pub use versions::{Operation, Revision, VersionLog, VersionRecord};
