//! Error types for vtrack_core.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using vtrack_core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse error classes, used by callers to pick exit codes and messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A label, digest, archive entry or file is absent.
    NotFound,
    /// A label, repository or destination file already exists.
    AlreadyExists,
    /// The submitted content was archived before.
    DuplicateContent,
    /// Reading, writing, renaming or (de)compressing failed.
    IoFailure,
    /// Malformed input, configuration or table content.
    Invalid,
}

/// Errors that can occur during repository operations.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error occurred during file operations.
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// Label is not present in the label registry.
    #[error("Label not found: {label}")]
    LabelNotFound { label: String },

    /// Label is already present in the label registry.
    #[error("Label already exists: {label}")]
    LabelExists { label: String },

    /// Content with this digest was archived before.
    #[error("Content already archived: {digest}")]
    DuplicateContent { digest: String },

    /// No version record carries this digest.
    #[error("Unknown digest: {digest}")]
    UnknownDigest { digest: String },

    /// A version record references an archive entry that is not on disk.
    #[error("Archive entry not found: {digest}")]
    ArchiveNotFound { digest: String },

    /// Archive entry does not decompress to the bytes its key names.
    #[error("Corrupted archive entry at {path}: {reason}")]
    CorruptedArchive { path: PathBuf, reason: String },

    /// The file submitted for an update could not be read.
    #[error("Cannot read source file {path}: {source}")]
    SourceUnreadable {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Moving a working file into place failed.
    #[error("Cannot rename {from} to {to}: {source}")]
    RenameFailed {
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },

    /// The version log is empty.
    #[error("Nothing to undo")]
    NothingToUndo,

    /// The most recent operation was already undone; only one step is kept.
    #[error("The last operation was already undone")]
    AlreadyUndone,

    /// Destination file already exists in the working directory.
    #[error("Path already exists: {path}")]
    PathExists { path: PathBuf },

    /// Repository already initialized.
    #[error("Repository already initialized at {path}")]
    AlreadyInitialized { path: PathBuf },

    /// Repository is missing or incomplete.
    #[error("Invalid repository at {path}: {reason}")]
    InvalidRepository { path: PathBuf, reason: String },

    /// Repository config could not be parsed.
    #[error("Invalid config: {reason}")]
    InvalidConfig { reason: String },

    /// A table line could not be parsed, or the tables disagree.
    #[error("Corrupted table {table}: {reason}")]
    CorruptedTable { table: String, reason: String },

    /// A field would not survive the whitespace-separated table format.
    #[error("Invalid {field}: {reason}")]
    InvalidField { field: String, reason: String },

    /// Invalid hash format or encoding.
    #[error("Invalid hash: {reason}")]
    InvalidHash { reason: String },

    /// Unsupported algorithm.
    #[error("Unsupported algorithm: {algorithm}")]
    UnsupportedAlgorithm { algorithm: String },
}

impl Error {
    /// Create a LabelNotFound error.
    pub fn label_not_found(label: impl Into<String>) -> Self {
        Error::LabelNotFound {
            label: label.into(),
        }
    }

    /// Create a LabelExists error.
    pub fn label_exists(label: impl Into<String>) -> Self {
        Error::LabelExists {
            label: label.into(),
        }
    }

    /// Create a DuplicateContent error.
    pub fn duplicate_content(digest: impl Into<String>) -> Self {
        Error::DuplicateContent {
            digest: digest.into(),
        }
    }

    /// Create an UnknownDigest error.
    pub fn unknown_digest(digest: impl Into<String>) -> Self {
        Error::UnknownDigest {
            digest: digest.into(),
        }
    }

    /// Create an ArchiveNotFound error.
    pub fn archive_not_found(digest: impl Into<String>) -> Self {
        Error::ArchiveNotFound {
            digest: digest.into(),
        }
    }

    /// Create a CorruptedArchive error.
    pub fn corrupted_archive(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::CorruptedArchive {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a SourceUnreadable error.
    pub fn source_unreadable(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::SourceUnreadable {
            path: path.into(),
            source,
        }
    }

    /// Create a RenameFailed error.
    pub fn rename_failed(
        from: impl Into<PathBuf>,
        to: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        Error::RenameFailed {
            from: from.into(),
            to: to.into(),
            source,
        }
    }

    /// Create a PathExists error.
    pub fn path_exists(path: impl Into<PathBuf>) -> Self {
        Error::PathExists { path: path.into() }
    }

    /// Create an AlreadyInitialized error.
    pub fn already_initialized(path: impl Into<PathBuf>) -> Self {
        Error::AlreadyInitialized { path: path.into() }
    }

    /// Create an InvalidRepository error.
    pub fn invalid_repository(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::InvalidRepository {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create an InvalidConfig error.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Error::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Create a CorruptedTable error.
    pub fn corrupted_table(table: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::CorruptedTable {
            table: table.into(),
            reason: reason.into(),
        }
    }

    /// Create an InvalidField error.
    pub fn invalid_field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create an InvalidHash error.
    pub fn invalid_hash(reason: impl Into<String>) -> Self {
        Error::InvalidHash {
            reason: reason.into(),
        }
    }

    /// Create an UnsupportedAlgorithm error.
    pub fn unsupported_algorithm(algorithm: impl Into<String>) -> Self {
        Error::UnsupportedAlgorithm {
            algorithm: algorithm.into(),
        }
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::LabelNotFound { .. }
            | Error::UnknownDigest { .. }
            | Error::ArchiveNotFound { .. }
            | Error::NothingToUndo
            | Error::AlreadyUndone => ErrorKind::NotFound,
            Error::LabelExists { .. }
            | Error::PathExists { .. }
            | Error::AlreadyInitialized { .. } => ErrorKind::AlreadyExists,
            Error::DuplicateContent { .. } => ErrorKind::DuplicateContent,
            Error::Io { .. }
            | Error::SourceUnreadable { .. }
            | Error::RenameFailed { .. }
            | Error::CorruptedArchive { .. } => ErrorKind::IoFailure,
            Error::InvalidRepository { .. }
            | Error::InvalidConfig { .. }
            | Error::CorruptedTable { .. }
            | Error::InvalidField { .. }
            | Error::InvalidHash { .. }
            | Error::UnsupportedAlgorithm { .. } => ErrorKind::Invalid,
        }
    }
}

impl From<tempfile::PersistError> for Error {
    fn from(err: tempfile::PersistError) -> Self {
        Error::Io { source: err.error }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        assert_eq!(Error::label_not_found("x").kind(), ErrorKind::NotFound);
        assert_eq!(Error::NothingToUndo.kind(), ErrorKind::NotFound);
        assert_eq!(Error::AlreadyUndone.kind(), ErrorKind::NotFound);
        assert_eq!(Error::label_exists("x").kind(), ErrorKind::AlreadyExists);
        assert_eq!(
            Error::duplicate_content("ab").kind(),
            ErrorKind::DuplicateContent
        );
        assert_eq!(
            Error::rename_failed("a", "b", std::io::Error::other("boom")).kind(),
            ErrorKind::IoFailure
        );
        assert_eq!(Error::invalid_field("label", "empty").kind(), ErrorKind::Invalid);
    }

    #[test]
    fn test_display_names_subject() {
        let err = Error::label_not_found("report");
        assert_eq!(err.to_string(), "Label not found: report");

        let err = Error::invalid_field("author", "contains whitespace");
        assert_eq!(err.to_string(), "Invalid author: contains whitespace");
    }
}
