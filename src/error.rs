//! Error types for stream discovery.
//!
//! Nothing in here is fatal to a listing except [`StreamError::PathNotFound`]: the other
//! variants are reported as warnings against a single file or tree while the rest of the
//! listing carries on.

use std::path::PathBuf;

/// Result type alias for operations that may return a [`StreamError`].
pub type Result<T> = std::result::Result<T, StreamError>;

/// Errors that can occur while collecting stream information.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// The attribute dump tool could not be started at all.
    #[error("failed to run {program}: {source}")]
    ExecutionFailure {
        /// The program we tried to execute.
        program: PathBuf,
        /// Why spawning it failed.
        source: std::io::Error,
    },

    /// One record of the attribute dump did not follow the expected block grammar.
    #[error(transparent)]
    ProtocolViolation(#[from] ProtocolViolation),

    /// An entry could not be inspected while walking the tree.
    #[error("{} could not be analyzed: {source}", path.display())]
    FilesystemAccess {
        /// The entry that failed.
        path: PathBuf,
        /// The underlying error.
        source: std::io::Error,
    },

    /// The path to list does not exist.
    #[error("path {0:?} does not exist")]
    PathNotFound(PathBuf),
}

/// The ways in which a record of the attribute dump can be malformed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationKind {
    /// A file marker was not followed by an attribute line.
    MissingAttribute,
    /// The line after a file marker was not a well-formed attribute line.
    MalformedAttribute,
    /// Something other than a blank line or a new file marker followed the attribute line.
    UnexpectedLine,
}

/// A single malformed record in an attribute dump.
///
/// The parser skips such records and keeps going, so these are collected rather than returned
/// as a hard error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("attribute dump line {line}: {kind:?} (record for {})", path.display())]
pub struct ProtocolViolation {
    /// One-based line number of the offending line.
    pub line: usize,
    /// The path of the record that was being parsed.
    pub path: PathBuf,
    /// What went wrong.
    pub kind: ViolationKind,
}
