//! VFS error types.

use std::fmt;
use std::io;
use thiserror::Error;

use crate::remote::RemoteError;

/// VFS error type.
///
/// Every backend of the [`Fs`](super::Fs) contract reports failures through
/// this taxonomy so callers can treat not-found and already-exists the same
/// way regardless of where the bytes live.
#[derive(Debug, Error)]
pub enum VfsError {
    /// File or directory not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Path already exists.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// A file operation was invoked on a handle without a file capability.
    #[error("no file capability on handle, is this a directory? {0}")]
    NotAFile(String),

    /// A directory operation was invoked on a handle without a directory capability.
    #[error("no directory capability on handle, is this a file? {0}")]
    NotADirectory(String),

    /// The backend does not implement this operation.
    #[error("not implemented: {0}")]
    Unsupported(&'static str),

    /// Both capabilities of a handle failed to close.
    #[error("failed to close handle: {first}; {second}")]
    CloseFailed {
        first: Box<VfsError>,
        second: Box<VfsError>,
    },

    /// An operation failed; `source` is the underlying cause.
    #[error("{op} {target}: {source}")]
    Op {
        op: &'static str,
        target: String,
        #[source]
        source: Box<VfsError>,
    },

    /// Path escapes root (security violation).
    #[error("path escapes root: {0}")]
    PathEscapesRoot(String),

    /// Invalid path.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// Unclassified remote client error, passed through unchanged.
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl VfsError {
    /// Create a NotFound error.
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }

    /// Create an AlreadyExists error.
    pub fn already_exists(path: impl Into<String>) -> Self {
        Self::AlreadyExists(path.into())
    }

    /// Create a PathEscapesRoot error.
    pub fn path_escapes_root(path: impl Into<String>) -> Self {
        Self::PathEscapesRoot(path.into())
    }

    /// Create an InvalidPath error.
    pub fn invalid_path(path: impl Into<String>) -> Self {
        Self::InvalidPath(path.into())
    }

    /// Wrap this error with the operation and path it happened during.
    pub fn during(self, op: &'static str, target: impl Into<String>) -> Self {
        Self::Op {
            op,
            target: target.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, with any `Op` context peeled off.
    pub fn root_cause(&self) -> &VfsError {
        match self {
            Self::Op { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Returns true if this error means the path does not exist.
    pub fn is_not_found(&self) -> bool {
        match self.root_cause() {
            Self::NotFound(_) => true,
            Self::Io(e) => e.kind() == io::ErrorKind::NotFound,
            _ => false,
        }
    }

    /// Returns true if this error means the path already exists.
    pub fn is_already_exists(&self) -> bool {
        match self.root_cause() {
            Self::AlreadyExists(_) => true,
            Self::Io(e) => e.kind() == io::ErrorKind::AlreadyExists,
            _ => false,
        }
    }
}

/// Convert VfsError to std::io::Error for the `Read`/`Write`/`Seek` impls.
impl From<VfsError> for io::Error {
    fn from(e: VfsError) -> Self {
        let kind = match e.root_cause() {
            VfsError::NotFound(_) => io::ErrorKind::NotFound,
            VfsError::AlreadyExists(_) => io::ErrorKind::AlreadyExists,
            VfsError::NotAFile(_) => io::ErrorKind::IsADirectory,
            VfsError::NotADirectory(_) => io::ErrorKind::NotADirectory,
            VfsError::Unsupported(_) => io::ErrorKind::Unsupported,
            VfsError::PathEscapesRoot(_) => io::ErrorKind::PermissionDenied,
            VfsError::InvalidPath(_) => io::ErrorKind::InvalidInput,
            VfsError::Io(inner) => inner.kind(),
            _ => io::ErrorKind::Other,
        };
        match e {
            VfsError::Io(inner) => inner,
            other => io::Error::new(kind, other),
        }
    }
}

/// VFS result type.
pub type VfsResult<T> = Result<T, VfsError>;

/// A directory listing that stopped early.
///
/// Carries the entries collected before the failure alongside the error, so
/// callers can still use what was read.
pub struct PartialListing<T> {
    pub entries: Vec<T>,
    pub source: VfsError,
}

impl<T> PartialListing<T> {
    pub fn new(entries: Vec<T>, source: VfsError) -> Self {
        Self { entries, source }
    }

    /// Split into the collected entries and the error.
    pub fn into_parts(self) -> (Vec<T>, VfsError) {
        (self.entries, self.source)
    }

    /// Discard the partial entries and keep the error.
    pub fn into_error(self) -> VfsError {
        self.source
    }

    /// Transform the error, keeping the entries.
    pub fn map_err(self, f: impl FnOnce(VfsError) -> VfsError) -> Self {
        Self {
            entries: self.entries,
            source: f(self.source),
        }
    }

    /// Transform the entries, keeping the error.
    pub fn map_entries<U>(self, f: impl FnMut(T) -> U) -> PartialListing<U> {
        PartialListing {
            entries: self.entries.into_iter().map(f).collect(),
            source: self.source,
        }
    }
}

impl<T> From<VfsError> for PartialListing<T> {
    fn from(source: VfsError) -> Self {
        Self::new(Vec::new(), source)
    }
}

impl<T> fmt::Debug for PartialListing<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PartialListing")
            .field("entries", &self.entries.len())
            .field("source", &self.source)
            .finish()
    }
}

impl<T> fmt::Display for PartialListing<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (after {} entries)", self.source, self.entries.len())
    }
}

impl<T> std::error::Error for PartialListing<T> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

/// Result of a directory listing: everything requested, or what was read
/// before the failure.
pub type Listing<T> = Result<Vec<T>, PartialListing<T>>;
