//! VFS error types.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::config::ConfigError;

/// VFS error type.
#[derive(Debug, Error)]
pub enum VfsError {
    /// File or directory not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Mutation attempted on a path inside a mounted archive.
    #[error("archive is read-only: {0}")]
    ReadOnlyArchive(String),

    /// Expected a directory.
    #[error("not a directory: {0}")]
    NotADirectory(String),

    /// Expected a file.
    #[error("is a directory: {0}")]
    IsADirectory(String),

    /// Invalid path.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// Operation has no archive analogue, or was never enumerated for passthrough.
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    /// Mounting an archive failed.
    #[error(transparent)]
    Mount(#[from] MountError),

    /// Overlay configuration could not be applied.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// I/O error reported by the real filesystem.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl VfsError {
    /// Create a NotFound error.
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }

    /// Create a ReadOnlyArchive error.
    pub fn read_only(path: impl Into<String>) -> Self {
        Self::ReadOnlyArchive(path.into())
    }

    /// Create a NotADirectory error.
    pub fn not_a_directory(path: impl Into<String>) -> Self {
        Self::NotADirectory(path.into())
    }

    /// Create an IsADirectory error.
    pub fn is_a_directory(path: impl Into<String>) -> Self {
        Self::IsADirectory(path.into())
    }

    /// Create an InvalidPath error.
    pub fn invalid_path(path: impl Into<String>) -> Self {
        Self::InvalidPath(path.into())
    }

    /// Create an Unsupported error.
    pub fn unsupported(op: impl Into<String>) -> Self {
        Self::Unsupported(op.into())
    }

    /// Returns true for `NotFound`, including host errors of kind `NotFound`.
    pub fn is_not_found(&self) -> bool {
        match self {
            VfsError::NotFound(_) => true,
            VfsError::Io(e) => e.kind() == io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

/// Failure while installing a mount. The registry is left unchanged.
#[derive(Debug, Error)]
pub enum MountError {
    /// Archive bytes could not be read from disk.
    #[error("cannot read archive {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// No decryptor knows the requested algorithm.
    #[error("unknown cipher algorithm: {0}")]
    UnknownAlgorithm(String),

    /// Decryption failed (wrong password, wrong algorithm, corrupt blob).
    #[error("decryption failed: {0}")]
    Decrypt(#[from] CryptoError),

    /// The decrypted bytes are not a valid archive.
    #[error("decoding failed: {0}")]
    Decode(#[from] DecodeError),

    /// The blocking decode task did not complete.
    #[error("mount task failed: {0}")]
    Task(String),
}

/// Archive decoding error.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The container could not be parsed.
    #[error("malformed archive: {0}")]
    Malformed(String),

    /// Two entries share one name.
    #[error("duplicate entry: {0}")]
    DuplicateEntry(String),

    /// An entry name cannot be represented as a relative path.
    #[error("invalid entry name: {0}")]
    InvalidName(String),

    /// A file entry has other entries nested under it.
    #[error("file entry has children: {0}")]
    FileHasChildren(String),

    /// Reading an entry's content failed.
    #[error("cannot read entry {name}: {reason}")]
    Entry { name: String, reason: String },
}

/// Decryption error.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Blob is shorter than its header.
    #[error("ciphertext too short ({0} bytes)")]
    Truncated(usize),

    /// Authentication tag did not verify.
    #[error("authentication failed (wrong password or corrupt data)")]
    Authentication,

    /// Encryption failed.
    #[error("encryption failed")]
    Seal,
}

/// Convert VfsError to std::io::Error for compatibility.
impl From<VfsError> for io::Error {
    fn from(e: VfsError) -> Self {
        match e {
            VfsError::NotFound(msg) => io::Error::new(io::ErrorKind::NotFound, msg),
            VfsError::ReadOnlyArchive(msg) => {
                io::Error::new(io::ErrorKind::ReadOnlyFilesystem, msg)
            }
            VfsError::NotADirectory(msg) => io::Error::new(io::ErrorKind::NotADirectory, msg),
            VfsError::IsADirectory(msg) => io::Error::new(io::ErrorKind::IsADirectory, msg),
            VfsError::InvalidPath(msg) => io::Error::new(io::ErrorKind::InvalidInput, msg),
            VfsError::Unsupported(msg) => io::Error::new(io::ErrorKind::Unsupported, msg),
            VfsError::Mount(e) => io::Error::other(e),
            VfsError::Config(e) => io::Error::new(io::ErrorKind::InvalidInput, e),
            VfsError::Io(e) => e,
        }
    }
}

/// VFS result type.
pub type VfsResult<T> = Result<T, VfsError>;
