//! VFS operations trait.
//!
//! The async face of every backend. Archive backends answer from memory;
//! the host backend goes through `tokio::fs`.

use async_trait::async_trait;
use std::path::Path;

use super::VfsResult;
use super::stream::ReadStream;
use super::types::{DirEntry, FileAttr, FileContent, ReadOptions};

/// Core VFS operations trait.
///
/// Paths are relative to the backend's root for archive backends, and
/// absolute host paths for the host backend. The [`Dispatcher`] handles
/// routing and path translation.
///
/// [`Dispatcher`]: super::Dispatcher
#[async_trait]
pub trait VfsOps: Send + Sync {
    // ========================================================================
    // Reading
    // ========================================================================

    /// Get file attributes.
    async fn getattr(&self, path: &Path) -> VfsResult<FileAttr>;

    /// Get file attributes without following symlinks.
    async fn lgetattr(&self, path: &Path) -> VfsResult<FileAttr> {
        self.getattr(path).await
    }

    /// Read directory entries, sorted by name.
    async fn readdir(&self, path: &Path) -> VfsResult<Vec<DirEntry>>;

    /// Read the whole file, decoded as text when `options` carries an encoding.
    async fn read_file(&self, path: &Path, options: &ReadOptions) -> VfsResult<FileContent>;

    /// Open a readable stream over the `[start, end]` slice of a file.
    async fn open_read_stream(
        &self,
        path: &Path,
        options: &ReadOptions,
    ) -> VfsResult<ReadStream>;

    // ========================================================================
    // Writing
    // ========================================================================

    /// Replace the contents of a file.
    async fn write_file(&self, path: &Path, data: &[u8]) -> VfsResult<()>;

    /// Remove a file.
    async fn unlink(&self, path: &Path) -> VfsResult<()>;

    /// Create a directory.
    async fn mkdir(&self, path: &Path) -> VfsResult<()>;

    /// Rename a file or directory.
    async fn rename(&self, from: &Path, to: &Path) -> VfsResult<()>;

    // ========================================================================
    // Metadata
    // ========================================================================

    /// Returns true if this filesystem is read-only.
    fn read_only(&self) -> bool;

    // ========================================================================
    // Convenience methods (default implementations)
    // ========================================================================

    /// Check if a path exists.
    async fn exists(&self, path: &Path) -> bool {
        self.getattr(path).await.is_ok()
    }
}
