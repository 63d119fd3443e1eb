//! Archive filesystem backend.
//!
//! Presents one decoded archive as a read-only directory tree. Stat records
//! carry the archive file's own host metadata with the kind and size of the
//! entry swapped in.

use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use crate::vfs::catalog::EntryCatalog;
use crate::vfs::error::{VfsError, VfsResult};
use crate::vfs::ops::VfsOps;
use crate::vfs::stream::ReadStream;
use crate::vfs::types::{DirEntry, FileAttr, FileContent, FileType, ReadOptions};

/// Archive filesystem backend.
///
/// All paths are relative to the archive root; the empty path is the root
/// itself. Every mutating operation fails with `ReadOnlyArchive`.
#[derive(Debug, Clone)]
pub struct ArchiveBackend {
    archive_path: PathBuf,
    catalog: Arc<EntryCatalog>,
}

impl ArchiveBackend {
    /// Wrap a catalog decoded from the archive at `archive_path`.
    pub fn new(archive_path: impl Into<PathBuf>, catalog: EntryCatalog) -> Self {
        Self {
            archive_path: archive_path.into(),
            catalog: Arc::new(catalog),
        }
    }

    /// Path of the archive file on the host.
    pub fn archive_path(&self) -> &Path {
        &self.archive_path
    }

    /// The decoded entries.
    pub fn catalog(&self) -> &EntryCatalog {
        &self.catalog
    }

    /// Convert a relative path to a catalog key (`/`-joined, no leading slash).
    fn key(path: &Path) -> VfsResult<String> {
        let mut segments: Vec<&str> = Vec::new();
        for component in path.components() {
            match component {
                Component::RootDir | Component::CurDir | Component::Prefix(_) => {}
                Component::ParentDir => {
                    segments.pop();
                }
                Component::Normal(s) => {
                    let s = s
                        .to_str()
                        .ok_or_else(|| VfsError::invalid_path(path.display().to_string()))?;
                    segments.push(s);
                }
            }
        }
        Ok(segments.join("/"))
    }

    fn host_metadata(&self) -> VfsResult<std::fs::Metadata> {
        std::fs::metadata(&self.archive_path)
            .map_err(|_| VfsError::not_found(self.archive_path.display().to_string()))
    }

    /// Kind and size of the node at `key`.
    fn kind_and_size(&self, key: &str) -> VfsResult<(FileType, u64)> {
        match self.catalog.kind_of(key) {
            Some(FileType::File) => {
                let size = self.catalog.content(key)?.len() as u64;
                Ok((FileType::File, size))
            }
            Some(kind) => Ok((kind, 0)),
            None => Err(VfsError::not_found(key)),
        }
    }

    /// Stat a path inside the archive.
    pub fn stat(&self, path: &Path) -> VfsResult<FileAttr> {
        let key = Self::key(path)?;
        let meta = self.host_metadata()?;
        let (kind, size) = self.kind_and_size(&key)?;
        Ok(FileAttr::from_host(&meta, kind, size))
    }

    /// Same as [`stat`](Self::stat); archives hold no symlinks.
    pub fn lstat(&self, path: &Path) -> VfsResult<FileAttr> {
        self.stat(path)
    }

    /// List the immediate children of a directory.
    pub fn read_dir(&self, path: &Path) -> VfsResult<Vec<DirEntry>> {
        let key = Self::key(path)?;
        match self.catalog.kind_of(&key) {
            Some(FileType::Directory) => Ok(self.catalog.children(&key)),
            Some(_) => Err(VfsError::not_a_directory(key)),
            None => Err(VfsError::not_found(key)),
        }
    }

    /// Read a whole entry, decoded as text if `options` names an encoding.
    pub fn read_file(&self, path: &Path, options: &ReadOptions) -> VfsResult<FileContent> {
        let key = Self::key(path)?;
        let data = self.catalog.content(&key)?;
        Ok(FileContent::from_raw(data, options))
    }

    /// Open a complete, in-memory stream over `[start, end]` of an entry.
    pub fn open_read_stream(&self, path: &Path, options: &ReadOptions) -> VfsResult<ReadStream> {
        let key = Self::key(path)?;
        let data = self.catalog.content(&key)?;
        Ok(ReadStream::from_bytes(options.slice(&data)))
    }

    /// Returns true if `stat` would succeed.
    pub fn exists(&self, path: &Path) -> bool {
        self.stat(path).is_ok()
    }

    fn reject(&self, path: &Path) -> VfsError {
        VfsError::read_only(self.archive_path.join(path).display().to_string())
    }

    pub fn write_file(&self, path: &Path, _data: &[u8]) -> VfsResult<()> {
        Err(self.reject(path))
    }

    pub fn unlink(&self, path: &Path) -> VfsResult<()> {
        Err(self.reject(path))
    }

    pub fn mkdir(&self, path: &Path) -> VfsResult<()> {
        Err(self.reject(path))
    }

    pub fn rename(&self, from: &Path, _to: &Path) -> VfsResult<()> {
        Err(self.reject(from))
    }
}

#[async_trait]
impl VfsOps for ArchiveBackend {
    async fn getattr(&self, path: &Path) -> VfsResult<FileAttr> {
        let key = Self::key(path)?;
        let meta = tokio::fs::metadata(&self.archive_path)
            .await
            .map_err(|_| VfsError::not_found(self.archive_path.display().to_string()))?;
        let (kind, size) = self.kind_and_size(&key)?;
        Ok(FileAttr::from_host(&meta, kind, size))
    }

    async fn readdir(&self, path: &Path) -> VfsResult<Vec<DirEntry>> {
        self.read_dir(path)
    }

    async fn read_file(&self, path: &Path, options: &ReadOptions) -> VfsResult<FileContent> {
        ArchiveBackend::read_file(self, path, options)
    }

    async fn open_read_stream(
        &self,
        path: &Path,
        options: &ReadOptions,
    ) -> VfsResult<ReadStream> {
        ArchiveBackend::open_read_stream(self, path, options)
    }

    async fn write_file(&self, path: &Path, data: &[u8]) -> VfsResult<()> {
        ArchiveBackend::write_file(self, path, data)
    }

    async fn unlink(&self, path: &Path) -> VfsResult<()> {
        ArchiveBackend::unlink(self, path)
    }

    async fn mkdir(&self, path: &Path) -> VfsResult<()> {
        ArchiveBackend::mkdir(self, path)
    }

    async fn rename(&self, from: &Path, to: &Path) -> VfsResult<()> {
        ArchiveBackend::rename(self, from, to)
    }

    fn read_only(&self) -> bool {
        true
    }
}
