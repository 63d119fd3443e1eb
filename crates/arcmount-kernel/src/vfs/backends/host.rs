//! Host filesystem backend.
//!
//! Passes operations straight to the real filesystem. Paths are host paths
//! and are used as given; errors are the host's own `io::Error`s.

use async_trait::async_trait;
use bytes::Bytes;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::vfs::error::{VfsError, VfsResult};
use crate::vfs::ops::VfsOps;
use crate::vfs::stream::ReadStream;
use crate::vfs::types::{DirEntry, FileAttr, FileContent, FileType, ReadOptions};

/// Real filesystem backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostBackend;

impl HostBackend {
    pub fn new() -> Self {
        Self
    }

    /// Start offset and byte count of the `[start, end]` window.
    fn window(options: &ReadOptions) -> (u64, u64) {
        let start = options.start.unwrap_or(0);
        let limit = match options.end {
            Some(end) if end >= start => (end - start).saturating_add(1),
            Some(_) => 0,
            None => u64::MAX,
        };
        (start, limit)
    }

    fn kind_of(file_type: std::fs::FileType) -> FileType {
        if file_type.is_dir() {
            FileType::Directory
        } else if file_type.is_symlink() {
            FileType::Symlink
        } else {
            FileType::File
        }
    }

    pub fn stat(&self, path: &Path) -> VfsResult<FileAttr> {
        let meta = std::fs::metadata(path)?;
        Ok(FileAttr::from_metadata(&meta))
    }

    pub fn lstat(&self, path: &Path) -> VfsResult<FileAttr> {
        let meta = std::fs::symlink_metadata(path)?;
        Ok(FileAttr::from_metadata(&meta))
    }

    pub fn read_dir(&self, path: &Path) -> VfsResult<Vec<DirEntry>> {
        let mut entries = Vec::new();
        for entry in std::fs::read_dir(path)? {
            let entry = entry?;
            entries.push(DirEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                kind: Self::kind_of(entry.file_type()?),
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    pub fn read_file(&self, path: &Path, options: &ReadOptions) -> VfsResult<FileContent> {
        let data = std::fs::read(path)?;
        Ok(FileContent::from_raw(Bytes::from(data), options))
    }

    /// Open the real file positioned at `start`, limited to `end` (inclusive).
    pub fn open_read_stream(&self, path: &Path, options: &ReadOptions) -> VfsResult<ReadStream> {
        let mut file = File::open(path)?;
        let (start, limit) = Self::window(options);
        if start > 0 {
            file.seek(SeekFrom::Start(start))?;
        }
        Ok(ReadStream::Host(file.take(limit)))
    }

    pub fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    pub fn write_file(&self, path: &Path, data: &[u8]) -> VfsResult<()> {
        std::fs::write(path, data).map_err(VfsError::from)
    }

    pub fn unlink(&self, path: &Path) -> VfsResult<()> {
        std::fs::remove_file(path).map_err(VfsError::from)
    }

    pub fn mkdir(&self, path: &Path) -> VfsResult<()> {
        std::fs::create_dir(path).map_err(VfsError::from)
    }

    pub fn rename(&self, from: &Path, to: &Path) -> VfsResult<()> {
        std::fs::rename(from, to).map_err(VfsError::from)
    }
}

#[async_trait]
impl VfsOps for HostBackend {
    async fn getattr(&self, path: &Path) -> VfsResult<FileAttr> {
        let meta = fs::metadata(path).await?;
        Ok(FileAttr::from_metadata(&meta))
    }

    async fn lgetattr(&self, path: &Path) -> VfsResult<FileAttr> {
        let meta = fs::symlink_metadata(path).await?;
        Ok(FileAttr::from_metadata(&meta))
    }

    async fn readdir(&self, path: &Path) -> VfsResult<Vec<DirEntry>> {
        let mut entries = Vec::new();
        let mut dir = fs::read_dir(path).await?;

        while let Some(entry) = dir.next_entry().await? {
            let file_type = entry.file_type().await?;
            entries.push(DirEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                kind: Self::kind_of(file_type),
            });
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    async fn read_file(&self, path: &Path, options: &ReadOptions) -> VfsResult<FileContent> {
        let data = fs::read(path).await?;
        Ok(FileContent::from_raw(Bytes::from(data), options))
    }

    async fn open_read_stream(
        &self,
        path: &Path,
        options: &ReadOptions,
    ) -> VfsResult<ReadStream> {
        let mut file = fs::File::open(path).await?;
        let (start, limit) = Self::window(options);
        if start > 0 {
            file.seek(SeekFrom::Start(start)).await?;
        }
        Ok(ReadStream::HostAsync(file.take(limit)))
    }

    async fn write_file(&self, path: &Path, data: &[u8]) -> VfsResult<()> {
        fs::write(path, data).await.map_err(VfsError::from)
    }

    async fn unlink(&self, path: &Path) -> VfsResult<()> {
        fs::remove_file(path).await.map_err(VfsError::from)
    }

    async fn mkdir(&self, path: &Path) -> VfsResult<()> {
        fs::create_dir(path).await.map_err(VfsError::from)
    }

    async fn rename(&self, from: &Path, to: &Path) -> VfsResult<()> {
        fs::rename(from, to).await.map_err(VfsError::from)
    }

    fn read_only(&self) -> bool {
        false
    }
}
