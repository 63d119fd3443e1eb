//! Dispatch: the single decision point between archives and the real
//! filesystem.
//!
//! Integration code calls the [`Dispatcher`] wherever it would call
//! `std::fs`. Paths under a mounted archive go to that archive's backend
//! with the mount root stripped; everything else goes to the host
//! unchanged.

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::OverlayConfig;

use super::backends::HostBackend;
use super::error::{VfsError, VfsResult};
use super::mount::{MountRegistry, Resolved};
use super::ops::VfsOps;
use super::stream::ReadStream;
use super::types::{DirEntry, FileAttr, FileContent, ReadOptions};

/// Where an operation on a path is serviced.
#[derive(Debug, Clone)]
pub enum Route {
    /// Real filesystem, with the path as given.
    Host(PathBuf),
    /// A mounted archive.
    Archive(Resolved),
}

impl Route {
    pub fn is_archive(&self) -> bool {
        matches!(self, Route::Archive(_))
    }
}

/// Routes filesystem calls to mounted archives or the host.
#[derive(Debug)]
pub struct Dispatcher {
    registry: Arc<MountRegistry>,
    host: HostBackend,
    /// Host operations with no archive analogue that may be forwarded.
    passthrough: BTreeSet<String>,
}

impl Dispatcher {
    /// Create a dispatcher over `registry`.
    pub fn new(registry: Arc<MountRegistry>) -> Self {
        Self {
            registry,
            host: HostBackend::new(),
            passthrough: BTreeSet::new(),
        }
    }

    /// Build a registry from `config`, mounting every archive in order.
    ///
    /// Fails on the first archive that cannot be mounted.
    pub async fn from_config(config: &OverlayConfig) -> VfsResult<Self> {
        Self::from_config_with(config, MountRegistry::new()).await
    }

    /// Like [`from_config`](Self::from_config), with a preconfigured registry.
    pub async fn from_config_with(
        config: &OverlayConfig,
        registry: MountRegistry,
    ) -> VfsResult<Self> {
        for entry in &config.mounts {
            let password = entry.password()?;
            registry
                .mount(&entry.archive, entry.algorithm.as_deref(), password.as_deref())
                .await?;
        }
        Ok(Self::new(Arc::new(registry)).with_passthrough(config.passthrough.iter()))
    }

    /// Enumerate host operations that may be forwarded via [`passthrough`](Self::passthrough).
    pub fn with_passthrough<I, S>(mut self, ops: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.passthrough
            .extend(ops.into_iter().map(|op| op.as_ref().to_string()));
        self
    }

    /// The underlying mount registry.
    pub fn registry(&self) -> &Arc<MountRegistry> {
        &self.registry
    }

    /// Decide where an operation on `path` is serviced.
    pub fn route(&self, path: impl AsRef<Path>) -> Route {
        let path = path.as_ref();
        match self.registry.resolve(path) {
            Some(resolved) => Route::Archive(resolved),
            None => Route::Host(path.to_path_buf()),
        }
    }

    fn route_op(&self, op: &'static str, path: &Path) -> Route {
        let route = self.route(path);
        match &route {
            Route::Archive(resolved) => tracing::debug!(
                op,
                path = %path.display(),
                mount = %resolved.mount.root().display(),
                relative = %resolved.relative,
                "archive"
            ),
            Route::Host(_) => tracing::debug!(op, path = %path.display(), "host"),
        }
        route
    }

    /// Fail with `ReadOnlyArchive` if `path` lies inside a mount.
    fn ensure_writable(&self, path: &Path) -> VfsResult<()> {
        if self.registry.covers(path) {
            return Err(VfsError::read_only(path.display().to_string()));
        }
        Ok(())
    }

    pub fn stat(&self, path: impl AsRef<Path>) -> VfsResult<FileAttr> {
        match self.route_op("stat", path.as_ref()) {
            Route::Host(p) => self.host.stat(&p),
            Route::Archive(r) => r.mount.backend().stat(r.relative_path()),
        }
    }

    pub fn lstat(&self, path: impl AsRef<Path>) -> VfsResult<FileAttr> {
        match self.route_op("lstat", path.as_ref()) {
            Route::Host(p) => self.host.lstat(&p),
            Route::Archive(r) => r.mount.backend().lstat(r.relative_path()),
        }
    }

    pub fn read_dir(&self, path: impl AsRef<Path>) -> VfsResult<Vec<DirEntry>> {
        match self.route_op("read_dir", path.as_ref()) {
            Route::Host(p) => self.host.read_dir(&p),
            Route::Archive(r) => r.mount.backend().read_dir(r.relative_path()),
        }
    }

    pub fn read_file(
        &self,
        path: impl AsRef<Path>,
        options: impl Into<ReadOptions>,
    ) -> VfsResult<FileContent> {
        let options = options.into();
        match self.route_op("read_file", path.as_ref()) {
            Route::Host(p) => self.host.read_file(&p, &options),
            Route::Archive(r) => r.mount.backend().read_file(r.relative_path(), &options),
        }
    }

    pub fn open_read_stream(
        &self,
        path: impl AsRef<Path>,
        options: impl Into<ReadOptions>,
    ) -> VfsResult<ReadStream> {
        let options = options.into();
        match self.route_op("open_read_stream", path.as_ref()) {
            Route::Host(p) => self.host.open_read_stream(&p, &options),
            Route::Archive(r) => r
                .mount
                .backend()
                .open_read_stream(r.relative_path(), &options),
        }
    }

    pub fn exists(&self, path: impl AsRef<Path>) -> bool {
        match self.route_op("exists", path.as_ref()) {
            Route::Host(p) => self.host.exists(&p),
            Route::Archive(r) => r.mount.backend().exists(r.relative_path()),
        }
    }

    pub fn write_file(&self, path: impl AsRef<Path>, data: impl AsRef<[u8]>) -> VfsResult<()> {
        match self.route_op("write_file", path.as_ref()) {
            Route::Host(p) => self.host.write_file(&p, data.as_ref()),
            Route::Archive(r) => r.mount.backend().write_file(r.relative_path(), data.as_ref()),
        }
    }

    pub fn unlink(&self, path: impl AsRef<Path>) -> VfsResult<()> {
        match self.route_op("unlink", path.as_ref()) {
            Route::Host(p) => self.host.unlink(&p),
            Route::Archive(r) => r.mount.backend().unlink(r.relative_path()),
        }
    }

    pub fn mkdir(&self, path: impl AsRef<Path>) -> VfsResult<()> {
        match self.route_op("mkdir", path.as_ref()) {
            Route::Host(p) => self.host.mkdir(&p),
            Route::Archive(r) => r.mount.backend().mkdir(r.relative_path()),
        }
    }

    /// Rename on the host; fails with `ReadOnlyArchive` if either side is mounted.
    pub fn rename(&self, from: impl AsRef<Path>, to: impl AsRef<Path>) -> VfsResult<()> {
        let (from, to) = (from.as_ref(), to.as_ref());
        self.ensure_writable(from)?;
        self.ensure_writable(to)?;
        tracing::debug!(op = "rename", from = %from.display(), to = %to.display(), "host");
        self.host.rename(from, to)
    }

    /// Forward an enumerated host-only operation to the real filesystem.
    ///
    /// `op` must have been enumerated with [`with_passthrough`](Self::with_passthrough);
    /// on a mounted path it fails since the archive has nothing to run it on.
    pub fn passthrough<T>(
        &self,
        op: &str,
        path: impl AsRef<Path>,
        f: impl FnOnce(&Path) -> io::Result<T>,
    ) -> VfsResult<T> {
        let path = path.as_ref();
        if !self.passthrough.contains(op) {
            return Err(VfsError::unsupported(op));
        }
        if self.registry.covers(path) {
            return Err(VfsError::unsupported(format!("{op} on {}", path.display())));
        }
        tracing::debug!(op, path = %path.display(), "passthrough");
        f(path).map_err(VfsError::from)
    }
}

#[async_trait]
impl VfsOps for Dispatcher {
    async fn getattr(&self, path: &Path) -> VfsResult<FileAttr> {
        match self.route_op("stat", path) {
            Route::Host(p) => self.host.getattr(&p).await,
            Route::Archive(r) => r.mount.backend().getattr(r.relative_path()).await,
        }
    }

    async fn lgetattr(&self, path: &Path) -> VfsResult<FileAttr> {
        match self.route_op("lstat", path) {
            Route::Host(p) => self.host.lgetattr(&p).await,
            Route::Archive(r) => r.mount.backend().lgetattr(r.relative_path()).await,
        }
    }

    async fn readdir(&self, path: &Path) -> VfsResult<Vec<DirEntry>> {
        match self.route_op("read_dir", path) {
            Route::Host(p) => self.host.readdir(&p).await,
            Route::Archive(r) => r.mount.backend().readdir(r.relative_path()).await,
        }
    }

    async fn read_file(&self, path: &Path, options: &ReadOptions) -> VfsResult<FileContent> {
        match self.route_op("read_file", path) {
            Route::Host(p) => VfsOps::read_file(&self.host, &p, options).await,
            Route::Archive(r) => {
                VfsOps::read_file(r.mount.backend(), r.relative_path(), options).await
            }
        }
    }

    async fn open_read_stream(
        &self,
        path: &Path,
        options: &ReadOptions,
    ) -> VfsResult<ReadStream> {
        match self.route_op("open_read_stream", path) {
            Route::Host(p) => VfsOps::open_read_stream(&self.host, &p, options).await,
            Route::Archive(r) => {
                VfsOps::open_read_stream(r.mount.backend(), r.relative_path(), options).await
            }
        }
    }

    async fn write_file(&self, path: &Path, data: &[u8]) -> VfsResult<()> {
        match self.route_op("write_file", path) {
            Route::Host(p) => VfsOps::write_file(&self.host, &p, data).await,
            Route::Archive(r) => Err(VfsError::read_only(
                r.mount.root().join(&r.relative).display().to_string(),
            )),
        }
    }

    async fn unlink(&self, path: &Path) -> VfsResult<()> {
        match self.route_op("unlink", path) {
            Route::Host(p) => VfsOps::unlink(&self.host, &p).await,
            Route::Archive(_) => Err(VfsError::read_only(path.display().to_string())),
        }
    }

    async fn mkdir(&self, path: &Path) -> VfsResult<()> {
        match self.route_op("mkdir", path) {
            Route::Host(p) => VfsOps::mkdir(&self.host, &p).await,
            Route::Archive(_) => Err(VfsError::read_only(path.display().to_string())),
        }
    }

    async fn rename(&self, from: &Path, to: &Path) -> VfsResult<()> {
        self.ensure_writable(from)?;
        self.ensure_writable(to)?;
        VfsOps::rename(&self.host, from, to).await
    }

    fn read_only(&self) -> bool {
        false
    }

    async fn exists(&self, path: &Path) -> bool {
        match self.route_op("exists", path) {
            Route::Host(p) => VfsOps::exists(&self.host, &p).await,
            Route::Archive(r) => r.mount.backend().exists(r.relative_path()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::testing::{APP_ENTRIES, write_zip};
    use crate::vfs::types::Encoding;
    use tempfile::TempDir;

    async fn setup() -> (Dispatcher, PathBuf, TempDir) {
        let dir = TempDir::new().unwrap();
        let archive = write_zip(dir.path(), "app.zip", APP_ENTRIES);
        let registry = MountRegistry::new();
        registry.mount(&archive, None, None).await.unwrap();
        (Dispatcher::new(Arc::new(registry)), archive, dir)
    }

    #[tokio::test]
    async fn test_route() {
        let (dispatcher, archive, dir) = setup().await;
        assert!(dispatcher.route(archive.join("data")).is_archive());
        assert!(!dispatcher.route(dir.path().join("app.zip2")).is_archive());

        match dispatcher.route(dir.path().join("other.txt")) {
            Route::Host(p) => assert_eq!(p, dir.path().join("other.txt")),
            Route::Archive(_) => panic!("unmounted path routed to archive"),
        }
    }

    #[tokio::test]
    async fn test_archive_reads() {
        let (dispatcher, archive, _dir) = setup().await;

        let attr = dispatcher.stat(archive.join("data")).unwrap();
        assert!(attr.is_dir());
        assert_eq!(attr.size, 0);

        let names: Vec<_> = dispatcher
            .read_dir(archive.join("data"))
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, vec!["config.json", "logs"]);

        let text = dispatcher
            .read_file(archive.join("data/config.json"), Encoding::Utf8)
            .unwrap();
        assert_eq!(text.as_text(), Some("{\"debug\": false}\n"));

        assert!(dispatcher.exists(archive.join("data/logs/run1.txt")));
        assert!(!dispatcher.exists(archive.join("data/missing.txt")));
    }

    #[tokio::test]
    async fn test_host_passthrough() {
        let (dispatcher, _archive, dir) = setup().await;
        let file = dir.path().join("notes.txt");

        dispatcher.write_file(&file, "plain file").unwrap();
        assert_eq!(dispatcher.stat(&file).unwrap().size, 10);
        let raw = dispatcher.read_file(&file, ReadOptions::new()).unwrap();
        assert_eq!(&raw.into_bytes()[..], b"plain file");

        let names: Vec<_> = dispatcher
            .read_dir(dir.path())
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, vec!["app.zip", "notes.txt"]);

        dispatcher.rename(&file, dir.path().join("moved.txt")).unwrap();
        dispatcher.unlink(dir.path().join("moved.txt")).unwrap();
        assert!(dispatcher.stat(&file).unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_mutations_rejected() {
        let (dispatcher, archive, dir) = setup().await;
        let inside = archive.join("data/config.json");
        let outside = dir.path().join("outside.txt");
        std::fs::write(&outside, b"x").unwrap();

        assert!(matches!(
            dispatcher.write_file(&inside, b"{}"),
            Err(VfsError::ReadOnlyArchive(_))
        ));
        assert!(matches!(dispatcher.unlink(&inside), Err(VfsError::ReadOnlyArchive(_))));
        assert!(matches!(
            dispatcher.mkdir(archive.join("new")),
            Err(VfsError::ReadOnlyArchive(_))
        ));
        assert!(matches!(
            dispatcher.rename(&inside, &outside),
            Err(VfsError::ReadOnlyArchive(_))
        ));
        assert!(matches!(
            dispatcher.rename(&outside, &inside),
            Err(VfsError::ReadOnlyArchive(_))
        ));
        assert!(outside.exists());
        assert_eq!(dispatcher.stat(&inside).unwrap().size, 17);
    }

    #[tokio::test]
    async fn test_passthrough_must_be_enumerated() {
        let (dispatcher, archive, dir) = setup().await;
        let dispatcher = dispatcher.with_passthrough(["canonicalize"]);

        let real = dispatcher
            .passthrough("canonicalize", dir.path(), |p| std::fs::canonicalize(p))
            .unwrap();
        assert!(real.is_absolute());

        assert!(matches!(
            dispatcher.passthrough("set_permissions", dir.path(), |_| Ok(())),
            Err(VfsError::Unsupported(_))
        ));
        assert!(matches!(
            dispatcher.passthrough("canonicalize", archive.join("data"), |p| std::fs::canonicalize(p)),
            Err(VfsError::Unsupported(_))
        ));
    }

    #[tokio::test]
    async fn test_async_routes_like_sync() {
        let (dispatcher, archive, dir) = setup().await;

        let attr = dispatcher.getattr(&archive.join("data/config.json")).await.unwrap();
        assert!(attr.is_file());
        assert_eq!(attr.size, 17);

        let entries = dispatcher.readdir(&archive).await.unwrap();
        assert_eq!(entries, vec![DirEntry::directory("data")]);

        assert!(matches!(
            dispatcher.getattr(&archive.join("data/missing.txt")).await,
            Err(VfsError::NotFound(_))
        ));
        assert!(matches!(
            VfsOps::write_file(&dispatcher, &archive.join("x"), b"1").await,
            Err(VfsError::ReadOnlyArchive(_))
        ));

        let host_entries = dispatcher.readdir(dir.path()).await.unwrap();
        assert_eq!(host_entries, vec![DirEntry::file("app.zip")]);
    }
}
