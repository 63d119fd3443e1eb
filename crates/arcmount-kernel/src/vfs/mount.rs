//! Mount registry with longest-prefix routing.
//!
//! Binds archive paths to decoded archives. A mounted archive's contents
//! appear under the archive's own path, so `/pkg/app.zip/data/x` resolves
//! to entry `data/x` of `/pkg/app.zip`.

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use super::backends::ArchiveBackend;
use super::crypto::{Decryptor, PasswordCipher};
use super::decode::{ArchiveDecoder, ZipDecoder};
use super::error::{MountError, VfsResult};

/// An installed archive.
#[derive(Debug)]
pub struct Mount {
    root: PathBuf,
    backend: ArchiveBackend,
}

impl Mount {
    /// The mount root (the archive's absolute path).
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The backend serving this mount.
    pub fn backend(&self) -> &ArchiveBackend {
        &self.backend
    }
}

/// A path resolved to a mount.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub mount: Arc<Mount>,
    /// Path relative to the mount root, `/`-joined; empty for the root itself.
    pub relative: String,
}

impl Resolved {
    pub fn relative_path(&self) -> &Path {
        Path::new(&self.relative)
    }
}

/// Make `path` absolute against the working directory and fold `.`/`..`
/// lexically.
pub fn normalize_path(path: impl AsRef<Path>) -> VfsResult<PathBuf> {
    let path = path.as_ref();
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };

    let mut result = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                result.pop();
            }
            other => result.push(other.as_os_str()),
        }
    }
    Ok(result)
}

/// Routes paths to mounted archives.
///
/// Mount roots are matched on whole path segments and the longest root
/// wins: with `/pkg/app.zip` mounted, `/pkg/app.zip2/x` is not covered.
pub struct MountRegistry {
    /// Mounts, keyed by normalized absolute path.
    mounts: RwLock<BTreeMap<PathBuf, Arc<Mount>>>,
    decoder: Arc<dyn ArchiveDecoder>,
    decryptor: Arc<dyn Decryptor>,
}

impl std::fmt::Debug for MountRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MountRegistry")
            .field("mounts", &self.mounts.read().keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Default for MountRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MountRegistry {
    /// Create an empty registry using the zip decoder and password cipher.
    pub fn new() -> Self {
        Self {
            mounts: RwLock::new(BTreeMap::new()),
            decoder: Arc::new(ZipDecoder),
            decryptor: Arc::new(PasswordCipher::new()),
        }
    }

    /// Replace the archive decoder.
    pub fn with_decoder(mut self, decoder: impl ArchiveDecoder + 'static) -> Self {
        self.decoder = Arc::new(decoder);
        self
    }

    /// Replace the decryptor.
    pub fn with_decryptor(mut self, decryptor: impl Decryptor + 'static) -> Self {
        self.decryptor = Arc::new(decryptor);
        self
    }

    /// Decrypt (optionally) and decode archive bytes into a backend.
    fn build(
        decoder: &dyn ArchiveDecoder,
        decryptor: &dyn Decryptor,
        root: PathBuf,
        data: Vec<u8>,
        algorithm: Option<&str>,
        password: Option<&str>,
    ) -> Result<Mount, MountError> {
        let data = match algorithm {
            Some(algorithm) => decryptor.decrypt(algorithm, password.unwrap_or(""), &data)?,
            None => data,
        };
        let catalog = decoder.decode(data)?;
        Ok(Mount {
            backend: ArchiveBackend::new(root.clone(), catalog),
            root,
        })
    }

    fn install(&self, mount: Mount) -> Arc<Mount> {
        let mount = Arc::new(mount);
        tracing::info!(
            root = %mount.root.display(),
            entries = mount.backend.catalog().len(),
            "mounted archive"
        );
        self.mounts
            .write()
            .insert(mount.root.clone(), Arc::clone(&mount));
        mount
    }

    /// Mount the archive at `archive_path` under its own path.
    ///
    /// With `algorithm`, the file is decrypted with `password` before
    /// decoding. Any failure leaves the registry untouched; success replaces
    /// an existing mount at the same path.
    #[tracing::instrument(skip(self, password), name = "vfs.mount")]
    pub async fn mount(
        &self,
        archive_path: impl AsRef<Path> + std::fmt::Debug,
        algorithm: Option<&str>,
        password: Option<&str>,
    ) -> VfsResult<Arc<Mount>> {
        let root = normalize_path(archive_path)?;
        let data = tokio::fs::read(&root).await.map_err(|source| {
            tracing::warn!(root = %root.display(), error = %source, "cannot read archive");
            MountError::Read {
                path: root.clone(),
                source,
            }
        })?;

        let decoder = Arc::clone(&self.decoder);
        let decryptor = Arc::clone(&self.decryptor);
        let algorithm = algorithm.map(str::to_owned);
        let password = password.map(str::to_owned);
        let build_root = root.clone();

        let built = tokio::task::spawn_blocking(move || {
            Self::build(
                decoder.as_ref(),
                decryptor.as_ref(),
                build_root,
                data,
                algorithm.as_deref(),
                password.as_deref(),
            )
        })
        .await
        .map_err(|e| MountError::Task(e.to_string()))?;

        match built {
            Ok(mount) => Ok(self.install(mount)),
            Err(e) => {
                tracing::warn!(root = %root.display(), error = %e, "mount failed");
                Err(e.into())
            }
        }
    }

    /// Blocking form of [`mount`](Self::mount), for callers outside a runtime.
    #[tracing::instrument(skip(self, password), name = "vfs.mount")]
    pub fn mount_blocking(
        &self,
        archive_path: impl AsRef<Path> + std::fmt::Debug,
        algorithm: Option<&str>,
        password: Option<&str>,
    ) -> VfsResult<Arc<Mount>> {
        let root = normalize_path(archive_path)?;
        let data = std::fs::read(&root).map_err(|source| MountError::Read {
            path: root.clone(),
            source,
        })?;

        match Self::build(
            self.decoder.as_ref(),
            self.decryptor.as_ref(),
            root.clone(),
            data,
            algorithm,
            password,
        ) {
            Ok(mount) => Ok(self.install(mount)),
            Err(e) => {
                tracing::warn!(root = %root.display(), error = %e, "mount failed");
                Err(e.into())
            }
        }
    }

    /// Find the mount covering `path`, with the path relative to its root.
    pub fn resolve(&self, path: impl AsRef<Path>) -> Option<Resolved> {
        let normalized = normalize_path(path).ok()?;
        let mounts = self.mounts.read();

        // Longest matching root
        let (root, mount) = mounts
            .iter()
            .filter(|(root, _)| normalized.starts_with(root))
            .max_by_key(|(root, _)| root.components().count())?;

        let relative = normalized
            .strip_prefix(root)
            .ok()?
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        Some(Resolved {
            mount: Arc::clone(mount),
            relative,
        })
    }

    /// Returns true if `path` is covered by some mount.
    pub fn covers(&self, path: impl AsRef<Path>) -> bool {
        self.resolve(path).is_some()
    }

    /// Returns true if an archive is mounted exactly at `root`.
    pub fn contains(&self, root: impl AsRef<Path>) -> bool {
        normalize_path(root)
            .map(|root| self.mounts.read().contains_key(&root))
            .unwrap_or(false)
    }

    /// All mount roots, sorted.
    pub fn mounts(&self) -> Vec<PathBuf> {
        self.mounts.read().keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::crypto::Cipher;
    use crate::vfs::error::VfsError;
    use crate::vfs::testing::{APP_ENTRIES, build_zip, write_zip};
    use tempfile::TempDir;

    #[test]
    fn test_normalize_path() {
        assert_eq!(
            normalize_path("/pkg/./app.zip/../app.zip/data").unwrap(),
            PathBuf::from("/pkg/app.zip/data")
        );
        assert!(normalize_path("relative/x").unwrap().is_absolute());
    }

    #[tokio::test]
    async fn test_mount_and_resolve() {
        let dir = TempDir::new().unwrap();
        let archive = write_zip(dir.path(), "app.zip", APP_ENTRIES);
        let registry = MountRegistry::new();

        let mount = registry.mount(&archive, None, None).await.unwrap();
        assert_eq!(mount.root(), archive.as_path());

        let resolved = registry.resolve(archive.join("data/config.json")).unwrap();
        assert_eq!(resolved.relative, "data/config.json");
        assert!(Arc::ptr_eq(&resolved.mount, &mount));

        let root = registry.resolve(&archive).unwrap();
        assert_eq!(root.relative, "");
    }

    #[tokio::test]
    async fn test_segment_boundary() {
        let dir = TempDir::new().unwrap();
        let archive = write_zip(dir.path(), "app", APP_ENTRIES);
        std::fs::create_dir(dir.path().join("app2")).unwrap();

        let registry = MountRegistry::new();
        registry.mount(&archive, None, None).await.unwrap();

        assert!(registry.resolve(dir.path().join("app2/file.txt")).is_none());
        assert!(registry.resolve(dir.path().join("app/data")).is_some());
        assert!(registry.resolve(dir.path()).is_none());
    }

    #[tokio::test]
    async fn test_longest_root_wins() {
        let dir = TempDir::new().unwrap();
        let outer = write_zip(dir.path(), "outer.zip", &[("inner.zip/x.txt", Some(b"outer"))]);
        let registry = MountRegistry::new();
        registry.mount(&outer, None, None).await.unwrap();

        // A second archive whose root lies inside the first one.
        let inner_root = outer.join("inner.zip");
        let inner = MountRegistry::build(
            &ZipDecoder,
            &PasswordCipher::new(),
            inner_root.clone(),
            build_zip(&[("x.txt", Some(b"inner"))]),
            None,
            None,
        )
        .unwrap();
        registry.install(inner);

        let resolved = registry.resolve(inner_root.join("x.txt")).unwrap();
        assert_eq!(resolved.mount.root(), inner_root.as_path());
        assert_eq!(resolved.relative, "x.txt");

        let resolved = registry.resolve(outer.join("inner.zip")).unwrap();
        assert_eq!(resolved.mount.root(), inner_root.as_path());
    }

    #[tokio::test]
    async fn test_remount_replaces() {
        let dir = TempDir::new().unwrap();
        let archive = write_zip(dir.path(), "app.zip", &[("old.txt", Some(b"old"))]);
        let registry = MountRegistry::new();
        registry.mount(&archive, None, None).await.unwrap();

        write_zip(dir.path(), "app.zip", &[("new.txt", Some(b"new"))]);
        registry.mount(&archive, None, None).await.unwrap();

        assert_eq!(registry.mounts(), vec![archive.clone()]);
        let backend = registry.resolve(&archive).unwrap().mount;
        assert!(!backend.backend().exists(Path::new("old.txt")));
        assert!(backend.backend().exists(Path::new("new.txt")));
    }

    #[tokio::test]
    async fn test_failed_mount_leaves_registry() {
        let dir = TempDir::new().unwrap();
        let archive = write_zip(dir.path(), "app.zip", APP_ENTRIES);
        let registry = MountRegistry::new();
        registry.mount(&archive, None, None).await.unwrap();

        std::fs::write(&archive, b"garbage").unwrap();
        let err = registry.mount(&archive, None, None).await.unwrap_err();
        assert!(matches!(err, VfsError::Mount(MountError::Decode(_))));

        let resolved = registry.resolve(archive.join("data/config.json")).unwrap();
        assert!(resolved.mount.backend().exists(resolved.relative_path()));
    }

    #[tokio::test]
    async fn test_missing_archive() {
        let dir = TempDir::new().unwrap();
        let registry = MountRegistry::new();
        let err = registry
            .mount(dir.path().join("nope.zip"), None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, VfsError::Mount(MountError::Read { .. })));
        assert!(registry.mounts().is_empty());
    }

    #[tokio::test]
    async fn test_encrypted_mount() {
        let dir = TempDir::new().unwrap();
        let cipher = PasswordCipher::with_rounds(1_000);
        let sealed = cipher
            .seal(Cipher::Aes256Gcm, "s3cret", &build_zip(APP_ENTRIES))
            .unwrap();
        let archive = dir.path().join("app.bin");
        std::fs::write(&archive, sealed).unwrap();

        let registry = MountRegistry::new().with_decryptor(cipher);
        let err = registry
            .mount(&archive, Some("aes-256-gcm"), Some("wrong"))
            .await
            .unwrap_err();
        assert!(matches!(err, VfsError::Mount(MountError::Decrypt(_))));
        assert!(!registry.contains(&archive));

        registry
            .mount(&archive, Some("aes-256-gcm"), Some("s3cret"))
            .await
            .unwrap();
        assert!(registry.contains(&archive));
        assert!(registry.covers(archive.join("data/logs/run1.txt")));
    }

    #[test]
    fn test_mount_blocking() {
        let dir = TempDir::new().unwrap();
        let archive = write_zip(dir.path(), "app.zip", APP_ENTRIES);
        let registry = MountRegistry::new();
        registry.mount_blocking(&archive, None, None).unwrap();
        assert!(registry.contains(&archive));
    }

    #[test]
    fn test_concurrent_mounts() {
        let dir = TempDir::new().unwrap();
        let registry = Arc::new(MountRegistry::new());
        let archives: Vec<_> = (0..8)
            .map(|i| write_zip(dir.path(), &format!("a{i}.zip"), APP_ENTRIES))
            .collect();

        std::thread::scope(|scope| {
            for archive in &archives {
                let registry = Arc::clone(&registry);
                scope.spawn(move || registry.mount_blocking(archive, None, None).unwrap());
            }
        });

        assert_eq!(registry.mounts().len(), 8);
        for archive in &archives {
            assert!(registry.covers(archive.join("data")));
        }
    }
}
