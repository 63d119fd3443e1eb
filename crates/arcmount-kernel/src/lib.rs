//! # arcmount-kernel
//!
//! Overlays archive files onto the host filesystem namespace.
//!
//! Mounting `/pkg/app.zip` makes its entries appear under that same path:
//! `/pkg/app.zip/data/config.json` reads the `data/config.json` entry, while
//! any path outside a mounted archive reaches the real filesystem. Archives
//! are read-only and may be encrypted.
//!
//! ```no_run
//! # async fn demo() -> arcmount_kernel::VfsResult<()> {
//! use std::sync::Arc;
//! use arcmount_kernel::{Dispatcher, Encoding, MountRegistry};
//!
//! let registry = MountRegistry::new();
//! registry.mount("/pkg/app.zip", None, None).await?;
//!
//! let fs = Dispatcher::new(Arc::new(registry));
//! let config = fs.read_file("/pkg/app.zip/data/config.json", Encoding::Utf8)?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod vfs;

pub use config::{ConfigError, MountConfig, OverlayConfig};
pub use vfs::{
    backends::{ArchiveBackend, HostBackend},
    ArchiveDecoder, Decryptor, DirEntry, Dispatcher, Encoding, EntryCatalog, FileAttr,
    FileContent, FileType, MountError, MountRegistry, PasswordCipher, ReadOptions, ReadStream,
    Resolved, Route, VfsError, VfsOps, VfsResult, ZipDecoder,
};
