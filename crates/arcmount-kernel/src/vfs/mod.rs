//! Archive overlay virtual filesystem.
//!
//! Key components:
//!
//! - [`MountRegistry`] - Binds archive paths to decoded archives
//! - [`ArchiveBackend`] - Directory semantics over an archive's flat entry list
//! - [`HostBackend`] - The real filesystem
//! - [`Dispatcher`] - Routes each call to an archive or the host
//! - [`VfsOps`] - Async form of the operations, implemented by all of the above
//!
//! ## Design Decisions
//!
//! - **Archive path is the mount root**: `/pkg/app.zip/data/x` is entry
//!   `data/x` of `/pkg/app.zip`.
//! - **Segment-aware longest-prefix routing**: `/pkg/app` never covers
//!   `/pkg/app2/x`, and the most specific mount wins.
//! - **Read-only**: every mutation under a mount fails with
//!   [`VfsError::ReadOnlyArchive`].
//! - **Lazy content**: entry data is decompressed on first read and cached.

pub mod backends;
mod catalog;
mod crypto;
mod decode;
mod dispatch;
mod error;
mod mount;
mod ops;
mod stream;
mod types;

#[cfg(test)]
mod testing;

pub use backends::{ArchiveBackend, HostBackend};
pub use catalog::{EntryCatalog, EntryMeta, EntrySource};
pub use crypto::{Cipher, DEFAULT_ROUNDS, Decryptor, PasswordCipher};
pub use decode::{ArchiveDecoder, ZipDecoder};
pub use dispatch::{Dispatcher, Route};
pub use error::{CryptoError, DecodeError, MountError, VfsError, VfsResult};
pub use mount::{Mount, MountRegistry, Resolved, normalize_path};
pub use ops::VfsOps;
pub use stream::ReadStream;
pub use types::{DirEntry, Encoding, FileAttr, FileContent, FileType, ReadOptions};
