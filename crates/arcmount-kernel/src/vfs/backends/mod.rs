//! VFS backends.
//!
//! Backends implement [`VfsOps`](super::VfsOps) for the two places a path
//! can live: inside a mounted archive or on the host.

mod archive;
mod host;

pub use archive::ArchiveBackend;
pub use host::HostBackend;
