//! Core VFS types.
//!
//! Stat records, directory entries and the read options accepted by
//! `read_file` / `open_read_stream`.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::SystemTime;
use strum::EnumString;

/// File type enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileType {
    /// Regular file.
    File,
    /// Directory.
    Directory,
    /// Symbolic link.
    Symlink,
}

impl FileType {
    /// Returns true if this is a regular file.
    pub fn is_file(&self) -> bool {
        matches!(self, FileType::File)
    }

    /// Returns true if this is a directory.
    pub fn is_dir(&self) -> bool {
        matches!(self, FileType::Directory)
    }

    /// Returns true if this is a symbolic link.
    pub fn is_symlink(&self) -> bool {
        matches!(self, FileType::Symlink)
    }
}

/// File attributes (metadata).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileAttr {
    /// Size in bytes.
    pub size: u64,
    /// File type.
    pub kind: FileType,
    /// Unix permissions (e.g., 0o644).
    pub perm: u32,
    /// Last modification time.
    pub mtime: SystemTime,
    /// Last access time (optional).
    pub atime: Option<SystemTime>,
    /// Creation time (optional).
    pub ctime: Option<SystemTime>,
    /// Number of hard links.
    pub nlink: u32,
    /// User ID (optional, for local fs).
    pub uid: Option<u32>,
    /// Group ID (optional, for local fs).
    pub gid: Option<u32>,
}

impl FileAttr {
    /// Build a record from host metadata as-is.
    pub fn from_metadata(meta: &std::fs::Metadata) -> Self {
        let kind = if meta.is_dir() {
            FileType::Directory
        } else if meta.file_type().is_symlink() {
            FileType::Symlink
        } else {
            FileType::File
        };
        Self::from_host(meta, kind, meta.len())
    }

    /// Build a record carrying the host's timestamps and ownership, with
    /// `kind` and `size` taken from elsewhere (an archive entry).
    pub fn from_host(meta: &std::fs::Metadata, kind: FileType, size: u64) -> Self {
        #[cfg(unix)]
        let (perm, nlink, uid, gid) = {
            use std::os::unix::fs::{MetadataExt, PermissionsExt};
            (
                meta.permissions().mode(),
                meta.nlink() as u32,
                Some(meta.uid()),
                Some(meta.gid()),
            )
        };

        #[cfg(not(unix))]
        let (perm, nlink, uid, gid) = {
            let perm = if meta.permissions().readonly() { 0o444 } else { 0o644 };
            (perm, 1, None, None)
        };

        Self {
            size,
            kind,
            perm,
            mtime: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            atime: meta.accessed().ok(),
            ctime: meta.created().ok(),
            nlink,
            uid,
            gid,
        }
    }

    /// Returns true if this is a regular file.
    pub fn is_file(&self) -> bool {
        self.kind.is_file()
    }

    /// Returns true if this is a directory.
    pub fn is_dir(&self) -> bool {
        self.kind.is_dir()
    }

    /// Returns true if this is a symbolic link.
    pub fn is_symlink(&self) -> bool {
        self.kind.is_symlink()
    }
}

/// Directory entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntry {
    /// Entry name (not full path).
    pub name: String,
    /// Entry type.
    pub kind: FileType,
}

impl DirEntry {
    /// Create a new directory entry.
    pub fn new(name: impl Into<String>, kind: FileType) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    /// Create a file entry.
    pub fn file(name: impl Into<String>) -> Self {
        Self::new(name, FileType::File)
    }

    /// Create a directory entry.
    pub fn directory(name: impl Into<String>) -> Self {
        Self::new(name, FileType::Directory)
    }
}

/// Text encodings understood by `read_file`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum Encoding {
    #[strum(serialize = "utf8", serialize = "utf-8")]
    Utf8,
    #[strum(serialize = "latin1", serialize = "binary")]
    Latin1,
    #[strum(serialize = "ascii")]
    Ascii,
    #[strum(serialize = "utf16le", serialize = "utf-16le", serialize = "ucs2", serialize = "ucs-2")]
    Utf16Le,
    #[strum(serialize = "hex")]
    Hex,
    #[strum(serialize = "base64")]
    Base64,
}

impl Encoding {
    /// Parse from string (case-insensitive).
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        <Self as FromStr>::from_str(s).ok()
    }

    /// Decode raw bytes into a string.
    ///
    /// UTF-8 and UTF-16 decoding are lossy; a trailing odd byte is dropped
    /// for UTF-16.
    pub fn decode(&self, data: &[u8]) -> String {
        match self {
            Encoding::Utf8 => String::from_utf8_lossy(data).into_owned(),
            Encoding::Latin1 => data.iter().map(|&b| b as char).collect(),
            Encoding::Ascii => data.iter().map(|&b| (b & 0x7f) as char).collect(),
            Encoding::Utf16Le => {
                let units = data
                    .chunks_exact(2)
                    .map(|pair| u16::from_le_bytes([pair[0], pair[1]]));
                char::decode_utf16(units)
                    .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
                    .collect()
            }
            Encoding::Hex => {
                use std::fmt::Write;
                data.iter().fold(String::with_capacity(data.len() * 2), |mut s, b| {
                    let _ = write!(s, "{b:02x}");
                    s
                })
            }
            Encoding::Base64 => BASE64.encode(data),
        }
    }
}

/// Options for `read_file` and `open_read_stream`.
///
/// `start` and `end` are an inclusive byte range and only apply to streams.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadOptions {
    /// Decode the content to text with this encoding.
    pub encoding: Option<Encoding>,
    /// First byte offset (default 0).
    pub start: Option<u64>,
    /// Last byte offset, inclusive (default: last byte).
    pub end: Option<u64>,
}

impl ReadOptions {
    /// Create empty options (raw bytes, whole content).
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the text encoding.
    pub fn with_encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = Some(encoding);
        self
    }

    /// Set the first byte offset.
    pub fn with_start(mut self, start: u64) -> Self {
        self.start = Some(start);
        self
    }

    /// Set the last byte offset (inclusive).
    pub fn with_end(mut self, end: u64) -> Self {
        self.end = Some(end);
        self
    }

    /// Slice `data` to the inclusive `[start, end]` range.
    ///
    /// An empty slice results when `start` is past the end or after `end`.
    pub fn slice(&self, data: &Bytes) -> Bytes {
        let len = data.len() as u64;
        if len == 0 {
            return Bytes::new();
        }
        let start = self.start.unwrap_or(0);
        let end = self.end.unwrap_or(len - 1).min(len - 1);
        if start > end {
            return Bytes::new();
        }
        data.slice(start as usize..=end as usize)
    }
}

/// A bare encoding is shorthand for `ReadOptions { encoding, .. }`.
impl From<Encoding> for ReadOptions {
    fn from(encoding: Encoding) -> Self {
        Self::new().with_encoding(encoding)
    }
}

/// Result of `read_file`: raw bytes, or text when an encoding was requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileContent {
    Bytes(Bytes),
    Text(String),
}

impl FileContent {
    /// Apply the encoding from `options`, if any.
    pub fn from_raw(data: Bytes, options: &ReadOptions) -> Self {
        match options.encoding {
            Some(encoding) => FileContent::Text(encoding.decode(&data)),
            None => FileContent::Bytes(data),
        }
    }

    /// Returns the raw bytes, if this is binary content.
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            FileContent::Bytes(b) => Some(b),
            FileContent::Text(_) => None,
        }
    }

    /// Returns the text, if an encoding was applied.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FileContent::Text(s) => Some(s),
            FileContent::Bytes(_) => None,
        }
    }

    /// Consume into bytes; text is returned as its UTF-8 representation.
    pub fn into_bytes(self) -> Bytes {
        match self {
            FileContent::Bytes(b) => b,
            FileContent::Text(s) => Bytes::from(s),
        }
    }
}
