//! Entry catalog: the decoded, read-only entry list of one archive.
//!
//! Names are relative, `/`-separated, with no leading or trailing slash.
//! Directories may be listed explicitly or only implied by descendant
//! names; both are treated the same way.

use bytes::Bytes;
use std::collections::BTreeMap;
use std::io;
use std::sync::OnceLock;

use super::error::{DecodeError, VfsError, VfsResult};
use super::types::{DirEntry, FileType};

/// Reads the content of an entry on demand.
///
/// Implemented by decoders that keep the container around and decompress
/// entries lazily.
pub trait EntrySource: Send + Sync {
    /// Read the full content of the entry at `index` (as passed to
    /// [`EntryCatalog::new`]).
    fn read_entry(&self, index: usize, name: &str) -> Result<Vec<u8>, DecodeError>;
}

/// Entry description produced by a decoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryMeta {
    pub name: String,
    pub is_dir: bool,
}

impl EntryMeta {
    pub fn file(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_dir: false,
        }
    }

    pub fn directory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_dir: true,
        }
    }
}

#[derive(Debug)]
struct CatalogEntry {
    /// Index into the source.
    index: usize,
    is_dir: bool,
    content: OnceLock<Bytes>,
}

/// Immutable view over an archive's entries.
pub struct EntryCatalog {
    entries: BTreeMap<String, CatalogEntry>,
    source: Box<dyn EntrySource>,
}

impl std::fmt::Debug for EntryCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntryCatalog")
            .field("entries", &self.entries.len())
            .finish()
    }
}

/// Entries held in memory, used by [`EntryCatalog::from_memory`].
struct MemorySource(Vec<Bytes>);

impl EntrySource for MemorySource {
    fn read_entry(&self, index: usize, name: &str) -> Result<Vec<u8>, DecodeError> {
        self.0
            .get(index)
            .map(|b| b.to_vec())
            .ok_or_else(|| DecodeError::Entry {
                name: name.to_string(),
                reason: "no such entry".into(),
            })
    }
}

/// Strip leading `/` and `./`, and trailing `/`. Rejects `..` segments.
///
/// Returns `Ok(None)` for names that denote the archive root.
fn normalize_entry_name(raw: &str) -> Result<Option<String>, DecodeError> {
    let unified = raw.replace('\\', "/");
    let mut segments = Vec::new();
    for segment in unified.split('/') {
        match segment {
            "" | "." => {}
            ".." => return Err(DecodeError::InvalidName(raw.to_string())),
            s => segments.push(s),
        }
    }
    if segments.is_empty() {
        Ok(None)
    } else {
        Ok(Some(segments.join("/")))
    }
}

impl EntryCatalog {
    /// Build a catalog from decoder output.
    ///
    /// Entry `i` of `entries` is read through `source.read_entry(i, ..)`.
    /// Fails on duplicate names, names escaping the archive root, and file
    /// entries that other entries are nested under.
    pub fn new(
        entries: Vec<EntryMeta>,
        source: Box<dyn EntrySource>,
    ) -> Result<Self, DecodeError> {
        let mut map = BTreeMap::new();
        for (index, meta) in entries.into_iter().enumerate() {
            let Some(name) = normalize_entry_name(&meta.name)? else {
                if meta.is_dir {
                    continue;
                }
                return Err(DecodeError::InvalidName(meta.name));
            };
            let entry = CatalogEntry {
                index,
                is_dir: meta.is_dir,
                content: OnceLock::new(),
            };
            if map.insert(name.clone(), entry).is_some() {
                return Err(DecodeError::DuplicateEntry(name));
            }
        }
        let catalog = Self {
            entries: map,
            source,
        };
        if let Some((name, _)) = catalog
            .entries
            .iter()
            .find(|(name, entry)| !entry.is_dir && catalog.has_descendants(name))
        {
            return Err(DecodeError::FileHasChildren(name.clone()));
        }
        Ok(catalog)
    }

    /// Build a catalog from in-memory entries. `None` content marks a directory.
    pub fn from_memory<N, I>(entries: I) -> Result<Self, DecodeError>
    where
        N: Into<String>,
        I: IntoIterator<Item = (N, Option<Vec<u8>>)>,
    {
        let mut metas = Vec::new();
        let mut contents = Vec::new();
        for (name, content) in entries {
            metas.push(EntryMeta {
                name: name.into(),
                is_dir: content.is_none(),
            });
            contents.push(Bytes::from(content.unwrap_or_default()));
        }
        Self::new(metas, Box::new(MemorySource(contents)))
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the archive has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entry names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Prefix under which the children of `rel` are stored.
    fn child_prefix(rel: &str) -> String {
        if rel.is_empty() {
            String::new()
        } else {
            format!("{rel}/")
        }
    }

    /// Entries whose name starts with `prefix`, in name order.
    fn with_prefix<'a>(
        &'a self,
        prefix: &'a str,
    ) -> impl Iterator<Item = (&'a String, &'a CatalogEntry)> + 'a {
        self.entries
            .range(prefix.to_string()..)
            .take_while(move |(name, _)| name.starts_with(prefix))
    }

    /// Returns true if some entry lives below `rel`.
    pub fn has_descendants(&self, rel: &str) -> bool {
        let prefix = Self::child_prefix(rel);
        self.with_prefix(&prefix).next().is_some()
    }

    /// Kind of the node at `rel`, or `None` if nothing lives there.
    ///
    /// The empty path is the archive root. An exact entry wins; otherwise a
    /// path with descendants is an implicit directory.
    pub fn kind_of(&self, rel: &str) -> Option<FileType> {
        if rel.is_empty() {
            return Some(FileType::Directory);
        }
        match self.entries.get(rel) {
            Some(entry) if entry.is_dir => Some(FileType::Directory),
            Some(_) => Some(FileType::File),
            None if self.has_descendants(rel) => Some(FileType::Directory),
            None => None,
        }
    }

    /// Content of the file entry at `rel`, decoded on first access.
    pub fn content(&self, rel: &str) -> VfsResult<Bytes> {
        let entry = match self.entries.get(rel) {
            Some(entry) if entry.is_dir => return Err(VfsError::is_a_directory(rel)),
            Some(entry) => entry,
            None if rel.is_empty() || self.has_descendants(rel) => {
                return Err(VfsError::is_a_directory(rel));
            }
            None => return Err(VfsError::not_found(rel)),
        };

        if let Some(data) = entry.content.get() {
            return Ok(data.clone());
        }

        let data = self
            .source
            .read_entry(entry.index, rel)
            .map(Bytes::from)
            .map_err(|e| VfsError::Io(io::Error::new(io::ErrorKind::InvalidData, e)))?;
        // A concurrent reader may have won; either value is identical.
        Ok(entry.content.get_or_init(|| data).clone())
    }

    /// Immediate children of the directory at `rel`, sorted by name.
    ///
    /// Child names are the first segment after `rel/`. A child is a
    /// directory if it is an explicit directory entry or has descendants.
    pub fn children(&self, rel: &str) -> Vec<DirEntry> {
        let prefix = Self::child_prefix(rel);
        let mut children: BTreeMap<&str, FileType> = BTreeMap::new();

        for (name, entry) in self.with_prefix(&prefix) {
            let rest = &name[prefix.len()..];
            match rest.split_once('/') {
                Some((first, _)) => {
                    children.insert(first, FileType::Directory);
                }
                None => {
                    let kind = if entry.is_dir {
                        FileType::Directory
                    } else {
                        FileType::File
                    };
                    children.entry(rest).or_insert(kind);
                }
            }
        }

        children
            .into_iter()
            .map(|(name, kind)| DirEntry::new(name, kind))
            .collect()
    }
}
