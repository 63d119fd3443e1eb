//! Archive decoding.
//!
//! [`ZipDecoder`] parses the central directory when an archive is mounted
//! and decompresses entries the first time they are read.

use parking_lot::Mutex;
use std::io::{Cursor, Read};
use zip::ZipArchive;

use super::catalog::{EntryCatalog, EntryMeta, EntrySource};
use super::error::DecodeError;

/// Parses archive bytes into an [`EntryCatalog`].
pub trait ArchiveDecoder: Send + Sync {
    fn decode(&self, data: Vec<u8>) -> Result<EntryCatalog, DecodeError>;
}

/// Decoder for zip archives.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZipDecoder;

struct ZipSource {
    archive: Mutex<ZipArchive<Cursor<Vec<u8>>>>,
}

impl EntrySource for ZipSource {
    fn read_entry(&self, index: usize, name: &str) -> Result<Vec<u8>, DecodeError> {
        let entry_error = |reason: String| DecodeError::Entry {
            name: name.to_string(),
            reason,
        };

        let mut archive = self.archive.lock();
        let mut file = archive
            .by_index(index)
            .map_err(|e| entry_error(e.to_string()))?;
        let mut data = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut data)
            .map_err(|e| entry_error(e.to_string()))?;
        Ok(data)
    }
}

impl ArchiveDecoder for ZipDecoder {
    fn decode(&self, data: Vec<u8>) -> Result<EntryCatalog, DecodeError> {
        let mut archive = ZipArchive::new(Cursor::new(data))
            .map_err(|e| DecodeError::Malformed(e.to_string()))?;

        let mut entries = Vec::with_capacity(archive.len());
        for index in 0..archive.len() {
            let file = archive
                .by_index_raw(index)
                .map_err(|e| DecodeError::Malformed(e.to_string()))?;
            entries.push(EntryMeta {
                name: file.name().to_string(),
                is_dir: file.is_dir(),
            });
        }

        EntryCatalog::new(
            entries,
            Box::new(ZipSource {
                archive: Mutex::new(archive),
            }),
        )
    }
}
