//! Fixtures shared by the unit tests.

use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use zip::ZipWriter;
use zip::write::FileOptions;

/// Build a zip in memory. `None` content adds a directory entry.
pub fn build_zip(entries: &[(&str, Option<&[u8]>)]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in entries {
        match content {
            Some(data) => {
                writer.start_file(*name, FileOptions::default()).unwrap();
                writer.write_all(data).unwrap();
            }
            None => {
                writer.add_directory(*name, FileOptions::default()).unwrap();
            }
        }
    }
    writer.finish().unwrap().into_inner()
}

/// Write a zip to `dir/name` and return its path.
pub fn write_zip(dir: &Path, name: &str, entries: &[(&str, Option<&[u8]>)]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, build_zip(entries)).unwrap();
    path
}

/// Entries of the reference `app.zip` layout.
pub const APP_ENTRIES: &[(&str, Option<&[u8]>)] = &[
    ("data/config.json", Some(b"{\"debug\": false}\n")),
    ("data/logs/run1.txt", Some(b"ok!\n")),
];
