#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::{TempDir, tempdir};

use licence_ledger::coerce::SourceTable;

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        self.write_bytes(name, contents.as_bytes())
    }

    pub fn write_bytes(&self, name: &str, contents: &[u8]) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents).expect("write temp file contents");
        path
    }

    /// Builds a ZIP archive from (entry name, contents) pairs.
    pub fn write_zip(&self, name: &str, entries: &[(&str, &str)]) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let file = File::create(&path).expect("create zip file");
        let mut writer = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default();
        for (entry_name, contents) in entries {
            writer.start_file(*entry_name, options).expect("start entry");
            writer
                .write_all(contents.as_bytes())
                .expect("write entry contents");
        }
        writer.finish().expect("finish zip");
        path
    }
}

/// Builds an in-memory source table from string literals.
pub fn source_table(name: &str, headers: &[&str], rows: &[&[&str]]) -> SourceTable {
    SourceTable {
        name: name.to_string(),
        headers: headers.iter().map(|s| s.to_string()).collect(),
        rows: rows
            .iter()
            .map(|r| r.iter().map(|s| s.to_string()).collect())
            .collect(),
    }
}
