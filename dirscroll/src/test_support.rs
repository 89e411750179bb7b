//! In-memory filesystem double shared by the unit tests.

use std::cell::Cell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use crate::fs::{FileSystem, FsEntry, FsMetadata, PermissionSummary};

#[derive(Default)]
pub(crate) struct MemFs {
    dirs: HashMap<PathBuf, Vec<FsEntry>>,
    pub(crate) read_dir_calls: Cell<usize>,
    pub(crate) read_dir_error: Cell<Option<std::io::ErrorKind>>,
}

impl MemFs {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Registers `dir` with one entry per `(name, is_dir)` pair.
    pub(crate) fn with_dir(mut self, dir: &str, children: &[(&str, bool)]) -> Self {
        let dir = PathBuf::from(dir);
        let entries = children
            .iter()
            .enumerate()
            .map(|(i, (name, is_dir))| mem_entry(&dir, name, *is_dir, i as u64))
            .collect();
        self.dirs.insert(dir, entries);
        self
    }

    /// Registers `dir` with `count` files named `img_0000.jpg`, `img_0001.jpg`, ...
    pub(crate) fn with_numbered_files(self, dir: &str, count: usize) -> Self {
        let names: Vec<String> = (0..count).map(|i| format!("img_{i:04}.jpg")).collect();
        let children: Vec<(&str, bool)> = names.iter().map(|n| (n.as_str(), false)).collect();
        self.with_dir(dir, &children)
    }

    pub(crate) fn fail_read_dir(&self, kind: Option<std::io::ErrorKind>) {
        self.read_dir_error.set(kind);
    }

    fn lookup(&self, path: &Path) -> Option<bool> {
        if self.dirs.contains_key(path) {
            return Some(true);
        }
        self.dirs
            .values()
            .flatten()
            .find(|e| e.path == path)
            .map(|e| e.is_dir)
    }
}

fn mem_entry(dir: &Path, name: &str, is_dir: bool, seq: u64) -> FsEntry {
    FsEntry {
        name: name.to_string(),
        path: dir.join(name),
        is_dir,
        is_hidden: name.starts_with('.'),
        size: if is_dir { None } else { Some(1024 * (seq + 1)) },
        modified: Some(SystemTime::UNIX_EPOCH + Duration::from_secs(1_000 + seq)),
        permissions: PermissionSummary::new(true, true, is_dir),
    }
}

impl FileSystem for MemFs {
    fn read_dir(&self, dir: &Path) -> std::io::Result<Vec<FsEntry>> {
        self.read_dir_calls.set(self.read_dir_calls.get() + 1);
        if let Some(kind) = self.read_dir_error.get() {
            return Err(std::io::Error::new(kind, "read_dir failure"));
        }
        self.dirs
            .get(dir)
            .cloned()
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, "no such directory"))
    }

    fn metadata(&self, path: &Path) -> std::io::Result<FsMetadata> {
        self.lookup(path)
            .map(|is_dir| FsMetadata { is_dir })
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, "not found"))
    }
}
