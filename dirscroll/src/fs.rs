use std::fmt;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Owner permission bits summarised for display.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct PermissionSummary {
    /// Entry can be read.
    pub readable: bool,
    /// Entry can be written.
    pub writable: bool,
    /// File can be executed, or directory can be traversed.
    pub executable: bool,
}

impl PermissionSummary {
    /// Create a summary from explicit flags.
    pub const fn new(readable: bool, writable: bool, executable: bool) -> Self {
        Self {
            readable,
            writable,
            executable,
        }
    }

    #[cfg(unix)]
    fn from_metadata(md: &std::fs::Metadata) -> Self {
        use std::os::unix::fs::PermissionsExt;
        let mode = md.permissions().mode();
        Self::new(mode & 0o400 != 0, mode & 0o200 != 0, mode & 0o100 != 0)
    }

    #[cfg(not(unix))]
    fn from_metadata(md: &std::fs::Metadata) -> Self {
        Self::new(true, !md.permissions().readonly(), md.is_dir())
    }
}

impl fmt::Display for PermissionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flag = |on: bool, c: char| if on { c } else { '-' };
        write!(
            f,
            "{}{}{}",
            flag(self.readable, 'r'),
            flag(self.writable, 'w'),
            flag(self.executable, 'x')
        )
    }
}

/// Minimal metadata for a single path.
#[derive(Clone, Debug)]
pub struct FsMetadata {
    /// Whether the path refers to a directory.
    pub is_dir: bool,
}

/// Directory entry returned by [`FileSystem::read_dir`].
#[derive(Clone, Debug)]
pub struct FsEntry {
    /// Base name (no parent path)
    pub name: String,
    /// Full path
    pub path: PathBuf,
    /// Whether this entry is a directory.
    pub is_dir: bool,
    /// Whether the platform considers this entry hidden.
    pub is_hidden: bool,
    /// File size in bytes (files only; `None` for directories or when unavailable).
    pub size: Option<u64>,
    /// Last modified timestamp (when available).
    pub modified: Option<SystemTime>,
    /// Owner permission summary.
    pub permissions: PermissionSummary,
}

/// Synchronous filesystem collaborator used to list directories.
///
/// Implementations are free to be backed by something other than the local
/// disk; the engine only needs listing and existence checks.
pub trait FileSystem {
    /// List entries of a directory.
    fn read_dir(&self, dir: &Path) -> std::io::Result<Vec<FsEntry>>;
    /// Fetch minimal metadata for a path.
    fn metadata(&self, path: &Path) -> std::io::Result<FsMetadata>;
    /// Whether anything exists at `path`.
    fn exists(&self, path: &Path) -> bool {
        self.metadata(path).is_ok()
    }
}

/// Default filesystem implementation using `std::fs`.
#[derive(Clone, Copy, Debug, Default)]
pub struct StdFileSystem;

impl FileSystem for StdFileSystem {
    fn read_dir(&self, dir: &Path) -> std::io::Result<Vec<FsEntry>> {
        let mut out = Vec::new();
        let rd = std::fs::read_dir(dir)?;
        for e in rd {
            let e = match e {
                Ok(v) => v,
                Err(_) => continue,
            };
            let ft = match e.file_type() {
                Ok(v) => v,
                Err(_) => continue,
            };
            let name = e.file_name().to_string_lossy().to_string();
            let path = e.path();
            let meta = e.metadata().ok();
            let modified = meta.as_ref().and_then(|m| m.modified().ok());
            let is_dir = ft.is_dir();
            let size = if is_dir {
                None
            } else {
                meta.as_ref().filter(|m| m.is_file()).map(|m| m.len())
            };
            let is_hidden = name.starts_with('.') || meta.as_ref().is_some_and(has_hidden_attribute);
            let permissions = meta
                .as_ref()
                .map(PermissionSummary::from_metadata)
                .unwrap_or_default();
            out.push(FsEntry {
                name,
                path,
                is_dir,
                is_hidden,
                size,
                modified,
                permissions,
            });
        }
        Ok(out)
    }

    fn metadata(&self, path: &Path) -> std::io::Result<FsMetadata> {
        let md = std::fs::metadata(path)?;
        Ok(FsMetadata { is_dir: md.is_dir() })
    }

    fn exists(&self, path: &Path) -> bool {
        std::fs::symlink_metadata(path).is_ok()
    }
}

#[cfg(windows)]
fn has_hidden_attribute(md: &std::fs::Metadata) -> bool {
    use std::os::windows::fs::MetadataExt;
    const FILE_ATTRIBUTE_HIDDEN: u32 = 0x2;
    md.file_attributes() & FILE_ATTRIBUTE_HIDDEN != 0
}

#[cfg(not(windows))]
fn has_hidden_attribute(_md: &std::fs::Metadata) -> bool {
    false
}
