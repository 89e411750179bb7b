//! Immutable directory snapshots and the listing cache that feeds them.

use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use indexmap::IndexMap;

#[cfg(feature = "tracing")]
use tracing::{debug, trace};

use crate::error::{DirScrollError, DirScrollResult};
use crate::fs::{FileSystem, FsEntry, PermissionSummary};
use crate::listing::{ListingFilter, SortSpec};
use crate::resolver::IdResolver;
use crate::window::WindowRange;

/// Predicate deciding whether an entry enters a snapshot.
pub type EntryFilter<'a> = &'a dyn Fn(&EntryDescriptor) -> bool;
/// Comparator ordering snapshot entries.
pub type EntryOrder<'a> = &'a dyn Fn(&EntryDescriptor, &EntryDescriptor) -> Ordering;

/// One directory entry as seen by the UI.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntryDescriptor {
    /// Root-relative identifier, see [`IdResolver`].
    pub identifier: String,
    /// Base name
    pub name: String,
    /// Absolute path
    pub path: PathBuf,
    /// Whether this entry is a directory.
    pub is_dir: bool,
    /// Whether the platform considers this entry hidden.
    pub is_hidden: bool,
    /// File size in bytes (`None` for directories).
    pub size: Option<u64>,
    /// Last modified timestamp (when available).
    pub modified: Option<SystemTime>,
    /// Owner permission summary.
    pub permissions: PermissionSummary,
}

impl EntryDescriptor {
    fn from_fs_entry(resolver: &IdResolver, entry: FsEntry) -> Self {
        Self {
            identifier: resolver.identifier_for(&entry.path),
            name: entry.name,
            path: entry.path,
            is_dir: entry.is_dir,
            is_hidden: entry.is_hidden,
            size: entry.size,
            modified: entry.modified,
            permissions: entry.permissions,
        }
    }
}

/// Ordered, immutable listing of one directory.
///
/// Ordering never changes after construction; re-sorting or re-filtering
/// produces a new snapshot.
#[derive(Clone, Debug)]
pub struct DirectorySnapshot {
    parent_identifier: String,
    parent_path: PathBuf,
    generation: u64,
    entries: IndexMap<String, Arc<EntryDescriptor>>,
}

impl DirectorySnapshot {
    pub(crate) fn from_descriptors(
        parent_identifier: impl Into<String>,
        parent_path: impl Into<PathBuf>,
        generation: u64,
        descriptors: impl IntoIterator<Item = Arc<EntryDescriptor>>,
    ) -> Self {
        let mut entries = IndexMap::new();
        for descriptor in descriptors {
            if entries.contains_key(&descriptor.identifier) {
                trace_duplicate_identifier(&descriptor.identifier);
                continue;
            }
            entries.insert(descriptor.identifier.clone(), descriptor);
        }
        Self {
            parent_identifier: parent_identifier.into(),
            parent_path: parent_path.into(),
            generation,
            entries,
        }
    }

    /// Identifier of the listed directory.
    pub fn parent_identifier(&self) -> &str {
        &self.parent_identifier
    }

    /// Absolute path of the listed directory.
    pub fn parent_path(&self) -> &Path {
        &self.parent_path
    }

    /// Build counter of the [`SnapshotSource`] that produced this snapshot.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Total number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the snapshot holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry at `index`.
    pub fn entry_at(&self, index: usize) -> DirScrollResult<&Arc<EntryDescriptor>> {
        self.entries
            .get_index(index)
            .map(|(_, entry)| entry)
            .ok_or_else(|| DirScrollError::index_out_of_range(index, self.len()))
    }

    /// Position of `identifier`, if present.
    pub fn index_of(&self, identifier: &str) -> Option<usize> {
        self.entries.get_index_of(identifier)
    }

    /// Entry with `identifier`, if present.
    pub fn get(&self, identifier: &str) -> Option<&Arc<EntryDescriptor>> {
        self.entries.get(identifier)
    }

    /// Entries covered by `range`, in snapshot order.
    ///
    /// Fails if any part of the range lies outside the snapshot.
    pub fn entries(&self, range: WindowRange) -> DirScrollResult<Vec<Arc<EntryDescriptor>>> {
        if let Some(end) = range.end() {
            if end >= self.len() {
                return Err(DirScrollError::index_out_of_range(end, self.len()));
            }
        }
        Ok(self.entries.as_slice()[range.as_range()]
            .values()
            .cloned()
            .collect())
    }

    /// Iterate entries in snapshot order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<EntryDescriptor>> + '_ {
        self.entries.values()
    }
}

struct CachedListing {
    parent_path: PathBuf,
    anchor: PathBuf,
    entries: Vec<Arc<EntryDescriptor>>,
}

/// Builds snapshots and keeps the last raw listing around.
///
/// Re-filtering or re-sorting the same directory reuses the cached listing
/// until [`SnapshotSource::invalidate`] is called.
#[derive(Default)]
pub struct SnapshotSource {
    cache: Option<CachedListing>,
    stale: bool,
    generation: u64,
}

impl SnapshotSource {
    /// Create an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Generation of the most recently built snapshot (0 before the first build).
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether the next build has to list the directory again.
    pub fn is_stale(&self) -> bool {
        self.stale || self.cache.is_none()
    }

    /// Mark the cached listing stale.
    pub fn invalidate(&mut self) {
        self.stale = true;
        debug_snapshot_invalidated(self.cache.as_ref().map(|c| c.parent_path.as_path()));
    }

    /// Build a snapshot of `parent_identifier`.
    ///
    /// `filter` defaults to accepting everything and `order` to the order the
    /// filesystem returned. Sorting is stable.
    pub fn build(
        &mut self,
        fs: &dyn FileSystem,
        resolver: &IdResolver,
        parent_identifier: &str,
        filter: Option<EntryFilter<'_>>,
        order: Option<EntryOrder<'_>>,
    ) -> DirScrollResult<Arc<DirectorySnapshot>> {
        let parent_path = resolver.path_for(parent_identifier)?;
        let from_cache = self.cache_matches(&parent_path, resolver.anchor());
        if !from_cache {
            let entries = list_directory(fs, resolver, &parent_path)?;
            self.cache = Some(CachedListing {
                parent_path: parent_path.clone(),
                anchor: resolver.anchor().to_path_buf(),
                entries,
            });
            self.stale = false;
        }

        let listed = self.cache.as_ref().map(|c| c.entries.as_slice()).unwrap_or_default();
        let mut selected: Vec<Arc<EntryDescriptor>> = match filter {
            Some(keep) => listed.iter().filter(|e| keep(e)).cloned().collect(),
            None => listed.to_vec(),
        };
        if let Some(order) = order {
            selected.sort_by(|a, b| order(a, b));
        }

        self.generation += 1;
        let snapshot = DirectorySnapshot::from_descriptors(
            resolver.identifier_for(&parent_path),
            parent_path,
            self.generation,
            selected,
        );
        debug_snapshot_built(&snapshot, from_cache);
        Ok(Arc::new(snapshot))
    }

    /// Build a snapshot using the built-in filter and sort policies.
    pub fn build_with(
        &mut self,
        fs: &dyn FileSystem,
        resolver: &IdResolver,
        parent_identifier: &str,
        filter: &ListingFilter,
        sort: Option<&SortSpec>,
    ) -> DirScrollResult<Arc<DirectorySnapshot>> {
        let compiled = filter.compile();
        let keep = |e: &EntryDescriptor| compiled.matches(e);
        let order = |a: &EntryDescriptor, b: &EntryDescriptor| match sort {
            Some(spec) => spec.compare(a, b),
            None => Ordering::Equal,
        };
        self.build(
            fs,
            resolver,
            parent_identifier,
            (!filter.accepts_all()).then_some(&keep as EntryFilter<'_>),
            sort.is_some().then_some(&order as EntryOrder<'_>),
        )
    }

    fn cache_matches(&self, parent_path: &Path, anchor: &Path) -> bool {
        !self.stale
            && self
                .cache
                .as_ref()
                .is_some_and(|c| c.parent_path == parent_path && c.anchor == anchor)
    }
}

fn list_directory(
    fs: &dyn FileSystem,
    resolver: &IdResolver,
    dir: &Path,
) -> DirScrollResult<Vec<Arc<EntryDescriptor>>> {
    let meta = fs.metadata(dir).map_err(|e| DirScrollError::io(dir, e))?;
    if !meta.is_dir {
        return Err(DirScrollError::io(
            dir,
            std::io::Error::new(std::io::ErrorKind::NotADirectory, "not a directory"),
        ));
    }
    let raw = fs.read_dir(dir).map_err(|e| DirScrollError::io(dir, e))?;
    Ok(raw
        .into_iter()
        .map(|entry| Arc::new(EntryDescriptor::from_fs_entry(resolver, entry)))
        .collect())
}

#[cfg(feature = "tracing")]
fn debug_snapshot_built(snapshot: &DirectorySnapshot, from_cache: bool) {
    debug!(
        event = "snapshot.built",
        parent = snapshot.parent_identifier(),
        entries = snapshot.len(),
        generation = snapshot.generation(),
        from_cache,
        "snapshot built"
    );
}

#[cfg(not(feature = "tracing"))]
fn debug_snapshot_built(_snapshot: &DirectorySnapshot, _from_cache: bool) {}

#[cfg(feature = "tracing")]
fn debug_snapshot_invalidated(parent: Option<&Path>) {
    debug!(
        event = "snapshot.invalidated",
        parent = ?parent,
        "listing cache invalidated"
    );
}

#[cfg(not(feature = "tracing"))]
fn debug_snapshot_invalidated(_parent: Option<&Path>) {}

#[cfg(feature = "tracing")]
fn trace_duplicate_identifier(identifier: &str) {
    trace!(identifier, "skipping entry with duplicate identifier");
}

#[cfg(not(feature = "tracing"))]
fn trace_duplicate_identifier(_identifier: &str) {}
