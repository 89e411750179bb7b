//! Per-view context tying the resolver, snapshot and balancer together.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc::Receiver;

#[cfg(feature = "tracing")]
use tracing::debug;

use crate::balancer::{
    Balancer, BalancerPhase, BalancerWorker, MaterializedWindow, ShiftInstruction, Viewport,
    ViewportHandle, window_capacity,
};
use crate::config::SessionConfig;
use crate::error::{DirScrollError, DirScrollResult};
use crate::fs::{FileSystem, StdFileSystem};
use crate::listing::{ListingFilter, SortSpec};
use crate::resolver::IdResolver;
use crate::rows::WindowSeed;
use crate::snapshot::{DirectorySnapshot, SnapshotSource};
use crate::window::{WindowRange, window_around};

/// One scrolling view over one directory.
///
/// Owns the root anchor, the current snapshot and the balancer thread. The
/// thread is stopped when the session is dropped.
pub struct ViewSession<F: FileSystem = StdFileSystem> {
    fs: F,
    config: SessionConfig,
    resolver: IdResolver,
    source: SnapshotSource,
    directory: String,
    viewport: ViewportHandle,
    worker: BalancerWorker,
    shifts: Receiver<ShiftInstruction>,
}

impl<F: FileSystem> ViewSession<F> {
    /// List `directory`, materialize rows around `viewport` and start balancing.
    ///
    /// Returns the session together with the initial rows.
    pub fn open(
        fs: F,
        config: SessionConfig,
        directory: &str,
        viewport: Viewport,
    ) -> DirScrollResult<(Self, WindowSeed)> {
        let resolver = IdResolver::with_marker(config.anchor.clone(), config.root_marker.clone());
        let mut source = SnapshotSource::new();
        let snapshot = source.build_with(
            &fs,
            &resolver,
            directory,
            &config.filter,
            config.sort.as_ref(),
        )?;

        let viewport = clamp_viewport(viewport, snapshot.len());
        let range = seed_range(&viewport, snapshot.len(), config.balancer.target);
        let rows = snapshot.entries(range)?;
        let window = MaterializedWindow::new(0, range);
        debug_session_reseeded("open", &window);

        let handle = ViewportHandle::new(viewport);
        let parent_path = snapshot.parent_path().to_path_buf();
        let directory = snapshot.parent_identifier().to_string();
        let (balancer, shifts) = Balancer::new(
            snapshot,
            window,
            handle.clone(),
            config.balancer.clone(),
        );
        let worker = balancer
            .spawn()
            .map_err(|e| DirScrollError::io(parent_path, e))?;

        let seed = WindowSeed {
            generation: window.generation,
            first_index: range.start(),
            rows,
        };
        let session = Self {
            fs,
            config,
            resolver,
            source,
            directory,
            viewport: handle,
            worker,
            shifts,
        };
        Ok((session, seed))
    }

    /// Publish the rows the UI currently shows.
    pub fn set_viewport(&self, first_visible: usize, last_visible: usize, capacity: usize) {
        self.viewport
            .set(Viewport::new(first_visible, last_visible, capacity));
        self.worker.wake();
    }

    /// Cloneable viewport slot for writers living elsewhere in the UI.
    pub fn viewport_handle(&self) -> ViewportHandle {
        self.viewport.clone()
    }

    /// Receiving end of the shift channel.
    pub fn shifts(&self) -> &Receiver<ShiftInstruction> {
        &self.shifts
    }

    /// Re-list the directory and reseed around the current viewport.
    ///
    /// The first visible entry keeps its place when it still exists.
    pub fn refresh(&mut self) -> DirScrollResult<WindowSeed> {
        self.source.invalidate();
        let filter = self.config.filter.clone();
        let sort = self.config.sort;
        self.rebuild(filter, sort, "refresh")
    }

    /// Rebuild with a new filter from the cached listing.
    ///
    /// On error the previous filter stays active.
    pub fn set_filter(&mut self, filter: ListingFilter) -> DirScrollResult<WindowSeed> {
        let sort = self.config.sort;
        self.rebuild(filter, sort, "filter")
    }

    /// Rebuild with a new sort from the cached listing.
    ///
    /// On error the previous sort stays active.
    pub fn set_sort(&mut self, sort: Option<SortSpec>) -> DirScrollResult<WindowSeed> {
        let filter = self.config.filter.clone();
        self.rebuild(filter, sort, "sort")
    }

    /// Switch to another directory under the same anchor, starting at the top.
    pub fn change_directory(&mut self, directory: &str) -> DirScrollResult<WindowSeed> {
        let snapshot = self.source.build_with(
            &self.fs,
            &self.resolver,
            directory,
            &self.config.filter,
            self.config.sort.as_ref(),
        )?;
        self.directory = snapshot.parent_identifier().to_string();
        self.reseed_with(snapshot, 0, "directory")
    }

    /// Jump to `first_visible` without re-listing.
    pub fn reseed(&mut self, first_visible: usize) -> DirScrollResult<WindowSeed> {
        let snapshot = self.snapshot();
        if first_visible >= snapshot.len() && !snapshot.is_empty() {
            return Err(DirScrollError::index_out_of_range(
                first_visible,
                snapshot.len(),
            ));
        }
        self.reseed_with(snapshot, first_visible, "jump")
    }

    /// Jump so that `identifier` is the first visible row.
    pub fn reseed_at_identifier(&mut self, identifier: &str) -> DirScrollResult<WindowSeed> {
        let snapshot = self.snapshot();
        let index = snapshot
            .index_of(identifier)
            .ok_or_else(|| DirScrollError::not_found(identifier))?;
        self.reseed_with(snapshot, index, "jump")
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> Arc<DirectorySnapshot> {
        self.worker.source()
    }

    /// Identifier of the listed directory.
    pub fn directory(&self) -> &str {
        &self.directory
    }

    /// Copy of the materialized window.
    pub fn materialized(&self) -> MaterializedWindow {
        self.worker.materialized()
    }

    /// Balancer phase.
    pub fn phase(&self) -> BalancerPhase {
        self.worker.phase()
    }

    /// Identifier resolver for this session's anchor.
    pub fn resolver(&self) -> &IdResolver {
        &self.resolver
    }

    /// Resolve `identifier` against this session's anchor and filesystem.
    pub fn resolve(&self, identifier: &str) -> DirScrollResult<PathBuf> {
        self.resolver.resolve(&self.fs, identifier)
    }

    /// Active configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Stop the balancer thread. Further shifts are never sent.
    pub fn stop(&mut self) {
        self.worker.stop();
    }

    fn rebuild(
        &mut self,
        filter: ListingFilter,
        sort: Option<SortSpec>,
        reason: &'static str,
    ) -> DirScrollResult<WindowSeed> {
        let previous = self.snapshot();
        let focus = previous
            .entry_at(self.viewport.get().first_visible)
            .ok()
            .map(|entry| entry.identifier.clone());

        let snapshot = self.source.build_with(
            &self.fs,
            &self.resolver,
            &self.directory,
            &filter,
            sort.as_ref(),
        )?;
        let index = focus
            .and_then(|id| snapshot.index_of(&id))
            .unwrap_or(self.viewport.get().first_visible);
        let seed = self.reseed_with(snapshot, index, reason)?;
        self.config.filter = filter;
        self.config.sort = sort;
        Ok(seed)
    }

    fn reseed_with(
        &mut self,
        snapshot: Arc<DirectorySnapshot>,
        first_visible: usize,
        reason: &'static str,
    ) -> DirScrollResult<WindowSeed> {
        let current = self.viewport.get();
        let visible = current.visible_len().max(1);
        let viewport = clamp_viewport(
            Viewport::new(first_visible, first_visible + visible - 1, current.capacity),
            snapshot.len(),
        );
        let range = seed_range(&viewport, snapshot.len(), self.config.balancer.target);
        let rows = snapshot.entries(range)?;

        // Viewport first: shifts planned against the old window then carry
        // the old generation.
        self.viewport.set(viewport);
        let window = self.worker.reseed(snapshot, range);
        debug_session_reseeded(reason, &window);

        Ok(WindowSeed {
            generation: window.generation,
            first_index: range.start(),
            rows,
        })
    }
}

fn clamp_viewport(viewport: Viewport, snapshot_len: usize) -> Viewport {
    let Some(last_index) = snapshot_len.checked_sub(1) else {
        return Viewport::new(0, 0, viewport.capacity);
    };
    let first = viewport.first_visible.min(last_index);
    let last = viewport.last_visible.clamp(first, last_index);
    Viewport::new(first, last, viewport.capacity)
}

fn seed_range(viewport: &Viewport, snapshot_len: usize, target: usize) -> WindowRange {
    window_around(
        snapshot_len,
        viewport.first_visible,
        target,
        window_capacity(viewport, snapshot_len, target),
    )
}

#[cfg(feature = "tracing")]
fn debug_session_reseeded(reason: &'static str, window: &MaterializedWindow) {
    debug!(
        event = "session.reseeded",
        reason,
        generation = window.generation,
        first = window.first,
        count = window.count,
        "session reseeded"
    );
}

#[cfg(not(feature = "tracing"))]
fn debug_session_reseeded(_reason: &'static str, _window: &MaterializedWindow) {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BalancerConfig;
    use crate::listing::SortBy;
    use crate::rows::RowBuffer;
    use crate::test_support::MemFs;
    use std::time::Duration;

    fn config() -> SessionConfig {
        SessionConfig::new("/data/pics").balancer(
            BalancerConfig::default()
                .target(5)
                .poll_interval(Duration::from_millis(2)),
        )
    }

    fn open(count: usize, viewport: Viewport) -> (ViewSession<MemFs>, WindowSeed) {
        let fs = MemFs::new().with_numbered_files("/data/pics", count);
        ViewSession::open(fs, config(), "root:", viewport).unwrap()
    }

    fn drain_into(session: &ViewSession<MemFs>, rows: &mut RowBuffer) {
        while let Ok(shift) = session.shifts().recv_timeout(Duration::from_millis(100)) {
            rows.apply(&shift);
        }
    }

    #[test]
    fn open_seeds_rows_around_viewport() {
        let (session, seed) = open(200, Viewport::new(50, 59, 10));
        assert_eq!(seed.generation, 0);
        assert_eq!(seed.range(), WindowRange::inclusive(45, 64));
        assert_eq!(seed.rows[0].name, "img_0045.jpg");
        assert_eq!(session.materialized().range(), seed.range());
        assert_eq!(session.directory(), "root:");
        assert_eq!(session.snapshot().len(), 200);
    }

    #[test]
    fn scrolling_keeps_row_buffer_in_sync() {
        let (session, seed) = open(200, Viewport::new(0, 9, 10));
        let mut rows = RowBuffer::from_seed(seed);

        for first in [3usize, 8, 14, 20, 17, 30] {
            session.set_viewport(first, first + 9, 10);
            drain_into(&session, &mut rows);
            assert_eq!(rows.range(), session.materialized().range());
            let window = session.materialized().range();
            assert!(window.contains(first) && window.contains(first + 9));
            for index in rows.range().as_range() {
                assert_eq!(
                    rows.get(index).unwrap().name,
                    format!("img_{index:04}.jpg")
                );
            }
        }
    }

    #[test]
    fn reseed_bumps_generation_and_invalidates_in_flight_shifts() {
        let (mut session, seed) = open(500, Viewport::new(0, 9, 10));
        let mut rows = RowBuffer::from_seed(seed);

        let seed = session.reseed(300).unwrap();
        assert_eq!(seed.generation, 1);
        assert_eq!(seed.range(), WindowRange::inclusive(295, 314));
        rows.replace(seed.generation, seed.first_index, seed.rows);

        drain_into(&session, &mut rows);
        assert_eq!(rows.generation(), 1);
        assert_eq!(rows.range(), session.materialized().range());

        assert!(matches!(
            session.reseed(500),
            Err(DirScrollError::IndexOutOfRange { index: 500, len: 500 })
        ));
    }

    #[test]
    fn reseed_at_identifier_positions_entry_first() {
        let (mut session, _) = open(100, Viewport::new(0, 9, 10));
        let seed = session.reseed_at_identifier("root:img_0042.jpg").unwrap();
        assert_eq!(seed.first_index, 37);
        assert!(seed.rows.iter().any(|r| r.identifier == "root:img_0042.jpg"));
        assert!(session.reseed_at_identifier("root:nope.jpg").is_err());
    }

    #[test]
    fn sort_change_keeps_focused_entry() {
        let (mut session, _) = open(100, Viewport::new(20, 29, 10));
        let seed = session
            .set_sort(Some(SortSpec::new(SortBy::Name).descending()))
            .unwrap();
        let snapshot = session.snapshot();
        assert_eq!(snapshot.index_of("root:img_0020.jpg"), Some(79));
        assert_eq!(session.viewport_handle().get().first_visible, 79);
        assert_eq!(seed.generation, 1);
        assert!(seed.range().contains(79));
    }

    #[test]
    fn filter_change_reuses_listing_and_refresh_relists() {
        let (mut session, _) = open(30, Viewport::new(0, 9, 10));
        let seed = session
            .set_filter(ListingFilter::default().search("img_001"))
            .unwrap();
        assert_eq!(session.snapshot().len(), 10);
        assert_eq!(seed.rows.len(), 10);
        assert_eq!(session.fs.read_dir_calls.get(), 1);

        session.refresh().unwrap();
        assert_eq!(session.fs.read_dir_calls.get(), 2);
    }

    #[test]
    fn refresh_failure_keeps_previous_snapshot() {
        let (mut session, _) = open(30, Viewport::new(0, 9, 10));
        session.fs.fail_read_dir(Some(std::io::ErrorKind::PermissionDenied));
        let before = session.materialized();
        assert!(session.refresh().unwrap_err().is_io());
        assert_eq!(session.materialized(), before);
        assert_eq!(session.snapshot().len(), 30);
    }

    #[test]
    fn failed_filter_or_sort_change_keeps_previous_config() {
        let (mut session, _) = open(30, Viewport::new(0, 9, 10));
        session.fs.fail_read_dir(Some(std::io::ErrorKind::PermissionDenied));
        assert!(session.refresh().is_err());

        let before = session.materialized();
        assert!(
            session
                .set_filter(ListingFilter::default().search("img_001"))
                .unwrap_err()
                .is_io()
        );
        assert!(
            session
                .set_sort(Some(SortSpec::new(SortBy::Name).descending()))
                .unwrap_err()
                .is_io()
        );
        assert_eq!(session.config().filter, ListingFilter::default());
        assert_eq!(session.config().sort, None);
        assert_eq!(session.materialized(), before);
        assert_eq!(session.snapshot().len(), 30);

        session.fs.fail_read_dir(None);
        session
            .set_filter(ListingFilter::default().search("img_001"))
            .unwrap();
        assert_eq!(session.config().filter.search, "img_001");
        assert_eq!(session.snapshot().len(), 10);
    }

    #[test]
    fn empty_directory_opens_with_no_rows() {
        let (session, seed) = open(0, Viewport::new(0, 9, 10));
        assert!(seed.rows.is_empty());
        assert!(session.materialized().range().is_empty());
    }

    #[test]
    fn stop_is_terminal() {
        let (mut session, _) = open(50, Viewport::new(0, 9, 10));
        session.stop();
        assert_eq!(session.phase(), BalancerPhase::Stopped);
        session.set_viewport(30, 39, 10);
        assert!(
            session
                .shifts()
                .recv_timeout(Duration::from_millis(50))
                .is_err()
        );
    }

    #[test]
    fn resolve_uses_session_anchor() {
        let (session, _) = open(3, Viewport::new(0, 2, 3));
        assert_eq!(
            session.resolve("root:img_0001.jpg").unwrap(),
            PathBuf::from("/data/pics/img_0001.jpg")
        );
        assert_eq!(session.resolver().anchor(), std::path::Path::new("/data/pics"));
    }
}
