//! Scroll-window prefetch balancing.
//!
//! The balancer keeps a buffer of materialized-but-invisible rows on both
//! sides of the viewport. Each poll compares the buffers against the target,
//! picks at most one side to grow, fetches the missing rows and publishes a
//! [`ShiftInstruction`] that tells the UI to insert them and trim the opposite
//! edge.
//!
//! [`Balancer::poll_once`] holds all decision logic and can be driven
//! synchronously. [`Balancer::spawn`] runs it on a dedicated thread.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

use parking_lot::{Mutex, RwLock};

#[cfg(feature = "tracing")]
use tracing::{debug, trace, warn};

use crate::config::BalancerConfig;
use crate::error::{DirScrollError, DirScrollResult};
use crate::snapshot::{DirectorySnapshot, EntryDescriptor};
use crate::window::{WindowRange, select_window};

/// Rows the UI currently shows, as absolute snapshot indices.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Viewport {
    /// First visible index.
    pub first_visible: usize,
    /// Last visible index (inclusive).
    pub last_visible: usize,
    /// Number of rows the view can display at once.
    pub capacity: usize,
}

impl Viewport {
    /// Create a viewport.
    pub const fn new(first_visible: usize, last_visible: usize, capacity: usize) -> Self {
        Self {
            first_visible,
            last_visible,
            capacity,
        }
    }

    /// Number of visible rows (0 when the range is inverted).
    pub fn visible_len(&self) -> usize {
        if self.last_visible < self.first_visible {
            0
        } else {
            self.last_visible - self.first_visible + 1
        }
    }
}

#[derive(Debug, Default)]
struct ViewportCell {
    first_visible: AtomicUsize,
    last_visible: AtomicUsize,
    capacity: AtomicUsize,
}

/// Shared, lock-free viewport slot written by the UI and read by the balancer.
///
/// The three fields are stored independently; a reader may observe a mix of
/// two writes; the next poll sees the settled value.
#[derive(Clone, Debug, Default)]
pub struct ViewportHandle {
    cell: Arc<ViewportCell>,
}

impl ViewportHandle {
    /// Create a handle holding `viewport`.
    pub fn new(viewport: Viewport) -> Self {
        let handle = Self::default();
        handle.set(viewport);
        handle
    }

    /// Publish a new viewport.
    pub fn set(&self, viewport: Viewport) {
        self.cell
            .first_visible
            .store(viewport.first_visible, Ordering::Relaxed);
        self.cell
            .last_visible
            .store(viewport.last_visible, Ordering::Relaxed);
        self.cell.capacity.store(viewport.capacity, Ordering::Relaxed);
    }

    /// Read the current viewport.
    pub fn get(&self) -> Viewport {
        Viewport {
            first_visible: self.cell.first_visible.load(Ordering::Relaxed),
            last_visible: self.cell.last_visible.load(Ordering::Relaxed),
            capacity: self.cell.capacity.load(Ordering::Relaxed),
        }
    }
}

/// Rows currently materialized in the UI.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct MaterializedWindow {
    /// Bumped on every reseed; shifts planned against an older value are dropped.
    pub generation: u64,
    /// First materialized index.
    pub first: usize,
    /// Number of materialized rows.
    pub count: usize,
}

impl MaterializedWindow {
    /// Window covering `range` at `generation`.
    pub fn new(generation: u64, range: WindowRange) -> Self {
        Self {
            generation,
            first: range.start(),
            count: range.len(),
        }
    }

    /// Covered indices.
    pub fn range(&self) -> WindowRange {
        WindowRange::with_len(self.first, self.count)
    }

    /// Last materialized index, `None` when empty.
    pub fn last(&self) -> Option<usize> {
        self.range().end()
    }
}

/// Edge of the materialized window.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Edge {
    /// Lower indices, above the viewport.
    Top,
    /// Higher indices, below the viewport.
    Bottom,
}

impl Edge {
    /// The other edge.
    pub fn opposite(self) -> Self {
        match self {
            Edge::Top => Edge::Bottom,
            Edge::Bottom => Edge::Top,
        }
    }
}

/// Insert rows at one edge, then remove rows from the opposite edge.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShiftInstruction {
    /// Window generation the shift was computed against.
    pub generation: u64,
    /// Window before the shift.
    pub previous: WindowRange,
    /// Window after the shift.
    pub window: WindowRange,
    /// Edge receiving `inserted`.
    pub edge: Edge,
    /// Rows to insert, in snapshot order.
    pub inserted: Vec<Arc<EntryDescriptor>>,
    /// Rows to remove from [`Edge::opposite`] after inserting.
    pub removed: usize,
}

/// Per-side buffer shortfall for one poll. Positive means rows are missing.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Deficits {
    /// Rows missing above the viewport.
    pub top: i64,
    /// Rows missing below the viewport.
    pub bottom: i64,
}

impl Deficits {
    /// Side to serve and how many rows to fetch. Ties go to the top.
    pub fn pick(&self) -> Option<(Edge, usize)> {
        if self.top > 0 && self.top >= self.bottom {
            Some((Edge::Top, self.top as usize))
        } else if self.bottom > 0 {
            Some((Edge::Bottom, self.bottom as usize))
        } else {
            None
        }
    }
}

/// Compute buffer deficits for `window` against `viewport`.
///
/// Deficits never reach past index 0 or the snapshot end. Nothing is ever
/// requested above the window while the viewport starts at index 0.
pub fn compute_deficits(
    viewport: &Viewport,
    window: WindowRange,
    snapshot_len: usize,
    target: usize,
) -> Deficits {
    let Some(mat_last) = window.end() else {
        return Deficits::default();
    };
    if snapshot_len == 0 {
        return Deficits::default();
    }
    let target = target as i64;
    let mat_first = window.start() as i64;
    let mat_last = mat_last as i64;
    let first_visible = viewport.first_visible as i64;
    let last_visible = viewport.last_visible as i64;

    let top = if viewport.first_visible == 0 {
        0
    } else {
        (target - (first_visible - mat_first)).min(mat_first)
    };
    let remaining = snapshot_len as i64 - 1 - mat_last;
    let bottom = (target - (mat_last - last_visible)).min(remaining);

    Deficits { top, bottom }
}

/// Maximum number of rows kept materialized for `viewport`.
pub fn window_capacity(viewport: &Viewport, snapshot_len: usize, target: usize) -> usize {
    viewport
        .capacity
        .max(viewport.visible_len())
        .saturating_add(target.saturating_mul(2))
        .min(snapshot_len)
}

/// One planned shift, before its rows are fetched.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ShiftPlan {
    /// Edge to grow.
    pub edge: Edge,
    /// Indices to fetch and insert.
    pub fetch: WindowRange,
    /// Rows to drop from the opposite edge afterwards.
    pub removed: usize,
    /// Resulting window.
    pub window: WindowRange,
}

/// Plan the next shift, or `None` when both sides are balanced.
///
/// The opposite edge is trimmed by whatever exceeds [`window_capacity`], and
/// at least down to the target, but never into the visible rows. When no side
/// needs rows but the window is over capacity (the view shrank), the plan
/// inserts nothing and only trims the larger buffer.
pub fn plan_shift(
    window: &MaterializedWindow,
    viewport: &Viewport,
    snapshot_len: usize,
    target: usize,
) -> Option<ShiftPlan> {
    let range = window.range();
    let last = range.end()?;
    let first = range.start();
    let capacity = window_capacity(viewport, snapshot_len, target) as i64;
    let Some((edge, n)) = compute_deficits(viewport, range, snapshot_len, target).pick() else {
        return plan_trim(window, viewport, capacity, target);
    };

    let opposite_buffer = match edge {
        Edge::Top => last as i64 - viewport.last_visible as i64,
        Edge::Bottom => viewport.first_visible as i64 - first as i64,
    };
    let excess = (window.count + n) as i64 - capacity;
    let removed = excess
        .max(opposite_buffer - target as i64)
        .clamp(0, opposite_buffer.max(0))
        .min(window.count as i64) as usize;

    let (fetch, new_window) = match edge {
        Edge::Top => (
            select_window(snapshot_len, first - n, n),
            WindowRange::inclusive(first - n, last - removed),
        ),
        Edge::Bottom => (
            select_window(snapshot_len, last + 1, n),
            WindowRange::inclusive(first + removed, last + n),
        ),
    };

    Some(ShiftPlan {
        edge,
        fetch,
        removed,
        window: new_window,
    })
}

fn plan_trim(
    window: &MaterializedWindow,
    viewport: &Viewport,
    capacity: i64,
    target: usize,
) -> Option<ShiftPlan> {
    let range = window.range();
    let last = range.end()?;
    let first = range.start();
    let excess = window.count as i64 - capacity;
    if excess <= 0 {
        return None;
    }
    let top = viewport.first_visible as i64 - first as i64;
    let bottom = last as i64 - viewport.last_visible as i64;
    // `edge` is the side that keeps its rows; the opposite one is trimmed.
    let (edge, buffer) = if top >= bottom {
        (Edge::Bottom, top)
    } else {
        (Edge::Top, bottom)
    };
    let removed = excess.min(buffer - target as i64);
    if removed <= 0 {
        return None;
    }
    let removed = removed as usize;
    let new_window = match edge {
        Edge::Top => WindowRange::inclusive(first, last - removed),
        Edge::Bottom => WindowRange::inclusive(first + removed, last),
    };
    Some(ShiftPlan {
        edge,
        fetch: WindowRange::EMPTY,
        removed,
        window: new_window,
    })
}

/// Random access to the rows the balancer materializes.
pub trait EntrySource: Send + Sync {
    /// Total number of rows.
    fn len(&self) -> usize;

    /// Whether there are no rows.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Rows covered by `range`.
    fn fetch(&self, range: WindowRange) -> DirScrollResult<Vec<Arc<EntryDescriptor>>>;
}

impl EntrySource for DirectorySnapshot {
    fn len(&self) -> usize {
        DirectorySnapshot::len(self)
    }

    fn fetch(&self, range: WindowRange) -> DirScrollResult<Vec<Arc<EntryDescriptor>>> {
        self.entries(range)
    }
}

/// Observable balancer state.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum BalancerPhase {
    /// Created, not polled yet.
    Idle = 0,
    /// Comparing buffers against the target.
    Polling = 1,
    /// Fetching and publishing a shift.
    Shifting = 2,
    /// Terminal.
    Stopped = 3,
}

impl BalancerPhase {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Idle,
            1 => Self::Polling,
            2 => Self::Shifting,
            _ => Self::Stopped,
        }
    }
}

/// Result of one [`Balancer::poll_once`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PollOutcome {
    /// Neither side needed rows.
    Balanced,
    /// A shift was committed and sent.
    Shifted {
        /// Edge that grew.
        edge: Edge,
        /// Rows inserted.
        inserted: usize,
        /// Rows removed from the opposite edge.
        removed: usize,
    },
    /// Fetching rows failed; state is unchanged and the next poll retries.
    FetchFailed,
    /// The window changed while the shift was being prepared.
    StaleDropped,
    /// Stop was requested.
    Stopped,
    /// Nobody listens for shifts any more.
    Disconnected,
}

struct SharedView<S: ?Sized> {
    viewport: ViewportHandle,
    window: Mutex<MaterializedWindow>,
    source: RwLock<Arc<S>>,
    phase: AtomicU8,
    stop: AtomicBool,
}

impl<S: EntrySource + ?Sized> SharedView<S> {
    fn set_phase(&self, phase: BalancerPhase) {
        self.phase.store(phase as u8, Ordering::Release);
    }

    fn phase(&self) -> BalancerPhase {
        BalancerPhase::from_u8(self.phase.load(Ordering::Acquire))
    }

    fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    fn reseed(&self, source: Arc<S>, range: WindowRange) -> MaterializedWindow {
        let mut window = self.window.lock();
        *self.source.write() = source;
        *window = MaterializedWindow::new(window.generation + 1, range);
        *window
    }
}

/// Keeps the materialized window balanced around the viewport.
pub struct Balancer<S: EntrySource + ?Sized = DirectorySnapshot> {
    shared: Arc<SharedView<S>>,
    config: BalancerConfig,
    tx: Sender<ShiftInstruction>,
}

impl<S: EntrySource + ?Sized> Balancer<S> {
    /// Create a balancer over `source` with an already materialized `window`.
    ///
    /// Returns the receiving end of the shift channel.
    pub fn new(
        source: Arc<S>,
        window: MaterializedWindow,
        viewport: ViewportHandle,
        config: BalancerConfig,
    ) -> (Self, Receiver<ShiftInstruction>) {
        let (tx, rx) = mpsc::channel();
        let shared = Arc::new(SharedView {
            viewport,
            window: Mutex::new(window),
            source: RwLock::new(source),
            phase: AtomicU8::new(BalancerPhase::Idle as u8),
            stop: AtomicBool::new(false),
        });
        (Self { shared, config, tx }, rx)
    }

    /// Current phase.
    pub fn phase(&self) -> BalancerPhase {
        self.shared.phase()
    }

    /// Copy of the materialized window.
    pub fn materialized(&self) -> MaterializedWindow {
        *self.shared.window.lock()
    }

    /// Viewport slot this balancer reads.
    pub fn viewport(&self) -> &ViewportHandle {
        &self.shared.viewport
    }

    /// Current row source.
    pub fn source(&self) -> Arc<S> {
        self.shared.source.read().clone()
    }

    /// Replace the source and window, bumping the generation.
    pub fn reseed(&self, source: Arc<S>, range: WindowRange) -> MaterializedWindow {
        self.shared.reseed(source, range)
    }

    /// Request a stop. The next poll returns [`PollOutcome::Stopped`].
    pub fn request_stop(&self) {
        self.shared.stop.store(true, Ordering::Release);
    }

    /// Run one Polling/Shifting step.
    pub fn poll_once(&self) -> PollOutcome {
        let shared = &*self.shared;
        if shared.stop_requested() {
            shared.set_phase(BalancerPhase::Stopped);
            return PollOutcome::Stopped;
        }
        shared.set_phase(BalancerPhase::Polling);

        let viewport = shared.viewport.get();
        let (window, source) = {
            let window = shared.window.lock();
            (*window, shared.source.read().clone())
        };

        let Some(plan) = plan_shift(&window, &viewport, source.len(), self.config.target) else {
            return PollOutcome::Balanced;
        };

        shared.set_phase(BalancerPhase::Shifting);
        let outcome = self.execute(&plan, window, &*source);
        if !matches!(outcome, PollOutcome::Disconnected) {
            shared.set_phase(BalancerPhase::Polling);
        }
        outcome
    }

    fn execute(&self, plan: &ShiftPlan, planned_against: MaterializedWindow, source: &S) -> PollOutcome {
        let fetched = if plan.fetch.is_empty() {
            Ok(Vec::new())
        } else {
            source.fetch(plan.fetch)
        };
        let inserted = match fetched {
            Ok(rows) if rows.len() == plan.fetch.len() => rows,
            Ok(rows) => {
                let err = DirScrollError::index_out_of_range(plan.fetch.start() + rows.len(), source.len());
                warn_fetch_failed(plan, &err);
                return PollOutcome::FetchFailed;
            }
            Err(err) => {
                warn_fetch_failed(plan, &err);
                return PollOutcome::FetchFailed;
            }
        };

        let mut window = self.shared.window.lock();
        if *window != planned_against {
            trace_stale_shift_dropped(planned_against.generation, window.generation);
            return PollOutcome::StaleDropped;
        }

        let instruction = ShiftInstruction {
            generation: planned_against.generation,
            previous: planned_against.range(),
            window: plan.window,
            edge: plan.edge,
            inserted,
            removed: plan.removed,
        };
        let inserted = instruction.inserted.len();
        if self.tx.send(instruction).is_err() {
            return PollOutcome::Disconnected;
        }
        *window = MaterializedWindow::new(planned_against.generation, plan.window);
        trace_shift(plan, window.generation);

        PollOutcome::Shifted {
            edge: plan.edge,
            inserted,
            removed: plan.removed,
        }
    }
}

impl<S: EntrySource + ?Sized + 'static> Balancer<S> {
    /// Move the balancer onto a dedicated worker thread.
    pub fn spawn(self) -> std::io::Result<BalancerWorker<S>> {
        let shared = Arc::clone(&self.shared);
        let handle = thread::Builder::new()
            .name("dirscroll-balancer".to_string())
            .spawn(move || self.run())?;
        Ok(BalancerWorker {
            shared,
            handle: Some(handle),
        })
    }

    fn run(self) {
        let interval = self.config.poll_interval;
        loop {
            match self.poll_once() {
                PollOutcome::Stopped | PollOutcome::Disconnected => break,
                // Keep going while there is work; the stop flag is checked first.
                PollOutcome::Shifted { .. } => continue,
                PollOutcome::Balanced | PollOutcome::FetchFailed | PollOutcome::StaleDropped => {
                    thread::park_timeout(interval);
                }
            }
        }
        self.shared.set_phase(BalancerPhase::Stopped);
        debug_balancer_stopped(self.shared.window.lock().generation);
    }
}

/// Handle to a running balancer thread. Dropping it stops and joins the thread.
pub struct BalancerWorker<S: EntrySource + ?Sized = DirectorySnapshot> {
    shared: Arc<SharedView<S>>,
    handle: Option<JoinHandle<()>>,
}

impl<S: EntrySource + ?Sized> BalancerWorker<S> {
    /// Current phase.
    pub fn phase(&self) -> BalancerPhase {
        self.shared.phase()
    }

    /// Copy of the materialized window.
    pub fn materialized(&self) -> MaterializedWindow {
        *self.shared.window.lock()
    }

    /// Current row source.
    pub fn source(&self) -> Arc<S> {
        self.shared.source.read().clone()
    }

    /// Replace the source and window, bumping the generation.
    ///
    /// A shift already in flight is discarded when it tries to commit.
    pub fn reseed(&self, source: Arc<S>, range: WindowRange) -> MaterializedWindow {
        let window = self.shared.reseed(source, range);
        self.wake();
        window
    }

    /// Cut the current sleep short.
    pub fn wake(&self) {
        if let Some(handle) = &self.handle {
            handle.thread().unpark();
        }
    }

    /// Stop the worker and wait for it. Idempotent.
    pub fn stop(&mut self) {
        self.shared.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            handle.thread().unpark();
            if handle.join().is_err() {
                warn_worker_panicked(self.shared.window.lock().generation);
            }
        }
        self.shared.set_phase(BalancerPhase::Stopped);
    }
}

impl<S: EntrySource + ?Sized> Drop for BalancerWorker<S> {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(feature = "tracing")]
fn trace_shift(plan: &ShiftPlan, generation: u64) {
    trace!(
        event = "balancer.shift",
        generation,
        edge = ?plan.edge,
        inserted = plan.fetch.len(),
        removed = plan.removed,
        first = plan.window.start(),
        count = plan.window.len(),
        "shift committed"
    );
}

#[cfg(not(feature = "tracing"))]
fn trace_shift(_plan: &ShiftPlan, _generation: u64) {}

#[cfg(feature = "tracing")]
fn warn_fetch_failed(plan: &ShiftPlan, err: &DirScrollError) {
    warn!(
        event = "balancer.fetch_failed",
        edge = ?plan.edge,
        start = plan.fetch.start(),
        len = plan.fetch.len(),
        error = %err,
        "fetch failed, retrying next poll"
    );
}

#[cfg(not(feature = "tracing"))]
fn warn_fetch_failed(_plan: &ShiftPlan, _err: &DirScrollError) {}

#[cfg(feature = "tracing")]
fn warn_worker_panicked(generation: u64) {
    warn!(
        event = "balancer.worker_panicked",
        generation,
        "balancer thread panicked"
    );
}

#[cfg(not(feature = "tracing"))]
fn warn_worker_panicked(_generation: u64) {}

#[cfg(feature = "tracing")]
fn trace_stale_shift_dropped(generation: u64, current_generation: u64) {
    trace!(
        event = "balancer.stale_shift_dropped",
        generation, current_generation, "stale shift dropped"
    );
}

#[cfg(not(feature = "tracing"))]
fn trace_stale_shift_dropped(_generation: u64, _current_generation: u64) {}

#[cfg(feature = "tracing")]
fn debug_balancer_stopped(generation: u64) {
    debug!(event = "balancer.stopped", generation, "balancer stopped");
}

#[cfg(not(feature = "tracing"))]
fn debug_balancer_stopped(_generation: u64) {}
