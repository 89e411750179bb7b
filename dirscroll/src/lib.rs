#![deny(missing_docs)]
//! Virtualized directory listings for huge folders.
//!
//! A UI that shows a directory with tens of thousands of entries only ever
//! materializes a small window of rows. This crate provides the pieces that
//! keep that window filled:
//!
//! - [`IdResolver`] maps absolute paths to root-relative identifiers and back
//! - [`DirectorySnapshot`] is an immutable, ordered listing of one directory
//! - [`select_window`] clamps a requested slice to a snapshot
//! - [`Balancer`] keeps a buffer of rows on both sides of the viewport and
//!   publishes [`ShiftInstruction`]s from a background thread
//! - [`ViewSession`] wires all of it together for one view, and
//!   [`RowBuffer`] applies the shifts on the UI side
//!
//! ```no_run
//! use dirscroll::{RowBuffer, SessionConfig, StdFileSystem, ViewSession, Viewport};
//!
//! # fn main() -> dirscroll::DirScrollResult<()> {
//! let config = SessionConfig::new("/data/pics");
//! let (session, seed) =
//!     ViewSession::open(StdFileSystem, config, "root:", Viewport::new(0, 19, 20))?;
//! let mut rows = RowBuffer::from_seed(seed);
//!
//! session.set_viewport(5, 24, 20);
//! while let Ok(shift) = session.shifts().try_recv() {
//!     rows.apply(&shift);
//! }
//! # Ok(())
//! # }
//! ```

mod balancer;
mod config;
mod error;
mod fs;
mod listing;
#[cfg(feature = "tracing")]
pub mod logging;
mod resolver;
mod rows;
mod session;
mod snapshot;
#[cfg(test)]
mod test_support;
mod window;

pub use balancer::{
    Balancer, BalancerPhase, BalancerWorker, Deficits, Edge, EntrySource, MaterializedWindow,
    PollOutcome, ShiftInstruction, ShiftPlan, Viewport, ViewportHandle, compute_deficits,
    plan_shift, window_capacity,
};
pub use config::{BalancerConfig, DEFAULT_BALANCE_TARGET, DEFAULT_POLL_INTERVAL, SessionConfig};
pub use error::{DirScrollError, DirScrollResult};
pub use fs::{FileSystem, FsEntry, FsMetadata, PermissionSummary, StdFileSystem};
pub use listing::{CompiledFilter, ListingFilter, SortBy, SortSpec};
pub use resolver::{DEFAULT_ROOT_MARKER, IdResolver};
pub use rows::{RowBuffer, WindowSeed};
pub use session::ViewSession;
pub use snapshot::{DirectorySnapshot, EntryDescriptor, EntryFilter, EntryOrder, SnapshotSource};
pub use window::{WindowRange, select_window};
