//! Window selection over a snapshot of known length.

use std::ops::Range;

/// A contiguous run of snapshot indices.
///
/// Conceptually an inclusive `(start, end)` pair; stored as start and length
/// so the empty window needs no sentinel.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct WindowRange {
    start: usize,
    len: usize,
}

impl WindowRange {
    /// The empty window.
    pub const EMPTY: Self = Self { start: 0, len: 0 };

    /// Window covering `start..=end`.
    ///
    /// Returns [`WindowRange::EMPTY`] when `end < start`.
    pub fn inclusive(start: usize, end: usize) -> Self {
        if end < start {
            Self::EMPTY
        } else {
            Self {
                start,
                len: end - start + 1,
            }
        }
    }

    /// Window of `len` indices starting at `start`.
    pub const fn with_len(start: usize, len: usize) -> Self {
        if len == 0 {
            Self::EMPTY
        } else {
            Self { start, len }
        }
    }

    /// First index. Meaningless for an empty window.
    pub const fn start(&self) -> usize {
        self.start
    }

    /// Last index (inclusive), `None` when empty.
    pub const fn end(&self) -> Option<usize> {
        if self.len == 0 {
            None
        } else {
            Some(self.start + self.len - 1)
        }
    }

    /// Number of indices covered.
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Whether the window covers nothing.
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Half-open index range, suitable for slicing.
    pub const fn as_range(&self) -> Range<usize> {
        self.start..self.start + self.len
    }

    /// Whether `index` falls inside the window.
    pub const fn contains(&self, index: usize) -> bool {
        self.len != 0 && index >= self.start && index < self.start + self.len
    }
}

/// Clamp a requested `(start, length)` to a snapshot of `snapshot_len` entries.
///
/// A request running past the end is shifted backwards so the window stays as
/// full as the snapshot allows. An empty snapshot or a zero length yields
/// [`WindowRange::EMPTY`].
pub fn select_window(snapshot_len: usize, requested_start: usize, requested_length: usize) -> WindowRange {
    if snapshot_len == 0 || requested_length == 0 {
        return WindowRange::EMPTY;
    }
    let start = requested_start.min(snapshot_len - 1);
    if start.saturating_add(requested_length) <= snapshot_len {
        return WindowRange::with_len(start, requested_length);
    }
    let end = snapshot_len - 1;
    let start = (end + 1).saturating_sub(requested_length);
    WindowRange::inclusive(start, end)
}

/// Window of up to `length` entries roughly centred on `focus`.
pub(crate) fn window_around(snapshot_len: usize, focus: usize, before: usize, length: usize) -> WindowRange {
    select_window(snapshot_len, focus.saturating_sub(before), length)
}
