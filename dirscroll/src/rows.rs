//! UI-side row collection that follows the balancer's instructions.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::balancer::{Edge, ShiftInstruction};
use crate::snapshot::EntryDescriptor;
use crate::window::WindowRange;

/// Rows handed out when a window is (re)seeded.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WindowSeed {
    /// Window generation the rows belong to.
    pub generation: u64,
    /// Snapshot index of the first row.
    pub first_index: usize,
    /// Materialized rows in snapshot order.
    pub rows: Vec<Arc<EntryDescriptor>>,
}

impl WindowSeed {
    /// Covered indices.
    pub fn range(&self) -> WindowRange {
        WindowRange::with_len(self.first_index, self.rows.len())
    }
}

/// Materialized rows as the UI holds them.
#[derive(Clone, Debug, Default)]
pub struct RowBuffer {
    generation: u64,
    first_index: usize,
    rows: VecDeque<Arc<EntryDescriptor>>,
}

impl RowBuffer {
    /// Buffer holding the rows of `seed`.
    pub fn from_seed(seed: WindowSeed) -> Self {
        let mut buffer = Self::default();
        buffer.replace(seed.generation, seed.first_index, seed.rows);
        buffer
    }

    /// Swap in the rows of a reseed.
    pub fn replace(&mut self, generation: u64, first_index: usize, rows: Vec<Arc<EntryDescriptor>>) {
        self.generation = generation;
        self.first_index = first_index;
        self.rows = rows.into();
    }

    /// Apply a shift: insert first, then remove from the opposite edge.
    ///
    /// Returns `false` and leaves the buffer untouched when the instruction
    /// belongs to another generation or was planned against a different
    /// window.
    pub fn apply(&mut self, shift: &ShiftInstruction) -> bool {
        if shift.generation != self.generation || shift.previous != self.range() {
            return false;
        }
        match shift.edge {
            Edge::Top => {
                for row in shift.inserted.iter().rev() {
                    self.rows.push_front(Arc::clone(row));
                }
                self.first_index -= shift.inserted.len();
                let keep = self.rows.len().saturating_sub(shift.removed);
                self.rows.truncate(keep);
            }
            Edge::Bottom => {
                self.rows.extend(shift.inserted.iter().cloned());
                let removed = shift.removed.min(self.rows.len());
                self.rows.drain(..removed);
                self.first_index += removed;
            }
        }
        true
    }

    /// Window generation of the current rows.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Snapshot index of the first row.
    pub fn first_index(&self) -> usize {
        self.first_index
    }

    /// Number of rows held.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether no rows are held.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Covered snapshot indices.
    pub fn range(&self) -> WindowRange {
        WindowRange::with_len(self.first_index, self.rows.len())
    }

    /// Row at absolute snapshot `index`, if materialized.
    pub fn get(&self, index: usize) -> Option<&Arc<EntryDescriptor>> {
        index
            .checked_sub(self.first_index)
            .and_then(|offset| self.rows.get(offset))
    }

    /// Iterate rows in snapshot order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<EntryDescriptor>> + '_ {
        self.rows.iter()
    }
}
