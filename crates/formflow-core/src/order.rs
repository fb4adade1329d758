//! Sparse integer ordering for workflow steps.
//!
//! Steps carry orders that are multiples of 100 after a renumber, leaving
//! gaps so a reorder usually touches one row: a moved step takes the midpoint
//! of its new neighbors. Only when a gap collapses below `MIN_GAP` does the
//! whole list renumber back to the stride.

use tracing::debug;

/// Gap between consecutive orders after a renumber.
pub const STRIDE: i64 = 100;

/// Minimum usable gap; placements that would land closer trigger a renumber.
pub const MIN_GAP: i64 = 10;

/// Where a step lands when inserted or moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// A single order value; only the placed step changes.
    At(i64),
    /// No usable gap remains; the caller renumbers every step.
    Renumber,
}

/// Order for a step appended after all existing ones.
pub fn append_order(orders: &[i64]) -> i64 {
    match orders.last() {
        Some(last) => last + STRIDE,
        None => STRIDE,
    }
}

/// Order for a step placed before position `index` in an ascending-sorted
/// order list (the moved step's own order already removed).
///
/// `index == 0` places at the top, `index == orders.len()` at the bottom.
pub fn place_at(orders: &[i64], index: usize) -> Placement {
    if orders.is_empty() {
        return Placement::At(STRIDE);
    }
    if index == 0 {
        let first = orders[0];
        let candidate = first - STRIDE;
        if candidate >= MIN_GAP {
            return Placement::At(candidate);
        }
        // Not enough headroom above; halve into the remaining space.
        let half = first / 2;
        if half >= 1 && first - half >= MIN_GAP {
            return Placement::At(half);
        }
        debug!(first, "no room above first step, renumbering");
        return Placement::Renumber;
    }
    if index >= orders.len() {
        return Placement::At(append_order(orders));
    }
    let prev = orders[index - 1];
    let next = orders[index];
    let mid = (prev + next) / 2;
    // Both gaps the placement creates must stay usable, not just the one it
    // splits: a gap of 10..19 yields a sub-MIN_GAP remainder on one side.
    if mid - prev < MIN_GAP || next - mid < MIN_GAP {
        debug!(prev, next, "midpoint would collapse a gap, renumbering");
        return Placement::Renumber;
    }
    Placement::At(mid)
}

/// Fresh stride-spaced orders for `len` steps: 100, 200, 300, ...
pub fn renumbered(len: usize) -> Vec<i64> {
    (1..=len as i64).map(|i| i * STRIDE).collect()
}

/// Whether a persisted order list predates sparse ordering.
///
/// Legacy lists were densely numbered from 0 or 1, so any order below the
/// stride marks the whole list for a one-time renumber on load.
pub fn needs_migration(orders: &[i64]) -> bool {
    orders.iter().any(|&o| o < STRIDE)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
