//! Circular error history.
//!
//! Fixed-capacity ring of [`ErrorInfo`] records.  Insertion order is kept;
//! once full, the oldest record is overwritten.  Reads are by age, where
//! age `0` is the most recent record.

use super::ErrorInfo;

/// Ring buffer of the last `N` reported errors.
#[derive(Debug, Clone)]
pub struct ErrorHistory<const N: usize> {
    entries: [ErrorInfo; N],
    /// Slot the next record is written to.
    write_index: usize,
    /// Records ever written (saturating).
    total: u32,
}

impl<const N: usize> Default for ErrorHistory<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> ErrorHistory<N> {
    pub const fn new() -> Self {
        assert!(N > 0, "error history needs at least one slot");
        Self {
            entries: [ErrorInfo::NONE; N],
            write_index: 0,
            total: 0,
        }
    }

    /// Append a record, overwriting the oldest once full.
    pub fn push(&mut self, info: ErrorInfo) {
        self.entries[self.write_index] = info;
        self.write_index = (self.write_index + 1) % N;
        self.total = self.total.saturating_add(1);
    }

    /// Record at `age` (0 = most recent), or `None` past the filled part.
    pub fn get(&self, age: usize) -> Option<ErrorInfo> {
        if age >= self.len() {
            return None;
        }
        let idx = (self.write_index + N - 1 - age) % N;
        Some(self.entries[idx])
    }

    /// Number of valid records (at most `N`).
    pub fn len(&self) -> usize {
        (self.total as usize).min(N)
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    /// Records ever written, including overwritten ones.
    pub fn total_recorded(&self) -> u32 {
        self.total
    }

    /// Iterate from most recent to oldest.
    pub fn iter(&self) -> impl Iterator<Item = ErrorInfo> + '_ {
        (0..self.len()).filter_map(move |age| self.get(age))
    }

    pub fn clear(&mut self) {
        self.entries = [ErrorInfo::NONE; N];
        self.write_index = 0;
        self.total = 0;
    }
}
