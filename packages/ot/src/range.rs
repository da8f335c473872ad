//! Directed offset ranges

use serde::{Deserialize, Serialize};

/// A range between two offsets. `from` may be greater than `to`, in which
/// case the range is backwards (the cursor sits at `to`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Range {
    pub from: usize,
    pub to: usize,
}

impl Range {
    pub fn new(from: usize, to: usize) -> Self {
        Self { from, to }
    }

    /// Zero-length range at `offset`
    pub fn collapsed(offset: usize) -> Self {
        Self::new(offset, offset)
    }

    pub fn start(&self) -> usize {
        self.from.min(self.to)
    }

    pub fn end(&self) -> usize {
        self.from.max(self.to)
    }

    pub fn len(&self) -> usize {
        self.end() - self.start()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_collapsed(&self) -> bool {
        self.from == self.to
    }

    pub fn is_backwards(&self) -> bool {
        self.from > self.to
    }

    /// Build a range from translated endpoints, keeping this range's direction
    pub(crate) fn with_direction_of(other: &Range, start: usize, end: usize) -> Self {
        if other.is_backwards() {
            Self::new(end, start)
        } else {
            Self::new(start, end)
        }
    }
}
