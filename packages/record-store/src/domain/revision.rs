//! Revision counter
//!
//! Monotonic mutation token. Collaborators compare revisions to decide whether
//! anything changed (e.g. as an ETag).

/// Monotonically increasing mutation counter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct RevisionCounter {
    value: u64,
}

impl RevisionCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one structural mutation
    pub fn bump(&mut self) -> u64 {
        self.value += 1;
        self.value
    }

    pub fn current(&self) -> u64 {
        self.value
    }
}
