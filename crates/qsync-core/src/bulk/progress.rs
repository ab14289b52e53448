//! Cumulative progress of a bulk operation.

/// `current` counts confirmed successes only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BulkProgress {
    pub current: usize,
    pub total: usize,
}

impl BulkProgress {
    pub fn new(total: usize) -> Self {
        Self { current: 0, total }
    }

    /// Fraction complete in [0.0, 1.0].
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        (self.current as f64 / self.total as f64).min(1.0)
    }

    pub fn is_complete(&self) -> bool {
        self.current >= self.total
    }
}
