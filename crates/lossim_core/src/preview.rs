//! Fixed-capacity FIFO window of the most recent losses, for live charting.

use std::collections::VecDeque;

/// Slots reserved up front; larger windows grow as they fill
const INITIAL_SLOTS: usize = 4096;

#[derive(Debug, Clone)]
pub struct LivePreview {
    window: VecDeque<f64>,
    capacity: usize,
}

impl LivePreview {
    pub fn new(capacity: usize) -> Self {
        Self {
            window: VecDeque::with_capacity(capacity.min(INITIAL_SLOTS)),
            capacity,
        }
    }

    /// Append `value`, evicting the oldest entry once full
    #[inline]
    pub fn push(&mut self, value: f64) {
        if self.capacity == 0 {
            return;
        }
        if self.window.len() == self.capacity {
            self.window.pop_front();
        }
        self.window.push_back(value);
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Copy of the window, oldest first
    pub fn snapshot(&self) -> Vec<f64> {
        self.window.iter().copied().collect()
    }
}
