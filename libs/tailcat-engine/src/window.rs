use std::collections::VecDeque;
use std::num::NonZeroUsize;

/// FIFO of the most recent `capacity` rendered elements.
#[derive(Debug)]
pub struct TailWindow {
    capacity: NonZeroUsize,
    items: VecDeque<String>,
}

impl TailWindow {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            capacity,
            items: VecDeque::with_capacity(capacity.get()),
        }
    }

    /// Append `item`, evicting the oldest element when full.
    pub fn push(&mut self, item: String) {
        if self.items.len() == self.capacity.get() {
            self.items.pop_front();
        }
        self.items.push_back(item);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Take every element, oldest first, leaving the window empty.
    pub fn drain(&mut self) -> Vec<String> {
        self.items.drain(..).collect()
    }

    /// Drop the contents without emitting them.
    pub fn discard(&mut self) {
        self.items.clear();
    }
}
