//! Bounded FIFO storage for per-level histories.

/// A bounded circular buffer.
///
/// When full, pushing evicts and returns the oldest item. Used for every
/// rolling history in the layer so that `len() <= capacity()` always holds.
#[derive(Clone, Debug)]
pub struct RingBuffer<T> {
    buffer: Vec<Option<T>>,
    head: usize,
    len: usize,
}

impl<T: Clone> RingBuffer<T> {
    /// Create a ring buffer with the given capacity (at least 1).
    pub fn new(capacity: usize) -> Self {
        let cap = capacity.max(1);
        Self {
            buffer: vec![None; cap],
            head: 0,
            len: 0,
        }
    }

    /// Push an item, returning the evicted oldest item if the buffer was full.
    pub fn push(&mut self, item: T) -> Option<T> {
        let evicted = if self.is_full() {
            self.buffer[self.head].take()
        } else {
            self.len += 1;
            None
        };
        self.buffer[self.head] = Some(item);
        self.head = (self.head + 1) % self.buffer.len();
        evicted
    }

    /// Iterate over items in insertion order (oldest first).
    pub fn iter(&self) -> RingBufferIter<'_, T> {
        let start = if self.is_full() { self.head } else { 0 };
        RingBufferIter {
            buffer: &self.buffer,
            pos: start,
            remaining: self.len,
        }
    }

    /// Copy the contents out, oldest first.
    pub fn to_vec(&self) -> Vec<T> {
        self.iter().cloned().collect()
    }

    /// Most recently pushed item.
    pub fn last(&self) -> Option<&T> {
        if self.len == 0 {
            return None;
        }
        let idx = (self.head + self.buffer.len() - 1) % self.buffer.len();
        self.buffer[idx].as_ref()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == self.buffer.len()
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Clear all items.
    pub fn clear(&mut self) {
        for slot in &mut self.buffer {
            *slot = None;
        }
        self.head = 0;
        self.len = 0;
    }
}

/// Iterator over a RingBuffer.
pub struct RingBufferIter<'a, T> {
    buffer: &'a [Option<T>],
    pos: usize,
    remaining: usize,
}

impl<'a, T> Iterator for RingBufferIter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let item = self.buffer[self.pos].as_ref();
        self.pos = (self.pos + 1) % self.buffer.len();
        self.remaining -= 1;
        item
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<'a, T> ExactSizeIterator for RingBufferIter<'a, T> {}
