//! Fixed-capacity circular queue.
//!
//! Full and empty are told apart by a flag instead of wasting a slot, so
//! all `N` slots are usable. Besides FIFO access the queue can be walked
//! in both directions starting at any queued index, and entries can be
//! inserted in the middle by shifting the tail.

/// Bounded circular queue of `N` slots.
///
/// Slot indices stay stable while an entry is queued; they are what the
/// mid-queue walkers ([`h2t_next`](Self::h2t_next), [`t2h_next`](Self::t2h_next))
/// hand out.
#[derive(Debug, Clone)]
pub struct RingBufferQueue<T, const N: usize> {
    buffer: [T; N],
    head: usize,
    next_tail: usize,
    empty: bool,
}

impl<T: Default + Copy, const N: usize> Default for RingBufferQueue<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Default + Copy, const N: usize> RingBufferQueue<T, N> {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self {
            buffer: [T::default(); N],
            head: 0,
            next_tail: 0,
            empty: true,
        }
    }
}

impl<T, const N: usize> RingBufferQueue<T, N> {
    #[inline]
    const fn next(idx: usize) -> usize {
        if idx + 1 == N {
            0
        } else {
            idx + 1
        }
    }

    #[inline]
    const fn prev(idx: usize) -> usize {
        if idx == 0 {
            N - 1
        } else {
            idx - 1
        }
    }

    /// Slot following `idx`, wrapping around.
    #[inline]
    pub const fn next_index(idx: usize) -> usize {
        Self::next(idx)
    }

    /// Whether no entry is queued.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.empty
    }

    /// Whether all slots are in use.
    #[inline]
    pub fn is_full(&self) -> bool {
        !self.empty && self.head == self.next_tail
    }

    /// Number of queued entries.
    pub fn count(&self) -> usize {
        if self.empty {
            0
        } else if self.next_tail > self.head {
            self.next_tail - self.head
        } else {
            N - self.head + self.next_tail
        }
    }

    /// Number of free slots.
    #[inline]
    pub fn free_count(&self) -> usize {
        N - self.count()
    }

    /// Slot index of the head (oldest) entry.
    #[inline]
    pub fn head_index(&self) -> usize {
        self.head
    }

    /// Slot index of the tail (newest) entry.
    #[inline]
    pub fn tail_index(&self) -> usize {
        Self::prev(self.next_tail)
    }

    /// Slot index the next enqueue writes to.
    #[inline]
    pub fn next_tail_index(&self) -> usize {
        self.next_tail
    }

    /// Whether slot `idx` holds a queued entry.
    pub fn is_in_queue(&self, idx: usize) -> bool {
        if self.empty || idx >= N {
            false
        } else if self.next_tail > self.head {
            idx >= self.head && idx < self.next_tail
        } else {
            idx >= self.head || idx < self.next_tail
        }
    }

    /// Head entry.
    #[inline]
    pub fn head(&self) -> Option<&T> {
        (!self.empty).then(|| &self.buffer[self.head])
    }

    /// Mutable head entry.
    #[inline]
    pub fn head_mut(&mut self) -> Option<&mut T> {
        if self.empty {
            None
        } else {
            Some(&mut self.buffer[self.head])
        }
    }

    /// Tail entry.
    #[inline]
    pub fn tail(&self) -> Option<&T> {
        (!self.empty).then(|| &self.buffer[self.tail_index()])
    }

    /// Slot `idx`, queued or not.
    #[inline]
    pub fn get(&self, idx: usize) -> &T {
        &self.buffer[idx]
    }

    /// Mutable slot `idx`, queued or not.
    #[inline]
    pub fn get_mut(&mut self, idx: usize) -> &mut T {
        &mut self.buffer[idx]
    }

    /// Two distinct slots at once.
    ///
    /// # Panics
    ///
    /// Panics if `a == b`.
    pub fn pair_mut(&mut self, a: usize, b: usize) -> (&mut T, &mut T) {
        assert_ne!(a, b, "pair_mut needs two distinct slots");
        if a < b {
            let (lo, hi) = self.buffer.split_at_mut(b);
            (&mut lo[a], &mut hi[0])
        } else {
            let (lo, hi) = self.buffer.split_at_mut(a);
            (&mut hi[0], &mut lo[b])
        }
    }

    /// Append `value` at the tail.
    ///
    /// Hands `value` back if the queue is full.
    pub fn enqueue(&mut self, value: T) -> Result<(), T> {
        if self.is_full() {
            return Err(value);
        }
        self.buffer[self.next_tail] = value;
        self.next_tail = Self::next(self.next_tail);
        self.empty = false;
        Ok(())
    }

    /// Drop the head entry.
    ///
    /// Returns `false` if the queue was empty.
    pub fn dequeue(&mut self) -> bool {
        if self.empty {
            return false;
        }
        self.head = Self::next(self.head);
        self.empty = self.head == self.next_tail;
        true
    }

    /// Drop every entry behind slot `tail`, which becomes the new tail.
    pub fn remove_tail(&mut self, tail: usize) {
        if self.is_in_queue(tail) {
            self.next_tail = Self::next(tail);
        }
    }

    /// Remove all entries.
    pub fn clear(&mut self) {
        self.head = 0;
        self.next_tail = 0;
        self.empty = true;
    }

    /// First index of a head-to-tail walk.
    #[inline]
    pub fn h2t_first(&self) -> Option<usize> {
        (!self.empty).then_some(self.head)
    }

    /// Index after `idx` in a head-to-tail walk.
    #[inline]
    pub fn h2t_next(&self, idx: usize) -> Option<usize> {
        let next = Self::next(idx);
        (next != self.next_tail).then_some(next)
    }

    /// First index of a tail-to-head walk.
    #[inline]
    pub fn t2h_first(&self) -> Option<usize> {
        (!self.empty).then(|| self.tail_index())
    }

    /// Index after `idx` in a tail-to-head walk.
    #[inline]
    pub fn t2h_next(&self, idx: usize) -> Option<usize> {
        (idx != self.head).then(|| Self::prev(idx))
    }

    /// Iterate queued entries from head to tail.
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        let mut idx = self.h2t_first();
        core::iter::from_fn(move || {
            let current = idx?;
            idx = self.h2t_next(current);
            Some(&self.buffer[current])
        })
    }
}

impl<T: Copy, const N: usize> RingBufferQueue<T, N> {
    /// Insert an entry at slot `at`, shifting `at..=tail` one slot back.
    ///
    /// If `at` is not queued the entry is appended. Returns the slot the
    /// entry landed in, or `None` if the queue is full.
    pub fn insert(&mut self, at: usize, value: T) -> Option<usize> {
        if self.is_full() {
            return None;
        }
        if !self.is_in_queue(at) {
            let idx = self.next_tail;
            self.enqueue(value).ok()?;
            return Some(idx);
        }
        let mut idx = self.tail_index();
        loop {
            self.buffer[Self::next(idx)] = self.buffer[idx];
            if idx == at {
                break;
            }
            idx = Self::prev(idx);
        }
        self.buffer[at] = value;
        self.next_tail = Self::next(self.next_tail);
        Some(at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(values: &[u32]) -> RingBufferQueue<u32, 4> {
        let mut q = RingBufferQueue::new();
        for v in values {
            q.enqueue(*v).unwrap();
        }
        q
    }

    #[test]
    fn test_full_and_empty_are_distinct() {
        let mut q = filled(&[1, 2, 3, 4]);
        assert!(q.is_full());
        assert!(!q.is_empty());
        assert_eq!(q.count(), 4);
        assert_eq!(q.enqueue(5), Err(5));

        for _ in 0..4 {
            assert!(q.dequeue());
        }
        assert!(q.is_empty());
        assert!(!q.is_full());
        assert!(!q.dequeue());
    }

    #[test]
    fn test_wrap_around() {
        let mut q = filled(&[1, 2, 3]);
        q.dequeue();
        q.dequeue();
        q.enqueue(4).unwrap();
        q.enqueue(5).unwrap();
        assert_eq!(q.count(), 3);
        assert_eq!(q.iter().copied().collect::<heapless::Vec<u32, 4>>(), [3, 4, 5]);
        assert_eq!(q.head(), Some(&3));
        assert_eq!(q.tail(), Some(&5));
    }

    #[test]
    fn test_walk_both_directions() {
        let mut q = filled(&[1, 2, 3]);
        q.dequeue();
        q.enqueue(4).unwrap();
        q.enqueue(5).unwrap();

        let mut forward = heapless::Vec::<u32, 4>::new();
        let mut idx = q.h2t_first();
        while let Some(i) = idx {
            forward.push(*q.get(i)).unwrap();
            idx = q.h2t_next(i);
        }
        assert_eq!(forward, [2, 3, 4, 5]);

        let mut backward = heapless::Vec::<u32, 4>::new();
        let mut idx = q.t2h_first();
        while let Some(i) = idx {
            backward.push(*q.get(i)).unwrap();
            idx = q.t2h_next(i);
        }
        assert_eq!(backward, [5, 4, 3, 2]);
    }

    #[test]
    fn test_insert_mid_queue() {
        let mut q = filled(&[1, 2, 3]);
        let at = RingBufferQueue::<u32, 4>::next_index(q.head_index());
        assert_eq!(q.insert(at, 9), Some(at));
        assert_eq!(q.iter().copied().collect::<heapless::Vec<u32, 4>>(), [1, 9, 2, 3]);
        assert_eq!(q.insert(at, 7), None);
    }

    #[test]
    fn test_insert_at_next_tail_appends() {
        let mut q = filled(&[1]);
        let at = q.next_tail_index();
        assert_eq!(q.insert(at, 2), Some(at));
        assert_eq!(q.iter().copied().collect::<heapless::Vec<u32, 4>>(), [1, 2]);
    }

    #[test]
    fn test_remove_tail() {
        let mut q = filled(&[1, 2, 3, 4]);
        q.remove_tail(q.head_index());
        assert_eq!(q.count(), 1);
        assert_eq!(q.tail(), Some(&1));
    }

    #[test]
    fn test_is_in_queue() {
        let mut q = filled(&[1, 2, 3]);
        q.dequeue();
        assert!(!q.is_in_queue(0));
        assert!(q.is_in_queue(1));
        assert!(q.is_in_queue(2));
        assert!(!q.is_in_queue(3));
    }

    #[test]
    fn test_pair_mut() {
        let mut q = filled(&[1, 2]);
        let (a, b) = q.pair_mut(1, 0);
        *a += 10;
        *b += 20;
        assert_eq!(*q.get(0), 21);
        assert_eq!(*q.get(1), 12);
    }
}
