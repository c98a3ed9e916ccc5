use crate::task::{Task, Ticks, TimerId};
use rustc_hash::FxHashMap;
use std::cell::{Cell, RefCell};
use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// Timers ordered by `(deadline, sequence)`.
///
/// Cancellation is lazy: the task is removed from `live` and its heap entry
/// is discarded the next time it reaches the top.
pub struct TimerQueue<C> {
    heap: RefCell<BinaryHeap<Reverse<(Ticks, TimerId)>>>,
    live: RefCell<FxHashMap<TimerId, Task<C>>>,
    next_sequence: Cell<u64>,
}

impl<C> Default for TimerQueue<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> TimerQueue<C> {
    pub fn new() -> Self {
        Self {
            heap: RefCell::new(BinaryHeap::new()),
            live: RefCell::new(FxHashMap::default()),
            next_sequence: Cell::new(0),
        }
    }

    pub fn insert(&self, deadline: Ticks, task: Task<C>) -> TimerId {
        let id = TimerId(self.next_sequence.get());
        self.next_sequence.set(id.0 + 1);

        self.live.borrow_mut().insert(id, task);
        self.heap.borrow_mut().push(Reverse((deadline, id)));
        id
    }

    pub fn cancel(&self, id: TimerId) -> bool {
        self.live.borrow_mut().remove(&id).is_some()
    }

    pub fn contains(&self, id: TimerId) -> bool {
        self.live.borrow().contains_key(&id)
    }

    /// Deadline of the next live timer, pruning cancelled entries on the way.
    pub fn peek_deadline(&self) -> Option<Ticks> {
        let live = self.live.borrow();
        let mut heap = self.heap.borrow_mut();
        while let Some(&Reverse((deadline, id))) = heap.peek() {
            if live.contains_key(&id) {
                return Some(deadline);
            }
            heap.pop();
        }
        None
    }

    /// Remove and return the next live timer.
    pub fn pop(&self) -> Option<(TimerId, Ticks, Task<C>)> {
        let mut live = self.live.borrow_mut();
        let mut heap = self.heap.borrow_mut();
        while let Some(Reverse((deadline, id))) = heap.pop() {
            if let Some(task) = live.remove(&id) {
                return Some((id, deadline, task));
            }
        }
        None
    }

    pub fn len(&self) -> usize {
        self.live.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.borrow().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> Task<()> {
        Box::new(|_| {})
    }

    #[test]
    fn test_orders_by_deadline_then_sequence() {
        let timers = TimerQueue::new();
        let late = timers.insert(20, noop());
        let first = timers.insert(10, noop());
        let second = timers.insert(10, noop());

        assert!(late.sequence() < first.sequence());
        assert!(first.sequence() < second.sequence());

        let order: Vec<_> = std::iter::from_fn(|| timers.pop().map(|(id, at, _)| (id, at))).collect();
        assert_eq!(order, vec![(first, 10), (second, 10), (late, 20)]);
    }

    #[test]
    fn test_cancelled_entries_are_skipped() {
        let timers = TimerQueue::new();
        let a = timers.insert(5, noop());
        let b = timers.insert(7, noop());

        assert!(timers.contains(a));
        assert!(timers.cancel(a));
        assert!(!timers.cancel(a));
        assert!(!timers.contains(a));
        assert!(timers.contains(b));
        assert_eq!(timers.len(), 1);
        assert_eq!(timers.peek_deadline(), Some(7));

        let (id, _, _) = timers.pop().unwrap();
        assert_eq!(id, b);
        assert!(!timers.contains(b));
        assert!(timers.pop().is_none());
        assert!(timers.is_empty());
    }
}
