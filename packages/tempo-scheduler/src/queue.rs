use crate::task::Task;
use std::cell::RefCell;
use std::collections::VecDeque;

/// A FIFO queue for microtasks.
/// Since LocalScheduler is single-threaded, we use RefCell<VecDeque>.
pub struct MicrotaskQueue<C> {
    queue: RefCell<VecDeque<Task<C>>>,
}

impl<C> Default for MicrotaskQueue<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> MicrotaskQueue<C> {
    pub fn new() -> Self {
        Self {
            queue: RefCell::new(VecDeque::new()),
        }
    }

    pub fn push(&self, task: Task<C>) {
        self.queue.borrow_mut().push_back(task);
    }

    pub fn push_front(&self, task: Task<C>) {
        self.queue.borrow_mut().push_front(task);
    }

    // The borrow ends before the caller runs the task, so tasks may push
    // more work onto this queue.
    pub fn pop(&self) -> Option<Task<C>> {
        self.queue.borrow_mut().pop_front()
    }

    pub fn len(&self) -> usize {
        self.queue.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.borrow().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_fifo_order() {
        let queue: MicrotaskQueue<()> = MicrotaskQueue::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        for i in 0..3 {
            let log = log.clone();
            queue.push(Box::new(move |_| log.borrow_mut().push(i)));
        }
        assert_eq!(queue.len(), 3);

        while let Some(task) = queue.pop() {
            task(&());
        }

        assert!(queue.is_empty());
        assert_eq!(*log.borrow(), vec![0, 1, 2]);
    }
}
