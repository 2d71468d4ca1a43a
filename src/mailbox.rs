//! Contract of the bounded producer/consumer mailbox.
//!
//! The scheduler never touches message contents; task bodies exchange data
//! through any type implementing [`Mailbox`]. Neither call blocks: a task
//! that wants to wait for room or data blocks itself through the scheduler.

use heapless::spsc::Queue;

pub trait Mailbox<T> {
    /// Enqueue `msg`, handing it back when the mailbox is full.
    fn try_send(&mut self, msg: T) -> Result<(), T>;

    fn try_recv(&mut self) -> Option<T>;

    fn len(&self) -> usize;

    fn capacity(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_full(&self) -> bool {
        self.len() == self.capacity()
    }
}

impl<T, const N: usize> Mailbox<T> for Queue<T, N> {
    fn try_send(&mut self, msg: T) -> Result<(), T> {
        Queue::enqueue(self, msg)
    }

    fn try_recv(&mut self) -> Option<T> {
        Queue::dequeue(self)
    }

    fn len(&self) -> usize {
        Queue::len(self)
    }

    fn capacity(&self) -> usize {
        Queue::capacity(self)
    }
}
