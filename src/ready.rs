//! Deadline index over the ready tasks.
//!
//! An indexed binary min-heap: the heap array holds the entries and a
//! position map from task slot to heap slot makes removal of an arbitrary
//! task O(log n). The minimum always sits at heap slot 0.

use heapless::Vec;

use crate::task::TaskId;
use crate::Tick;

const ABSENT: usize = usize::MAX;

/// Ready-queue key. Field order gives the ordering: earliest deadline,
/// then lowest priority value, then lowest task id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ReadyEntry {
    pub absolute_deadline: Tick,
    pub priority: u8,
    pub task: TaskId,
}

pub struct DeadlineIndex<const N: usize> {
    heap: Vec<ReadyEntry, N>,
    position: [usize; N],
}

impl<const N: usize> DeadlineIndex<N> {
    pub const fn new() -> Self {
        Self {
            heap: Vec::new(),
            position: [ABSENT; N],
        }
    }

    /// Add a task, or re-key it if it is already present.
    /// Returns false if the task id does not fit this index.
    pub fn insert(&mut self, task: TaskId, absolute_deadline: Tick, priority: u8) -> bool {
        let slot = task.index();
        if slot >= N {
            return false;
        }
        let entry = ReadyEntry {
            absolute_deadline,
            priority,
            task,
        };

        let at = self.position[slot];
        if at != ABSENT {
            self.heap[at] = entry;
            let at = self.sift_up(at);
            self.sift_down(at);
            return true;
        }

        // Every id below N owns at most one heap slot, so this cannot overflow.
        if self.heap.push(entry).is_err() {
            return false;
        }
        let at = self.heap.len() - 1;
        self.position[slot] = at;
        self.sift_up(at);
        true
    }

    pub fn insert_entry(&mut self, entry: ReadyEntry) -> bool {
        self.insert(entry.task, entry.absolute_deadline, entry.priority)
    }

    /// Remove a task wherever it sits in the heap. Returns whether it was present.
    pub fn remove(&mut self, task: TaskId) -> bool {
        let slot = task.index();
        if slot >= N || self.position[slot] == ABSENT {
            return false;
        }
        let at = self.position[slot];
        let last = self.heap.len() - 1;
        self.swap(at, last);
        self.heap.pop();
        self.position[slot] = ABSENT;

        if at < self.heap.len() {
            let at = self.sift_up(at);
            self.sift_down(at);
        }
        true
    }

    pub fn peek_min(&self) -> Option<TaskId> {
        self.heap.first().map(|entry| entry.task)
    }

    pub fn contains(&self, task: TaskId) -> bool {
        task.index() < N && self.position[task.index()] != ABSENT
    }

    pub fn get(&self, task: TaskId) -> Option<&ReadyEntry> {
        if !self.contains(task) {
            return None;
        }
        self.heap.get(self.position[task.index()])
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn clear(&mut self) {
        self.heap.clear();
        self.position = [ABSENT; N];
    }

    fn swap(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        self.heap.swap(a, b);
        self.position[self.heap[a].task.index()] = a;
        self.position[self.heap[b].task.index()] = b;
    }

    fn sift_up(&mut self, mut at: usize) -> usize {
        while at > 0 {
            let parent = (at - 1) / 2;
            if self.heap[at] >= self.heap[parent] {
                break;
            }
            self.swap(at, parent);
            at = parent;
        }
        at
    }

    fn sift_down(&mut self, mut at: usize) -> usize {
        let len = self.heap.len();
        loop {
            let left = 2 * at + 1;
            let right = left + 1;
            let mut smallest = at;
            if left < len && self.heap[left] < self.heap[smallest] {
                smallest = left;
            }
            if right < len && self.heap[right] < self.heap[smallest] {
                smallest = right;
            }
            if smallest == at {
                return at;
            }
            self.swap(at, smallest);
            at = smallest;
        }
    }
}

impl<const N: usize> Default for DeadlineIndex<N> {
    fn default() -> Self {
        Self::new()
    }
}
