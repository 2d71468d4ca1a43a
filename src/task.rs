use core::fmt;

use crate::error::DeadlineMiss;
use crate::ready::ReadyEntry;
use crate::Tick;

/// Task states in the preemptive EDF kernel.
/// Suspended: waiting for the next release (completed, not started, or
/// administratively suspended). Ready: released and waiting for the CPU.
/// Running: on the CPU. Blocked: waiting on an external resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Suspended,
    Ready,
    Running,
    Blocked,
}

/// Admission slot of a task; stable for the lifetime of the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(u8);

impl TaskId {
    pub const fn new(raw: u8) -> Self {
        Self(raw)
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task#{}", self.0)
    }
}

/// Code the host jumps to when it first switches to a task.
pub type TaskEntry = fn();

/// A periodic real-time task.
/// Each job is released every `period` ticks and must complete within
/// `relative_deadline` ticks of its release. Fields are written only by the
/// scheduler; everything else reads them through the accessors.
#[derive(Debug, Clone, Copy)]
pub struct TaskDescriptor {
    pub(crate) id: TaskId,
    pub(crate) name: &'static str,
    pub(crate) period: u32,
    pub(crate) relative_deadline: u32,
    pub(crate) priority: u8,
    pub(crate) entry: TaskEntry,
    pub(crate) state: TaskState,
    pub(crate) released: bool,
    pub(crate) release_time: Tick,
    pub(crate) absolute_deadline: Tick,
    pub(crate) wake_at: Option<Tick>,
    /// Set once the current job has been reported late.
    pub(crate) miss_reported: bool,
    pub(crate) completed_jobs: u32,
    pub(crate) deadline_misses: u32,
    pub(crate) last_miss: Option<DeadlineMiss>,
}

impl TaskDescriptor {
    pub(crate) const fn new(
        id: TaskId,
        name: &'static str,
        period: u32,
        relative_deadline: u32,
        priority: u8,
        entry: TaskEntry,
    ) -> Self {
        Self {
            id,
            name,
            period,
            relative_deadline,
            priority,
            entry,
            state: TaskState::Suspended,
            released: false,
            release_time: 0,
            absolute_deadline: 0,
            wake_at: None,
            miss_reported: false,
            completed_jobs: 0,
            deadline_misses: 0,
            last_miss: None,
        }
    }

    /// Start a new job at `now`: renews the absolute deadline and marks the
    /// task ready. The caller owns the ready-structure update.
    pub(crate) fn release(&mut self, now: Tick) {
        self.released = true;
        self.release_time = now;
        self.absolute_deadline = now.saturating_add(u64::from(self.relative_deadline));
        self.state = TaskState::Ready;
        self.wake_at = None;
        self.miss_reported = false;
    }

    /// Tick of the next periodic release, once the task has been started.
    pub fn next_release(&self) -> Option<Tick> {
        self.released
            .then(|| self.release_time.saturating_add(u64::from(self.period)))
    }

    /// Whether the current job is still outstanding.
    pub fn has_pending_job(&self) -> bool {
        matches!(
            self.state,
            TaskState::Ready | TaskState::Running | TaskState::Blocked
        )
    }

    pub(crate) fn ready_entry(&self) -> ReadyEntry {
        ReadyEntry {
            absolute_deadline: self.absolute_deadline,
            priority: self.priority,
            task: self.id,
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn period(&self) -> u32 {
        self.period
    }

    pub fn relative_deadline(&self) -> u32 {
        self.relative_deadline
    }

    pub fn priority(&self) -> u8 {
        self.priority
    }

    pub fn entry(&self) -> TaskEntry {
        self.entry
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    pub fn release_time(&self) -> Tick {
        self.release_time
    }

    pub fn absolute_deadline(&self) -> Tick {
        self.absolute_deadline
    }

    pub fn wake_at(&self) -> Option<Tick> {
        self.wake_at
    }

    pub fn completed_jobs(&self) -> u32 {
        self.completed_jobs
    }

    pub fn deadline_misses(&self) -> u32 {
        self.deadline_misses
    }

    pub fn last_miss(&self) -> Option<DeadlineMiss> {
        self.last_miss
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body() {}

    #[test]
    fn new_task_waits_for_first_release() {
        let task = TaskDescriptor::new(TaskId::new(0), "t", 10, 10, 1, body);
        assert_eq!(task.state(), TaskState::Suspended);
        assert_eq!(task.next_release(), None);
        assert!(!task.has_pending_job());
    }

    #[test]
    fn release_renews_deadline() {
        let mut task = TaskDescriptor::new(TaskId::new(3), "t", 20, 15, 1, body);
        task.release(0);
        assert_eq!(task.absolute_deadline(), 15);
        assert_eq!(task.next_release(), Some(20));

        task.release(20);
        assert_eq!(task.absolute_deadline(), 35);
        assert_eq!(task.release_time(), 20);
        assert_eq!(task.state(), TaskState::Ready);
        assert_eq!(
            task.ready_entry(),
            ReadyEntry {
                absolute_deadline: 35,
                priority: 1,
                task: TaskId::new(3)
            }
        );
    }
}
