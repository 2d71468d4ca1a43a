//! Error taxonomy of the scheduler core.
//!
//! Only [`AccountingError`] is fatal; it latches the scheduler into a halted
//! state that the host must escalate to its fault handler.

use thiserror::Error;

use crate::task::{TaskId, TaskState};
use crate::Tick;

/// Rejected admission. The task table is left unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AdmissionError {
    #[error("period must be at least one tick")]
    ZeroPeriod,
    #[error("relative deadline must be at least one tick")]
    ZeroDeadline,
    /// Relative deadline is longer than the period plus the configured overrun.
    #[error("relative deadline {deadline} exceeds bound {bound}")]
    DeadlineExceedsBound { deadline: u32, bound: u32 },
    #[error("task table full ({capacity} tasks)")]
    TableFull { capacity: usize },
    /// Tasks can only be admitted before the scheduler starts.
    #[error("scheduler already started")]
    AlreadyStarted,
}

/// Unbalanced or inconsistent execution-time bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AccountingError {
    #[error("{task} entered twice without exit at tick {at}")]
    DoubleEnter { task: TaskId, at: Tick },
    #[error("{task} exited without entry at tick {at}")]
    ExitWithoutEnter { task: TaskId, at: Tick },
    #[error("{task} exited at tick {exited} before it entered at tick {entered}")]
    ClockWentBackwards { task: TaskId, entered: Tick, exited: Tick },
    #[error("no execution record for {0}")]
    UnknownTask(TaskId),
}

/// A job that was still pending when its deadline passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{task} missed deadline {absolute_deadline} (released {release_time}, detected {detected_at})")]
pub struct DeadlineMiss {
    pub task: TaskId,
    pub release_time: Tick,
    pub absolute_deadline: Tick,
    pub detected_at: Tick,
}

/// Errors returned by the dispatcher and the task-context kernel calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SchedulerError {
    #[error("scheduler not started")]
    NotStarted,
    #[error("scheduler already started")]
    AlreadyStarted,
    #[error("unknown {0}")]
    UnknownTask(TaskId),
    #[error("{task} cannot do that while {state:?}")]
    InvalidState { task: TaskId, state: TaskState },
    /// A kernel call stamped with a tick the scheduler cannot accept: before
    /// an earlier call, or past the tick after the last processed one.
    #[error("kernel call at tick {now} outside {earliest}..={latest}")]
    InvalidTick { now: Tick, earliest: Tick, latest: Tick },
    /// Scheduling stopped after an accounting fault.
    #[error("scheduler halted: {0}")]
    Halted(#[from] AccountingError),
}
