//! Earliest-deadline-first scheduler core for a single-core microcontroller.
//!
//! A fixed set of periodic tasks is admitted once at boot. On every timer
//! tick the [`Scheduler`] releases tasks whose period has elapsed, renews
//! their absolute deadlines and runs the ready task with the nearest
//! deadline, preempting the current one if needed. Execution time is
//! accounted per task so CPU load and deadline misses can be monitored at
//! runtime.
//!
//! Nothing allocates: the task table, ready index and accounting history
//! are all fixed-size, sized by [`config::MAX_TASKS`] and
//! [`config::LOAD_HISTORY`].
//!
//! ```
//! use edf_rtos::{NoopPort, Scheduler, SchedulerConfig};
//!
//! fn blink() {}
//!
//! let mut sched = Scheduler::new(SchedulerConfig::new());
//! let task = sched.admit(50, None, 1, blink).unwrap();
//! assert_eq!(sched.start(0, &mut NoopPort).unwrap(), Some(task));
//! // Kernel calls are stamped with the current tick or the next one.
//! sched.complete_job(task, 1, &mut NoopPort).unwrap();
//! assert_eq!(sched.on_tick(1, &mut NoopPort).unwrap(), None);
//! ```

#![cfg_attr(not(test), no_std)]

pub mod accounting;
pub mod config;
pub mod error;
pub mod health;
pub mod mailbox;
pub mod port;
pub mod ready;
pub mod scheduler;
pub mod sim;
pub mod task;

/// Timer tick count. 64 bits wide, so at 1 kHz it wraps after roughly
/// 584 million years; tick arithmetic assumes it never wraps.
pub type Tick = u64;

pub use accounting::{Accounting, ExecutionRecord};
pub use config::SchedulerConfig;
pub use error::{AccountingError, AdmissionError, DeadlineMiss, SchedulerError};
pub use health::{Health, HealthMonitor};
pub use mailbox::Mailbox;
pub use port::{NoopPort, Port};
pub use ready::{DeadlineIndex, ReadyEntry};
pub use scheduler::{Scheduler, SchedulerStats};
pub use sim::{EntryPoints, JobRunner, Simulation};
pub use task::{TaskDescriptor, TaskEntry, TaskId, TaskState};
