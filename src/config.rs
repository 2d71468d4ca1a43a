//! Scheduler configuration.
//!
//! Capacities are compile-time constants so every table is statically sized;
//! the few knobs that make sense per application live in [`SchedulerConfig`].

/// Maximum number of periodic tasks the scheduler can admit.
pub const MAX_TASKS: usize = 8;

/// Number of ticks of busy-time history kept for `cpu_load`.
pub const LOAD_HISTORY: usize = 256;

/// Tick rate of the timer interrupt (1 ms tick).
pub const TICK_RATE_HZ: u32 = 1000;

/// Depth of the producer/consumer mailbox used by the demo task set.
/// `heapless::spsc::Queue` keeps one slot free, so this holds 5 messages.
pub const MAILBOX_DEPTH: usize = 6;

/// Health check interval while every task is making progress.
pub const CHECK_PERIOD_NOMINAL: u32 = 3000;

/// Health check interval once a task has stalled or missed a deadline.
pub const CHECK_PERIOD_DEGRADED: u32 = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// How far past its period a relative deadline may reach.
    /// Zero keeps deadlines constrained (`D <= T`).
    pub max_deadline_overrun: u32,
    /// Default trailing window for [`crate::Scheduler::cpu_load`].
    pub load_window: u32,
    /// Report a miss as soon as a job passes its absolute deadline instead
    /// of waiting for the next release.
    pub report_constrained_misses: bool,
}

impl SchedulerConfig {
    pub const fn new() -> Self {
        Self {
            max_deadline_overrun: 0,
            load_window: 100,
            report_constrained_misses: true,
        }
    }

    pub const fn with_deadline_overrun(mut self, ticks: u32) -> Self {
        self.max_deadline_overrun = ticks;
        self
    }

    pub const fn with_load_window(mut self, ticks: u32) -> Self {
        self.load_window = ticks;
        self
    }

    pub const fn with_constrained_misses(mut self, enabled: bool) -> Self {
        self.report_constrained_misses = enabled;
        self
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self::new()
    }
}
