//! Progress check for the periodic task set.
//!
//! A low-rate "check" job snapshots every task's completed-job and
//! deadline-miss counters. If any task completed nothing since the previous
//! check, or missed a deadline, the system is degraded and the status
//! indicator switches to the fast blink period. Degradation latches: a task
//! that stalled once is not trusted again until reboot.

use crate::config::{CHECK_PERIOD_DEGRADED, CHECK_PERIOD_NOMINAL, MAX_TASKS};
use crate::task::{TaskDescriptor, TaskId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Health {
    Nominal,
    Degraded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    Stalled(TaskId),
    MissedDeadline(TaskId),
}

pub struct HealthMonitor {
    completed: [u32; MAX_TASKS],
    misses: [u32; MAX_TASKS],
    primed: bool,
    health: Health,
    first_fault: Option<Fault>,
}

impl HealthMonitor {
    pub const fn new() -> Self {
        Self {
            completed: [0; MAX_TASKS],
            misses: [0; MAX_TASKS],
            primed: false,
            health: Health::Nominal,
            first_fault: None,
        }
    }

    /// Compare the counters against the previous check. The first call only
    /// takes the baseline.
    pub fn check(&mut self, tasks: &[TaskDescriptor]) -> Health {
        for task in tasks.iter().take(MAX_TASKS) {
            let slot = task.id().index();
            if self.primed {
                let fault = if task.deadline_misses() != self.misses[slot] {
                    Some(Fault::MissedDeadline(task.id()))
                } else if task.completed_jobs() == self.completed[slot] {
                    Some(Fault::Stalled(task.id()))
                } else {
                    None
                };
                if let Some(fault) = fault {
                    if self.first_fault.is_none() {
                        log::warn!("health check failed: {:?}", fault);
                        self.first_fault = Some(fault);
                    }
                    self.health = Health::Degraded;
                }
            }
            self.completed[slot] = task.completed_jobs();
            self.misses[slot] = task.deadline_misses();
        }
        self.primed = true;
        self.health
    }

    pub fn health(&self) -> Health {
        self.health
    }

    pub fn first_fault(&self) -> Option<Fault> {
        self.first_fault
    }

    /// Ticks between status indicator toggles.
    pub fn indicator_period(&self) -> u32 {
        match self.health {
            Health::Nominal => CHECK_PERIOD_NOMINAL,
            Health::Degraded => CHECK_PERIOD_DEGRADED,
        }
    }
}

impl Default for HealthMonitor {
    fn default() -> Self {
        Self::new()
    }
}
