//! Tick-driven preemptive EDF scheduler.
//!
//! Each tick: checkpoint accounting, wake timed-out blocked tasks, report
//! overdue jobs, release periodic tasks, then run the ready task with the
//! earliest absolute deadline. Task-context kernel calls (`complete_job`,
//! `block`, `unblock`, `suspend`) must be serialized with `on_tick` by the
//! host, e.g. by running both inside a critical section. They are stamped
//! with the last processed tick or the one after it, never earlier than a
//! previous call.

use heapless::Vec;
use log::{debug, error, info, warn};

use crate::accounting::Accounting;
use crate::config::{SchedulerConfig, MAX_TASKS};
use crate::error::{AccountingError, AdmissionError, DeadlineMiss, SchedulerError};
use crate::port::Port;
use crate::ready::DeadlineIndex;
use crate::task::{TaskDescriptor, TaskEntry, TaskId, TaskState};
use crate::Tick;

const _: () = assert!(MAX_TASKS <= u8::MAX as usize);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub context_switches: u32,
    pub deadline_misses: u32,
    pub completed_jobs: u32,
}

pub struct Scheduler {
    config: SchedulerConfig,
    tasks: Vec<TaskDescriptor, MAX_TASKS>,
    ready: DeadlineIndex<MAX_TASKS>,
    accounting: Accounting<MAX_TASKS>,
    running: Option<TaskId>,
    last_tick: Option<Tick>,
    /// Tick of the latest kernel call.
    call_floor: Tick,
    halted: Option<AccountingError>,
    stats: SchedulerStats,
}

impl Scheduler {
    pub const fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            tasks: Vec::new(),
            ready: DeadlineIndex::new(),
            accounting: Accounting::new(),
            running: None,
            last_tick: None,
            call_floor: 0,
            halted: None,
            stats: SchedulerStats {
                context_switches: 0,
                deadline_misses: 0,
                completed_jobs: 0,
            },
        }
    }

    /// Register a periodic task. `relative_deadline` defaults to the period.
    pub fn admit(
        &mut self,
        period: u32,
        relative_deadline: Option<u32>,
        priority: u8,
        entry: TaskEntry,
    ) -> Result<TaskId, AdmissionError> {
        self.admit_named("task", period, relative_deadline, priority, entry)
    }

    pub fn admit_named(
        &mut self,
        name: &'static str,
        period: u32,
        relative_deadline: Option<u32>,
        priority: u8,
        entry: TaskEntry,
    ) -> Result<TaskId, AdmissionError> {
        if self.is_started() {
            return Err(AdmissionError::AlreadyStarted);
        }
        if period == 0 {
            return Err(AdmissionError::ZeroPeriod);
        }
        let deadline = relative_deadline.unwrap_or(period);
        if deadline == 0 {
            return Err(AdmissionError::ZeroDeadline);
        }
        let bound = period.saturating_add(self.config.max_deadline_overrun);
        if deadline > bound {
            return Err(AdmissionError::DeadlineExceedsBound { deadline, bound });
        }

        let full = AdmissionError::TableFull {
            capacity: MAX_TASKS,
        };
        if self.tasks.is_full() {
            return Err(full);
        }
        let id = TaskId::new(self.tasks.len() as u8);
        self.tasks
            .push(TaskDescriptor::new(id, name, period, deadline, priority, entry))
            .map_err(|_| full)?;

        info!(
            "admitted {} '{}': period={} deadline={} priority={}",
            id, name, period, deadline, priority
        );
        Ok(id)
    }

    /// Release every admitted task at `now` and dispatch the first job.
    pub fn start<P: Port>(
        &mut self,
        now: Tick,
        port: &mut P,
    ) -> Result<Option<TaskId>, SchedulerError> {
        self.check_halted()?;
        if self.is_started() {
            return Err(SchedulerError::AlreadyStarted);
        }
        self.last_tick = Some(now);
        self.call_floor = now;
        self.accounting.checkpoint(now);

        for task in self.tasks.iter_mut() {
            task.release(now);
            self.ready.insert_entry(task.ready_entry());
        }
        info!("scheduler started at tick {} with {} tasks", now, self.tasks.len());

        self.dispatch(now, port, true)?;
        port.on_tick(now);
        Ok(self.running)
    }

    /// Timer interrupt entry point. Returns the task now owning the CPU.
    /// A repeated or stale `now` is ignored.
    pub fn on_tick<P: Port>(
        &mut self,
        now: Tick,
        port: &mut P,
    ) -> Result<Option<TaskId>, SchedulerError> {
        self.check_halted()?;
        let last = self.last_tick.ok_or(SchedulerError::NotStarted)?;
        if now <= last {
            return Ok(self.running);
        }
        self.last_tick = Some(now);
        self.accounting.checkpoint(now);

        self.wake_timed_out(now);
        if self.config.report_constrained_misses {
            self.report_overdue(now, port);
        }
        let owner = self.running;
        self.release_due(now, port)?;
        let vacated = owner.is_some() && self.running.is_none();
        self.dispatch(now, port, vacated)?;

        port.on_tick(now);
        Ok(self.running)
    }

    /// The running job of `task` finished; it sleeps until its next release.
    pub fn complete_job<P: Port>(
        &mut self,
        task: TaskId,
        now: Tick,
        port: &mut P,
    ) -> Result<Option<TaskId>, SchedulerError> {
        let index = self.prepare_call(task, now)?;
        self.expect_state(index, &[TaskState::Running])?;

        self.ready.remove(task);
        self.switch_out(task, now)?;
        let descriptor = &mut self.tasks[index];
        descriptor.state = TaskState::Suspended;
        descriptor.completed_jobs += 1;
        self.stats.completed_jobs += 1;
        debug!("{} completed job released at {}", task, descriptor.release_time);

        self.dispatch(now, port, true)?;
        Ok(self.running)
    }

    /// Take `task` off the ready structure until [`Scheduler::unblock`] or,
    /// with a timeout, until `now + timeout`.
    pub fn block<P: Port>(
        &mut self,
        task: TaskId,
        now: Tick,
        timeout: Option<u32>,
        port: &mut P,
    ) -> Result<Option<TaskId>, SchedulerError> {
        let index = self.prepare_call(task, now)?;
        self.expect_state(index, &[TaskState::Running, TaskState::Ready])?;

        self.ready.remove(task);
        let vacated = self.running == Some(task);
        if vacated {
            self.switch_out(task, now)?;
        }
        let descriptor = &mut self.tasks[index];
        descriptor.state = TaskState::Blocked;
        descriptor.wake_at = timeout.map(|ticks| now.saturating_add(u64::from(ticks)));
        debug!("{} blocked until {:?}", task, descriptor.wake_at);

        self.dispatch(now, port, vacated)?;
        Ok(self.running)
    }

    /// Return a blocked task to the ready structure with its current deadline.
    pub fn unblock<P: Port>(
        &mut self,
        task: TaskId,
        now: Tick,
        port: &mut P,
    ) -> Result<Option<TaskId>, SchedulerError> {
        let index = self.prepare_call(task, now)?;
        self.expect_state(index, &[TaskState::Blocked])?;

        self.make_ready(index);
        debug!("{} unblocked at {}", task, now);

        self.dispatch(now, port, false)?;
        Ok(self.running)
    }

    /// Administratively cancel the current job; the next periodic release
    /// brings the task back.
    pub fn suspend<P: Port>(
        &mut self,
        task: TaskId,
        now: Tick,
        port: &mut P,
    ) -> Result<Option<TaskId>, SchedulerError> {
        let index = self.prepare_call(task, now)?;
        if self.tasks[index].state == TaskState::Suspended {
            return Ok(self.running);
        }

        self.ready.remove(task);
        let vacated = self.running == Some(task);
        if vacated {
            self.switch_out(task, now)?;
        }
        let descriptor = &mut self.tasks[index];
        descriptor.state = TaskState::Suspended;
        descriptor.wake_at = None;
        info!("{} suspended at {}", task, now);

        self.dispatch(now, port, vacated)?;
        Ok(self.running)
    }

    fn wake_timed_out(&mut self, now: Tick) {
        for index in 0..self.tasks.len() {
            let task = &self.tasks[index];
            let expired = task.state == TaskState::Blocked
                && task.wake_at.is_some_and(|wake_at| wake_at <= now);
            if expired {
                self.make_ready(index);
                debug!("{} block timed out at {}", self.tasks[index].id, now);
            }
        }
    }

    /// Report jobs still pending at or past their absolute deadline, once
    /// per job. Overdue jobs keep their place until the next release.
    fn report_overdue<P: Port>(&mut self, now: Tick, port: &mut P) {
        for index in 0..self.tasks.len() {
            let task = &self.tasks[index];
            if task.has_pending_job() && !task.miss_reported && task.absolute_deadline <= now {
                self.record_miss(index, now, port);
            }
        }
    }

    fn release_due<P: Port>(&mut self, now: Tick, port: &mut P) -> Result<(), SchedulerError> {
        for index in 0..self.tasks.len() {
            let task = &self.tasks[index];
            if !task.next_release().is_some_and(|due| due <= now) {
                continue;
            }
            let id = task.id;
            if task.has_pending_job() {
                if !task.miss_reported {
                    self.record_miss(index, now, port);
                }
                self.ready.remove(id);
                if self.running == Some(id) {
                    self.switch_out(id, now)?;
                }
            }

            let task = &mut self.tasks[index];
            task.release(now);
            self.ready.insert_entry(task.ready_entry());
            debug!("released {} deadline={}", id, task.absolute_deadline);
        }
        Ok(())
    }

    /// Run the earliest-deadline ready task, preempting the current one.
    /// `vacated` means the CPU owner was switched out by the caller, so the
    /// idle task must be switched in even though `running` is already `None`.
    fn dispatch<P: Port>(
        &mut self,
        now: Tick,
        port: &mut P,
        vacated: bool,
    ) -> Result<(), SchedulerError> {
        let next = self.ready.peek_min();
        if next == self.running && !vacated {
            return Ok(());
        }

        // A preempted task stays in the ready structure under its deadline.
        if let Some(current) = self.running {
            self.tasks[current.index()].state = TaskState::Ready;
            self.switch_out(current, now)?;
        }
        match next {
            Some(id) => {
                let entered = self.accounting.on_enter(id, now);
                self.escalate(entered)?;
                self.tasks[id.index()].state = TaskState::Running;
                debug!("tick {}: switch to {}", now, id);
            }
            None => {
                self.accounting.on_idle(now);
                debug!("tick {}: idle", now);
            }
        }
        self.running = next;
        self.stats.context_switches += 1;

        port.switch_to(next.map(|id| &self.tasks[id.index()]));
        Ok(())
    }

    fn switch_out(&mut self, task: TaskId, now: Tick) -> Result<(), SchedulerError> {
        let exited = self.accounting.on_exit(task, now);
        self.escalate(exited)?;
        if self.running == Some(task) {
            self.running = None;
        }
        Ok(())
    }

    fn make_ready(&mut self, index: usize) {
        let task = &mut self.tasks[index];
        task.state = TaskState::Ready;
        task.wake_at = None;
        self.ready.insert_entry(task.ready_entry());
    }

    fn record_miss<P: Port>(&mut self, index: usize, now: Tick, port: &mut P) {
        let task = &mut self.tasks[index];
        let miss = DeadlineMiss {
            task: task.id,
            release_time: task.release_time,
            absolute_deadline: task.absolute_deadline,
            detected_at: now,
        };
        task.miss_reported = true;
        task.deadline_misses += 1;
        task.last_miss = Some(miss);
        self.stats.deadline_misses += 1;

        warn!("{} '{}': {}", task.id, task.name, miss);
        port.on_deadline_miss(&miss);
    }

    /// Latch an accounting fault; nothing is scheduled afterwards.
    fn escalate(&mut self, result: Result<(), AccountingError>) -> Result<(), SchedulerError> {
        result.map_err(|err| {
            error!("accounting fault, halting scheduler: {}", err);
            self.halted = Some(err);
            SchedulerError::Halted(err)
        })
    }

    fn check_halted(&self) -> Result<(), SchedulerError> {
        match self.halted {
            Some(err) => Err(SchedulerError::Halted(err)),
            None => Ok(()),
        }
    }

    /// Common checks of the kernel calls. A stale or future `now` is the
    /// caller's mistake and must not reach the accounting.
    fn prepare_call(&mut self, task: TaskId, now: Tick) -> Result<usize, SchedulerError> {
        self.check_halted()?;
        let last = self.last_tick.ok_or(SchedulerError::NotStarted)?;
        let earliest = self.call_floor.max(last);
        let latest = last.saturating_add(1);
        if now < earliest || now > latest {
            return Err(SchedulerError::InvalidTick {
                now,
                earliest,
                latest,
            });
        }
        if task.index() >= self.tasks.len() {
            return Err(SchedulerError::UnknownTask(task));
        }
        self.call_floor = now;
        Ok(task.index())
    }

    fn expect_state(&self, index: usize, allowed: &[TaskState]) -> Result<(), SchedulerError> {
        let task = &self.tasks[index];
        if allowed.contains(&task.state) {
            Ok(())
        } else {
            Err(SchedulerError::InvalidState {
                task: task.id,
                state: task.state,
            })
        }
    }

    /// Percentage of the trailing `window` ticks spent in task code.
    pub fn cpu_load(&self, window: u32) -> u8 {
        self.accounting.cpu_load(window)
    }

    /// CPU load over the configured default window.
    pub fn current_load(&self) -> u8 {
        self.accounting.cpu_load(self.config.load_window)
    }

    /// Misses recorded for `task`; zero for ids that were never admitted.
    pub fn deadline_miss_count(&self, task: TaskId) -> u32 {
        self.task(task).map_or(0, |task| task.deadline_misses)
    }

    pub fn total_deadline_misses(&self) -> u32 {
        self.stats.deadline_misses
    }

    pub fn task(&self, task: TaskId) -> Option<&TaskDescriptor> {
        self.tasks.get(task.index())
    }

    pub fn tasks(&self) -> &[TaskDescriptor] {
        &self.tasks
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn running(&self) -> Option<TaskId> {
        self.running
    }

    pub fn now(&self) -> Option<Tick> {
        self.last_tick
    }

    pub fn is_started(&self) -> bool {
        self.last_tick.is_some()
    }

    pub fn halted(&self) -> Option<AccountingError> {
        self.halted
    }

    pub fn ready(&self) -> &DeadlineIndex<MAX_TASKS> {
        &self.ready
    }

    pub fn accounting(&self) -> &Accounting<MAX_TASKS> {
        &self.accounting
    }

    pub fn stats(&self) -> SchedulerStats {
        self.stats
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(SchedulerConfig::new())
    }
}
