//! Deterministic workload model for running the scheduler without hardware.
//!
//! Every job of a task costs a fixed number of ticks. Each tick the running
//! task consumes one tick of its job; when the job is done the simulation
//! calls [`Scheduler::complete_job`] at the end of that tick, the way a
//! task body would call its delay-until primitive.

use crate::config::MAX_TASKS;
use crate::error::SchedulerError;
use crate::port::Port;
use crate::scheduler::Scheduler;
use crate::task::{TaskDescriptor, TaskId};
use crate::Tick;

/// Runs the body of a job the first time the job gets the CPU.
pub trait JobRunner {
    fn run_job(&mut self, task: &TaskDescriptor, now: Tick);
}

/// Calls each task's admitted entry point.
#[derive(Debug, Default, Clone, Copy)]
pub struct EntryPoints;

impl JobRunner for EntryPoints {
    fn run_job(&mut self, task: &TaskDescriptor, _now: Tick) {
        (task.entry())()
    }
}

#[derive(Debug, Clone, Copy)]
struct Job {
    cost: u32,
    remaining: u32,
    release: Option<Tick>,
    started: bool,
}

pub struct Simulation {
    jobs: [Job; MAX_TASKS],
    executed: [u64; MAX_TASKS],
    idle_ticks: u64,
    next_tick: Tick,
}

impl Simulation {
    pub const fn new() -> Self {
        const JOB: Job = Job {
            cost: 1,
            remaining: 0,
            release: None,
            started: false,
        };
        Self {
            jobs: [JOB; MAX_TASKS],
            executed: [0; MAX_TASKS],
            idle_ticks: 0,
            next_tick: 0,
        }
    }

    /// Execution time of every job of `task`; at least one tick.
    pub fn set_cost(&mut self, task: TaskId, cost: u32) {
        if let Some(job) = self.jobs.get_mut(task.index()) {
            job.cost = cost.max(1);
        }
    }

    pub fn with_costs(costs: &[(TaskId, u32)]) -> Self {
        let mut sim = Self::new();
        for &(task, cost) in costs {
            sim.set_cost(task, cost);
        }
        sim
    }

    /// Advance one tick: start the scheduler on the first call, deliver the
    /// timer interrupt, then execute the running task for one tick.
    pub fn step<P: Port, R: JobRunner>(
        &mut self,
        sched: &mut Scheduler,
        port: &mut P,
        runner: &mut R,
    ) -> Result<(), SchedulerError> {
        let now = self.next_tick;
        self.next_tick += 1;
        if sched.is_started() {
            sched.on_tick(now, port)?;
        } else {
            sched.start(now, port)?;
        }
        self.sync_releases(sched);

        let Some(id) = sched.running() else {
            self.idle_ticks += 1;
            return Ok(());
        };
        let job = &mut self.jobs[id.index()];
        if !job.started {
            job.started = true;
            if let Some(task) = sched.task(id) {
                runner.run_job(task, now);
            }
        }
        job.remaining = job.remaining.saturating_sub(1);
        self.executed[id.index()] += 1;
        if job.remaining == 0 {
            sched.complete_job(id, now.saturating_add(1), port)?;
        }
        Ok(())
    }

    pub fn run<P: Port, R: JobRunner>(
        &mut self,
        sched: &mut Scheduler,
        ticks: u64,
        port: &mut P,
        runner: &mut R,
    ) -> Result<(), SchedulerError> {
        for _ in 0..ticks {
            self.step(sched, port, runner)?;
        }
        Ok(())
    }

    /// Reload the work of every task released since the last look.
    fn sync_releases(&mut self, sched: &Scheduler) {
        for task in sched.tasks() {
            let job = &mut self.jobs[task.id().index()];
            if task.has_pending_job() && job.release != Some(task.release_time()) {
                job.release = Some(task.release_time());
                job.remaining = job.cost;
                job.started = false;
            }
        }
    }

    /// Ticks of execution the simulation has given `task`.
    pub fn executed(&self, task: TaskId) -> u64 {
        self.executed.get(task.index()).copied().unwrap_or(0)
    }

    pub fn idle_ticks(&self) -> u64 {
        self.idle_ticks
    }

    /// The tick the next `step` will deliver.
    pub fn now(&self) -> Tick {
        self.next_tick
    }
}

impl Default for Simulation {
    fn default() -> Self {
        Self::new()
    }
}
