//! Execution-time accounting.
//!
//! The dispatcher reports every `Ready -> Running` transition through
//! [`Accounting::on_enter`] and every transition out of `Running` through
//! [`Accounting::on_exit`]. Besides the per-task records, a ring of
//! cumulative busy-time checkpoints (one per tick) backs the trailing-window
//! CPU load.

use crate::config::LOAD_HISTORY;
use crate::error::AccountingError;
use crate::task::TaskId;
use crate::Tick;

/// Per-task entry/exit timestamps and accumulated execution time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutionRecord {
    pub in_time: Tick,
    pub out_time: Tick,
    /// Ticks spent running since boot.
    pub total_time: u64,
    /// Length of the most recent completed run.
    pub last_execution: u64,
    /// Number of completed runs (enter/exit pairs).
    pub runs: u32,
    pub running: bool,
}

impl ExecutionRecord {
    pub const fn new() -> Self {
        Self {
            in_time: 0,
            out_time: 0,
            total_time: 0,
            last_execution: 0,
            runs: 0,
            running: false,
        }
    }
}

pub struct Accounting<const N: usize> {
    records: [ExecutionRecord; N],
    /// Sum of `total_time` over all records.
    busy_total: u64,
    idle_since: Option<Tick>,
    idle_time: u64,
    /// `history[t % LOAD_HISTORY]` holds the busy time accumulated before tick `t`.
    history: [u64; LOAD_HISTORY],
    first_tick: Option<Tick>,
    last_tick: Option<Tick>,
}

impl<const N: usize> Accounting<N> {
    pub const fn new() -> Self {
        Self {
            records: [ExecutionRecord::new(); N],
            busy_total: 0,
            idle_since: None,
            idle_time: 0,
            history: [0; LOAD_HISTORY],
            first_tick: None,
            last_tick: None,
        }
    }

    pub fn on_enter(&mut self, task: TaskId, tick: Tick) -> Result<(), AccountingError> {
        let record = self
            .records
            .get(task.index())
            .ok_or(AccountingError::UnknownTask(task))?;
        if record.running {
            return Err(AccountingError::DoubleEnter { task, at: tick });
        }
        self.checkpoint(tick);
        if let Some(since) = self.idle_since.take() {
            self.idle_time += tick.saturating_sub(since);
        }

        let record = &mut self.records[task.index()];
        record.in_time = tick;
        record.running = true;
        Ok(())
    }

    pub fn on_exit(&mut self, task: TaskId, tick: Tick) -> Result<(), AccountingError> {
        let record = self
            .records
            .get(task.index())
            .ok_or(AccountingError::UnknownTask(task))?;
        if !record.running {
            return Err(AccountingError::ExitWithoutEnter { task, at: tick });
        }
        if tick < record.in_time {
            return Err(AccountingError::ClockWentBackwards {
                task,
                entered: record.in_time,
                exited: tick,
            });
        }
        // Checkpoints up to `tick` must still see this run as in progress.
        self.checkpoint(tick);

        let record = &mut self.records[task.index()];
        let elapsed = tick - record.in_time;
        record.out_time = tick;
        record.total_time += elapsed;
        record.last_execution = elapsed;
        record.runs += 1;
        record.running = false;
        self.busy_total += elapsed;
        Ok(())
    }

    /// The idle task took the CPU at `tick`.
    pub fn on_idle(&mut self, tick: Tick) {
        if self.idle_since.is_none() {
            self.idle_since = Some(tick);
        }
    }

    /// Record busy-time checkpoints for every tick up to and including `now`.
    /// Ticks skipped since the previous call are filled in, at most one
    /// history's worth.
    pub fn checkpoint(&mut self, now: Tick) {
        let from = match self.last_tick {
            Some(last) if now <= last => return,
            Some(last) => last.saturating_add(1).max(now.saturating_sub(LOAD_HISTORY as u64 - 1)),
            None => {
                self.first_tick = Some(now);
                now
            }
        };
        for tick in from..=now {
            self.history[(tick % LOAD_HISTORY as u64) as usize] = self.busy_at(tick);
        }
        self.last_tick = Some(now);
    }

    /// Busy time accumulated up to `tick`, counting runs still in progress.
    fn busy_at(&self, tick: Tick) -> u64 {
        self.records
            .iter()
            .filter(|record| record.running)
            .fold(self.busy_total, |busy, record| {
                busy + tick.saturating_sub(record.in_time)
            })
    }

    /// Percentage of the trailing `window` ticks spent outside the idle task.
    /// The window is clamped to the checkpoint history and to the time since
    /// the first checkpoint; an empty window reports 0.
    pub fn cpu_load(&self, window: u32) -> u8 {
        let (Some(first), Some(now)) = (self.first_tick, self.last_tick) else {
            return 0;
        };
        let window = u64::from(window)
            .min(LOAD_HISTORY as u64 - 1)
            .min(now - first);
        if window == 0 {
            return 0;
        }
        let busy_now = self.history[(now % LOAD_HISTORY as u64) as usize];
        let busy_then = self.history[((now - window) % LOAD_HISTORY as u64) as usize];
        percent(busy_now.saturating_sub(busy_then), window)
    }

    /// Load over the whole run: total busy time divided by elapsed ticks.
    pub fn cpu_load_since_boot(&self) -> u8 {
        let (Some(first), Some(now)) = (self.first_tick, self.last_tick) else {
            return 0;
        };
        percent(self.busy_at(now), now - first)
    }

    pub fn record(&self, task: TaskId) -> Option<&ExecutionRecord> {
        self.records.get(task.index())
    }

    pub fn records(&self) -> &[ExecutionRecord] {
        &self.records
    }

    pub fn busy_time(&self) -> u64 {
        self.busy_total
    }

    /// Completed idle periods; the one in progress is not included.
    pub fn idle_time(&self) -> u64 {
        self.idle_time
    }
}

impl<const N: usize> Default for Accounting<N> {
    fn default() -> Self {
        Self::new()
    }
}

fn percent(busy: u64, ticks: u64) -> u8 {
    if ticks == 0 {
        return 0;
    }
    (busy.saturating_mul(100) / ticks).min(100) as u8
}
