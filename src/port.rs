//! Hooks into the host execution environment.

use crate::error::DeadlineMiss;
use crate::task::TaskDescriptor;
use crate::Tick;

/// What the scheduler needs from the board support code.
pub trait Port {
    /// Give the CPU to `next`, or to the idle task when `None`.
    fn switch_to(&mut self, next: Option<&TaskDescriptor>);

    /// Called once for every processed tick, after the dispatch decision.
    fn on_tick(&mut self, _now: Tick) {}

    fn on_deadline_miss(&mut self, _miss: &DeadlineMiss) {}
}

/// A port that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopPort;

impl Port for NoopPort {
    fn switch_to(&mut self, _next: Option<&TaskDescriptor>) {}
}
