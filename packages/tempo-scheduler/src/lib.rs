pub mod config;
pub mod error;
pub mod queue;
pub mod scheduler;
pub mod task;
pub mod timer;

pub use config::{DEFAULT_MICROTASK_BUDGET, MAX_TIMER_DELAY, SchedulerConfig};
pub use error::SchedulerError;
pub use scheduler::{LocalScheduler, Phase, RunStats};
pub use task::{Step, Task, Ticks, TimerId};

/// The scheduling surface shared by every event loop implementation.
///
/// `C` is the context handed to each task when it runs. Tasks never capture
/// the loop itself; they receive it (or whatever owns it) through `C`, so a
/// task can schedule more work without creating reference cycles.
pub trait Scheduler<C> {
    /// Schedule a microtask (highest priority, runs before any timer).
    /// Used for future reactions and adoption jobs.
    fn schedule_microtask(&self, task: Task<C>);

    /// Schedule a timer that fires `delay` logical ticks from now.
    /// Timers with the same deadline fire in registration order.
    fn schedule_timer(&self, delay: Ticks, task: Task<C>) -> Result<TimerId, SchedulerError>;

    /// Cancel a pending timer. Returns `false` if it already fired, was
    /// already cancelled, or never existed.
    fn cancel_timer(&self, id: TimerId) -> bool;

    /// Current logical time in ticks (monotonic).
    fn now(&self) -> Ticks;
}
