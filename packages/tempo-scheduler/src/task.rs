use std::fmt;

/// Logical time unit. There is no wall clock behind it.
pub type Ticks = u64;

/// A unit of deferred work. It receives the loop's context when it runs.
pub type Task<C> = Box<dyn FnOnce(&C)>;

/// Handle returned by `schedule_timer`.
///
/// The inner value is the registration sequence number, which is also the
/// tie-breaker between timers sharing a deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(pub(crate) u64);

impl TimerId {
    pub fn sequence(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer#{}", self.0)
    }
}

/// What a single `step()` executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Microtask,
    Timer { id: TimerId, at: Ticks },
    Idle,
}

impl Step {
    pub fn is_idle(&self) -> bool {
        matches!(self, Step::Idle)
    }
}
