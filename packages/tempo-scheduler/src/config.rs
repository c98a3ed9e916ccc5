use crate::task::Ticks;

/// Largest delay a timer accepts: the conventional 2^31 - 1 timer ceiling.
pub const MAX_TIMER_DELAY: Ticks = i32::MAX as Ticks;

/// A reasonable cap for hosts that opt into `with_microtask_budget`.
pub const DEFAULT_MICROTASK_BUDGET: usize = 1_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub max_timer_delay: Ticks,
    /// `None` (the default) drains every microtask before returning. A
    /// microtask that keeps re-enqueuing itself then never returns control
    /// to the host; set a budget to turn that into an error.
    pub microtask_budget: Option<usize>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_timer_delay: MAX_TIMER_DELAY,
            microtask_budget: None,
        }
    }
}

impl SchedulerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_timer_delay(mut self, max: Ticks) -> Self {
        self.max_timer_delay = max;
        self
    }

    pub fn with_microtask_budget(mut self, budget: Option<usize>) -> Self {
        self.microtask_budget = budget;
        self
    }
}
