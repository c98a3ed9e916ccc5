use crate::task::Ticks;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("timer delay of {delay} ticks exceeds the maximum of {max}")]
    DelayOutOfRange { delay: Ticks, max: Ticks },

    #[error("timer deadline overflows the logical clock (now {now}, delay {delay})")]
    DeadlineOverflow { now: Ticks, delay: Ticks },

    #[error("event loop is already draining; run/step/advance cannot be nested")]
    Reentrant,

    #[error("microtask budget of {budget} exhausted in a single drain")]
    MicrotaskBudgetExhausted { budget: usize },
}
