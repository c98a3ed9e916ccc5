use crate::future::FutureId;
use crate::value::Value;
use tempo_scheduler::SchedulerError;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("unknown future handle {0:?}")]
    UnknownFuture(FutureId),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}

// Lets executors and handlers use `?` on runtime calls: misuse inside a
// handler becomes a rejection of its derived future.
impl From<RuntimeError> for Value {
    fn from(err: RuntimeError) -> Self {
        Value::error(err.to_string())
    }
}
