//! Deferred values on top of the tempo event loop.
//!
//! A [`Runtime`] owns a [`tempo_scheduler::LocalScheduler`], a store of
//! futures and a trace sink. Reactions attached to futures run as
//! microtasks; timers run as macrotasks once the microtask queue is empty.

pub mod diagnostics;
pub mod error;
pub mod future;
pub mod runtime;
pub mod trace;
pub mod value;

pub use diagnostics::Diagnostic;
pub use error::RuntimeError;
pub use future::{FutureId, FutureState, Handler, HandlerResult, Resolution, Settlement, handler};
pub use runtime::{Resolver, Runtime};
pub use trace::{MemorySink, TraceEvent, TraceSink};
pub use value::{Container, Value};

pub use tempo_scheduler::{RunStats, SchedulerConfig, SchedulerError, Step, Ticks, TimerId};
