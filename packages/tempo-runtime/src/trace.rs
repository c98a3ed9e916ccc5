use serde::Serialize;
use std::cell::RefCell;
use tempo_scheduler::Ticks;

/// One effect emitted by host code, stamped with the logical tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraceEvent {
    pub tick: Ticks,
    pub message: String,
}

/// Append-only destination for emitted events, inspected by the host after
/// a run.
pub trait TraceSink {
    fn record(&self, event: TraceEvent);

    fn events(&self) -> Vec<TraceEvent>;
}

#[derive(Debug, Default)]
pub struct MemorySink {
    events: RefCell<Vec<TraceEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.events.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.borrow().is_empty()
    }
}

impl TraceSink for MemorySink {
    fn record(&self, event: TraceEvent) {
        tracing::trace!("trace[{}]: {}", event.tick, event.message);
        self.events.borrow_mut().push(event);
    }

    fn events(&self) -> Vec<TraceEvent> {
        self.events.borrow().clone()
    }
}
