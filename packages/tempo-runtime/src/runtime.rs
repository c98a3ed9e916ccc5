use crate::diagnostics::{Diagnostic, RejectionTracker};
use crate::error::RuntimeError;
use crate::future::{
    FutureId, FutureState, FutureStore, Handler, HandlerResult, Reaction, Resolution, Settlement,
};
use crate::trace::{MemorySink, TraceEvent, TraceSink};
use crate::value::Value;
use std::cell::RefCell;
use std::rc::Rc;
use tempo_scheduler::{LocalScheduler, RunStats, Scheduler, SchedulerConfig, Step, Ticks, TimerId};

/// Owns the event loop, every future created through it, and the trace
/// sink. One instance per scenario; the host drives it with `run`.
///
/// Tasks and handlers receive `&Runtime`, so they can settle futures,
/// attach reactions or schedule timers while the loop is draining.
///
/// Future records are never removed: settled futures stay inspectable
/// through `state` for as long as the runtime lives, and memory grows with
/// every future created. Build a fresh runtime per program run rather than
/// keeping one alive indefinitely.
pub struct Runtime {
    scheduler: LocalScheduler<Runtime>,
    futures: RefCell<FutureStore>,
    rejections: RefCell<RejectionTracker>,
    sink: Rc<dyn TraceSink>,
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl Runtime {
    pub fn new() -> Self {
        Self::with_config(SchedulerConfig::default())
    }

    pub fn with_config(config: SchedulerConfig) -> Self {
        Self::with_sink(config, Rc::new(MemorySink::new()))
    }

    pub fn with_sink(config: SchedulerConfig, sink: Rc<dyn TraceSink>) -> Self {
        Self {
            scheduler: LocalScheduler::with_config(config),
            futures: RefCell::new(FutureStore::new()),
            rejections: RefCell::new(RejectionTracker::default()),
            sink,
        }
    }

    pub fn scheduler(&self) -> &LocalScheduler<Runtime> {
        &self.scheduler
    }

    pub fn now(&self) -> Ticks {
        self.scheduler.now()
    }

    // ---------------------------------------------------------------------
    // Trace
    // ---------------------------------------------------------------------

    /// Append a console-style message to the trace sink.
    pub fn emit(&self, message: impl Into<String>) {
        self.sink.record(TraceEvent {
            tick: self.now(),
            message: message.into(),
        });
    }

    pub fn trace(&self) -> Vec<TraceEvent> {
        self.sink.events()
    }

    pub fn messages(&self) -> Vec<String> {
        self.sink.events().into_iter().map(|e| e.message).collect()
    }

    // ---------------------------------------------------------------------
    // Futures
    // ---------------------------------------------------------------------

    pub fn create_pending(&self) -> FutureId {
        let id = self.futures.borrow_mut().insert_pending();
        tracing::trace!("Created pending {:?}", id);
        id
    }

    pub fn resolved(&self, value: impl Into<Value>) -> FutureId {
        self.futures
            .borrow_mut()
            .insert_settled(FutureState::Fulfilled(value.into()))
    }

    /// An already-rejected future. It counts as uncaught until something
    /// attaches to it.
    pub fn rejected(&self, reason: impl Into<Value>) -> FutureId {
        let id = self
            .futures
            .borrow_mut()
            .insert_settled(FutureState::Rejected(reason.into()));
        self.rejections.borrow_mut().reject_unhandled(id);
        id
    }

    /// Create a pending future and run `executor` synchronously with its
    /// resolver. An `Err` from the executor rejects the future unless it was
    /// already resolved.
    pub fn construct<F>(&self, executor: F) -> FutureId
    where
        F: FnOnce(&Runtime, Resolver) -> Result<(), Value>,
    {
        let id = self.create_pending();
        let resolver = Resolver { future: id };
        if let Err(reason) = executor(self, resolver) {
            resolver.reject(self, reason);
        }
        id
    }

    pub fn state(&self, id: FutureId) -> Result<FutureState, RuntimeError> {
        self.futures
            .borrow()
            .get(id)
            .map(|record| record.state.clone())
            .ok_or(RuntimeError::UnknownFuture(id))
    }

    /// Returns `false` when the future was already resolved.
    pub fn settle_fulfilled(
        &self,
        id: FutureId,
        value: impl Into<Value>,
    ) -> Result<bool, RuntimeError> {
        self.settle(id, Settlement::Fulfilled(value.into()), true)
    }

    /// Returns `false` when the future was already resolved.
    pub fn settle_rejected(
        &self,
        id: FutureId,
        reason: impl Into<Value>,
    ) -> Result<bool, RuntimeError> {
        self.settle(id, Settlement::Rejected(reason.into()), true)
    }

    /// Resolve with a plain value (fulfills) or with another future, which
    /// `id` then follows until it settles.
    pub fn resolve(
        &self,
        id: FutureId,
        resolution: impl Into<Resolution>,
    ) -> Result<bool, RuntimeError> {
        match resolution.into() {
            Resolution::Value(value) => self.settle(id, Settlement::Fulfilled(value), true),
            Resolution::Future(source) => self.adopt(id, source, true),
        }
    }

    /// Register handlers on `id` and return the derived future their
    /// outcome settles. Handlers never run synchronously, even when `id`
    /// has already settled.
    pub fn attach(
        &self,
        id: FutureId,
        on_fulfilled: Option<Handler>,
        on_rejected: Option<Handler>,
    ) -> Result<FutureId, RuntimeError> {
        if !self.futures.borrow().contains(id) {
            return Err(RuntimeError::UnknownFuture(id));
        }
        let derived = self.futures.borrow_mut().insert_pending();
        self.attach_reaction(
            id,
            Reaction {
                on_fulfilled,
                on_rejected,
                derived,
            },
        )?;
        tracing::debug!("Attached reaction to {:?}, derived {:?}", id, derived);
        Ok(derived)
    }

    pub fn then<F>(&self, id: FutureId, on_fulfilled: F) -> Result<FutureId, RuntimeError>
    where
        F: FnOnce(&Runtime, Value) -> HandlerResult + 'static,
    {
        self.attach(id, Some(Box::new(on_fulfilled)), None)
    }

    pub fn catch<F>(&self, id: FutureId, on_rejected: F) -> Result<FutureId, RuntimeError>
    where
        F: FnOnce(&Runtime, Value) -> HandlerResult + 'static,
    {
        self.attach(id, None, Some(Box::new(on_rejected)))
    }

    /// `external` settlements (host calls, resolvers) respect the lock taken
    /// by a pending adoption; internal ones (reaction outcomes) do not.
    fn settle(
        &self,
        id: FutureId,
        settlement: Settlement,
        external: bool,
    ) -> Result<bool, RuntimeError> {
        let (reactions, unhandled) = {
            let mut futures = self.futures.borrow_mut();
            let record = futures
                .get_mut(id)
                .ok_or(RuntimeError::UnknownFuture(id))?;

            if record.state.is_settled() || (external && record.locked) {
                tracing::debug!("Ignoring settlement of {:?}: already resolved", id);
                return Ok(false);
            }

            record.state = settlement.clone().into();
            record.locked = false;
            let unhandled = matches!(settlement, Settlement::Rejected(_)) && !record.handled;
            (std::mem::take(&mut record.reactions), unhandled)
        };

        tracing::debug!(
            "Settled {:?} as {:?}, triggering {} reactions",
            id,
            settlement,
            reactions.len()
        );

        if unhandled {
            self.rejections.borrow_mut().reject_unhandled(id);
        }
        for reaction in reactions {
            self.enqueue_reaction(reaction, settlement.clone());
        }
        Ok(true)
    }

    /// Make `id` follow `source`. The subscription itself happens in a
    /// microtask, so adoption costs one extra turn.
    fn adopt(&self, id: FutureId, source: FutureId, external: bool) -> Result<bool, RuntimeError> {
        {
            let mut futures = self.futures.borrow_mut();
            if !futures.contains(source) {
                return Err(RuntimeError::UnknownFuture(source));
            }
            let record = futures
                .get_mut(id)
                .ok_or(RuntimeError::UnknownFuture(id))?;
            if record.state.is_settled() || (external && record.locked) {
                return Ok(false);
            }
            if id != source {
                record.locked = true;
            }
        }

        if id == source {
            let cycle = Value::type_error("Chaining cycle detected for future");
            return self.settle(id, Settlement::Rejected(cycle), external);
        }

        tracing::debug!("{:?} adopting {:?}", id, source);
        self.scheduler.schedule_microtask(Box::new(move |rt: &Runtime| {
            if let Err(err) = rt.attach_reaction(source, Reaction::forward(id)) {
                tracing::warn!("Adoption of {:?} by {:?} failed: {}", source, id, err);
            }
        }));
        Ok(true)
    }

    fn attach_reaction(&self, source: FutureId, reaction: Reaction) -> Result<(), RuntimeError> {
        let (settlement, was_unhandled) = {
            let mut futures = self.futures.borrow_mut();
            let record = futures
                .get_mut(source)
                .ok_or(RuntimeError::UnknownFuture(source))?;
            let was_unhandled = !record.handled;
            record.handled = true;

            match &record.state {
                FutureState::Pending => {
                    record.reactions.push(reaction);
                    return Ok(());
                }
                FutureState::Fulfilled(v) => (Settlement::Fulfilled(v.clone()), false),
                FutureState::Rejected(e) => (Settlement::Rejected(e.clone()), was_unhandled),
            }
        };

        if was_unhandled {
            self.rejections.borrow_mut().handle(source);
        }
        self.enqueue_reaction(reaction, settlement);
        Ok(())
    }

    fn enqueue_reaction(&self, reaction: Reaction, settlement: Settlement) {
        self.scheduler
            .schedule_microtask(Box::new(move |rt: &Runtime| rt.run_reaction(reaction, settlement)));
    }

    fn run_reaction(&self, reaction: Reaction, settlement: Settlement) {
        let Reaction {
            on_fulfilled,
            on_rejected,
            derived,
        } = reaction;

        let (handler, payload) = match &settlement {
            Settlement::Fulfilled(value) => (on_fulfilled, value.clone()),
            Settlement::Rejected(reason) => (on_rejected, reason.clone()),
        };

        let outcome = match handler {
            // No matching handler: pass the settlement through unchanged.
            None => self.settle(derived, settlement, false),
            Some(handler) => match handler(self, payload) {
                Ok(Resolution::Value(value)) => {
                    self.settle(derived, Settlement::Fulfilled(value), false)
                }
                Ok(Resolution::Future(source)) => match self.adopt(derived, source, false) {
                    Err(err) => self.settle(derived, Settlement::Rejected(err.into()), false),
                    accepted => accepted,
                },
                Err(reason) => {
                    tracing::debug!("Handler raised {}; rejecting {:?}", reason, derived);
                    self.settle(derived, Settlement::Rejected(reason), false)
                }
            },
        };

        if let Err(err) = outcome {
            tracing::warn!("Reaction for {:?} could not settle: {}", derived, err);
        }
    }

    pub fn future_count(&self) -> usize {
        self.futures.borrow().len()
    }

    pub fn pending_futures(&self) -> usize {
        self.futures.borrow().count_pending()
    }

    // ---------------------------------------------------------------------
    // Timers and microtasks
    // ---------------------------------------------------------------------

    pub fn enqueue_microtask<F>(&self, callback: F)
    where
        F: FnOnce(&Runtime) + 'static,
    {
        self.scheduler.schedule_microtask(Box::new(callback));
    }

    pub fn schedule_timer<F>(&self, delay: Ticks, callback: F) -> Result<TimerId, RuntimeError>
    where
        F: FnOnce(&Runtime) + 'static,
    {
        Ok(self.scheduler.schedule_timer(delay, Box::new(callback))?)
    }

    pub fn cancel_timer(&self, id: TimerId) -> bool {
        self.scheduler.cancel_timer(id)
    }

    // ---------------------------------------------------------------------
    // Driving the loop
    // ---------------------------------------------------------------------

    /// Drain everything, then log rejections nobody handled.
    pub fn run(&self) -> Result<RunStats, RuntimeError> {
        let stats = self.scheduler.run(self)?;
        self.warn_uncaught();
        Ok(stats)
    }

    pub fn step(&self) -> Result<Step, RuntimeError> {
        Ok(self.scheduler.step(self)?)
    }

    pub fn advance(&self) -> Result<Option<TimerId>, RuntimeError> {
        Ok(self.scheduler.advance(self)?)
    }

    pub fn advance_to(&self, tick: Ticks) -> Result<RunStats, RuntimeError> {
        Ok(self.scheduler.advance_to(self, tick)?)
    }

    // ---------------------------------------------------------------------
    // Diagnostics
    // ---------------------------------------------------------------------

    /// Rejected futures with no reaction attached, in rejection order.
    pub fn uncaught_rejections(&self) -> Vec<Diagnostic> {
        let futures = self.futures.borrow();
        self.rejections
            .borrow()
            .unhandled()
            .iter()
            .filter_map(|&id| {
                let reason = futures.get(id)?.state.value()?.clone();
                Some(Diagnostic::UncaughtRejection { future: id, reason })
            })
            .collect()
    }

    fn warn_uncaught(&self) {
        let fresh = self.rejections.borrow_mut().take_unwarned();
        let futures = self.futures.borrow();
        for id in fresh {
            if let Some(reason) = futures.get(id).and_then(|r| r.state.value()) {
                tracing::warn!("Uncaught rejection in {:?}: {}", id, reason);
            }
        }
    }
}

/// The resolving functions handed to a `construct` executor.
///
/// Only the first call to either method counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolver {
    future: FutureId,
}

impl Resolver {
    pub fn future(&self) -> FutureId {
        self.future
    }

    pub fn resolve(&self, rt: &Runtime, resolution: impl Into<Resolution>) -> bool {
        rt.resolve(self.future, resolution).unwrap_or_else(|err| {
            tracing::warn!("Resolver for {:?} failed: {}", self.future, err);
            false
        })
    }

    pub fn reject(&self, rt: &Runtime, reason: impl Into<Value>) -> bool {
        rt.settle_rejected(self.future, reason)
            .unwrap_or_else(|err| {
                tracing::warn!("Resolver for {:?} failed: {}", self.future, err);
                false
            })
    }
}
