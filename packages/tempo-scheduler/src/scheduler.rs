use crate::Scheduler;
use crate::config::SchedulerConfig;
use crate::error::SchedulerError;
use crate::queue::MicrotaskQueue;
use crate::task::{Step, Task, Ticks, TimerId};
use crate::timer::TimerQueue;
use std::cell::Cell;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Draining,
}

/// Counters for one `run`/`advance` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunStats {
    pub microtasks: usize,
    pub timers: usize,
}

impl RunStats {
    pub fn is_empty(&self) -> bool {
        self.microtasks == 0 && self.timers == 0
    }
}

/// Single-threaded event loop with a microtask FIFO and a timer heap.
///
/// Every method takes `&self`; tasks receive the context `C` and can
/// schedule more work through it while the loop is draining.
pub struct LocalScheduler<C> {
    config: SchedulerConfig,
    microtasks: MicrotaskQueue<C>,
    timers: TimerQueue<C>,
    now: Cell<Ticks>,
    phase: Cell<Phase>,
}

impl<C> Default for LocalScheduler<C> {
    fn default() -> Self {
        Self::new()
    }
}

// Resets the phase even if a task panics.
struct DrainGuard<'a> {
    phase: &'a Cell<Phase>,
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.phase.set(Phase::Idle);
    }
}

impl<C> LocalScheduler<C> {
    pub fn new() -> Self {
        Self::with_config(SchedulerConfig::default())
    }

    pub fn with_config(config: SchedulerConfig) -> Self {
        Self {
            config,
            microtasks: MicrotaskQueue::new(),
            timers: TimerQueue::new(),
            now: Cell::new(0),
            phase: Cell::new(Phase::Idle),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn phase(&self) -> Phase {
        self.phase.get()
    }

    pub fn pending_microtasks(&self) -> usize {
        self.microtasks.len()
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    pub fn has_pending_work(&self) -> bool {
        !self.microtasks.is_empty() || !self.timers.is_empty()
    }

    /// No queued work of either kind.
    pub fn is_idle(&self) -> bool {
        !self.has_pending_work()
    }

    /// Deadline of the next timer that would fire.
    pub fn next_deadline(&self) -> Option<Ticks> {
        self.timers.peek_deadline()
    }

    fn enter(&self) -> Result<DrainGuard<'_>, SchedulerError> {
        if self.phase.get() == Phase::Draining {
            return Err(SchedulerError::Reentrant);
        }
        self.phase.set(Phase::Draining);
        Ok(DrainGuard { phase: &self.phase })
    }

    /// Drain the microtask queue to empty, including microtasks enqueued
    /// while draining.
    fn drain_microtasks(&self, ctx: &C, stats: &mut RunStats) -> Result<(), SchedulerError> {
        let mut executed = 0usize;
        while let Some(task) = self.microtasks.pop() {
            if let Some(budget) = self.config.microtask_budget {
                if executed >= budget {
                    // Put it back so the queue still reflects unfinished work.
                    self.microtasks.push_front(task);
                    tracing::warn!("Microtask budget of {} exhausted", budget);
                    return Err(SchedulerError::MicrotaskBudgetExhausted { budget });
                }
            }
            tracing::trace!("Running microtask at tick {}", self.now.get());
            task(ctx);
            executed += 1;
            stats.microtasks += 1;
        }
        Ok(())
    }

    fn fire_next_timer(&self, ctx: &C, limit: Option<Ticks>) -> Option<TimerId> {
        if let Some(limit) = limit {
            match self.timers.peek_deadline() {
                Some(deadline) if deadline <= limit => {}
                _ => return None,
            }
        }

        let (id, deadline, task) = self.timers.pop()?;
        // Deadlines are never in the past, time only moves forward.
        self.now.set(deadline.max(self.now.get()));
        tracing::trace!("Firing {} at tick {}", id, self.now.get());
        task(ctx);
        Some(id)
    }

    /// Drive the loop until both queues are empty.
    pub fn run(&self, ctx: &C) -> Result<RunStats, SchedulerError> {
        let _guard = self.enter()?;
        let mut stats = RunStats::default();

        loop {
            self.drain_microtasks(ctx, &mut stats)?;
            if self.fire_next_timer(ctx, None).is_none() {
                break;
            }
            stats.timers += 1;
        }

        tracing::debug!(
            "Event loop idle at tick {} ({} microtasks, {} timers)",
            self.now.get(),
            stats.microtasks,
            stats.timers
        );
        Ok(stats)
    }

    /// Execute exactly one queued item: the oldest microtask if there is
    /// one, otherwise the next timer.
    pub fn step(&self, ctx: &C) -> Result<Step, SchedulerError> {
        let _guard = self.enter()?;

        if let Some(task) = self.microtasks.pop() {
            task(ctx);
            return Ok(Step::Microtask);
        }

        match self.fire_next_timer(ctx, None) {
            Some(id) => Ok(Step::Timer {
                id,
                at: self.now.get(),
            }),
            None => Ok(Step::Idle),
        }
    }

    /// Drain microtasks, fire at most one timer, then drain again.
    /// Returns the timer that fired, if any.
    pub fn advance(&self, ctx: &C) -> Result<Option<TimerId>, SchedulerError> {
        let _guard = self.enter()?;
        let mut stats = RunStats::default();

        self.drain_microtasks(ctx, &mut stats)?;
        let fired = self.fire_next_timer(ctx, None);
        self.drain_microtasks(ctx, &mut stats)?;
        Ok(fired)
    }

    /// Run everything due at or before `tick`, then move the clock to `tick`.
    pub fn advance_to(&self, ctx: &C, tick: Ticks) -> Result<RunStats, SchedulerError> {
        let _guard = self.enter()?;
        let mut stats = RunStats::default();

        loop {
            self.drain_microtasks(ctx, &mut stats)?;
            if self.fire_next_timer(ctx, Some(tick)).is_none() {
                break;
            }
            stats.timers += 1;
        }

        if tick > self.now.get() {
            self.now.set(tick);
        }
        Ok(stats)
    }
}

impl<C> Scheduler<C> for LocalScheduler<C> {
    fn schedule_microtask(&self, task: Task<C>) {
        self.microtasks.push(task);
    }

    fn schedule_timer(&self, delay: Ticks, task: Task<C>) -> Result<TimerId, SchedulerError> {
        let max = self.config.max_timer_delay;
        if delay > max {
            return Err(SchedulerError::DelayOutOfRange { delay, max });
        }

        let now = self.now.get();
        let deadline = now
            .checked_add(delay)
            .ok_or(SchedulerError::DeadlineOverflow { now, delay })?;

        let id = self.timers.insert(deadline, task);
        tracing::debug!("Scheduled {} for tick {}", id, deadline);
        Ok(id)
    }

    fn cancel_timer(&self, id: TimerId) -> bool {
        let cancelled = self.timers.cancel(id);
        if !cancelled {
            tracing::warn!("Cancel ignored for {}: already fired or unknown", id);
        }
        cancelled
    }

    fn now(&self) -> Ticks {
        self.now.get()
    }
}
