use crate::future::FutureId;
use crate::value::Value;
use rustc_hash::FxHashSet;
use serde::Serialize;
use std::fmt;

/// Problems surfaced to the host instead of being raised into the loop.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// A future rejected and nothing ever attached a reaction to it.
    UncaughtRejection { future: FutureId, reason: Value },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::UncaughtRejection { reason, .. } => {
                write!(f, "Uncaught (in future) {reason}")
            }
        }
    }
}

/// Rejected futures that have no reaction yet, in rejection order.
#[derive(Debug, Default)]
pub(crate) struct RejectionTracker {
    unhandled: Vec<FutureId>,
    // Already logged by a previous run; reported again but not re-logged.
    warned: FxHashSet<FutureId>,
}

impl RejectionTracker {
    pub(crate) fn reject_unhandled(&mut self, id: FutureId) {
        self.unhandled.push(id);
    }

    /// A reaction was attached to a rejected future.
    pub(crate) fn handle(&mut self, id: FutureId) {
        self.unhandled.retain(|&pending| pending != id);
        self.warned.remove(&id);
    }

    pub(crate) fn unhandled(&self) -> &[FutureId] {
        &self.unhandled
    }

    /// Ids not yet warned about, marking them as warned.
    pub(crate) fn take_unwarned(&mut self) -> Vec<FutureId> {
        let fresh: Vec<_> = self
            .unhandled
            .iter()
            .copied()
            .filter(|id| !self.warned.contains(id))
            .collect();
        self.warned.extend(fresh.iter().copied());
        fresh
    }
}
