use crate::runtime::Runtime;
use crate::value::Value;
use serde::Serialize;
use slotmap::{SlotMap, new_key_type};
use smallvec::SmallVec;
use std::fmt;

new_key_type! {
    pub struct FutureId;
}

/// Observable state of a future.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum FutureState {
    #[default]
    Pending,
    Fulfilled(Value),
    Rejected(Value),
}

impl FutureState {
    pub fn is_pending(&self) -> bool {
        matches!(self, FutureState::Pending)
    }

    pub fn is_settled(&self) -> bool {
        !self.is_pending()
    }

    pub fn is_fulfilled(&self) -> bool {
        matches!(self, FutureState::Fulfilled(_))
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, FutureState::Rejected(_))
    }

    /// The fulfillment value or rejection reason, once settled.
    pub fn value(&self) -> Option<&Value> {
        match self {
            FutureState::Pending => None,
            FutureState::Fulfilled(v) | FutureState::Rejected(v) => Some(v),
        }
    }
}

impl fmt::Display for FutureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FutureState::Pending => f.write_str("{<pending>}"),
            FutureState::Fulfilled(v) => write!(f, "{{<fulfilled>: {v}}}"),
            FutureState::Rejected(e) => write!(f, "{{<rejected>: {e}}}"),
        }
    }
}

/// A terminal outcome, delivered to reactions.
#[derive(Debug, Clone, PartialEq)]
pub enum Settlement {
    Fulfilled(Value),
    Rejected(Value),
}

impl From<Settlement> for FutureState {
    fn from(settlement: Settlement) -> Self {
        match settlement {
            Settlement::Fulfilled(v) => FutureState::Fulfilled(v),
            Settlement::Rejected(v) => FutureState::Rejected(v),
        }
    }
}

/// What a handler (or an explicit `resolve`) hands back.
///
/// Only `Future` is chained through; any `Value` is taken as-is.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Value(Value),
    Future(FutureId),
}

impl From<Value> for Resolution {
    fn from(value: Value) -> Self {
        Resolution::Value(value)
    }
}

impl From<FutureId> for Resolution {
    fn from(id: FutureId) -> Self {
        Resolution::Future(id)
    }
}

/// `Err` is a raised error: the derived future rejects with it.
pub type HandlerResult = Result<Resolution, Value>;

pub type Handler = Box<dyn FnOnce(&Runtime, Value) -> HandlerResult>;

/// Box a closure as a `Handler`.
pub fn handler<F>(f: F) -> Handler
where
    F: FnOnce(&Runtime, Value) -> HandlerResult + 'static,
{
    Box::new(f)
}

pub(crate) struct Reaction {
    pub(crate) on_fulfilled: Option<Handler>,
    pub(crate) on_rejected: Option<Handler>,
    pub(crate) derived: FutureId,
}

impl Reaction {
    /// A reaction without handlers: the derived future mirrors the source.
    pub(crate) fn forward(derived: FutureId) -> Self {
        Self {
            on_fulfilled: None,
            on_rejected: None,
            derived,
        }
    }
}

pub(crate) struct FutureRecord {
    pub(crate) state: FutureState,
    pub(crate) reactions: SmallVec<[Reaction; 2]>,
    /// Some reaction has been attached at least once.
    pub(crate) handled: bool,
    /// Resolved with another future and waiting on it. Further external
    /// settlement attempts are ignored.
    pub(crate) locked: bool,
}

impl FutureRecord {
    fn pending() -> Self {
        Self {
            state: FutureState::Pending,
            reactions: SmallVec::new(),
            handled: false,
            locked: false,
        }
    }
}

#[derive(Default)]
pub(crate) struct FutureStore {
    futures: SlotMap<FutureId, FutureRecord>,
}

impl FutureStore {
    pub(crate) fn new() -> Self {
        Self {
            futures: SlotMap::with_key(),
        }
    }

    pub(crate) fn insert_pending(&mut self) -> FutureId {
        self.futures.insert(FutureRecord::pending())
    }

    /// No reactions can exist yet, so nothing is triggered.
    pub(crate) fn insert_settled(&mut self, state: FutureState) -> FutureId {
        self.futures.insert(FutureRecord {
            state,
            ..FutureRecord::pending()
        })
    }

    pub(crate) fn get(&self, id: FutureId) -> Option<&FutureRecord> {
        self.futures.get(id)
    }

    pub(crate) fn get_mut(&mut self, id: FutureId) -> Option<&mut FutureRecord> {
        self.futures.get_mut(id)
    }

    pub(crate) fn contains(&self, id: FutureId) -> bool {
        self.futures.contains_key(id)
    }

    pub(crate) fn len(&self) -> usize {
        self.futures.len()
    }

    pub(crate) fn count_pending(&self) -> usize {
        self.futures
            .values()
            .filter(|record| record.state.is_pending())
            .count()
    }
}
