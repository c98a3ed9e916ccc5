use rustc_hash::FxHashSet;
use serde::ser::{Error as _, SerializeSeq};
use serde::{Serialize, Serializer};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Payload carried by a settled future: a fulfillment value or a rejection
/// reason.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
    /// An error object, carrying its message.
    Error(String),
    /// A type error raised by the runtime itself, e.g. a chaining cycle.
    TypeError(String),
    List(Container),
}

impl Value {
    pub fn error(message: impl Into<String>) -> Self {
        Value::Error(message.into())
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Value::TypeError(message.into())
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&Container> {
        match self {
            Value::List(list) => Some(list),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("undefined"),
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{n}"),
            Value::Str(s) => f.write_str(s),
            Value::Error(message) => write!(f, "Error: {message}"),
            Value::TypeError(message) => write!(f, "TypeError: {message}"),
            Value::List(list) => write!(f, "{list}"),
        }
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Undefined
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n.into())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<Container> for Value {
    fn from(list: Container) -> Self {
        Value::List(list)
    }
}

/// Shared, growable list with reference semantics.
///
/// Cloning a `Container` clones the handle, so a future fulfilled with a
/// container observes pushes made after it settled. A container may hold
/// itself; formatting prints `[Circular]` for the repeated reference and
/// serialization fails instead of recursing.
#[derive(Clone, Default)]
pub struct Container(Rc<RefCell<Vec<Value>>>);

/// One recursive walk over container contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Walk {
    Display(usize),
    Debug(usize),
    Serialize(usize),
    Compare(usize, usize),
}

thread_local! {
    static ACTIVE_WALKS: RefCell<FxHashSet<Walk>> = RefCell::new(FxHashSet::default());
}

/// Marks a walk as in progress until dropped. `enter` returns `None` when
/// the same walk is already running further up the stack.
struct WalkGuard(Walk);

impl WalkGuard {
    fn enter(walk: Walk) -> Option<Self> {
        let fresh = ACTIVE_WALKS.with(|active| active.borrow_mut().insert(walk));
        fresh.then(|| WalkGuard(walk))
    }
}

impl Drop for WalkGuard {
    fn drop(&mut self) {
        ACTIVE_WALKS.with(|active| {
            active.borrow_mut().remove(&self.0);
        });
    }
}

impl Container {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, value: impl Into<Value>) {
        self.0.borrow_mut().push(value.into());
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    pub fn snapshot(&self) -> Vec<Value> {
        self.0.borrow().clone()
    }

    /// Same underlying list, not merely equal contents.
    pub fn ptr_eq(&self, other: &Container) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }
}

impl PartialEq for Container {
    fn eq(&self, other: &Self) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        // Re-entering a comparison already in progress means the two cycles
        // line up; the outer comparison decides the result.
        match WalkGuard::enter(Walk::Compare(self.addr(), other.addr())) {
            Some(_guard) => *self.0.borrow() == *other.0.borrow(),
            None => true,
        }
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match WalkGuard::enter(Walk::Debug(self.addr())) {
            Some(_guard) => f.debug_list().entries(self.0.borrow().iter()).finish(),
            None => f.write_str("[Circular]"),
        }
    }
}

impl fmt::Display for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(_guard) = WalkGuard::enter(Walk::Display(self.addr())) else {
            return f.write_str("[Circular]");
        };
        f.write_str("[")?;
        for (i, value) in self.0.borrow().iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            match value {
                Value::Str(s) => write!(f, "'{s}'")?,
                other => write!(f, "{other}")?,
            }
        }
        f.write_str("]")
    }
}

impl Serialize for Container {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let Some(_guard) = WalkGuard::enter(Walk::Serialize(self.addr())) else {
            return Err(S::Error::custom("cannot serialize a container that contains itself"));
        };
        let items = self.0.borrow();
        let mut seq = serializer.serialize_seq(Some(items.len()))?;
        for item in items.iter() {
            seq.serialize_element(item)?;
        }
        seq.end()
    }
}

impl<V: Into<Value>> FromIterator<V> for Container {
    fn from_iter<I: IntoIterator<Item = V>>(iter: I) -> Self {
        Container(Rc::new(RefCell::new(iter.into_iter().map(Into::into).collect())))
    }
}
