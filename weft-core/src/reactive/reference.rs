//! Reactive Box
//!
//! A [`Ref`] is a single tracked cell, used when the datum is not itself an
//! object. It follows the same contract as a handle, with one fixed key:
//! reads track `(ref, "value")` and changing writes trigger it.
//!
//! Objects stored in a ref are converted to mutable deep handles as soon as
//! they are stored, on construction and on every write, rather than lazily
//! on read.
//!
//! A deep readonly handle hands out refs through [`Ref::readonly`]: a view
//! of the same cell whose reads are untracked and whose writes are rejected.

use std::any::Any;
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use tracing::warn;

use super::proxy::reactive;
use super::runtime::{Runtime, Trackable, TriggerOp};
use super::subscriber::SourceId;
use crate::value::{has_changed, Key, Value};

struct RefInner {
    id: SourceId,
    value: RwLock<Value>,
}

/// A single-value reactive box.
///
/// Cloning a `Ref` shares the cell.
#[derive(Clone)]
pub struct Ref {
    cell: Arc<RefInner>,
    readonly: bool,
}

fn convert(value: Value) -> Value {
    match value {
        Value::Object(target) => Value::Handle(reactive(&target)),
        other => other,
    }
}

fn value_key() -> Key {
    Key::from(Key::REF_VALUE)
}

impl Ref {
    /// Box `value`, or return it unchanged if it is already a ref.
    pub fn new(value: impl Into<Value>) -> Self {
        match value.into() {
            Value::Ref(existing) => existing,
            other => Self {
                cell: Arc::new(RefInner {
                    id: SourceId::new(),
                    value: RwLock::new(convert(other)),
                }),
                readonly: false,
            },
        }
    }

    /// Identity of the underlying cell, shared by its readonly view.
    pub fn id(&self) -> SourceId {
        self.cell.id
    }

    /// A view of the same cell that rejects writes and does not track.
    pub fn readonly(&self) -> Ref {
        Self {
            cell: self.cell.clone(),
            readonly: true,
        }
    }

    /// Whether this is a readonly view.
    pub fn is_readonly(&self) -> bool {
        self.readonly
    }

    /// Tracked read. Readonly views read without tracking.
    pub fn get(&self) -> Value {
        if !self.readonly {
            Runtime::track(self, &value_key());
        }
        self.get_untracked()
    }

    /// Read without registering a dependency.
    pub fn get_untracked(&self) -> Value {
        self.cell.value.read().clone()
    }

    /// Store `value` and trigger subscribers if it differs from the
    /// current one.
    ///
    /// Returns whether the value changed. Writes through a readonly view
    /// are rejected and return `false`.
    pub fn set(&self, value: impl Into<Value>) -> bool {
        let value = value.into();
        if self.readonly {
            warn!(source = %self.cell.id, value = %value, "rejected write through readonly ref");
            return false;
        }

        let stored = {
            let mut current = self.cell.value.write();
            if !has_changed(&current, &value) {
                return false;
            }
            let converted = convert(value);
            *current = converted.clone();
            converted
        };

        Runtime::trigger(self, &value_key(), TriggerOp::Set, &stored);
        true
    }

    /// Update the value using a function of the current one.
    pub fn update<F>(&self, f: F) -> bool
    where
        F: FnOnce(&Value) -> Value,
    {
        let next = f(&self.get_untracked());
        self.set(next)
    }

    /// Whether both refs are the same view of the same cell.
    pub fn ptr_eq(&self, other: &Ref) -> bool {
        Arc::ptr_eq(&self.cell, &other.cell) && self.readonly == other.readonly
    }
}

impl Trackable for Ref {
    fn source_id(&self) -> SourceId {
        self.cell.id
    }

    fn downgrade(&self) -> Weak<dyn Any + Send + Sync> {
        let strong: Arc<dyn Any + Send + Sync> = self.cell.clone();
        Arc::downgrade(&strong)
    }
}

impl PartialEq for Ref {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Ref {}

impl fmt::Debug for Ref {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ref")
            .field("id", &self.cell.id)
            .field("readonly", &self.readonly)
            .field("value", &self.get_untracked())
            .finish()
    }
}

/// Box a value in a [`Ref`].
pub fn ref_(value: impl Into<Value>) -> Ref {
    Ref::new(value)
}

/// Whether `value` is a ref.
pub fn is_ref(value: &Value) -> bool {
    matches!(value, Value::Ref(_))
}
