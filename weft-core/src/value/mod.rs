//! Data Model
//!
//! Reactive handles need something to wrap. This module defines the dynamic
//! value model the runtime operates on:
//!
//! - [`Value`]: a closed set of scalar and reference variants
//! - [`Key`]: a normalised property key
//! - [`Target`]: a shared record or array, the thing a handle wraps
//!
//! # Equality
//!
//! `Value` equality follows strict-equality rules: numbers compare as `f64`
//! (so `NaN` is never equal to itself), strings compare by content, and
//! objects, handles and refs compare by identity. [`has_changed`] layers the
//! NaN exception on top, and is what every write path uses to decide whether
//! subscribers must re-run.

mod key;
mod target;

pub use key::Key;
pub use target::{Target, MAX_ARRAY_LENGTH};

use std::collections::HashSet;
use std::fmt;

use crate::error::Result;
use crate::reactive::{Handle, Ref, SourceId};

/// A dynamically typed value stored in targets and refs.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    /// A raw, unwrapped target.
    Object(Target),
    /// A reactive handle over a target.
    Handle(Handle),
    /// A reactive box.
    Ref(Ref),
}

impl Value {
    /// True for raw targets and handles over them.
    pub fn is_object(&self) -> bool {
        matches!(self, Value::Object(_) | Value::Handle(_))
    }

    /// True only for a `NaN` number.
    pub fn is_nan(&self) -> bool {
        matches!(self, Value::Number(n) if n.is_nan())
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// The number, if this is one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// The raw target, if this value is an unwrapped object.
    pub fn as_target(&self) -> Option<&Target> {
        match self {
            Value::Object(target) => Some(target),
            _ => None,
        }
    }

    /// The handle, if this value is a wrapped object.
    pub fn as_handle(&self) -> Option<&Handle> {
        match self {
            Value::Handle(handle) => Some(handle),
            _ => None,
        }
    }

    /// The ref, if this value is one.
    pub fn as_reference(&self) -> Option<&Ref> {
        match self {
            Value::Ref(r) => Some(r),
            _ => None,
        }
    }

    /// Interpret this value as an array length.
    pub(crate) fn as_array_length(&self) -> Option<usize> {
        match self {
            Value::Number(n)
                if *n >= 0.0 && *n <= MAX_ARRAY_LENGTH as f64 && n.fract() == 0.0 =>
            {
                Some(*n as usize)
            }
            _ => None,
        }
    }

    /// Deep JSON snapshot of this value.
    pub fn to_json(&self) -> Result<serde_json::Value> {
        let mut visiting = HashSet::new();
        self.snapshot(&mut visiting)
    }

    pub(crate) fn snapshot(&self, visiting: &mut HashSet<SourceId>) -> Result<serde_json::Value> {
        Ok(match self {
            Value::Undefined | Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => number_to_json(*n),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Object(target) => target.snapshot(visiting)?,
            Value::Handle(handle) => handle.raw().snapshot(visiting)?,
            Value::Ref(r) => r.get_untracked().snapshot(visiting)?,
        })
    }
}

fn number_to_json(n: f64) -> serde_json::Value {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        serde_json::Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null)
    }
}

/// NaN-aware change check.
///
/// Two `NaN`s count as unchanged so that repeatedly writing `NaN` does not
/// re-trigger subscribers forever.
pub fn has_changed(old: &Value, new: &Value) -> bool {
    old != new && !(old.is_nan() && new.is_nan())
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Handle(a), Value::Handle(b)) => a.ptr_eq(b),
            (Value::Ref(a), Value::Ref(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("Undefined"),
            Value::Null => f.write_str("Null"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Number(n) => write!(f, "Number({n})"),
            Value::String(s) => write!(f, "String({s:?})"),
            Value::Object(target) => fmt::Debug::fmt(target, f),
            Value::Handle(handle) => fmt::Debug::fmt(handle, f),
            Value::Ref(r) => fmt::Debug::fmt(r, f),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("undefined"),
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) if n.is_nan() => f.write_str("NaN"),
            Value::Number(n) => write!(f, "{n}"),
            Value::String(s) => f.write_str(s),
            Value::Object(target) => write!(f, "[object {}]", target.id()),
            Value::Handle(handle) => write!(f, "[{:?} {}]", handle.mode(), handle.raw().id()),
            Value::Ref(r) => write!(f, "[ref {}]", r.id()),
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
        Value::Number(f64::from(n))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Target> for Value {
    fn from(target: Target) -> Self {
        Value::Object(target)
    }
}

impl From<&Target> for Value {
    fn from(target: &Target) -> Self {
        Value::Object(target.clone())
    }
}

impl From<Handle> for Value {
    fn from(handle: Handle) -> Self {
        Value::Handle(handle)
    }
}

impl From<Ref> for Value {
    fn from(r: Ref) -> Self {
        Value::Ref(r)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Object(Target::from_items(items.into_iter().map(Value::from)))
            }
            serde_json::Value::Object(map) => Value::Object(Target::from_entries(
                map.into_iter().map(|(k, v)| (k, Value::from(v))),
            )),
        }
    }
}
