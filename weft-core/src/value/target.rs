//! Raw structured values.
//!
//! A [`Target`] is the caller-owned data that handles wrap. It is a shared,
//! lock-protected record or array with a stable identity. All operations on
//! it are *untracked*: they never touch the dependency graph. Tracking is
//! the job of [`Handle`](crate::Handle).

use std::any::Any;
use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::RwLock;

use super::{Key, Value};
use crate::error::{Error, Result};
use crate::reactive::{SourceId, Trackable};

/// Largest length an array target can reach, `2^32 - 1`.
///
/// Indices at or above it are not array indices and are rejected.
pub const MAX_ARRAY_LENGTH: usize = u32::MAX as usize;

/// Backing storage of a target.
#[derive(Debug, Clone)]
pub(crate) enum TargetData {
    Record(IndexMap<Key, Value>),
    Array(Vec<Value>),
}

pub(crate) struct TargetInner {
    id: SourceId,
    data: RwLock<TargetData>,
}

/// A shared record or array.
///
/// Cloning a `Target` clones the reference, not the data; both clones see
/// the same storage and have the same identity.
#[derive(Clone)]
pub struct Target(Arc<TargetInner>);

impl Target {
    fn from_data(data: TargetData) -> Self {
        Self(Arc::new(TargetInner {
            id: SourceId::new(),
            data: RwLock::new(data),
        }))
    }

    /// Create an empty record.
    pub fn record() -> Self {
        Self::from_data(TargetData::Record(IndexMap::new()))
    }

    /// Create an empty array.
    pub fn array() -> Self {
        Self::from_data(TargetData::Array(Vec::new()))
    }

    /// Create a record from key/value pairs.
    pub fn from_entries<K, V, I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<Key>,
        V: Into<Value>,
    {
        let map = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self::from_data(TargetData::Record(map))
    }

    /// Create an array from its elements.
    pub fn from_items<V, I>(items: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::from_data(TargetData::Array(items.into_iter().map(Into::into).collect()))
    }

    /// Build a target from a JSON object or array.
    ///
    /// Returns `None` for JSON scalars, which are not objects.
    pub fn from_json(json: serde_json::Value) -> Option<Self> {
        match Value::from(json) {
            Value::Object(target) => Some(target),
            _ => None,
        }
    }

    /// The target's identity.
    pub fn id(&self) -> SourceId {
        self.0.id
    }

    /// Whether two values refer to the same target.
    pub fn ptr_eq(&self, other: &Target) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Whether this target is an array rather than a record.
    pub fn is_array(&self) -> bool {
        matches!(*self.0.data.read(), TargetData::Array(_))
    }

    /// Number of elements (arrays) or entries (records).
    pub fn len(&self) -> usize {
        match &*self.0.data.read() {
            TargetData::Record(map) => map.len(),
            TargetData::Array(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keys currently present, in order.
    pub fn keys(&self) -> Vec<Key> {
        match &*self.0.data.read() {
            TargetData::Record(map) => map.keys().cloned().collect(),
            TargetData::Array(items) => (0..items.len()).map(Key::Index).collect(),
        }
    }

    /// Read a property without tracking.
    pub fn get(&self, key: impl Into<Key>) -> Value {
        let key = key.into();
        match &*self.0.data.read() {
            TargetData::Record(map) => map.get(&key).cloned().unwrap_or_default(),
            TargetData::Array(items) => match key {
                Key::Index(index) => items.get(index).cloned().unwrap_or_default(),
                Key::Length => Value::from(items.len()),
                Key::Name(_) => Value::Undefined,
            },
        }
    }

    /// Whether the key currently exists.
    ///
    /// For arrays an index exists only when it is strictly below the length.
    pub fn has(&self, key: impl Into<Key>) -> bool {
        let key = key.into();
        match &*self.0.data.read() {
            TargetData::Record(map) => map.contains_key(&key),
            TargetData::Array(items) => match key {
                Key::Index(index) => index < items.len(),
                Key::Length => true,
                Key::Name(_) => false,
            },
        }
    }

    /// Write a property without triggering.
    ///
    /// Returns the previous value when the key already existed, or `None`
    /// when the write added it.
    pub fn set(&self, key: impl Into<Key>, value: impl Into<Value>) -> Result<Option<Value>> {
        let key = key.into();
        let value = value.into();
        let mut data = self.0.data.write();
        match &mut *data {
            TargetData::Record(map) => Ok(map.insert(key, value)),
            TargetData::Array(items) => match key {
                Key::Index(index) if index < items.len() => {
                    Ok(Some(std::mem::replace(&mut items[index], value)))
                }
                Key::Index(index) if index >= MAX_ARRAY_LENGTH => {
                    Err(Error::UnsupportedKey { key })
                }
                Key::Index(index) => {
                    resize_items(items, index + 1)?;
                    items[index] = value;
                    Ok(None)
                }
                Key::Length => {
                    let new_len = value
                        .as_array_length()
                        .ok_or_else(|| Error::InvalidLength(value.to_string()))?;
                    let old_len = items.len();
                    resize_items(items, new_len)?;
                    Ok(Some(Value::from(old_len)))
                }
                Key::Name(_) => Err(Error::UnsupportedKey { key }),
            },
        }
    }

    /// Append an element to an array target, returning the index written.
    pub fn push(&self, value: impl Into<Value>) -> Result<usize> {
        let index = self.len();
        if !self.is_array() {
            return Err(Error::UnsupportedKey { key: Key::Index(index) });
        }
        self.set(index, value)?;
        Ok(index)
    }

    /// Deep JSON snapshot of this target.
    pub fn to_json(&self) -> Result<serde_json::Value> {
        let mut visiting = HashSet::new();
        self.snapshot(&mut visiting)
    }

    pub(crate) fn snapshot(&self, visiting: &mut HashSet<SourceId>) -> Result<serde_json::Value> {
        if !visiting.insert(self.id()) {
            return Err(Error::Cycle);
        }
        // Clone out so nested snapshots do not re-enter the lock.
        let data = self.0.data.read().clone();
        let json = match data {
            TargetData::Record(map) => {
                let mut object = serde_json::Map::with_capacity(map.len());
                for (key, value) in map {
                    object.insert(key.to_string(), value.snapshot(visiting)?);
                }
                serde_json::Value::Object(object)
            }
            TargetData::Array(items) => serde_json::Value::Array(
                items
                    .iter()
                    .map(|value| value.snapshot(visiting))
                    .collect::<Result<_>>()?,
            ),
        };
        visiting.remove(&self.id());
        Ok(json)
    }
}

impl Trackable for Target {
    fn source_id(&self) -> SourceId {
        self.id()
    }

    fn downgrade(&self) -> Weak<dyn Any + Send + Sync> {
        let strong: Arc<dyn Any + Send + Sync> = self.0.clone();
        Arc::downgrade(&strong)
    }

    fn is_indexed(&self) -> bool {
        self.is_array()
    }
}

/// Grow or truncate `items` to `new_len`, filling holes with `Undefined`.
///
/// Growth reserves first so an allocation failure surfaces as an error.
fn resize_items(items: &mut Vec<Value>, new_len: usize) -> Result<()> {
    if new_len > items.len() {
        items
            .try_reserve_exact(new_len - items.len())
            .map_err(|_| Error::CapacityExceeded(new_len))?;
    }
    items.resize(new_len, Value::Undefined);
    Ok(())
}

impl PartialEq for Target {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Target {}

impl fmt::Debug for Target {
    // Contents are omitted: targets may contain themselves.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Target")
            .field("id", &self.id())
            .field("array", &self.is_array())
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn record_get_set_has() {
        let target = Target::record();
        assert!(!target.has("a"));
        assert_eq!(target.get("a"), Value::Undefined);

        assert_eq!(target.set("a", 1).unwrap(), None);
        assert!(target.has("a"));
        assert_eq!(target.set("a", 2).unwrap(), Some(Value::from(1)));
        assert_eq!(target.get("a"), Value::from(2));
    }

    #[test]
    fn record_length_is_an_ordinary_property() {
        let target = Target::record();
        assert!(!target.has(Key::Length));
        target.set("length", "long").unwrap();
        assert_eq!(target.get(Key::Length), Value::from("long"));
    }

    #[test]
    fn array_index_past_end_extends_with_holes() {
        let target = Target::from_items([1, 2, 3]);
        assert!(!target.has(5usize));
        assert_eq!(target.set(5usize, 6).unwrap(), None);
        assert_eq!(target.len(), 6);
        assert_eq!(target.get(3usize), Value::Undefined);
        assert_eq!(target.get(Key::Length), Value::from(6));
    }

    #[test]
    fn array_length_truncates_and_reports_old_length() {
        let target = Target::from_items([1, 2, 3]);
        assert_eq!(target.set(Key::Length, 1).unwrap(), Some(Value::from(3)));
        assert_eq!(target.len(), 1);
        assert!(!target.has(1usize));
    }

    #[test]
    fn array_rejects_bad_length_and_named_keys() {
        let target = Target::array();
        assert!(matches!(target.set(Key::Length, -1), Err(Error::InvalidLength(_))));
        assert!(matches!(target.set(Key::Length, 1.5), Err(Error::InvalidLength(_))));
        assert!(matches!(
            target.set("name", 1),
            Err(Error::UnsupportedKey { .. })
        ));
        assert!(target.is_empty());
    }

    #[test]
    fn array_rejects_indices_and_lengths_past_the_limit() {
        let target = Target::from_items([1, 2, 3]);

        assert_eq!(Key::from("18446744073709551615"), Key::Index(usize::MAX));
        assert!(matches!(
            target.set("18446744073709551615", 1),
            Err(Error::UnsupportedKey { .. })
        ));
        assert!(matches!(
            target.set(MAX_ARRAY_LENGTH, 1),
            Err(Error::UnsupportedKey { .. })
        ));
        assert!(matches!(
            target.set(Key::Length, MAX_ARRAY_LENGTH as f64 + 1.0),
            Err(Error::InvalidLength(_))
        ));
        assert!(matches!(
            target.set(Key::Length, 1e300),
            Err(Error::InvalidLength(_))
        ));

        assert_eq!(target.len(), 3);
        assert_eq!(target.get(2usize), Value::from(3));
    }

    #[test]
    fn push_appends_to_arrays_only() {
        let array = Target::array();
        assert_eq!(array.push("x").unwrap(), 0);
        assert_eq!(array.push("y").unwrap(), 1);
        assert!(Target::record().push(1).is_err());
    }

    #[test]
    fn json_round_trip() {
        let source = json!({"name": "weft", "tags": ["a", "b"], "nested": {"n": 1.5}});
        let target = Target::from_json(source.clone()).unwrap();
        assert!(target.get("tags").as_target().unwrap().is_array());
        assert_eq!(target.to_json().unwrap(), source);
    }

    #[test]
    fn json_scalars_are_not_targets() {
        assert!(Target::from_json(json!(3)).is_none());
    }

    #[test]
    fn cyclic_snapshot_is_an_error() {
        let target = Target::record();
        target.set("me", target.clone()).unwrap();
        assert_eq!(target.to_json(), Err(Error::Cycle));
    }

    #[test]
    fn clones_share_identity() {
        let a = Target::record();
        let b = a.clone();
        let c = Target::record();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.id(), b.id());
    }
}
