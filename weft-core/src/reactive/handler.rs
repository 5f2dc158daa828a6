//! Interception
//!
//! Turns plain reads and writes on a target into track and trigger calls.
//! There is one read routine and one write routine; both branch on the
//! handle's [`Mode`], which combines two independent flags:
//!
//! - *readonly*: reads are not tracked and writes are rejected
//! - *shallow*: nested objects are returned raw instead of wrapped
//!
//! Shallowness only affects reads. Writes through a shallow handle behave
//! exactly like writes through a deep one.

use tracing::warn;

use super::proxy::wrap;
use super::runtime::{Runtime, TriggerOp};
use crate::error::Result;
use crate::value::{has_changed, Key, Target, Value};

/// Access mode of a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Mutable,
    ShallowMutable,
    Readonly,
    ShallowReadonly,
}

impl Mode {
    /// Whether writes are rejected and reads go untracked.
    pub fn is_readonly(self) -> bool {
        matches!(self, Mode::Readonly | Mode::ShallowReadonly)
    }

    /// Whether nested objects are returned without wrapping.
    pub fn is_shallow(self) -> bool {
        matches!(self, Mode::ShallowMutable | Mode::ShallowReadonly)
    }
}

/// Read `key` from `target` under `mode`.
///
/// Nested objects are wrapped on the way out, so deep wrapping is lazy: an
/// inner object gets its handle the first time it is actually read. Stored
/// handles are re-wrapped from their target and stored refs are narrowed to
/// a readonly view, so a deep readonly handle never hands out a writable one.
pub(crate) fn get(target: &Target, mode: Mode, key: &Key) -> Value {
    let value = target.get(key);

    if !mode.is_readonly() {
        Runtime::track(target, key);
    }

    if mode.is_shallow() {
        return value;
    }

    if mode.is_readonly() {
        match value {
            Value::Ref(cell) => Value::Ref(cell.readonly()),
            other => wrap(other, Mode::Readonly),
        }
    } else {
        wrap(value, Mode::Mutable)
    }
}

/// Write `value` to `key` of `target` under `mode`.
///
/// Returns `Ok(false)` when the write was rejected by a readonly handle.
pub(crate) fn set(target: &Target, mode: Mode, key: Key, value: Value) -> Result<bool> {
    if mode.is_readonly() {
        warn!(
            source = %target.id(),
            %key,
            value = %value,
            "rejected write through readonly handle"
        );
        return Ok(false);
    }

    match target.set(key.clone(), value.clone())? {
        None => Runtime::trigger(target, &key, TriggerOp::Add, &value),
        Some(old) if has_changed(&old, &value) => {
            Runtime::trigger(target, &key, TriggerOp::Set, &value)
        }
        Some(_) => {}
    }

    Ok(true)
}
