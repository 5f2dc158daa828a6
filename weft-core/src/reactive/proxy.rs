//! Proxy Factory
//!
//! Wraps targets in [`Handle`]s. Handles are memoized by target identity in
//! two caches, one for the mutable axis and one for the readonly axis, so
//! wrapping the same target twice yields the same handle.
//!
//! The caches hold handles weakly: a handle nobody references can be
//! rebuilt on the next wrap without any observable difference, and a cached
//! handle never keeps its target alive.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::debug;

use super::handler::{self, Mode};
use super::subscriber::SourceId;
use crate::error::Result;
use crate::value::{Key, Target, Value};

/// Sweep dead cache entries after this many insertions.
const SWEEP_INTERVAL: usize = 64;

struct HandleCache {
    handles: DashMap<SourceId, Weak<HandleInner>>,
    inserts: AtomicUsize,
}

impl HandleCache {
    fn new() -> Self {
        Self {
            handles: DashMap::new(),
            inserts: AtomicUsize::new(0),
        }
    }

    #[cfg(test)]
    fn get(&self, id: SourceId) -> Option<Handle> {
        self.handles
            .get(&id)
            .and_then(|weak| weak.upgrade())
            .map(Handle)
    }

    /// The live handle for `target`, or a new one built with `mode`.
    ///
    /// Lookup and insertion happen under one shard lock, so threads racing
    /// to wrap the same target all receive the same handle.
    fn get_or_create(&self, target: &Target, mode: Mode) -> Handle {
        let handle = match self.handles.entry(target.id()) {
            Entry::Occupied(mut slot) => {
                if let Some(inner) = slot.get().upgrade() {
                    return Handle(inner);
                }
                let handle = Handle::build(target, mode);
                slot.insert(Arc::downgrade(&handle.0));
                handle
            }
            Entry::Vacant(slot) => {
                let handle = Handle::build(target, mode);
                slot.insert(Arc::downgrade(&handle.0));
                handle
            }
        };
        debug!(source = %target.id(), ?mode, "handle created");

        // `retain` locks every shard, so it must run after the entry guard
        // above is released.
        if self.inserts.fetch_add(1, Ordering::Relaxed) % SWEEP_INTERVAL == SWEEP_INTERVAL - 1 {
            self.handles.retain(|_, weak| weak.strong_count() > 0);
        }
        handle
    }
}

static REACTIVE_CACHE: OnceLock<HandleCache> = OnceLock::new();
static READONLY_CACHE: OnceLock<HandleCache> = OnceLock::new();

fn cache_for(mode: Mode) -> &'static HandleCache {
    if mode.is_readonly() {
        READONLY_CACHE.get_or_init(HandleCache::new)
    } else {
        REACTIVE_CACHE.get_or_init(HandleCache::new)
    }
}

struct HandleInner {
    target: Target,
    mode: Mode,
}

/// An intercepted view over one target.
///
/// Reads through [`Handle::get`] are tracked and writes through
/// [`Handle::set`] trigger, according to the handle's [`Mode`].
#[derive(Clone)]
pub struct Handle(Arc<HandleInner>);

impl Handle {
    fn build(target: &Target, mode: Mode) -> Self {
        Self(Arc::new(HandleInner {
            target: target.clone(),
            mode,
        }))
    }

    /// Tracked read.
    pub fn get(&self, key: impl Into<Key>) -> Value {
        handler::get(&self.0.target, self.0.mode, &key.into())
    }

    /// Triggering write.
    ///
    /// Returns `Ok(false)` if the handle is readonly and the write was
    /// rejected.
    pub fn set(&self, key: impl Into<Key>, value: impl Into<Value>) -> Result<bool> {
        handler::set(&self.0.target, self.0.mode, key.into(), value.into())
    }

    /// Tracked read of the `length` key.
    pub fn length(&self) -> Value {
        self.get(Key::Length)
    }

    /// The wrapped target.
    pub fn raw(&self) -> &Target {
        &self.0.target
    }

    /// The mode this handle was created with.
    pub fn mode(&self) -> Mode {
        self.0.mode
    }

    /// Whether writes through this handle are rejected.
    pub fn is_readonly(&self) -> bool {
        self.0.mode.is_readonly()
    }

    /// Whether nested objects are returned raw.
    pub fn is_shallow(&self) -> bool {
        self.0.mode.is_shallow()
    }

    /// Whether two handles are the same handle.
    pub fn ptr_eq(&self, other: &Handle) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for Handle {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Handle {}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("mode", &self.0.mode)
            .field("target", &self.0.target)
            .finish()
    }
}

/// Return the cached handle for `target` on the axis of `mode`, creating
/// one if none is alive.
///
/// The first mode registered on an axis wins: after `reactive(t)`,
/// `shallow_reactive(t)` returns the same deep handle.
fn create_handle(target: &Target, mode: Mode) -> Handle {
    cache_for(mode).get_or_create(target, mode)
}

/// Wrap a value in a handle of the given mode.
///
/// Values that are not objects are returned unchanged. A handle is
/// re-wrapped from its raw target, so `wrap(reactive(t), Readonly)` yields
/// the readonly handle for `t`.
pub fn wrap(value: Value, mode: Mode) -> Value {
    match value {
        Value::Object(target) => Value::Handle(create_handle(&target, mode)),
        Value::Handle(handle) => Value::Handle(create_handle(handle.raw(), mode)),
        other => other,
    }
}

/// Deep, tracked, mutable handle.
pub fn reactive(target: &Target) -> Handle {
    create_handle(target, Mode::Mutable)
}

/// Shallow, tracked, mutable handle.
pub fn shallow_reactive(target: &Target) -> Handle {
    create_handle(target, Mode::ShallowMutable)
}

/// Deep handle that rejects writes.
pub fn readonly(target: &Target) -> Handle {
    create_handle(target, Mode::Readonly)
}

/// Shallow handle that rejects writes.
pub fn shallow_readonly(target: &Target) -> Handle {
    create_handle(target, Mode::ShallowReadonly)
}

/// The live cached handle for `target` on one axis, without creating one.
#[cfg(test)]
pub(crate) fn cached(target: &Target, readonly: bool) -> Option<Handle> {
    let mode = if readonly { Mode::Readonly } else { Mode::Mutable };
    cache_for(mode).get(target.id())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;
    use std::thread;

    use crate::reactive::Trackable;

    #[test]
    fn wrapping_is_memoized_per_axis() {
        let target = Target::record();

        let a = reactive(&target);
        let b = reactive(&target);
        let r = readonly(&target);

        assert_eq!(a, b);
        assert_ne!(a, r);
        assert_eq!(r, readonly(&target));
    }

    #[test]
    fn first_mode_on_an_axis_wins() {
        let target = Target::record();
        let deep = reactive(&target);
        let shallow = shallow_reactive(&target);

        assert_eq!(deep, shallow);
        assert_eq!(shallow.mode(), Mode::Mutable);
    }

    #[test]
    fn non_objects_pass_through() {
        assert_eq!(wrap(Value::from(3), Mode::Mutable), Value::from(3));
        assert_eq!(wrap(Value::Null, Mode::Readonly), Value::Null);
    }

    #[test]
    fn wrapping_a_handle_uses_its_target() {
        let target = Target::record();
        let mutable = reactive(&target);

        let frozen = wrap(Value::from(mutable.clone()), Mode::Readonly);
        assert_eq!(frozen.as_handle(), Some(&readonly(&target)));

        let same = wrap(Value::from(mutable.clone()), Mode::Mutable);
        assert_eq!(same.as_handle(), Some(&mutable));
    }

    #[test]
    fn concurrent_wrapping_yields_one_handle() {
        let target = Target::record();
        let barrier = Barrier::new(8);

        let handles: Vec<Handle> = thread::scope(|scope| {
            let workers: Vec<_> = (0..8)
                .map(|_| {
                    scope.spawn(|| {
                        barrier.wait();
                        reactive(&target)
                    })
                })
                .collect();
            workers.into_iter().map(|w| w.join().unwrap()).collect()
        });

        assert!(handles.iter().all(|h| h.ptr_eq(&handles[0])));
        assert_eq!(cached(&target, false).as_ref(), Some(&handles[0]));
    }

    #[test]
    fn dead_entries_are_replaced_in_place() {
        let target = Target::record();
        drop(readonly(&target));

        // The dead deep entry no longer decides the mode.
        let second = shallow_readonly(&target);
        assert_eq!(second.mode(), Mode::ShallowReadonly);
        assert_eq!(cached(&target, true), Some(second));
    }

    #[test]
    fn dropped_handles_are_not_kept_alive() {
        let target = Target::record();
        let handle = reactive(&target);
        assert!(cached(&target, false).is_some());

        drop(handle);
        assert!(cached(&target, false).is_none());
    }

    #[test]
    fn cache_does_not_keep_target_alive() {
        let target = Target::record();
        let token = Trackable::downgrade(&target);
        let handle = reactive(&target);

        drop(handle);
        drop(target);
        assert!(token.upgrade().is_none());
    }
}
