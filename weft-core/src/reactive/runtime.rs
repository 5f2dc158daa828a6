//! Reactive Runtime
//!
//! The runtime owns the dependency graph: for every tracked source, a map
//! from property key to the ordered set of effects that read it.
//!
//! # How It Works
//!
//! 1. When a handle or ref is read while an effect is running, the runtime
//!    records `(source, key) -> effect` ([`Runtime::track`]).
//!
//! 2. When a write changes a key, the runtime collects every effect that
//!    read it, plus the extra effects array length coupling requires, and
//!    runs them immediately ([`Runtime::trigger`]).
//!
//! 3. Nothing is batched. An effect that writes re-enters `trigger` before
//!    the outer trigger has finished; the effect stack's re-entrancy guard
//!    is what stops self-triggering loops.
//!
//! # Memory
//!
//! The graph never owns a source or an effect. Sources are remembered
//! through a weak liveness token and effects through `Weak` pointers.
//! Entries for dropped sources are swept when registering a new source
//! finds the graph has doubled in size since the last sweep, so each
//! registration costs amortised constant time. Dropped effects are pruned
//! when a trigger reaches them.
//!
//! # Locking
//!
//! The graph lives behind a single global mutex, while the active effect is
//! thread-local. The lock is never held while an effect body runs.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{OnceLock, Weak};

use indexmap::{IndexMap, IndexSet};
use parking_lot::Mutex;
use tracing::trace;

use super::context::ReactiveContext;
use super::effect::{Effect, EffectInner};
use super::subscriber::{EffectId, SourceId};
use crate::value::{Key, Value};

/// Something whose reads can be tracked and whose writes can trigger.
pub trait Trackable {
    /// The identity the graph is keyed by.
    fn source_id(&self) -> SourceId;

    /// A weak token that dies with the source.
    fn downgrade(&self) -> Weak<dyn Any + Send + Sync>;

    /// Whether the source is an indexed sequence with a `length` key.
    fn is_indexed(&self) -> bool {
        false
    }
}

/// How a write affected its key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOp {
    /// The key did not exist before the write.
    Add,
    /// An existing key received a different value.
    Set,
}

type Subscribers = IndexMap<EffectId, Weak<EffectInner>>;

struct SourceEntry {
    alive: Weak<dyn Any + Send + Sync>,
    deps: IndexMap<Key, Subscribers>,
}

impl SourceEntry {
    fn is_alive(&self) -> bool {
        self.alive.strong_count() > 0
    }
}

/// Smallest graph size that triggers a sweep on registration.
const MIN_SWEEP_THRESHOLD: usize = 64;

struct DependencyGraph {
    sources: HashMap<SourceId, SourceEntry>,
    /// Sweep once `sources` reaches this many entries.
    next_sweep: usize,
}

impl DependencyGraph {
    fn new() -> Self {
        Self {
            sources: HashMap::new(),
            next_sweep: MIN_SWEEP_THRESHOLD,
        }
    }

    fn register(&mut self, source_id: SourceId, alive: Weak<dyn Any + Send + Sync>) {
        if self.sources.len() >= self.next_sweep {
            self.sweep();
        }
        self.sources.insert(
            source_id,
            SourceEntry {
                alive,
                deps: IndexMap::new(),
            },
        );
    }

    fn sweep(&mut self) {
        let before = self.sources.len();
        self.sources.retain(|_, entry| entry.is_alive());
        let swept = before - self.sources.len();
        self.next_sweep = (self.sources.len() * 2).max(MIN_SWEEP_THRESHOLD);
        if swept > 0 {
            trace!(
                swept,
                next_sweep = self.next_sweep,
                "reclaimed dependency entries of dropped sources"
            );
        }
    }
}

static GRAPH: OnceLock<Mutex<DependencyGraph>> = OnceLock::new();

fn graph() -> &'static Mutex<DependencyGraph> {
    GRAPH.get_or_init(|| Mutex::new(DependencyGraph::new()))
}

/// The global reactive runtime.
pub struct Runtime;

impl Runtime {
    /// Record that the active effect depends on `key` of `source`.
    ///
    /// Does nothing when no effect is running.
    pub fn track<S>(source: &S, key: &Key)
    where
        S: Trackable + ?Sized,
    {
        let Some(effect) = ReactiveContext::current() else {
            return;
        };

        let source_id = source.source_id();
        let mut graph = graph().lock();

        if !graph.sources.contains_key(&source_id) {
            graph.register(source_id, source.downgrade());
        }

        let Some(entry) = graph.sources.get_mut(&source_id) else {
            return;
        };
        let subscribers = entry.deps.entry(key.clone()).or_default();
        if !subscribers.contains_key(&effect.id()) {
            subscribers.insert(effect.id(), std::sync::Arc::downgrade(effect.inner()));
            trace!(source = %source_id, %key, effect = %effect.id(), "tracked");
        }
    }

    /// Re-run every effect affected by a write to `key` of `source`.
    ///
    /// `new_value` is the value just written; for a `length` write on an
    /// indexed source it is the new length.
    pub fn trigger<S>(source: &S, key: &Key, op: TriggerOp, new_value: &Value)
    where
        S: Trackable + ?Sized,
    {
        let effects = Self::collect(source, key, op, new_value);
        if effects.is_empty() {
            return;
        }

        trace!(
            source = %source.source_id(),
            %key,
            ?op,
            count = effects.len(),
            "triggering effects"
        );

        for effect in effects {
            effect.run();
        }
    }

    /// Gather the effects a write must re-run, in run order.
    fn collect<S>(source: &S, key: &Key, op: TriggerOp, new_value: &Value) -> Vec<Effect>
    where
        S: Trackable + ?Sized,
    {
        let mut graph = graph().lock();
        let Some(entry) = graph.sources.get_mut(&source.source_id()) else {
            return Vec::new();
        };

        let mut keys: IndexSet<Key> = IndexSet::new();
        if source.is_indexed() && key.is_length() {
            let new_len = new_value.as_array_length().unwrap_or(0);
            for tracked in entry.deps.keys() {
                let invalidated = match tracked {
                    Key::Length => true,
                    Key::Index(index) => *index >= new_len,
                    Key::Name(_) => false,
                };
                if invalidated {
                    keys.insert(tracked.clone());
                }
            }
        } else {
            keys.insert(key.clone());
            if op == TriggerOp::Add && source.is_indexed() && key.as_index().is_some() {
                keys.insert(Key::Length);
            }
        }

        let mut effects: IndexMap<EffectId, Effect> = IndexMap::new();
        for key in &keys {
            let Some(subscribers) = entry.deps.get_mut(key) else {
                continue;
            };
            subscribers.retain(|id, weak| match weak.upgrade() {
                Some(inner) => {
                    effects.entry(*id).or_insert_with(|| Effect::from_inner(inner));
                    true
                }
                None => false,
            });
        }

        effects.into_values().collect()
    }

    /// Number of live effects subscribed to `key` of `source`.
    pub fn subscriber_count<S>(source: &S, key: &Key) -> usize
    where
        S: Trackable + ?Sized,
    {
        graph()
            .lock()
            .sources
            .get(&source.source_id())
            .and_then(|entry| entry.deps.get(key))
            .map(|subs| subs.values().filter(|weak| weak.strong_count() > 0).count())
            .unwrap_or(0)
    }

    /// The effect currently being tracked, if any.
    pub fn current_effect() -> Option<Effect> {
        ReactiveContext::current()
    }

    /// Check if reads are currently being tracked.
    pub fn is_tracking() -> bool {
        ReactiveContext::is_active()
    }

    /// Whether the graph still holds an entry for this source id.
    #[cfg(test)]
    pub(crate) fn has_entry(source_id: SourceId) -> bool {
        graph().lock().sources.contains_key(&source_id)
    }

    /// Drop entries whose sources no longer exist.
    #[cfg(test)]
    pub(crate) fn sweep() {
        graph().lock().sweep();
    }
}
