//! Effect Implementation
//!
//! An Effect is a side-effecting computation that re-runs whenever data it
//! read changes.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs its function immediately (unless it is
//!    lazy) so that its reads register it as a subscriber.
//!
//! 2. When a tracked write hits one of those reads, the runtime invokes the
//!    effect again, synchronously, before the write returns.
//!
//! 3. Dependencies accumulate: a re-run adds any newly read keys but does
//!    not forget old ones.
//!
//! # Lifetime
//!
//! The dependency graph only holds effects weakly. An effect keeps
//! re-running for as long as some `Effect` clone is alive; drop every clone
//! and it silently stops.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::context::ReactiveContext;
use super::subscriber::EffectId;

/// Options recognised when creating an effect.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectOptions {
    /// Do not run the effect at creation time.
    pub lazy: bool,
}

impl EffectOptions {
    /// Options for an effect that waits for its first explicit run.
    pub fn lazy() -> Self {
        Self { lazy: true }
    }
}

pub(crate) struct EffectInner {
    id: EffectId,
    raw: Box<dyn Fn() + Send + Sync>,
    options: EffectOptions,
    run_count: AtomicUsize,
}

/// A re-runnable computation that tracks what it reads.
///
/// # Example
///
/// ```rust,ignore
/// let state = reactive(&Target::from_json(json!({"count": 0})).unwrap());
///
/// let view = state.clone();
/// let effect = Effect::new(move || {
///     println!("count is {}", view.get("count"));
/// });
///
/// state.set("count", 5)?;  // Prints: "count is 5"
/// ```
#[must_use = "the effect stops re-running once every handle is dropped"]
#[derive(Clone)]
pub struct Effect(Arc<EffectInner>);

impl Effect {
    /// Create an effect and run it once.
    #[must_use = "the effect stops re-running once every handle is dropped"]
    pub fn new<F>(f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self::with_options(f, EffectOptions::default())
    }

    /// Create an effect that does not run until [`Effect::run`] is called.
    #[must_use = "the effect stops re-running once every handle is dropped"]
    pub fn new_lazy<F>(f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self::with_options(f, EffectOptions::lazy())
    }

    /// Create an effect configured by `options`, running it once unless
    /// `options.lazy` is set.
    #[must_use = "the effect stops re-running once every handle is dropped"]
    pub fn with_options<F>(f: F, options: EffectOptions) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let effect = Self(Arc::new(EffectInner {
            id: EffectId::new(),
            raw: Box::new(f),
            options,
            run_count: AtomicUsize::new(0),
        }));
        debug!(effect = %effect.id(), lazy = options.lazy, "effect created");

        if !options.lazy {
            effect.run();
        }

        effect
    }

    pub(crate) fn from_inner(inner: Arc<EffectInner>) -> Self {
        Self(inner)
    }

    pub(crate) fn inner(&self) -> &Arc<EffectInner> {
        &self.0
    }

    /// Creation-ordered identity of this effect.
    pub fn id(&self) -> EffectId {
        self.0.id
    }

    /// The options the effect was created with.
    pub fn options(&self) -> EffectOptions {
        self.0.options
    }

    /// Run the effect function with this effect as the active tracker.
    ///
    /// Returns `false` without running anything if the effect is already
    /// executing further up the call stack.
    pub fn run(&self) -> bool {
        let Some(_ctx) = ReactiveContext::enter(self) else {
            trace!(effect = %self.id(), "skipping re-entrant run");
            return false;
        };

        self.0.run_count.fetch_add(1, Ordering::Relaxed);
        (self.0.raw)();
        true
    }

    /// Whether the effect is currently on the effect stack.
    pub fn is_running(&self) -> bool {
        ReactiveContext::contains(self.id())
    }

    /// Number of times the effect body has been entered.
    pub fn run_count(&self) -> usize {
        self.0.run_count.load(Ordering::Relaxed)
    }

    /// Whether two handles refer to the same effect.
    pub fn ptr_eq(&self, other: &Effect) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.id())
            .field("lazy", &self.0.options.lazy)
            .field("run_count", &self.run_count())
            .finish()
    }
}

/// Create an effect and run it once.
#[must_use = "the effect stops re-running once every handle is dropped"]
pub fn effect<F>(f: F) -> Effect
where
    F: Fn() + Send + Sync + 'static,
{
    Effect::new(f)
}

/// Create an effect with explicit options.
#[must_use = "the effect stops re-running once every handle is dropped"]
pub fn effect_with_options<F>(f: F, options: EffectOptions) -> Effect
where
    F: Fn() + Send + Sync + 'static,
{
    Effect::with_options(f, options)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicI32;

    #[test]
    fn effect_runs_on_creation() {
        let run_count = Arc::new(AtomicI32::new(0));
        let run_count_clone = run_count.clone();

        let _effect = Effect::new(move || {
            run_count_clone.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(run_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn effect_lazy_does_not_run_on_creation() {
        let run_count = Arc::new(AtomicI32::new(0));
        let run_count_clone = run_count.clone();

        let effect = effect_with_options(
            move || {
                run_count_clone.fetch_add(1, Ordering::SeqCst);
            },
            EffectOptions::lazy(),
        );

        assert_eq!(run_count.load(Ordering::SeqCst), 0);
        assert_eq!(effect.run_count(), 0);

        assert!(effect.run());
        assert_eq!(run_count.load(Ordering::SeqCst), 1);
        assert_eq!(effect.run_count(), 1);
    }

    #[test]
    fn effect_ids_increase_in_creation_order() {
        let first = Effect::new_lazy(|| {});
        let second = Effect::new_lazy(|| {});
        assert!(first.id() < second.id());
    }

    #[test]
    fn effect_is_running_only_inside_its_body() {
        let seen = Arc::new(AtomicI32::new(0));
        let seen_clone = seen.clone();

        let effect = Effect::new_lazy(move || {
            if ReactiveContext::current().is_some_and(|e| e.is_running()) {
                seen_clone.fetch_add(1, Ordering::SeqCst);
            }
        });

        assert!(!effect.is_running());
        effect.run();
        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert!(!effect.is_running());
    }

    #[test]
    fn nested_self_run_is_skipped() {
        let slot: Arc<parking_lot::Mutex<Option<Effect>>> = Arc::default();
        let slot_clone = slot.clone();
        let nested_result = Arc::new(AtomicI32::new(-1));
        let nested_clone = nested_result.clone();

        let effect = Effect::new_lazy(move || {
            if let Some(me) = slot_clone.lock().clone() {
                nested_clone.store(i32::from(me.run()), Ordering::SeqCst);
            }
        });
        *slot.lock() = Some(effect.clone());

        assert!(effect.run());
        assert_eq!(nested_result.load(Ordering::SeqCst), 0);
        assert_eq!(effect.run_count(), 1);

        // Break the self-reference so the effect can be freed.
        slot.lock().take();
    }

    #[test]
    fn panic_in_body_restores_the_stack() {
        let outer = Effect::new_lazy(|| {});
        let failing = Effect::new_lazy(|| panic!("effect body failed"));

        let _ctx = ReactiveContext::enter(&outer).unwrap();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| failing.run()));

        assert!(result.is_err());
        assert_eq!(ReactiveContext::current().map(|e| e.id()), Some(outer.id()));
        assert!(!failing.is_running());
    }

    #[test]
    fn options_deserialize_with_defaults() {
        let eager: EffectOptions = serde_json::from_str("{}").unwrap();
        let lazy: EffectOptions = serde_json::from_str(r#"{"lazy": true}"#).unwrap();
        assert_eq!(eager, EffectOptions::default());
        assert_eq!(lazy, EffectOptions::lazy());
    }

    #[test]
    fn clones_share_state() {
        let effect1 = Effect::new(|| {});
        let effect2 = effect1.clone();

        assert_eq!(effect1.id(), effect2.id());
        assert!(effect1.ptr_eq(&effect2));

        effect1.run();
        assert_eq!(effect2.run_count(), 2);
    }
}
