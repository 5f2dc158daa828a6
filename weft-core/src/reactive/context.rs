//! Reactive Context
//!
//! The reactive context tracks which effect is currently running. This is
//! what makes dependency tracking automatic: when a handle or ref is read,
//! the runtime attributes the read to the effect on top of the stack.
//!
//! # Implementation
//!
//! We use a thread-local stack of running effects. Entering an effect pushes
//! it; the returned guard pops it when dropped, so the previous top becomes
//! active again even if the effect body panics.
//!
//! An effect that is already on the stack cannot be entered a second time.
//! That is the re-entrancy guard that stops an effect which writes to its
//! own dependencies from recursing without bound.

use std::cell::RefCell;

use smallvec::SmallVec;

use super::effect::Effect;
use super::EffectId;

thread_local! {
    static EFFECT_STACK: RefCell<SmallVec<[Effect; 8]>> = RefCell::new(SmallVec::new());
}

/// Guard that pops the effect stack when dropped.
pub struct ReactiveContext {
    effect_id: EffectId,
}

impl ReactiveContext {
    /// Push `effect` onto the stack, making it the active tracker.
    ///
    /// Returns `None` without touching the stack if the effect is already
    /// running further down.
    pub fn enter(effect: &Effect) -> Option<Self> {
        let effect_id = effect.id();
        EFFECT_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            if stack.iter().any(|running| running.id() == effect_id) {
                return None;
            }
            stack.push(effect.clone());
            Some(Self { effect_id })
        })
    }

    /// Check if there is an active effect.
    pub fn is_active() -> bool {
        EFFECT_STACK.with(|stack| !stack.borrow().is_empty())
    }

    /// The effect on top of the stack, if any.
    pub fn current() -> Option<Effect> {
        EFFECT_STACK.with(|stack| stack.borrow().last().cloned())
    }

    /// Whether the effect with this id is anywhere on the stack.
    pub fn contains(effect_id: EffectId) -> bool {
        EFFECT_STACK.with(|stack| stack.borrow().iter().any(|e| e.id() == effect_id))
    }

    /// Current nesting depth.
    pub fn depth() -> usize {
        EFFECT_STACK.with(|stack| stack.borrow().len())
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        // Take the popped effect out of the borrow before it is dropped.
        let popped = EFFECT_STACK.with(|stack| stack.borrow_mut().pop());

        if let Some(effect) = popped {
            debug_assert_eq!(
                effect.id(),
                self.effect_id,
                "ReactiveContext mismatch: expected {:?}, got {:?}",
                self.effect_id,
                effect.id()
            );
        }
    }
}
