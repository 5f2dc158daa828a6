//! Reactive Primitives
//!
//! This module implements dependency tracking over plain data: effects,
//! handles and refs. Together they form the whole of Weft's reactivity.
//!
//! # Concepts
//!
//! ## Effects
//!
//! An [`Effect`] is a computation that re-runs whenever data it read changes.
//! Reads performed while it runs are attributed to it automatically.
//!
//! ## Handles
//!
//! A [`Handle`] is an intercepted view over a [`Target`](crate::Target).
//! Reads through [`Handle::get`] are tracked; writes through [`Handle::set`]
//! re-run the effects that read the written key. Handles come in four modes
//! (see [`Mode`]) and are memoized per target.
//!
//! ## Refs
//!
//! A [`Ref`] is a tracked single-value cell for data that is not an object.
//!
//! # Implementation Notes
//!
//! The running effect lives on a thread-local stack. The dependency graph is
//! keyed by source identity and holds both sources and effects weakly, so
//! it never extends the lifetime of caller data.

mod context;
mod effect;
mod handler;
mod proxy;
mod reference;
mod runtime;
mod subscriber;

pub use context::ReactiveContext;
pub use effect::{effect, effect_with_options, Effect, EffectOptions};
pub use handler::Mode;
pub use proxy::{reactive, readonly, shallow_reactive, shallow_readonly, wrap, Handle};
pub use reference::{is_ref, ref_, Ref};
pub use runtime::{Runtime, Trackable, TriggerOp};
pub use subscriber::{EffectId, SourceId};
