//! Weft Core
//!
//! This crate provides the core runtime for Weft, a minimal reactive-state
//! library. Wrap plain data in a handle, read it inside an effect, and the
//! effect re-runs whenever the data it read is written.
//!
//! It implements:
//!
//! - A dynamic data model (records, arrays, scalars)
//! - Effects with an explicit execution stack
//! - A target → key → effect dependency graph
//! - Reactive, shallow and readonly handles, memoized per target
//! - Single-value reactive boxes (refs)
//!
//! # Architecture
//!
//! - `value`: the data handles wrap, and its JSON bridge
//! - `reactive`: effects, dependency tracking, handles and refs
//! - `error`: the crate error type
//!
//! # Example
//!
//! ```rust,ignore
//! use serde_json::json;
//! use weft_core::{effect, reactive, Target};
//!
//! let state = reactive(&Target::from_json(json!({"count": 0})).unwrap());
//!
//! let view = state.clone();
//! let _effect = effect(move || {
//!     println!("Count: {}", view.get("count"));
//! });
//!
//! state.set("count", 5)?;
//! // Effect runs again, prints: "Count: 5"
//! ```

pub mod error;
pub mod reactive;
pub mod value;

pub use error::{Error, Result};
pub use reactive::{
    effect, effect_with_options, is_ref, reactive, readonly, ref_, shallow_reactive,
    shallow_readonly, wrap, Effect, EffectId, EffectOptions, Handle, Mode, Ref, Runtime,
    SourceId, Trackable, TriggerOp,
};
pub use value::{has_changed, Key, Target, Value, MAX_ARRAY_LENGTH};
