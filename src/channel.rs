//! Channel-typed entries.
//!
//! A [`Channel`] is a compile-time contract tagging a target state with a
//! required payload type `P`. It is declarative metadata only — channels
//! are not nodes and never appear in the materialized tree's child lists.
//! Entering a state "through" a channel obliges the source transition to
//! supply a `P`; analogous to the teacher's generic `Transition<T>`
//! payload, generalized from an ECS event type to a plain descriptor-level
//! type parameter.

use std::marker::PhantomData;

use crate::key::StateKey;

/// A type-tagged entry contract: entering `target` through this channel
/// requires a payload of type `P`.
pub struct EntryChannel<P> {
    target: StateKey,
    _payload: PhantomData<fn() -> P>,
}

impl<P> EntryChannel<P> {
    /// Creates a channel naming the state it enters.
    pub fn new(target: impl Into<StateKey>) -> Self {
        Self {
            target: target.into(),
            _payload: PhantomData,
        }
    }

    /// The state this channel enters.
    pub fn target(&self) -> &StateKey {
        &self.target
    }
}

impl<P> Clone for EntryChannel<P> {
    fn clone(&self) -> Self {
        Self {
            target: self.target.clone(),
            _payload: PhantomData,
        }
    }
}
