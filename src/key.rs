//! Opaque, equatable identifiers for states.
//!
//! A [`StateKey`] identifies a state with no associated data. A
//! [`DataStateKey<D>`] identifies a state whose instances carry a value of
//! type `D`; the type parameter is a compile-time witness only — equality
//! and hashing are by the underlying identifier, never by `D`.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::sync::Arc;

/// The reserved identity of the implicit root created by
/// [`crate::tree_builder::TreeBuilder::new`]. User states must never use
/// this textual form.
pub const RESERVED_ROOT_SENTINEL: &str = "<_RootState_>";

/// An opaque, cheaply-cloneable identity for a state with no associated
/// data.
#[derive(Clone, Eq)]
pub struct StateKey(Arc<str>);

impl StateKey {
    /// Creates a new key from any string-like value.
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self(name.into())
    }

    /// Returns the textual form of this key.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The reserved implicit-root key. Not constructible by user code
    /// through the normal [`StateKey::new`] path in a well-behaved builder;
    /// [`crate::tree_builder::TreeBuilder`] rejects user states carrying it.
    pub fn reserved_root() -> Self {
        Self::new(RESERVED_ROOT_SENTINEL)
    }

    /// True if this key is the reserved implicit-root sentinel.
    pub fn is_reserved_root(&self) -> bool {
        self.0.as_ref() == RESERVED_ROOT_SENTINEL
    }

    /// Attaches a data-type witness `D`, producing a [`DataStateKey<D>`]
    /// that shares this key's identity.
    pub fn typed<D>(self) -> DataStateKey<D> {
        DataStateKey {
            key: self,
            _data: PhantomData,
        }
    }
}

impl PartialEq for StateKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_ref() == other.0.as_ref()
    }
}

impl Hash for StateKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.as_ref().hash(state);
    }
}

impl fmt::Debug for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StateKey({:?})", self.0)
    }
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for StateKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for StateKey {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// A key that identifies a state whose instances carry a value of type
/// `D`. `D` is a compile-time witness: equality, hashing, and Display all
/// defer to the underlying [`StateKey`].
pub struct DataStateKey<D> {
    key: StateKey,
    _data: PhantomData<fn() -> D>,
}

impl<D> DataStateKey<D> {
    /// Creates a new data key from any string-like value.
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self {
            key: StateKey::new(name),
            _data: PhantomData,
        }
    }

    /// Erases the data-type witness, returning the plain [`StateKey`].
    pub fn erase(&self) -> StateKey {
        self.key.clone()
    }

    /// Returns the textual form of this key.
    pub fn as_str(&self) -> &str {
        self.key.as_str()
    }
}

impl<D> Clone for DataStateKey<D> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            _data: PhantomData,
        }
    }
}

impl<D> PartialEq for DataStateKey<D> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl<D> Eq for DataStateKey<D> {}

impl<D> Hash for DataStateKey<D> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl<D> fmt::Debug for DataStateKey<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DataStateKey({:?})", self.key)
    }
}

impl<D> fmt::Display for DataStateKey<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.key, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_compare_by_identifier_only() {
        let a = StateKey::new("s1");
        let b = StateKey::new("s1");
        let c = StateKey::new("s2");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn data_key_erases_to_matching_plain_key() {
        struct Payload;
        let data_key: DataStateKey<Payload> = DataStateKey::new("with-data");
        let plain = StateKey::new("with-data");
        assert_eq!(data_key.erase(), plain);
    }

    #[test]
    fn reserved_root_sentinel_is_recognized() {
        assert!(StateKey::reserved_root().is_reserved_root());
        assert!(!StateKey::new("s1").is_reserved_root());
    }
}
