//! A monadic either-immediate-or-deferred value.
//!
//! Descriptor factories and guard predicates may complete synchronously or
//! asynchronously; [`FutureOr`] lets callers chain continuations without
//! caring which. If the source value is already resolved, [`FutureOr::and_then`]
//! stays on the calling stack; otherwise it boxes a future. Materialization itself
//! never suspends — `FutureOr` is only ever produced by runtime handler/guard
//! evaluation, never by the builder or validator.

use std::future::Future;
use std::pin::Pin;

/// A boxed, `Send`-able future, the shape every deferred branch of
/// [`FutureOr`] carries.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Either an immediately available value or a future that will produce
/// one later.
pub enum FutureOr<T> {
    Ready(T),
    Pending(BoxFuture<'static, T>),
}

impl<T> FutureOr<T> {
    /// Wraps an already-resolved value.
    pub fn ready(value: T) -> Self {
        Self::Ready(value)
    }

    /// Wraps a future that will resolve later.
    pub fn pending(fut: impl Future<Output = T> + Send + 'static) -> Self {
        Self::Pending(Box::pin(fut))
    }

    /// True if this value is already resolved.
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    /// Resolves this value synchronously, assuming it is `Ready`. Panics
    /// on a `Pending` value — callers that might receive a deferred result
    /// must use [`FutureOr::and_then`] or poll the future directly instead.
    pub fn into_ready(self) -> T {
        match self {
            FutureOr::Ready(value) => value,
            FutureOr::Pending(_) => {
                panic!("FutureOr::into_ready called on a pending value")
            }
        }
    }
}

impl<T: Send + 'static> FutureOr<T> {
    /// The monadic bind the descriptor pipeline chains through: `f` maps
    /// the resolved value into another `FutureOr`, transparently to
    /// whether either side is actually deferred.
    pub fn and_then<U, F>(self, f: F) -> FutureOr<U>
    where
        U: Send + 'static,
        F: FnOnce(T) -> FutureOr<U> + Send + 'static,
    {
        match self {
            FutureOr::Ready(value) => f(value),
            FutureOr::Pending(fut) => FutureOr::Pending(Box::pin(async move {
                let value = fut.await;
                match f(value) {
                    FutureOr::Ready(v) => v,
                    FutureOr::Pending(p) => p.await,
                }
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ready_and_then_stays_synchronous() {
        let value = FutureOr::ready(2).and_then(|v| FutureOr::ready(v * 10));
        assert_eq!(value.into_ready(), 20);
    }

    #[test]
    fn pending_chains_without_panicking_at_construction() {
        let fo = FutureOr::pending(async { 5 });
        assert!(!fo.is_ready());
        let _chained = fo.and_then(|v| FutureOr::ready(v + 1));
    }
}
