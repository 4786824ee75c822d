//! # Subscriber handles with stable identity.
//!
//! Closures have no reproducible identity, so the bus never compares them.
//! Instead every handler is wrapped once in a [`Subscriber`] handle that
//! carries a process-unique [`SubscriberId`]. Clones of a handle share the id;
//! two handles built from identical closures do not.
//!
//! [`SubscriberFn`] is the function-backed handler: it wraps a closure
//! `F: Fn(String, Value) -> Fut` and produces a fresh future per event.
//!
//! ## Example
//! ```rust
//! use logbus::{Subscriber, SubscriberError};
//! use serde_json::Value;
//!
//! let email = Subscriber::from_fn("email", |topic: String, payload: Value| async move {
//!     let _ = (topic, payload); // send the mail...
//!     Ok::<_, SubscriberError>(())
//! });
//!
//! let again = email.clone();
//! assert_eq!(email, again);
//! assert_eq!(email.name(), "email");
//! ```

use std::borrow::Cow;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::SubscriberError;
use crate::subscribers::Subscribe;

/// Global counter for subscriber ids.
static SUBSCRIBER_SEQ: AtomicU64 = AtomicU64::new(1);

/// Stable identity of a [`Subscriber`] handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl SubscriberId {
    fn next() -> Self {
        Self(SUBSCRIBER_SEQ.fetch_add(1, AtomicOrdering::Relaxed))
    }

    /// Raw numeric value.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub#{}", self.0)
    }
}

/// Cloneable handle to a registered handler.
///
/// Equality and hashing use [`SubscriberId`] only.
#[derive(Clone)]
pub struct Subscriber {
    id: SubscriberId,
    inner: Arc<dyn Subscribe>,
}

impl Subscriber {
    /// Wraps a handler, assigning it a fresh identity.
    pub fn new<S: Subscribe>(handler: S) -> Self {
        Self::from_arc(Arc::new(handler))
    }

    /// Wraps an already shared handler, assigning it a fresh identity.
    pub fn from_arc(inner: Arc<dyn Subscribe>) -> Self {
        Self {
            id: SubscriberId::next(),
            inner,
        }
    }

    /// Builds a handle around a closure; see [`SubscriberFn`].
    pub fn from_fn<F, Fut>(name: impl Into<Cow<'static, str>>, f: F) -> Self
    where
        F: Fn(String, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), SubscriberError>> + Send + 'static,
    {
        Self::new(SubscriberFn::new(name, f))
    }

    /// Stable identity of this handle.
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Diagnostic name of the wrapped handler.
    pub fn name(&self) -> &str {
        self.inner.name()
    }

    pub(crate) async fn call(&self, topic: &str, payload: &Value) -> Result<(), SubscriberError> {
        self.inner.on_event(topic, payload).await
    }
}

impl PartialEq for Subscriber {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Subscriber {}

impl std::hash::Hash for Subscriber {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscriber")
            .field("id", &self.id)
            .field("name", &self.name())
            .finish()
    }
}

/// Function-backed handler.
///
/// Wraps a closure that *creates* a new future per event. Shared state, if
/// any, should be captured explicitly as `Arc<...>`.
pub struct SubscriberFn<F> {
    name: Cow<'static, str>,
    f: F,
}

impl<F> SubscriberFn<F> {
    /// Creates a new function-backed handler.
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

#[async_trait]
impl<F, Fut> Subscribe for SubscriberFn<F>
where
    F: Fn(String, Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), SubscriberError>> + Send + 'static,
{
    async fn on_event(&self, topic: &str, payload: &Value) -> Result<(), SubscriberError> {
        (self.f)(topic.to_owned(), payload.clone()).await
    }

    fn name(&self) -> &str {
        &self.name
    }
}
