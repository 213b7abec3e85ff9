//! Listener definitions

use std::marker::PhantomData;

/// Identifier handed out when a listener is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub(crate) u64);

impl ListenerId {
    /// Raw numeric value, unique per emitter.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ListenerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

/// Listener trait
///
/// Listeners run synchronously on the emitting thread, in registration order.
pub trait Listener<T>: Send + Sync {
    /// Handle one emitted event
    fn handle(&self, event: &T) -> Result<(), ListenerError>;
}

/// Listener error
#[derive(Debug, Clone, thiserror::Error)]
pub enum ListenerError {
    #[error("Listener failed: {0}")]
    Failed(String),

    #[error("Unexpected event: {0}")]
    UnexpectedEvent(String),
}

impl ListenerError {
    /// Create a generic failure
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// Listener backed by a closure
pub struct FnListener<F, T> {
    callback: F,
    _marker: PhantomData<fn(&T)>,
}

impl<F, T> FnListener<F, T>
where
    F: Fn(&T) -> Result<(), ListenerError> + Send + Sync,
{
    pub fn new(callback: F) -> Self {
        Self {
            callback,
            _marker: PhantomData,
        }
    }
}

impl<F, T> Listener<T> for FnListener<F, T>
where
    F: Fn(&T) -> Result<(), ListenerError> + Send + Sync,
{
    fn handle(&self, event: &T) -> Result<(), ListenerError> {
        (self.callback)(event)
    }
}

/// Create a listener from a closure.
///
/// ```rust
/// use blobdrop_events::{listener_fn, Listener};
///
/// let listener = listener_fn(|value: &u32| {
///     assert_eq!(*value, 7);
///     Ok(())
/// });
/// listener.handle(&7).unwrap();
/// ```
pub fn listener_fn<T, F>(callback: F) -> FnListener<F, T>
where
    F: Fn(&T) -> Result<(), ListenerError> + Send + Sync,
{
    FnListener::new(callback)
}
