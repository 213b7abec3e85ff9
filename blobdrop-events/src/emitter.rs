//! Named event emitter

use crate::listener::{Listener, ListenerError, ListenerId};
use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, error, trace};

type ListenerList<T> = Vec<(ListenerId, Arc<dyn Listener<T>>)>;

/// In-process emitter keyed by event name.
///
/// Cloning is cheap; clones share the same listener table.
pub struct Emitter<T> {
    /// Listeners registered for each event name
    listeners: Arc<DashMap<String, ListenerList<T>>>,

    next_id: Arc<AtomicU64>,

    /// Configuration
    config: Arc<EmitterConfig>,
}

impl<T> Clone for Emitter<T> {
    fn clone(&self) -> Self {
        Self {
            listeners: self.listeners.clone(),
            next_id: self.next_id.clone(),
            config: self.config.clone(),
        }
    }
}

/// Emitter configuration
#[derive(Debug, Clone)]
pub struct EmitterConfig {
    /// Keep invoking listeners after one fails
    pub continue_on_error: bool,

    /// Enable emitter logging
    pub enable_logging: bool,
}

impl Default for EmitterConfig {
    fn default() -> Self {
        Self {
            continue_on_error: true,
            enable_logging: true,
        }
    }
}

impl<T: 'static> Emitter<T> {
    /// Create new emitter
    pub fn new() -> Self {
        Self::with_config(EmitterConfig::default())
    }

    /// Create emitter with custom config
    pub fn with_config(config: EmitterConfig) -> Self {
        Self {
            listeners: Arc::new(DashMap::new()),
            next_id: Arc::new(AtomicU64::new(1)),
            config: Arc::new(config),
        }
    }

    /// Attach a listener to an event name
    ///
    /// # Examples
    ///
    /// ```rust
    /// use blobdrop_events::{Emitter, listener_fn};
    ///
    /// let emitter: Emitter<String> = Emitter::new();
    /// let id = emitter.on("greeting", listener_fn(|_: &String| Ok(())));
    /// assert!(emitter.off("greeting", id));
    /// ```
    pub fn on<L>(&self, name: &str, listener: L) -> ListenerId
    where
        L: Listener<T> + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let listener: Arc<dyn Listener<T>> = Arc::new(listener);

        self.listeners
            .entry(name.to_string())
            .or_default()
            .push((id, listener));

        if self.config.enable_logging {
            debug!(event = name, listener = %id, "Attached listener");
        }

        id
    }

    /// Detach a listener. Returns `false` when it was not attached.
    pub fn off(&self, name: &str, id: ListenerId) -> bool {
        let removed = match self.listeners.get_mut(name) {
            Some(mut entry) => {
                let before = entry.len();
                entry.retain(|(existing, _)| *existing != id);
                entry.len() != before
            }
            None => false,
        };

        self.listeners.remove_if(name, |_, list| list.is_empty());

        if removed && self.config.enable_logging {
            debug!(event = name, listener = %id, "Detached listener");
        }

        removed
    }

    /// Attach a listener that is detached again when the returned guard drops
    pub fn subscribe<L>(&self, name: &str, listener: L) -> Subscription<T>
    where
        L: Listener<T> + 'static,
    {
        let id = self.on(name, listener);
        Subscription {
            emitter: self.clone(),
            name: name.to_string(),
            id,
        }
    }

    /// Emit an event to every listener attached to `name`.
    ///
    /// Listeners run in registration order on the calling thread and may
    /// themselves attach, detach, or emit. Returns the number of listeners
    /// that were invoked.
    pub fn emit(&self, name: &str, event: &T) -> Result<usize, EmitterError> {
        // Snapshot so listeners can re-enter the emitter.
        let listeners: Vec<Arc<dyn Listener<T>>> = match self.listeners.get(name) {
            Some(entry) => entry.iter().map(|(_, listener)| listener.clone()).collect(),
            None => {
                if self.config.enable_logging {
                    trace!(event = name, "No listeners attached");
                }
                return Ok(0);
            }
        };

        if self.config.enable_logging {
            trace!(event = name, listeners = listeners.len(), "Emitting event");
        }

        let mut errors = Vec::new();

        for listener in &listeners {
            if let Err(e) = listener.handle(event) {
                error!(event = name, "Listener failed: {}", e);
                errors.push(e);
                if !self.config.continue_on_error {
                    return Err(EmitterError::ListenersFailed(errors));
                }
            }
        }

        Ok(listeners.len())
    }

    /// Number of listeners attached to an event name
    pub fn listener_count(&self, name: &str) -> usize {
        self.listeners.get(name).map(|l| l.len()).unwrap_or(0)
    }

    /// Detach every listener
    pub fn clear(&self) {
        self.listeners.clear();
        if self.config.enable_logging {
            debug!("Cleared all listeners");
        }
    }
}

impl<T: 'static> Default for Emitter<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Attached listener that detaches itself on drop.
#[must_use = "the listener is detached as soon as the subscription is dropped"]
pub struct Subscription<T: 'static> {
    emitter: Emitter<T>,
    name: String,
    id: ListenerId,
}

impl<T: 'static> Subscription<T> {
    /// Id of the attached listener
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Event name the listener is attached to
    pub fn event_name(&self) -> &str {
        &self.name
    }
}

impl<T: 'static> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.emitter.off(&self.name, self.id);
    }
}

/// Emitter errors
#[derive(Debug, thiserror::Error)]
pub enum EmitterError {
    #[error("Listener failed while emitting: {}", .0.first().map(|e| e.to_string()).unwrap_or_default())]
    ListenersFailed(Vec<ListenerError>),
}

/// Emitter builder
pub struct EmitterBuilder {
    config: EmitterConfig,
}

impl EmitterBuilder {
    /// Create new emitter builder
    pub fn new() -> Self {
        Self {
            config: EmitterConfig::default(),
        }
    }

    /// Enable/disable continue on error
    pub fn continue_on_error(mut self, enabled: bool) -> Self {
        self.config.continue_on_error = enabled;
        self
    }

    /// Enable/disable logging
    pub fn enable_logging(mut self, enabled: bool) -> Self {
        self.config.enable_logging = enabled;
        self
    }

    /// Build the emitter
    pub fn build<T: 'static>(self) -> Emitter<T> {
        Emitter::with_config(self.config)
    }
}

impl Default for EmitterBuilder {
    fn default() -> Self {
        Self::new()
    }
}
