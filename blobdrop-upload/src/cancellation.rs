//! Per-file cancellation handles for in-flight uploads.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{FileId, Result, UploadError};

/// Live cancellation tokens, keyed by file id.
///
/// At most one token exists per file. Each operation holds the lock only
/// for the map access, so `cancel` is safe to call from any thread while an
/// upload is suspended.
#[derive(Debug, Default)]
pub struct CancellationRegistry {
    tokens: Mutex<HashMap<FileId, CancellationToken>>,
}

impl CancellationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a fresh token for `file_id`.
    ///
    /// Fails with [`UploadError::AlreadyRegistered`] when the file already
    /// has a live token. The returned guard unregisters on drop.
    pub fn register(&self, file_id: &FileId) -> Result<Registration<'_>> {
        let token = CancellationToken::new();

        match self.tokens.lock().entry(file_id.clone()) {
            Entry::Occupied(_) => return Err(UploadError::AlreadyRegistered(file_id.clone())),
            Entry::Vacant(slot) => {
                slot.insert(token.clone());
            }
        }

        debug!(file_id = %file_id, "Registered cancellation handle");

        Ok(Registration {
            registry: self,
            file_id: file_id.clone(),
            token,
        })
    }

    /// Signal the token for `file_id`. Returns `false` when none is live.
    pub fn cancel(&self, file_id: &FileId) -> bool {
        let token = self.tokens.lock().get(file_id).cloned();

        match token {
            Some(token) => {
                token.cancel();
                debug!(file_id = %file_id, "Cancellation requested");
                true
            }
            None => false,
        }
    }

    /// Remove the token for `file_id`. Returns `false` when none was live.
    pub fn unregister(&self, file_id: &FileId) -> bool {
        let removed = self.tokens.lock().remove(file_id).is_some();
        if removed {
            debug!(file_id = %file_id, "Unregistered cancellation handle");
        }
        removed
    }

    pub fn is_registered(&self, file_id: &FileId) -> bool {
        self.tokens.lock().contains_key(file_id)
    }

    /// Number of live handles.
    pub fn len(&self) -> usize {
        self.tokens.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.lock().is_empty()
    }
}

/// A registered handle. Dropping it unregisters the file.
#[must_use = "the handle is unregistered as soon as the registration is dropped"]
pub struct Registration<'a> {
    registry: &'a CancellationRegistry,
    file_id: FileId,
    token: CancellationToken,
}

impl Registration<'_> {
    pub fn file_id(&self) -> &FileId {
        &self.file_id
    }

    /// The signal handed to the storage backend.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        self.registry.unregister(&self.file_id);
    }
}
