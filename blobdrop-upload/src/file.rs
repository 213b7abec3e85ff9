//! File records and the store they are looked up from.

use bytes::Bytes;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::UploadOptions;

/// Identifier of a file within the caller's file store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(String);

impl FileId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for FileId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for FileId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for FileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A file queued for upload.
#[derive(Debug, Clone)]
pub struct FileRecord {
    /// Identifier, unique within a batch.
    pub id: FileId,
    /// Destination object key.
    pub name: String,
    /// Payload.
    pub data: Bytes,
    /// Declared total size in bytes.
    pub size: u64,
    /// MIME type guessed from the name.
    pub content_type: Option<String>,
    /// Per-file option override.
    pub options: Option<UploadOptions>,
}

impl FileRecord {
    /// Create a record whose size is the payload length.
    pub fn new(id: impl Into<FileId>, name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        let name = name.into();
        let data = data.into();
        let content_type = mime_guess::from_path(&name)
            .first()
            .map(|mime| mime.to_string());

        Self {
            id: id.into(),
            size: data.len() as u64,
            name,
            data,
            content_type,
            options: None,
        }
    }

    /// Attach a per-file option override.
    pub fn with_options(mut self, options: UploadOptions) -> Self {
        self.options = Some(options);
        self
    }

    /// Declare a size different from the payload length.
    pub fn with_size(mut self, size: u64) -> Self {
        self.size = size;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Source of file records for a batch.
///
/// Implementations must return the same record for an id for as long as a
/// batch referencing it is running.
pub trait FileStore: Send + Sync {
    fn get_file(&self, id: &FileId) -> Option<Arc<FileRecord>>;
}

/// File store held in memory.
#[derive(Default)]
pub struct MemoryFileStore {
    files: RwLock<HashMap<FileId, Arc<FileRecord>>>,
}

impl MemoryFileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file, replacing any record with the same id. Returns its id.
    pub fn add(&self, file: FileRecord) -> FileId {
        let id = file.id.clone();
        self.files.write().insert(id.clone(), Arc::new(file));
        id
    }

    pub fn remove(&self, id: &FileId) -> Option<Arc<FileRecord>> {
        self.files.write().remove(id)
    }

    pub fn len(&self) -> usize {
        self.files.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.read().is_empty()
    }
}

impl FileStore for MemoryFileStore {
    fn get_file(&self, id: &FileId) -> Option<Arc<FileRecord>> {
        self.files.read().get(id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_record_from_bytes() {
        let file = FileRecord::new("f1", "photos/cat.png", &b"\x89PNG"[..]);
        assert_eq!(file.id.as_str(), "f1");
        assert_eq!(file.size, 4);
        assert_eq!(file.content_type.as_deref(), Some("image/png"));
        assert!(file.options.is_none());
    }

    #[test]
    fn test_unknown_extension_has_no_content_type() {
        let file = FileRecord::new("f1", "README", "hello");
        assert!(file.content_type.is_none());
    }

    #[test]
    fn test_memory_file_store() {
        let store = MemoryFileStore::new();
        assert!(store.is_empty());

        let id = store.add(FileRecord::new("f1", "a.txt", "abc"));
        assert_eq!(store.len(), 1);

        let first = store.get_file(&id).unwrap();
        let second = store.get_file(&id).unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        assert!(store.remove(&id).is_some());
        assert!(store.get_file(&id).is_none());
    }
}
