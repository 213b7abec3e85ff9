//! Upload notifications and the sinks that receive them.

use blobdrop_events::Emitter;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::warn;

use crate::{FileId, FileRecord, ProgressRecord, UploadError, UploadResult};

/// A lifecycle notification for one file.
#[derive(Debug, Clone)]
pub enum UploadEvent {
    /// The file's upload is about to begin.
    Started { file: Arc<FileRecord> },
    /// Bytes were transferred.
    Progress {
        file: Arc<FileRecord>,
        progress: ProgressRecord,
    },
    /// The object was committed.
    Succeeded {
        file: Arc<FileRecord>,
        result: UploadResult,
    },
    /// The upload failed for a reason other than cancellation.
    Failed {
        file: Arc<FileRecord>,
        error: Arc<UploadError>,
    },
    /// The upload was stopped on request.
    Cancelled { file: Arc<FileRecord> },
    /// The caller removed a file; any upload for it should stop.
    FileRemoved { file_id: FileId },
}

impl UploadEvent {
    pub const STARTED: &'static str = "upload-started";
    pub const PROGRESS: &'static str = "upload-progress";
    pub const SUCCEEDED: &'static str = "upload-success";
    pub const FAILED: &'static str = "upload-error";
    pub const CANCELLED: &'static str = "upload-cancelled";
    pub const FILE_REMOVED: &'static str = "file-removed";

    /// Build a removal signal.
    pub fn file_removed(file_id: impl Into<FileId>) -> Self {
        Self::FileRemoved {
            file_id: file_id.into(),
        }
    }

    /// Event name this notification is emitted under.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Started { .. } => Self::STARTED,
            Self::Progress { .. } => Self::PROGRESS,
            Self::Succeeded { .. } => Self::SUCCEEDED,
            Self::Failed { .. } => Self::FAILED,
            Self::Cancelled { .. } => Self::CANCELLED,
            Self::FileRemoved { .. } => Self::FILE_REMOVED,
        }
    }

    pub fn file_id(&self) -> &FileId {
        match self {
            Self::Started { file }
            | Self::Progress { file, .. }
            | Self::Succeeded { file, .. }
            | Self::Failed { file, .. }
            | Self::Cancelled { file } => &file.id,
            Self::FileRemoved { file_id } => file_id,
        }
    }

    /// Whether this notification ends a file's lifecycle.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Succeeded { .. } | Self::Failed { .. } | Self::Cancelled { .. }
        )
    }
}

/// Receiver of upload notifications. Fire-and-forget.
pub trait UploadSink: Send + Sync {
    fn notify(&self, event: UploadEvent);
}

/// Sink that re-emits every notification on an emitter under its name.
#[derive(Clone)]
pub struct EmitterSink {
    emitter: Emitter<UploadEvent>,
}

impl EmitterSink {
    pub fn new(emitter: Emitter<UploadEvent>) -> Self {
        Self { emitter }
    }

    pub fn emitter(&self) -> &Emitter<UploadEvent> {
        &self.emitter
    }
}

impl UploadSink for EmitterSink {
    fn notify(&self, event: UploadEvent) {
        if let Err(e) = self.emitter.emit(event.name(), &event) {
            warn!(
                event = event.name(),
                file_id = %event.file_id(),
                "Upload notification listener failed: {}",
                e
            );
        }
    }
}

/// Sink that keeps every notification in arrival order.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<UploadEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<UploadEvent> {
        self.events.lock().clone()
    }

    /// Event names in arrival order.
    pub fn names(&self) -> Vec<&'static str> {
        self.events.lock().iter().map(UploadEvent::name).collect()
    }

    /// Notifications for one file, in arrival order.
    pub fn events_for(&self, file_id: &FileId) -> Vec<UploadEvent> {
        self.events
            .lock()
            .iter()
            .filter(|event| event.file_id() == file_id)
            .cloned()
            .collect()
    }

    /// Event names for one file, in arrival order.
    pub fn names_for(&self, file_id: &FileId) -> Vec<&'static str> {
        self.events
            .lock()
            .iter()
            .filter(|event| event.file_id() == file_id)
            .map(UploadEvent::name)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl UploadSink for RecordingSink {
    fn notify(&self, event: UploadEvent) {
        self.events.lock().push(event);
    }
}
