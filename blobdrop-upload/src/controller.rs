//! Upload lifecycle controller.
//!
//! Drives a batch of files through the storage backend one at a time,
//! relaying progress and a single terminal notification per file.

use blobdrop_config::Validate;
use blobdrop_events::{Emitter, listener_fn};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::{
    BlobStore, CancellationRegistry, FileId, FileRecord, FileStore, ProgressRecord, Result,
    TransferProgress, UploadError, UploadEvent, UploadOptions, UploadRequest, UploadResult,
    UploadSink, UploaderConfig,
};

/// How one file's upload ended.
#[derive(Debug, Clone)]
pub enum Outcome {
    Succeeded(UploadResult),
    Failed(Arc<UploadError>),
    /// Stopped on request. Not an error.
    Cancelled,
}

impl Outcome {
    pub fn is_succeeded(&self) -> bool {
        matches!(self, Self::Succeeded(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Per-file outcomes of one batch, in dispatch order.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    outcomes: Vec<(FileId, Outcome)>,
}

impl BatchReport {
    fn push(&mut self, file_id: FileId, outcome: Outcome) {
        self.outcomes.push((file_id, outcome));
    }

    pub fn outcomes(&self) -> &[(FileId, Outcome)] {
        &self.outcomes
    }

    /// Outcome of the first dispatch of `file_id`.
    pub fn outcome(&self, file_id: &FileId) -> Option<&Outcome> {
        self.outcomes
            .iter()
            .find(|(id, _)| id == file_id)
            .map(|(_, outcome)| outcome)
    }

    pub fn succeeded(&self) -> Vec<&FileId> {
        self.matching(Outcome::is_succeeded)
    }

    pub fn failed(&self) -> Vec<&FileId> {
        self.matching(Outcome::is_failed)
    }

    pub fn cancelled(&self) -> Vec<&FileId> {
        self.matching(Outcome::is_cancelled)
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    fn matching(&self, predicate: fn(&Outcome) -> bool) -> Vec<&FileId> {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| predicate(outcome))
            .map(|(id, _)| id)
            .collect()
    }
}

/// Orchestrates batches of uploads against one storage backend.
///
/// `signals` is the removal-signal source: while a batch runs, every
/// [`UploadEvent::FileRemoved`] emitted on it under
/// [`UploadEvent::FILE_REMOVED`] cancels that file's upload.
pub struct UploadController {
    store: Arc<dyn BlobStore>,
    defaults: UploadOptions,
    signals: Emitter<UploadEvent>,
    registry: Arc<CancellationRegistry>,
}

impl UploadController {
    pub fn new(
        store: Arc<dyn BlobStore>,
        defaults: UploadOptions,
        signals: Emitter<UploadEvent>,
    ) -> Self {
        Self {
            store,
            defaults,
            signals,
            registry: Arc::new(CancellationRegistry::new()),
        }
    }

    /// Build from a validated uploader configuration.
    pub fn from_config(
        config: &UploaderConfig,
        store: Arc<dyn BlobStore>,
        signals: Emitter<UploadEvent>,
    ) -> Result<Self> {
        config.validate()?;
        info!(uploader = %config.id, container = %config.container, "Configured upload controller");
        Ok(Self::new(store, config.default_options.clone(), signals))
    }

    pub fn defaults(&self) -> &UploadOptions {
        &self.defaults
    }

    pub fn signals(&self) -> &Emitter<UploadEvent> {
        &self.signals
    }

    /// Cancel the in-flight upload of `file_id`. Returns `false` when none is live.
    pub fn cancel(&self, file_id: &FileId) -> bool {
        self.registry.cancel(file_id)
    }

    /// Number of uploads currently holding a cancellation handle.
    pub fn live_uploads(&self) -> usize {
        self.registry.len()
    }

    /// Upload every file in `file_ids`, strictly in order.
    ///
    /// Per-file failures and cancellations are reported to `sink` and in the
    /// returned report. Only an unknown file id or a file already being
    /// uploaded by another batch aborts the call.
    pub async fn run(
        &self,
        file_ids: &[FileId],
        files: &dyn FileStore,
        sink: &dyn UploadSink,
    ) -> Result<BatchReport> {
        let removed: Arc<Mutex<HashSet<FileId>>> = Arc::default();

        let _removal = {
            let registry = self.registry.clone();
            let removed = removed.clone();
            self.signals.subscribe(
                UploadEvent::FILE_REMOVED,
                listener_fn(move |event: &UploadEvent| {
                    if let UploadEvent::FileRemoved { file_id } = event {
                        removed.lock().insert(file_id.clone());
                        registry.cancel(file_id);
                    }
                    Ok(())
                }),
            )
        };

        info!(files = file_ids.len(), "Starting upload batch");

        let mut report = BatchReport::default();

        for file_id in file_ids {
            let file = files
                .get_file(file_id)
                .ok_or_else(|| UploadError::FileNotFound(file_id.clone()))?;

            let removed_early = removed.lock().contains(file_id);
            let outcome = if removed_early {
                debug!(file_id = %file_id, "File removed before dispatch");
                sink.notify(UploadEvent::Cancelled { file });
                Outcome::Cancelled
            } else {
                self.upload_file(file, &removed, sink).await?
            };

            report.push(file_id.clone(), outcome);
        }

        info!(
            succeeded = report.succeeded().len(),
            failed = report.failed().len(),
            cancelled = report.cancelled().len(),
            "Upload batch finished"
        );

        Ok(report)
    }

    async fn upload_file(
        &self,
        file: Arc<FileRecord>,
        removed: &Mutex<HashSet<FileId>>,
        sink: &dyn UploadSink,
    ) -> Result<Outcome> {
        let registration = self.registry.register(&file.id)?;

        // A removal that landed before the token existed found nothing to cancel.
        if removed.lock().contains(&file.id) {
            debug!(file_id = %file.id, "File removed before registration");
            sink.notify(UploadEvent::Cancelled { file });
            return Ok(Outcome::Cancelled);
        }

        sink.notify(UploadEvent::Started { file: file.clone() });
        let options = UploadOptions::resolve(&self.defaults, file.options.as_ref());

        if registration.is_cancelled() {
            info!(file_id = %file.id, "Upload cancelled before transfer");
            sink.notify(UploadEvent::Cancelled { file });
            return Ok(Outcome::Cancelled);
        }

        let progress_file = file.clone();
        let on_progress = move |tick: TransferProgress| {
            sink.notify(UploadEvent::Progress {
                progress: ProgressRecord::adapt(tick, progress_file.size),
                file: progress_file.clone(),
            });
        };

        let request = UploadRequest::new(options, registration.token().clone(), &on_progress)
            .with_content_type(file.content_type.clone());

        debug!(file_id = %file.id, key = %file.name, size = file.size, "Uploading file");

        let settled = self
            .store
            .upload_object(&file.name, file.data.clone(), request)
            .await;

        let outcome = match settled {
            Ok(result) => {
                info!(file_id = %file.id, key = %result.key, size = result.size, "Upload succeeded");
                sink.notify(UploadEvent::Succeeded {
                    file,
                    result: result.clone(),
                });
                Outcome::Succeeded(result)
            }
            Err(e) if e.is_cancelled() => {
                info!(file_id = %file.id, "Upload cancelled");
                sink.notify(UploadEvent::Cancelled { file });
                Outcome::Cancelled
            }
            Err(e) => {
                warn!(file_id = %file.id, key = %file.name, "Upload failed: {}", e);
                let error = Arc::new(e);
                sink.notify(UploadEvent::Failed {
                    file,
                    error: error.clone(),
                });
                Outcome::Failed(error)
            }
        };

        drop(registration);
        Ok(outcome)
    }
}
