//! Integration tests for batch upload workflows.
//!
//! These tests drive the controller end to end through the public facade.

use async_trait::async_trait;
use blobdrop::prelude::*;
use blobdrop::{Result, TransferProgress, UploadRequest, blobdrop_log};
use bytes::Bytes;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Notify;

// =============================================================================
// Test doubles
// =============================================================================

/// Counts calls, then delegates to an in-memory container.
struct CountingStore {
    inner: MemoryBlobStore,
    calls: AtomicUsize,
}

impl CountingStore {
    fn new() -> Self {
        Self {
            inner: MemoryBlobStore::new("uploads"),
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BlobStore for CountingStore {
    async fn upload_object(
        &self,
        key: &str,
        data: Bytes,
        request: UploadRequest<'_>,
    ) -> Result<UploadResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.upload_object(key, data, request).await
    }
}

/// Reports one tick, signals `started`, then waits for cancellation.
struct GatedStore {
    started: Arc<Notify>,
}

#[async_trait]
impl BlobStore for GatedStore {
    async fn upload_object(
        &self,
        key: &str,
        _data: Bytes,
        request: UploadRequest<'_>,
    ) -> Result<UploadResult> {
        request.report(1);
        self.started.notify_one();
        request.signal.cancelled().await;
        Err(UploadError::Cancelled(key.to_string()))
    }
}

/// Fails keys starting with `broken`, uploads everything else in memory.
struct FlakyStore {
    inner: MemoryBlobStore,
}

#[async_trait]
impl BlobStore for FlakyStore {
    async fn upload_object(
        &self,
        key: &str,
        data: Bytes,
        request: UploadRequest<'_>,
    ) -> Result<UploadResult> {
        if key.starts_with("broken") {
            return Err(UploadError::PermissionDenied("SAS token expired".into()));
        }
        self.inner.upload_object(key, data, request).await
    }
}

fn signals() -> Emitter<UploadEvent> {
    Emitter::new()
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test]
async fn test_single_file_with_defaults() {
    let store = Arc::new(MemoryBlobStore::new("uploads"));
    let controller = UploadController::new(
        store.clone(),
        UploadOptions::new().tier(AccessTier::Hot),
        signals(),
    );
    let files = MemoryFileStore::new();
    let id = files.add(FileRecord::new("file-1", "cat.png", vec![1u8; 32]));
    let sink = RecordingSink::new();

    assert_eq!(controller.live_uploads(), 0);
    let report = controller.run(&[id.clone()], &files, &sink).await.unwrap();
    assert_eq!(controller.live_uploads(), 0);

    assert_eq!(report.succeeded(), vec![&id]);
    assert_eq!(store.object("cat.png").unwrap().tier, Some(AccessTier::Hot));

    let names = sink.names();
    assert_eq!(names.first(), Some(&"upload-started"));
    assert_eq!(names.last(), Some(&"upload-success"));
    assert!(
        names[1..names.len() - 1]
            .iter()
            .all(|name| *name == "upload-progress")
    );
}

#[tokio::test]
async fn test_removal_between_files_prevents_second_upload() {
    let store = Arc::new(CountingStore::new());
    let emitter = signals();
    let controller = UploadController::new(store.clone(), UploadOptions::new(), emitter.clone());
    let files = MemoryFileStore::new();
    let first = files.add(FileRecord::new("f1", "one.txt", "first"));
    let second = files.add(FileRecord::new("f2", "two.txt", "second"));

    // The removal is emitted from inside the success notification of f1.
    let remover = emitter.clone();
    let _on_success = emitter.subscribe(
        UploadEvent::SUCCEEDED,
        listener_fn(move |event: &UploadEvent| {
            if event.file_id().as_str() == "f1" {
                remover
                    .emit(UploadEvent::FILE_REMOVED, &UploadEvent::file_removed("f2"))
                    .map_err(|e| blobdrop_events::ListenerError::failed(e.to_string()))?;
            }
            Ok(())
        }),
    );

    let sink = EmitterSink::new(emitter.clone());
    let recorded = Arc::new(RecordingSink::new());
    let recorder = recorded.clone();
    let _all: Vec<Subscription<UploadEvent>> = [
        UploadEvent::STARTED,
        UploadEvent::SUCCEEDED,
        UploadEvent::FAILED,
        UploadEvent::CANCELLED,
    ]
    .into_iter()
    .map(|name| {
        let recorder = recorder.clone();
        emitter.subscribe(
            name,
            listener_fn(move |event: &UploadEvent| {
                recorder.notify(event.clone());
                Ok(())
            }),
        )
    })
    .collect();

    let report = controller
        .run(&[first.clone(), second.clone()], &files, &sink)
        .await
        .unwrap();

    assert_eq!(report.succeeded(), vec![&first]);
    assert_eq!(report.cancelled(), vec![&second]);
    assert!(!recorded.names_for(&second).contains(&"upload-success"));
    assert!(!recorded.names_for(&second).contains(&"upload-started"));
    assert_eq!(store.calls(), 1);
    assert!(!store.inner.exists("two.txt"));
}

#[tokio::test]
async fn test_field_level_override() {
    let store = Arc::new(MemoryBlobStore::new("uploads"));
    let controller = UploadController::new(
        store.clone(),
        UploadOptions::new().metadata("b", "2").tier(AccessTier::Cool),
        signals(),
    );
    let files = MemoryFileStore::new();
    let id = files.add(
        FileRecord::new("f1", "doc.pdf", "pdf").with_options(UploadOptions::new().metadata("a", "1")),
    );

    controller
        .run(&[id], &files, &RecordingSink::new())
        .await
        .unwrap();

    let blob = store.object("doc.pdf").unwrap();
    let expected: BTreeMap<String, String> =
        [("a".to_string(), "1".to_string())].into_iter().collect();
    assert_eq!(blob.metadata, expected);
    assert_eq!(blob.tier, Some(AccessTier::Cool));
}

#[tokio::test]
async fn test_error_does_not_abort_remaining_files() {
    let store = Arc::new(FlakyStore {
        inner: MemoryBlobStore::new("uploads"),
    });
    let controller = UploadController::new(store.clone(), UploadOptions::new(), signals());
    let files = MemoryFileStore::new();
    let bad = files.add(FileRecord::new("f1", "broken.txt", "x"));
    let good = files.add(FileRecord::new("f2", "fine.txt", "y"));
    let sink = RecordingSink::new();

    let report = controller
        .run(&[bad.clone(), good.clone()], &files, &sink)
        .await
        .unwrap();

    assert_eq!(report.failed(), vec![&bad]);
    assert_eq!(report.succeeded(), vec![&good]);

    let failure = sink
        .events_for(&bad)
        .into_iter()
        .find_map(|event| match event {
            UploadEvent::Failed { error, .. } => Some(error),
            _ => None,
        })
        .unwrap();
    assert!(matches!(*failure, UploadError::PermissionDenied(_)));

    // Terminal notifications follow dispatch order.
    let terminals: Vec<String> = sink
        .events()
        .iter()
        .filter(|event| event.is_terminal())
        .map(|event| event.file_id().to_string())
        .collect();
    assert_eq!(terminals, vec!["f1", "f2"]);
    assert!(store.inner.exists("fine.txt"));
}

// =============================================================================
// Cancellation
// =============================================================================

#[tokio::test]
async fn test_removal_signal_cancels_in_flight_upload() {
    let started = Arc::new(Notify::new());
    let store = Arc::new(GatedStore {
        started: started.clone(),
    });
    let emitter = signals();
    let controller = UploadController::new(store, UploadOptions::new(), emitter.clone());
    let files = MemoryFileStore::new();
    let id = files.add(FileRecord::new("f1", "video.mp4", vec![0u8; 1024]));
    let sink = RecordingSink::new();

    let ids = [id.clone()];
    let run = controller.run(&ids, &files, &sink);
    let remove = async {
        started.notified().await;
        assert_eq!(controller.live_uploads(), 1);
        emitter
            .emit(UploadEvent::FILE_REMOVED, &UploadEvent::file_removed("f1"))
            .unwrap();
    };

    let (report, _) = tokio::join!(run, remove);
    let report = report.unwrap();

    assert_eq!(report.cancelled(), vec![&id]);
    assert_eq!(
        sink.names(),
        vec!["upload-started", "upload-progress", "upload-cancelled"]
    );
    assert_eq!(controller.live_uploads(), 0);
    assert_eq!(emitter.listener_count(UploadEvent::FILE_REMOVED), 0);
}

#[tokio::test]
async fn test_progress_listener_can_cancel_through_emitter() {
    let store = Arc::new(MemoryBlobStore::new("uploads"));
    let emitter = signals();
    let controller = UploadController::new(
        store.clone(),
        UploadOptions::new().max_single_shot_size(16).block_size(16),
        emitter.clone(),
    );
    let files = MemoryFileStore::new();
    let id = files.add(FileRecord::new("f1", "big.bin", vec![9u8; 128]));

    let remover = emitter.clone();
    let _halfway = emitter.subscribe(
        UploadEvent::PROGRESS,
        listener_fn(move |event: &UploadEvent| {
            if let UploadEvent::Progress { file, progress } = event {
                if progress.percentage() >= 0.5 {
                    let _ = remover.emit(
                        UploadEvent::FILE_REMOVED,
                        &UploadEvent::file_removed(file.id.clone()),
                    );
                }
            }
            Ok(())
        }),
    );

    let report = controller
        .run(&[id.clone()], &files, &EmitterSink::new(emitter.clone()))
        .await
        .unwrap();

    assert_eq!(report.cancelled(), vec![&id]);
    assert!(!store.exists("big.bin"));
}

#[tokio::test]
async fn test_cancel_after_success_is_noop() {
    let store = Arc::new(MemoryBlobStore::new("uploads"));
    let controller = UploadController::new(store.clone(), UploadOptions::new(), signals());
    let files = MemoryFileStore::new();
    let id = files.add(FileRecord::new("f1", "a.txt", "a"));
    let sink = RecordingSink::new();

    controller.run(&[id.clone()], &files, &sink).await.unwrap();

    assert!(!controller.cancel(&id));
    controller
        .signals()
        .emit(UploadEvent::FILE_REMOVED, &UploadEvent::file_removed("f1"))
        .unwrap();

    assert_eq!(sink.names_for(&id).last(), Some(&"upload-success"));
    assert!(store.exists("a.txt"));
}

#[tokio::test]
async fn test_same_file_in_two_live_batches_is_rejected() {
    let started = Arc::new(Notify::new());
    let store = Arc::new(GatedStore {
        started: started.clone(),
    });
    let controller = UploadController::new(store, UploadOptions::new(), signals());
    let files = MemoryFileStore::new();
    let id = files.add(FileRecord::new("f1", "a.txt", "a"));
    let sink = RecordingSink::new();

    let ids = [id.clone()];
    let first = controller.run(&ids, &files, &sink);
    let second = async {
        started.notified().await;
        let result = controller.run(&[id.clone()], &files, &sink).await;
        controller.cancel(&id);
        result
    };

    let (first, second) = tokio::join!(first, second);

    assert!(second.unwrap_err().is_invariant_violation());
    assert_eq!(first.unwrap().cancelled(), vec![&id]);
    assert_eq!(
        sink.names().iter().filter(|name| **name == "upload-started").count(),
        1
    );
    assert_eq!(controller.live_uploads(), 0);
    assert_eq!(controller.signals().listener_count(UploadEvent::FILE_REMOVED), 0);
}

// =============================================================================
// Lookup, cleanup and ordering
// =============================================================================

#[tokio::test]
async fn test_unknown_file_escapes_and_cleans_up() {
    let store = Arc::new(CountingStore::new());
    let controller = UploadController::new(store.clone(), UploadOptions::new(), signals());
    let files = MemoryFileStore::new();
    let known = files.add(FileRecord::new("f1", "a.txt", "a"));
    let sink = RecordingSink::new();

    let err = controller
        .run(&[known.clone(), FileId::from("missing")], &files, &sink)
        .await
        .unwrap_err();

    assert!(matches!(err, UploadError::FileNotFound(ref id) if id.as_str() == "missing"));
    assert_eq!(store.calls(), 1);
    assert_eq!(sink.names_for(&known).last(), Some(&"upload-success"));
    assert_eq!(controller.live_uploads(), 0);
    assert_eq!(controller.signals().listener_count(UploadEvent::FILE_REMOVED), 0);
}

#[tokio::test]
async fn test_progress_is_monotonic_and_precedes_terminal() {
    let store = Arc::new(MemoryBlobStore::new("uploads"));
    let controller = UploadController::new(
        store,
        UploadOptions::new().max_single_shot_size(10).block_size(7),
        signals(),
    );
    let files = MemoryFileStore::new();
    let a = files.add(FileRecord::new("a", "a.bin", vec![1u8; 50]));
    let b = files.add(FileRecord::new("b", "b.bin", vec![2u8; 5]));
    let sink = RecordingSink::new();

    controller.run(&[a.clone(), b.clone()], &files, &sink).await.unwrap();

    for id in [&a, &b] {
        let events = sink.events_for(id);
        let terminal = events.iter().position(UploadEvent::is_terminal).unwrap();
        assert_eq!(terminal, events.len() - 1);

        let uploaded: Vec<u64> = events
            .iter()
            .filter_map(|event| match event {
                UploadEvent::Progress { progress, .. } => Some(progress.bytes_uploaded),
                _ => None,
            })
            .collect();
        assert!(uploaded.windows(2).all(|pair| pair[0] <= pair[1]));
    }

    assert!(sink.events_for(&a).iter().filter(|e| e.name() == "upload-progress").count() > 1);
}

#[tokio::test]
async fn test_empty_batch() {
    let controller = UploadController::new(
        Arc::new(MemoryBlobStore::new("uploads")),
        UploadOptions::new(),
        signals(),
    );
    let sink = RecordingSink::new();

    let report = controller
        .run(&[], &MemoryFileStore::new(), &sink)
        .await
        .unwrap();

    assert!(report.is_empty());
    assert!(sink.is_empty());
}

#[tokio::test]
async fn test_create_only_conflict_is_reported_per_file() {
    let store = Arc::new(MemoryBlobStore::new("uploads"));
    let controller = UploadController::new(
        store.clone(),
        UploadOptions::new().conditions(WriteConditions::create_only()),
        signals(),
    );
    let files = MemoryFileStore::new();
    let original = files.add(FileRecord::new("f1", "same.txt", "v1"));
    let duplicate = files.add(FileRecord::new("f2", "same.txt", "v2"));

    let report = controller
        .run(&[original.clone(), duplicate.clone()], &files, &RecordingSink::new())
        .await
        .unwrap();

    assert_eq!(report.succeeded(), vec![&original]);
    match report.outcome(&duplicate) {
        Some(Outcome::Failed(error)) => {
            assert!(matches!(**error, UploadError::ConditionNotMet(_)))
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert_eq!(store.get("same.txt").unwrap(), Bytes::from_static(b"v1"));
}

#[tokio::test]
async fn test_logging_can_be_installed_once() {
    let config = blobdrop_log::LogConfig {
        debug: true,
        ..Default::default()
    };
    let first = blobdrop_log::init_with(config.clone());
    let second = blobdrop_log::init_with(config);

    assert!(!second);
    if first {
        assert!(blobdrop_log::config().unwrap().debug);
    }

    let controller = UploadController::new(
        Arc::new(MemoryBlobStore::new("uploads")),
        UploadOptions::new(),
        signals(),
    );
    let files = MemoryFileStore::new();
    let id = files.add(FileRecord::new("f1", "logged.txt", "x"));
    controller
        .run(&[id], &files, &RecordingSink::new())
        .await
        .unwrap();
}

#[test]
fn test_progress_adapter_ignores_transport_total() {
    let record = ProgressRecord::adapt(TransferProgress::new(256), 1024);
    assert_eq!(record.bytes_total, 1024);
    assert_eq!(record.percentage(), 0.25);
}

#[test]
fn test_uploader_config_feeds_controller() {
    let config = UploaderConfig::new("https://acct.blob.core.windows.net", "uploads", "sv=1")
        .with_default_options(UploadOptions::new().tier(AccessTier::Archive));

    let controller = UploadController::from_config(
        &config,
        Arc::new(MemoryBlobStore::new("uploads")),
        signals(),
    )
    .ok()
    .unwrap();

    assert_eq!(controller.defaults().tier, Some(AccessTier::Archive));
}
