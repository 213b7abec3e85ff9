// blobdrop - cancellable, progress-reporting batch uploads to blob storage
//
// This library drives batches of in-memory files through a blob storage
// backend, one file at a time, reporting each step to an event sink.

// Re-export upload functionality
pub use blobdrop_upload::*;

// Re-export member crates
pub use blobdrop_config;
pub use blobdrop_events;
pub use blobdrop_log;

// Prelude for common imports
pub mod prelude {
    pub use blobdrop_events::{Emitter, Subscription, listener_fn};

    pub use crate::{
        AccessTier,
        BatchReport,
        BlobHttpHeaders,
        BlobStore,
        EmitterSink,
        FileId,
        FileRecord,
        FileStore,
        MemoryBlobStore,
        MemoryFileStore,
        Outcome,
        ProgressRecord,
        RecordingSink,
        UploadController,
        UploadError,
        UploadEvent,
        UploadOptions,
        UploadResult,
        UploadSink,
        UploaderConfig,
        WriteConditions,
    };

    #[cfg(feature = "azure")]
    pub use crate::AzureBlobStore;
}
