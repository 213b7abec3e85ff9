//! Upload orchestration for blobdrop
//!
//! This crate provides:
//! - Layered upload options with per-field override resolution
//! - Progress normalization against the file's declared size
//! - Per-file cancellation handles
//! - A lifecycle controller that drives a batch of files through a storage
//!   backend and reports every step to a sink
//! - Storage backends (in-memory, Azure Blob)
//!
//! # Features
//!
//! - **Sequential batches** - One file at a time, in the given order
//! - **Cancellation** - `file-removed` signals stop in-flight or queued files
//! - **Guaranteed cleanup** - Handles and listeners are released on every exit path
//! - **Azure Blob** - Single-shot or block uploads (feature `azure`)
//!
//! # Quick Start
//!
//! ```rust
//! use blobdrop_events::Emitter;
//! use blobdrop_upload::*;
//! use std::sync::Arc;
//!
//! # tokio_test::block_on(async {
//! let store = Arc::new(MemoryBlobStore::new("photos"));
//! let controller = UploadController::new(
//!     store.clone(),
//!     UploadOptions::new().tier(AccessTier::Hot),
//!     Emitter::new(),
//! );
//!
//! let files = MemoryFileStore::new();
//! let id = files.add(FileRecord::new("file-1", "cat.png", &b"\x89PNG"[..]));
//!
//! let sink = RecordingSink::new();
//! let report = controller.run(&[id], &files, &sink).await?;
//!
//! assert_eq!(report.succeeded().len(), 1);
//! assert_eq!(store.object("cat.png").unwrap().tier, Some(AccessTier::Hot));
//! # Ok::<(), UploadError>(())
//! # }).unwrap();
//! ```

pub mod cancellation;
pub mod config;
pub mod controller;
pub mod error;
pub mod file;
pub mod memory;
pub mod options;
pub mod progress;
pub mod sink;
pub mod storage;

#[cfg(feature = "azure")]
pub mod azure;

pub use cancellation::*;
pub use config::*;
pub use controller::*;
pub use error::*;
pub use file::*;
pub use memory::*;
pub use options::*;
pub use progress::*;
pub use sink::*;
pub use storage::*;

#[cfg(feature = "azure")]
pub use azure::*;
