//! Named event emitter for blobdrop
//!
//! This crate provides a small in-process emitter where listeners are
//! attached to event names. The upload controller uses it in two roles:
//! as the transport behind its notification sink (`upload-started`,
//! `upload-progress`, ...) and as the source of `file-removed` signals.
//!
//! ## Quick Start
//!
//! ```rust
//! use blobdrop_events::{Emitter, listener_fn};
//!
//! let emitter: Emitter<String> = Emitter::new();
//!
//! let subscription = emitter.subscribe(
//!     "file-removed",
//!     listener_fn(|file_id: &String| {
//!         println!("stop uploading {}", file_id);
//!         Ok(())
//!     }),
//! );
//!
//! emitter.emit("file-removed", &"file-1".to_string()).unwrap();
//!
//! // Dropping the subscription detaches the listener.
//! drop(subscription);
//! assert_eq!(emitter.listener_count("file-removed"), 0);
//! ```
//!
//! ## Configuration
//!
//! ```rust
//! use blobdrop_events::{Emitter, EmitterBuilder};
//!
//! let emitter: Emitter<u64> = EmitterBuilder::new()
//!     .continue_on_error(false)   // Stop on first listener error
//!     .enable_logging(false)
//!     .build();
//! # let _ = emitter;
//! ```

pub mod emitter;
pub mod listener;

pub use emitter::{Emitter, EmitterBuilder, EmitterConfig, EmitterError, Subscription};
pub use listener::{FnListener, Listener, ListenerError, ListenerId, listener_fn};
