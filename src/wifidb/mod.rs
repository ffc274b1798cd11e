//! WifiDB upload integration.
//!
//! This module turns an [`UploadRequest`](crate::models::UploadRequest) into
//! one `multipart/form-data` POST against a WifiDB server and reports the
//! result through a single terminal [`Outcome`](crate::models::Outcome).
//!
//! ## Pipeline
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌─────────────────┐
//! │  UploadSource   │────▶│    Staging      │────▶│  gzip (if name  │
//! │ file / content  │     │ copy to temp    │     │  is .csv.gz)    │
//! └─────────────────┘     └─────────────────┘     └────────┬────────┘
//!                                                          │
//!                         ┌─────────────────┐     ┌────────▼────────┐
//!                         │ Outcome + temp  │◀────│ Multipart POST  │
//!                         │    cleanup      │     │ + progress ‰    │
//!                         └─────────────────┘     └─────────────────┘
//! ```
//!
//! ## Failure codes
//!
//! - empty base URL, I/O errors, transport errors, unparseable bodies and
//!   cancellation: [`LOCAL_FAILURE_CODE`](crate::constants::LOCAL_FAILURE_CODE)
//! - non-2xx responses: the HTTP status

/// HTTP client construction and pipeline settings
pub mod client;

/// Multipart body layout and streaming
pub mod multipart;

/// Upload pipeline and schedule query
pub mod pipeline;

/// Permille progress accounting
pub mod progress;

/// Content reference resolution
pub mod resolver;

/// Source materialization and temp file ownership
pub mod staging;

pub use client::PipelineConfig;
pub use pipeline::{UploadHandle, UploadPipeline};
pub use progress::ProgressSink;
pub use resolver::{ContentResolver, FsContentResolver};
