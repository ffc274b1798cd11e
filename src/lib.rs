//! # wifidb-uploader
//!
//! Client for uploading wardriving observation exports (WiGLE-format CSV,
//! optionally gzipped) to a self-hosted WifiDB server.
//!
//! ## Overview
//!
//! An upload takes a local file or an opaque content reference, stages it
//! into a readable file (copying and gzip-compressing when the requested
//! remote name ends in `.csv.gz`), streams it as `multipart/form-data` to
//! `{base}v2/import.php` while reporting permille progress, and delivers
//! exactly one outcome after every temp file it created has been removed.
//!
//! ## Features
//!
//! - **Single pipeline** for filesystem paths and resolver-backed content
//! - **Streaming upload** with exact `Content-Length` and progress callbacks
//! - **Cancellation** of staged or in-flight uploads
//! - **Schedule query** for imports waiting on the server
//! - **Activation** from scanned account codes and WifiDB redeem links
//! - **YAML preferences** with transactional edits
//!
//! ## Usage
//!
//! ```no_run
//! use wifidb_uploader::config::{Preferences, WifiDbSettings};
//! use wifidb_uploader::models::{UploadRequest, UploadSource};
//! use wifidb_uploader::wifidb::{PipelineConfig, UploadPipeline};
//! use tokio_util::sync::CancellationToken;
//! use std::path::Path;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let prefs = Preferences::open(Path::new("prefs.yaml"))?;
//! let settings = WifiDbSettings::load(&prefs);
//!
//! let pipeline = UploadPipeline::new(PipelineConfig::default())?;
//! let request = UploadRequest::new(UploadSource::LocalFile("run.csv".into()), settings.target())
//!     .with_remote_filename("run.csv.gz");
//!
//! let outcome = pipeline.upload(request, None, &CancellationToken::new()).await;
//! println!("{:?}", outcome);
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`cli`]: Command-line interface definitions
//! - [`models`]: Requests, targets and outcomes
//! - [`wifidb`]: Upload pipeline, staging, multipart body and progress
//! - [`config`]: Preference store and WifiDB settings
//! - [`activation`]: Barcode payload handling and redeem links
//! - [`events`]: Artifact-ready notifications and the upload listener
//! - [`utils`]: Gzip compression and file name helpers
//! - [`security`]: Credential scrubbing for logs
//! - [`constants`]: Application constants

/// Command-line interface definitions and argument parsing
pub mod cli;

/// Core data models shared by the pipeline and its callers
pub mod models;

/// WifiDB upload pipeline
pub mod wifidb;

/// Preference store and WifiDB settings
pub mod config;

/// Account activation from scanned payloads
pub mod activation;

/// Artifact-ready events
pub mod events;

/// Utility functions for compression and file naming
pub mod utils;

/// Application constants and configuration values
pub mod constants;

/// Security utilities for credential protection
pub mod security;

/// Test utilities and helpers
#[cfg(test)]
pub mod test_utils;
