//! Utility functions for preparing upload payloads.
//!
//! ## Components
//!
//! - **Compression**: streaming gzip of staged files, plus the suffix rules
//!   used to pick media types and temp file extensions
//!
//! ### Compressing an Export
//!
//! ```no_run
//! use wifidb_uploader::utils::compress::gzip_file;
//! use std::path::Path;
//!
//! # async fn example() -> anyhow::Result<()> {
//! gzip_file(Path::new("/tmp/run.csv"), Path::new("/tmp/run.csv.gz")).await?;
//! # Ok(())
//! # }
//! ```

/// Gzip compression and suffix-based file classification
pub mod compress;
