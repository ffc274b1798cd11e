use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::io::AsyncRead;

use crate::models::ContentReference;

/// Byte stream handed out by a [`ContentResolver`]
pub type ContentStream = Box<dyn AsyncRead + Send + Unpin>;

/// Turns opaque content references into readable bytes.
///
/// Implementations wrap whatever content access the host platform offers.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContentResolver: Send + Sync {
    /// Open the referenced content for reading
    async fn open(&self, reference: &ContentReference) -> Result<ContentStream>;

    /// Best-effort human-readable name, used to infer the file extension
    async fn display_name(&self, reference: &ContentReference) -> Option<String>;
}

/// Resolver treating references as filesystem paths, optionally `file://`-prefixed.
#[derive(Debug, Clone, Default)]
pub struct FsContentResolver;

impl FsContentResolver {
    fn path_of(reference: &ContentReference) -> PathBuf {
        let raw = reference.0.strip_prefix("file://").unwrap_or(&reference.0);
        PathBuf::from(raw)
    }
}

#[async_trait]
impl ContentResolver for FsContentResolver {
    async fn open(&self, reference: &ContentReference) -> Result<ContentStream> {
        let path = Self::path_of(reference);
        let file = tokio::fs::File::open(&path)
            .await
            .context(format!("Unable to open input stream for {}", reference))?;
        Ok(Box::new(file))
    }

    async fn display_name(&self, reference: &ContentReference) -> Option<String> {
        let path = Self::path_of(reference);
        Path::new(&path)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
    }
}
