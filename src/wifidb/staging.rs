use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use log::{debug, warn};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::constants::{
    COMPRESSED_CSV_SUFFIX, ERROR_FAILED_TO_COMPRESS, FALLBACK_SUFFIX, TEMP_FILE_PREFIX,
    TEMP_GZIP_PREFIX,
};
use crate::models::{UploadRequest, UploadSource};
use crate::utils::compress::{gzip_file, is_compressed_csv_name, is_gzip_name, suffix_for};
use crate::wifidb::resolver::ContentResolver;

/// A file the pipeline created while staging one request.
///
/// Owned by exactly one request. [`TempArtifact::remove`] deletes it and logs
/// failures; if it is dropped without being removed (error or cancellation
/// mid-staging) the file is deleted synchronously in `Drop`.
#[derive(Debug)]
pub struct TempArtifact {
    path: PathBuf,
    removed: bool,
}

impl TempArtifact {
    /// Reserve a request-unique path in `dir`. The file itself is created by
    /// whoever writes to it.
    pub fn reserve(dir: &Path, prefix: &str, suffix: &str) -> Self {
        let name = format!("{}{}{}", prefix, Uuid::new_v4().simple(), suffix);
        TempArtifact {
            path: dir.join(name),
            removed: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the file. Failures are logged, never returned.
    pub async fn remove(mut self) {
        self.removed = true;
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => debug!("Removed temp file {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove temp file {}: {}", self.path.display(), e),
        }
    }
}

impl Drop for TempArtifact {
    fn drop(&mut self) {
        if !self.removed {
            if let Err(e) = std::fs::remove_file(&self.path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!("Failed to remove temp file {}: {}", self.path.display(), e);
                }
            }
        }
    }
}

/// The file that will actually be sent, plus every temp file behind it.
#[derive(Debug)]
pub struct StagedPayload {
    /// File whose bytes go into the `file` part
    pub path: PathBuf,
    /// Name presented to the server in the `file` part
    pub filename: String,
    temps: Vec<TempArtifact>,
}

impl StagedPayload {
    /// Name of the payload file on disk
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Number of temp files still owned by this payload
    pub fn temp_count(&self) -> usize {
        self.temps.len()
    }

    /// Delete all temp files this payload owns.
    pub async fn cleanup(self) {
        for temp in self.temps {
            temp.remove().await;
        }
    }
}

/// Materialize the request source into a local file, compressing it when the
/// requested remote name calls for `.csv.gz` and the file is not gzip already.
pub async fn stage(
    request: &UploadRequest,
    resolver: &dyn ContentResolver,
    temp_dir: &Path,
) -> Result<StagedPayload> {
    let requested = request.requested_filename();
    let mut temps: Vec<TempArtifact> = Vec::new();

    let mut path = match &request.source {
        UploadSource::LocalFile(path) => {
            let metadata = tokio::fs::metadata(path)
                .await
                .context(format!("Unable to access file {}", path.display()))?;
            if !metadata.is_file() {
                return Err(anyhow!("Not a regular file: {}", path.display()));
            }
            // Readability check; the upload body reopens the file later
            File::open(path)
                .await
                .context(format!("Unable to read file {}", path.display()))?;
            debug!("Using {} directly for upload", path.display());
            path.clone()
        }
        UploadSource::ContentReference(reference) => {
            let original_name = resolver.display_name(reference).await;
            let suffix = original_name
                .as_deref()
                .and_then(suffix_for)
                .unwrap_or_else(|| FALLBACK_SUFFIX.to_string());

            ensure_dir(temp_dir).await?;
            let temp = TempArtifact::reserve(temp_dir, TEMP_FILE_PREFIX, &suffix);
            let staged_path = temp.path().to_path_buf();
            temps.push(temp);

            let mut reader = resolver.open(reference).await?;
            let mut out = File::create(&staged_path)
                .await
                .context(format!("Failed to create {}", staged_path.display()))?;
            let copied = tokio::io::copy(&mut reader, &mut out)
                .await
                .context(format!("Failed to copy {} into temp file", reference))?;
            out.flush().await?;
            debug!(
                "Copied {} ({} bytes, original name {:?}) to {}",
                reference,
                copied,
                original_name,
                staged_path.display()
            );
            staged_path
        }
    };

    let current_name = file_name_of(&path);
    if requested.map(is_compressed_csv_name).unwrap_or(false) && !is_gzip_name(&current_name) {
        ensure_dir(temp_dir).await?;
        let gz = TempArtifact::reserve(temp_dir, TEMP_GZIP_PREFIX, COMPRESSED_CSV_SUFFIX);
        gzip_file(&path, gz.path())
            .await
            .context(ERROR_FAILED_TO_COMPRESS)?;

        // The uncompressed copy is no longer needed
        for temp in temps.drain(..) {
            temp.remove().await;
        }
        path = gz.path().to_path_buf();
        temps.push(gz);
    }

    let filename = requested
        .map(str::to_string)
        .unwrap_or_else(|| file_name_of(&path));

    Ok(StagedPayload {
        path,
        filename,
        temps,
    })
}

async fn ensure_dir(dir: &Path) -> Result<()> {
    tokio::fs::create_dir_all(dir)
        .await
        .context(format!("Failed to create temp directory {}", dir.display()))
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
