use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use reqwest::multipart::{Form, Part};
use reqwest::Body;
use tokio_util::io::ReaderStream;

use crate::constants::UPLOAD_CHUNK_SIZE;
use crate::wifidb::progress::{counting_stream, ProgressTracker};

/// The file part of an upload form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePart {
    pub name: String,
    pub filename: String,
    pub path: PathBuf,
    pub content_type: String,
    /// Length of `path` when the body was built
    pub len: u64,
}

/// A `multipart/form-data` upload: one streamed file part followed by text
/// parts in insertion order.
///
/// The file length is fixed when the body is built, so the form carries an
/// exact `Content-Length` and progress can be computed against it.
#[derive(Debug)]
pub struct MultipartBody {
    file: FilePart,
    fields: Vec<(String, String)>,
}

/// Builder for [`MultipartBody`]
#[derive(Debug, Default)]
pub struct MultipartBuilder {
    file: Option<(String, String, PathBuf, String)>,
    fields: Vec<(String, String)>,
}

impl MultipartBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the file part. Its bytes are read from `path` when the form streams.
    pub fn file_part(
        mut self,
        name: impl Into<String>,
        filename: impl Into<String>,
        path: impl AsRef<Path>,
        content_type: impl Into<String>,
    ) -> Self {
        self.file = Some((
            name.into(),
            filename.into(),
            path.as_ref().to_path_buf(),
            content_type.into(),
        ));
        self
    }

    /// Append a text part
    pub fn text_part(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    pub async fn build(self) -> Result<MultipartBody> {
        let (name, filename, path, content_type) = self
            .file
            .ok_or_else(|| anyhow!("Multipart body requires a file part"))?;

        let len = tokio::fs::metadata(&path)
            .await
            .context(format!("Failed to stat {}", path.display()))?
            .len();

        Ok(MultipartBody {
            file: FilePart {
                name,
                filename,
                path,
                content_type,
                len,
            },
            fields: self.fields,
        })
    }
}

impl MultipartBody {
    pub fn file(&self) -> &FilePart {
        &self.file
    }

    /// Text parts in the order they will be sent
    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    /// Bytes the progress tracker counts: the streamed file part
    pub fn payload_len(&self) -> u64 {
        self.file.len
    }

    /// Open the file and turn the body into a form whose file part is read
    /// in `UPLOAD_CHUNK_SIZE` chunks, each counted by `tracker`.
    pub async fn into_form(self, tracker: Arc<ProgressTracker>) -> Result<Form> {
        let MultipartBody { file, fields } = self;
        let reader = tokio::fs::File::open(&file.path)
            .await
            .context(format!("Failed to open {} for upload", file.path.display()))?;
        let stream = counting_stream(ReaderStream::with_capacity(reader, UPLOAD_CHUNK_SIZE), tracker);

        let part = Part::stream_with_length(Body::wrap_stream(stream), file.len)
            .file_name(file.filename)
            .mime_str(&file.content_type)
            .context(format!("Invalid media type {}", file.content_type))?;

        let mut form = Form::new().part(file.name, part);
        for (key, value) in fields {
            form = form.text(key, value);
        }
        Ok(form)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::create_temp_dir;

    #[tokio::test]
    async fn test_layout_keeps_insertion_order() -> Result<()> {
        let dir = create_temp_dir()?;
        let path = dir.path().join("run.csv");
        tokio::fs::write(&path, b"a,b\n1,2\n").await?;

        let body = MultipartBuilder::new()
            .file_part("file", "upload.csv", &path, "text/csv")
            .text_part("username", "alice")
            .text_part("apikey", "k3y")
            .text_part("title", "upload.csv")
            .build()
            .await?;

        assert_eq!(body.file().name, "file");
        assert_eq!(body.file().filename, "upload.csv");
        assert_eq!(body.file().content_type, "text/csv");
        assert_eq!(body.payload_len(), 8);
        let names: Vec<&str> = body.fields().iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(names, ["username", "apikey", "title"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_form_has_exact_length() -> Result<()> {
        let dir = create_temp_dir()?;
        let path = dir.path().join("big.bin");
        tokio::fs::write(&path, vec![7u8; UPLOAD_CHUNK_SIZE * 4 + 1]).await?;

        let body = MultipartBuilder::new()
            .file_part("file", "big.bin", &path, "application/octet-stream")
            .text_part("title", "big.bin")
            .build()
            .await?;
        let tracker = Arc::new(ProgressTracker::new(None, body.payload_len()));
        let form = body.into_form(tracker).await?;

        let request = reqwest::Client::new()
            .post("http://127.0.0.1:9/v2/import.php")
            .multipart(form)
            .build()?;
        let length: u64 = request
            .headers()
            .get(reqwest::header::CONTENT_LENGTH)
            .expect("content-length set for a form of known size")
            .to_str()?
            .parse()?;
        assert!(length > (UPLOAD_CHUNK_SIZE * 4 + 1) as u64);
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_file_part_is_error() {
        assert!(MultipartBuilder::new().text_part("a", "b").build().await.is_err());
    }

    #[tokio::test]
    async fn test_missing_file_is_error() {
        let dir = create_temp_dir().unwrap();
        let result = MultipartBuilder::new()
            .file_part("file", "gone.csv", dir.path().join("gone.csv"), "text/csv")
            .build()
            .await;
        assert!(result.is_err());
    }
}
