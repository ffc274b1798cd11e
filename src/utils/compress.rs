use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use async_compression::tokio::write::GzipEncoder;
use log::debug;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};

use crate::constants::{
    COMPRESSION_CHUNK_SIZE as CHUNK_SIZE,
    COMPRESSED_CSV_SUFFIX,
    MEDIA_TYPE_CSV,
    MEDIA_TYPE_GZIP,
    MEDIA_TYPE_OCTET_STREAM,
};

/// Gzip `source` into `destination`, streaming in fixed-size chunks.
///
/// The destination is created (or truncated). Returns the number of
/// uncompressed bytes read from the source.
///
/// # Example
///
/// ```no_run
/// # use std::path::Path;
/// # use wifidb_uploader::utils::compress::gzip_file;
/// # async fn example() -> anyhow::Result<()> {
/// let read = gzip_file(Path::new("/tmp/run.csv"), Path::new("/tmp/run.csv.gz")).await?;
/// println!("compressed {} bytes", read);
/// # Ok(())
/// # }
/// ```
pub async fn gzip_file(source: &Path, destination: &Path) -> Result<u64> {
    let start = Instant::now();

    let mut input = File::open(source)
        .await
        .context(format!("Failed to open {} for compression", source.display()))?;
    let output = File::create(destination)
        .await
        .context(format!("Failed to create {}", destination.display()))?;
    let mut encoder = GzipEncoder::new(BufWriter::new(output));

    let mut buffer = vec![0u8; CHUNK_SIZE];
    let mut total: u64 = 0;
    loop {
        let bytes_read = input
            .read(&mut buffer)
            .await
            .context(format!("Failed to read from {}", source.display()))?;
        if bytes_read == 0 {
            break;
        }
        encoder
            .write_all(&buffer[..bytes_read])
            .await
            .context(format!("Failed to write to {}", destination.display()))?;
        total += bytes_read as u64;
    }

    // Writes the gzip trailer and flushes the BufWriter
    encoder
        .shutdown()
        .await
        .context(format!("Failed to finish gzip stream for {}", destination.display()))?;

    debug!(
        "Compressed {} ({} bytes) into {} in {:?}",
        source.display(),
        total,
        destination.display(),
        start.elapsed()
    );
    Ok(total)
}

/// True if `name` ends with `.csv.gz`, ignoring case
pub fn is_compressed_csv_name(name: &str) -> bool {
    name.to_lowercase().ends_with(COMPRESSED_CSV_SUFFIX)
}

/// True if `name` is already gzip-compressed by its suffix, ignoring case
pub fn is_gzip_name(name: &str) -> bool {
    let lower = name.to_lowercase();
    lower.ends_with(".gz") || lower.ends_with(".tgz")
}

/// Pick the upload media type purely from a file name suffix.
pub fn media_type_for(name: &str) -> &'static str {
    let lower = name.to_lowercase();
    if lower.ends_with(".gz") || lower.ends_with(".tgz") {
        MEDIA_TYPE_GZIP
    } else if lower.ends_with(".csv") {
        MEDIA_TYPE_CSV
    } else {
        MEDIA_TYPE_OCTET_STREAM
    }
}

/// Suffix to give a staged copy of a file called `name`.
///
/// `.csv.gz` is kept whole; otherwise the last extension (with its dot) is
/// used. Names without a usable extension yield `None`.
pub fn suffix_for(name: &str) -> Option<String> {
    let lower = name.to_lowercase();
    if lower.ends_with(COMPRESSED_CSV_SUFFIX) {
        return Some(COMPRESSED_CSV_SUFFIX.to_string());
    }
    match lower.rfind('.') {
        Some(dot) if dot < lower.len() - 1 => Some(lower[dot..].to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_compression::tokio::bufread::GzipDecoder;
    use tokio::io::BufReader;

    #[test]
    fn test_media_type_by_suffix() {
        assert_eq!(media_type_for("upload.csv.gz"), MEDIA_TYPE_GZIP);
        assert_eq!(media_type_for("bundle.TGZ"), MEDIA_TYPE_GZIP);
        assert_eq!(media_type_for("run.csv"), MEDIA_TYPE_CSV);
        assert_eq!(media_type_for("RUN.CSV"), MEDIA_TYPE_CSV);
        assert_eq!(media_type_for("notes.txt"), MEDIA_TYPE_OCTET_STREAM);
        assert_eq!(media_type_for("noext"), MEDIA_TYPE_OCTET_STREAM);
    }

    #[test]
    fn test_suffix_inference() {
        assert_eq!(suffix_for("WigleWifi_1.CSV.GZ").as_deref(), Some(".csv.gz"));
        assert_eq!(suffix_for("run.csv").as_deref(), Some(".csv"));
        assert_eq!(suffix_for("archive.tar.gz").as_deref(), Some(".gz"));
        assert_eq!(suffix_for("trailingdot."), None);
        assert_eq!(suffix_for("plain"), None);
    }

    #[tokio::test]
    async fn test_gzip_file_roundtrip() -> Result<()> {
        let dir = tempfile::TempDir::new()?;
        let source = dir.path().join("run.csv");
        let destination = dir.path().join("run.csv.gz");

        // Larger than one chunk so the loop runs more than once
        let content: Vec<u8> = (0..CHUNK_SIZE * 3 + 17)
            .map(|i| b"MAC,SSID,AuthMode\n"[i % 18])
            .collect();
        tokio::fs::write(&source, &content).await?;

        let read = gzip_file(&source, &destination).await?;
        assert_eq!(read, content.len() as u64);

        let compressed = tokio::fs::read(&destination).await?;
        assert_eq!(&compressed[..2], &[0x1f, 0x8b]);

        let mut decoder = GzipDecoder::new(BufReader::new(&compressed[..]));
        let mut decompressed = Vec::new();
        decoder.read_to_end(&mut decompressed).await?;
        assert_eq!(decompressed, content);
        Ok(())
    }

    #[tokio::test]
    async fn test_gzip_missing_source() {
        let dir = tempfile::TempDir::new().unwrap();
        let result = gzip_file(&dir.path().join("missing.csv"), &dir.path().join("out.gz")).await;
        assert!(result.is_err());
    }
}
