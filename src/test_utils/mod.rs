//! Test utilities for wifidb-uploader
//!
//! This module provides common testing utilities and helpers
//! for use across the unit test modules.

#![cfg(test)]

use std::path::Path;

use anyhow::Result;
use async_compression::tokio::bufread::GzipDecoder;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, BufReader};

/// Creates a temporary directory that is automatically cleaned up
pub fn create_temp_dir() -> Result<TempDir> {
    Ok(TempDir::new()?)
}

/// Number of regular files directly inside `dir`; a missing directory counts as empty
pub fn count_files(dir: &Path) -> usize {
    match std::fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_file())
            .count(),
        Err(_) => 0,
    }
}

/// Reads and decompresses a gzip file
pub async fn read_gzip(path: &Path) -> Result<Vec<u8>> {
    let compressed = tokio::fs::read(path).await?;
    let mut decoder = GzipDecoder::new(BufReader::new(&compressed[..]));
    let mut out = Vec::new();
    decoder.read_to_end(&mut out).await?;
    Ok(out)
}

/// Writes a small WiGLE-style CSV export and returns its path
pub fn write_sample_csv(dir: &Path, name: &str, rows: usize) -> Result<std::path::PathBuf> {
    let mut content = String::from("MAC,SSID,AuthMode,FirstSeen,Channel,RSSI\n");
    for i in 0..rows {
        content.push_str(&format!(
            "00:11:22:33:44:{:02x},net{},[WPA2-PSK-CCMP][ESS],2024-01-01 12:00:00,6,-{}\n",
            i % 256,
            i,
            40 + (i % 50)
        ));
    }
    let path = dir.join(name);
    std::fs::write(&path, content)?;
    Ok(path)
}
