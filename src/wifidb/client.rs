use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use log::debug;

use crate::constants::{DEFAULT_CONNECTION_TIMEOUT_SECS, TEMP_DIR_NAME};

/// Settings shared by every request a pipeline makes.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Directory for staged copies and gzip files
    pub temp_dir: PathBuf,
    pub connect_timeout: Duration,
    /// Whole-request timeout; `None` lets large uploads run as long as they need
    pub request_timeout: Option<Duration>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            temp_dir: std::env::temp_dir().join(TEMP_DIR_NAME),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECTION_TIMEOUT_SECS),
            request_timeout: None,
        }
    }
}

impl PipelineConfig {
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = dir.into();
        self
    }
}

/// Create the HTTP client used for WifiDB calls.
///
/// The client pools connections and is safe to share between concurrent
/// uploads.
pub fn create_http_client(config: &PipelineConfig) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder()
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(config.connect_timeout);
    if let Some(timeout) = config.request_timeout {
        builder = builder.timeout(timeout);
    }

    let client = builder.build().context("Failed to create HTTP client")?;
    debug!(
        "Created HTTP client (connect timeout {:?}, request timeout {:?})",
        config.connect_timeout, config.request_timeout
    );
    Ok(client)
}
