use std::sync::Arc;

use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use reqwest::{Response, Url};
use serde_json::json;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::constants::{
    ERROR_CANCELLED, ERROR_FAILED_TO_STAGE, ERROR_MISSING_BASE_URL, IMPORT_ENDPOINT, LOCAL_FAILURE_CODE, PART_APIKEY,
    PART_FILE, PART_USERNAME, SCHEDULE_ENDPOINT, SCHEDULE_WAITING_FUNC,
};
use crate::models::{
    Outcome, ScheduleOutcome, UploadOutcome, UploadRequest, UploadResponse, UploadTarget,
};
use crate::security::{safe_error_message, scrub_credentials};
use crate::utils::compress::media_type_for;
use crate::wifidb::client::{create_http_client, PipelineConfig};
use crate::wifidb::multipart::{MultipartBody, MultipartBuilder};
use crate::wifidb::progress::{ProgressSink, ProgressTracker};
use crate::wifidb::resolver::{ContentResolver, FsContentResolver};
use crate::wifidb::staging::{stage, StagedPayload};

/// Uploads observation exports to a WifiDB server.
///
/// Each call stages its source into a local file (copying and gzipping as
/// needed), posts it as `multipart/form-data` to `{base}v2/import.php`,
/// deletes whatever temp files it created and then yields exactly one
/// [`UploadOutcome`]. The pipeline never retries.
///
/// Cloning is cheap; clones share the HTTP connection pool.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use wifidb_uploader::models::{UploadRequest, UploadSource, UploadTarget};
/// use wifidb_uploader::wifidb::{PipelineConfig, UploadPipeline};
///
/// # async fn example() -> anyhow::Result<()> {
/// let pipeline = UploadPipeline::new(PipelineConfig::default())?;
/// let target = UploadTarget::new("https://wifidb.example.net/wifidb/api/");
/// let request = UploadRequest::new(UploadSource::LocalFile("run.csv".into()), target)
///     .with_remote_filename("run.csv.gz");
///
/// let handle = pipeline.submit(
///     request,
///     Some(Arc::new(|permille: u16| println!("{}.{}%", permille / 10, permille % 10))),
///     |outcome| println!("finished: {:?}", outcome),
/// );
/// handle.join().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct UploadPipeline {
    client: reqwest::Client,
    resolver: Arc<dyn ContentResolver>,
    config: PipelineConfig,
    runtime: Option<Handle>,
}

/// Handle to an upload running in the background.
pub struct UploadHandle {
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl UploadHandle {
    /// Abort the upload. Temp files are still removed and the completion
    /// callback still fires, with a local failure.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait until the completion callback has run
    pub async fn join(self) -> Result<()> {
        self.task.await.context("Upload task failed")
    }
}

impl UploadPipeline {
    /// Pipeline resolving content references as filesystem paths.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        Self::with_resolver(config, Arc::new(FsContentResolver))
    }

    pub fn with_resolver(config: PipelineConfig, resolver: Arc<dyn ContentResolver>) -> Result<Self> {
        Ok(UploadPipeline {
            client: create_http_client(&config)?,
            resolver,
            config,
            runtime: None,
        })
    }

    /// Run background work on `handle` instead of the ambient runtime.
    pub fn on_runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn spawn<F>(&self, future: F) -> JoinHandle<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        match &self.runtime {
            Some(handle) => handle.spawn(future),
            None => tokio::spawn(future),
        }
    }

    /// Start an upload in the background.
    ///
    /// Progress (permille) goes to `progress` if given; `on_complete` receives
    /// the single terminal outcome after all temp files are gone and after
    /// the last progress event. Without [`UploadPipeline::on_runtime`] this
    /// must be called from within a tokio runtime.
    pub fn submit<F>(
        &self,
        request: UploadRequest,
        progress: Option<Arc<dyn ProgressSink>>,
        on_complete: F,
    ) -> UploadHandle
    where
        F: FnOnce(UploadOutcome) + Send + 'static,
    {
        let token = CancellationToken::new();
        let pipeline = self.clone();
        let task_token = token.clone();
        let task = self.spawn(async move {
            let outcome = pipeline.upload(request, progress, &task_token).await;
            on_complete(outcome);
        });
        UploadHandle { token, task }
    }

    /// Perform an upload on the current task and return its outcome.
    pub async fn upload(
        &self,
        request: UploadRequest,
        progress: Option<Arc<dyn ProgressSink>>,
        cancel: &CancellationToken,
    ) -> UploadOutcome {
        let base_url = request.target.base_url.as_str();
        info!("WifiDB Upload URL: {}", base_url);
        if base_url.is_empty() {
            warn!("{}", ERROR_MISSING_BASE_URL);
            return Outcome::local_failure();
        }
        let url = match Url::parse(&format!("{}{}", base_url, IMPORT_ENDPOINT)) {
            Ok(url) => url,
            Err(e) => {
                error!("Invalid WifiDB upload URL {}{}: {}", base_url, IMPORT_ENDPOINT, e);
                return Outcome::local_failure();
            }
        };

        // Dropping the staging future on cancellation drops its temp files too
        let staged = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!("WifiDB upload cancelled while staging");
                return cancelled();
            }
            staged = stage(&request, self.resolver.as_ref(), &self.config.temp_dir) => staged,
        };
        let staged = match staged {
            Ok(staged) => staged,
            Err(e) => {
                error!("{}: {:#}", ERROR_FAILED_TO_STAGE, e);
                return Outcome::local_failure();
            }
        };

        let outcome = self.send_staged(url, &request, &staged, progress, cancel).await;
        staged.cleanup().await;
        outcome
    }

    async fn send_staged(
        &self,
        url: Url,
        request: &UploadRequest,
        staged: &StagedPayload,
        progress: Option<Arc<dyn ProgressSink>>,
        cancel: &CancellationToken,
    ) -> UploadOutcome {
        let body = match build_body(request, staged).await {
            Ok(body) => body,
            Err(e) => {
                error!("Failed to build WifiDB upload body: {:#}", e);
                return Outcome::local_failure();
            }
        };
        let tracker = Arc::new(ProgressTracker::new(progress, body.payload_len()));

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!("WifiDB upload cancelled after {} bytes", tracker.bytes_written());
                cancelled()
            }
            outcome = self.post(url, body, Arc::clone(&tracker)) => outcome,
        };
        tracker.close();
        outcome
    }

    async fn post(&self, url: Url, body: MultipartBody, tracker: Arc<ProgressTracker>) -> UploadOutcome {
        let form = match body.into_form(tracker).await {
            Ok(form) => form,
            Err(e) => {
                error!("Failed to open WifiDB upload payload: {:#}", e);
                return Outcome::local_failure();
            }
        };

        let response = self.client.post(url).multipart(form).send().await;

        match response {
            Ok(response) => interpret_upload_response(response).await,
            Err(e) => {
                error!("{}", safe_error_message("Failed to upload to WifiDB - client exception", &e));
                Outcome::local_failure()
            }
        }
    }

    /// Start a schedule query in the background; `on_complete` gets the raw body text.
    pub fn fetch_schedule<F>(&self, target: UploadTarget, on_complete: F) -> JoinHandle<()>
    where
        F: FnOnce(ScheduleOutcome) + Send + 'static,
    {
        let pipeline = self.clone();
        self.spawn(async move {
            let outcome = pipeline.schedule(&target).await;
            on_complete(outcome);
        })
    }

    /// Query the list of imports waiting on the server.
    pub async fn schedule(&self, target: &UploadTarget) -> ScheduleOutcome {
        if target.base_url.is_empty() {
            warn!("{}", ERROR_MISSING_BASE_URL);
            return Outcome::local_failure();
        }
        let url = match schedule_url(target) {
            Ok(url) => url,
            Err(e) => {
                error!("Invalid WifiDB schedule URL: {:#}", e);
                return Outcome::local_failure();
            }
        };

        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                error!("{}", safe_error_message("Failed to get schedule from WifiDB - client exception", &e));
                return Outcome::local_failure();
            }
        };

        let status = response.status();
        if !status.is_success() {
            error!(
                "Failed to get schedule from WifiDB: {} {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("")
            );
            return Outcome::server_failure(status.as_u16());
        }
        match response.text().await {
            Ok(text) => Outcome::Success(text),
            Err(e) => {
                error!("Failed to read WifiDB schedule body: {}", e);
                Outcome::local_failure()
            }
        }
    }
}

/// `{base}v2/schedule.php?func=waiting` plus credentials when present
pub fn schedule_url(target: &UploadTarget) -> Result<Url> {
    let mut url = Url::parse(&format!("{}{}", target.base_url, SCHEDULE_ENDPOINT))
        .context("Failed to build schedule URL")?;
    {
        let mut query = url.query_pairs_mut();
        query.append_pair("func", SCHEDULE_WAITING_FUNC);
        if let Some(username) = target.username() {
            query.append_pair(PART_USERNAME, username);
        }
        if let Some(api_key) = target.api_key() {
            query.append_pair(PART_APIKEY, api_key);
        }
    }
    Ok(url)
}

/// Lay out the form: `file`, then credentials, then caller parameters.
pub async fn build_body(request: &UploadRequest, staged: &StagedPayload) -> Result<MultipartBody> {
    let media_type = media_type_for(&staged.file_name());
    let mut builder =
        MultipartBuilder::new().file_part(PART_FILE, &staged.filename, &staged.path, media_type);

    if let Some(username) = request.target.username() {
        builder = builder.text_part(PART_USERNAME, username);
    }
    if let Some(api_key) = request.target.api_key() {
        builder = builder.text_part(PART_APIKEY, api_key);
    }
    for (key, value) in &request.params {
        builder = builder.text_part(key, value);
    }
    debug!(
        "WifiDB Upload Params: {:?} (file {} as {}, {})",
        request.params,
        staged.path.display(),
        staged.filename,
        media_type
    );
    builder.build().await
}

async fn interpret_upload_response(response: Response) -> UploadOutcome {
    let status = response.status();
    if !status.is_success() {
        error!(
            "Failed to upload file to WifiDB: {} {}",
            status.as_u16(),
            status.canonical_reason().unwrap_or("")
        );
        return Outcome::server_failure(status.as_u16());
    }

    let text = match response.text().await {
        Ok(text) => text,
        Err(e) => {
            error!("Failed to read WifiDB upload response: {}", e);
            return Outcome::local_failure();
        }
    };
    info!("WifiDB Upload Response: {}", scrub_credentials(&text));
    parse_upload_response(&text)
}

/// Parse a 2xx body. Anything that is not a JSON object is a local failure.
pub fn parse_upload_response(text: &str) -> UploadOutcome {
    match serde_json::from_str::<UploadResponse>(text) {
        Ok(parsed) => Outcome::Success(parsed),
        Err(e) => {
            warn!("Unparseable WifiDB upload response: {}", e);
            Outcome::local_failure()
        }
    }
}

fn cancelled() -> UploadOutcome {
    Outcome::Failure {
        status: LOCAL_FAILURE_CODE,
        error: Some(json!({ "error": ERROR_CANCELLED })),
    }
}
