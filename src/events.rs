//! Announcements of exported observation files.
//!
//! Exporters publish an [`ArtifactReady`] once a file is fully written; any
//! number of subscribers may react. [`spawn_upload_listener`] is the
//! subscriber that forwards each file to WifiDB.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, TimeZone};
use log::{debug, info, warn};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::{Preferences, WifiDbSettings};
use crate::constants::{
    ARTIFACT_EVENT_CAPACITY, COMPRESSED_CSV_SUFFIX, EXPORT_FILE_PREFIX, EXPORT_TIMESTAMP_FORMAT,
    PARAM_TITLE,
};
use crate::models::{UploadOutcome, UploadRequest, UploadSource};
use crate::wifidb::UploadPipeline;

/// A finished export waiting to be picked up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactReady {
    pub path: PathBuf,
    /// Name the file should carry on the server
    pub filename: String,
}

/// Broadcast channel for [`ArtifactReady`] events.
#[derive(Debug, Clone)]
pub struct ArtifactEvents {
    tx: broadcast::Sender<ArtifactReady>,
}

impl Default for ArtifactEvents {
    fn default() -> Self {
        Self::new()
    }
}

impl ArtifactEvents {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(ARTIFACT_EVENT_CAPACITY);
        ArtifactEvents { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ArtifactReady> {
        self.tx.subscribe()
    }

    /// Announce a file. Returns how many subscribers will see it.
    pub fn publish(&self, event: ArtifactReady) -> usize {
        match self.tx.send(event) {
            Ok(receivers) => receivers,
            Err(broadcast::error::SendError(event)) => {
                debug!("No subscribers for {}", event.path.display());
                0
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// `WigleWifi_yyyyMMdd-HHmmss.csv.gz` for an export taken at `now`
pub fn export_filename<Tz: TimeZone>(now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!(
        "{}{}{}",
        EXPORT_FILE_PREFIX,
        now.format(EXPORT_TIMESTAMP_FORMAT),
        COMPRESSED_CSV_SUFFIX
    )
}

/// Upload every announced artifact to the WifiDB server configured in `prefs`.
///
/// Settings are read again for each artifact, so URL or credential changes
/// apply from the next upload on. Artifacts are uploaded one after another; the next event is only taken
/// once the previous upload has produced its outcome. The task ends when
/// every [`ArtifactEvents`] sender is gone.
pub fn spawn_upload_listener<F>(
    pipeline: UploadPipeline,
    prefs: Arc<Preferences>,
    mut receiver: broadcast::Receiver<ArtifactReady>,
    mut on_outcome: F,
) -> JoinHandle<()>
where
    F: FnMut(&ArtifactReady, UploadOutcome) + Send + 'static,
{
    tokio::spawn(async move {
        loop {
            let event = match receiver.recv().await {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Upload listener fell behind, {} artifact(s) not uploaded", skipped);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };

            info!("Uploading {} to WifiDB as {}", event.path.display(), event.filename);
            let target = WifiDbSettings::load(&prefs).target();
            let request = UploadRequest::new(UploadSource::LocalFile(event.path.clone()), target)
            .with_param(PARAM_TITLE, event.filename.as_str());

            let outcome = pipeline.upload(request, None, &CancellationToken::new()).await;
            on_outcome(&event, outcome);
        }
        debug!("Artifact channel closed, upload listener exiting");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_export_filename() {
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        assert_eq!(export_filename(&at), "WigleWifi_20240309-070501.csv.gz");
    }

    #[tokio::test]
    async fn test_publish_reaches_every_subscriber() {
        let events = ArtifactEvents::new();
        let event = ArtifactReady {
            path: PathBuf::from("/tmp/run.csv.gz"),
            filename: "WigleWifi_20240101-000000.csv.gz".into(),
        };
        assert_eq!(events.publish(event.clone()), 0);

        let mut first = events.subscribe();
        let mut second = events.subscribe();
        assert_eq!(events.subscriber_count(), 2);
        assert_eq!(events.publish(event.clone()), 2);
        assert_eq!(first.recv().await.unwrap(), event);
        assert_eq!(second.recv().await.unwrap(), event);
    }
}
