use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::constants::{LOCAL_FAILURE_CODE, PARAM_TITLE};

/// Opaque handle to content that is not (necessarily) a plain local file.
///
/// Resolved to a byte stream and an optional display name by a
/// [`ContentResolver`](crate::wifidb::resolver::ContentResolver).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentReference(pub String);

impl fmt::Display for ContentReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where the bytes of an upload come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadSource {
    /// A readable file on the local filesystem, used as-is.
    LocalFile(PathBuf),
    /// Content that must be copied out through a resolver first.
    ContentReference(ContentReference),
}

/// WifiDB server and the credentials presented to it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadTarget {
    /// Base URL including the trailing slash, e.g. `https://host/wifidb/api/`
    pub base_url: String,
    pub username: Option<String>,
    pub api_key: Option<String>,
}

impl UploadTarget {
    pub fn new(base_url: impl Into<String>) -> Self {
        UploadTarget {
            base_url: base_url.into(),
            username: None,
            api_key: None,
        }
    }

    pub fn with_credentials(mut self, username: Option<String>, api_key: Option<String>) -> Self {
        self.username = username;
        self.api_key = api_key;
        self
    }

    /// Username, if present and non-empty
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref().filter(|u| !u.is_empty())
    }

    /// API key, if present and non-empty
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|k| !k.is_empty())
    }
}

/// A single upload: what to send, where, and under which name.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub source: UploadSource,
    pub target: UploadTarget,
    /// Extra form parts, in insertion order, keys unique
    pub params: Vec<(String, String)>,
    /// Remote filename; a `.csv.gz` name forces compression
    pub remote_filename: Option<String>,
}

impl UploadRequest {
    pub fn new(source: UploadSource, target: UploadTarget) -> Self {
        UploadRequest {
            source,
            target,
            params: Vec::new(),
            remote_filename: None,
        }
    }

    pub fn with_remote_filename(mut self, name: impl Into<String>) -> Self {
        self.remote_filename = Some(name.into());
        self
    }

    /// Add an extra form parameter, replacing any previous value for `key`.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        let value = value.into();
        match self.params.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.params.push((key, value)),
        }
        self
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    /// The filename the server should see, if the caller asked for one.
    ///
    /// An explicit remote filename wins over a non-empty `title` parameter.
    pub fn requested_filename(&self) -> Option<&str> {
        self.remote_filename
            .as_deref()
            .filter(|n| !n.is_empty())
            .or_else(|| self.param(PARAM_TITLE).filter(|t| !t.is_empty()))
    }
}

/// Parsed body of a successful import call.
///
/// The server schema is loose, so the whole JSON object is kept.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UploadResponse(pub Map<String, Value>);

impl UploadResponse {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn success(&self) -> Option<bool> {
        self.get("success").and_then(Value::as_bool)
    }

    pub fn message(&self) -> Option<&str> {
        self.get("message").and_then(Value::as_str)
    }

    pub fn status(&self) -> Option<&str> {
        self.get("status").and_then(Value::as_str)
    }
}

/// Terminal result of a WifiDB call.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Success(T),
    Failure {
        /// HTTP status, or [`LOCAL_FAILURE_CODE`] for client-side failures
        status: u16,
        error: Option<Value>,
    },
}

impl<T> Outcome<T> {
    pub fn local_failure() -> Self {
        Outcome::Failure {
            status: LOCAL_FAILURE_CODE,
            error: None,
        }
    }

    pub fn server_failure(status: u16) -> Self {
        Outcome::Failure { status, error: None }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    /// Failure status code, `None` on success
    pub fn status(&self) -> Option<u16> {
        match self {
            Outcome::Success(_) => None,
            Outcome::Failure { status, .. } => Some(*status),
        }
    }

    /// True if the failure was produced locally rather than by the server
    pub fn is_local_failure(&self) -> bool {
        self.status() == Some(LOCAL_FAILURE_CODE)
    }
}

pub type UploadOutcome = Outcome<UploadResponse>;

/// Raw text of the waiting-import schedule
pub type ScheduleOutcome = Outcome<String>;
