//! Global constants for the wifidb-uploader application.
//!
//! This module centralizes all hardcoded values to improve maintainability
//! and make configuration changes easier.

// Status codes
/// Status reported for failures that happen on this side of the wire
/// (missing configuration, I/O, transport errors, unparseable responses).
/// Deliberately outside the 100-599 HTTP range.
pub const LOCAL_FAILURE_CODE: u16 = 999;

// Buffer size constants
/// Chunk size for gzip recompression of staged files (8KB)
pub const COMPRESSION_CHUNK_SIZE: usize = 8 * 1024;

/// Chunk size for streaming the upload body onto the wire (8KB)
pub const UPLOAD_CHUNK_SIZE: usize = 8 * 1024;

// Progress
/// Upper bound of the permille progress scale
pub const PROGRESS_SCALE: u64 = 1000;

// Timeout constants
/// Default connection timeout in seconds
pub const DEFAULT_CONNECTION_TIMEOUT_SECS: u64 = 30;

/// Connect and read timeout for WifiDB redeem links in seconds
pub const REDEEM_TIMEOUT_SECS: u64 = 5;

// WifiDB endpoints, relative to the configured base URL
pub const IMPORT_ENDPOINT: &str = "v2/import.php";
pub const SCHEDULE_ENDPOINT: &str = "v2/schedule.php";
pub const SCHEDULE_WAITING_FUNC: &str = "waiting";

// Multipart part names
pub const PART_FILE: &str = "file";
pub const PART_USERNAME: &str = "username";
pub const PART_APIKEY: &str = "apikey";

/// Extra parameter used as the remote filename when none is given explicitly
pub const PARAM_TITLE: &str = "title";

// Media types
pub const MEDIA_TYPE_GZIP: &str = "application/gzip";
pub const MEDIA_TYPE_CSV: &str = "text/csv";
pub const MEDIA_TYPE_OCTET_STREAM: &str = "application/octet-stream";

// File names and extensions
pub const COMPRESSED_CSV_SUFFIX: &str = ".csv.gz";
pub const FALLBACK_SUFFIX: &str = ".tmp";
pub const TEMP_FILE_PREFIX: &str = "wifidb_upload_";
pub const TEMP_GZIP_PREFIX: &str = "wifidb_upload_gz_";
pub const TEMP_DIR_NAME: &str = "wifidb-uploader";
pub const EXPORT_FILE_PREFIX: &str = "WigleWifi_";
/// chrono format of the timestamp in export file names
pub const EXPORT_TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

// Events
/// Buffered artifact announcements per subscriber before it lags
pub const ARTIFACT_EVENT_CAPACITY: usize = 64;

// Preference defaults
pub const DEFAULT_PREFS_DIR: &str = ".wifidb-uploader";
pub const DEFAULT_PREFS_FILE: &str = "prefs.yaml";
pub const DEFAULT_AUTO_UPLOAD_VALUE: i64 = 60;

// Barcode payload markers
/// Primary account activation: `username:authname:token`
pub const ACCOUNT_ACTIVATION_PATTERN: &str = r"^.*:[a-zA-Z0-9]*:[a-zA-Z0-9]*$";

/// Substring identifying a WifiDB one-time redeem link
pub const WIFIDB_REDEEM_MARKER: &str = "redeem_link.php?token=";

// Error messages
pub const ERROR_MISSING_BASE_URL: &str = "WifiDB base URL is not configured";
pub const ERROR_FAILED_TO_STAGE: &str = "Failed to stage upload payload";
pub const ERROR_FAILED_TO_COMPRESS: &str = "Failed to compress file";
pub const ERROR_CANCELLED: &str = "cancelled";
