//! Preference keys.
//!
//! The primary account and WifiDB live in separate key namespaces so that
//! activating one never overwrites the other's credentials.

// Primary account
pub const PREF_USERNAME: &str = "username";
pub const PREF_AUTHNAME: &str = "authname";
pub const PREF_TOKEN: &str = "token";
pub const PREF_BE_ANONYMOUS: &str = "beAnonymous";

// WifiDB
pub const PREF_WIFIDB_URL: &str = "wifidbUrl";
pub const PREF_WIFIDB_USERNAME: &str = "wifidbUsername";
pub const PREF_WIFIDB_APIKEY: &str = "wifidbApikey";
pub const PREF_WIFIDB_UPLOAD_FOLDER: &str = "wifidbUploadFolder";
pub const PREF_WIFIDB_AUTO_UPLOAD: &str = "wifidbAutoUpload";
pub const PREF_WIFIDB_AUTO_UPLOAD_BY_TIME: &str = "wifidbAutoUploadByTime";
pub const PREF_WIFIDB_AUTO_UPLOAD_VALUE: &str = "wifidbAutoUploadValue";
pub const PREF_WIFIDB_CLEAR_AFTER_UPLOAD: &str = "wifidbClearAfterUpload";
