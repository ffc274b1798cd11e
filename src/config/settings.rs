use anyhow::Result;
use log::debug;

use crate::config::keys::*;
use crate::config::preferences::Preferences;
use crate::constants::DEFAULT_AUTO_UPLOAD_VALUE;
use crate::models::UploadTarget;

/// WifiDB section of the preferences, with defaults applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WifiDbSettings {
    pub url: String,
    pub username: String,
    pub api_key: String,
    pub upload_folder: Option<String>,
    pub auto_upload: bool,
    /// Auto-upload every `auto_upload_value` minutes when true, every
    /// `auto_upload_value` new observations when false
    pub auto_upload_by_time: bool,
    pub auto_upload_value: i64,
    pub clear_after_upload: bool,
}

impl WifiDbSettings {
    pub fn load(prefs: &Preferences) -> Self {
        let upload_folder = prefs.get_string(PREF_WIFIDB_UPLOAD_FOLDER, "");
        WifiDbSettings {
            url: prefs.get_string(PREF_WIFIDB_URL, ""),
            username: prefs.get_string(PREF_WIFIDB_USERNAME, ""),
            api_key: prefs.get_string(PREF_WIFIDB_APIKEY, ""),
            upload_folder: Some(upload_folder).filter(|f| !f.is_empty()),
            auto_upload: prefs.get_bool(PREF_WIFIDB_AUTO_UPLOAD, false),
            auto_upload_by_time: prefs.get_bool(PREF_WIFIDB_AUTO_UPLOAD_BY_TIME, true),
            auto_upload_value: prefs.get_int(PREF_WIFIDB_AUTO_UPLOAD_VALUE, DEFAULT_AUTO_UPLOAD_VALUE),
            clear_after_upload: prefs.get_bool(PREF_WIFIDB_CLEAR_AFTER_UPLOAD, false),
        }
    }

    /// Target for the pipeline; empty credentials mean anonymous
    pub fn target(&self) -> UploadTarget {
        let non_empty = |s: &str| Some(s.to_string()).filter(|s| !s.is_empty());
        UploadTarget::new(self.url.clone())
            .with_credentials(non_empty(&self.username), non_empty(&self.api_key))
    }
}

/// Store a trimmed credential-like string; blank input removes the key.
///
/// Returns `false` when the trimmed value equals what is stored already.
/// Changing the primary account username also drops the cached authname and
/// token, which belong to the old identity. WifiDB keys never touch the
/// primary account.
pub fn update_credential(prefs: &Preferences, key: &str, value: &str) -> Result<bool> {
    let value = value.trim();
    if prefs.get_string(key, "") == value {
        return Ok(false);
    }

    let mut editor = prefs.edit();
    if value.is_empty() {
        editor.remove(key);
    } else {
        editor.put_string(key, value);
    }
    if key == PREF_USERNAME {
        editor.remove(PREF_AUTHNAME).remove(PREF_TOKEN);
    }
    editor.apply()?;
    debug!("Updated preference {}", key);
    Ok(true)
}

/// Parse the auto-upload interval from free text. Anything that is not an
/// integer clears the setting so the default applies again.
pub fn set_auto_upload_value(prefs: &Preferences, text: &str) -> Result<Option<i64>> {
    let parsed = text.trim().parse::<i64>().ok();
    let mut editor = prefs.edit();
    match parsed {
        Some(value) => editor.put_int(PREF_WIFIDB_AUTO_UPLOAD_VALUE, value),
        None => editor.remove(PREF_WIFIDB_AUTO_UPLOAD_VALUE),
    };
    editor.apply()?;
    Ok(parsed)
}

/// Store a boolean preference. Returns `false` when it already had that value.
pub fn set_flag(prefs: &Preferences, key: &str, enabled: bool) -> Result<bool> {
    if prefs.contains(key) && prefs.get_bool(key, !enabled) == enabled {
        return Ok(false);
    }
    let mut editor = prefs.edit();
    editor.put_bool(key, enabled);
    editor.apply()?;
    debug!("Set {} = {}", key, enabled);
    Ok(true)
}

/// Set the folder auto-upload watches; blank input unsets it.
pub fn set_upload_folder(prefs: &Preferences, folder: &str) -> Result<bool> {
    update_credential(prefs, PREF_WIFIDB_UPLOAD_FOLDER, folder)
}
