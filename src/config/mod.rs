// Re-export all items from the submodules
pub mod keys;
mod preferences;
mod settings;

// Re-export the preference store
pub use preferences::{
    Editor,
    PrefValue,
    Preferences,
};

// Re-export WifiDB settings helpers
pub use settings::{
    WifiDbSettings,
    set_auto_upload_value,
    set_flag,
    set_upload_folder,
    update_credential,
};
