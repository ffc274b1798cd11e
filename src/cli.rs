use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Command-line arguments for the wifidb-uploader tool.
///
/// Server URL and credentials come from the preferences file; use the
/// `config` subcommand to change them.
#[derive(Parser, Debug)]
#[clap(name = "wifidb-uploader", about = "Upload wardriving exports to a WifiDB server")]
pub struct Args {
    /// Preferences file (default: $HOME/.wifidb-uploader/prefs.yaml)
    #[clap(long, global = true)]
    pub prefs: Option<PathBuf>,

    /// Verbose logging
    #[clap(short, long, global = true)]
    pub verbose: bool,

    #[clap(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Upload a CSV or gzip export
    Upload {
        /// File to upload
        file: PathBuf,

        /// Name on the server; a .csv.gz name compresses plain CSV first
        #[clap(short, long)]
        name: Option<String>,

        /// Extra form parameter, may be repeated
        #[clap(short, long = "param", value_name = "KEY=VALUE", value_parser = parse_key_val)]
        params: Vec<(String, String)>,
    },

    /// Show imports waiting on the server
    Schedule,

    /// Apply a scanned activation payload or WifiDB redeem link
    Activate {
        payload: String,
    },

    /// Inspect or change stored settings
    #[clap(subcommand)]
    Config(ConfigCommand),
}

/// Preference maintenance.
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the stored settings with secrets masked
    Show,

    /// Set the WifiDB base URL, e.g. https://host/wifidb/api/
    SetUrl {
        url: String,
    },

    /// Set WifiDB credentials; an empty value clears it
    SetCredentials {
        #[clap(long)]
        username: Option<String>,

        #[clap(long)]
        apikey: Option<String>,
    },

    /// Set the auto-upload interval; non-numeric text restores the default
    SetAutoUploadValue {
        value: String,
    },

    /// Turn automatic upload of finished exports on or off
    SetAutoUpload {
        #[clap(value_enum)]
        state: Toggle,
    },

    /// Count the auto-upload interval in minutes or in new observations
    SetAutoUploadBy {
        #[clap(value_enum)]
        unit: AutoUploadBy,
    },

    /// Clear the local database after a successful upload
    SetClearAfterUpload {
        #[clap(value_enum)]
        state: Toggle,
    },

    /// Folder to watch for exports; an empty value unsets it
    SetUploadFolder {
        path: String,
    },
}

/// `on`/`off` switch for boolean settings
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Toggle {
    On,
    Off,
}

impl Toggle {
    pub fn enabled(self) -> bool {
        self == Toggle::On
    }
}

/// Unit of the auto-upload interval
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum AutoUploadBy {
    Time,
    Count,
}

/// Parse `key=value`; the value may itself contain `=`.
fn parse_key_val(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got `{}`", s)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_upload_args() {
        let args = Args::parse_from(&[
            "wifidb-uploader",
            "--verbose",
            "upload", "run.csv",
            "--name", "upload.csv.gz",
            "--param", "title=Drive home",
            "-p", "notes=a=b",
        ]);

        assert!(args.verbose);
        assert_eq!(args.prefs, None);
        match args.command {
            Commands::Upload { file, name, params } => {
                assert_eq!(file, PathBuf::from("run.csv"));
                assert_eq!(name.as_deref(), Some("upload.csv.gz"));
                assert_eq!(
                    params,
                    vec![
                        ("title".to_string(), "Drive home".to_string()),
                        ("notes".to_string(), "a=b".to_string()),
                    ]
                );
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_bad_param_rejected() {
        let result = Args::try_parse_from(&["wifidb-uploader", "upload", "run.csv", "--param", "oops"]);
        assert!(result.is_err());
        let result = Args::try_parse_from(&["wifidb-uploader", "upload", "run.csv", "--param", "=x"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_config_subcommands() {
        let args = Args::parse_from(&[
            "wifidb-uploader",
            "config", "set-credentials",
            "--username", "alice",
            "--prefs", "/tmp/prefs.yaml",
        ]);
        assert_eq!(args.prefs, Some(PathBuf::from("/tmp/prefs.yaml")));
        match args.command {
            Commands::Config(ConfigCommand::SetCredentials { username, apikey }) => {
                assert_eq!(username.as_deref(), Some("alice"));
                assert_eq!(apikey, None);
            }
            other => panic!("unexpected command {:?}", other),
        }

        let args = Args::parse_from(&["wifidb-uploader", "config", "set-auto-upload-value", "15"]);
        assert!(matches!(
            args.command,
            Commands::Config(ConfigCommand::SetAutoUploadValue { ref value }) if value == "15"
        ));
    }

    #[test]
    fn test_auto_upload_settings() {
        let args = Args::parse_from(&["wifidb-uploader", "config", "set-auto-upload", "on"]);
        match args.command {
            Commands::Config(ConfigCommand::SetAutoUpload { state }) => assert!(state.enabled()),
            other => panic!("unexpected command {:?}", other),
        }

        let args = Args::parse_from(&["wifidb-uploader", "config", "set-auto-upload-by", "count"]);
        assert!(matches!(
            args.command,
            Commands::Config(ConfigCommand::SetAutoUploadBy { unit: AutoUploadBy::Count })
        ));

        let args = Args::parse_from(&["wifidb-uploader", "config", "set-clear-after-upload", "off"]);
        match args.command {
            Commands::Config(ConfigCommand::SetClearAfterUpload { state }) => assert!(!state.enabled()),
            other => panic!("unexpected command {:?}", other),
        }

        let args = Args::parse_from(&["wifidb-uploader", "config", "set-upload-folder", "/sdcard/wigle"]);
        assert!(matches!(
            args.command,
            Commands::Config(ConfigCommand::SetUploadFolder { ref path }) if path == "/sdcard/wigle"
        ));

        assert!(Args::try_parse_from(&["wifidb-uploader", "config", "set-auto-upload", "maybe"]).is_err());
        assert!(Args::try_parse_from(&["wifidb-uploader", "config", "set-auto-upload-by", "distance"]).is_err());
    }

    #[test]
    fn test_schedule_and_activate() {
        let args = Args::parse_from(&["wifidb-uploader", "schedule"]);
        assert!(matches!(args.command, Commands::Schedule));

        let args = Args::parse_from(&["wifidb-uploader", "activate", "alice:AID1:tok"]);
        assert!(matches!(args.command, Commands::Activate { ref payload } if payload == "alice:AID1:tok"));
    }
}
