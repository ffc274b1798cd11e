use std::env;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use log::{info, warn, LevelFilter};
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};
use tokio::runtime::Runtime;
use tokio::sync::oneshot;

use wifidb_uploader::activation::{create_redeem_client, process_detections, Activation};
use wifidb_uploader::cli::{Args, AutoUploadBy, Commands, ConfigCommand};
use wifidb_uploader::config::keys::{
    PREF_WIFIDB_APIKEY, PREF_WIFIDB_AUTO_UPLOAD, PREF_WIFIDB_AUTO_UPLOAD_BY_TIME,
    PREF_WIFIDB_CLEAR_AFTER_UPLOAD, PREF_WIFIDB_UPLOAD_FOLDER, PREF_WIFIDB_URL, PREF_WIFIDB_USERNAME,
};
use wifidb_uploader::config::{
    set_auto_upload_value, set_flag, set_upload_folder, update_credential, Preferences, WifiDbSettings,
};
use wifidb_uploader::constants::{DEFAULT_PREFS_DIR, DEFAULT_PREFS_FILE};
use wifidb_uploader::models::{Outcome, UploadRequest, UploadSource};
use wifidb_uploader::wifidb::{PipelineConfig, ProgressSink, UploadPipeline};

fn main() -> Result<()> {
    // Parse arguments
    let args = Args::parse();

    // Initialize logging
    initialize_logging(args.verbose)?;

    let prefs_path = resolve_prefs_path(args.prefs.as_deref())?;
    let prefs = Preferences::open(&prefs_path)?;

    match args.command {
        Commands::Upload { file, name, params } => {
            create_runtime()?.block_on(run_upload(&prefs, file, name, params))
        }
        Commands::Schedule => create_runtime()?.block_on(run_schedule(&prefs)),
        Commands::Activate { payload } => create_runtime()?.block_on(run_activate(&prefs, &payload)),
        Commands::Config(cmd) => handle_config(&prefs, cmd),
    }
}

/// Initialize logging with the specified verbosity level
fn initialize_logging(verbose: bool) -> Result<()> {
    let log_level = if verbose { LevelFilter::Debug } else { LevelFilter::Info };
    TermLogger::init(
        log_level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    ).context("Failed to initialize logger")?;
    Ok(())
}

/// `--prefs` if given, else `$HOME/.wifidb-uploader/prefs.yaml`
fn resolve_prefs_path(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    let home = env::var_os("HOME").ok_or_else(|| anyhow!("HOME is not set; pass --prefs"))?;
    Ok(PathBuf::from(home).join(DEFAULT_PREFS_DIR).join(DEFAULT_PREFS_FILE))
}

fn create_runtime() -> Result<Runtime> {
    Runtime::new().context("Failed to create Tokio runtime")
}

/// Upload one file and print the server response
async fn run_upload(
    prefs: &Preferences,
    file: PathBuf,
    name: Option<String>,
    params: Vec<(String, String)>,
) -> Result<()> {
    let settings = WifiDbSettings::load(prefs);
    let pipeline = UploadPipeline::new(PipelineConfig::default())?;

    let mut request = UploadRequest::new(UploadSource::LocalFile(file.clone()), settings.target());
    if let Some(name) = name {
        request = request.with_remote_filename(name);
    }
    for (key, value) in params {
        request = request.with_param(key, value);
    }

    info!("Uploading {} to {}", file.display(), settings.url);
    // Log each 10% step once
    let last_step = AtomicU16::new(0);
    let progress: Arc<dyn ProgressSink> = Arc::new(move |permille: u16| {
        let step = permille / 100;
        if last_step.fetch_max(step, Ordering::Relaxed) < step {
            info!("Upload progress: {}%", step * 10);
        }
    });
    let (tx, rx) = oneshot::channel();
    let handle = pipeline.submit(request, Some(progress), move |outcome| {
        let _ = tx.send(outcome);
    });
    let outcome = rx.await.context("Upload task ended without an outcome")?;
    handle.join().await?;

    match outcome {
        Outcome::Success(response) => {
            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(())
        }
        Outcome::Failure { status, error } => match error {
            Some(error) => bail!("Upload failed with status {}: {}", status, error),
            None => bail!("Upload failed with status {}", status),
        },
    }
}

/// Print the server's waiting-import schedule
async fn run_schedule(prefs: &Preferences) -> Result<()> {
    let settings = WifiDbSettings::load(prefs);
    let pipeline = UploadPipeline::new(PipelineConfig::default())?;

    match pipeline.schedule(&settings.target()).await {
        Outcome::Success(text) => {
            println!("{}", text);
            Ok(())
        }
        Outcome::Failure { status, .. } => bail!("Schedule request failed with status {}", status),
    }
}

async fn run_activate(prefs: &Preferences, payload: &str) -> Result<()> {
    let client = create_redeem_client()?;
    match process_detections([payload], prefs, &client).await? {
        Some(Activation::Account(account)) => {
            println!("Activated account {}", account.username);
            Ok(())
        }
        Some(Activation::WifiDbRedeem { .. }) => {
            let settings = WifiDbSettings::load(prefs);
            println!("WifiDB credentials stored for {}", display_or_unset(&settings.username));
            Ok(())
        }
        None => bail!("Not an activation code or WifiDB redeem link"),
    }
}

fn handle_config(prefs: &Preferences, cmd: ConfigCommand) -> Result<()> {
    match cmd {
        ConfigCommand::Show => {
            let settings = WifiDbSettings::load(prefs);
            if let Some(path) = prefs.path() {
                println!("Preferences:          {}", path.display());
            }
            println!("WifiDB URL:           {}", display_or_unset(&settings.url));
            println!("WifiDB username:      {}", display_or_unset(&settings.username));
            println!("WifiDB API key:       {}", mask(&settings.api_key));
            println!(
                "Upload folder:        {}",
                settings.upload_folder.as_deref().unwrap_or("<unset>")
            );
            println!("Auto upload:          {}", settings.auto_upload);
            println!(
                "Auto upload every:    {} {}",
                settings.auto_upload_value,
                if settings.auto_upload_by_time { "minutes" } else { "observations" }
            );
            println!("Clear after upload:   {}", settings.clear_after_upload);
        }
        ConfigCommand::SetUrl { url } => {
            if !url.trim().is_empty() && !url.trim().ends_with('/') {
                warn!("Base URL does not end with '/'; endpoints are appended verbatim");
            }
            report_update(PREF_WIFIDB_URL, update_credential(prefs, PREF_WIFIDB_URL, &url)?);
        }
        ConfigCommand::SetCredentials { username, apikey } => {
            if username.is_none() && apikey.is_none() {
                bail!("Nothing to set; pass --username and/or --apikey");
            }
            if let Some(username) = username {
                report_update(
                    PREF_WIFIDB_USERNAME,
                    update_credential(prefs, PREF_WIFIDB_USERNAME, &username)?,
                );
            }
            if let Some(apikey) = apikey {
                report_update(
                    PREF_WIFIDB_APIKEY,
                    update_credential(prefs, PREF_WIFIDB_APIKEY, &apikey)?,
                );
            }
        }
        ConfigCommand::SetAutoUploadValue { value } => match set_auto_upload_value(prefs, &value)? {
            Some(value) => println!("Auto upload value set to {}", value),
            None => println!("Auto upload value reset to default"),
        },
        ConfigCommand::SetAutoUpload { state } => {
            report_update(PREF_WIFIDB_AUTO_UPLOAD, set_flag(prefs, PREF_WIFIDB_AUTO_UPLOAD, state.enabled())?);
        }
        ConfigCommand::SetAutoUploadBy { unit } => {
            let by_time = unit == AutoUploadBy::Time;
            report_update(
                PREF_WIFIDB_AUTO_UPLOAD_BY_TIME,
                set_flag(prefs, PREF_WIFIDB_AUTO_UPLOAD_BY_TIME, by_time)?,
            );
        }
        ConfigCommand::SetClearAfterUpload { state } => {
            report_update(
                PREF_WIFIDB_CLEAR_AFTER_UPLOAD,
                set_flag(prefs, PREF_WIFIDB_CLEAR_AFTER_UPLOAD, state.enabled())?,
            );
        }
        ConfigCommand::SetUploadFolder { path } => {
            report_update(PREF_WIFIDB_UPLOAD_FOLDER, set_upload_folder(prefs, &path)?);
        }
    }
    Ok(())
}

fn report_update(key: &str, changed: bool) {
    if changed {
        println!("Updated {}", key);
    } else {
        println!("{} unchanged", key);
    }
}

fn display_or_unset(value: &str) -> &str {
    if value.is_empty() {
        "<unset>"
    } else {
        value
    }
}

/// Show only the last four characters of a secret
fn mask(secret: &str) -> String {
    if secret.is_empty() {
        return "<unset>".to_string();
    }
    let chars: Vec<char> = secret.chars().collect();
    let visible: String = chars[chars.len().saturating_sub(4)..].iter().collect();
    format!("{}{}", "*".repeat(chars.len().saturating_sub(4)), visible)
}
