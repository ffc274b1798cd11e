//! Account activation from scanned barcode payloads.
//!
//! Two payload shapes are recognized:
//!
//! - `username:authname:token`, the primary account activation string
//! - a WifiDB one-time link (`.../redeem_link.php?token=...`), which is
//!   exchanged over HTTP for a WifiDB API key
//!
//! The primary account and WifiDB credentials live in separate preference
//! namespaces; redeeming a WifiDB link never touches the primary account.

use std::fmt;
use std::time::Duration;

use anyhow::{Context, Result};
use lazy_static::lazy_static;
use log::{debug, error, info, warn};
use regex::Regex;
use reqwest::StatusCode;
use serde::Deserialize;

use crate::config::keys::{
    PREF_AUTHNAME, PREF_BE_ANONYMOUS, PREF_TOKEN, PREF_USERNAME, PREF_WIFIDB_APIKEY,
    PREF_WIFIDB_USERNAME,
};
use crate::config::Preferences;
use crate::constants::{ACCOUNT_ACTIVATION_PATTERN, REDEEM_TIMEOUT_SECS, WIFIDB_REDEEM_MARKER};
use crate::security::scrub_credentials;

lazy_static! {
    static ref ACCOUNT_ACTIVATION: Regex = Regex::new(ACCOUNT_ACTIVATION_PATTERN)
        .expect("account activation pattern is a valid regex");
}

/// Primary account credentials carried by an activation code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountActivation {
    pub username: String,
    pub authname: String,
    pub token: String,
}

/// What a scanned payload asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Activation {
    Account(AccountActivation),
    WifiDbRedeem { url: String },
}

/// Credentials handed out by a WifiDB redeem link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WifiDbCredentials {
    pub username: Option<String>,
    pub api_key: String,
}

#[derive(Debug, Deserialize)]
struct RedeemResponse {
    #[serde(default)]
    apikey: Option<String>,
    #[serde(default)]
    username: Option<String>,
}

/// Why a redeem link could not be exchanged.
#[derive(Debug)]
pub enum RedeemError {
    /// Connection, timeout or body read failure
    Network(reqwest::Error),
    /// Any status other than 200, kept as received
    Status(u16),
    /// Body was not the expected JSON object
    Parse(serde_json::Error),
    /// JSON parsed but had no usable `apikey`
    MissingApiKey,
}

impl fmt::Display for RedeemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RedeemError::Network(e) => {
                write!(f, "network error redeeming WifiDB token: {}", scrub_credentials(&e.to_string()))
            }
            RedeemError::Status(status) => write!(f, "WifiDB redeem returned HTTP {}", status),
            RedeemError::Parse(e) => write!(f, "failed to parse redeem JSON: {}", e),
            RedeemError::MissingApiKey => f.write_str("apikey not found in WifiDB response"),
        }
    }
}

impl std::error::Error for RedeemError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RedeemError::Network(e) => Some(e),
            RedeemError::Parse(e) => Some(e),
            _ => None,
        }
    }
}

/// Recognize a scanned display value.
///
/// The account format is checked first, so a value matching both shapes is
/// treated as an account activation.
pub fn classify(display_value: &str) -> Option<Activation> {
    if ACCOUNT_ACTIVATION.is_match(display_value) {
        let mut fields = display_value.split(':');
        let mut next = || fields.next().unwrap_or_default().to_string();
        return Some(Activation::Account(AccountActivation {
            username: next(),
            authname: next(),
            token: next(),
        }));
    }
    if display_value.contains(WIFIDB_REDEEM_MARKER) {
        return Some(Activation::WifiDbRedeem {
            url: display_value.trim().to_string(),
        });
    }
    None
}

/// Store the primary account credentials and leave anonymous mode.
pub fn apply_account_activation(prefs: &Preferences, activation: &AccountActivation) -> Result<()> {
    let mut editor = prefs.edit();
    editor
        .put_string(PREF_USERNAME, activation.username.as_str())
        .put_string(PREF_AUTHNAME, activation.authname.as_str())
        .put_string(PREF_TOKEN, activation.token.as_str())
        .put_bool(PREF_BE_ANONYMOUS, false);
    editor.apply().context("Failed to store account activation")?;
    info!("Activated account {}", activation.username);
    Ok(())
}

/// HTTP client with the short timeouts used for redeem links.
pub fn create_redeem_client() -> Result<reqwest::Client> {
    let timeout = Duration::from_secs(REDEEM_TIMEOUT_SECS);
    reqwest::Client::builder()
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(timeout)
        .timeout(timeout)
        .build()
        .context("Failed to create redeem HTTP client")
}

/// Exchange a WifiDB one-time link for credentials.
///
/// Only HTTP 200 is accepted. The body must be a JSON object with a
/// non-empty `apikey`; `username` is optional.
pub async fn redeem_wifidb_link(
    client: &reqwest::Client,
    url: &str,
) -> std::result::Result<WifiDbCredentials, RedeemError> {
    info!("Attempting to redeem WifiDB URL: {}", scrub_credentials(url));

    let response = client.get(url).send().await.map_err(RedeemError::Network)?;
    let status = response.status();
    info!("WifiDB redeem response code: {}", status.as_u16());
    if status != StatusCode::OK {
        return Err(RedeemError::Status(status.as_u16()));
    }

    let body = response.text().await.map_err(RedeemError::Network)?;
    debug!("WifiDB redeem response body: {}", scrub_credentials(&body));
    parse_redeem_response(&body)
}

fn parse_redeem_response(body: &str) -> std::result::Result<WifiDbCredentials, RedeemError> {
    let parsed: RedeemResponse = serde_json::from_str(body).map_err(RedeemError::Parse)?;
    match parsed.apikey.filter(|k| !k.is_empty()) {
        Some(api_key) => Ok(WifiDbCredentials {
            username: parsed.username,
            api_key,
        }),
        None => Err(RedeemError::MissingApiKey),
    }
}

/// Write redeemed credentials into the WifiDB namespace.
pub fn store_wifidb_credentials(prefs: &Preferences, credentials: &WifiDbCredentials) -> Result<()> {
    let mut editor = prefs.edit();
    if let Some(username) = &credentials.username {
        editor.put_string(PREF_WIFIDB_USERNAME, username.as_str());
    }
    editor
        .put_string(PREF_WIFIDB_APIKEY, credentials.api_key.as_str())
        .put_bool(PREF_BE_ANONYMOUS, false);
    editor.apply().context("Failed to store WifiDB credentials")?;
    info!("Stored WifiDB credentials from redeem link");
    Ok(())
}

/// Act on the first recognizable payload among `values`.
///
/// Returns the activation that was applied, or `None` if nothing matched.
/// Later payloads are ignored once one has been recognized.
pub async fn process_detections<I, S>(
    values: I,
    prefs: &Preferences,
    client: &reqwest::Client,
) -> Result<Option<Activation>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let Some(activation) = values.into_iter().find_map(|v| classify(v.as_ref())) else {
        debug!("No activation payload among detections");
        return Ok(None);
    };

    match &activation {
        Activation::Account(account) => apply_account_activation(prefs, account)?,
        Activation::WifiDbRedeem { url } => match redeem_wifidb_link(client, url).await {
            Ok(credentials) => store_wifidb_credentials(prefs, &credentials)?,
            Err(e) => {
                error!("Error redeeming WifiDB token: {}", e);
                if let RedeemError::Status(status) = &e {
                    warn!("Redeem link rejected with HTTP {}", status);
                }
                return Err(e).context("Failed to redeem WifiDB link");
            }
        },
    }
    Ok(Some(activation))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_classify_account() {
        assert_eq!(
            classify("alice:AID12345:abcDEF987"),
            Some(Activation::Account(AccountActivation {
                username: "alice".into(),
                authname: "AID12345".into(),
                token: "abcDEF987".into(),
            }))
        );
        // Empty trailing fields still match
        assert!(matches!(classify("alice::"), Some(Activation::Account(a)) if a.token.is_empty()));
        // Non-alphanumeric token does not
        assert_eq!(classify("alice:AID:tok-en"), None);
    }

    #[test]
    fn test_classify_redeem_link() {
        let link = "  https://db.example.net/wifidb/cp/redeem_link.php?token=Xyz123 \n";
        assert_eq!(
            classify(link),
            Some(Activation::WifiDbRedeem {
                url: "https://db.example.net/wifidb/cp/redeem_link.php?token=Xyz123".into()
            })
        );
        assert_eq!(classify("https://wigle.net/"), None);
        assert_eq!(classify(""), None);
    }

    #[test]
    fn test_parse_redeem_response() {
        let creds = parse_redeem_response(r#"{"apikey":"k3y","username":"bob"}"#).unwrap();
        assert_eq!(creds.api_key, "k3y");
        assert_eq!(creds.username.as_deref(), Some("bob"));

        let creds = parse_redeem_response(r#"{"apikey":"k3y"}"#).unwrap();
        assert_eq!(creds.username, None);

        assert!(matches!(parse_redeem_response(r#"{"apikey":""}"#), Err(RedeemError::MissingApiKey)));
        assert!(matches!(parse_redeem_response(r#"{"username":"bob"}"#), Err(RedeemError::MissingApiKey)));
        assert!(matches!(parse_redeem_response("not json"), Err(RedeemError::Parse(_))));
    }

    #[test]
    fn test_account_and_wifidb_namespaces_are_separate() -> Result<()> {
        let prefs = Preferences::in_memory();
        apply_account_activation(
            &prefs,
            &AccountActivation {
                username: "alice".into(),
                authname: "AID1".into(),
                token: "t0k".into(),
            },
        )?;
        store_wifidb_credentials(
            &prefs,
            &WifiDbCredentials {
                username: Some("bob".into()),
                api_key: "k3y".into(),
            },
        )?;

        assert_eq!(prefs.get_string(PREF_USERNAME, ""), "alice");
        assert_eq!(prefs.get_string(PREF_TOKEN, ""), "t0k");
        assert_eq!(prefs.get_string(PREF_WIFIDB_USERNAME, ""), "bob");
        assert_eq!(prefs.get_string(PREF_WIFIDB_APIKEY, ""), "k3y");
        assert!(!prefs.get_bool(PREF_BE_ANONYMOUS, true));
        Ok(())
    }

    #[tokio::test]
    async fn test_process_detections_first_match_wins() -> Result<()> {
        let prefs = Preferences::in_memory();
        let client = create_redeem_client()?;
        // The redeem link would need the network; it is never reached
        let values = vec![
            "not a payload".to_string(),
            "carol:AID9:tok9".to_string(),
            "https://x/redeem_link.php?token=abc".to_string(),
        ];

        let activation = process_detections(values, &prefs, &client).await?;
        assert!(matches!(activation, Some(Activation::Account(_))));
        assert_eq!(prefs.get_string(PREF_USERNAME, ""), "carol");
        assert!(!prefs.contains(PREF_WIFIDB_APIKEY));

        assert_eq!(process_detections(Vec::<String>::new(), &prefs, &client).await?, None);
        Ok(())
    }

    proptest! {
        #[test]
        fn prop_account_fields_roundtrip(
            user in "[a-z0-9_.@]{1,16}",
            auth in "[a-zA-Z0-9]{0,12}",
            token in "[a-zA-Z0-9]{0,24}",
        ) {
            let payload = format!("{}:{}:{}", user, auth, token);
            match classify(&payload) {
                Some(Activation::Account(a)) => {
                    prop_assert_eq!(a.username, user);
                    prop_assert_eq!(a.authname, auth);
                    prop_assert_eq!(a.token, token);
                }
                other => prop_assert!(false, "unexpected {:?}", other),
            }
        }
    }
}
