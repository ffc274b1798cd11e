use std::net::TcpListener;

use httpmock::Method::GET;
use httpmock::MockServer;
use serde_json::json;

use wifidb_uploader::activation::{
    create_redeem_client, process_detections, redeem_wifidb_link, Activation, RedeemError,
};
use wifidb_uploader::config::keys::{
    PREF_BE_ANONYMOUS, PREF_TOKEN, PREF_USERNAME, PREF_WIFIDB_APIKEY, PREF_WIFIDB_USERNAME,
};
use wifidb_uploader::config::Preferences;

fn can_bind_localhost() -> bool {
    TcpListener::bind("127.0.0.1:0").is_ok()
}

fn redeem_url(server: &MockServer, token: &str) -> String {
    server.url(format!("/wifidb/cp/redeem_link.php?token={}", token))
}

#[tokio::test]
async fn redeem_link_stores_wifidb_credentials_only() {
    if !can_bind_localhost() {
        eprintln!("Skipping httpmock tests: cannot bind to localhost");
        return;
    }

    let server = MockServer::start();
    let redeem = server.mock(|when, then| {
        when.method(GET)
            .path("/wifidb/cp/redeem_link.php")
            .query_param("token", "OneTime42");
        then.status(200)
            .json_body(json!({ "apikey": "k3y", "username": "bob" }));
    });

    let prefs = Preferences::in_memory();
    let mut editor = prefs.edit();
    editor.put_string(PREF_USERNAME, "alice").put_string(PREF_TOKEN, "t0k");
    editor.apply().unwrap();

    let client = create_redeem_client().unwrap();
    let payloads = vec![format!("  {}  ", redeem_url(&server, "OneTime42"))];
    let activation = process_detections(payloads, &prefs, &client).await.unwrap();

    redeem.assert();
    assert!(matches!(activation, Some(Activation::WifiDbRedeem { .. })));
    assert_eq!(prefs.get_string(PREF_WIFIDB_APIKEY, ""), "k3y");
    assert_eq!(prefs.get_string(PREF_WIFIDB_USERNAME, ""), "bob");
    assert!(!prefs.get_bool(PREF_BE_ANONYMOUS, true));
    // Primary account untouched
    assert_eq!(prefs.get_string(PREF_USERNAME, ""), "alice");
    assert_eq!(prefs.get_string(PREF_TOKEN, ""), "t0k");
}

#[tokio::test]
async fn redeem_without_username_keeps_existing_one() {
    if !can_bind_localhost() {
        eprintln!("Skipping httpmock tests: cannot bind to localhost");
        return;
    }

    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/wifidb/cp/redeem_link.php");
        then.status(200).body(r#"{"apikey":"fresh"}"#);
    });

    let prefs = Preferences::in_memory();
    let mut editor = prefs.edit();
    editor.put_string(PREF_WIFIDB_USERNAME, "carol");
    editor.apply().unwrap();

    let client = create_redeem_client().unwrap();
    process_detections([redeem_url(&server, "abc")], &prefs, &client)
        .await
        .unwrap();

    assert_eq!(prefs.get_string(PREF_WIFIDB_USERNAME, ""), "carol");
    assert_eq!(prefs.get_string(PREF_WIFIDB_APIKEY, ""), "fresh");
}

#[tokio::test]
async fn redeem_rejects_non_200_status() {
    if !can_bind_localhost() {
        eprintln!("Skipping httpmock tests: cannot bind to localhost");
        return;
    }

    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/wifidb/cp/redeem_link.php");
        then.status(201).json_body(json!({ "apikey": "k3y" }));
    });

    let client = create_redeem_client().unwrap();
    match redeem_wifidb_link(&client, &redeem_url(&server, "used")).await {
        Err(RedeemError::Status(status)) => assert_eq!(status, 201),
        other => panic!("unexpected result {:?}", other),
    }
}

#[tokio::test]
async fn failed_redeem_leaves_preferences_alone() {
    if !can_bind_localhost() {
        eprintln!("Skipping httpmock tests: cannot bind to localhost");
        return;
    }

    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/wifidb/cp/redeem_link.php");
        then.status(200).json_body(json!({ "username": "bob" }));
    });

    let prefs = Preferences::in_memory();
    let client = create_redeem_client().unwrap();

    match redeem_wifidb_link(&client, &redeem_url(&server, "t")).await {
        Err(RedeemError::MissingApiKey) => {}
        other => panic!("unexpected result {:?}", other),
    }
    assert!(process_detections([redeem_url(&server, "t")], &prefs, &client)
        .await
        .is_err());
    assert!(prefs.snapshot().is_empty());
}

#[tokio::test]
async fn unreachable_redeem_host_is_network_error() {
    let client = create_redeem_client().unwrap();
    let result = redeem_wifidb_link(&client, "http://127.0.0.1:9/cp/redeem_link.php?token=x").await;
    assert!(matches!(result, Err(RedeemError::Network(_))));
}
