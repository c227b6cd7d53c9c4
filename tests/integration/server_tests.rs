//! HTTP and WebSocket routes served on a real listener

use crate::common::{
    mount_publish_ok, mount_token, mount_xml, orchestrator, pages, test_config, urlset,
    PUBLISH_PATH,
};
use futures::{SinkExt, Stream, StreamExt};
use sitemap_indexer::server::{router, AppState};
use std::time::Duration;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{Error as WsError, Message as WsMessage};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Serves the router on an ephemeral port and returns its base URL
async fn spawn_app(site: &MockServer, force_secure: bool) -> String {
    let mut config = test_config(site);
    config.server.force_secure_websocket = force_secure;
    let state = AppState::new(orchestrator(&config, site, &[1, 2]), &config.server);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(state)).await.unwrap();
    });
    format!("http://{}", addr)
}

#[tokio::test]
async fn test_health_lists_credentials() {
    let site = MockServer::start().await;
    let app = spawn_app(&site, false).await;

    let body: serde_json::Value = reqwest::get(format!("{}/health", app))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["status"], "ok");
    assert_eq!(body["credentials"].as_array().unwrap().len(), 2);
    assert_eq!(body["credentials"][0]["name"], "API1");
    assert_eq!(body["credentials"][0]["remaining"], 200);
}

#[tokio::test]
async fn test_check_counts_urls_and_advertises_channel() {
    let site = MockServer::start().await;
    mount_xml(&site, "/sitemap.xml", urlset(&pages(&site, &[1, 2, 3]))).await;
    let app = spawn_app(&site, false).await;

    let client = reqwest::Client::new();
    let response = client
        .post(format!("{}/check", app))
        .json(&serde_json::json!({"domain": site.uri()}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["total"], 3);
    assert_eq!(body["candidates"], serde_json::json!([1, 2]));
    assert_eq!(body["details"].as_array().unwrap().len(), 2);
    assert!(body["websocketUrl"]
        .as_str()
        .unwrap()
        .starts_with("ws://"));
}

#[tokio::test]
async fn test_check_behind_tls_proxy_advertises_wss() {
    let site = MockServer::start().await;
    mount_xml(&site, "/sitemap.xml", urlset(&pages(&site, &[1]))).await;
    let app = spawn_app(&site, false).await;

    let body: serde_json::Value = reqwest::Client::new()
        .post(format!("{}/check", app))
        .header("x-forwarded-proto", "https")
        .header("x-forwarded-host", "indexer.example.com")
        .json(&serde_json::json!({"domain": site.uri()}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let channel = body["websocketUrl"].as_str().unwrap();
    assert!(channel.starts_with("wss://indexer.example.com/ws?domain="));
}

#[tokio::test]
async fn test_check_rejects_invalid_domain() {
    let site = MockServer::start().await;
    let app = spawn_app(&site, false).await;

    let response = reqwest::Client::new()
        .post(format!("{}/check", app))
        .json(&serde_json::json!({"domain": "  "}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
    let body: serde_json::Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("Invalid domain"));
}

#[tokio::test]
async fn test_check_reports_unreachable_sitemap() {
    let site = MockServer::start().await;
    let app = spawn_app(&site, true).await;

    let response = reqwest::Client::new()
        .post(format!("{}/check", app))
        .json(&serde_json::json!({"domain": site.uri()}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 502);
}

fn ws_base(app: &str) -> String {
    app.replacen("http://", "ws://", 1)
}

fn query(pairs: &[(&str, &str)]) -> String {
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in pairs {
        serializer.append_pair(key, value);
    }
    serializer.finish()
}

/// Reads text frames as JSON until the server closes the channel
async fn read_events<S>(socket: &mut S) -> Vec<serde_json::Value>
where
    S: Stream<Item = Result<WsMessage, WsError>> + Unpin,
{
    let mut events = Vec::new();
    while let Some(message) = socket.next().await {
        match message.unwrap() {
            WsMessage::Text(text) => events.push(serde_json::from_str(&text).unwrap()),
            WsMessage::Close(_) => break,
            _ => {}
        }
    }
    events
}

fn kinds<'a>(events: &'a [serde_json::Value], kind: &str) -> Vec<&'a serde_json::Value> {
    events.iter().filter(|e| e["kind"] == kind).collect()
}

fn http_status(result: Result<impl Sized, WsError>) -> u16 {
    match result {
        Err(WsError::Http(response)) => response.status().as_u16(),
        Err(other) => panic!("unexpected error: {}", other),
        Ok(_) => panic!("upgrade should have been refused"),
    }
}

#[tokio::test]
async fn test_websocket_streams_job_to_done() {
    let site = MockServer::start().await;
    mount_token(&site).await;
    mount_publish_ok(&site).await;
    mount_xml(&site, "/sitemap.xml", urlset(&pages(&site, &[1, 2]))).await;
    let app = spawn_app(&site, false).await;

    let url = format!(
        "{}/ws?{}",
        ws_base(&app),
        query(&[("domain", &site.uri()), ("credentialSlot", "2")])
    );
    let (mut socket, _) = connect_async(url).await.unwrap();
    let events = read_events(&mut socket).await;

    for (i, event) in events.iter().enumerate() {
        assert_eq!(event["ordinal"], i as u64 + 1);
    }
    let started = kinds(&events, "started");
    assert_eq!(started.len(), 2);
    assert!(started
        .iter()
        .all(|e| e["message"].as_str().unwrap().contains("API2")));
    assert_eq!(kinds(&events, "success").len(), 2);

    let last = events.last().unwrap();
    assert_eq!(last["kind"], "done");
    assert_eq!(last["totals"]["succeeded"], 2);
    assert!(last.get("cancelled").is_none());
}

#[tokio::test]
async fn test_websocket_cancel_message_ends_job() {
    let site = MockServer::start().await;
    mount_token(&site).await;
    Mock::given(method("POST"))
        .and(path(PUBLISH_PATH))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(200)))
        .mount(&site)
        .await;
    mount_xml(&site, "/sitemap.xml", urlset(&pages(&site, &[1, 2, 3, 4]))).await;
    let app = spawn_app(&site, false).await;

    let url = format!("{}/ws?{}", ws_base(&app), query(&[("domain", &site.uri())]));
    let (mut socket, _) = connect_async(url).await.unwrap();

    let mut events: Vec<serde_json::Value> = Vec::new();
    while let Some(message) = socket.next().await {
        let WsMessage::Text(text) = message.unwrap() else {
            continue;
        };
        let event: serde_json::Value = serde_json::from_str(&text).unwrap();
        if event["kind"] == "started" {
            socket
                .send(WsMessage::Text("{\"type\": \"cancel\"}".to_string()))
                .await
                .unwrap();
        }
        let done = event["kind"] == "done";
        events.push(event);
        if done {
            break;
        }
    }

    assert_eq!(kinds(&events, "started").len(), 1);
    let last = events.last().unwrap();
    assert_eq!(last["kind"], "done");
    assert_eq!(last["cancelled"], true);
}

#[tokio::test]
async fn test_websocket_path_form_pins_credential() {
    let site = MockServer::start().await;
    mount_token(&site).await;
    mount_publish_ok(&site).await;
    mount_xml(&site, "/sitemap.xml", urlset(&pages(&site, &[1]))).await;
    let app = spawn_app(&site, false).await;

    // Bare host:port; https is tried first and falls back to http
    let domain = site.uri().trim_start_matches("http://").to_string();
    let url = format!("{}/ws/api1/{}", ws_base(&app), domain);
    let (mut socket, _) = connect_async(url).await.unwrap();
    let events = read_events(&mut socket).await;

    let started = kinds(&events, "started");
    assert_eq!(started.len(), 1);
    assert!(started[0]["message"].as_str().unwrap().contains("API1"));
    assert_eq!(events.last().unwrap()["kind"], "done");
}

#[tokio::test]
async fn test_websocket_rejects_unknown_credentials() {
    let site = MockServer::start().await;
    let app = spawn_app(&site, false).await;

    let status = http_status(connect_async(format!("{}/ws/API9/example.com", ws_base(&app))).await);
    assert_eq!(status, 400);

    let url = format!(
        "{}/ws?{}",
        ws_base(&app),
        query(&[("domain", "example.com"), ("credentialSlot", "9")])
    );
    assert_eq!(http_status(connect_async(url).await), 400);
}

#[tokio::test]
async fn test_reset_credential_route() {
    let site = MockServer::start().await;
    let app = spawn_app(&site, false).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/credentials/API1/reset", app))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["name"], "API1");
    assert_eq!(body["consecutiveFailures"], 0);
    assert_eq!(body["usable"], true);

    let response = client
        .post(format!("{}/credentials/API4/reset", app))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);

    let response = client
        .post(format!("{}/credentials/bogus/reset", app))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
}
