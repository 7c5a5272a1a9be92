//! Integration tests for the record-correlate-export cycle

use chrono::{Duration, Utc};
use serde_json::json;
use tempfile::TempDir;
use tokio::net::TcpListener;

use hartrace::config::{Config, FilterConfig, LimitsConfig, RecorderConfig, ResponderConfig};
use hartrace::network::{HttpClient, ProxyServer};
use hartrace::proxy::{CannedResponder, HttpProxy, ResponderSet};
use hartrace::recording::{ActivityRecorder, Payload, RequestDescriptor, ResponseDescriptor};
use hartrace::HartraceError;

/// Create test configuration
fn create_test_config() -> Config {
    Config {
        listen_port: 0,
        upstream: None,
        export_dir: None,
        recorder: RecorderConfig {
            origin: "http://localhost:4200".to_string(),
            ..RecorderConfig::default()
        },
        filter: FilterConfig::default(),
        responders: vec![ResponderConfig {
            url: "api/fake".to_string(),
            status: 200,
            status_text: "OK".to_string(),
            body: json!({"fact": "cats sleep a lot"}),
        }],
        limits: LimitsConfig::default(),
    }
}

#[test]
fn test_record_correlate_export() {
    let config = create_test_config();
    let mut recorder = ActivityRecorder::new(config.recorder.clone());

    recorder.start_new_activity("/home");

    let t0 = Utc::now();
    let request = RequestDescriptor::new("GET", "api/fake").with_query("lang", "en");
    recorder.add_request(&request, t0).unwrap();

    let response = ResponseDescriptor::new("api/fake", 200)
        .with_status_text("OK")
        .with_body(Payload::Json(json!({"fact": "cats sleep a lot"})));
    let elapsed = recorder.add_response(&response, t0).unwrap();
    assert!(elapsed >= 0.0);

    let export = recorder.export().unwrap();
    assert!(export.file_name().ends_with(".har"));

    let har: serde_json::Value = serde_json::from_slice(export.body()).unwrap();
    let log = &har["log"];
    assert_eq!(log["version"], "1.2");
    assert_eq!(log["pages"].as_array().unwrap().len(), 1);
    assert_eq!(log["pages"][0]["title"], "http://localhost:4200/home");

    let entries = log["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["_initiator"]["type"], "document");
    assert_eq!(entries[0]["response"]["content"]["text"], "Generated");

    let entry = &entries[1];
    assert_eq!(entry["request"]["url"], "http://localhost:4200/api/fake");
    assert_eq!(entry["request"]["queryString"][0]["name"], "lang");
    assert_eq!(entry["response"]["status"], 200);
    assert_eq!(entry["_resourceType"], "xhr");

    let text = entry["response"]["content"]["text"].as_str().unwrap();
    let body: serde_json::Value = serde_json::from_str(text).unwrap();
    assert_eq!(body, json!({"fact": "cats sleep a lot"}));
}

#[test]
fn test_navigation_discards_previous_page() {
    let mut recorder = ActivityRecorder::new(create_test_config().recorder);

    recorder.start_new_activity("/home");
    recorder
        .add_request(&RequestDescriptor::new("GET", "api/one"), Utc::now())
        .unwrap();
    assert_eq!(recorder.session().entries().len(), 2);

    recorder.start_new_activity("/settings");
    let entries = recorder.session().entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].request.url, "http://localhost:4200/settings");
    assert_eq!(recorder.session().pending_count(), 0);
}

#[test]
fn test_export_before_navigation() {
    let mut recorder = ActivityRecorder::new(create_test_config().recorder);

    let t0 = Utc::now();
    recorder
        .add_request(&RequestDescriptor::new("GET", "api/early"), t0)
        .unwrap();
    recorder
        .add_response(
            &ResponseDescriptor::new("api/early", 200)
                .with_body(bytes::Bytes::from_static(&[0x89, b'P', b'N', b'G', 0xff])),
            t0,
        )
        .unwrap();

    let export = recorder.export().unwrap();
    let har: serde_json::Value = serde_json::from_slice(export.body()).unwrap();
    let log = &har["log"];
    assert_eq!(log["pages"].as_array().unwrap().len(), 1);
    assert_eq!(log["pages"][0]["title"], "http://localhost:4200");
    assert_eq!(log["entries"][0]["pageref"], log["pages"][0]["id"]);
    assert_eq!(log["entries"][0]["response"]["status"], 200);
    assert_eq!(log["entries"][0]["response"]["content"]["encoding"], "base64");
}

#[test]
fn test_response_without_request_is_reported() {
    let mut recorder = ActivityRecorder::new(create_test_config().recorder);
    recorder.start_new_activity("/home");

    let t0 = Utc::now();
    recorder
        .add_request(&RequestDescriptor::new("GET", "api/fake"), t0)
        .unwrap();

    let result = recorder.add_response(
        &ResponseDescriptor::new("api/fake", 200),
        t0 + Duration::milliseconds(5),
    );
    assert!(matches!(result, Err(HartraceError::CorrelationMiss { .. })));
    assert!(recorder.session().entries()[1].is_pending());

    let export = recorder.export().unwrap();
    let har: serde_json::Value = serde_json::from_slice(export.body()).unwrap();
    assert_eq!(har["log"]["entries"][1]["response"], json!({}));
}

#[tokio::test]
async fn test_proxy_with_custom_responders() {
    let mut responders = ResponderSet::new();
    responders.push(CannedResponder::new(
        "/api/users",
        "http://localhost:4200",
        404,
        json!({"error": "not found"}),
    ));

    let client = HttpClient::new(None, 1024 * 1024);
    let proxy = HttpProxy::new(&create_test_config(), client).with_responders(responders);
    proxy.navigate("/users").await;

    let response = proxy
        .handle_request(RequestDescriptor::new("GET", "/api/users"))
        .await
        .unwrap();
    assert_eq!(response.status, 404);

    let export = proxy.export().await.unwrap();
    let har: serde_json::Value = serde_json::from_slice(export.body()).unwrap();
    assert_eq!(har["log"]["entries"][1]["response"]["status"], 404);
}

#[tokio::test]
async fn test_server_records_and_exports() {
    let temp_dir = TempDir::new().unwrap();

    let config = create_test_config();
    let proxy = HttpProxy::new(&config, HttpClient::new(None, 1024 * 1024));
    let server = ProxyServer::new(proxy, &config.limits);
    let shutdown_tx = server.shutdown_handle();
    let recorder = std::sync::Arc::clone(server.proxy().recorder());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server_task = tokio::spawn(async move { server.run(listener).await });

    let client = HttpClient::new(Some(format!("http://{addr}")), 1024 * 1024);

    let navigated = client
        .forward(&RequestDescriptor::new(
            "POST",
            "/__hartrace/navigate?url=%2Fhome",
        ))
        .await
        .unwrap();
    assert_eq!(navigated.status, 204);

    let answered = client
        .forward(&RequestDescriptor::new("GET", "/api/fake"))
        .await
        .unwrap();
    assert_eq!(answered.status, 200);

    let downloaded = client
        .forward(&RequestDescriptor::new("GET", "/__hartrace/har"))
        .await
        .unwrap();
    assert_eq!(downloaded.status, 200);
    assert_eq!(downloaded.server_ip.as_deref(), Some("127.0.0.1"));
    assert!(downloaded
        .headers
        .iter()
        .any(|(name, value)| name == "content-disposition" && value.contains(".har")));

    let Some(Payload::Binary(body)) = downloaded.body else {
        panic!("archive download has no body");
    };
    let har: serde_json::Value = serde_json::from_slice(&body).unwrap();
    let entries = har["log"]["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["request"]["url"], "http://localhost:4200/home");
    assert_eq!(entries[1]["request"]["url"], "http://localhost:4200/api/fake");
    assert_eq!(entries[1]["response"]["status"], 200);

    shutdown_tx.send(()).unwrap();
    server_task.await.unwrap().unwrap();

    let export = recorder.lock().await.export().unwrap();
    let path = export.write_to(temp_dir.path()).unwrap();
    assert!(path.exists());
}
