//! Tests for the HTTP and FiveM checkers against mock HTTP servers

use monitoring::{CheckerRegistry, MonitorConfig, MonitorStatus};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mock_page(status: u16, body: &str) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(status).set_body_string(body))
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn test_http_keyword_found() {
    let server = mock_page(200, "<html>Status: ...OK...</html>").await;
    let config = MonitorConfig::new("http")
        .with_url(format!("{}/health", server.uri()))
        .with_expected_keyword("ok")
        .with_timeout(5);

    let result = CheckerRegistry::global().check(&config).await.unwrap();

    assert_eq!(result.status(), MonitorStatus::Up, "{:?}", result.error_message());
    assert_eq!(result.status_code(), Some(200));
}

#[tokio::test]
async fn test_http_keyword_missing() {
    let server = mock_page(200, "<html>Status: ...OK...</html>").await;
    let config = MonitorConfig::new("http")
        .with_url(format!("{}/health", server.uri()))
        .with_expected_keyword("MISSING")
        .with_timeout(5);

    let result = CheckerRegistry::global().check(&config).await.unwrap();

    assert_eq!(result.status(), MonitorStatus::Down);
    assert!(result.error_message().unwrap().contains("keyword"));
    assert_eq!(result.status_code(), Some(200));
}

#[tokio::test]
async fn test_http_any_2xx_accepted_by_default() {
    let server = mock_page(204, "").await;
    let config = MonitorConfig::new("http").with_url(format!("{}/health", server.uri()));

    let result = CheckerRegistry::global().check(&config).await.unwrap();

    assert_eq!(result.status(), MonitorStatus::Up);
    assert_eq!(result.status_code(), Some(204));
}

#[tokio::test]
async fn test_http_unexpected_status() {
    let server = mock_page(503, "maintenance").await;
    let config = MonitorConfig::new("http").with_url(format!("{}/health", server.uri()));

    let result = CheckerRegistry::global().check(&config).await.unwrap();

    assert_eq!(result.status(), MonitorStatus::Down);
    assert_eq!(result.error_message(), Some("Unexpected status code: 503"));
    assert_eq!(result.status_code(), Some(503));
}

#[tokio::test]
async fn test_http_expected_status_exact_match() {
    let server = mock_page(404, "gone").await;
    let config = MonitorConfig::new("http")
        .with_url(format!("{}/health", server.uri()))
        .with_expected_status_code(404);

    let result = CheckerRegistry::global().check(&config).await.unwrap();
    assert_eq!(result.status(), MonitorStatus::Up);

    let server = mock_page(200, "fine").await;
    let config = MonitorConfig::new("http")
        .with_url(format!("{}/health", server.uri()))
        .with_expected_status_code(404);

    let result = CheckerRegistry::global().check(&config).await.unwrap();
    assert_eq!(result.status(), MonitorStatus::Down);
}

#[tokio::test]
async fn test_http_follows_redirects() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(
            ResponseTemplate::new(301).insert_header("location", format!("{}/new", server.uri())),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/new"))
        .respond_with(ResponseTemplate::new(200).set_body_string("moved here"))
        .mount(&server)
        .await;

    let config = MonitorConfig::new("http").with_url(format!("{}/old", server.uri()));
    let result = CheckerRegistry::global().check(&config).await.unwrap();

    assert_eq!(result.status(), MonitorStatus::Up);
    assert!(result.data_value("final_url").unwrap().as_str().unwrap().ends_with("/new"));
}

#[tokio::test]
async fn test_http_connection_refused() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let config = MonitorConfig::new("http").with_url(format!("http://{addr}/")).with_timeout(5);
    let result = CheckerRegistry::global().check(&config).await.unwrap();

    assert_eq!(result.status(), MonitorStatus::Down);
    assert!(result.error_message().unwrap().starts_with("HTTP request failed"));
    assert!(result.status_code().is_none());
}

async fn mock_fivem(info_status: u16) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/info.json"))
        .respond_with(ResponseTemplate::new(info_status).set_body_json(json!({
            "server": "FXServer-master v1.0.0.7290 linux",
            "resources": ["chat", "spawnmanager"],
            "vars": {"sv_projectName": "Test RP", "gametype": "Freeroam", "sv_maxClients": "48"}
        })))
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn test_fivem_up_with_all_endpoints() {
    let server = mock_fivem(200).await;
    Mock::given(method("GET"))
        .and(path("/players.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"name": "Alice", "id": 1, "ping": 30},
            {"name": "Bob", "id": 2, "ping": 55}
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/dynamic.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"sv_maxclients": "64"})))
        .mount(&server)
        .await;

    let addr = server.address();
    let config = MonitorConfig::new("fivem")
        .with_hostname(addr.ip().to_string())
        .with_port(addr.port());
    let result = CheckerRegistry::global().check(&config).await.unwrap();

    assert_eq!(result.status(), MonitorStatus::Up, "{:?}", result.error_message());
    assert_eq!(result.data_value("server_name").unwrap(), "Test RP");
    assert_eq!(result.data_value("players_online").unwrap(), 2);
    assert_eq!(result.data_value("players_max").unwrap(), 64);
    assert_eq!(result.data_value("resource_count").unwrap(), 2);
}

#[tokio::test]
async fn test_fivem_tolerates_missing_secondary_endpoints() {
    let server = mock_fivem(200).await;
    let addr = server.address();
    let config = MonitorConfig::new("redm")
        .with_hostname(addr.ip().to_string())
        .with_port(addr.port());

    let result = CheckerRegistry::global().check(&config).await.unwrap();

    assert_eq!(result.status(), MonitorStatus::Up);
    assert_eq!(result.data_value("players_online").unwrap(), 0);
    assert_eq!(result.data_value("players_max").unwrap(), 48);
}

#[tokio::test]
async fn test_fivem_info_failure_is_down() {
    let server = mock_fivem(500).await;
    let addr = server.address();
    let config = MonitorConfig::new("fivem")
        .with_hostname(addr.ip().to_string())
        .with_port(addr.port());

    let result = CheckerRegistry::global().check(&config).await.unwrap();

    assert_eq!(result.status(), MonitorStatus::Down);
    assert_eq!(result.status_code(), Some(500));
}
