use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use rust_quote::error::{TransportError, TransportErrorKind};
use rust_quote::market::eastmoney::{HttpTransport, ProviderRequest, Transport};

const TIMEOUT: Duration = Duration::from_secs(5);

fn transport() -> HttpTransport {
    HttpTransport::new().unwrap()
}

#[tokio::test]
async fn test_get_returns_parsed_json() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/qt/stock/get"))
        .and(query_param("secid", "1.600900"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "rc": 0,
            "data": {"f43": 23.45}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let request = ProviderRequest::get(format!("{}/api/qt/stock/get", server.uri()))
        .param("secid", "1.600900");
    let payload = transport().fetch(&request, TIMEOUT).await.unwrap();
    assert_eq!(payload["data"]["f43"], 23.45);
}

#[tokio::test]
async fn test_post_sends_json_body() {
    let server = MockServer::start().await;
    let body = json!({"appId": "appId01", "pageNo": 1, "pageSize": 100});
    Mock::given(method("POST"))
        .and(path("/stockrank/getAllCurrentList"))
        .and(body_json(body.clone()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"sc": "SH600519", "rk": 1}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let request =
        ProviderRequest::post_json(format!("{}/stockrank/getAllCurrentList", server.uri()), body);
    let payload = transport().fetch(&request, TIMEOUT).await.unwrap();
    assert_eq!(payload["data"][0]["sc"], "SH600519");
}

#[tokio::test]
async fn test_non_success_status_is_classified() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let request = ProviderRequest::get(format!("{}/missing", server.uri()));
    let err = transport().fetch(&request, TIMEOUT).await.unwrap_err();
    assert_eq!(err, TransportError::HttpStatus { code: 404 });
    assert!(!err.is_transient());
}

#[tokio::test]
async fn test_invalid_json_is_malformed_payload() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("jQuery({\"rc\":0})"))
        .mount(&server)
        .await;

    let request = ProviderRequest::get(format!("{}/api/qt/stock/get", server.uri()));
    let err = transport().fetch(&request, TIMEOUT).await.unwrap_err();
    assert_eq!(err.kind(), TransportErrorKind::MalformedPayload);
}

#[tokio::test]
async fn test_slow_response_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"data": null}))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let request = ProviderRequest::get(format!("{}/slow", server.uri()));
    let err = transport()
        .fetch(&request, Duration::from_millis(200))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), TransportErrorKind::Timeout);
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_refused_connection_is_connection_failure() {
    let request = ProviderRequest::get("http://127.0.0.1:1/api/qt/stock/get");
    let err = transport().fetch(&request, TIMEOUT).await.unwrap_err();
    assert_eq!(err.kind(), TransportErrorKind::ConnectionFailure);
}
