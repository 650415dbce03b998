use super::*;
use crate::routes::test_helpers::serve;
use axum::Router;
use axum::http::HeaderMap as AxumHeaderMap;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use serde_json::{Value, json};
use std::sync::atomic::{AtomicUsize, Ordering};

fn fast_config(base_url: &str, max_retries: u32) -> ClientConfig {
    let mut config = ClientConfig::internal(base_url);
    config.retry.max_retries = max_retries;
    config.retry.base_delay = Duration::from_millis(1);
    config
}

/// Router whose `/flaky` answers `status` for the first `failures` hits.
async fn flaky_server(failures: usize, status: u16) -> (String, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);
    let router = Router::new().route(
        "/flaky",
        post(move || {
            let counter = Arc::clone(&counter);
            async move {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                if n <= failures {
                    let status = axum::http::StatusCode::from_u16(status).unwrap();
                    (status, axum::Json(json!({ "error": "unavailable" }))).into_response()
                } else {
                    axum::Json(json!({ "ok": true, "hits": n })).into_response()
                }
            }
        }),
    );
    (serve(router).await, hits)
}

// =============================================================================
// pure helpers
// =============================================================================

#[test]
fn backoff_doubles_from_base() {
    let base = Duration::from_millis(1_000);
    assert_eq!(backoff_delay(0, base), Duration::from_millis(1_000));
    assert_eq!(backoff_delay(1, base), Duration::from_millis(2_000));
    assert_eq!(backoff_delay(2, base), Duration::from_millis(4_000));
}

#[test]
fn backoff_saturates() {
    assert_eq!(backoff_delay(64, Duration::from_secs(1)), Duration::from_secs(1).saturating_mul(u32::MAX));
}

#[test]
fn should_retry_statuses_and_transport() {
    let policy = RetryPolicy::default();
    let meta = RequestMeta::default();
    for status in [408, 429, 500, 502, 503, 504] {
        let err = ApiError::from_status(StatusCode::from_u16(status).unwrap(), b"");
        assert!(should_retry(&meta, &err, &policy), "status {status}");
    }
    for status in [400, 401, 404, 405, 501] {
        let err = ApiError::from_status(StatusCode::from_u16(status).unwrap(), b"");
        assert!(!should_retry(&meta, &err, &policy), "status {status}");
    }
    assert!(should_retry(&meta, &ApiError::new("down", E_NETWORK), &policy));
    assert!(should_retry(&meta, &ApiError::new("slow", E_TIMEOUT), &policy));
    assert!(!should_retry(&meta, &ApiError::new("bad", E_REQUEST_BUILD), &policy));
}

#[test]
fn should_retry_respects_counter_and_opt_out() {
    let policy = RetryPolicy::default();
    let err = ApiError::new("down", E_NETWORK);
    let exhausted = RequestMeta { retry_count: 3, ..RequestMeta::default() };
    assert!(!should_retry(&exhausted, &err, &policy));
    assert!(!should_retry(&RequestMeta::no_retry(), &err, &policy));
    let third = RequestMeta { retry_count: 2, ..RequestMeta::default() };
    assert!(should_retry(&third, &err, &policy));
}

#[test]
fn from_status_keeps_json_details() {
    let err = ApiError::from_status(StatusCode::BAD_REQUEST, br#"{"error":"nope"}"#);
    assert_eq!(err.status, Some(400));
    assert_eq!(err.error_code(), E_BAD_REQUEST);
    assert_eq!(err.details, Some(json!({ "error": "nope" })));
    assert_eq!(err.message, "Request failed with status code 400");
}

#[test]
fn from_status_keeps_text_details() {
    let err = ApiError::from_status(StatusCode::BAD_GATEWAY, b"upstream down");
    assert_eq!(err.error_code(), E_BAD_RESPONSE);
    assert_eq!(err.details, Some(Value::String("upstream down".into())));
}

#[test]
fn bearer_auth_skips_empty_token() {
    assert!(BearerAuth::new(None).header.is_none());
    assert!(BearerAuth::new(Some("")).header.is_none());
    assert!(BearerAuth::new(Some("abc")).header.is_some());
}

// =============================================================================
// live server
// =============================================================================

#[tokio::test]
async fn transient_failures_are_retried_until_success() {
    let (base, hits) = flaky_server(2, 503).await;
    let client = HttpClient::internal(fast_config(&base, 3)).unwrap();

    let body: Value = client.post("/flaky", &json!({})).await.unwrap();
    assert_eq!(body["ok"], true);
    assert_eq!(hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn exhausted_retries_return_normalized_error() {
    let (base, hits) = flaky_server(usize::MAX, 503).await;
    let client = HttpClient::internal(fast_config(&base, 3)).unwrap();

    let err = client.post::<_, Value>("/flaky", &json!({})).await.unwrap_err();
    assert_eq!(hits.load(Ordering::SeqCst), 4);
    assert_eq!(err.status, Some(503));
    assert_eq!(err.error_code(), E_BAD_RESPONSE);
    assert_eq!(err.details, Some(json!({ "error": "unavailable" })));
}

#[tokio::test]
async fn non_retryable_status_fails_immediately() {
    let (base, hits) = flaky_server(usize::MAX, 400).await;
    let client = HttpClient::internal(fast_config(&base, 3)).unwrap();

    let err = client.post::<_, Value>("/flaky", &json!({})).await.unwrap_err();
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert_eq!(err.status, Some(400));
}

#[tokio::test]
async fn skip_retry_sends_once() {
    let (base, hits) = flaky_server(usize::MAX, 503).await;
    let client = HttpClient::internal(fast_config(&base, 3)).unwrap();

    let result = client
        .send::<Value, Value>(Method::POST, "/flaky", Some(&json!({})), RequestMeta::no_retry())
        .await;
    assert!(result.is_err());
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn external_client_does_not_retry() {
    let (base, hits) = flaky_server(usize::MAX, 503).await;
    let client = HttpClient::external(ClientConfig::external(&base), None).unwrap();

    let err = client.post::<_, Value>("/flaky", &json!({})).await.unwrap_err();
    assert_eq!(err.status, Some(503));
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn unreachable_server_is_network_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = HttpClient::internal(fast_config(&format!("http://{addr}"), 2)).unwrap();
    let err = client.get::<Value>("/anything").await.unwrap_err();
    assert_eq!(err.status, None);
    assert_eq!(err.error_code(), E_NETWORK);
}

#[tokio::test]
async fn slow_response_times_out_and_retries() {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);
    let router = Router::new().route(
        "/slow",
        get(move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(500)).await;
                axum::Json(json!({}))
            }
        }),
    );
    let base = serve(router).await;
    let mut config = fast_config(&base, 1);
    config.timeout = Duration::from_millis(50);
    let client = HttpClient::internal(config).unwrap();

    let err = client.get::<Value>("/slow").await.unwrap_err();
    assert_eq!(err.error_code(), E_TIMEOUT);
    assert_eq!(err.status, None);
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn undecodable_success_body_is_decode_error() {
    let router = Router::new().route("/text", get(|| async { "plain text" }));
    let base = serve(router).await;
    let client = HttpClient::internal(fast_config(&base, 3)).unwrap();

    let err = client.get::<Value>("/text").await.unwrap_err();
    assert_eq!(err.error_code(), E_DECODE);
    assert_eq!(err.status, Some(200));
}

#[tokio::test]
async fn empty_success_body_decodes_as_unit() {
    let router = Router::new().route("/empty", axum::routing::delete(|| async { axum::http::StatusCode::NO_CONTENT }));
    let base = serve(router).await;
    let client = HttpClient::internal(fast_config(&base, 0)).unwrap();

    client.delete::<()>("/empty").await.unwrap();
}

#[tokio::test]
async fn common_headers_and_bearer_token_are_sent() {
    let router = Router::new().route(
        "/echo",
        post(|headers: AxumHeaderMap| async move {
            let read = |name: &str| headers.get(name).and_then(|v| v.to_str().ok()).unwrap_or_default().to_owned();
            axum::Json(json!({
                "authorization": read("authorization"),
                "accept": read("accept"),
                "content_type": read("content-type"),
            }))
        }),
    );
    let base = serve(router).await;
    let client = HttpClient::external(ClientConfig::external(&base), Some("secret")).unwrap();

    let body: Value = client.post("/echo", &json!({ "x": 1 })).await.unwrap();
    assert_eq!(body["authorization"], "Bearer secret");
    assert_eq!(body["accept"], "application/json");
    assert_eq!(body["content_type"], "application/json");
}

struct CountingInterceptor {
    requests: AtomicUsize,
    errors: AtomicUsize,
}

impl Interceptor for CountingInterceptor {
    fn on_request(&self, _request: &mut reqwest::Request) {
        self.requests.fetch_add(1, Ordering::SeqCst);
    }

    fn on_error(&self, _method: &Method, _url: &str, _err: &ApiError) {
        self.errors.fetch_add(1, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn interceptors_run_on_every_attempt() {
    let (base, _hits) = flaky_server(1, 502).await;
    let counting = Arc::new(CountingInterceptor { requests: AtomicUsize::new(0), errors: AtomicUsize::new(0) });
    let client = HttpClient::internal(fast_config(&base, 3))
        .unwrap()
        .with_interceptor(counting.clone());

    let _: Value = client.post("/flaky", &json!({})).await.unwrap();
    assert_eq!(counting.requests.load(Ordering::SeqCst), 2);
    assert_eq!(counting.errors.load(Ordering::SeqCst), 1);
}

#[test]
fn url_joins_base_and_path() {
    let client = HttpClient::internal(ClientConfig::internal("http://host:1/")).unwrap();
    assert_eq!(client.url("/api/theme"), "http://host:1/api/theme");
    assert_eq!(client.url("api/theme"), "http://host:1/api/theme");
    assert_eq!(client.url("https://other/x"), "https://other/x");
}
