//! JSON HTTP client with timeout, retry and interceptors.
//!
//! DESIGN
//! ======
//! Two flavours share one implementation. The internal client talks to the
//! same origin: 10s timeout, exponential-backoff retry on transient failures,
//! and a cookie store so `Set-Cookie` from the preference endpoints is kept
//! and sent back. The external client talks to third-party APIs: 30s timeout,
//! no retry, bearer token injection.
//!
//! Retry state lives in the per-request `RequestMeta`, never in the client,
//! so concurrent requests cannot consume each other's attempts.
//!
//! ERROR HANDLING
//! ==============
//! Every failure is normalized into `ApiError { message, status, code,
//! details }`. Transport errors from reqwest never reach the caller.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, error, info};

use crate::config::{ClientConfig, RetryPolicy, api_token_from_env};

pub const E_TIMEOUT: &str = "E_TIMEOUT";
pub const E_NETWORK: &str = "E_NETWORK";
pub const E_BAD_REQUEST: &str = "E_BAD_REQUEST";
pub const E_BAD_RESPONSE: &str = "E_BAD_RESPONSE";
pub const E_DECODE: &str = "E_DECODE";
pub const E_REQUEST_BUILD: &str = "E_REQUEST_BUILD";
pub const E_CLIENT_BUILD: &str = "E_CLIENT_BUILD";

// =============================================================================
// ERROR
// =============================================================================

/// Normalized client error.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct ApiError {
    pub message: String,
    /// HTTP status, absent when no response was received.
    pub status: Option<u16>,
    pub code: Option<String>,
    /// Response body of a failed request, when there was one.
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    fn new(message: impl Into<String>, code: &str) -> Self {
        Self { message: message.into(), status: None, code: Some(code.to_owned()), details: None }
    }

    fn from_transport(err: &reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            return Self::new(format!("timeout of {}ms exceeded", timeout.as_millis()), E_TIMEOUT);
        }
        let mut api = Self::new(format!("Network Error: {err}"), E_NETWORK);
        api.status = err.status().map(|s| s.as_u16());
        api
    }

    fn from_status(status: StatusCode, body: &[u8]) -> Self {
        let code = if status.is_server_error() { E_BAD_RESPONSE } else { E_BAD_REQUEST };
        let details = if body.is_empty() {
            None
        } else {
            serde_json::from_slice(body)
                .ok()
                .or_else(|| Some(serde_json::Value::String(String::from_utf8_lossy(body).into_owned())))
        };
        Self {
            message: format!("Request failed with status code {}", status.as_u16()),
            status: Some(status.as_u16()),
            code: Some(code.to_owned()),
            details,
        }
    }

    /// Grepable code, `E_UNKNOWN` when none was assigned.
    #[must_use]
    pub fn error_code(&self) -> &str {
        self.code.as_deref().unwrap_or("E_UNKNOWN")
    }

    /// True when the request never produced a response.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        self.status.is_none() && matches!(self.code.as_deref(), Some(E_TIMEOUT | E_NETWORK))
    }
}

// =============================================================================
// REQUEST METADATA
// =============================================================================

/// Per-request options and retry bookkeeping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestMeta {
    /// Retries already performed for this request.
    pub retry_count: u32,
    /// Opt out of the retry policy.
    pub skip_retry: bool,
    /// Overrides the client-wide timeout.
    pub timeout: Option<Duration>,
}

impl RequestMeta {
    #[must_use]
    pub fn no_retry() -> Self {
        Self { skip_retry: true, ..Self::default() }
    }

    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout: Some(timeout), ..Self::default() }
    }
}

/// Retry decision for a failed attempt. Pure in its inputs.
#[must_use]
pub fn should_retry(meta: &RequestMeta, err: &ApiError, policy: &RetryPolicy) -> bool {
    if meta.skip_retry || meta.retry_count >= policy.max_retries {
        return false;
    }
    match err.status {
        None => err.is_transport(),
        Some(status) => policy.retryable_statuses.contains(&status),
    }
}

/// `base * 2^retry_count`, saturating.
#[must_use]
pub fn backoff_delay(retry_count: u32, base: Duration) -> Duration {
    let factor = 2u32.checked_pow(retry_count).unwrap_or(u32::MAX);
    base.saturating_mul(factor)
}

// =============================================================================
// INTERCEPTORS
// =============================================================================

/// Hooks run around every attempt, including retries.
pub trait Interceptor: Send + Sync {
    fn on_request(&self, _request: &mut reqwest::Request) {}

    fn on_response(&self, _method: &Method, _url: &str, _status: StatusCode) {}

    fn on_error(&self, _method: &Method, _url: &str, _err: &ApiError) {}
}

/// Logs requests and responses at debug, failures at error.
pub struct LoggingInterceptor {
    pub label: &'static str,
}

impl Interceptor for LoggingInterceptor {
    fn on_request(&self, request: &mut reqwest::Request) {
        debug!(client = self.label, method = %request.method(), url = %request.url(), "api request");
    }

    fn on_response(&self, method: &Method, url: &str, status: StatusCode) {
        debug!(client = self.label, %method, url, status = status.as_u16(), "api response");
    }

    fn on_error(&self, method: &Method, url: &str, err: &ApiError) {
        error!(
            client = self.label,
            %method,
            url,
            status = ?err.status,
            code = err.error_code(),
            error = %err,
            "api error"
        );
    }
}

/// Adds `Authorization: Bearer <token>` when a token is configured.
pub struct BearerAuth {
    header: Option<HeaderValue>,
}

impl BearerAuth {
    #[must_use]
    pub fn new(token: Option<&str>) -> Self {
        let header = token
            .filter(|t| !t.is_empty())
            .and_then(|t| HeaderValue::from_str(&format!("Bearer {t}")).ok())
            .map(|mut v| {
                v.set_sensitive(true);
                v
            });
        Self { header }
    }
}

impl Interceptor for BearerAuth {
    fn on_request(&self, request: &mut reqwest::Request) {
        if let Some(value) = &self.header {
            request.headers_mut().insert(AUTHORIZATION, value.clone());
        }
    }
}

// =============================================================================
// CLIENT
// =============================================================================

#[derive(Clone)]
pub struct HttpClient {
    http: reqwest::Client,
    config: ClientConfig,
    interceptors: Vec<Arc<dyn Interceptor>>,
}

impl HttpClient {
    /// Same-origin client: retries, credentials kept in a cookie store.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn internal(config: ClientConfig) -> Result<Self, ApiError> {
        let http = base_builder().cookie_store(true).build().map_err(build_error)?;
        Ok(Self { http, config, interceptors: vec![Arc::new(LoggingInterceptor { label: "internal" })] })
    }

    /// Third-party client: no retry, optional bearer token.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn external(config: ClientConfig, token: Option<&str>) -> Result<Self, ApiError> {
        let http = base_builder().build().map_err(build_error)?;
        Ok(Self {
            http,
            config,
            interceptors: vec![
                Arc::new(BearerAuth::new(token)),
                Arc::new(LoggingInterceptor { label: "external" }),
            ],
        })
    }

    /// External client configured from `QPMATRIX_EXTERNAL_TIMEOUT_MS` and
    /// `QPMATRIX_API_TOKEN`.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn external_from_env(base_url: &str) -> Result<Self, ApiError> {
        let token = api_token_from_env();
        Self::external(ClientConfig::external_from_env(base_url), token.as_deref())
    }

    #[must_use]
    pub fn with_interceptor(mut self, interceptor: Arc<dyn Interceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_owned();
        }
        format!("{}/{}", self.config.base_url, path.trim_start_matches('/'))
    }

    // -------------------------------------------------------------------------
    // VERBS
    // -------------------------------------------------------------------------

    /// # Errors
    ///
    /// Returns the normalized error once retries are exhausted.
    pub async fn get<R: DeserializeOwned>(&self, path: &str) -> Result<R, ApiError> {
        self.send::<(), R>(Method::GET, path, None, RequestMeta::default()).await
    }

    /// # Errors
    ///
    /// Returns the normalized error once retries are exhausted.
    pub async fn post<B: Serialize + ?Sized, R: DeserializeOwned>(&self, path: &str, body: &B) -> Result<R, ApiError> {
        self.send(Method::POST, path, Some(body), RequestMeta::default()).await
    }

    /// # Errors
    ///
    /// Returns the normalized error once retries are exhausted.
    pub async fn put<B: Serialize + ?Sized, R: DeserializeOwned>(&self, path: &str, body: &B) -> Result<R, ApiError> {
        self.send(Method::PUT, path, Some(body), RequestMeta::default()).await
    }

    /// # Errors
    ///
    /// Returns the normalized error once retries are exhausted.
    pub async fn patch<B: Serialize + ?Sized, R: DeserializeOwned>(&self, path: &str, body: &B) -> Result<R, ApiError> {
        self.send(Method::PATCH, path, Some(body), RequestMeta::default()).await
    }

    /// # Errors
    ///
    /// Returns the normalized error once retries are exhausted.
    pub async fn delete<R: DeserializeOwned>(&self, path: &str) -> Result<R, ApiError> {
        self.send::<(), R>(Method::DELETE, path, None, RequestMeta::default()).await
    }

    /// `GET` a non-JSON resource, such as the document shell, as text.
    ///
    /// # Errors
    ///
    /// Returns the normalized error once retries are exhausted.
    pub async fn get_text(&self, path: &str) -> Result<String, ApiError> {
        let (_, bytes) = self.execute(&Method::GET, &self.url(path), None, RequestMeta::default()).await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Send a request, retrying transient failures per the client policy.
    ///
    /// # Errors
    ///
    /// Returns the normalized error of the last attempt.
    pub async fn send<B: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        meta: RequestMeta,
    ) -> Result<R, ApiError> {
        let payload = body
            .map(serde_json::to_vec)
            .transpose()
            .map_err(|e| ApiError::new(format!("request body encode failed: {e}"), E_REQUEST_BUILD))?;
        let (status, bytes) = self.execute(&method, &self.url(path), payload.as_deref(), meta).await?;

        // EDGE: an empty success body decodes as JSON `null`.
        let slice: &[u8] = if bytes.is_empty() { b"null" } else { &bytes };
        serde_json::from_slice(slice).map_err(|e| {
            let mut err = ApiError::new(format!("response decode failed: {e}"), E_DECODE);
            err.status = Some(status.as_u16());
            err
        })
    }

    async fn execute(
        &self,
        method: &Method,
        url: &str,
        payload: Option<&[u8]>,
        mut meta: RequestMeta,
    ) -> Result<(StatusCode, Vec<u8>), ApiError> {
        loop {
            match self.attempt(method, url, payload, &meta).await {
                Ok(response) => return Ok(response),
                Err(err) => {
                    for interceptor in &self.interceptors {
                        interceptor.on_error(method, url, &err);
                    }
                    if !should_retry(&meta, &err, &self.config.retry) {
                        return Err(err);
                    }

                    let delay = backoff_delay(meta.retry_count, self.config.retry.base_delay);
                    meta.retry_count += 1;
                    info!(
                        %method,
                        url = %url,
                        attempt = meta.retry_count,
                        max = self.config.retry.max_retries,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "retrying request"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn attempt(
        &self,
        method: &Method,
        url: &str,
        payload: Option<&[u8]>,
        meta: &RequestMeta,
    ) -> Result<(StatusCode, Vec<u8>), ApiError> {
        let timeout = meta.timeout.unwrap_or(self.config.timeout);
        let mut builder = self.http.request(method.clone(), url).timeout(timeout);
        if let Some(bytes) = payload {
            builder = builder.body(bytes.to_vec());
        }
        let mut request = builder
            .build()
            .map_err(|e| ApiError::new(format!("request build failed: {e}"), E_REQUEST_BUILD))?;
        for interceptor in &self.interceptors {
            interceptor.on_request(&mut request);
        }

        let response = self
            .http
            .execute(request)
            .await
            .map_err(|e| ApiError::from_transport(&e, timeout))?;
        let status = response.status();
        for interceptor in &self.interceptors {
            interceptor.on_response(method, url, status);
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ApiError::from_transport(&e, timeout))?;
        if !status.is_success() {
            return Err(ApiError::from_status(status, &bytes));
        }
        Ok((status, bytes.to_vec()))
    }
}

fn base_builder() -> reqwest::ClientBuilder {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    reqwest::Client::builder().default_headers(headers)
}

fn build_error(err: reqwest::Error) -> ApiError {
    ApiError::new(format!("HTTP client build failed: {err}"), E_CLIENT_BUILD)
}

#[cfg(test)]
#[path = "http_test.rs"]
mod tests;
