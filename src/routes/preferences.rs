//! Preference routes: validate a JSON body and answer with `Set-Cookie`.
//!
//! Each endpoint is a two-state machine: awaiting request, responded. There
//! is no server-side retry; the handler validates, serializes the cookie and
//! returns. Every response body is JSON, including rejections.

use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use serde_json::{Map, Value};

use crate::preference::cookie::{parse_preferences, serialize_cookie};
use crate::preference::{Preference, PreferenceState};

// =============================================================================
// REJECTIONS
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum PreferenceRejection {
    #[error("Invalid request body")]
    InvalidBody { details: String },
    #[error("Invalid {field} value. Must be {accepted}")]
    InvalidValue { field: &'static str, accepted: &'static str },
    #[error("Method not allowed")]
    MethodNotAllowed,
}

impl PreferenceRejection {
    fn status(&self) -> StatusCode {
        match self {
            Self::InvalidBody { .. } | Self::InvalidValue { .. } => StatusCode::BAD_REQUEST,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
        }
    }
}

impl IntoResponse for PreferenceRejection {
    fn into_response(self) -> Response {
        let mut body = Map::new();
        body.insert("error".into(), Value::String(self.to_string()));
        if let Self::InvalidBody { details } = &self {
            body.insert("details".into(), Value::String(details.clone()));
        }

        let status = self.status();
        if matches!(self, Self::MethodNotAllowed) {
            return (status, [(header::ALLOW, "POST")], Json(Value::Object(body))).into_response();
        }
        (status, Json(Value::Object(body))).into_response()
    }
}

// =============================================================================
// HANDLERS
// =============================================================================

/// `POST /api/theme` and `POST /api/theme/direction`.
///
/// The body is read as raw bytes so a malformed document and an
/// out-of-range value produce distinct 400 messages. A body the extractor
/// refuses, such as one over the size limit, is an invalid body too.
pub async fn set_preference<P: Preference>(body: Result<Bytes, BytesRejection>) -> Response {
    let decoded = body
        .map_err(|e| PreferenceRejection::InvalidBody { details: e.body_text() })
        .and_then(|bytes| decode_body::<P>(&bytes));
    match decoded {
        Ok(value) => {
            tracing::info!(field = P::FIELD, value = value.as_str(), "preference cookie issued");
            acknowledge(value)
        }
        Err(rejection) => {
            tracing::debug!(field = P::FIELD, error = %rejection, "preference request rejected");
            rejection.into_response()
        }
    }
}

/// Any non-POST method on a preference endpoint.
pub async fn method_not_allowed() -> PreferenceRejection {
    PreferenceRejection::MethodNotAllowed
}

/// `GET /api/preferences`: decoded cookie values for the current request.
pub async fn current_preferences(headers: HeaderMap) -> Json<PreferenceState> {
    Json(parse_preferences(cookie_header(&headers).as_deref()))
}

// =============================================================================
// HELPERS
// =============================================================================

pub(crate) fn decode_body<P: Preference>(body: &[u8]) -> Result<P, PreferenceRejection> {
    let json: Value =
        serde_json::from_slice(body).map_err(|e| PreferenceRejection::InvalidBody { details: e.to_string() })?;

    // EDGE: a literal `null` document has no fields to read.
    if json.is_null() {
        return Err(PreferenceRejection::InvalidBody { details: "request body is null".into() });
    }

    json.get(P::FIELD)
        .and_then(Value::as_str)
        .and_then(P::parse)
        .ok_or(PreferenceRejection::InvalidValue { field: P::FIELD, accepted: P::ACCEPTED })
}

fn acknowledge<P: Preference>(value: P) -> Response {
    let mut body = Map::new();
    body.insert("success".into(), Value::Bool(true));
    body.insert(P::FIELD.into(), Value::String(value.as_str().to_owned()));

    (StatusCode::OK, [(header::SET_COOKIE, serialize_cookie(value))], Json(Value::Object(body))).into_response()
}

/// Join every `Cookie` header on the request; HTTP/2 may split them.
pub(crate) fn cookie_header(headers: &HeaderMap) -> Option<String> {
    let parts: Vec<&str> = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .collect();
    if parts.is_empty() { None } else { Some(parts.join("; ")) }
}

#[cfg(test)]
#[path = "preferences_test.rs"]
mod tests;
