//! Middleware for logging requests and responses.

use axum::{
    body::{Body, Bytes},
    extract::Request,
    http::{HeaderMap, HeaderValue, Method, StatusCode, Uri, header::CONTENT_TYPE},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::Value;

use crate::{Error, routing::MAX_REQUEST_BODY_BYTES};

/// Bodies longer than this many bytes are truncated in `info` level logs.
pub const LOG_BODY_LENGTH_LIMIT: usize = 64;

/// JSON fields whose values must never be written to the logs.
const REDACTED_FIELDS: [&str; 8] = [
    "password",
    "password_actual",
    "password_nuevo",
    "access",
    "refresh",
    "id_token",
    "token",
    "recaptcha_token",
];

/// Headers whose values must never be written to the logs.
const REDACTED_HEADERS: [&str; 3] = ["authorization", "cookie", "set-cookie"];

const REDACTED: &str = "********";

/// Log the request and response for each request.
///
/// Both the request and response are logged at the `info` level.
/// If a body is longer than [LOG_BODY_LENGTH_LIMIT] bytes, it is
/// truncated and the full body is logged at the `debug` level.
/// Credentials in headers and passwords and tokens in JSON bodies are redacted.
/// Only JSON and text bodies are read and logged, so uploaded photos and
/// served media files pass through untouched.
///
/// Request bodies larger than [MAX_REQUEST_BODY_BYTES] are rejected with
/// [Error::RequestTooLarge].
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let (parts, body) = request.into_parts();

    let request = if is_loggable(&parts.headers) {
        let body_bytes = match axum::body::to_bytes(body, MAX_REQUEST_BODY_BYTES).await {
            Ok(bytes) => bytes,
            Err(error) => {
                tracing::warn!("could not read request body: {error}");
                return Error::RequestTooLarge.into_response();
            }
        };
        log_request(&parts.method, &parts.uri, &parts.headers, &body_text(&body_bytes));

        Request::from_parts(parts, Body::from(body_bytes))
    } else {
        log_request(&parts.method, &parts.uri, &parts.headers, "<body not logged>");
        Request::from_parts(parts, body)
    };

    let response = next.run(request).await;

    let (parts, body) = response.into_parts();

    if !is_loggable(&parts.headers) {
        log_response(parts.status, &parts.headers, "<body not logged>");
        return Response::from_parts(parts, body);
    }

    let body_bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(error) => {
            tracing::error!("could not read response body: {error}");
            Bytes::new()
        }
    };
    log_response(parts.status, &parts.headers, &body_text(&body_bytes));

    Response::from_parts(parts, Body::from(body_bytes))
}

/// Whether the body is JSON or text. A missing content type counts as text,
/// since requests without a body usually do not set one.
fn is_loggable(headers: &HeaderMap) -> bool {
    let Some(content_type) = headers.get(CONTENT_TYPE) else {
        return true;
    };

    content_type.to_str().is_ok_and(|content_type| {
        let content_type = content_type.to_ascii_lowercase();
        content_type.starts_with("application/json") || content_type.starts_with("text/")
    })
}

fn body_text(bytes: &Bytes) -> String {
    redact_secrets(&String::from_utf8_lossy(bytes))
}

/// A copy of `headers` with the values of [REDACTED_HEADERS] replaced.
fn redact_headers(headers: &HeaderMap) -> HeaderMap {
    let mut headers = headers.clone();

    for name in REDACTED_HEADERS {
        if headers.contains_key(name) {
            headers.insert(name, HeaderValue::from_static(REDACTED));
        }
    }

    headers
}

/// Replace the values of [REDACTED_FIELDS] in `body` if it is a JSON object.
///
/// Bodies that are not JSON are returned unchanged.
fn redact_secrets(body: &str) -> String {
    let Ok(mut json) = serde_json::from_str::<Value>(body) else {
        return body.to_owned();
    };

    if !redact_value(&mut json) {
        return body.to_owned();
    }

    json.to_string()
}

/// Returns whether anything was redacted.
fn redact_value(value: &mut Value) -> bool {
    match value {
        Value::Object(map) => {
            let mut redacted = false;

            for (key, field) in map.iter_mut() {
                if REDACTED_FIELDS.contains(&key.as_str()) && !field.is_null() {
                    *field = Value::String(REDACTED.to_owned());
                    redacted = true;
                } else {
                    redacted |= redact_value(field);
                }
            }

            redacted
        }
        Value::Array(items) => items
            .iter_mut()
            .fold(false, |redacted, item| redact_value(item) || redacted),
        _ => false,
    }
}

/// Shorten `body` to at most [LOG_BODY_LENGTH_LIMIT] bytes without splitting a character.
fn truncate(body: &str) -> &str {
    if body.len() <= LOG_BODY_LENGTH_LIMIT {
        return body;
    }

    let mut end = LOG_BODY_LENGTH_LIMIT;
    while !body.is_char_boundary(end) {
        end -= 1;
    }

    &body[..end]
}

fn log_request(method: &Method, uri: &Uri, headers: &HeaderMap, body: &str) {
    let headers = redact_headers(headers);

    if body.len() > LOG_BODY_LENGTH_LIMIT {
        tracing::info!(
            "Received request: {method} {uri}\nheaders: {headers:#?}\nbody: {:}...",
            truncate(body)
        );
        tracing::debug!("Full request body: {body:?}");
    } else {
        tracing::info!("Received request: {method} {uri}\nheaders: {headers:#?}\nbody: {body:?}");
    }
}

fn log_response(status: StatusCode, headers: &HeaderMap, body: &str) {
    let headers = redact_headers(headers);

    if body.len() > LOG_BODY_LENGTH_LIMIT {
        tracing::info!(
            "Sending response: {status}\nheaders: {headers:#?}\nbody: {:}...",
            truncate(body)
        );
        tracing::debug!("Full response body: {body:?}");
    } else {
        tracing::info!("Sending response: {status}\nheaders: {headers:#?}\nbody: {body:?}");
    }
}
