//! `/update-time`: stores the watched-time total posted by the frontend.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderName, Method, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use log::debug;

/// Sent on every response, preflight or not.
fn cors_headers() -> [(HeaderName, &'static str); 3] {
    [
        (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
        (header::ACCESS_CONTROL_ALLOW_METHODS, "POST, OPTIONS"),
        (header::ACCESS_CONTROL_ALLOW_HEADERS, "Content-Type"),
    ]
}

/// Process-wide total shared by all requests.
#[derive(Debug, Default)]
pub struct TimeTracker {
    total: AtomicI64,
}

impl TimeTracker {
    pub fn total(&self) -> i64 {
        self.total.load(Ordering::Relaxed)
    }

    fn set(&self, value: i64) {
        self.total.store(value, Ordering::Relaxed);
    }
}

pub async fn update_time(
    State(tracker): State<Arc<TimeTracker>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if method == Method::OPTIONS {
        return (StatusCode::OK, cors_headers()).into_response();
    }
    if method != Method::POST {
        return (
            StatusCode::METHOD_NOT_ALLOWED,
            cors_headers(),
            "Method not allowed. Use POST to update.",
        )
            .into_response();
    }

    let value = match form_value(&uri, &headers, &body, "time") {
        Ok(value) => value.unwrap_or_default(),
        Err(e) => {
            debug!("Rejecting /update-time form: {e}");
            return bad_request("Error parsing form");
        }
    };

    let Some(total) = parse_leading_int(&value) else {
        return bad_request("Invalid time format");
    };

    tracker.set(total);
    (
        StatusCode::OK,
        cors_headers(),
        format!("Total time updated to {total}"),
    )
        .into_response()
}

/// Plain-text 400 whose body ends in a newline.
fn bad_request(message: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        cors_headers(),
        format!("{message}\n"),
    )
        .into_response()
}

/// First value of `key`, looking at an urlencoded body before the query string.
fn form_value(
    uri: &Uri,
    headers: &HeaderMap,
    body: &[u8],
    key: &str,
) -> Result<Option<String>, serde_urlencoded::de::Error> {
    let is_form = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"));

    let mut pairs: Vec<(String, String)> = Vec::new();
    if is_form {
        pairs.extend(serde_urlencoded::from_bytes::<Vec<(String, String)>>(body)?);
    }
    if let Some(query) = uri.query() {
        pairs.extend(serde_urlencoded::from_str::<Vec<(String, String)>>(query)?);
    }

    Ok(pairs.into_iter().find(|(k, _)| k == key).map(|(_, v)| v))
}

/// Parse a leading base-10 integer, ignoring anything after its digits.
fn parse_leading_int(input: &str) -> Option<i64> {
    let s = input.trim_start();
    let sign_len = usize::from(s.starts_with(['+', '-']));
    let digits = s[sign_len..]
        .bytes()
        .take_while(u8::is_ascii_digit)
        .count();
    if digits == 0 {
        return None;
    }
    s[..sign_len + digits].parse().ok()
}
