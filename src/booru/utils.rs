//! Response classification helpers
//!
//! Pure functions so the client's error contract can be unit tested without
//! a server.

use reqwest::Url;

use super::error::BooruError;

const UNKNOWN_ERROR: &str = "Unknown error";

/// Accepts any JSON media type, e.g. `application/json; charset=utf-8`
/// or `application/vnd.api+json`
pub fn is_json_content_type(content_type: &str) -> bool {
    match content_type.parse::<mime::Mime>() {
        Ok(media_type) => {
            media_type.subtype() == mime::JSON
                || media_type.suffix().is_some_and(|suffix| suffix == mime::JSON)
        }
        Err(_) => false,
    }
}

/// Extract the `error` field of a JSON error body
pub fn error_message(body: &[u8]) -> String {
    serde_json::from_slice::<serde_json::Value>(body)
        .ok()
        .and_then(|value| value.get("error").and_then(|e| e.as_str()).map(str::to_string))
        .unwrap_or_else(|| UNKNOWN_ERROR.to_string())
}

/// Host as shown to users: the authority, including an explicit port
pub fn host_label(url: &Url) -> String {
    match (url.host_str(), url.port()) {
        (Some(host), Some(port)) => format!("{host}:{port}"),
        (Some(host), None) => host.to_string(),
        (None, _) => url.as_str().to_string(),
    }
}

/// Error for a 2xx response that does not honour the body contract
pub fn invalid_body(code: u16, url: &str, body: &[u8]) -> BooruError {
    let body = String::from_utf8_lossy(body).into_owned();
    BooruError::Api {
        code,
        message: format!("Failed to call derpibooru API. '{url}' returned invalid body: {body}"),
        body,
    }
}

/// Map a transport error onto the error contract
pub fn classify_transport(err: reqwest::Error, host: &str) -> BooruError {
    if err.is_builder() {
        BooruError::Client(err.to_string())
    } else if err.is_connect() || err.is_timeout() || err.is_request() || err.is_body() {
        BooruError::Connection {
            host: host.to_string(),
        }
    } else {
        BooruError::Client(err.to_string())
    }
}
