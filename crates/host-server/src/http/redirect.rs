use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use tracing::{info, warn};

const DEFAULT_HTTPS_PORT: u16 = 443;

#[derive(Debug, Clone)]
pub struct RedirectState {
    public_host: Arc<str>,
    https_port: u16,
}

impl RedirectState {
    pub fn new(public_host: impl Into<Arc<str>>, https_port: u16) -> Self {
        Self {
            public_host: public_host.into(),
            https_port,
        }
    }
}

pub(super) async fn redirect_to_https(
    State(state): State<RedirectState>,
    headers: HeaderMap,
    uri: Uri,
) -> Response {
    let host = headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok());
    let path_and_query = uri
        .path_and_query()
        .map(|value| value.as_str())
        .unwrap_or("/");

    let location = redirect_location(host, path_and_query, &state.public_host, state.https_port);
    let Ok(location_header) = HeaderValue::from_str(&location) else {
        warn!(location = %location, "refusing to redirect to an invalid location");
        return StatusCode::BAD_REQUEST.into_response();
    };

    info!(
        host = host.unwrap_or_default(),
        path = %path_and_query,
        location = %location,
        "redirecting plaintext request to https"
    );
    (
        StatusCode::MOVED_PERMANENTLY,
        [(header::LOCATION, location_header)],
    )
        .into_response()
}

/// Builds `https://<host><path-and-query>` for a plaintext request.
///
/// Any port on the incoming host is dropped; a non-default HTTPS port is
/// appended instead. A missing or empty host falls back to `public_host`.
pub fn redirect_location(
    host: Option<&str>,
    path_and_query: &str,
    public_host: &str,
    https_port: u16,
) -> String {
    let host = host
        .map(str::trim)
        .map(strip_port)
        .filter(|host| !host.is_empty())
        .unwrap_or(public_host);
    let path_and_query = if path_and_query.starts_with('/') {
        path_and_query
    } else {
        "/"
    };

    if https_port == DEFAULT_HTTPS_PORT {
        format!("https://{host}{path_and_query}")
    } else {
        format!("https://{host}:{https_port}{path_and_query}")
    }
}

fn strip_port(host: &str) -> &str {
    if host.starts_with('[') {
        return match host.find(']') {
            Some(end) => &host[..=end],
            None => host,
        };
    }

    match host.rsplit_once(':') {
        Some((name, port)) if !name.contains(':') && port.bytes().all(|b| b.is_ascii_digit()) => {
            name
        }
        _ => host,
    }
}
