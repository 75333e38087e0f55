use std::path::Path;

use axum::Router;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

mod redirect;

pub use redirect::{RedirectState, redirect_location};

/// Static bundle router for the HTTPS listener.
///
/// Paths that match a file under `static_dir` return it; every other path
/// returns `index_file` with status 200 so client-side routes resolve.
pub fn build_static_router(static_dir: &Path, index_file: &Path) -> Router {
    let assets = ServeDir::new(static_dir).fallback(ServeFile::new(index_file));

    Router::new()
        .fallback_service(assets)
        .layer(TraceLayer::new_for_http())
}

/// Router for the plaintext listener: every request gets a 301 to HTTPS.
pub fn build_redirect_router(state: RedirectState) -> Router {
    Router::new()
        .fallback(redirect::redirect_to_https)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
