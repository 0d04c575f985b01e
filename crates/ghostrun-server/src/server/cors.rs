use axum::http::request::Parts;
use axum::http::{HeaderValue, Method, header};
use ghostrun_core::config::ServerConfig;
use tower_http::cors::{AllowOrigin, CorsLayer};

/// Whether `origin` matches one of `patterns`.
///
/// `http://100.*` matches by prefix, `*.ts.net` by suffix, anything else
/// exactly. A wildcard must match at least one character.
pub fn origin_allowed(patterns: &[String], origin: &str) -> bool {
    patterns.iter().any(|pattern| {
        if let Some(prefix) = pattern.strip_suffix('*') {
            origin.len() > prefix.len() && origin.starts_with(prefix)
        } else if let Some(suffix) = pattern.strip_prefix('*') {
            origin.len() > suffix.len() && origin.ends_with(suffix)
        } else {
            origin == pattern
        }
    })
}

/// CORS for the configured origins, with credentials.
pub fn cors_layer(config: &ServerConfig) -> CorsLayer {
    let patterns = config.cors_origins.clone();
    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(
            move |origin: &HeaderValue, _parts: &Parts| {
                origin
                    .to_str()
                    .is_ok_and(|origin| origin_allowed(&patterns, origin))
            },
        ))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(true)
}
