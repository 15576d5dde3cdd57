use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::request::Parts;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::server::handlers::{chat, documents, health};
use crate::state::AppState;

/// Creates the application router.
///
/// Every route is served at the root and again under `/api`.
pub fn router(state: Arc<AppState>) -> Router {
    let cors_layer = build_cors_layer(&state.config.server.cors_allowed_origins);
    let body_limit = state.config.server.max_upload_bytes;

    Router::new()
        .merge(api_routes())
        .nest("/api", api_routes())
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors_layer)
        .layer(TraceLayer::new_for_http())
}

fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health::health))
        .route("/status", get(health::get_status))
        .route("/upload-pdf", post(documents::upload_pdf))
        .route("/process-text", post(documents::process_text))
        .route("/chat", post(chat::chat))
}

fn build_cors_layer(configured: &[String]) -> CorsLayer {
    let patterns: Vec<String> = configured
        .iter()
        .map(|origin| origin.trim().trim_end_matches('/').to_string())
        .filter(|origin| !origin.is_empty())
        .collect();

    let allow_origin = AllowOrigin::predicate(move |origin: &HeaderValue, _parts: &Parts| {
        origin
            .to_str()
            .map(|origin| patterns.iter().any(|pattern| origin_matches(pattern, origin)))
            .unwrap_or(false)
    });

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::ACCEPT, header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}

/// Exact match, or `scheme://*.domain` matching any subdomain of `domain`.
fn origin_matches(pattern: &str, origin: &str) -> bool {
    if pattern == origin {
        return true;
    }
    let Some((scheme, host_pattern)) = pattern.split_once("://") else {
        return false;
    };
    let Some(suffix) = host_pattern.strip_prefix("*.") else {
        return false;
    };
    let Some(host) = origin
        .strip_prefix(scheme)
        .and_then(|rest| rest.strip_prefix("://"))
    else {
        return false;
    };
    host.strip_suffix(suffix)
        .and_then(|sub| sub.strip_suffix('.'))
        .map(|sub| !sub.is_empty())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_origins_match() {
        assert!(origin_matches("http://localhost:4200", "http://localhost:4200"));
        assert!(!origin_matches("http://localhost:4200", "http://localhost:4201"));
    }

    #[test]
    fn wildcard_matches_subdomains_only() {
        let pattern = "https://*.vercel.app";
        assert!(origin_matches(pattern, "https://rag-chat.vercel.app"));
        assert!(origin_matches(pattern, "https://a.b.vercel.app"));
        assert!(!origin_matches(pattern, "https://vercel.app"));
        assert!(!origin_matches(pattern, "http://rag-chat.vercel.app"));
        assert!(!origin_matches(pattern, "https://evilvercel.app"));
    }
}
