use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// API Router Module
///
/// Settings endpoints for both domains. Reads are public; writes go through the
/// domain's authorization policy inside the handler, not through page enforcement.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // GET /api/health
        // Liveness probe for load balancers. Lives under /api so it is never gated.
        .route("/api/health", get(|| async { "ok" }))
        // GET/POST /api/settings
        // Page-visibility domain. POST requires an allowlisted identity.
        .route(
            "/api/settings",
            get(handlers::get_page_settings).post(handlers::post_page_settings),
        )
        // GET /api/settings/events
        // Mirror channel: change notifications for open browser tabs.
        .route("/api/settings/events", get(handlers::page_settings_events))
        // GET/POST /api/content-settings
        // Page-content domain. POST requires the admin identity or the shared secret.
        .route(
            "/api/content-settings",
            get(handlers::get_content_settings).post(handlers::post_content_settings),
        )
        .route(
            "/api/content-settings/events",
            get(handlers::content_settings_events),
        )
}
