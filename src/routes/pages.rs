use crate::{AppState, enforcement::NOT_FOUND_PATH, handlers};
use axum::{Router, routing::any};

/// Page Router Module
///
/// Every path that is not an API route is a page. By the time a request lands here the
/// enforcement middleware has already rewritten hidden pages to `/not-found`.
pub fn page_routes() -> Router<AppState> {
    Router::new()
        // Any method: a rewritten POST to a hidden page must still get the not-found page.
        .route(NOT_FOUND_PATH, any(handlers::not_found_page))
        .fallback(handlers::render_page)
}
