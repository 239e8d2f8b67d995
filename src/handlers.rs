use crate::{
    AppState,
    auth::Caller,
    enforcement::{API_PREFIX, HiddenRoute},
    mirror,
    models::{ErrorResponse, ReadSettingsResponse, RouteConfig, SettingsChanged, WriteSettingsResponse},
    policy::Decision,
    reconcile::reconcile,
    repository::{self, SettingsDomain, StoreError},
};
use axum::{
    Json,
    body::Bytes,
    extract::{Request, State},
    http::{StatusCode, header},
    response::{
        Html, IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
};
use futures::stream::{self, Stream};
use std::collections::HashSet;
use std::convert::Infallible;
use tokio::sync::broadcast::error::RecvError;

// --- Page Visibility Domain ---

/// get_page_settings
///
/// [Public Route] Merged page-visibility settings. Never fails: store errors substitute
/// the Default Catalog and report `success: false`.
#[utoipa::path(
    get,
    path = "/api/settings",
    responses((status = 200, description = "Merged page-visibility settings", body = ReadSettingsResponse))
)]
pub async fn get_page_settings(State(state): State<AppState>) -> Response {
    read_domain(&state, SettingsDomain::PageVisibility).await
}

/// post_page_settings
///
/// [Allowlist Route] Replaces the page-visibility document. Requires a verified identity
/// on the settings admin allowlist.
#[utoipa::path(
    post,
    path = "/api/settings",
    request_body = crate::models::WriteSettingsRequest,
    responses(
        (status = 200, description = "Saved", body = WriteSettingsResponse),
        (status = 400, description = "Malformed body", body = ErrorResponse),
        (status = 401, description = "Not authorized", body = ErrorResponse),
        (status = 500, description = "Store failure", body = ErrorResponse)
    )
)]
pub async fn post_page_settings(
    caller: Caller,
    State(state): State<AppState>,
    body: Bytes,
) -> Response {
    write_domain(&state, SettingsDomain::PageVisibility, &caller, &body).await
}

// --- Page Content Domain ---

/// get_content_settings
///
/// [Public Route] Merged page-content settings.
#[utoipa::path(
    get,
    path = "/api/content-settings",
    responses((status = 200, description = "Merged page-content settings", body = ReadSettingsResponse))
)]
pub async fn get_content_settings(State(state): State<AppState>) -> Response {
    read_domain(&state, SettingsDomain::PageContent).await
}

/// post_content_settings
///
/// [Secret-or-Admin Route] Replaces the page-content document. Accepts either the
/// administrator identity or `Authorization: Bearer <CONTENT_API_SECRET>`.
#[utoipa::path(
    post,
    path = "/api/content-settings",
    request_body = crate::models::WriteSettingsRequest,
    responses(
        (status = 200, description = "Saved", body = WriteSettingsResponse),
        (status = 400, description = "Malformed body", body = ErrorResponse),
        (status = 401, description = "Not authorized", body = ErrorResponse),
        (status = 500, description = "Store failure", body = ErrorResponse)
    )
)]
pub async fn post_content_settings(
    caller: Caller,
    State(state): State<AppState>,
    body: Bytes,
) -> Response {
    write_domain(&state, SettingsDomain::PageContent, &caller, &body).await
}

// --- Client Mirror Channel ---

/// page_settings_events
///
/// [Public Route] Server-sent `settings-changed` events for the page-visibility domain.
#[utoipa::path(
    get,
    path = "/api/settings/events",
    responses((status = 200, description = "Event stream of SettingsChanged", body = SettingsChanged))
)]
pub async fn page_settings_events(State(state): State<AppState>) -> Response {
    events(&state, SettingsDomain::PageVisibility)
}

/// content_settings_events
///
/// [Public Route] Server-sent `settings-changed` events for the page-content domain.
#[utoipa::path(
    get,
    path = "/api/content-settings/events",
    responses((status = 200, description = "Event stream of SettingsChanged", body = SettingsChanged))
)]
pub async fn content_settings_events(State(state): State<AppState>) -> Response {
    events(&state, SettingsDomain::PageContent)
}

// --- Pages ---

/// render_page
///
/// Placeholder page renderer. Reaching it means enforcement let the request through.
/// Unknown API paths get a plain `404`; they are not pages.
pub async fn render_page(request: Request) -> Response {
    let path = request.uri().path();
    if path == API_PREFIX || path.starts_with("/api/") {
        return StatusCode::NOT_FOUND.into_response();
    }
    Html(format!(
        "<!doctype html><html><head><title>{path}</title></head><body><main data-page=\"{path}\"></main></body></html>"
    ))
    .into_response()
}

/// not_found_page
///
/// The not-found presentation. Served with `200` at whatever URL the client requested,
/// so a hidden page is indistinguishable from one that never existed.
pub async fn not_found_page(request: Request) -> Html<&'static str> {
    if let Some(HiddenRoute(path)) = request.extensions().get::<HiddenRoute>() {
        tracing::trace!(path = %path, "serving not-found presentation");
    }
    Html(
        "<!doctype html><html><head><title>Page not found</title></head><body><h1>404</h1><p>This page could not be found.</p></body></html>",
    )
}

// --- Shared Implementation ---

async fn read_domain(state: &AppState, domain: SettingsDomain) -> Response {
    let catalog = state.catalog(domain);

    let body = match state.repo.load(domain).await {
        Ok(document) => {
            let merged = reconcile(catalog, document.as_ref());
            ReadSettingsResponse {
                success: true,
                settings: merged.entries,
                is_default: merged.is_default,
                last_updated_by: document.as_ref().map(|doc| doc.last_updated_by.clone()),
                last_updated_at: document.as_ref().map(|doc| doc.last_updated_at),
                version: document.as_ref().map(|doc| doc.version),
            }
        }
        Err(e) => {
            tracing::error!(domain = domain.slug(), error = %e, "settings read failed, serving defaults");
            ReadSettingsResponse {
                success: false,
                settings: catalog.entries().to_vec(),
                is_default: true,
                last_updated_by: None,
                last_updated_at: None,
                version: None,
            }
        }
    };

    // Substituted defaults must not overwrite a fresher snapshot in the browser.
    if !body.success {
        return ([(header::CACHE_CONTROL, "no-store")], Json(body)).into_response();
    }

    let cookie = mirror::mirror_cookie(domain, &body.settings);
    (
        [
            (header::CACHE_CONTROL, "no-store".to_string()),
            (header::SET_COOKIE, cookie),
        ],
        Json(body),
    )
        .into_response()
}

async fn write_domain(
    state: &AppState,
    domain: SettingsDomain,
    caller: &Caller,
    body: &[u8],
) -> Response {
    let principal = match state.policies.for_domain(domain).authorize(caller) {
        Decision::Allowed(principal) => principal,
        Decision::Denied => {
            tracing::warn!(
                domain = domain.slug(),
                identity = ?caller.identity.as_ref().map(|id| id.email.as_str()),
                "settings write denied"
            );
            return error_response(StatusCode::UNAUTHORIZED, "Unauthorized");
        }
    };

    let entries = match parse_entries(body) {
        Ok(entries) => entries,
        Err(reason) => return error_response(StatusCode::BAD_REQUEST, reason),
    };

    let identity = state.policies.writer_identity(&principal);
    match repository::write_settings(state.repo.as_ref(), domain, entries, Some(&identity)).await {
        Ok(document) => {
            state.mirror.publish(domain, &document);
            let merged = reconcile(state.catalog(domain), Some(&document));
            let cookie = mirror::mirror_cookie(domain, &merged.entries);
            let response = WriteSettingsResponse {
                success: true,
                message: format!("{} settings saved", domain.slug()),
                last_updated_by: document.last_updated_by,
                last_updated_at: document.last_updated_at,
                version: document.version,
            };
            ([(header::SET_COOKIE, cookie)], Json(response)).into_response()
        }
        Err(StoreError::Unauthorized) => error_response(StatusCode::UNAUTHORIZED, "Unauthorized"),
        Err(e) => {
            tracing::error!(domain = domain.slug(), error = %e, "settings write failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to save settings")
        }
    }
}

/// parse_entries
///
/// Validates a write body: `settings` must be an array of well-formed entries with
/// absolute, unique paths. Nothing is written unless the whole body passes.
pub fn parse_entries(body: &[u8]) -> Result<Vec<RouteConfig>, String> {
    let value: serde_json::Value =
        serde_json::from_slice(body).map_err(|_| "Request body must be valid JSON".to_string())?;

    let Some(items) = value.get("settings").and_then(serde_json::Value::as_array) else {
        return Err("Invalid settings format: `settings` must be an array".to_string());
    };

    let mut seen = HashSet::new();
    let mut entries = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let entry: RouteConfig = serde_json::from_value(item.clone())
            .map_err(|e| format!("Invalid settings entry at index {index}: {e}"))?;
        if !entry.path.starts_with('/') {
            return Err(format!("Invalid settings entry at index {index}: path must start with '/'"));
        }
        if !seen.insert(entry.path.clone()) {
            return Err(format!("Duplicate path in settings: {}", entry.path));
        }
        entries.push(entry);
    }
    Ok(entries)
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(ErrorResponse::new(message))).into_response()
}

fn events(state: &AppState, domain: SettingsDomain) -> Response {
    Sse::new(change_stream(state.mirror.subscribe(domain)))
        .keep_alive(KeepAlive::default())
        .into_response()
}

fn change_stream(
    receiver: tokio::sync::broadcast::Receiver<SettingsChanged>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    stream::unfold(receiver, |mut receiver| async move {
        loop {
            match receiver.recv().await {
                Ok(change) => match Event::default().event("settings-changed").json_data(&change) {
                    Ok(event) => return Some((Ok(event), receiver)),
                    Err(e) => tracing::warn!(error = %e, "dropping unserializable change event"),
                },
                // Only the latest state matters to subscribers.
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "mirror subscriber lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    })
}
