//! Page-visibility enforcement.
//!
//! Runs before routing on every inbound request. Paths are classified in a fixed order:
//!
//! ```text
//! /api/...            -> pass (endpoints authorize themselves)
//! static assets       -> pass
//! always-visible      -> pass
//! everything else     -> fetch settings (bounded), pass if visible, else rewrite
//! ```
//!
//! A hidden page is rewritten to the not-found presentation without changing the URL
//! the browser sees. Settings are fetched fresh for every gated request.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    extract::{Request, State},
    http::Uri,
    middleware::Next,
    response::Response,
};

use crate::catalog::{self, Catalog};
use crate::config::AppConfig;
use crate::models::{ReadSettingsResponse, RouteConfig};
use crate::reconcile::reconcile;
use crate::repository::{RepositoryState, SettingsDomain, StoreError};

/// Prefix under which every API endpoint lives.
pub const API_PREFIX: &str = "/api";

/// Internal route serving the not-found presentation.
pub const NOT_FOUND_PATH: &str = "/not-found";

const STATIC_PREFIXES: &[&str] = &["/static/", "/assets/", "/_next/", "/images/", "/fonts/"];

const STATIC_FILES: &[&str] = &["/favicon.ico", "/robots.txt", "/sitemap.xml"];

const STATIC_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "svg", "webp", "ico", "avif", "woff", "woff2", "ttf", "otf",
    "eot", "css", "js", "mjs", "map",
];

/// PathClass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathClass {
    Api,
    StaticAsset,
    AlwaysVisible,
    Gated,
}

/// Verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Hidden,
}

/// HiddenRoute
///
/// Request extension left on rewritten requests, carrying the path the client asked for.
#[derive(Debug, Clone)]
pub struct HiddenRoute(pub String);

/// classify
///
/// Sorts a request path into its enforcement class. Earlier classes take precedence.
pub fn classify(path: &str) -> PathClass {
    if path == API_PREFIX || path.starts_with("/api/") {
        PathClass::Api
    } else if is_static_asset(path) {
        PathClass::StaticAsset
    } else if catalog::is_always_visible(path) {
        PathClass::AlwaysVisible
    } else {
        PathClass::Gated
    }
}

fn is_static_asset(path: &str) -> bool {
    if STATIC_FILES.contains(&path) || STATIC_PREFIXES.iter().any(|p| path.starts_with(p)) {
        return true;
    }
    let last_segment = path.rsplit('/').next().unwrap_or_default();
    match last_segment.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => STATIC_EXTENSIONS
            .iter()
            .any(|known| known.eq_ignore_ascii_case(ext)),
        _ => false,
    }
}

/// decide
///
/// Verdict for a gated path against merged settings. Unknown paths are hidden.
pub fn decide(path: &str, entries: &[RouteConfig]) -> Verdict {
    match entries.iter().find(|entry| entry.path == path) {
        Some(entry) if entry.is_visible => Verdict::Pass,
        _ => Verdict::Hidden,
    }
}

/// FetchError
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("settings request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("settings endpoint answered with status {0}")]
    Status(u16),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// SettingsFetcher
///
/// Source of the merged page-visibility settings for the middleware.
#[async_trait]
pub trait SettingsFetcher: Send + Sync {
    async fn fetch(&self) -> Result<Vec<RouteConfig>, FetchError>;
}

/// HttpSettingsFetcher
///
/// Reads the service's own `GET /api/settings` endpoint over HTTP.
pub struct HttpSettingsFetcher {
    client: reqwest::Client,
    url: String,
}

impl HttpSettingsFetcher {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl SettingsFetcher for HttpSettingsFetcher {
    async fn fetch(&self) -> Result<Vec<RouteConfig>, FetchError> {
        let response = self
            .client
            .get(&self.url)
            .header("Cache-Control", "no-store")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(FetchError::Status(response.status().as_u16()));
        }

        // `success: false` still carries the substituted defaults, which is what we want.
        let body = response.json::<ReadSettingsResponse>().await?;
        Ok(body.settings)
    }
}

/// RepositoryFetcher
///
/// Reads the store in-process. Unlike the read endpoint, store errors are returned so
/// the middleware applies its own fallback.
pub struct RepositoryFetcher {
    repo: RepositoryState,
    catalog: Arc<Catalog>,
}

impl RepositoryFetcher {
    pub fn new(repo: RepositoryState, catalog: Arc<Catalog>) -> Self {
        Self { repo, catalog }
    }
}

#[async_trait]
impl SettingsFetcher for RepositoryFetcher {
    async fn fetch(&self) -> Result<Vec<RouteConfig>, FetchError> {
        let document = self.repo.load(SettingsDomain::PageVisibility).await?;
        Ok(reconcile(&self.catalog, document.as_ref()).entries)
    }
}

/// GateState
///
/// What the middleware needs from the application state.
#[derive(Clone)]
pub struct GateState {
    pub fetcher: Arc<dyn SettingsFetcher>,
    pub catalog: Arc<Catalog>,
    pub timeout: Duration,
}

impl GateState {
    /// Picks the HTTP fetcher when an endpoint URL is configured, the in-process one
    /// otherwise.
    pub fn from_config(config: &AppConfig, repo: RepositoryState, catalog: Arc<Catalog>) -> Self {
        let fetcher: Arc<dyn SettingsFetcher> = match &config.settings_endpoint_url {
            Some(url) => Arc::new(HttpSettingsFetcher::new(url.clone())),
            None => Arc::new(RepositoryFetcher::new(repo, catalog.clone())),
        };
        Self {
            fetcher,
            catalog,
            timeout: config.fetch_timeout,
        }
    }

    /// Current merged settings, or the Default Catalog if the fetch fails or times out.
    pub async fn current_entries(&self) -> Vec<RouteConfig> {
        match tokio::time::timeout(self.timeout, self.fetcher.fetch()).await {
            Ok(Ok(entries)) => entries,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "settings fetch failed, using default catalog");
                self.catalog.entries().to_vec()
            }
            Err(_) => {
                tracing::warn!(timeout_ms = self.timeout.as_millis() as u64, "settings fetch timed out, using default catalog");
                self.catalog.entries().to_vec()
            }
        }
    }

    /// Full decision for a request path, bypass rules included.
    pub async fn verdict(&self, path: &str) -> Verdict {
        match classify(path) {
            PathClass::Api | PathClass::StaticAsset | PathClass::AlwaysVisible => Verdict::Pass,
            PathClass::Gated => decide(path, &self.current_entries().await),
        }
    }
}

/// enforce_visibility
///
/// Middleware applied around the whole router. Hidden pages are rewritten, not
/// redirected: the URI is swapped for [`NOT_FOUND_PATH`] before routing.
pub async fn enforce_visibility(
    State(gate): State<GateState>,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();

    if gate.verdict(&path).await == Verdict::Hidden {
        tracing::debug!(path = %path, "route hidden, rewriting to not-found");
        *request.uri_mut() = Uri::from_static(NOT_FOUND_PATH);
        request.extensions_mut().insert(HiddenRoute(path));
    }

    next.run(request).await
}
