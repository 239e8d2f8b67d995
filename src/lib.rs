use axum::{
    extract::FromRef,
    http::HeaderName,
    Router,
    middleware,
};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod auth;
pub mod catalog;
pub mod config;
pub mod enforcement;
pub mod handlers;
pub mod mirror;
pub mod models;
pub mod policy;
pub mod reconcile;
pub mod repository;

// Routing segregation (API vs. pages).
pub mod routes;
use routes::{api, pages};

// --- Public Re-exports ---

pub use catalog::Catalog;
pub use config::AppConfig;
pub use enforcement::GateState;
pub use mirror::MirrorChannel;
pub use policy::PolicySet;
pub use repository::{
    MemorySettingsRepository, PostgresSettingsRepository, RepositoryState, SettingsDomain,
};

/// ApiDoc
///
/// Aggregates the `#[utoipa::path]` handlers and `ToSchema` models into the OpenAPI
/// document served at `/api/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::get_page_settings, handlers::post_page_settings,
        handlers::get_content_settings, handlers::post_content_settings,
        handlers::page_settings_events, handlers::content_settings_events
    ),
    components(
        schemas(
            models::RouteConfig, models::SettingsDocument, models::WriteSettingsRequest,
            models::ReadSettingsResponse, models::WriteSettingsResponse, models::ErrorResponse,
            models::SettingsChanged,
        )
    ),
    tags(
        (name = "page-gate", description = "Page visibility and content settings API")
    )
)]
struct ApiDoc;

/// AppState
///
/// Shared, cheaply clonable container for every service a request may need. Holds no
/// cached settings: every read goes to the store.
#[derive(Clone)]
pub struct AppState {
    /// Settings store (read handle + write handle).
    pub repo: RepositoryState,
    pub config: AppConfig,
    /// Authorization strategy per settings domain.
    pub policies: PolicySet,
    pub page_catalog: Arc<Catalog>,
    pub content_catalog: Arc<Catalog>,
    /// Enforcement middleware dependencies.
    pub gate: GateState,
    pub mirror: MirrorChannel,
}

impl AppState {
    /// Wires the state with the compiled-in catalogs.
    pub fn new(config: AppConfig, repo: RepositoryState) -> Self {
        Self::with_catalogs(config, repo, Catalog::pages(), Catalog::content())
    }

    /// Same as [`AppState::new`] with explicit catalogs.
    pub fn with_catalogs(
        config: AppConfig,
        repo: RepositoryState,
        page_catalog: Catalog,
        content_catalog: Catalog,
    ) -> Self {
        let page_catalog = Arc::new(page_catalog);
        let gate = GateState::from_config(&config, repo.clone(), page_catalog.clone());
        Self {
            policies: PolicySet::from_config(&config),
            repo,
            config,
            page_catalog,
            content_catalog: Arc::new(content_catalog),
            gate,
            mirror: MirrorChannel::new(),
        }
    }

    pub fn catalog(&self, domain: SettingsDomain) -> &Catalog {
        match domain {
            SettingsDomain::PageVisibility => &self.page_catalog,
            SettingsDomain::PageContent => &self.content_catalog,
        }
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

impl FromRef<AppState> for GateState {
    fn from_ref(app_state: &AppState) -> GateState {
        app_state.gate.clone()
    }
}

/// create_router
///
/// Assembles the application. The enforcement middleware wraps the *whole* inner router
/// (mounted as a fallback service) so that rewriting a hidden page's URI happens before
/// routing and the not-found route is what actually answers.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let inner = Router::new()
        // Documentation lives under /api so enforcement never gates it.
        .merge(SwaggerUi::new("/api/docs").url("/api/openapi.json", ApiDoc::openapi()))
        .merge(api::api_routes())
        .merge(pages::page_routes())
        .with_state(state.clone());

    Router::new()
        .fallback_service(inner)
        .layer(middleware::from_fn_with_state(
            state.gate.clone(),
            enforcement::enforce_visibility,
        ))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(
                    x_request_id.clone(),
                    MakeRequestUuid,
                ))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Span factory for `TraceLayer`: every log line of a request carries its
/// `x-request-id`.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
