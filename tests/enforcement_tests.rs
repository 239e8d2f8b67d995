use async_trait::async_trait;
use page_gate::{
    AppConfig, AppState, Catalog, GateState, MemorySettingsRepository, SettingsDomain,
    create_router,
    enforcement::{
        FetchError, HttpSettingsFetcher, PathClass, RepositoryFetcher, SettingsFetcher, Verdict,
        classify, decide,
    },
    models::RouteConfig,
    repository::{RepositoryState, StoreError},
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

fn catalog() -> Arc<Catalog> {
    Arc::new(Catalog::new(vec![
        RouteConfig::new("/blog", "Blog", "", true),
        RouteConfig::new("/beta", "Beta", "", false),
    ]))
}

/// Always fails, like an unreachable settings endpoint.
struct BrokenFetcher;

#[async_trait]
impl SettingsFetcher for BrokenFetcher {
    async fn fetch(&self) -> Result<Vec<RouteConfig>, FetchError> {
        Err(FetchError::Store(StoreError::Unavailable("down".to_string())))
    }
}

/// Returns fixed entries, regardless of the catalog.
struct FixedFetcher(Vec<RouteConfig>);

#[async_trait]
impl SettingsFetcher for FixedFetcher {
    async fn fetch(&self) -> Result<Vec<RouteConfig>, FetchError> {
        Ok(self.0.clone())
    }
}

fn gate(fetcher: Arc<dyn SettingsFetcher>, timeout: Duration) -> GateState {
    GateState {
        fetcher,
        catalog: catalog(),
        timeout,
    }
}

// --- Classification ---

#[test]
fn test_classify_api_paths() {
    assert_eq!(classify("/api"), PathClass::Api);
    assert_eq!(classify("/api/settings"), PathClass::Api);
    assert_eq!(classify("/api/blog.png"), PathClass::Api);
    assert_eq!(classify("/apiary"), PathClass::Gated);
}

#[test]
fn test_classify_static_assets() {
    for path in [
        "/_next/static/chunks/main.js",
        "/static/logo",
        "/favicon.ico",
        "/robots.txt",
        "/images/hero.WEBP",
        "/blog/cover.png",
        "/fonts/inter.woff2",
        "/app.js.map",
    ] {
        assert_eq!(classify(path), PathClass::StaticAsset, "{path}");
    }
    // Dotfiles and extensionless paths are pages.
    assert_eq!(classify("/blog/.env"), PathClass::Gated);
    assert_eq!(classify("/blog/v1.2"), PathClass::Gated);
}

#[test]
fn test_classify_always_visible_prefixes() {
    for path in ["/", "/login", "/auth/callback", "/admin", "/admin/settings", "/marketplace/item/7"] {
        assert_eq!(classify(path), PathClass::AlwaysVisible, "{path}");
    }
    // Prefix match is by segment, and "/" is exact.
    assert_eq!(classify("/administrator"), PathClass::Gated);
    assert_eq!(classify("/blog"), PathClass::Gated);
}

// --- Decisions ---

#[test]
fn test_decide_visible_hidden_and_unknown() {
    let entries = catalog().entries().to_vec();

    assert_eq!(decide("/blog", &entries), Verdict::Pass);
    assert_eq!(decide("/beta", &entries), Verdict::Hidden);
    assert_eq!(decide("/nowhere", &entries), Verdict::Hidden);
    // Exact match only: sub-paths of gated routes are not covered by their parent.
    assert_eq!(decide("/blog/post-1", &entries), Verdict::Hidden);
}

#[tokio::test]
async fn test_fetch_error_falls_back_to_catalog() {
    let gate = gate(Arc::new(BrokenFetcher), Duration::from_secs(1));

    assert_eq!(gate.current_entries().await, catalog().entries().to_vec());
    assert_eq!(gate.verdict("/blog").await, Verdict::Pass);
    assert_eq!(gate.verdict("/beta").await, Verdict::Hidden);
}

#[tokio::test]
async fn test_timeout_falls_back_to_catalog() {
    let repo = Arc::new(MemorySettingsRepository::with_latency(Duration::from_millis(500)));
    // Persisted: /beta visible, /blog hidden. The slow store must not be waited for.
    repo.insert_raw(
        SettingsDomain::PageVisibility,
        json!({
            "entries": [
                { "path": "/blog", "isVisible": false },
                { "path": "/beta", "isVisible": true }
            ],
            "version": 1,
            "lastUpdatedBy": "ops@example.com",
            "lastUpdatedAt": "2025-01-01T00:00:00Z"
        }),
    )
    .await;
    let repo: RepositoryState = repo;
    let fetcher = Arc::new(RepositoryFetcher::new(repo, catalog()));
    let gate = gate(fetcher, Duration::from_millis(20));

    assert_eq!(gate.verdict("/blog").await, Verdict::Pass);
    assert_eq!(gate.verdict("/beta").await, Verdict::Hidden);
}

#[tokio::test]
async fn test_repository_fetcher_merges_persisted_settings() {
    let repo = Arc::new(MemorySettingsRepository::new());
    repo.insert_raw(
        SettingsDomain::PageVisibility,
        json!({
            "entries": [{ "path": "/beta", "isVisible": true }],
            "version": 1,
            "lastUpdatedBy": "ops@example.com",
            "lastUpdatedAt": "2025-01-01T00:00:00Z"
        }),
    )
    .await;
    let repo: RepositoryState = repo;
    let gate = gate(
        Arc::new(RepositoryFetcher::new(repo, catalog())),
        Duration::from_secs(1),
    );

    assert_eq!(gate.verdict("/beta").await, Verdict::Pass);
    assert_eq!(gate.verdict("/blog").await, Verdict::Pass);
}

#[tokio::test]
async fn test_repository_fetcher_surfaces_corrupt_documents() {
    let repo = Arc::new(MemorySettingsRepository::new());
    repo.insert_raw(SettingsDomain::PageVisibility, json!("corrupt")).await;
    let repo: RepositoryState = repo;
    let fetcher = RepositoryFetcher::new(repo, catalog());

    assert!(matches!(
        fetcher.fetch().await,
        Err(FetchError::Store(StoreError::Malformed(_)))
    ));
}

#[tokio::test]
async fn test_bypass_classes_never_consult_settings() {
    // Everything fetched says "hidden", including the API path itself.
    let gate = gate(
        Arc::new(FixedFetcher(vec![
            RouteConfig::new("/api/settings", "", "", false),
            RouteConfig::new("/login", "", "", false),
        ])),
        Duration::from_secs(1),
    );

    assert_eq!(gate.verdict("/api/settings").await, Verdict::Pass);
    assert_eq!(gate.verdict("/login").await, Verdict::Pass);
    assert_eq!(gate.verdict("/favicon.ico").await, Verdict::Pass);
    assert_eq!(gate.verdict("/blog").await, Verdict::Hidden);
}

// --- Settings over HTTP ---

/// Serves the full application on an ephemeral port, with `/beta` persisted as visible.
/// Returns the base URL.
async fn serve_settings_endpoint() -> String {
    let repo = Arc::new(MemorySettingsRepository::new());
    repo.insert_raw(
        SettingsDomain::PageVisibility,
        json!({
            "entries": [{ "path": "/beta", "isVisible": true }],
            "version": 3,
            "lastUpdatedBy": "ops@example.com",
            "lastUpdatedAt": "2025-01-01T00:00:00Z"
        }),
    )
    .await;
    let repo: RepositoryState = repo;
    let state = AppState::with_catalogs(
        AppConfig::default(),
        repo,
        Catalog::new(catalog().entries().to_vec()),
        Catalog::content(),
    );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, create_router(state)).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn test_http_fetcher_reads_merged_settings_from_endpoint() {
    let base = serve_settings_endpoint().await;
    let fetcher = HttpSettingsFetcher::new(format!("{base}/api/settings"));

    let entries = fetcher.fetch().await.unwrap();

    let visibility: Vec<(&str, bool)> = entries
        .iter()
        .map(|entry| (entry.path.as_str(), entry.is_visible))
        .collect();
    assert_eq!(visibility, vec![("/blog", true), ("/beta", true)]);
}

#[tokio::test]
async fn test_http_fetcher_gate_uses_endpoint_settings() {
    let base = serve_settings_endpoint().await;
    let gate = gate(
        Arc::new(HttpSettingsFetcher::new(format!("{base}/api/settings"))),
        Duration::from_secs(5),
    );

    // Persisted on the endpoint side; the catalog alone would hide it.
    assert_eq!(gate.verdict("/beta").await, Verdict::Pass);
}

#[tokio::test]
async fn test_http_fetcher_non_success_status_falls_back_to_catalog() {
    let base = serve_settings_endpoint().await;
    let fetcher = HttpSettingsFetcher::new(format!("{base}/api/missing"));

    assert!(matches!(fetcher.fetch().await, Err(FetchError::Status(404))));

    let gate = gate(Arc::new(fetcher), Duration::from_secs(5));
    assert_eq!(gate.verdict("/beta").await, Verdict::Hidden);
    assert_eq!(gate.verdict("/blog").await, Verdict::Pass);
}

#[tokio::test]
async fn test_http_fetcher_unreachable_endpoint_falls_back_to_catalog() {
    // Bind then drop, so nothing listens on the port.
    let addr = TcpListener::bind("127.0.0.1:0").await.unwrap().local_addr().unwrap();
    let gate = gate(
        Arc::new(HttpSettingsFetcher::new(format!("http://{addr}/api/settings"))),
        Duration::from_secs(5),
    );

    assert_eq!(gate.current_entries().await, catalog().entries().to_vec());
}
