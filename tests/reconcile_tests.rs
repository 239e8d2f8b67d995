use chrono::Utc;
use page_gate::{
    Catalog,
    models::{RouteConfig, SettingsDocument},
    reconcile::reconcile,
};

fn catalog() -> Catalog {
    Catalog::new(vec![
        RouteConfig::new("/blog", "Blog", "Articles", true),
        RouteConfig::new("/beta", "Beta", "Experiments", false),
        RouteConfig::new("/pricing", "Pricing", "Plans", true),
    ])
}

fn document(entries: Vec<RouteConfig>) -> SettingsDocument {
    SettingsDocument {
        entries,
        version: 4,
        last_updated_by: "ops@example.com".to_string(),
        last_updated_at: Utc::now(),
    }
}

fn visibility(entries: &[RouteConfig]) -> Vec<(&str, bool)> {
    entries
        .iter()
        .map(|entry| (entry.path.as_str(), entry.is_visible))
        .collect()
}

#[test]
fn test_missing_document_returns_defaults_flagged() {
    let merged = reconcile(&catalog(), None);

    assert!(merged.is_default);
    assert_eq!(merged.entries, catalog().entries().to_vec());
}

#[test]
fn test_persisted_visibility_wins() {
    let doc = document(vec![
        RouteConfig::new("/blog", "", "", false),
        RouteConfig::new("/beta", "", "", true),
        RouteConfig::new("/pricing", "", "", true),
    ]);

    let merged = reconcile(&catalog(), Some(&doc));

    assert!(!merged.is_default);
    assert_eq!(
        visibility(&merged.entries),
        vec![("/blog", false), ("/beta", true), ("/pricing", true)]
    );
}

#[test]
fn test_absent_path_keeps_default_verbatim() {
    // `/beta` and `/pricing` were added to the catalog after this document was written.
    let doc = document(vec![RouteConfig::new("/blog", "", "", false)]);

    let merged = reconcile(&catalog(), Some(&doc));

    assert_eq!(merged.entries[1], catalog().entries()[1]);
    assert_eq!(merged.entries[2], catalog().entries()[2]);
    assert_eq!(
        visibility(&merged.entries),
        vec![("/blog", false), ("/beta", false), ("/pricing", true)]
    );
}

#[test]
fn test_every_catalog_path_appears_exactly_once_in_catalog_order() {
    let doc = document(vec![
        RouteConfig::new("/retired", "Retired", "", true),
        RouteConfig::new("/pricing", "", "", false),
        RouteConfig::new("/blog", "", "", true),
        RouteConfig::new("/unknown", "", "", false),
    ]);

    let merged = reconcile(&catalog(), Some(&doc));

    let paths: Vec<&str> = merged.entries.iter().map(|e| e.path.as_str()).collect();
    assert_eq!(paths, vec!["/blog", "/beta", "/pricing"]);
}

#[test]
fn test_empty_document_is_not_default() {
    let merged = reconcile(&catalog(), Some(&document(vec![])));

    // Persisted, even though every value equals the defaults.
    assert!(!merged.is_default);
    assert_eq!(merged.entries, catalog().entries().to_vec());
}

#[test]
fn test_labels_fall_back_to_defaults_when_blank() {
    let doc = document(vec![
        RouteConfig::new("/blog", "Journal", "", true),
        RouteConfig::new("/beta", "   ", "Opt-in previews", false),
    ]);

    let merged = reconcile(&catalog(), Some(&doc));

    assert_eq!(merged.entries[0].name, "Journal");
    assert_eq!(merged.entries[0].description, "Articles");
    assert_eq!(merged.entries[1].name, "Beta");
    assert_eq!(merged.entries[1].description, "Opt-in previews");
}

#[test]
fn test_duplicate_persisted_paths_last_one_wins() {
    let doc = document(vec![
        RouteConfig::new("/blog", "", "", true),
        RouteConfig::new("/blog", "", "", false),
    ]);

    let merged = reconcile(&catalog(), Some(&doc));

    assert!(!merged.entries[0].is_visible);
    assert_eq!(merged.entries.len(), 3);
}

#[test]
fn test_builtin_catalogs_are_path_unique() {
    for catalog in [Catalog::pages(), Catalog::content()] {
        let mut paths: Vec<&str> = catalog.entries().iter().map(|e| e.path.as_str()).collect();
        let total = paths.len();
        paths.sort_unstable();
        paths.dedup();
        assert_eq!(paths.len(), total);
    }
}
