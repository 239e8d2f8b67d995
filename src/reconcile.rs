use std::collections::HashMap;

use crate::catalog::Catalog;
use crate::models::{RouteConfig, SettingsDocument};

/// Reconciled
///
/// The merged view handed to readers. `is_default` is true only when no persisted
/// document exists, so callers can tell "persisted but equal to defaults" apart from
/// "never written".
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciled {
    pub entries: Vec<RouteConfig>,
    pub is_default: bool,
}

/// reconcile
///
/// Left-joins the catalog against a persisted document, keyed by `path`:
/// - catalog order is kept and every catalog path appears exactly once;
/// - a persisted entry wins for visibility (and for non-empty labels);
/// - a catalog path missing from the document keeps its default verbatim;
/// - persisted paths unknown to the catalog are dropped.
pub fn reconcile(defaults: &Catalog, persisted: Option<&SettingsDocument>) -> Reconciled {
    let Some(document) = persisted else {
        return Reconciled {
            entries: defaults.entries().to_vec(),
            is_default: true,
        };
    };

    // Later duplicates win, matching last-write semantics inside one document.
    let stored: HashMap<&str, &RouteConfig> = document
        .entries
        .iter()
        .map(|entry| (entry.path.as_str(), entry))
        .collect();

    let entries = defaults
        .entries()
        .iter()
        .map(|default| match stored.get(default.path.as_str()) {
            Some(saved) => RouteConfig {
                path: default.path.clone(),
                name: pick_label(&saved.name, &default.name),
                description: pick_label(&saved.description, &default.description),
                is_visible: saved.is_visible,
            },
            None => default.clone(),
        })
        .collect();

    Reconciled {
        entries,
        is_default: false,
    }
}

fn pick_label(saved: &str, default: &str) -> String {
    if saved.trim().is_empty() {
        default.to_string()
    } else {
        saved.to_string()
    }
}
