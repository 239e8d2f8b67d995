use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;

// --- Core Settings Schemas (Persisted) ---

/// RouteConfig
///
/// One gateable route. Appears both in the compiled-in Default Catalog and inside
/// persisted settings documents; `path` is the join key between the two.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct RouteConfig {
    /// Canonical route string, unique within a catalog.
    #[schema(example = "/blog")]
    pub path: String,
    // Human-facing labels. Never consulted by enforcement.
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// The only field enforcement looks at.
    pub is_visible: bool,
}

impl RouteConfig {
    pub fn new(path: &str, name: &str, description: &str, is_visible: bool) -> Self {
        Self {
            path: path.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            is_visible,
        }
    }
}

/// SettingsDocument
///
/// The single persisted document of a settings domain. Created lazily on first write
/// (version 1) and overwritten in full by every subsequent write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SettingsDocument {
    pub entries: Vec<RouteConfig>,
    /// Audit counter. Not a compare-and-swap token.
    pub version: i64,
    pub last_updated_by: String,
    #[ts(type = "string")]
    pub last_updated_at: DateTime<Utc>,
}

// --- Request Payloads ---

/// WriteSettingsRequest
///
/// Body of `POST /api/settings` and `POST /api/content-settings`.
///
/// Only used for documentation: the handler parses the raw JSON itself so that a
/// missing or non-array `settings` field maps to `400` instead of axum's `422`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct WriteSettingsRequest {
    pub settings: Vec<RouteConfig>,
}

// --- Response Payloads ---

/// ReadSettingsResponse
///
/// Merged view returned by the GET endpoints. `success: false` never means "no data":
/// it means the store could not be read and the Default Catalog was substituted.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ReadSettingsResponse {
    pub success: bool,
    pub settings: Vec<RouteConfig>,
    pub is_default: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub last_updated_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    #[ts(type = "string | null")]
    pub last_updated_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub version: Option<i64>,
}

/// WriteSettingsResponse
///
/// Returned with `200` after the document has been replaced.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct WriteSettingsResponse {
    pub success: bool,
    pub message: String,
    pub last_updated_by: String,
    #[ts(type = "string")]
    pub last_updated_at: DateTime<Utc>,
    pub version: i64,
}

/// ErrorResponse
///
/// Uniform body for rejected writes (400/401/500).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
        }
    }
}

/// SettingsChanged
///
/// Payload of the `settings-changed` event pushed through the client mirror channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SettingsChanged {
    /// Domain slug, e.g. `page-visibility`.
    pub domain: String,
    pub version: i64,
    pub last_updated_by: String,
    #[ts(type = "string")]
    pub last_updated_at: DateTime<Utc>,
}
