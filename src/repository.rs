use crate::models::{RouteConfig, SettingsDocument};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// SettingsDomain
///
/// One independently versioned settings document. Each domain lives under a fixed
/// `(store_name, document_name)` key pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingsDomain {
    PageVisibility,
    PageContent,
}

impl SettingsDomain {
    /// The `(store_name, document_name)` pair identifying the persisted document.
    pub fn document_key(self) -> (&'static str, &'static str) {
        match self {
            SettingsDomain::PageVisibility => ("site_settings", "page_visibility"),
            SettingsDomain::PageContent => ("site_settings", "page_content"),
        }
    }

    /// Stable slug used in logs, cookies and broadcast payloads.
    pub fn slug(self) -> &'static str {
        match self {
            SettingsDomain::PageVisibility => "page-visibility",
            SettingsDomain::PageContent => "page-content",
        }
    }
}

/// StoreError
///
/// Failures of the settings store. Readers never see these (they are folded into
/// "no document"); writers get them verbatim.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("no authenticated identity bound to the write handle")]
    Unauthorized,
    #[error("persisted settings document is malformed: {0}")]
    Malformed(String),
    #[error("settings store unavailable: {0}")]
    Unavailable(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// SettingsRepository Trait
///
/// The get/set contract against the document store. `load` runs on a handle that needs
/// no caller identity; `save` runs on a handle bound to `identity`.
#[async_trait]
pub trait SettingsRepository: Send + Sync {
    async fn load(&self, domain: SettingsDomain) -> Result<Option<SettingsDocument>, StoreError>;

    async fn save(
        &self,
        domain: SettingsDomain,
        document: &SettingsDocument,
        identity: &str,
    ) -> Result<(), StoreError>;
}

/// RepositoryState
///
/// The concrete type used to share the settings store across the application state.
pub type RepositoryState = Arc<dyn SettingsRepository>;

/// read_settings
///
/// Fetches the current document, treating every adapter-level failure exactly like a
/// missing document.
pub async fn read_settings(
    repo: &dyn SettingsRepository,
    domain: SettingsDomain,
) -> Option<SettingsDocument> {
    match repo.load(domain).await {
        Ok(document) => document,
        Err(e) => {
            tracing::warn!(domain = domain.slug(), error = %e, "settings read failed, treating as absent");
            None
        }
    }
}

/// write_settings
///
/// Replaces the whole document of `domain` and returns what was written.
///
/// The version is computed from a separate read; two concurrent writers can both
/// observe version N and both write N+1. The last `save` wins.
pub async fn write_settings(
    repo: &dyn SettingsRepository,
    domain: SettingsDomain,
    entries: Vec<RouteConfig>,
    identity: Option<&str>,
) -> Result<SettingsDocument, StoreError> {
    let identity = identity
        .filter(|id| !id.trim().is_empty())
        .ok_or(StoreError::Unauthorized)?;

    let current_version = match repo.load(domain).await {
        Ok(document) => document.map_or(0, |doc| doc.version),
        // A corrupt document is replaced rather than blocking every future write.
        Err(StoreError::Malformed(reason)) => {
            tracing::warn!(domain = domain.slug(), %reason, "overwriting malformed settings document");
            0
        }
        Err(e) => return Err(e),
    };

    let document = SettingsDocument {
        entries,
        version: current_version + 1,
        last_updated_by: identity.to_string(),
        last_updated_at: Utc::now(),
    };

    repo.save(domain, &document, identity).await?;

    tracing::info!(
        domain = domain.slug(),
        version = document.version,
        actor = %identity,
        "settings document written"
    );
    Ok(document)
}

/// SettingsRow
///
/// Raw row of `settings_documents`. `entries` stays untyped until validated.
#[derive(Debug, FromRow)]
struct SettingsRow {
    entries: serde_json::Value,
    version: i64,
    last_updated_by: String,
    last_updated_at: DateTime<Utc>,
}

impl TryFrom<SettingsRow> for SettingsDocument {
    type Error = StoreError;

    fn try_from(row: SettingsRow) -> Result<Self, Self::Error> {
        let entries: Vec<RouteConfig> = serde_json::from_value(row.entries)
            .map_err(|e| StoreError::Malformed(e.to_string()))?;
        if row.version < 1 {
            return Err(StoreError::Malformed(format!("invalid version {}", row.version)));
        }
        Ok(SettingsDocument {
            entries,
            version: row.version,
            last_updated_by: row.last_updated_by,
            last_updated_at: row.last_updated_at,
        })
    }
}

/// PostgresSettingsRepository
///
/// Postgres-backed document store. Holds two pools: `reader` connects with the
/// anonymous role, `writer` with the role allowed to mutate settings. Every write runs
/// in a transaction that first binds the acting identity into the session so
/// row-level policies can audit it.
pub struct PostgresSettingsRepository {
    reader: PgPool,
    writer: PgPool,
}

impl PostgresSettingsRepository {
    pub fn new(reader: PgPool, writer: PgPool) -> Self {
        Self { reader, writer }
    }
}

#[async_trait]
impl SettingsRepository for PostgresSettingsRepository {
    async fn load(&self, domain: SettingsDomain) -> Result<Option<SettingsDocument>, StoreError> {
        let (store_name, document_name) = domain.document_key();

        let row = sqlx::query_as::<_, SettingsRow>(
            r#"
            SELECT entries, version, last_updated_by, last_updated_at
            FROM settings_documents
            WHERE store_name = $1 AND document_name = $2
            "#,
        )
        .bind(store_name)
        .bind(document_name)
        .fetch_optional(&self.reader)
        .await?;

        row.map(SettingsDocument::try_from).transpose()
    }

    async fn save(
        &self,
        domain: SettingsDomain,
        document: &SettingsDocument,
        identity: &str,
    ) -> Result<(), StoreError> {
        let (store_name, document_name) = domain.document_key();
        let mut tx = self.writer.begin().await?;

        sqlx::query("SELECT set_config('app.settings_actor', $1, true)")
            .bind(identity)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO settings_documents
                (store_name, document_name, entries, version, last_updated_by, last_updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (store_name, document_name) DO UPDATE SET
                entries = EXCLUDED.entries,
                version = EXCLUDED.version,
                last_updated_by = EXCLUDED.last_updated_by,
                last_updated_at = EXCLUDED.last_updated_at
            "#,
        )
        .bind(store_name)
        .bind(document_name)
        .bind(sqlx::types::Json(&document.entries))
        .bind(document.version)
        .bind(&document.last_updated_by)
        .bind(document.last_updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }
}

/// MemorySettingsRepository
///
/// In-process store keeping each document as raw JSON, the way the database keeps it.
/// Used by tests and local runs without Postgres. Failures and latency can be injected.
#[derive(Default)]
pub struct MemorySettingsRepository {
    documents: RwLock<HashMap<SettingsDomain, serde_json::Value>>,
    // When set, `load` fails with `Unavailable`.
    fail_reads: bool,
    // When set, `save` fails with `Unavailable`.
    fail_writes: bool,
    // Artificial delay applied to every `load`.
    latency: Option<Duration>,
}

impl MemorySettingsRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            fail_reads: true,
            fail_writes: true,
            ..Self::default()
        }
    }

    pub fn failing_reads() -> Self {
        Self {
            fail_reads: true,
            ..Self::default()
        }
    }

    pub fn failing_writes() -> Self {
        Self {
            fail_writes: true,
            ..Self::default()
        }
    }

    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency: Some(latency),
            ..Self::default()
        }
    }

    /// Stores `value` verbatim, bypassing validation. Lets tests plant corrupt documents.
    pub async fn insert_raw(&self, domain: SettingsDomain, value: serde_json::Value) {
        self.documents.write().await.insert(domain, value);
    }

    pub async fn raw(&self, domain: SettingsDomain) -> Option<serde_json::Value> {
        self.documents.read().await.get(&domain).cloned()
    }
}

#[async_trait]
impl SettingsRepository for MemorySettingsRepository {
    async fn load(&self, domain: SettingsDomain) -> Result<Option<SettingsDocument>, StoreError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if self.fail_reads {
            return Err(StoreError::Unavailable("simulated read failure".to_string()));
        }

        let documents = self.documents.read().await;
        let Some(value) = documents.get(&domain) else {
            return Ok(None);
        };
        let document: SettingsDocument = serde_json::from_value(value.clone())
            .map_err(|e| StoreError::Malformed(e.to_string()))?;
        // Same rule the Postgres row conversion applies.
        if document.version < 1 {
            return Err(StoreError::Malformed(format!("invalid version {}", document.version)));
        }
        Ok(Some(document))
    }

    async fn save(
        &self,
        domain: SettingsDomain,
        document: &SettingsDocument,
        _identity: &str,
    ) -> Result<(), StoreError> {
        if self.fail_writes {
            return Err(StoreError::Unavailable("simulated write failure".to_string()));
        }
        let value =
            serde_json::to_value(document).map_err(|e| StoreError::Malformed(e.to_string()))?;
        self.documents.write().await.insert(domain, value);
        Ok(())
    }
}
