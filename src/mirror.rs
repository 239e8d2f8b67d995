//! Client mirror channel.
//!
//! Best-effort propagation of freshly saved settings to open browser contexts: a
//! long-lived snapshot cookie and a per-domain broadcast of change notifications.
//! Nothing here feeds back into enforcement; the middleware always asks the store.

use tokio::sync::broadcast;

use crate::models::{RouteConfig, SettingsChanged, SettingsDocument};
use crate::repository::SettingsDomain;

/// One year, in seconds.
pub const MIRROR_COOKIE_MAX_AGE: u64 = 60 * 60 * 24 * 365;

const BUFFER_SIZE: usize = 64;

/// MirrorChannel
///
/// Holds one broadcast sender per settings domain. Cloning shares the channels.
#[derive(Clone)]
pub struct MirrorChannel {
    page_visibility: broadcast::Sender<SettingsChanged>,
    page_content: broadcast::Sender<SettingsChanged>,
}

impl Default for MirrorChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl MirrorChannel {
    pub fn new() -> Self {
        Self {
            page_visibility: broadcast::channel(BUFFER_SIZE).0,
            page_content: broadcast::channel(BUFFER_SIZE).0,
        }
    }

    fn sender(&self, domain: SettingsDomain) -> &broadcast::Sender<SettingsChanged> {
        match domain {
            SettingsDomain::PageVisibility => &self.page_visibility,
            SettingsDomain::PageContent => &self.page_content,
        }
    }

    /// Announces a completed write. Fire and forget: having no subscribers is fine.
    pub fn publish(&self, domain: SettingsDomain, document: &SettingsDocument) {
        let change = SettingsChanged {
            domain: domain.slug().to_string(),
            version: document.version,
            last_updated_by: document.last_updated_by.clone(),
            last_updated_at: document.last_updated_at,
        };
        let receivers = self.sender(domain).send(change).unwrap_or(0);
        tracing::debug!(domain = domain.slug(), receivers, "settings change broadcast");
    }

    pub fn subscribe(&self, domain: SettingsDomain) -> broadcast::Receiver<SettingsChanged> {
        self.sender(domain).subscribe()
    }
}

/// Name of the snapshot cookie for `domain`.
pub fn mirror_cookie_name(domain: SettingsDomain) -> String {
    format!("{}-mirror", domain.slug())
}

/// Compact `path=1|path=0` snapshot. Paths carrying characters not allowed in a cookie
/// value are left out.
pub fn encode_snapshot(entries: &[RouteConfig]) -> String {
    entries
        .iter()
        .filter(|entry| entry.path.chars().all(is_cookie_safe))
        .map(|entry| format!("{}={}", entry.path, u8::from(entry.is_visible)))
        .collect::<Vec<_>>()
        .join("|")
}

/// Parses a snapshot produced by [`encode_snapshot`]. Unparseable items are skipped.
pub fn decode_snapshot(raw: &str) -> Vec<(String, bool)> {
    raw.split('|')
        .filter_map(|item| item.rsplit_once('='))
        .filter_map(|(path, flag)| match flag {
            "1" => Some((path.to_string(), true)),
            "0" => Some((path.to_string(), false)),
            _ => None,
        })
        .collect()
}

/// Full `Set-Cookie` value for the snapshot of `entries`.
pub fn mirror_cookie(domain: SettingsDomain, entries: &[RouteConfig]) -> String {
    format!(
        "{}={}; Path=/; Max-Age={}; SameSite=Lax",
        mirror_cookie_name(domain),
        encode_snapshot(entries),
        MIRROR_COOKIE_MAX_AGE
    )
}

// RFC 6265 cookie-octet, minus '|' which separates items.
fn is_cookie_safe(c: char) -> bool {
    c.is_ascii_graphic() && !matches!(c, '"' | ',' | ';' | '\\' | '|')
}
