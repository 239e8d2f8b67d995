use std::sync::Arc;

use subtle::ConstantTimeEq;

use crate::auth::Caller;
use crate::config::AppConfig;
use crate::repository::SettingsDomain;

/// Principal
///
/// Who an allowed mutation is attributed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Principal {
    /// A verified identity, by contact address.
    Identity(String),
    /// A caller that presented the shared secret.
    SharedSecret,
}

/// Decision
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allowed(Principal),
    Denied,
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed(_))
    }
}

/// AuthorizationPolicy
///
/// Decides who may mutate a settings domain. Implementations are fail-closed: a caller
/// with neither a matching identity nor a matching secret is denied.
pub trait AuthorizationPolicy: Send + Sync {
    fn authorize(&self, caller: &Caller) -> Decision;
}

/// IdentityAllowlist
///
/// Allows callers whose verified contact address is exactly one of `emails`.
#[derive(Debug, Clone)]
pub struct IdentityAllowlist {
    pub emails: Vec<String>,
}

impl AuthorizationPolicy for IdentityAllowlist {
    fn authorize(&self, caller: &Caller) -> Decision {
        match &caller.identity {
            Some(identity) if self.emails.iter().any(|allowed| *allowed == identity.email) => {
                Decision::Allowed(Principal::Identity(identity.email.clone()))
            }
            _ => Decision::Denied,
        }
    }
}

/// SecretOrAdmin
///
/// Allows the single administrator address, or any caller whose bearer value equals the
/// configured secret. Either condition alone is enough. An unset secret matches nothing.
#[derive(Debug, Clone)]
pub struct SecretOrAdmin {
    pub admin_email: Option<String>,
    pub secret: Option<String>,
}

impl AuthorizationPolicy for SecretOrAdmin {
    fn authorize(&self, caller: &Caller) -> Decision {
        if let (Some(identity), Some(admin)) = (&caller.identity, &self.admin_email) {
            if identity.email == *admin {
                return Decision::Allowed(Principal::Identity(identity.email.clone()));
            }
        }
        match (&caller.bearer, &self.secret) {
            (Some(presented), Some(expected)) if secret_matches(presented, expected) => {
                Decision::Allowed(Principal::SharedSecret)
            }
            _ => Decision::Denied,
        }
    }
}

// Constant time over the bytes. An empty configured secret matches nothing.
fn secret_matches(presented: &str, expected: &str) -> bool {
    !expected.is_empty() && bool::from(presented.as_bytes().ct_eq(expected.as_bytes()))
}

/// PolicySet
///
/// The policy selected for each settings domain at configuration time.
#[derive(Clone)]
pub struct PolicySet {
    pub page_visibility: Arc<dyn AuthorizationPolicy>,
    pub page_content: Arc<dyn AuthorizationPolicy>,
    /// Recorded as the writer when a mutation is authorized by the shared secret.
    pub service_identity: String,
}

impl PolicySet {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            page_visibility: Arc::new(IdentityAllowlist {
                emails: config.settings_admin_emails.clone(),
            }),
            page_content: Arc::new(SecretOrAdmin {
                admin_email: config.content_admin_email.clone(),
                secret: config.content_api_secret.clone(),
            }),
            service_identity: config.content_service_identity.clone(),
        }
    }

    pub fn for_domain(&self, domain: SettingsDomain) -> &dyn AuthorizationPolicy {
        match domain {
            SettingsDomain::PageVisibility => self.page_visibility.as_ref(),
            SettingsDomain::PageContent => self.page_content.as_ref(),
        }
    }

    /// The identity string a write by `principal` is stamped with.
    pub fn writer_identity(&self, principal: &Principal) -> String {
        match principal {
            Principal::Identity(email) => email.clone(),
            Principal::SharedSecret => self.service_identity.clone(),
        }
    }
}
