use axum::{
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, header, request::Parts},
};
use jsonwebtoken::{DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use uuid::Uuid;

use crate::config::{AppConfig, Env};

/// Name of the cookie carrying the session JWT.
pub const SESSION_COOKIE: &str = "session";

/// Development-only header naming the caller directly. Honoured in `Env::Local` only.
pub const DEV_IDENTITY_HEADER: &str = "x-user-email";

/// Claims
///
/// Payload of the session JWT issued by the identity provider.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the identity provider's user id.
    pub sub: Uuid,
    /// Contact address. This is what authorization policies match on.
    #[serde(default)]
    pub email: String,
    pub exp: usize,
    pub iat: usize,
}

/// VerifiedIdentity
///
/// An identity whose session token validated. `id` is absent for the local bypass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    pub id: Option<Uuid>,
    pub email: String,
}

/// Caller
///
/// Everything an authorization policy may look at: the verified identity, if any, and
/// the raw bearer value, which doubles as a candidate shared secret.
///
/// Extraction never rejects; an anonymous caller is a valid `Caller`.
#[derive(Debug, Clone, Default)]
pub struct Caller {
    pub identity: Option<VerifiedIdentity>,
    pub bearer: Option<String>,
}

impl Caller {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn with_identity(email: &str) -> Self {
        Self {
            identity: Some(VerifiedIdentity {
                id: None,
                email: email.to_string(),
            }),
            bearer: None,
        }
    }

    pub fn with_bearer(token: &str) -> Self {
        Self {
            identity: None,
            bearer: Some(token.to_string()),
        }
    }

    /// Resolves a caller from request headers.
    ///
    /// Identity sources, first match wins:
    /// 1. `x-user-email` header, local environment only;
    /// 2. the `session` cookie holding a valid JWT;
    /// 3. the bearer token, if it is itself a valid JWT.
    pub fn from_headers(headers: &HeaderMap, config: &AppConfig) -> Self {
        let bearer = headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(str::to_string);

        let dev_identity = if config.env == Env::Local {
            headers
                .get(DEV_IDENTITY_HEADER)
                .and_then(|value| value.to_str().ok())
                .map(str::trim)
                .filter(|email| !email.is_empty())
                .map(|email| VerifiedIdentity {
                    id: None,
                    email: email.to_string(),
                })
        } else {
            None
        };

        let identity = dev_identity
            .or_else(|| {
                cookie_value(headers, SESSION_COOKIE)
                    .and_then(|token| verify_token(&token, &config.jwt_secret))
            })
            .or_else(|| {
                bearer
                    .as_deref()
                    .and_then(|token| verify_token(token, &config.jwt_secret))
            });

        Self { identity, bearer }
    }
}

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
    AppConfig: FromRef<S>,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let config = AppConfig::from_ref(state);
        Ok(Caller::from_headers(&parts.headers, &config))
    }
}

/// verify_token
///
/// Decodes and validates an HS256 session JWT (signature and expiry). Tokens without an
/// email claim do not yield an identity.
pub fn verify_token(token: &str, secret: &str) -> Option<VerifiedIdentity> {
    let key = DecodingKey::from_secret(secret.as_bytes());
    let mut validation = Validation::default();
    validation.validate_exp = true;

    match decode::<Claims>(token, &key, &validation) {
        Ok(data) if !data.claims.email.is_empty() => Some(VerifiedIdentity {
            id: Some(data.claims.sub),
            email: data.claims.email,
        }),
        Ok(_) => None,
        Err(e) => {
            tracing::debug!(error = %e, "session token rejected");
            None
        }
    }
}

/// Returns the value of cookie `name` from any `Cookie` header.
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|raw| raw.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
}
