//! Carrier session tokens.
//!
//! Tokens are JWTs. A statically configured token is only used when it is
//! structurally valid (three base64url segments, a JSON claims object, and
//! an `exp` claim in the future when one is present). Tokens obtained by
//! login are trusted as-is; their lifetime comes from `exp` when readable.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

/// Lifetime assumed for a login token whose expiry cannot be read.
///
/// Carrier sessions last ten days; refresh a day early.
pub const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 9 * 24 * 60 * 60;

/// Seconds before expiry at which a token is treated as expired.
const EXPIRY_BUFFER_SECS: i64 = 60;

/// Where a token came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSource {
    /// Long-lived token from configuration.
    Static,
    /// Session token from the interactive login exchange.
    Login,
}

/// A bearer token for the carrier API.
#[derive(Debug, Clone)]
pub struct CarrierToken {
    /// Bearer token for API requests.
    pub access_token: SecretString,
    /// Unix timestamp when the token expires.
    pub expires_at: i64,
    pub source: TokenSource,
}

/// Request body for the carrier login endpoint.
#[derive(Serialize)]
pub(crate) struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

/// Successful response from the carrier login endpoint.
#[derive(Deserialize)]
pub(crate) struct LoginResponse {
    pub token: String,
}

/// Error response from the carrier login endpoint.
#[derive(Deserialize)]
pub(crate) struct LoginErrorResponse {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Deserialize)]
struct Claims {
    #[serde(default)]
    exp: Option<i64>,
}

/// Decode a JWT's claims, returning its `exp` if it has one.
///
/// Returns `None` when the token is not a structurally valid JWT.
fn read_expiry(raw: &str) -> Option<Option<i64>> {
    let mut segments = raw.split('.');
    let (Some(header), Some(claims), Some(signature), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return None;
    };
    if header.is_empty() || claims.is_empty() || signature.is_empty() {
        return None;
    }

    URL_SAFE_NO_PAD.decode(header).ok()?;
    let claims = URL_SAFE_NO_PAD.decode(claims).ok()?;
    let claims: Claims = serde_json::from_slice(&claims).ok()?;
    Some(claims.exp)
}

impl CarrierToken {
    /// Accept a configured static token if it is structurally valid and unexpired.
    #[must_use]
    pub fn from_static(raw: &SecretString) -> Option<Self> {
        let now = chrono::Utc::now().timestamp();
        let expires_at = read_expiry(raw.expose_secret())?.unwrap_or(i64::MAX);

        let token = Self {
            access_token: raw.clone(),
            expires_at,
            source: TokenSource::Static,
        };
        (!token.is_expired_at(now)).then_some(token)
    }

    /// Wrap a token returned by the login exchange.
    #[must_use]
    pub fn from_login(raw: SecretString) -> Self {
        let now = chrono::Utc::now().timestamp();
        let expires_at = read_expiry(raw.expose_secret())
            .flatten()
            .unwrap_or(now + DEFAULT_TOKEN_LIFETIME_SECS);

        Self {
            access_token: raw,
            expires_at,
            source: TokenSource::Login,
        }
    }

    /// Check if the token has expired (or will within a minute).
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(chrono::Utc::now().timestamp())
    }

    fn is_expired_at(&self, now: i64) -> bool {
        now >= self.expires_at.saturating_sub(EXPIRY_BUFFER_SECS)
    }
}
