//! Session tokens and their locally decodable claims

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::{Deserialize, Serialize};

use super::types::User;

/// Session data returned by the identity provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// The access token
    pub access_token: String,

    /// The refresh token
    pub refresh_token: String,

    /// The token type
    #[serde(default = "default_token_type")]
    pub token_type: String,

    /// The lifetime in seconds
    #[serde(default)]
    pub expires_in: Option<i64>,

    /// The expiry timestamp
    #[serde(default)]
    pub expires_at: Option<i64>,

    /// The signed-in user, when the provider includes it
    #[serde(default)]
    pub user: Option<User>,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

impl Session {
    /// Build a session from a token pair handed over by a redirect
    pub fn from_tokens(access_token: &str, refresh_token: &str, expires_at: Option<i64>) -> Self {
        Self {
            access_token: access_token.to_string(),
            refresh_token: refresh_token.to_string(),
            token_type: default_token_type(),
            expires_in: None,
            expires_at,
            user: None,
        }
    }

    /// Claims of the access token, if it is well formed
    pub fn claims(&self) -> Option<Claims> {
        decode_claims(&self.access_token)
    }

    /// Expiry from the session, else from the token claims
    pub fn expiry(&self) -> Option<i64> {
        self.expires_at.or_else(|| self.claims().and_then(|c| c.exp))
    }

    /// Id of the signed-in user, from the user object or the token subject
    pub fn user_id(&self) -> Option<String> {
        self.user
            .as_ref()
            .map(|u| u.id.clone())
            .or_else(|| self.claims().map(|c| c.sub))
    }
}

/// The self-contained claims of an access token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Stable subject id
    pub sub: String,

    /// Expiry, seconds since the epoch
    #[serde(default)]
    pub exp: Option<i64>,

    #[serde(default)]
    pub email: Option<String>,

    #[serde(default)]
    pub role: Option<String>,
}

impl Claims {
    /// True only when an expiry is present and already passed.
    ///
    /// Claims without an expiry count as live here; the identity provider
    /// has the final say on every privileged call.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(chrono::Utc::now().timestamp())
    }

    pub fn is_expired_at(&self, now: i64) -> bool {
        self.exp.is_some_and(|exp| exp <= now)
    }
}

/// Decode the claims segment of a bearer token without verifying it.
///
/// Returns `None` for anything that is not a three-part token with a
/// parseable header and a JSON claims object carrying a subject.
pub fn decode_claims(token: &str) -> Option<Claims> {
    let mut parts = token.trim().split('.');
    let (_header, payload, _signature) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }
    jsonwebtoken::decode_header(token.trim()).ok()?;

    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    let claims: Claims = serde_json::from_slice(&bytes).ok()?;
    if claims.sub.is_empty() {
        return None;
    }
    Some(claims)
}

/// Whether the token looks like a live session, for optimistic UI decisions only
pub fn is_signed_in(token: Option<&str>, now: i64) -> bool {
    token
        .and_then(decode_claims)
        .map(|claims| !claims.is_expired_at(now))
        .unwrap_or(false)
}
