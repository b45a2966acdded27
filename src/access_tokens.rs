use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde_json::Value;

use crate::error::Result;
use crate::models::{AccessTokenRequest, AccessTokenResponse, RefreshToken};
use crate::request::make_request;
use crate::transport::{HttpRequest, Transport};

/// Short-lived access tokens keyed by `platform:scope`.
///
/// Entries are replaced when a read finds them expired and are otherwise
/// kept until [`AccessTokenCache::reset`]. The map is not locked during a
/// token exchange: lookups for other keys proceed, and two callers racing on
/// the same missing key may both exchange, the last write winning.
#[derive(Debug, Default)]
pub struct AccessTokenCache {
    entries: Mutex<HashMap<String, String>>,
}

impl AccessTokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a valid token for `(platform, scope)`, exchanging the refresh
    /// token at `tokens_url` when none is cached or the cached one expired.
    pub fn get<X>(
        &self,
        transport: &X,
        tokens_url: &str,
        refresh_token: &RefreshToken,
        platform: &str,
        scope: &str,
    ) -> Result<String>
    where
        X: Transport + ?Sized,
    {
        let key = format!("{platform}:{scope}");

        let cached = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .filter(|token| !has_expired(token))
            .cloned();
        if let Some(token) = cached {
            return Ok(token);
        }

        let token = create_access_token(transport, tokens_url, refresh_token, platform, scope)?;
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, token.clone());
        Ok(token)
    }

    /// Drops every cached token.
    pub fn reset(&self) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn create_access_token<X>(
    transport: &X,
    tokens_url: &str,
    refresh_token: &RefreshToken,
    platform: &str,
    scope: &str,
) -> Result<String>
where
    X: Transport + ?Sized,
{
    let body = serde_json::to_value(AccessTokenRequest {
        subject: &refresh_token.subject,
        platform,
        scope,
    })?;

    let request = HttpRequest::post(tokens_url, body).with_token(refresh_token.token.as_str());
    let (resp, _): (AccessTokenResponse, _) = make_request(transport, &request)?;

    tracing::info!(platform, scope, "access token issued");
    Ok(resp.token)
}

/// Whether `token` is past its `exp` claim (milliseconds since the epoch).
///
/// The signature is not checked. A token without `exp` never expires; one
/// whose claims cannot be decoded counts as expired.
pub fn has_expired(token: &str) -> bool {
    has_expired_at(token, now_millis())
}

pub(crate) fn has_expired_at(token: &str, now_ms: i64) -> bool {
    match expiration(token) {
        Some(0) => false,
        Some(exp) => now_ms >= exp,
        None => true,
    }
}

/// `Some(0)` when the claims decode but carry no expiry.
fn expiration(token: &str) -> Option<i64> {
    let mut parts = token.split('.');
    let (_header, payload) = (parts.next()?, parts.next()?);

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .ok()?;
    let claims: Value = serde_json::from_slice(&bytes).ok()?;
    let claims = claims.as_object()?;

    match claims.get("exp") {
        None | Some(Value::Null) => Some(0),
        Some(exp) => exp.as_i64().or_else(|| exp.as_f64().map(|v| v as i64)),
    }
}

pub(crate) fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
