//! HMAC-SHA256 request signing for the `/api/v1/*` surface (§6).
//!
//! Every request MUST carry `X-Osa-Timestamp` (unix seconds), `X-Osa-Nonce`
//! (opaque, unique per request) and `X-Osa-Signature` (hex HMAC-SHA256 over
//! `timestamp || nonce || body`, keyed by `GatewayConfig.shared_secret`).
//! Timestamps outside a five-minute window are rejected; nonces are
//! deduplicated for five minutes so a captured request can't be replayed.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::body::{to_bytes, Body};
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tokio::sync::Mutex;

use crate::state::AppState;

const TIMESTAMP_TOLERANCE_SECS: i64 = 300;
const NONCE_TTL: Duration = Duration::from_secs(300);
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

type HmacSha256 = Hmac<Sha256>;

/// Tracks recently-seen nonces so a replayed request is rejected even
/// within the timestamp tolerance window.
#[derive(Default)]
pub struct NonceCache {
    seen: Mutex<HashMap<String, std::time::Instant>>,
}

impl NonceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if `nonce` was not already seen within the TTL
    /// window, recording it. Also sweeps expired entries.
    async fn check_and_insert(&self, nonce: &str) -> bool {
        let mut seen = self.seen.lock().await;
        let now = std::time::Instant::now();
        seen.retain(|_, inserted| now.duration_since(*inserted) < NONCE_TTL);
        if seen.contains_key(nonce) {
            return false;
        }
        seen.insert(nonce.to_string(), now);
        true
    }
}

fn verify_signature(secret: &str, timestamp: &str, nonce: &str, body: &[u8], signature_hex: &str) -> bool {
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(m) => m,
        Err(_) => return false,
    };
    mac.update(timestamp.as_bytes());
    mac.update(nonce.as_bytes());
    mac.update(body);

    match hex::decode(signature_hex) {
        Ok(sig_bytes) => mac.verify_slice(&sig_bytes).is_ok(),
        Err(_) => false,
    }
}

/// `axum::middleware::from_fn_with_state` guard for the `/api/v1` router.
/// Buffers the body (bounded) to verify the signature, then reconstructs
/// the request so downstream `Json` extractors see the same bytes.
pub async fn require_signed_request(
    State(state): State<Arc<AppState>>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    if !state.config.require_auth {
        return Ok(next.run(req).await);
    }
    let Some(secret) = state.config.shared_secret.as_deref() else {
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    };

    let (parts, body) = req.into_parts();

    let timestamp = parts
        .headers
        .get("x-osa-timestamp")
        .and_then(|v| v.to_str().ok())
        .ok_or(StatusCode::UNAUTHORIZED)?
        .to_string();
    let nonce = parts
        .headers
        .get("x-osa-nonce")
        .and_then(|v| v.to_str().ok())
        .ok_or(StatusCode::UNAUTHORIZED)?
        .to_string();
    let signature = parts
        .headers
        .get("x-osa-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or(StatusCode::UNAUTHORIZED)?
        .to_string();

    let ts: i64 = timestamp.parse().map_err(|_| StatusCode::UNAUTHORIZED)?;
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .as_secs() as i64;
    if (now - ts).abs() > TIMESTAMP_TOLERANCE_SECS {
        return Err(StatusCode::UNAUTHORIZED);
    }

    if !state.nonces.check_and_insert(&nonce).await {
        return Err(StatusCode::UNAUTHORIZED);
    }

    let bytes = to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|_| StatusCode::BAD_REQUEST)?;

    if !verify_signature(secret, &timestamp, &nonce, &bytes, &signature) {
        return Err(StatusCode::UNAUTHORIZED);
    }

    let req = Request::from_parts(parts, Body::from(bytes));
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(secret: &str, timestamp: &str, nonce: &str, body: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(timestamp.as_bytes());
        mac.update(nonce.as_bytes());
        mac.update(body);
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn signature_round_trips() {
        let sig = sign("s3cr3t", "1700000000", "nonce-a", b"{}");
        assert!(verify_signature("s3cr3t", "1700000000", "nonce-a", b"{}", &sig));
    }

    #[test]
    fn wrong_secret_rejected() {
        let sig = sign("s3cr3t", "1700000000", "nonce-a", b"{}");
        assert!(!verify_signature("other", "1700000000", "nonce-a", b"{}", &sig));
    }

    #[test]
    fn tampered_body_rejected() {
        let sig = sign("s3cr3t", "1700000000", "nonce-a", b"{}");
        assert!(!verify_signature("s3cr3t", "1700000000", "nonce-a", b"{\"x\":1}", &sig));
    }

    #[tokio::test]
    async fn nonce_cache_rejects_replay() {
        let cache = NonceCache::new();
        assert!(cache.check_and_insert("n1").await);
        assert!(!cache.check_and_insert("n1").await);
        assert!(cache.check_and_insert("n2").await);
    }
}
