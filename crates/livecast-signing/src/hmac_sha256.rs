//! Keyed SHA-256 digests.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::{instrument, trace};

use livecast_ipc::Signature;

use crate::error::SigningError;
use crate::SigningResult;

type HmacSha256 = Hmac<Sha256>;

/// Sign `message` with `key`.
///
/// Deterministic: the same pair always yields the same 64-character lowercase
/// hex digest. An empty message or key is refused rather than hashed.
#[instrument(name = "hmac_sign", skip_all, fields(message_len = message.len()))]
pub fn sign(message: &str, key: &str) -> SigningResult<Signature> {
    if message.is_empty() {
        return Err(SigningError::InvalidInput("message"));
    }
    if key.is_empty() {
        return Err(SigningError::InvalidInput("key"));
    }

    let mac = keyed_mac(key, message)?;
    let digest: [u8; 32] = mac.finalize().into_bytes().into();

    trace!("Message signed");
    Ok(Signature::from_digest(digest))
}

/// Check `signature` against `message` and `key` in constant time.
pub fn verify(message: &str, key: &str, signature: &Signature) -> bool {
    if message.is_empty() || key.is_empty() {
        return false;
    }
    let Ok(expected) = hex::decode(signature.as_str()) else {
        return false;
    };
    match keyed_mac(key, message) {
        Ok(mac) => mac.verify_slice(&expected).is_ok(),
        Err(_) => false,
    }
}

/// Signature for a cloud REST API request.
///
/// The path loses its query string, gains a leading slash and drops a
/// trailing one; the signed data is `"{timestamp}:{path}:{api_key}"` keyed
/// with `api_key`.
pub fn request_signature(
    request_path: &str,
    api_key: &str,
    timestamp: u64,
) -> SigningResult<Signature> {
    let path = normalize_request_path(request_path)?;
    if api_key.is_empty() {
        return Err(SigningError::InvalidInput("key"));
    }
    sign(&format!("{timestamp}:{path}:{api_key}"), api_key)
}

/// Whether HMAC-SHA256 is available here. Pure Rust, so always.
pub fn is_supported() -> bool {
    true
}

fn keyed_mac(key: &str, message: &str) -> SigningResult<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(key.as_bytes())
        .map_err(|e| SigningError::Backend(e.to_string()))?;
    mac.update(message.as_bytes());
    Ok(mac)
}

fn normalize_request_path(request_path: &str) -> SigningResult<String> {
    let path = request_path.split('?').next().unwrap_or_default();
    let path = path.strip_suffix('/').unwrap_or(path);
    if path.trim_start_matches('/').is_empty() {
        return Err(SigningError::InvalidInput("request path"));
    }
    if path.starts_with('/') {
        Ok(path.to_string())
    } else {
        Ok(format!("/{path}"))
    }
}
