//! HMAC-SHA256 request signing for broadcast authorization.
//!
//! The signature produced here travels with a broadcast start request and
//! lets the streaming backend check the request without seeing the key.

mod error;
mod hmac_sha256;

pub use error::SigningError;
pub use hmac_sha256::{is_supported, request_signature, sign, verify};

/// Result type for signing operations.
pub type SigningResult<T> = Result<T, SigningError>;
