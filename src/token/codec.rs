use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::config::csrf::CsrfSecret;
use crate::error::CsrfError;

type HmacSha256 = Hmac<Sha256>;

/// Encode `(session, nonce)` as `"<len>!<session>!<len>!<nonce>"`.
///
/// Lengths are byte lengths. Without them `("ab", "c")` and `("a", "bc")`
/// would sign the same bytes and a token could be moved to another session.
pub fn build_message(session: &str, nonce: &str) -> String {
    format!("{}!{}!{}!{}", session.len(), session, nonce.len(), nonce)
}

/// HMAC-SHA256 of `message` keyed by `secret`, lowercase hex.
pub fn sign(message: &str, secret: &CsrfSecret) -> Result<String, CsrfError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| CsrfError::Configuration(format!("HMAC key rejected: {}", e)))?;
    mac.update(message.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Compare two strings without leaking the position of the first difference.
///
/// Unequal lengths return early; only the length itself is observable.
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.as_bytes().ct_eq(b.as_bytes()).into()
}
