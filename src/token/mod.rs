//! Session-bound anti-forgery tokens.
//!
//! A token is `"<hmac-hex>.<nonce-hex>"` where the HMAC-SHA256 covers a
//! length-prefixed encoding of `(session id, nonce)`. Tokens carry no
//! expiry and no server-side state; the issuance cookie's max-age bounds
//! their lifetime.

pub mod codec;
pub mod generator;
pub mod validator;

use std::fmt;

pub use codec::{build_message, constant_time_eq, sign};
pub use generator::generate_token;
pub use validator::{parse_token, validate_token, ParsedToken, ValidationResult};

/// Separator between the signature and nonce halves of a token.
pub const TOKEN_SEPARATOR: char = '.';

/// An issued CSRF token in wire format.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct CsrfToken(String);

impl CsrfToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Short prefix suitable for log lines.
    pub fn log_prefix(&self) -> &str {
        log_prefix(&self.0)
    }
}

impl fmt::Debug for CsrfToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CsrfToken").field(&"***").finish()
    }
}

impl fmt::Display for CsrfToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CsrfToken {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

pub(crate) fn log_prefix(value: &str) -> &str {
    let end = value
        .char_indices()
        .nth(8)
        .map(|(idx, _)| idx)
        .unwrap_or(value.len());
    &value[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_hides_token_value() {
        let token = CsrfToken::new("abcdef0123456789.cafe");
        assert_eq!(format!("{:?}", token), "CsrfToken(\"***\")");
        assert_eq!(token.to_string(), "abcdef0123456789.cafe");
    }

    #[test]
    fn test_log_prefix_truncates() {
        assert_eq!(log_prefix("abcdef0123456789"), "abcdef01");
        assert_eq!(log_prefix("abc"), "abc");
        assert_eq!(log_prefix(""), "");
    }
}
