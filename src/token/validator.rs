use super::codec::{build_message, constant_time_eq, sign};
use super::TOKEN_SEPARATOR;
use crate::config::csrf::CsrfConfig;
use crate::error::{CsrfError, ValidationError};

/// The two halves of a well-formed token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedToken<'a> {
    pub signature: &'a str,
    pub nonce: &'a str,
}

/// Outcome of `validate_token`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationResult {
    pub valid: bool,
    pub error: Option<ValidationError>,
}

impl ValidationResult {
    pub fn ok() -> Self {
        Self {
            valid: true,
            error: None,
        }
    }

    pub fn invalid(error: ValidationError) -> Self {
        Self {
            valid: false,
            error: Some(error),
        }
    }
}

/// Split `token` into signature and nonce.
///
/// Returns `None` unless there are exactly two non-empty parts.
pub fn parse_token(token: &str) -> Option<ParsedToken<'_>> {
    let mut parts = token.split(TOKEN_SEPARATOR);
    let signature = parts.next()?;
    let nonce = parts.next()?;

    if parts.next().is_some() || signature.is_empty() || nonce.is_empty() {
        return None;
    }

    Some(ParsedToken { signature, nonce })
}

/// Check that `token` was issued for `session` under the configured secret.
///
/// Malformed or forged tokens produce an invalid result, never an error.
/// `Err` is reserved for a configuration the MAC cannot be keyed with.
pub fn validate_token(
    token: &str,
    session: &str,
    config: &CsrfConfig,
) -> Result<ValidationResult, CsrfError> {
    if token.is_empty() || session.is_empty() {
        return Ok(ValidationResult::invalid(ValidationError::MissingInput));
    }

    let Some(parsed) = parse_token(token) else {
        return Ok(ValidationResult::invalid(ValidationError::InvalidFormat));
    };

    let expected = sign(&build_message(session, parsed.nonce), &config.secret)?;

    if constant_time_eq(parsed.signature, &expected) {
        Ok(ValidationResult::ok())
    } else {
        Ok(ValidationResult::invalid(ValidationError::InvalidSignature))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::csrf::CsrfSecret;
    use crate::token::generate_token;

    fn config_with(secret: &str) -> CsrfConfig {
        CsrfConfig::new(CsrfSecret::new(secret.as_bytes().to_vec()).unwrap())
    }

    #[test]
    fn test_parse_token_accepts_two_parts() {
        let parsed = parse_token("abc.def").unwrap();
        assert_eq!(parsed.signature, "abc");
        assert_eq!(parsed.nonce, "def");
    }

    #[test]
    fn test_parse_token_rejects_malformed_input() {
        for input in ["", "no-dot", "a.b.c", ".x", "x.", ".", ".."] {
            assert_eq!(parse_token(input), None, "input {:?} should not parse", input);
        }
    }

    #[test]
    fn test_parse_token_is_idempotent() {
        let token = "0123abcd.cafebabe";
        assert_eq!(parse_token(token), parse_token(token));
    }

    #[test]
    fn test_round_trip_is_valid() {
        let config = config_with("test-secret-key");
        for session in ["user123", "anon-10.0.0.1", "s", "ünïcode-session"] {
            let token = generate_token(session, &config).unwrap();
            let result = validate_token(token.as_str(), session, &config).unwrap();
            assert!(result.valid, "token for {:?} should validate", session);
            assert_eq!(result.error, None);
        }
    }

    #[test]
    fn test_two_tokens_for_same_session_both_validate() {
        let config = config_with("test-secret-key");
        let first = generate_token("user123", &config).unwrap();
        let second = generate_token("user123", &config).unwrap();

        assert!(validate_token(first.as_str(), "user123", &config).unwrap().valid);
        assert!(validate_token(second.as_str(), "user123", &config).unwrap().valid);
    }

    #[test]
    fn test_cross_session_replay_fails() {
        let config = config_with("test-secret-key");
        let token = generate_token("user123", &config).unwrap();

        let result = validate_token(token.as_str(), "user456", &config).unwrap();
        assert!(!result.valid);
        assert_eq!(result.error, Some(ValidationError::InvalidSignature));
    }

    #[test]
    fn test_other_secret_fails() {
        let token = generate_token("user123", &config_with("key-one")).unwrap();
        let result = validate_token(token.as_str(), "user123", &config_with("key-two")).unwrap();
        assert!(!result.valid);
    }

    #[test]
    fn test_flipping_signature_character_fails() {
        let config = config_with("test-secret-key");
        let token = generate_token("user123", &config).unwrap();
        let (signature, nonce) = token.as_str().split_once('.').unwrap();

        let mut chars: Vec<char> = signature.chars().collect();
        for index in [0, chars.len() / 2, chars.len() - 1] {
            let original = chars[index];
            chars[index] = if original == 'a' { 'b' } else { 'a' };
            let tampered = format!("{}.{}", chars.iter().collect::<String>(), nonce);
            chars[index] = original;

            let result = validate_token(&tampered, "user123", &config).unwrap();
            assert!(!result.valid, "tampering at {} must fail", index);
        }
    }

    #[test]
    fn test_tampered_nonce_fails() {
        let config = config_with("test-secret-key");
        let token = generate_token("user123", &config).unwrap();
        let tampered = format!("{}0", token.as_str());

        assert!(!validate_token(&tampered, "user123", &config).unwrap().valid);
    }

    #[test]
    fn test_boundary_shift_forgery_fails() {
        // A token for ("ab", nonce "c...") must not be accepted for session "a".
        let config = config_with("test-secret-key");
        let signature = sign(&build_message("ab", "cd"), &config.secret).unwrap();
        let forged = format!("{}.{}", signature, "bcd");

        assert!(!validate_token(&forged, "a", &config).unwrap().valid);
    }

    #[test]
    fn test_missing_input() {
        let config = config_with("test-secret-key");

        let result = validate_token("", "user123", &config).unwrap();
        assert_eq!(result, ValidationResult::invalid(ValidationError::MissingInput));

        let result = validate_token("abc.def", "", &config).unwrap();
        assert_eq!(result.error, Some(ValidationError::MissingInput));
    }

    #[test]
    fn test_malformed_tokens_are_invalid_not_errors() {
        let config = config_with("test-secret-key");
        for token in ["no-dot", "a.b.c", ".x", "x."] {
            let result = validate_token(token, "user123", &config).unwrap();
            assert!(!result.valid);
            assert_eq!(result.error, Some(ValidationError::InvalidFormat));
        }
    }

    #[test]
    fn test_wrong_length_signature_is_invalid() {
        let config = config_with("test-secret-key");
        let result = validate_token("abcd.ef01", "user123", &config).unwrap();
        assert_eq!(result.error, Some(ValidationError::InvalidSignature));
    }
}
