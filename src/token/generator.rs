use rand::{rngs::OsRng, RngCore};
use tracing::debug;

use super::codec::{build_message, sign};
use super::{CsrfToken, TOKEN_SEPARATOR};
use crate::config::csrf::{CsrfConfig, MAX_NONCE_LENGTH, MIN_NONCE_LENGTH};
use crate::error::CsrfError;

/// Issue a fresh token bound to `session`.
///
/// Every call draws a new nonce, so repeated calls for one session return
/// distinct tokens that all validate (one per open tab, for example).
pub fn generate_token(session: &str, config: &CsrfConfig) -> Result<CsrfToken, CsrfError> {
    if session.is_empty() {
        return Err(CsrfError::Configuration(
            "cannot issue a CSRF token without a session id".to_string(),
        ));
    }

    if !(MIN_NONCE_LENGTH..=MAX_NONCE_LENGTH).contains(&config.nonce_length) {
        return Err(CsrfError::Configuration(format!(
            "nonce length must be between {} and {} bytes",
            MIN_NONCE_LENGTH, MAX_NONCE_LENGTH
        )));
    }

    let nonce = random_nonce(config.nonce_length);
    let signature = sign(&build_message(session, &nonce), &config.secret)?;
    let token = CsrfToken::new(format!("{}{}{}", signature, TOKEN_SEPARATOR, nonce));

    debug!("Generated CSRF token: {}", token.log_prefix());
    Ok(token)
}

fn random_nonce(length: usize) -> String {
    let mut bytes = vec![0u8; length];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::csrf::CsrfSecret;

    fn config() -> CsrfConfig {
        CsrfConfig::new(CsrfSecret::new(b"test-secret-key".to_vec()).unwrap())
    }

    #[test]
    fn test_token_shape() {
        let token = generate_token("user123", &config()).unwrap();
        let (signature, nonce) = token.as_str().split_once('.').unwrap();

        assert_eq!(signature.len(), 64);
        assert_eq!(nonce.len(), 64, "default nonce is 32 bytes hex-encoded");
        assert!(token
            .as_str()
            .chars()
            .all(|c| c == '.' || matches!(c, '0'..='9' | 'a'..='f')));
    }

    #[test]
    fn test_nonce_length_is_configurable() {
        let token = generate_token("user123", &config().nonce_length(16)).unwrap();
        let (_, nonce) = token.as_str().split_once('.').unwrap();
        assert_eq!(nonce.len(), 32);
    }

    #[test]
    fn test_tokens_are_unique_per_call() {
        let config = config();
        let token1 = generate_token("user123", &config).unwrap();
        let token2 = generate_token("user123", &config).unwrap();
        assert_ne!(token1, token2, "Tokens should be unique");
    }

    #[test]
    fn test_empty_session_is_rejected() {
        let result = generate_token("", &config());
        assert!(matches!(result, Err(CsrfError::Configuration(_))));
    }

    #[test]
    fn test_out_of_range_nonce_length_is_rejected() {
        let empty = generate_token("user123", &config().nonce_length(0));
        assert!(matches!(empty, Err(CsrfError::Configuration(_))));

        let huge = generate_token("user123", &config().nonce_length(MAX_NONCE_LENGTH + 1));
        assert!(matches!(huge, Err(CsrfError::Configuration(_))));

        let upper = generate_token("user123", &config().nonce_length(MAX_NONCE_LENGTH)).unwrap();
        let (_, nonce) = upper.as_str().split_once('.').unwrap();
        assert_eq!(nonce.len(), MAX_NONCE_LENGTH * 2);
    }
}
