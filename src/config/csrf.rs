use std::env;

use axum::http::HeaderName;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use time::Duration;
use tracing::warn;

use crate::error::ConfigError;

pub const DEFAULT_COOKIE_NAME: &str = "__csrf";
pub const DEFAULT_HEADER_NAME: &str = "x-csrf-token";
pub const DEFAULT_FIELD_NAME: &str = "_csrf";
pub const DEFAULT_SESSION_COOKIE_NAME: &str = "session";
pub const DEFAULT_NONCE_LENGTH: usize = 32;
pub const DEFAULT_COOKIE_MAX_AGE_SECS: i64 = 3600;
pub const DEFAULT_MAX_FORM_BYTES: usize = 2 * 1024 * 1024;

pub const MIN_NONCE_LENGTH: usize = 16;
pub const MAX_NONCE_LENGTH: usize = 256;

/// Minimum decoded secret length accepted when running in production.
pub const MIN_PRODUCTION_SECRET_BYTES: usize = 32;

/// HMAC key for token signatures. Never empty once constructed.
#[derive(Clone)]
pub struct CsrfSecret(Vec<u8>);

impl CsrfSecret {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self, ConfigError> {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Err(ConfigError::MissingSecret);
        }
        Ok(Self(bytes))
    }

    /// Accepts base64 input, falling back to the raw bytes of the string.
    pub fn from_encoded(secret: &str) -> Result<Self, ConfigError> {
        Self::new(decode_secret_bytes(secret))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for CsrfSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("CsrfSecret").field(&"[REDACTED]").finish()
    }
}

/// Resolved CSRF settings, built once at startup and shared read-only.
#[derive(Debug, Clone)]
pub struct CsrfConfig {
    pub secret: CsrfSecret,
    pub cookie_name: String,
    pub header_name: String,
    pub field_name: String,
    pub nonce_length: usize,
    pub cookie_max_age: Duration,
    /// Adds the `Secure` attribute to the issuance cookie.
    pub secure: bool,
    pub session_cookie_name: String,
    /// Use `X-Forwarded-For` / `X-Real-IP` for anonymous session buckets.
    pub trust_forwarded_for: bool,
    /// Upper bound on bodies buffered to read the form-field token.
    pub max_form_bytes: usize,
}

impl CsrfConfig {
    /// Development defaults around an explicit secret.
    pub fn new(secret: CsrfSecret) -> Self {
        Self {
            secret,
            cookie_name: DEFAULT_COOKIE_NAME.to_string(),
            header_name: DEFAULT_HEADER_NAME.to_string(),
            field_name: DEFAULT_FIELD_NAME.to_string(),
            nonce_length: DEFAULT_NONCE_LENGTH,
            cookie_max_age: Duration::seconds(DEFAULT_COOKIE_MAX_AGE_SECS),
            secure: false,
            session_cookie_name: DEFAULT_SESSION_COOKIE_NAME.to_string(),
            trust_forwarded_for: true,
            max_form_bytes: DEFAULT_MAX_FORM_BYTES,
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup and validates it.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let is_production = lookup("ENVIRONMENT")
            .map(|value| value == "production")
            .unwrap_or(false);

        let raw_secret = lookup("CSRF_SECRET")
            .filter(|value| !value.is_empty())
            .ok_or(ConfigError::MissingSecret)?;
        let secret = CsrfSecret::from_encoded(&raw_secret)?;

        if is_production {
            check_production_secret(&raw_secret, &secret)?;
        } else if secret.len() < MIN_PRODUCTION_SECRET_BYTES {
            warn!(
                "CSRF_SECRET is shorter than {} bytes; acceptable for development only",
                MIN_PRODUCTION_SECRET_BYTES
            );
        }

        let mut config = Self::new(secret);
        config.secure = is_production;

        if let Some(name) = lookup("CSRF_COOKIE_NAME") {
            config.cookie_name = name;
        }
        if let Some(name) = lookup("CSRF_HEADER_NAME") {
            config.header_name = name.to_ascii_lowercase();
        }
        if let Some(name) = lookup("CSRF_FIELD_NAME") {
            config.field_name = name;
        }
        if let Some(name) = lookup("SESSION_COOKIE_NAME") {
            config.session_cookie_name = name;
        }
        if let Some(value) = lookup("CSRF_NONCE_LENGTH") {
            config.nonce_length = parse_number("CSRF_NONCE_LENGTH", &value)?;
        }
        if let Some(value) = lookup("CSRF_COOKIE_MAX_AGE") {
            let secs: i64 = parse_number("CSRF_COOKIE_MAX_AGE", &value)?;
            config.cookie_max_age = Duration::seconds(secs);
        }
        if let Some(value) = lookup("CSRF_MAX_FORM_BYTES") {
            config.max_form_bytes = parse_number("CSRF_MAX_FORM_BYTES", &value)?;
        }
        if let Some(value) = lookup("CSRF_TRUST_FORWARDED_FOR") {
            config.trust_forwarded_for = flag_enabled(&value);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn cookie_name(mut self, name: impl Into<String>) -> Self {
        self.cookie_name = name.into();
        self
    }

    pub fn header_name(mut self, name: impl Into<String>) -> Self {
        self.header_name = name.into().to_ascii_lowercase();
        self
    }

    pub fn field_name(mut self, name: impl Into<String>) -> Self {
        self.field_name = name.into();
        self
    }

    pub fn nonce_length(mut self, length: usize) -> Self {
        self.nonce_length = length;
        self
    }

    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn session_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.session_cookie_name = name.into();
        self
    }

    pub fn trust_forwarded_for(mut self, trust: bool) -> Self {
        self.trust_forwarded_for = trust;
        self
    }

    pub fn max_form_bytes(mut self, limit: usize) -> Self {
        self.max_form_bytes = limit;
        self
    }

    /// Checks the settings that would otherwise only fail mid-request.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.secret.is_empty() {
            return Err(ConfigError::MissingSecret);
        }

        if !(MIN_NONCE_LENGTH..=MAX_NONCE_LENGTH).contains(&self.nonce_length) {
            return Err(ConfigError::InvalidValue {
                key: "CSRF_NONCE_LENGTH",
                reason: format!(
                    "must be between {} and {} bytes",
                    MIN_NONCE_LENGTH, MAX_NONCE_LENGTH
                ),
            });
        }

        if self.cookie_max_age <= Duration::ZERO {
            return Err(ConfigError::InvalidValue {
                key: "CSRF_COOKIE_MAX_AGE",
                reason: "must be a positive number of seconds".to_string(),
            });
        }

        if self.max_form_bytes == 0 {
            return Err(ConfigError::InvalidValue {
                key: "CSRF_MAX_FORM_BYTES",
                reason: "must be a positive number of bytes".to_string(),
            });
        }

        HeaderName::try_from(self.header_name.as_str())
            .map_err(|_| ConfigError::InvalidName(self.header_name.clone()))?;

        for name in [&self.cookie_name, &self.session_cookie_name, &self.field_name] {
            if !is_token_name(name) {
                return Err(ConfigError::InvalidName(name.clone()));
            }
        }

        Ok(())
    }
}

fn check_production_secret(raw: &str, secret: &CsrfSecret) -> Result<(), ConfigError> {
    if secret.len() < MIN_PRODUCTION_SECRET_BYTES {
        return Err(ConfigError::WeakSecret(format!(
            "CSRF_SECRET must be at least {} bytes in production",
            MIN_PRODUCTION_SECRET_BYTES
        )));
    }

    let lowered = raw.to_ascii_lowercase();
    if lowered.contains("example") || lowered.contains("changeme") || lowered.contains("default") {
        return Err(ConfigError::WeakSecret(
            "CSRF_SECRET appears to be a placeholder value".to_string(),
        ));
    }

    Ok(())
}

fn parse_number<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key,
        reason: format!("'{}' is not a valid number", value),
    })
}

fn flag_enabled(value: &str) -> bool {
    matches!(value, "1" | "true" | "TRUE" | "True")
}

// RFC 6265 cookie-name characters, also fine as a form field name.
fn is_token_name(name: &str) -> bool {
    !name.is_empty()
        && name.bytes().all(|b| {
            b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
        })
}

fn decode_secret_bytes(secret: &str) -> Vec<u8> {
    STANDARD
        .decode(secret.as_bytes())
        .unwrap_or_else(|_| secret.as_bytes().to_vec())
}
