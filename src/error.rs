use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use thiserror::Error;

/// Startup-time configuration failures. Any of these must keep the server
/// from accepting traffic.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("CSRF_SECRET must be set to a non-empty value")]
    MissingSecret,

    #[error("Weak CSRF secret: {0}")]
    WeakSecret(String),

    #[error("Invalid value for {key}: {reason}")]
    InvalidValue { key: &'static str, reason: String },

    #[error("Invalid cookie, header or field name: {0:?}")]
    InvalidName(String),
}

/// Errors raised by the token protocol itself.
///
/// Attacker-controlled input never produces one of these; they signal a
/// misconfigured caller and map to a 500-class response.
#[derive(Error, Debug)]
pub enum CsrfError {
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl From<ConfigError> for CsrfError {
    fn from(err: ConfigError) -> Self {
        CsrfError::Configuration(err.to_string())
    }
}

/// Reason attached to an invalid `ValidationResult`.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Token and session ID are required")]
    MissingInput,

    #[error("Invalid token format")]
    InvalidFormat,

    #[error("Invalid token signature")]
    InvalidSignature,
}

/// RFC 7807 problem details body.
#[derive(Debug, Clone, Serialize)]
pub struct ProblemDetails {
    #[serde(rename = "type")]
    pub problem_type: String,
    pub title: String,
    pub status: u16,
    pub detail: String,
    pub instance: String,
}

/// Rejections produced by the CSRF middleware pair.
///
/// Malformed tokens and wrong signatures both surface as `ValidationFailed`
/// with one detail text so the response is not an oracle.
#[derive(Debug)]
pub enum CsrfRejection {
    TokenMissing { instance: String },
    CookieMissing { instance: String },
    TokensMismatch { instance: String },
    ValidationFailed { instance: String },
    Internal { instance: String },
}

impl CsrfRejection {
    pub fn status(&self) -> StatusCode {
        match self {
            CsrfRejection::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::FORBIDDEN,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            CsrfRejection::TokenMissing { .. } => "CSRF Token Missing",
            CsrfRejection::CookieMissing { .. } => "CSRF Cookie Missing",
            CsrfRejection::TokensMismatch { .. } => "CSRF Tokens Mismatch",
            CsrfRejection::ValidationFailed { .. } => "CSRF Validation Failed",
            CsrfRejection::Internal { .. } => "CSRF Configuration Error",
        }
    }

    fn detail(&self) -> &'static str {
        match self {
            CsrfRejection::TokenMissing { .. } => {
                "A CSRF token must be sent in the request header or form field"
            }
            CsrfRejection::CookieMissing { .. } => "The CSRF cookie was not sent with this request",
            CsrfRejection::TokensMismatch { .. } => {
                "The submitted CSRF token does not match the CSRF cookie"
            }
            CsrfRejection::ValidationFailed { .. } => "The CSRF token is not valid for this session",
            CsrfRejection::Internal { .. } => "An internal error occurred",
        }
    }

    fn instance(&self) -> &str {
        match self {
            CsrfRejection::TokenMissing { instance }
            | CsrfRejection::CookieMissing { instance }
            | CsrfRejection::TokensMismatch { instance }
            | CsrfRejection::ValidationFailed { instance }
            | CsrfRejection::Internal { instance } => instance,
        }
    }

    pub fn problem(&self) -> ProblemDetails {
        ProblemDetails {
            problem_type: "about:blank".to_string(),
            title: self.title().to_string(),
            status: self.status().as_u16(),
            detail: self.detail().to_string(),
            instance: self.instance().to_string(),
        }
    }
}

impl std::fmt::Display for CsrfRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.title())
    }
}

impl IntoResponse for CsrfRejection {
    fn into_response(self) -> Response {
        let mut response = (self.status(), Json(self.problem())).into_response();
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/problem+json"),
        );
        response
    }
}
