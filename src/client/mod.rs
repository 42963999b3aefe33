//! Helpers for clients that need to echo the CSRF cookie back.
//!
//! Nothing here validates tokens. These functions read the issued token and
//! attach it to outgoing requests as a header, a multipart field or a hidden
//! form field.

use axum::http::{header, HeaderMap};
use axum_extra::extract::cookie::Cookie;
use reqwest::{multipart::Form, RequestBuilder};

use crate::config::csrf::{CsrfConfig, DEFAULT_FIELD_NAME, DEFAULT_HEADER_NAME};

/// Read a cookie value from a `Cookie` request header.
pub fn token_from_cookie_header(cookie_header: &str, cookie_name: &str) -> Option<String> {
    Cookie::split_parse(cookie_header)
        .filter_map(Result::ok)
        .find(|c| c.name() == cookie_name)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
}

/// Read the most recently issued token from `Set-Cookie` response headers.
pub fn token_from_set_cookie(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    headers
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| Cookie::parse(v).ok())
        .filter(|c| c.name() == cookie_name)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
        .last()
}

/// Render `<input type="hidden">` carrying the token.
pub fn hidden_field(field_name: &str, token: &str) -> String {
    format!(
        r#"<input type="hidden" name="{}" value="{}">"#,
        escape_attribute(field_name),
        escape_attribute(token)
    )
}

fn escape_attribute(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// A token plus the transport names it should be sent under.
#[derive(Clone)]
pub struct CsrfClient {
    token: String,
    header_name: String,
    field_name: String,
}

impl std::fmt::Debug for CsrfClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CsrfClient")
            .field("token", &"***")
            .field("header_name", &self.header_name)
            .field("field_name", &self.field_name)
            .finish()
    }
}

impl CsrfClient {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            header_name: DEFAULT_HEADER_NAME.to_string(),
            field_name: DEFAULT_FIELD_NAME.to_string(),
        }
    }

    /// Use the transport names from a server configuration.
    pub fn for_config(token: impl Into<String>, config: &CsrfConfig) -> Self {
        Self::new(token)
            .with_header_name(config.header_name.clone())
            .with_field_name(config.field_name.clone())
    }

    /// Pick the token out of a response that went through issuance.
    pub fn from_response_headers(headers: &HeaderMap, cookie_name: &str) -> Option<Self> {
        token_from_set_cookie(headers, cookie_name).map(Self::new)
    }

    pub fn with_header_name(mut self, name: impl Into<String>) -> Self {
        self.header_name = name.into();
        self
    }

    pub fn with_field_name(mut self, name: impl Into<String>) -> Self {
        self.field_name = name.into();
        self
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn header_name(&self) -> &str {
        &self.header_name
    }

    pub fn field_name(&self) -> &str {
        &self.field_name
    }

    pub fn attach_header(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.header(self.header_name.as_str(), self.token.as_str())
    }

    pub fn attach_multipart(&self, form: Form) -> Form {
        form.text(self.field_name.clone(), self.token.clone())
    }

    /// Add the token to url-encoded form fields, replacing any stale copy.
    pub fn attach_form_fields(&self, mut fields: Vec<(String, String)>) -> Vec<(String, String)> {
        fields.retain(|(name, _)| name != &self.field_name);
        fields.push((self.field_name.clone(), self.token.clone()));
        fields
    }

    pub fn hidden_field(&self) -> String {
        hidden_field(&self.field_name, &self.token)
    }
}
