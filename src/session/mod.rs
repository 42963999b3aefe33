//! Per-request session identity used to bind CSRF tokens.
//!
//! Precedence, first match wins:
//! 1. an `AuthenticatedUser` placed in the request extensions by the auth layer
//! 2. the session cookie
//! 3. `anon-<ip>` from the forwarded or peer address
//!
//! Tier 3 is best-effort: every client behind one NAT or proxy shares a bucket.

use std::fmt;
use std::net::SocketAddr;

use axum::{
    extract::ConnectInfo,
    http::{Extensions, HeaderMap},
};
use axum_extra::extract::cookie::CookieJar;

use crate::config::csrf::CsrfConfig;

pub const ANONYMOUS_PREFIX: &str = "anon-";
const UNKNOWN_ADDRESS: &str = "unknown";

/// Identity the authentication layer attaches to a request once it has
/// verified the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: String,
}

impl AuthenticatedUser {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionSource {
    Authenticated,
    SessionCookie,
    Anonymous,
}

impl fmt::Display for SessionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SessionSource::Authenticated => "authenticated",
            SessionSource::SessionCookie => "session-cookie",
            SessionSource::Anonymous => "anonymous",
        };
        f.write_str(label)
    }
}

/// Resolved session identifier. Never empty.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionId {
    value: String,
    source: SessionSource,
}

impl SessionId {
    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn source(&self) -> SessionSource {
        self.source
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionId")
            .field("source", &self.source)
            .field("value", &format!("{}…", crate::token::log_prefix(&self.value)))
            .finish()
    }
}

pub fn resolve_session_id(
    headers: &HeaderMap,
    extensions: &Extensions,
    config: &CsrfConfig,
) -> SessionId {
    if let Some(user) = extensions.get::<AuthenticatedUser>() {
        if !user.user_id.is_empty() {
            return SessionId {
                value: user.user_id.clone(),
                source: SessionSource::Authenticated,
            };
        }
    }

    let jar = CookieJar::from_headers(headers);
    if let Some(cookie) = jar.get(&config.session_cookie_name) {
        if !cookie.value().is_empty() {
            return SessionId {
                value: cookie.value().to_string(),
                source: SessionSource::SessionCookie,
            };
        }
    }

    let address = client_address(headers, extensions, config.trust_forwarded_for)
        .unwrap_or_else(|| UNKNOWN_ADDRESS.to_string());

    SessionId {
        value: format!("{}{}", ANONYMOUS_PREFIX, address),
        source: SessionSource::Anonymous,
    }
}

fn client_address(
    headers: &HeaderMap,
    extensions: &Extensions,
    trust_forwarded_for: bool,
) -> Option<String> {
    if trust_forwarded_for {
        // Left-most entry is the originating client
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(address) = forwarded {
            return Some(address.to_string());
        }

        let real_ip = headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(address) = real_ip {
            return Some(address.to_string());
        }
    }

    extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
}
