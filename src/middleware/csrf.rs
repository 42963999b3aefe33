use axum::{
    body::{self, Body, Bytes},
    extract::{FromRequest, FromRequestParts, Multipart, Request, State},
    http::{header, request::Parts, HeaderMap, HeaderValue, Method},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use tracing::{debug, error, warn};

use crate::{
    config::csrf::CsrfConfig,
    error::CsrfRejection,
    session::resolve_session_id,
    token::{generate_token, log_prefix, validate_token, CsrfToken},
    CsrfState,
};

/// GET, HEAD and OPTIONS never change state and skip enforcement.
pub fn is_safe_method(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

/// Issue a fresh token for every request.
///
/// The token is available to handlers through the `CsrfToken` extractor and
/// is sent back in a script-readable cookie so clients can echo it.
pub async fn csrf_issuance_middleware(
    State(state): State<CsrfState>,
    mut request: Request,
    next: Next,
) -> Result<Response, CsrfRejection> {
    let config = state.config();
    let session = resolve_session_id(request.headers(), request.extensions(), config);

    let token = generate_token(session.as_str(), config).map_err(|e| {
        error!("Failed to issue CSRF token: {}", e);
        CsrfRejection::Internal {
            instance: request.uri().path().to_string(),
        }
    })?;

    debug!(
        "Issued CSRF token {} for {} session",
        token.log_prefix(),
        session.source()
    );

    request.extensions_mut().insert(token.clone());

    let mut response = next.run(request).await;
    set_csrf_cookie(response.headers_mut(), config, &token);

    Ok(response)
}

/// Reject state-changing requests that do not echo the CSRF cookie.
///
/// The submitted token (header, or form field when the header is absent)
/// must equal the cookie, and the cookie must carry a valid signature for
/// the session resolved for this request.
pub async fn csrf_enforcement_middleware(
    State(state): State<CsrfState>,
    request: Request,
    next: Next,
) -> Result<Response, CsrfRejection> {
    if is_safe_method(request.method()) {
        return Ok(next.run(request).await);
    }

    let config = state.config();
    let method = request.method().clone();
    let instance = request.uri().path().to_string();

    let (request, submitted) = extract_submitted_token(request, config).await;

    let Some(submitted) = submitted else {
        warn!("CSRF token missing for {} {}", method, instance);
        return Err(CsrfRejection::TokenMissing { instance });
    };

    let Some(cookie_token) = cookie_token(request.headers(), &config.cookie_name) else {
        warn!("CSRF cookie missing for {} {}", method, instance);
        return Err(CsrfRejection::CookieMissing { instance });
    };

    if submitted != cookie_token {
        warn!(
            "CSRF token mismatch for {} {}: cookie {}, submitted {}",
            method,
            instance,
            log_prefix(&cookie_token),
            log_prefix(&submitted)
        );
        return Err(CsrfRejection::TokensMismatch { instance });
    }

    let session = resolve_session_id(request.headers(), request.extensions(), config);
    let result = match validate_token(&cookie_token, session.as_str(), config) {
        Ok(result) => result,
        Err(e) => {
            error!("CSRF validation could not run: {}", e);
            return Err(CsrfRejection::Internal { instance });
        }
    };

    if !result.valid {
        warn!(
            "CSRF validation failed for {} {} ({} session): {}",
            method,
            instance,
            session.source(),
            result
                .error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "unknown".to_string())
        );
        return Err(CsrfRejection::ValidationFailed { instance });
    }

    debug!("CSRF token validated for {} {}", method, instance);
    Ok(next.run(request).await)
}

/// Build the issuance cookie for `token`.
pub fn issuance_cookie(config: &CsrfConfig, token: &CsrfToken) -> Cookie<'static> {
    Cookie::build((config.cookie_name.clone(), token.as_str().to_owned()))
        .path("/")
        .http_only(false)
        .same_site(SameSite::Lax)
        .max_age(config.cookie_max_age)
        .secure(config.secure)
        .build()
}

// Keeps exactly one Set-Cookie for the CSRF cookie on the response.
fn set_csrf_cookie(headers: &mut HeaderMap, config: &CsrfConfig, token: &CsrfToken) {
    let value = match HeaderValue::from_str(&issuance_cookie(config, token).to_string()) {
        Ok(value) => value,
        Err(e) => {
            error!("CSRF cookie is not a valid header value: {}", e);
            return;
        }
    };

    let prefix = format!("{}=", config.cookie_name);
    let retained: Vec<HeaderValue> = headers
        .get_all(header::SET_COOKIE)
        .iter()
        .filter(|v| !v.as_bytes().starts_with(prefix.as_bytes()))
        .cloned()
        .collect();

    headers.remove(header::SET_COOKIE);
    for other in retained {
        headers.append(header::SET_COOKIE, other);
    }
    headers.append(header::SET_COOKIE, value);
}

fn cookie_token(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    CookieJar::from_headers(headers)
        .get(cookie_name)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
}

fn header_token(headers: &HeaderMap, header_name: &str) -> Option<String> {
    headers
        .get(header_name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(String::from)
}

enum FormKind {
    UrlEncoded,
    Multipart(HeaderValue),
}

fn form_kind(headers: &HeaderMap) -> Option<FormKind> {
    let content_type = headers.get(header::CONTENT_TYPE)?;
    let essence = content_type
        .to_str()
        .ok()?
        .split(';')
        .next()?
        .trim()
        .to_ascii_lowercase();

    match essence.as_str() {
        "application/x-www-form-urlencoded" => Some(FormKind::UrlEncoded),
        "multipart/form-data" => Some(FormKind::Multipart(content_type.clone())),
        _ => None,
    }
}

/// Find the submitted token, reading the form body only when the header is
/// absent. The returned request carries the original body bytes.
async fn extract_submitted_token(
    request: Request,
    config: &CsrfConfig,
) -> (Request, Option<String>) {
    if let Some(token) = header_token(request.headers(), &config.header_name) {
        return (request, Some(token));
    }

    let Some(kind) = form_kind(request.headers()) else {
        return (request, None);
    };

    let (parts, body) = request.into_parts();
    let bytes = match body::to_bytes(body, config.max_form_bytes).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("Could not buffer form body for CSRF check: {}", e);
            return (Request::from_parts(parts, Body::empty()), None);
        }
    };

    let token = match kind {
        FormKind::UrlEncoded => urlencoded_field(&bytes, &config.field_name),
        FormKind::Multipart(content_type) => {
            multipart_field(content_type, bytes.clone(), &config.field_name).await
        }
    };

    (Request::from_parts(parts, Body::from(bytes)), token)
}

fn urlencoded_field(body: &[u8], field_name: &str) -> Option<String> {
    form_urlencoded::parse(body)
        .find(|(name, _)| name == field_name)
        .map(|(_, value)| value.into_owned())
        .filter(|v| !v.is_empty())
}

async fn multipart_field(content_type: HeaderValue, body: Bytes, field_name: &str) -> Option<String> {
    let form_request = Request::builder()
        .header(header::CONTENT_TYPE, content_type)
        .body(Body::from(body))
        .ok()?;
    let mut multipart = Multipart::from_request(form_request, &()).await.ok()?;

    while let Ok(Some(field)) = multipart.next_field().await {
        if field.name() == Some(field_name) {
            return field
                .text()
                .await
                .ok()
                .filter(|v| !v.is_empty());
        }
    }

    None
}

impl<S> FromRequestParts<S> for CsrfToken
where
    S: Send + Sync,
{
    type Rejection = CsrfRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<CsrfToken>().cloned().ok_or_else(|| {
            error!("CsrfToken requested but the issuance middleware is not installed");
            CsrfRejection::Internal {
                instance: parts.uri.path().to_string(),
            }
        })
    }
}
