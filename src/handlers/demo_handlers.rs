use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Query, Request, State},
    http::{header, HeaderName, HeaderValue},
    middleware::{self, Next},
    response::{IntoResponse, Json, Redirect, Response},
    routing::{get, post},
    Form, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use crate::{client, token::CsrfToken, CsrfState};

// The page only runs its own inline script, fetches same-origin JSON and
// posts its form back to itself.
const DEMO_PAGE_POLICY: &str = "default-src 'none'; script-src 'unsafe-inline'; \
     connect-src 'self'; form-action 'self'; base-uri 'none'; frame-ancestors 'none'";

const SECURITY_HEADERS: [(HeaderName, &str); 3] = [
    (header::CONTENT_SECURITY_POLICY, DEMO_PAGE_POLICY),
    (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
    (header::REFERRER_POLICY, "same-origin"),
];

#[derive(Template, WebTemplate)]
#[template(path = "form.html")]
struct FormTemplate {
    hidden_field: String,
    header_name: String,
    cookie_name: String,
    message: String,
}

#[derive(Deserialize)]
pub struct IndexQuery {
    message: Option<String>,
}

#[derive(Deserialize)]
pub struct NoteForm {
    pub note: String,
}

#[derive(Serialize)]
pub struct CsrfTokenResponse {
    pub token: String,
    pub header_name: String,
    pub field_name: String,
    pub cookie_name: String,
}

/// Routes of the demo server, already wrapped in CSRF protection.
pub fn demo_router(state: CsrfState) -> Router {
    let routes = Router::new()
        .route("/", get(index_handler))
        .route("/submit", post(submit_handler))
        .route("/api/csrf", get(csrf_token_handler))
        .route("/api/echo", post(echo_handler))
        .with_state(state.clone());

    crate::protect(routes, state)
        .route("/health", get(health_handler))
        .layer(middleware::from_fn(demo_security_headers))
}

async fn demo_security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    for (name, value) in SECURITY_HEADERS {
        headers.insert(name, HeaderValue::from_static(value));
    }
    response
}

pub async fn index_handler(
    State(state): State<CsrfState>,
    token: CsrfToken,
    Query(query): Query<IndexQuery>,
) -> impl IntoResponse {
    let config = state.config();

    FormTemplate {
        hidden_field: client::hidden_field(&config.field_name, token.as_str()),
        header_name: config.header_name.clone(),
        cookie_name: config.cookie_name.clone(),
        message: query.message.unwrap_or_default(),
    }
}

pub async fn submit_handler(Form(form): Form<NoteForm>) -> Redirect {
    info!("Accepted note of {} bytes", form.note.len());
    Redirect::to("/?message=Note%20saved")
}

pub async fn csrf_token_handler(
    State(state): State<CsrfState>,
    token: CsrfToken,
) -> Json<CsrfTokenResponse> {
    let config = state.config();

    Json(CsrfTokenResponse {
        token: token.into_string(),
        header_name: config.header_name.clone(),
        field_name: config.field_name.clone(),
        cookie_name: config.cookie_name.clone(),
    })
}

pub async fn echo_handler(Json(payload): Json<Value>) -> Json<Value> {
    Json(json!({ "received": payload }))
}

pub async fn health_handler() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
