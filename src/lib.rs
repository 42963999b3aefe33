pub mod client;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod session;
pub mod token;

use std::sync::Arc;

use axum::{middleware as axum_middleware, Router};

use crate::config::csrf::CsrfConfig;
use crate::error::ConfigError;

pub use crate::token::CsrfToken;

/// Shared state for the CSRF middleware pair.
///
/// Built once at startup from a validated `CsrfConfig`; nothing is read
/// from the environment per request.
#[derive(Clone, Debug)]
pub struct CsrfState {
    config: Arc<CsrfConfig>,
}

impl CsrfState {
    pub fn new(config: CsrfConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &CsrfConfig {
        &self.config
    }
}

/// Wrap `router` with token issuance and enforcement.
///
/// Issuance is the outer layer, so rejected requests still receive a fresh
/// cookie to retry with.
pub fn protect<S>(router: Router<S>, state: CsrfState) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::csrf_enforcement_middleware,
        ))
        .layer(axum_middleware::from_fn_with_state(
            state,
            middleware::csrf_issuance_middleware,
        ))
}
