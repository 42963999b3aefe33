use csrf_shield::{config::csrf::CsrfConfig, handlers, CsrfState};

use std::net::SocketAddr;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "csrf_shield=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // CSRF configuration is resolved once; a bad secret stops startup here
    let config = CsrfConfig::from_env().map_err(|e| {
        tracing::error!("FATAL: {}", e);
        e
    })?;
    let state = CsrfState::new(config)?;

    tracing::info!(
        "CSRF protection enabled (cookie {}, header {}, field {}, secure cookie: {})",
        state.config().cookie_name,
        state.config().header_name,
        state.config().field_name,
        state.config().secure
    );

    let app = handlers::demo_router(state).layer(TraceLayer::new_for_http());

    // Start server
    let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port = std::env::var("PORT")
        .unwrap_or_else(|_| "8080".to_string())
        .parse::<u16>()?;

    let addr = SocketAddr::from((host.parse::<std::net::IpAddr>()?, port));

    tracing::info!("Server running on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
