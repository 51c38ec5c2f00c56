use dotenvy::dotenv;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, EnvFilter};

use stylist_backend::{build_router, config::Config, spawn_rate_limit_cleanup, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,stylist_backend=debug"));
    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    let config = Config::from_env();
    let _guard = config.sentry_dsn.clone().map(|dsn| {
        sentry::init((dsn, sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: Some(config.environment.clone().into()),
            ..Default::default()
        }))
    });

    if config.trust_forwarded_for {
        tracing::info!("Trusting x-forwarded-for from the fronting proxy");
    }
    if config.is_development() && config.client_api_key.is_none() {
        tracing::warn!("CLIENT_API_KEY is not set, API routes are open");
    }

    let port = config.port;
    let state = Arc::new(AppState::new(config));
    spawn_rate_limit_cleanup(state.clone());
    let app = build_router(state);

    tracing::info!("Starting server on port {}", port);
    let listener = TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
    Ok(())
}
