use axum::{
    http::{HeaderName, HeaderValue, Method},
    middleware,
    routing::{get, post},
    Router,
};
use governor::{clock::DefaultClock, state::keyed::DefaultKeyedStateStore, Quota, RateLimiter};
use nonzero_ext::nonzero;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

pub mod config;
pub mod handlers {
    pub mod auth_middleware;
    pub mod conversation_handlers;
    pub mod persona_handlers;
}
pub mod api {
    pub mod tavus;
}
pub mod utils {
    pub mod persona_prompts;
}

use api::tavus::TavusClient;
use config::Config;
use handlers::{auth_middleware, conversation_handlers, persona_handlers};

const RATE_LIMIT_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

pub struct AppState {
    pub config: Config,
    pub tavus: Option<TavusClient>,
    pub conversation_limiter: RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let tavus = config
            .tavus_api_key
            .as_deref()
            .map(|key| TavusClient::new(&config.tavus_api_base, key));
        if tavus.is_none() {
            tracing::warn!("TAVUS_API_KEY is not set, persona and conversation routes will answer 500");
        }
        Self {
            config,
            tavus,
            // Conversations cost money upstream, so each client gets a handful per minute
            conversation_limiter: RateLimiter::keyed(Quota::per_minute(nonzero!(5u32))),
        }
    }
}

impl AppState {
    /// Drops limiter entries whose quota has fully refilled, so the keyed
    /// store only holds clients seen within the last window.
    pub fn prune_rate_limits(&self) {
        let before = self.conversation_limiter.len();
        self.conversation_limiter.retain_recent();
        self.conversation_limiter.shrink_to_fit();
        tracing::debug!(
            "Pruned conversation limiter from {} to {} clients",
            before,
            self.conversation_limiter.len()
        );
    }
}

/// Prunes the rate limiter once a minute for as long as the server runs.
pub fn spawn_rate_limit_cleanup(state: Arc<AppState>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(RATE_LIMIT_CLEANUP_INTERVAL);
        loop {
            interval.tick().await;
            state.prune_rate_limits();
        }
    })
}

async fn health_check() -> &'static str {
    "OK"
}

fn cors_layer(config: &Config) -> CorsLayer {
    let origin = HeaderValue::from_str(&config.frontend_url).unwrap_or_else(|_| {
        tracing::warn!("Invalid FRONTEND_URL {:?}, falling back to localhost", config.frontend_url);
        HeaderValue::from_static("http://localhost:8080")
    });
    CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_origin(AllowOrigin::exact(origin))
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
            axum::http::header::ACCEPT,
            axum::http::header::ORIGIN,
            HeaderName::from_static("apikey"),
            HeaderName::from_static("x-client-info"),
        ])
        .expose_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::CONTENT_LENGTH,
        ])
        .allow_credentials(true)
}

pub fn build_router(state: Arc<AppState>) -> Router {
    // Routes that reach Tavus need the client key
    let api_routes = Router::new()
        .route("/api/persona/setup", post(persona_handlers::setup_persona))
        .route("/api/consultation/conversation", post(conversation_handlers::create_conversation))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware::require_client_key));

    Router::new()
        .route("/api/health", get(health_check))
        .merge(api_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_layer(&state.config))
        .with_state(state)
}
