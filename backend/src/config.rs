use std::env;

pub const DEFAULT_TAVUS_API_BASE: &str = "https://tavusapi.com";
pub const DEFAULT_PERSONA_ID: &str = "p4746574ac52";
const DEFAULT_FRONTEND_URL: &str = "http://localhost:8080";
const DEFAULT_PORT: u16 = 3000;

/// Runtime settings read from the environment (and `.env` via dotenvy).
///
/// A missing `TAVUS_API_KEY` does not stop the server from booting; the
/// handlers that need it answer 500 instead.
#[derive(Debug, Clone)]
pub struct Config {
    pub tavus_api_key: Option<String>,
    pub tavus_api_base: String,
    pub persona_id: String,
    pub replica_id: Option<String>,
    pub client_api_key: Option<String>,
    /// Only honour `x-forwarded-for` when a proxy we control sets it.
    pub trust_forwarded_for: bool,
    pub frontend_url: String,
    pub environment: String,
    pub port: u16,
    pub sentry_dsn: Option<String>,
}

fn non_empty(var: &str) -> Option<String> {
    env::var(var).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl Config {
    pub fn from_env() -> Self {
        let port = match non_empty("PORT") {
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                tracing::warn!("Ignoring invalid PORT value {:?}, using {}", raw, DEFAULT_PORT);
                DEFAULT_PORT
            }),
            None => DEFAULT_PORT,
        };
        Self {
            tavus_api_key: non_empty("TAVUS_API_KEY"),
            tavus_api_base: non_empty("TAVUS_API_BASE")
                .unwrap_or_else(|| DEFAULT_TAVUS_API_BASE.to_string()),
            persona_id: non_empty("TAVUS_PERSONA_ID").unwrap_or_else(|| DEFAULT_PERSONA_ID.to_string()),
            replica_id: non_empty("TAVUS_REPLICA_ID"),
            client_api_key: non_empty("CLIENT_API_KEY"),
            trust_forwarded_for: non_empty("TRUST_PROXY")
                .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
            frontend_url: non_empty("FRONTEND_URL").unwrap_or_else(|| DEFAULT_FRONTEND_URL.to_string()),
            environment: non_empty("ENVIRONMENT").unwrap_or_else(|| "development".to_string()),
            port,
            sentry_dsn: non_empty("SENTRY_DSN"),
        }
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tavus_api_key: None,
            tavus_api_base: DEFAULT_TAVUS_API_BASE.to_string(),
            persona_id: DEFAULT_PERSONA_ID.to_string(),
            replica_id: None,
            client_api_key: None,
            trust_forwarded_for: false,
            frontend_url: DEFAULT_FRONTEND_URL.to_string(),
            environment: "development".to_string(),
            port: DEFAULT_PORT,
            sentry_dsn: None,
        }
    }
}
