use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TavusError {
    #[error("TAVUS_API_KEY not configured")]
    NotConfigured,
    #[error("Tavus API returned {status}: {body}")]
    Upstream { status: u16, body: String },
    #[error("Request to Tavus failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Unexpected Tavus response: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, Serialize)]
pub struct PersonaRequest {
    pub persona_name: String,
    pub system_prompt: String,
    pub context_prompt: String,
    pub persona_id: String,
}

#[derive(Debug, Serialize)]
pub struct ConversationRequest {
    pub persona_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replica_id: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ConversationResponse {
    pub conversation_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
}

pub struct TavusClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

// Loopback upstreams (local stand-ins for the hosted API) skip any system proxy.
fn is_loopback(base_url: &str) -> bool {
    url::Url::parse(base_url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h == "localhost" || h == "127.0.0.1" || h == "[::1]"))
        .unwrap_or(false)
}

impl TavusClient {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        let mut builder = reqwest::Client::builder().timeout(Duration::from_secs(30));
        if is_loopback(base_url) {
            builder = builder.no_proxy();
        }
        Self {
            client: builder.build().unwrap_or_else(|_| reqwest::Client::new()),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    /// Sends a POST to the Tavus API and returns the raw body of a 2xx answer.
    async fn post_json<T: Serialize>(&self, path: &str, body: &T) -> Result<String, TavusError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        tracing::debug!("Tavus API {} response status: {}", path, status);
        tracing::debug!("Tavus API {} response: {}", path, text);

        if !status.is_success() {
            tracing::error!("Tavus API error on {}: {} - {}", path, status, text);
            return Err(TavusError::Upstream {
                status: status.as_u16(),
                body: text,
            });
        }
        Ok(text)
    }

    pub async fn create_persona(&self, request: &PersonaRequest) -> Result<Value, TavusError> {
        let text = self.post_json("/v2/personas", request).await?;
        Ok(serde_json::from_str(&text)?)
    }

    pub async fn create_conversation(
        &self,
        request: &ConversationRequest,
    ) -> Result<ConversationResponse, TavusError> {
        let text = self.post_json("/v2/conversations", request).await?;
        Ok(serde_json::from_str(&text)?)
    }
}
