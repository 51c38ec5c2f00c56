use gloo_net::http::Request;
use gloo_net::Error as GlooError;
use web_sys::RequestCredentials;
use crate::config;
use serde::Serialize;

/// Thin client for the stylist backend: prefixes the backend URL and
/// presents the publishable client key on every request.
pub struct Api;

pub struct RequestWrapper {
    request: Request,
    path: String,
}

impl RequestWrapper {
    fn post(path: &str) -> Self {
        let full_url = format!("{}{}", config::get_backend_url(), path);
        let mut request = Request::post(&full_url)
            .credentials(RequestCredentials::Include)
            .header("x-client-info", "stylist-frontend");

        if let Some(key) = config::get_client_api_key() {
            request = request.header("Authorization", &format!("Bearer {}", key));
        }

        Self {
            request,
            path: path.to_string(),
        }
    }

    /// Set the request body as JSON
    pub fn json<T: Serialize>(mut self, data: &T) -> Result<Self, GlooError> {
        self.request = self.request.json(data)?;
        Ok(self)
    }

    pub async fn send(self) -> Result<gloo_net::http::Response, GlooError> {
        let response = self.request.send().await?;
        if !response.ok() {
            gloo_console::log!("Backend request failed:", self.path, response.status());
        }
        Ok(response)
    }
}

impl Api {
    /// Create a POST request with credentials, client key and backend URL
    pub fn post(path: &str) -> RequestWrapper {
        RequestWrapper::post(path)
    }
}
