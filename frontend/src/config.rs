// Build-time settings, baked in by trunk from the environment.

pub fn get_backend_url() -> &'static str {
    option_env!("BACKEND_URL").unwrap_or("http://localhost:3000")
}

pub fn get_client_api_key() -> Option<&'static str> {
    option_env!("CLIENT_API_KEY").filter(|key| !key.is_empty())
}

pub fn get_auth_url() -> &'static str {
    option_env!("AUTH_URL").unwrap_or("http://localhost:9999")
}

pub fn get_auth_anon_key() -> &'static str {
    option_env!("AUTH_ANON_KEY").unwrap_or("")
}

pub fn get_persona_id() -> Option<&'static str> {
    option_env!("TAVUS_PERSONA_ID").filter(|id| !id.is_empty())
}

pub fn get_replica_id() -> Option<&'static str> {
    option_env!("TAVUS_REPLICA_ID").filter(|id| !id.is_empty())
}
