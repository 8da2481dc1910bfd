//! Environment-driven service configuration.
//!
//! Credential groups are optional at startup so the service can come up in
//! a partially configured environment; each route fails fast per-request
//! when the group it needs is absent.

pub const DEFAULT_HEIDI_URL: &str = "https://api.heidi.health";
pub const DEFAULT_GEMINI_MODEL: &str = "google/gemini-2.5-flash";
const DEFAULT_ADDR: &str = "0.0.0.0:8080";

/// Heidi clinical API credentials.
#[derive(Debug, Clone)]
pub struct HeidiConfig {
    pub api_key: String,
    pub jwt_secret: String,
    pub api_url: String,
}

/// Gemini explainer credentials.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub heidi: Option<HeidiConfig>,
    pub gemini: Option<GeminiConfig>,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key-value source; split out so tests never touch the
    /// process environment.
    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let heidi = match (get("HEIDI_API_KEY"), get("HEIDI_JWT_SECRET")) {
            (Some(api_key), Some(jwt_secret)) => Some(HeidiConfig {
                api_key,
                jwt_secret,
                api_url: get("HEIDI_API_URL").unwrap_or_else(|| DEFAULT_HEIDI_URL.to_string()),
            }),
            _ => None,
        };

        let gemini = get("GEMINI_API_KEY").map(|api_key| GeminiConfig {
            api_key,
            model: get("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
        });

        Config {
            bind_addr: get("PORTAL_ADDR").unwrap_or_else(|| DEFAULT_ADDR.to_string()),
            heidi,
            gemini,
        }
    }
}
