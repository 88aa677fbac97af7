use serde::Deserialize;

use crate::stream::feed::DEFAULT_RETENTION;

/// Console configuration, read from the environment.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub api_base_url: String,
    pub ws_url: String,
    /// Backend-issued token, passed through opaquely.
    pub api_token: Option<String>,
    pub feed_retention: usize,
}

impl Config {
    /// Loads config from environment variables, all defaulted for a local
    /// backend.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            api_base_url: std::env::var("TBOT_API_URL")
                .unwrap_or_else(|_| "http://localhost:8000/api/v1".to_string()),
            ws_url: std::env::var("TBOT_WS_URL")
                .unwrap_or_else(|_| "ws://localhost:8000/ws/v1/updates".to_string()),
            api_token: std::env::var("TBOT_TOKEN").ok(),
            feed_retention: std::env::var("TBOT_FEED_RETENTION")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_RETENTION),
        }
    }

    /// The push-channel URL, with the token as a query parameter when set.
    pub fn stream_url(&self) -> String {
        match &self.api_token {
            Some(token) => format!("{}?token={}", self.ws_url, token),
            None => self.ws_url.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_url_appends_the_token() {
        let config = Config {
            api_base_url: "http://localhost:8000/api/v1".to_string(),
            ws_url: "ws://localhost:8000/ws/v1/updates".to_string(),
            api_token: Some("abc".to_string()),
            feed_retention: 10,
        };
        assert_eq!(
            config.stream_url(),
            "ws://localhost:8000/ws/v1/updates?token=abc"
        );
    }

    #[test]
    fn stream_url_without_token_is_bare() {
        let config = Config {
            api_base_url: "http://localhost:8000/api/v1".to_string(),
            ws_url: "ws://localhost:8000/ws/v1/updates".to_string(),
            api_token: None,
            feed_retention: 10,
        };
        assert_eq!(config.stream_url(), "ws://localhost:8000/ws/v1/updates");
    }
}
