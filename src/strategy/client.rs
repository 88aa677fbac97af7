use serde::Deserialize;
use thiserror::Error;

use crate::strategy::models::{Strategy, StrategyDraft};
use crate::utils::Config;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("backend returned {status}: {body}")]
    Status { status: u16, body: String },
}

/// Acknowledgement body for scan start/stop; only carried for logging.
#[derive(Debug, Deserialize)]
pub struct Ack {
    #[serde(default)]
    pub message: String,
}

/// Client for the backend's strategy CRUD and scan-control endpoints.
pub struct ApiClient {
    base_url: String,
    token: Option<String>,
    client: reqwest::Client,
}

impl ApiClient {
    pub fn new(config: &Config) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(10)
            .build()?;

        Ok(Self {
            base_url: config.api_base_url.clone(),
            token: config.api_token.clone(),
            client,
        })
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let mut builder = self.client.request(method, url);
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }
        builder
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    pub async fn list_strategies(&self) -> Result<Vec<Strategy>, ApiError> {
        let response = self
            .request(reqwest::Method::GET, "/strategies/")
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    pub async fn get_strategy(&self, id: i64) -> Result<Strategy, ApiError> {
        let response = self
            .request(reqwest::Method::GET, &format!("/strategies/{id}"))
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    pub async fn create_strategy(&self, draft: &StrategyDraft) -> Result<Strategy, ApiError> {
        let response = self
            .request(reqwest::Method::POST, "/strategies/")
            .json(draft)
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    pub async fn update_strategy(
        &self,
        id: i64,
        draft: &StrategyDraft,
    ) -> Result<Strategy, ApiError> {
        let response = self
            .request(reqwest::Method::PUT, &format!("/strategies/{id}"))
            .json(draft)
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    pub async fn delete_strategy(&self, id: i64) -> Result<Strategy, ApiError> {
        let response = self
            .request(reqwest::Method::DELETE, &format!("/strategies/{id}"))
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    /// Fire-and-acknowledge: starts scan execution for the strategy.
    pub async fn start_scan(&self, id: i64) -> Result<Ack, ApiError> {
        let response = self
            .request(reqwest::Method::POST, &format!("/scans/{id}/run"))
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    pub async fn stop_scan(&self, id: i64) -> Result<Ack, ApiError> {
        let response = self
            .request(reqwest::Method::POST, &format!("/scans/{id}/stop"))
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{BoolOp, RuleNode};
    use serde_json::json;
    use wiremock::matchers::{body_json_string, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(base_url: String) -> Config {
        Config {
            api_base_url: base_url,
            ws_url: "ws://localhost:8000/ws/v1/updates".to_string(),
            api_token: Some("test-token".to_string()),
            feed_retention: 100,
        }
    }

    fn strategy_json(id: i64) -> serde_json::Value {
        json!({
            "id": id,
            "name": "surge",
            "description": null,
            "broker": "upbit",
            "market": "KRW-BTC",
            "scan_rules": {
                "first_scan": {"type": "group", "operator": "AND", "children": [
                    {"type": "condition", "value": "close > open"}
                ]}
            },
            "is_active": true,
            "cron_schedule": "*/5 * * * *",
            "created_at": "2024-05-01T09:00:00Z",
            "updated_at": null
        })
    }

    #[tokio::test]
    async fn lists_strategies_with_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/strategies/"))
            .and(header("authorization", "Bearer test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([strategy_json(1)])))
            .mount(&server)
            .await;

        let client = ApiClient::new(&test_config(server.uri())).unwrap();
        let strategies = client.list_strategies().await.unwrap();

        assert_eq!(strategies.len(), 1);
        assert_eq!(strategies[0].name, "surge");
        // missing second_scan defaults through the codec seam
        assert_eq!(
            strategies[0].scan_rules.second_scan,
            RuleNode::empty_group()
        );
        assert_eq!(
            strategies[0].scan_rules.first_scan,
            RuleNode::group(BoolOp::And, vec![RuleNode::condition("close > open")])
        );
    }

    #[tokio::test]
    async fn create_posts_the_draft_body() {
        let server = MockServer::start().await;
        let draft = StrategyDraft::new("surge", "upbit", "KRW-BTC");
        let expected_body = serde_json::to_string(&draft).unwrap();

        Mock::given(method("POST"))
            .and(path("/strategies/"))
            .and(body_json_string(&expected_body))
            .respond_with(ResponseTemplate::new(201).set_body_json(strategy_json(7)))
            .mount(&server)
            .await;

        let client = ApiClient::new(&test_config(server.uri())).unwrap();
        let created = client.create_strategy(&draft).await.unwrap();
        assert_eq!(created.id, 7);
    }

    #[tokio::test]
    async fn non_success_surfaces_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/strategies/99"))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(json!({"detail": "Strategy not found"})),
            )
            .mount(&server)
            .await;

        let client = ApiClient::new(&test_config(server.uri())).unwrap();
        match client.get_strategy(99).await {
            Err(ApiError::Status { status, body }) => {
                assert_eq!(status, 404);
                assert!(body.contains("Strategy not found"));
            }
            other => panic!("expected a status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn scan_control_hits_run_and_stop() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/scans/3/run"))
            .respond_with(
                ResponseTemplate::new(202).set_body_json(json!({"message": "started"})),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/scans/3/stop"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "stopped"})))
            .mount(&server)
            .await;

        let client = ApiClient::new(&test_config(server.uri())).unwrap();
        assert_eq!(client.start_scan(3).await.unwrap().message, "started");
        assert_eq!(client.stop_scan(3).await.unwrap().message, "stopped");
    }
}
