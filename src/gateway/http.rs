//! HTTP client for the reaction/recommendation API.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use super::{ReactionEvent, RecommendationGateway};
use crate::config::Config;
use crate::errors::{AppError, AppResult};

/// Prefix the service uses for plain-text failure replies.
const FAIL_PREFIX: &str = "FAIL";

#[derive(Debug, Deserialize)]
struct NextNResponse {
    array: Vec<Value>,
}

/// `reqwest`-backed [`RecommendationGateway`].
#[derive(Clone)]
pub struct HttpGateway {
    client: reqwest::Client,
    base_url: String,
}

impl HttpGateway {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> AppResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Build a gateway from configuration, or `None` when no API is configured.
    pub fn from_config(config: &Config) -> AppResult<Option<Self>> {
        config
            .api_base_url
            .as_ref()
            .map(|url| Self::new(url.clone(), config.http_timeout))
            .transpose()
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn get_text(&self, path: &str, query: &[(&str, String)]) -> AppResult<String> {
        let text = self
            .client
            .get(self.url(path))
            .query(query)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(text)
    }

    /// GET an acknowledgement endpoint and reject `FAIL` replies.
    async fn get_ack(&self, path: &str, query: &[(&str, String)]) -> AppResult<()> {
        let text = self.get_text(path, query).await?;
        if text.trim_start().starts_with(FAIL_PREFIX) {
            return Err(AppError::Gateway(text));
        }
        tracing::debug!("{} replied: {}", path, text);
        Ok(())
    }
}

#[async_trait]
impl RecommendationGateway for HttpGateway {
    async fn next_n(&self, user_id: &str, n: usize) -> AppResult<Vec<String>> {
        let text = self
            .get_text(
                "nextN",
                &[("userID", user_id.to_string()), ("n", n.to_string())],
            )
            .await?;

        if text.trim_start().starts_with(FAIL_PREFIX) {
            return Err(AppError::Gateway(text));
        }

        let response: NextNResponse = serde_json::from_str(&text)?;
        let ids = response
            .array
            .into_iter()
            .filter_map(|value| match value {
                Value::String(id) => Some(id),
                Value::Number(n) => Some(n.to_string()),
                other => {
                    tracing::warn!("Ignoring non-ID candidate {}", other);
                    None
                }
            })
            .collect();
        Ok(ids)
    }

    async fn submit_reaction(&self, event: &ReactionEvent) -> AppResult<()> {
        self.get_ack(
            "reaction",
            &[
                ("userID", event.user_id.clone()),
                ("reactionNum", event.reaction.code().to_string()),
                ("nonprofitID", event.charity_id.clone()),
                ("amount", event.reaction.amount().to_string()),
            ],
        )
        .await
    }

    async fn log_on(&self, user_id: &str) -> AppResult<()> {
        self.get_ack("logOn", &[("userID", user_id.to_string())])
            .await
    }

    async fn log_off(&self, user_id: &str) -> AppResult<()> {
        self.get_ack("logOff", &[("userID", user_id.to_string())])
            .await
    }
}
