use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::{http_client, request_error, status_error, SummaryOptions, SummaryProvider};
use crate::batch::TaskError;

pub const DEFAULT_MODEL: &str = "claude-3-5-sonnet-20241022";

const API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Summary provider backed by the Anthropic Messages API.
pub struct ClaudeProvider {
    client: Client,
    api_key: String,
}

impl ClaudeProvider {
    pub fn new(api_key: String) -> Result<Self> {
        Ok(Self {
            client: http_client()?,
            api_key,
        })
    }
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

#[async_trait]
impl SummaryProvider for ClaudeProvider {
    fn name(&self) -> &'static str {
        "claude"
    }

    async fn generate(
        &self,
        prompt: &str,
        options: &SummaryOptions,
    ) -> std::result::Result<String, TaskError> {
        let body = serde_json::json!({
            "model": options.model,
            "max_tokens": options.max_tokens,
            "temperature": options.temperature,
            "messages": [
                {"role": "user", "content": prompt}
            ],
        });

        let response = self
            .client
            .post(API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|err| request_error("Claude", err))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error("Claude", status, &body));
        }

        let payload: MessagesResponse = response
            .json()
            .await
            .map_err(|err| request_error("Claude", err))?;

        payload
            .content
            .into_iter()
            .map(|block| block.text)
            .find(|text| !text.is_empty())
            .ok_or_else(|| TaskError::permanent(anyhow!("Claude returned an empty response")))
    }
}
