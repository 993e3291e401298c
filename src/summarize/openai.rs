use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::{http_client, request_error, status_error, SummaryOptions, SummaryProvider};
use crate::batch::TaskError;

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

const API_URL: &str = "https://api.openai.com/v1/chat/completions";

const SYSTEM_PROMPT: &str = "You are a professional video content analyst, skilled at \
    extracting the core content and key information from video transcripts.";

/// Summary provider backed by the OpenAI chat completions API.
pub struct OpenAiProvider {
    client: Client,
    api_key: String,
}

impl OpenAiProvider {
    pub fn new(api_key: String) -> Result<Self> {
        Ok(Self {
            client: http_client()?,
            api_key,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: String,
}

#[async_trait]
impl SummaryProvider for OpenAiProvider {
    fn name(&self) -> &'static str {
        "openai"
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
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": prompt}
            ],
        });

        let response = self
            .client
            .post(API_URL)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|err| request_error("OpenAI", err))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error("OpenAI", status, &body));
        }

        let payload: ChatResponse = response
            .json()
            .await
            .map_err(|err| request_error("OpenAI", err))?;

        payload
            .choices
            .into_iter()
            .map(|choice| choice.message.content)
            .find(|content| !content.is_empty())
            .ok_or_else(|| TaskError::permanent(anyhow!("OpenAI returned an empty response")))
    }
}
