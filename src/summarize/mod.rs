//! AI summary generation over transcript text.
//!
//! A transcript is rendered into a structured prompt, sent to the configured
//! hosted provider, and the response is persisted twice per item: the raw
//! Markdown prose and the structured JSON fields embedded in it.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub mod claude;
pub mod openai;

use crate::batch::TaskError;

/// Transcripts are truncated to this many characters before prompting to
/// stay inside provider context limits.
pub const MAX_TRANSCRIPT_CHARS: usize = 15_000;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// The hosted providers a summary can be generated with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Claude,
    Openai,
}

impl ProviderKind {
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.to_lowercase().as_str() {
            "claude" | "anthropic" => Ok(ProviderKind::Claude),
            "openai" => Ok(ProviderKind::Openai),
            other => anyhow::bail!(
                "Unknown summary provider: {} (expected claude or openai)",
                other
            ),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Claude => "claude",
            ProviderKind::Openai => "openai",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::Claude => claude::DEFAULT_MODEL,
            ProviderKind::Openai => openai::DEFAULT_MODEL,
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Generation parameters resolved from config and CLI flags.
#[derive(Debug, Clone)]
pub struct SummaryOptions {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// A hosted model that can turn a prompt into summary prose. One capability,
/// one implementation per provider, selected by configuration.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SummaryProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Send the prompt and return the raw response text. Failures carry the
    /// retry classification: rate limits, server errors, and network
    /// problems are transient; everything else is permanent.
    async fn generate(
        &self,
        prompt: &str,
        options: &SummaryOptions,
    ) -> std::result::Result<String, TaskError>;
}

/// Construct the provider selected by configuration.
pub fn create_provider(kind: ProviderKind, api_key: String) -> Result<Box<dyn SummaryProvider>> {
    Ok(match kind {
        ProviderKind::Claude => Box::new(claude::ClaudeProvider::new(api_key)?),
        ProviderKind::Openai => Box::new(openai::OpenAiProvider::new(api_key)?),
    })
}

/// Structured fields the model is asked to embed in its response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SummaryData {
    pub one_sentence_summary: String,
    pub key_points: Vec<String>,
    pub key_quotes: Vec<String>,
    pub tags: Vec<String>,
    pub evaluation: String,
    pub confidence: f64,
}

/// Artifacts and highlights recorded for one summarized transcript.
#[derive(Debug, Clone, Serialize)]
pub struct SummaryOutput {
    pub transcript: PathBuf,
    pub summary_file: PathBuf,
    pub keywords_file: PathBuf,
    pub provider: String,
    pub model: String,
    pub one_sentence_summary: String,
    pub tags: Vec<String>,
    pub confidence: f64,
}

pub(crate) fn http_client() -> Result<Client> {
    Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .context("Failed to build HTTP client")
}

/// Map an HTTP error status to the retry taxonomy: 429 and 5xx retry,
/// everything else (bad request, auth) fails immediately.
pub(crate) fn status_error(provider: &str, status: reqwest::StatusCode, body: &str) -> TaskError {
    let snippet: String = body.chars().take(500).collect();
    let err = anyhow!("{} API error (HTTP {}): {}", provider, status.as_u16(), snippet);

    if status.as_u16() == 429 || status.is_server_error() {
        TaskError::transient(err)
    } else {
        TaskError::permanent(err)
    }
}

/// Map a reqwest failure: anything at the network layer retries, malformed
/// requests and undecodable responses do not.
pub(crate) fn request_error(provider: &str, err: reqwest::Error) -> TaskError {
    let wrapped = anyhow!("{} request failed: {}", provider, err);
    if err.is_builder() || err.is_decode() {
        TaskError::permanent(wrapped)
    } else {
        TaskError::transient(wrapped)
    }
}

/// Render the summarization prompt, truncating long transcripts.
pub fn build_prompt(transcript: &str) -> String {
    let truncated: String = transcript.chars().take(MAX_TRANSCRIPT_CHARS).collect();

    format!(
        "Generate a structured summary of the following video transcript.\n\n\
        Transcript:\n{truncated}\n\n\
        Output the summary in Markdown with these sections:\n\n\
        # Video Summary\n\n\
        ## One-Sentence Summary\n\
        [one sentence capturing the core content]\n\n\
        ## Key Points\n\
        - [point 1]\n\
        - [point 2]\n\
        - [more points...]\n\n\
        ## Key Quotes\n\
        [3-5 important quotes or passages]\n\n\
        ## Tags\n\
        [5-10 relevant tags, comma separated]\n\n\
        ## Evaluation\n\
        [a short assessment of content quality, information density, and usefulness]\n\n\
        Also output a JSON object with the structured data:\n\
        {{\n\
          \"one_sentence_summary\": \"...\",\n\
          \"key_points\": [\"...\"],\n\
          \"key_quotes\": [\"...\"],\n\
          \"tags\": [\"...\"],\n\
          \"evaluation\": \"...\",\n\
          \"confidence\": 0.95\n\
        }}"
    )
}

/// Pull the JSON object out of a model response: a ```json fence first, any
/// fence second, outermost braces as the fallback.
pub fn extract_json_block(content: &str) -> Option<String> {
    if let Some((_, rest)) = content.split_once("```json") {
        if let Some((block, _)) = rest.split_once("```") {
            return Some(block.trim().to_string());
        }
    }

    if let Some((_, rest)) = content.split_once("```") {
        if let Some((block, _)) = rest.split_once("```") {
            return Some(block.trim().to_string());
        }
    }

    let start = content.find('{')?;
    let end = content.rfind('}')?;
    if end > start {
        Some(content[start..=end].to_string())
    } else {
        None
    }
}

/// Parse the structured fields out of a response, tolerating responses that
/// carry no parseable JSON - the raw prose is still worth saving.
pub fn parse_summary_data(content: &str) -> SummaryData {
    let Some(block) = extract_json_block(content) else {
        tracing::warn!("Response contains no JSON block, keeping prose only");
        return SummaryData::default();
    };

    match serde_json::from_str(&block) {
        Ok(data) => data,
        Err(err) => {
            tracing::warn!("Could not parse structured summary data: {}", err);
            SummaryData::default()
        }
    }
}

/// Summarize one transcript file: prompt the provider, then write
/// `summary.md` (raw prose) and `keywords.json` (structured fields) into
/// `output_dir`.
pub async fn summarize_transcript(
    provider: &dyn SummaryProvider,
    transcript_path: &Path,
    output_dir: &Path,
    options: &SummaryOptions,
) -> std::result::Result<SummaryOutput, TaskError> {
    let transcript = fs_err::read_to_string(transcript_path).map_err(|err| {
        TaskError::permanent(anyhow!(
            "Failed to read transcript {}: {}",
            transcript_path.display(),
            err
        ))
    })?;

    if transcript.trim().is_empty() {
        return Err(TaskError::permanent(anyhow!(
            "Transcript is empty: {}",
            transcript_path.display()
        )));
    }

    let prompt = build_prompt(&transcript);

    tracing::info!(
        "Generating summary for {} with {}",
        transcript_path.display(),
        provider.name()
    );
    let response = provider.generate(&prompt, options).await?;
    let data = parse_summary_data(&response);

    fs_err::create_dir_all(output_dir)
        .map_err(|err| TaskError::permanent(anyhow!("Failed to create output dir: {}", err)))?;

    let summary_file = output_dir.join("summary.md");
    fs_err::write(&summary_file, &response).map_err(|err| {
        TaskError::permanent(anyhow!("Failed to write {}: {}", summary_file.display(), err))
    })?;

    let keywords_file = output_dir.join("keywords.json");
    let keywords_json = serde_json::to_string_pretty(&data)
        .map_err(|err| TaskError::permanent(anyhow!("Failed to serialize keywords: {}", err)))?;
    fs_err::write(&keywords_file, keywords_json).map_err(|err| {
        TaskError::permanent(anyhow!("Failed to write {}: {}", keywords_file.display(), err))
    })?;

    Ok(SummaryOutput {
        transcript: transcript_path.to_path_buf(),
        summary_file,
        keywords_file,
        provider: provider.name().to_string(),
        model: options.model.clone(),
        one_sentence_summary: data.one_sentence_summary,
        tags: data.tags,
        confidence: data.confidence,
    })
}
