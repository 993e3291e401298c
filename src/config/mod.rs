use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::batch::RetryPolicy;
use crate::summarize::ProviderKind;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Video download settings
    pub download: DownloadConfig,

    /// Whisper transcription settings
    pub whisper: WhisperConfig,

    /// AI summary settings
    pub summary: SummaryConfig,

    /// API keys for the hosted summary providers
    pub api_keys: ApiKeys,

    /// Batch processing and retry settings
    pub batch: BatchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Root directory for downloaded titles
    pub output_dir: PathBuf,

    /// Subtitle language preference, in order
    pub subtitle_languages: Vec<String>,

    /// Requested video quality
    pub quality: String,

    /// Browser to import cookies from (chrome, firefox, edge, safari)
    pub cookies_from_browser: Option<String>,

    /// Write the platform metadata JSON alongside the video
    pub write_info_json: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhisperConfig {
    /// Whisper CLI executable
    pub binary: String,

    /// Model size (tiny, base, small, medium, large-v3)
    pub model: String,

    /// Language code, "auto" for detection
    pub language: String,

    /// Compute device (cpu, cuda, auto)
    pub device: String,

    /// Compute type (int8, float16, float32)
    pub compute_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryConfig {
    /// Summary provider (claude or openai)
    pub provider: String,

    /// Model override; each provider has its own default
    pub model: Option<String>,

    /// Response token budget
    pub max_tokens: u32,

    /// Sampling temperature
    pub temperature: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKeys {
    pub claude: Option<String>,
    pub openai: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Retries after the first attempt for transient failures
    pub max_retries: u32,

    /// Base seconds between attempts; retry n sleeps n times this value
    pub backoff_seconds: f64,

    /// Stop the batch at the first failed item
    pub fail_fast: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            download: DownloadConfig {
                output_dir: PathBuf::from("./output"),
                subtitle_languages: vec!["zh".to_string(), "en".to_string()],
                quality: "best".to_string(),
                cookies_from_browser: None,
                write_info_json: true,
            },
            whisper: WhisperConfig {
                binary: "whisper".to_string(),
                model: "small".to_string(),
                language: "auto".to_string(),
                device: "auto".to_string(),
                compute_type: "int8".to_string(),
            },
            summary: SummaryConfig {
                provider: "claude".to_string(),
                model: None,
                max_tokens: 4096,
                temperature: 0.3,
            },
            api_keys: ApiKeys {
                claude: None,
                openai: None,
            },
            batch: BatchConfig {
                max_retries: 2,
                backoff_seconds: 5.0,
                fail_fast: false,
            },
        }
    }
}

impl Config {
    /// Load configuration from file or create default
    pub async fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let content = fs_err::read_to_string(&config_path)
                .context("Failed to read config file")?;

            let config: Config = serde_yaml::from_str(&content)
                .context("Failed to parse config file")?;

            config.validate()?;
            Ok(config)
        } else {
            let config = Self::default();
            config.save().await?;
            Ok(config)
        }
    }

    /// Save configuration to file
    pub async fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            fs_err::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self)
            .context("Failed to serialize config")?;

        fs_err::write(&config_path, content)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Get configuration file path
    pub fn config_path() -> Result<PathBuf> {
        // First try current directory for easy testing
        let local_config = PathBuf::from("config.yaml");
        if local_config.exists() {
            return Ok(local_config);
        }

        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?;

        Ok(config_dir.join("video-digest").join("config.yaml"))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !self.batch.backoff_seconds.is_finite() || self.batch.backoff_seconds < 0.0 {
            anyhow::bail!(
                "batch.backoff_seconds must be a non-negative number, got {}",
                self.batch.backoff_seconds
            );
        }

        ProviderKind::parse(&self.summary.provider)?;

        if self.summary.max_tokens == 0 {
            anyhow::bail!("summary.max_tokens must be greater than zero");
        }

        if !(0.0..=2.0).contains(&self.summary.temperature) {
            anyhow::bail!(
                "summary.temperature must be between 0.0 and 2.0, got {}",
                self.summary.temperature
            );
        }

        Ok(())
    }

    /// Build the effective retry policy for a batch command, applying CLI
    /// overrides on top of the configured defaults.
    pub fn batch_policy(
        &self,
        max_retries: Option<u32>,
        backoff_seconds: Option<f64>,
        fail_fast: bool,
    ) -> Result<RetryPolicy> {
        let backoff = backoff_seconds.unwrap_or(self.batch.backoff_seconds);
        if !backoff.is_finite() || backoff < 0.0 {
            anyhow::bail!("backoff seconds must be a non-negative number, got {}", backoff);
        }

        Ok(RetryPolicy {
            max_retries: max_retries.unwrap_or(self.batch.max_retries),
            backoff: Duration::from_secs_f64(backoff),
            fail_fast: fail_fast || self.batch.fail_fast,
        })
    }

    /// The summary provider selected by config, unless overridden.
    pub fn provider(&self) -> Result<ProviderKind> {
        ProviderKind::parse(&self.summary.provider)
    }

    /// Resolve the API key for a provider: config first, then environment.
    pub fn resolve_api_key(&self, provider: ProviderKind) -> Result<String> {
        let (configured, env_var) = match provider {
            ProviderKind::Claude => (self.api_keys.claude.clone(), "ANTHROPIC_API_KEY"),
            ProviderKind::Openai => (self.api_keys.openai.clone(), "OPENAI_API_KEY"),
        };

        configured
            .or_else(|| std::env::var(env_var).ok())
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "No {} API key set. Configure api_keys in {} or set {}",
                    provider,
                    Self::config_path()
                        .map(|p| p.display().to_string())
                        .unwrap_or_else(|_| "config.yaml".to_string()),
                    env_var
                )
            })
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        println!("  Download output dir: {}", self.download.output_dir.display());
        println!("  Subtitle languages: {}", self.download.subtitle_languages.join(", "));
        if let Some(browser) = &self.download.cookies_from_browser {
            println!("  Cookies from browser: {}", browser);
        }
        println!("  Whisper binary: {}", self.whisper.binary);
        println!("  Whisper model: {}", self.whisper.model);
        println!("  Whisper device: {}", self.whisper.device);
        println!("  Summary provider: {}", self.summary.provider);
        if let Some(model) = &self.summary.model {
            println!("  Summary model: {}", model);
        }
        println!("  Max retries: {}", self.batch.max_retries);
        println!("  Backoff seconds: {}", self.batch.backoff_seconds);
        println!("  Fail fast: {}", self.batch.fail_fast);
    }

    /// Interactive configuration setup
    pub async fn interactive_setup(&self) -> Result<()> {
        println!("Interactive configuration setup coming soon!");
        println!("For now, please edit the config file manually:");
        println!("  {}", Self::config_path()?.display());
        Ok(())
    }
}
