//! Video Digest - a Rust CLI toolset for turning online videos into text
//!
//! This library downloads videos and native subtitles via yt-dlp, transcribes
//! speech through a Whisper runtime, converts between subtitle formats, and
//! generates structured AI summaries with hosted LLM providers. Batch
//! commands run through a shared task runner with bounded retry.

pub mod batch;
pub mod cli;
pub mod config;
pub mod download;
pub mod output;
pub mod subtitle;
pub mod summarize;
pub mod transcribe;
pub mod utils;

pub use batch::{BatchOutcome, BatchReport, BatchRunner, RetryPolicy, TaskError, TaskResult};
pub use cli::{Cli, Commands};
pub use config::Config;
pub use download::{DownloadResult, Downloader};
pub use summarize::{ProviderKind, SummaryProvider};
pub use transcribe::TranscribePipeline;

/// Result type used throughout the library
pub type Result<T> = anyhow::Result<T>;

/// Error types specific to the toolset
#[derive(thiserror::Error, Debug)]
pub enum DigestError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Unsupported input file: {0}")]
    UnsupportedInput(String),

    #[error("Missing external dependency: {0}")]
    MissingDependency(String),
}
