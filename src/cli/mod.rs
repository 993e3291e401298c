use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::subtitle::SubtitleFormat;
use crate::summarize::ProviderKind;

#[derive(Parser)]
#[command(
    name = "vdigest",
    about = "Video Digest - download videos, transcribe speech with Whisper, convert subtitles, and generate AI summaries",
    version,
    long_about = "A CLI toolset for turning online videos into text: downloads media and native subtitles with yt-dlp, batch-transcribes speech through a Whisper runtime, converts between VTT and SRT, and produces structured AI summaries via Claude or OpenAI."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable progress indicators
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Download a video with subtitles and metadata
    Download {
        /// Video URL
        #[arg(value_name = "URL")]
        url: String,

        /// Output directory (per-title folder is created inside it)
        #[arg(short, long, value_name = "DIR")]
        output_dir: Option<PathBuf>,

        /// Subtitle languages in preference order
        #[arg(short, long, value_name = "LANG", num_args = 1..)]
        languages: Option<Vec<String>>,

        /// Requested video quality, or a raw yt-dlp format string
        #[arg(short = 'Q', long, value_name = "QUALITY")]
        quality: Option<String>,

        /// Import cookies from a browser for gated videos
        #[arg(short, long, value_enum)]
        cookies: Option<Browser>,

        /// Download audio only
        #[arg(short, long)]
        audio_only: bool,

        /// Print the result as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Transcribe media files with Whisper
    Transcribe {
        /// Media files or directories to transcribe
        #[arg(value_name = "INPUT", required = true)]
        inputs: Vec<PathBuf>,

        /// Root directory for per-item output folders (defaults to each
        /// input's directory)
        #[arg(short, long, value_name = "DIR")]
        output_dir: Option<PathBuf>,

        /// Model size (tiny, base, small, medium, large-v3)
        #[arg(short, long, value_name = "MODEL")]
        model: Option<String>,

        /// Language code (auto-detect if not specified)
        #[arg(short, long, value_name = "LANG")]
        language: Option<String>,

        /// Compute device (cpu, cuda, auto)
        #[arg(short, long, value_name = "DEVICE")]
        device: Option<String>,

        /// Compute type (int8, float16, float32)
        #[arg(short, long, value_name = "TYPE")]
        compute_type: Option<String>,

        #[command(flatten)]
        retry: RetryArgs,

        /// Print the batch report as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Generate AI summaries for transcript files
    Summarize {
        /// Transcript files or directories of transcripts
        #[arg(value_name = "TRANSCRIPT", required = true)]
        transcripts: Vec<PathBuf>,

        /// Root directory for per-item output folders (defaults to each
        /// transcript's directory)
        #[arg(short, long, value_name = "DIR")]
        output_dir: Option<PathBuf>,

        /// Summary provider (overrides config)
        #[arg(short, long, value_enum)]
        provider: Option<ProviderKind>,

        /// Model name (overrides config and the provider default)
        #[arg(short, long, value_name = "MODEL")]
        model: Option<String>,

        /// API key (overrides config and environment)
        #[arg(short = 'k', long, value_name = "KEY")]
        api_key: Option<String>,

        #[command(flatten)]
        retry: RetryArgs,

        /// Print the batch report as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Convert subtitles between VTT and SRT
    Convert {
        /// Subtitle file, or a directory with --batch
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Output file path (derived from the input if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Target format (inverse of the input format if not specified)
        #[arg(short, long, value_enum)]
        format: Option<SubtitleFormat>,

        /// Convert every matching file under the input directory
        #[arg(short, long)]
        batch: bool,

        #[command(flatten)]
        retry: RetryArgs,

        /// Print the result as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Configure download, whisper, and summary settings
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,
    },
}

/// Retry knobs shared by the batch commands; unset flags fall back to the
/// `batch` section of the config file.
#[derive(Args)]
pub struct RetryArgs {
    /// Retries per item for transient failures (overrides config)
    #[arg(long, value_name = "N")]
    pub max_retries: Option<u32>,

    /// Base seconds between retries, growing linearly (overrides config)
    #[arg(long, value_name = "SECONDS")]
    pub backoff: Option<f64>,

    /// Stop processing remaining items after the first failure
    #[arg(long)]
    pub fail_fast: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum Browser {
    Chrome,
    Firefox,
    Edge,
    Safari,
}

impl Browser {
    pub fn as_str(&self) -> &'static str {
        match self {
            Browser::Chrome => "chrome",
            Browser::Firefox => "firefox",
            Browser::Edge => "edge",
            Browser::Safari => "safari",
        }
    }
}

impl std::fmt::Display for Browser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
