use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use crate::config::WhisperConfig;
use crate::Result;

/// One timed transcript segment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    pub id: usize,

    /// Start time in seconds
    pub start: f64,

    /// End time in seconds
    pub end: f64,

    pub text: String,
}

/// Parsed output of one Whisper run.
#[derive(Debug, Clone)]
pub struct Transcription {
    pub language: Option<String>,
    pub segments: Vec<Segment>,
}

impl Transcription {
    /// Plain transcript text, one segment per line.
    pub fn text(&self) -> String {
        self.segments
            .iter()
            .map(|segment| segment.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// End time of the last segment.
    pub fn duration(&self) -> Option<f64> {
        self.segments.last().map(|segment| segment.end)
    }
}

#[derive(Debug, Deserialize)]
struct WhisperJson {
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    segments: Vec<WhisperJsonSegment>,
}

#[derive(Debug, Deserialize)]
struct WhisperJsonSegment {
    start: f64,
    end: f64,
    text: String,
}

/// Speech-to-text driver wrapping a faster-whisper compatible CLI.
pub struct WhisperRunner {
    binary: String,
    model: String,
    language: String,
    device: String,
    compute_type: String,
}

impl WhisperRunner {
    pub fn new(config: WhisperConfig) -> Self {
        Self {
            binary: config.binary,
            model: config.model,
            language: config.language,
            device: config.device,
            compute_type: config.compute_type,
        }
    }

    /// Check if the whisper CLI is available
    pub async fn check_availability(&self) -> Result<bool> {
        let output = Command::new(&self.binary)
            .arg("--help")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await;

        Ok(output.is_ok() && output.unwrap().status.success())
    }

    fn build_args(&self, audio: &Path, json_dir: &Path) -> Vec<String> {
        let mut args = vec![
            audio.to_string_lossy().into_owned(),
            "--model".to_string(),
            self.model.clone(),
            "--output_format".to_string(),
            "json".to_string(),
            "--output_dir".to_string(),
            json_dir.to_string_lossy().into_owned(),
            "--compute_type".to_string(),
            self.compute_type.clone(),
        ];

        // "auto" means let the runtime detect.
        if self.language != "auto" {
            args.push("--language".to_string());
            args.push(self.language.clone());
        }
        if self.device != "auto" {
            args.push("--device".to_string());
            args.push(self.device.clone());
        }

        args
    }

    /// Run the whisper CLI on an audio file and parse the JSON it writes
    /// into `json_dir`.
    pub async fn transcribe(&self, audio: &Path, json_dir: &Path) -> Result<Transcription> {
        tracing::info!(
            "Transcribing {} with whisper model {}",
            audio.display(),
            self.model
        );

        let output = Command::new(&self.binary)
            .args(self.build_args(audio, json_dir))
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .with_context(|| format!("Failed to run whisper binary: {}", self.binary))?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("whisper failed: {}", error);
        }

        let stem = audio
            .file_stem()
            .and_then(|s| s.to_str())
            .context("Audio file has no usable name")?;
        let json_path = json_dir.join(format!("{}.json", stem));

        let content = fs_err::read_to_string(&json_path).with_context(|| {
            format!("whisper produced no JSON output at {}", json_path.display())
        })?;

        let parsed: WhisperJson =
            serde_json::from_str(&content).context("Failed to parse whisper JSON output")?;

        let segments = parsed
            .segments
            .into_iter()
            .enumerate()
            .map(|(id, segment)| Segment {
                id,
                start: segment.start,
                end: segment.end,
                text: segment.text.trim().to_string(),
            })
            .collect();

        Ok(Transcription {
            language: parsed.language,
            segments,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn runner() -> WhisperRunner {
        WhisperRunner::new(Config::default().whisper)
    }

    #[test]
    fn auto_settings_are_omitted_from_args() {
        let args = runner().build_args(Path::new("audio.mp3"), Path::new("/tmp/out"));

        assert!(!args.contains(&"--language".to_string()));
        assert!(!args.contains(&"--device".to_string()));
        assert!(args.contains(&"--compute_type".to_string()));
        assert_eq!(args[0], "audio.mp3");
    }

    #[test]
    fn explicit_settings_are_passed_through() {
        let mut config = Config::default().whisper;
        config.language = "en".to_string();
        config.device = "cuda".to_string();
        let args = WhisperRunner::new(config).build_args(Path::new("a.wav"), Path::new("out"));

        let lang_pos = args.iter().position(|a| a == "--language").unwrap();
        assert_eq!(args[lang_pos + 1], "en");
        let device_pos = args.iter().position(|a| a == "--device").unwrap();
        assert_eq!(args[device_pos + 1], "cuda");
    }

    #[test]
    fn whisper_json_parses_and_reindexes() {
        let json = r#"{
            "text": "hello world",
            "language": "en",
            "segments": [
                {"id": 5, "start": 0.0, "end": 1.5, "text": " hello "},
                {"id": 9, "start": 1.5, "end": 3.0, "text": " world"}
            ]
        }"#;

        let parsed: WhisperJson = serde_json::from_str(json).unwrap();
        let segments: Vec<Segment> = parsed
            .segments
            .into_iter()
            .enumerate()
            .map(|(id, s)| Segment {
                id,
                start: s.start,
                end: s.end,
                text: s.text.trim().to_string(),
            })
            .collect();

        assert_eq!(segments[0].id, 0);
        assert_eq!(segments[1].id, 1);
        assert_eq!(segments[0].text, "hello");

        let transcription = Transcription {
            language: parsed.language,
            segments,
        };
        assert_eq!(transcription.text(), "hello\nworld");
        assert_eq!(transcription.duration(), Some(3.0));
    }
}
