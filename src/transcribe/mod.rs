//! Speech transcription pipeline: audio preparation, Whisper invocation,
//! and per-item artifact writing.

use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tempfile::TempDir;
use tokio::process::Command;
use uuid::Uuid;

pub mod whisper;

use crate::batch::TaskError;
use crate::subtitle::{self, Cue};
use whisper::{Segment, Transcription, WhisperRunner};

pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "flac", "m4a", "aac", "ogg", "wma"];
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "mkv", "flv", "wmv", "webm"];

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
        .is_some_and(|ext| extensions.contains(&ext.as_str()))
}

pub fn is_audio(path: &Path) -> bool {
    has_extension(path, AUDIO_EXTENSIONS)
}

pub fn is_video(path: &Path) -> bool {
    has_extension(path, VIDEO_EXTENSIONS)
}

pub fn is_media(path: &Path) -> bool {
    is_audio(path) || is_video(path)
}

/// Artifacts recorded for one transcribed media file.
#[derive(Debug, Clone, Serialize)]
pub struct TranscribeOutput {
    pub input: PathBuf,
    pub transcript_file: PathBuf,
    pub srt_file: PathBuf,
    pub vtt_file: PathBuf,
    pub json_file: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detected_language: Option<String>,
    pub segments: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<f64>,
}

/// Contents of the per-item `transcript.json` artifact.
#[derive(Serialize)]
struct TranscriptRecord<'a> {
    detected_language: &'a Option<String>,
    generated_at: chrono::DateTime<chrono::Utc>,
    transcript_file: &'a Path,
    srt_file: &'a Path,
    vtt_file: &'a Path,
    segments: &'a [Segment],
}

/// Transcription pipeline shared across a batch: one Whisper runner, one
/// scratch directory for extracted audio and raw model output.
pub struct TranscribePipeline {
    whisper: WhisperRunner,
    temp_dir: TempDir,
}

impl TranscribePipeline {
    pub fn new(whisper: WhisperRunner) -> Result<Self> {
        let temp_dir = TempDir::new().context("Failed to create temporary directory")?;
        Ok(Self { whisper, temp_dir })
    }

    pub fn whisper(&self) -> &WhisperRunner {
        &self.whisper
    }

    /// Transcribe one media file into `output_dir`, producing the plain
    /// transcript, both subtitle renderings, and the JSON record.
    ///
    /// Everything here is local subprocess work, so all failures are
    /// permanent - there is nothing a retry would fix.
    pub async fn transcribe_file(
        &self,
        input: &Path,
        output_dir: &Path,
    ) -> std::result::Result<TranscribeOutput, TaskError> {
        self.transcribe_inner(input, output_dir)
            .await
            .map_err(TaskError::permanent)
    }

    async fn transcribe_inner(&self, input: &Path, output_dir: &Path) -> Result<TranscribeOutput> {
        if !input.exists() {
            anyhow::bail!("Input file does not exist: {}", input.display());
        }
        if !is_media(input) {
            return Err(crate::DigestError::UnsupportedInput(input.display().to_string()).into());
        }

        let audio_path = if is_video(input) {
            tracing::info!("Extracting audio from video: {}", input.display());
            self.extract_audio(input).await?
        } else {
            input.to_path_buf()
        };

        let transcription = self
            .whisper
            .transcribe(&audio_path, self.temp_dir.path())
            .await?;

        if let Some(language) = &transcription.language {
            tracing::info!("Detected language: {}", language);
        }

        self.write_artifacts(input, output_dir, &transcription)
    }

    /// Extract the audio track of a video into the scratch directory as MP3.
    async fn extract_audio(&self, video: &Path) -> Result<PathBuf> {
        let filename = format!("audio_{}.mp3", &Uuid::new_v4().to_string()[..8]);
        let audio_path = self.temp_dir.path().join(filename);

        let output = Command::new("ffmpeg")
            .args([
                "-i",
                &video.to_string_lossy(),
                "-vn",
                "-acodec",
                "libmp3lame",
                "-q:a",
                "2",
                "-y",
                &audio_path.to_string_lossy(),
            ])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .context("Failed to run ffmpeg")?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("ffmpeg failed to extract audio: {}", error);
        }

        Ok(audio_path)
    }

    fn write_artifacts(
        &self,
        input: &Path,
        output_dir: &Path,
        transcription: &Transcription,
    ) -> Result<TranscribeOutput> {
        if transcription.segments.is_empty() {
            return Err(anyhow!("No speech found in {}", input.display()));
        }

        fs_err::create_dir_all(output_dir)?;

        let transcript_file = output_dir.join("transcript.txt");
        fs_err::write(&transcript_file, transcription.text())?;

        let cues: Vec<Cue> = transcription
            .segments
            .iter()
            .map(|segment| Cue {
                start: segment.start,
                end: segment.end,
                text: vec![segment.text.clone()],
            })
            .collect();

        let srt_file = output_dir.join("subtitle_whisper.srt");
        fs_err::write(&srt_file, subtitle::render_srt(&cues))?;

        let vtt_file = output_dir.join("subtitle_whisper.vtt");
        fs_err::write(&vtt_file, subtitle::render_vtt(&cues))?;

        let json_file = output_dir.join("transcript.json");
        let record = TranscriptRecord {
            detected_language: &transcription.language,
            generated_at: chrono::Utc::now(),
            transcript_file: &transcript_file,
            srt_file: &srt_file,
            vtt_file: &vtt_file,
            segments: &transcription.segments,
        };
        fs_err::write(&json_file, serde_json::to_string_pretty(&record)?)?;

        Ok(TranscribeOutput {
            input: input.to_path_buf(),
            transcript_file,
            srt_file,
            vtt_file,
            json_file,
            detected_language: transcription.language.clone(),
            segments: transcription.segments.len(),
            duration_secs: transcription.duration(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn classifies_media_extensions() {
        assert!(is_audio(Path::new("talk.mp3")));
        assert!(is_audio(Path::new("TALK.FLAC")));
        assert!(is_video(Path::new("clip.mp4")));
        assert!(is_video(Path::new("clip.webm")));
        assert!(!is_media(Path::new("notes.txt")));
        assert!(!is_media(Path::new("noextension")));
    }

    #[test]
    fn artifacts_are_written_per_item() {
        let pipeline =
            TranscribePipeline::new(WhisperRunner::new(Config::default().whisper)).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let out_dir = dir.path().join("talk");

        let transcription = Transcription {
            language: Some("en".to_string()),
            segments: vec![
                Segment {
                    id: 0,
                    start: 0.0,
                    end: 2.0,
                    text: "First line".to_string(),
                },
                Segment {
                    id: 1,
                    start: 2.0,
                    end: 4.5,
                    text: "Second line".to_string(),
                },
            ],
        };

        let output = pipeline
            .write_artifacts(Path::new("talk.mp3"), &out_dir, &transcription)
            .unwrap();

        assert_eq!(output.segments, 2);
        assert_eq!(output.duration_secs, Some(4.5));

        let transcript = fs_err::read_to_string(&output.transcript_file).unwrap();
        assert_eq!(transcript, "First line\nSecond line");

        let srt = fs_err::read_to_string(&output.srt_file).unwrap();
        assert!(srt.starts_with("1\n00:00:00,000 --> 00:00:02,000\nFirst line"));

        let vtt = fs_err::read_to_string(&output.vtt_file).unwrap();
        assert!(vtt.starts_with("WEBVTT"));

        let json = fs_err::read_to_string(&output.json_file).unwrap();
        assert!(json.contains("\"detected_language\": \"en\""));
    }

    #[test]
    fn empty_transcription_is_an_error() {
        let pipeline =
            TranscribePipeline::new(WhisperRunner::new(Config::default().whisper)).unwrap();
        let dir = tempfile::tempdir().unwrap();

        let transcription = Transcription {
            language: None,
            segments: Vec::new(),
        };

        let result = pipeline.write_artifacts(Path::new("silent.mp3"), dir.path(), &transcription);
        assert!(result.is_err());
    }
}
