//! Video download via yt-dlp: fetches the video, native subtitles, and
//! platform metadata, then standardizes the artifact names inside a
//! per-title folder.

use anyhow::Context;
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

use crate::utils::sanitize_filename;
use crate::Result;

/// Resolved download settings for one invocation.
#[derive(Debug, Clone)]
pub struct DownloadOptions {
    pub output_dir: PathBuf,
    pub subtitle_languages: Vec<String>,
    pub quality: String,
    pub cookies_from_browser: Option<String>,
    pub audio_only: bool,
    pub write_info_json: bool,
}

/// Standardized artifacts produced by one download.
#[derive(Debug, Clone, Serialize)]
pub struct DownloadResult {
    pub folder: PathBuf,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitle_vtt: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitle_srt: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info: Option<PathBuf>,
    /// True when no native subtitle arrived and Whisper is needed.
    pub needs_transcription: bool,
}

/// Video downloader using yt-dlp
pub struct Downloader {
    yt_dlp_path: String,
}

impl Downloader {
    pub fn new() -> Self {
        Self {
            yt_dlp_path: "yt-dlp".to_string(),
        }
    }

    /// Check if yt-dlp is available
    pub async fn check_availability(&self) -> Result<bool> {
        let output = Command::new(&self.yt_dlp_path)
            .arg("--version")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await;

        Ok(output.is_ok() && output.unwrap().status.success())
    }

    /// Probe the video title without downloading anything.
    async fn probe_title(&self, url: &str) -> Result<String> {
        tracing::debug!("Probing video info for: {}", url);

        let output = Command::new(&self.yt_dlp_path)
            .args(["--dump-json", "--no-playlist", url])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("yt-dlp failed to probe {}: {}", url, error);
        }

        let json_str = String::from_utf8(output.stdout)?;
        let info: Value = serde_json::from_str(&json_str)?;

        Ok(info["title"].as_str().unwrap_or("unknown").to_string())
    }

    fn build_args(&self, url: &str, folder: &Path, title: &str, options: &DownloadOptions) -> Vec<String> {
        let template = folder.join(format!("{}.%(ext)s", title));
        let mut args = vec![
            "--output".to_string(),
            template.to_string_lossy().into_owned(),
            "--no-playlist".to_string(),
        ];

        if options.audio_only {
            args.extend([
                "--format".to_string(),
                "bestaudio/best".to_string(),
                "--extract-audio".to_string(),
                "--audio-format".to_string(),
                "mp3".to_string(),
            ]);
        } else {
            let format = if options.quality == "best" {
                "bestvideo[ext=mp4]+bestaudio[ext=m4a]/best[ext=mp4]/best".to_string()
            } else {
                options.quality.clone()
            };
            args.extend([
                "--format".to_string(),
                format,
                "--merge-output-format".to_string(),
                "mp4".to_string(),
            ]);
        }

        args.extend([
            "--write-subs".to_string(),
            "--write-auto-subs".to_string(),
            "--sub-langs".to_string(),
            options.subtitle_languages.join(","),
            "--sub-format".to_string(),
            "vtt/srt".to_string(),
        ]);

        if options.write_info_json {
            args.push("--write-info-json".to_string());
        }

        if let Some(browser) = &options.cookies_from_browser {
            args.push("--cookies-from-browser".to_string());
            args.push(browser.clone());
        }

        args.push(url.to_string());
        args
    }

    /// Download video, subtitles, and metadata into a per-title folder.
    pub async fn download(&self, url: &str, options: &DownloadOptions) -> Result<DownloadResult> {
        if !self.check_availability().await? {
            anyhow::bail!(
                "yt-dlp is not available. Please install it: https://github.com/yt-dlp/yt-dlp"
            );
        }

        let raw_title = self.probe_title(url).await?;
        let title = sanitize_filename(&raw_title);
        let title = if title.is_empty() { "unknown".to_string() } else { title };

        let folder = options.output_dir.join(&title);
        fs_err::create_dir_all(&folder)?;

        tracing::info!("Downloading {} into {}", url, folder.display());

        let output = Command::new(&self.yt_dlp_path)
            .args(self.build_args(url, &folder, &title, options))
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .context("Failed to run yt-dlp")?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("yt-dlp download failed: {}", error);
        }

        standardize_files(&folder, &options.subtitle_languages)?;

        let locate = |name: &str| {
            let path = folder.join(name);
            path.exists().then_some(path)
        };

        let video = locate("video.mp4");
        let audio = locate("audio.m4a").or_else(|| locate("audio.mp3"));
        let subtitle_vtt = locate("subtitle.vtt");
        let subtitle_srt = locate("subtitle.srt");
        let info = locate("info.json");
        let needs_transcription = subtitle_vtt.is_none() && subtitle_srt.is_none();

        Ok(DownloadResult {
            folder,
            title,
            video,
            audio,
            subtitle_vtt,
            subtitle_srt,
            info,
            needs_transcription,
        })
    }
}

impl Default for Downloader {
    fn default() -> Self {
        Self::new()
    }
}

fn files_with_extension(folder: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs_err::read_dir(folder)? {
        let path = entry?.path();
        if path.is_file()
            && path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case(extension))
        {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Prefer subtitle files matching the configured languages, in order.
fn pick_preferred(files: &[PathBuf], languages: &[String]) -> Option<PathBuf> {
    for language in languages {
        let marker = format!(".{}", language.to_lowercase());
        if let Some(found) = files.iter().find(|file| {
            file.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.to_lowercase().contains(&marker))
        }) {
            return Some(found.clone());
        }
    }
    files.first().cloned()
}

fn rename_if_absent(src: &Path, dst: &Path) -> Result<()> {
    if src != dst && !dst.exists() {
        fs_err::rename(src, dst)?;
    }
    Ok(())
}

/// Rename whatever yt-dlp produced to the standard artifact names so
/// downstream steps never have to guess.
fn standardize_files(folder: &Path, languages: &[String]) -> Result<()> {
    if let Some(first) = files_with_extension(folder, "mp4")?.first() {
        rename_if_absent(first, &folder.join("video.mp4"))?;
    }
    if let Some(first) = files_with_extension(folder, "m4a")?.first() {
        rename_if_absent(first, &folder.join("audio.m4a"))?;
    }
    if let Some(first) = files_with_extension(folder, "mp3")?.first() {
        rename_if_absent(first, &folder.join("audio.mp3"))?;
    }

    let vtt_files = files_with_extension(folder, "vtt")?;
    if let Some(preferred) = pick_preferred(&vtt_files, languages) {
        rename_if_absent(&preferred, &folder.join("subtitle.vtt"))?;
    }
    let srt_files = files_with_extension(folder, "srt")?;
    if let Some(preferred) = pick_preferred(&srt_files, languages) {
        rename_if_absent(&preferred, &folder.join("subtitle.srt"))?;
    }

    let info_files: Vec<PathBuf> = files_with_extension(folder, "json")?
        .into_iter()
        .filter(|file| {
            file.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.ends_with(".info.json"))
        })
        .collect();
    if let Some(first) = info_files.first() {
        rename_if_absent(first, &folder.join("info.json"))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path) {
        fs_err::write(path, "x").unwrap();
    }

    #[test]
    fn prefers_configured_subtitle_language() {
        let files = vec![
            PathBuf::from("Talk.en.vtt"),
            PathBuf::from("Talk.zh-Hans.vtt"),
        ];
        let languages = vec!["zh".to_string(), "en".to_string()];

        assert_eq!(
            pick_preferred(&files, &languages),
            Some(PathBuf::from("Talk.zh-Hans.vtt"))
        );

        let english_only = vec!["en".to_string()];
        assert_eq!(
            pick_preferred(&files, &english_only),
            Some(PathBuf::from("Talk.en.vtt"))
        );

        // No language match falls back to the first file.
        let other = vec!["ja".to_string()];
        assert_eq!(
            pick_preferred(&files, &other),
            Some(PathBuf::from("Talk.en.vtt"))
        );
    }

    #[test]
    fn standardizes_downloaded_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("My_Talk.mp4"));
        touch(&dir.path().join("My_Talk.zh.vtt"));
        touch(&dir.path().join("My_Talk.en.vtt"));
        touch(&dir.path().join("My_Talk.info.json"));

        let languages = vec!["zh".to_string(), "en".to_string()];
        standardize_files(dir.path(), &languages).unwrap();

        assert!(dir.path().join("video.mp4").exists());
        assert!(dir.path().join("subtitle.vtt").exists());
        assert!(dir.path().join("info.json").exists());
        // The unpicked subtitle stays behind untouched.
        assert!(dir.path().join("My_Talk.en.vtt").exists());
    }

    #[test]
    fn build_args_include_cookies_and_langs() {
        let downloader = Downloader::new();
        let options = DownloadOptions {
            output_dir: PathBuf::from("./output"),
            subtitle_languages: vec!["zh".to_string(), "en".to_string()],
            quality: "best".to_string(),
            cookies_from_browser: Some("firefox".to_string()),
            audio_only: false,
            write_info_json: true,
        };

        let args = downloader.build_args(
            "https://example.com/watch?v=abc",
            Path::new("./output/Title"),
            "Title",
            &options,
        );

        let langs_pos = args.iter().position(|a| a == "--sub-langs").unwrap();
        assert_eq!(args[langs_pos + 1], "zh,en");
        let cookies_pos = args.iter().position(|a| a == "--cookies-from-browser").unwrap();
        assert_eq!(args[cookies_pos + 1], "firefox");
        assert!(args.contains(&"--write-info-json".to_string()));
        assert!(args.contains(&"--merge-output-format".to_string()));
        assert_eq!(args.last().unwrap(), "https://example.com/watch?v=abc");
    }

    #[test]
    fn audio_only_swaps_format_flags() {
        let downloader = Downloader::new();
        let options = DownloadOptions {
            output_dir: PathBuf::from("./output"),
            subtitle_languages: vec!["en".to_string()],
            quality: "best".to_string(),
            cookies_from_browser: None,
            audio_only: true,
            write_info_json: false,
        };

        let args = downloader.build_args("https://example.com/v", Path::new("out"), "v", &options);

        assert!(args.contains(&"--extract-audio".to_string()));
        assert!(!args.contains(&"--merge-output-format".to_string()));
        assert!(!args.contains(&"--write-info-json".to_string()));
    }
}
