use anyhow::Result;
use regex::Regex;
use std::path::{Path, PathBuf};
use url::Url;

use crate::DigestError;

/// Validate a URL and ensure it uses a web scheme.
pub fn validate_url(url: &str) -> Result<Url> {
    let parsed =
        Url::parse(url).map_err(|_| DigestError::InvalidUrl(url.to_string()))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(DigestError::InvalidUrl(url.to_string()).into());
    }

    Ok(parsed)
}

/// Sanitize a title for safe filesystem usage: illegal characters and
/// whitespace collapse to single underscores.
pub fn sanitize_filename(filename: &str) -> String {
    let illegal = Regex::new(r#"[\\/*?:"<>|]"#).unwrap();
    let whitespace = Regex::new(r"\s+").unwrap();
    let underscores = Regex::new(r"_+").unwrap();

    let cleaned = illegal.replace_all(filename, "_");
    let cleaned = whitespace.replace_all(&cleaned, "_");
    let cleaned = underscores.replace_all(&cleaned, "_");

    cleaned.trim_matches(|c| c == '_' || c == '.').to_string()
}

/// Format duration in human-readable format
pub fn format_duration(seconds: f64) -> String {
    let total_seconds = seconds as u64;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let secs = total_seconds % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, secs)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, secs)
    } else if total_seconds > 0 {
        format!("{}s", secs)
    } else {
        format!("{:.1}s", seconds)
    }
}

/// Expand a mix of files and directories into a flat, sorted file list.
/// Directories are walked recursively and filtered by `matches`; explicit
/// file arguments pass through untouched so that a missing file still shows
/// up as a per-item failure instead of being dropped silently.
pub fn expand_inputs<F>(inputs: &[PathBuf], matches: F) -> Result<Vec<PathBuf>>
where
    F: Fn(&Path) -> bool,
{
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            collect_matching(input, &matches, &mut files)?;
        } else {
            files.push(input.clone());
        }
    }
    files.sort();
    files.dedup();
    Ok(files)
}

fn collect_matching<F>(dir: &Path, matches: &F, out: &mut Vec<PathBuf>) -> Result<()>
where
    F: Fn(&Path) -> bool,
{
    for entry in fs_err::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_matching(&path, matches, out)?;
        } else if matches(&path) {
            out.push(path);
        }
    }
    Ok(())
}

/// Check if the current environment has required tools
pub async fn check_dependencies(whisper_binary: &str) -> Vec<String> {
    let mut missing = Vec::new();

    if !check_command_available("yt-dlp", "--version").await {
        missing.push("yt-dlp - required for video downloads".to_string());
    }

    if !check_command_available("ffmpeg", "-version").await {
        missing.push("ffmpeg - required for audio extraction".to_string());
    }

    if !check_command_available(whisper_binary, "--help").await {
        missing.push(format!(
            "{} - required for speech transcription",
            whisper_binary
        ));
    }

    missing
}

/// Check if a command is available in PATH
async fn check_command_available(command: &str, probe_arg: &str) -> bool {
    use tokio::process::Command;

    Command::new(command)
        .arg(probe_arg)
        .output()
        .await
        .map(|output| output.status.success())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("Hello World!"), "Hello_World!");
        assert_eq!(sanitize_filename("a/b\\c:d"), "a_b_c_d");
        assert_eq!(sanitize_filename("  spaced   out  "), "spaced_out");
        assert_eq!(sanitize_filename("__trimmed__."), "trimmed");
        assert_eq!(sanitize_filename("what? when: how|"), "what_when_how");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0.5), "0.5s");
        assert_eq!(format_duration(30.0), "30s");
        assert_eq!(format_duration(90.0), "1m 30s");
        assert_eq!(format_duration(3661.0), "1h 1m 1s");
    }

    #[test]
    fn test_validate_url() {
        assert!(validate_url("https://example.com").is_ok());
        assert!(validate_url("http://example.com").is_ok());
        assert!(validate_url("ftp://example.com").is_err());
        assert!(validate_url("not-a-url").is_err());
    }

    #[test]
    fn expand_inputs_walks_directories() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("nested");
        fs_err::create_dir_all(&nested).unwrap();
        fs_err::write(dir.path().join("a.txt"), "x").unwrap();
        fs_err::write(nested.join("b.txt"), "x").unwrap();
        fs_err::write(dir.path().join("c.bin"), "x").unwrap();

        let is_txt = |path: &Path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext == "txt")
        };

        let files = expand_inputs(&[dir.path().to_path_buf()], is_txt).unwrap();
        assert_eq!(files.len(), 2);

        // Explicit files pass through even when missing.
        let missing = dir.path().join("missing.txt");
        let files = expand_inputs(&[missing.clone()], is_txt).unwrap();
        assert_eq!(files, vec![missing]);
    }
}
