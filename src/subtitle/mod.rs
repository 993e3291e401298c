//! Subtitle cue model plus VTT/SRT parsing, rendering, and file conversion.

use anyhow::{Context, Result};
use clap::ValueEnum;
use regex::Regex;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Supported subtitle file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SubtitleFormat {
    Srt,
    Vtt,
}

impl SubtitleFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubtitleFormat::Srt => "srt",
            SubtitleFormat::Vtt => "vtt",
        }
    }

    pub fn extension(&self) -> &'static str {
        self.as_str()
    }

    /// The format a conversion defaults to when no target is given.
    pub fn opposite(&self) -> Self {
        match self {
            SubtitleFormat::Srt => SubtitleFormat::Vtt,
            SubtitleFormat::Vtt => SubtitleFormat::Srt,
        }
    }

    /// Detect the format of file contents. Anything without a WEBVTT header
    /// is treated as SRT.
    pub fn detect(content: &str) -> Self {
        if content.trim_start().starts_with("WEBVTT") {
            SubtitleFormat::Vtt
        } else {
            SubtitleFormat::Srt
        }
    }
}

impl std::fmt::Display for SubtitleFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One timed subtitle cue.
#[derive(Debug, Clone, PartialEq)]
pub struct Cue {
    /// Start time in seconds.
    pub start: f64,

    /// End time in seconds.
    pub end: f64,

    /// Text lines of the cue, markup already stripped.
    pub text: Vec<String>,
}

/// Parse a subtitle timestamp (`HH:MM:SS.mmm`, `MM:SS.mmm`, or bare seconds;
/// comma or dot as the millisecond separator) into seconds.
pub fn parse_timestamp(raw: &str) -> Result<f64> {
    let cleaned = raw.trim().replace(',', ".");
    let parts: Vec<&str> = cleaned.split(':').collect();

    let (hours, minutes, seconds) = match parts.len() {
        3 => (
            parts[0].parse::<u64>()?,
            parts[1].parse::<u64>()?,
            parts[2].parse::<f64>()?,
        ),
        2 => (0, parts[0].parse::<u64>()?, parts[1].parse::<f64>()?),
        1 => (0, 0, parts[0].parse::<f64>()?),
        _ => anyhow::bail!("Invalid timestamp: {}", raw),
    };

    Ok(hours as f64 * 3600.0 + minutes as f64 * 60.0 + seconds)
}

fn split_seconds(seconds: f64) -> (u64, u64, u64, u64) {
    let total = seconds.max(0.0);
    let hours = (total / 3600.0) as u64;
    let minutes = ((total % 3600.0) / 60.0) as u64;
    let secs = (total % 60.0) as u64;
    let millis = ((total % 1.0) * 1000.0) as u64;
    (hours, minutes, secs, millis)
}

/// Format seconds as SRT time (`HH:MM:SS,mmm`).
pub fn format_srt_time(seconds: f64) -> String {
    let (h, m, s, ms) = split_seconds(seconds);
    format!("{:02}:{:02}:{:02},{:03}", h, m, s, ms)
}

/// Format seconds as WebVTT time (`HH:MM:SS.mmm`).
pub fn format_vtt_time(seconds: f64) -> String {
    let (h, m, s, ms) = split_seconds(seconds);
    format!("{:02}:{:02}:{:02}.{:03}", h, m, s, ms)
}

/// Parse WebVTT content into cues, skipping headers and NOTE blocks and
/// stripping voice/markup spans from the text.
pub fn parse_vtt(content: &str) -> Result<Vec<Cue>> {
    let markup = Regex::new(r"<[^>]+>").unwrap();
    let lines: Vec<&str> = content.lines().collect();
    let mut cues = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i].trim();

        if let Some((start_raw, end_raw)) = line.split_once(" --> ") {
            let start = parse_timestamp(start_raw)?;
            // Position settings may follow the end time.
            let end_token = end_raw.split_whitespace().next().unwrap_or(end_raw);
            let end = parse_timestamp(end_token)?;

            let mut text = Vec::new();
            i += 1;
            while i < lines.len() && !lines[i].trim().is_empty() {
                let stripped = markup.replace_all(lines[i].trim(), "").to_string();
                if !stripped.is_empty() {
                    text.push(stripped);
                }
                i += 1;
            }

            if !text.is_empty() {
                cues.push(Cue { start, end, text });
            }
        } else {
            i += 1;
        }
    }

    Ok(cues)
}

/// Parse SRT content into cues, ignoring the numeric index lines.
pub fn parse_srt(content: &str) -> Result<Vec<Cue>> {
    let lines: Vec<&str> = content.lines().collect();
    let mut cues = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i].trim();

        if line.chars().all(|c| c.is_ascii_digit()) && !line.is_empty() {
            i += 1;
            continue;
        }

        if let Some((start_raw, end_raw)) = line.split_once(" --> ") {
            let start = parse_timestamp(start_raw)?;
            let end = parse_timestamp(end_raw)?;

            let mut text = Vec::new();
            i += 1;
            while i < lines.len() && !lines[i].trim().is_empty() {
                text.push(lines[i].trim().to_string());
                i += 1;
            }

            if !text.is_empty() {
                cues.push(Cue { start, end, text });
            }
        } else {
            i += 1;
        }
    }

    Ok(cues)
}

/// Render cues as SRT with 1-based indices.
pub fn render_srt(cues: &[Cue]) -> String {
    let mut out = Vec::new();
    for (index, cue) in cues.iter().enumerate() {
        out.push((index + 1).to_string());
        out.push(format!(
            "{} --> {}",
            format_srt_time(cue.start),
            format_srt_time(cue.end)
        ));
        out.extend(cue.text.iter().cloned());
        out.push(String::new());
    }
    out.join("\n")
}

/// Render cues as WebVTT.
pub fn render_vtt(cues: &[Cue]) -> String {
    let mut out = vec!["WEBVTT".to_string(), String::new()];
    for cue in cues {
        out.push(format!(
            "{} --> {}",
            format_vtt_time(cue.start),
            format_vtt_time(cue.end)
        ));
        out.extend(cue.text.iter().cloned());
        out.push(String::new());
    }
    out.join("\n")
}

fn parse(content: &str, format: SubtitleFormat) -> Result<Vec<Cue>> {
    match format {
        SubtitleFormat::Vtt => parse_vtt(content),
        SubtitleFormat::Srt => parse_srt(content),
    }
}

fn render(cues: &[Cue], format: SubtitleFormat) -> String {
    match format {
        SubtitleFormat::Srt => render_srt(cues),
        SubtitleFormat::Vtt => render_vtt(cues),
    }
}

/// Result of converting one subtitle file.
#[derive(Debug, Clone, Serialize)]
pub struct ConvertOutput {
    pub input: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
    pub from: SubtitleFormat,
    pub to: SubtitleFormat,
    pub cues: usize,
    /// False when the file was already in the requested format.
    pub converted: bool,
}

/// Convert one subtitle file. The input format is detected from the content;
/// the target defaults to the inverse format and the output path to a sibling
/// file with the target extension.
pub fn convert_file(
    input: &Path,
    output: Option<&Path>,
    target: Option<SubtitleFormat>,
) -> Result<ConvertOutput> {
    let content = fs_err::read_to_string(input)
        .with_context(|| format!("Failed to read subtitle file: {}", input.display()))?;

    let from = SubtitleFormat::detect(&content);
    let to = target.unwrap_or_else(|| from.opposite());

    if from == to {
        tracing::warn!(
            "{}: already in {} format, nothing to convert",
            input.display(),
            to
        );
        return Ok(ConvertOutput {
            input: input.to_path_buf(),
            output: None,
            from,
            to,
            cues: 0,
            converted: false,
        });
    }

    let cues = parse(&content, from)
        .with_context(|| format!("Failed to parse {} as {}", input.display(), from))?;
    let rendered = render(&cues, to);

    let output_path = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| input.with_extension(to.extension()));

    fs_err::write(&output_path, rendered)
        .with_context(|| format!("Failed to write {}", output_path.display()))?;

    Ok(ConvertOutput {
        input: input.to_path_buf(),
        output: Some(output_path),
        from,
        to,
        cues: cues.len(),
        converted: true,
    })
}

/// Recursively collect the files under `dir` that convert into `target`
/// (i.e. files carrying the inverse format's extension), sorted for a stable
/// batch order.
pub fn collect_convertible(dir: &Path, target: SubtitleFormat) -> Result<Vec<PathBuf>> {
    let source_ext = target.opposite().extension();
    let mut files = Vec::new();
    collect_by_extension(dir, source_ext, &mut files)?;
    files.sort();
    Ok(files)
}

fn collect_by_extension(dir: &Path, extension: &str, out: &mut Vec<PathBuf>) -> Result<()> {
    for entry in fs_err::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            collect_by_extension(&path, extension, out)?;
        } else if path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(extension))
        {
            out.push(path);
        }
    }
    Ok(())
}
