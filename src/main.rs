use anyhow::Result;
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use video_digest::batch::{BatchRunner, TaskError};
use video_digest::cli::{Cli, Commands};
use video_digest::config::Config;
use video_digest::download::{DownloadOptions, Downloader};
use video_digest::subtitle::{self, SubtitleFormat};
use video_digest::summarize::{self, SummaryOptions, SummaryProvider};
use video_digest::transcribe::{self, whisper::WhisperRunner, TranscribePipeline};
use video_digest::{output, utils, DigestError};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let default_filter = if cli.verbose {
        "video_digest=debug"
    } else {
        "video_digest=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().await?;

    // Check for required external dependencies (non-fatal)
    if !cli.quiet {
        let missing = utils::check_dependencies(&config.whisper.binary).await;
        if !missing.is_empty() {
            eprintln!("⚠️  Dependency check warnings:");
            for dep in missing {
                eprintln!("   • {}", dep);
            }
            eprintln!("   (Continuing anyway - tools may be available)");
        }
    }

    let code = run(cli, config).await?;
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}

async fn run(cli: Cli, config: Config) -> Result<i32> {
    let quiet = cli.quiet;

    match cli.command {
        Commands::Download {
            url,
            output_dir,
            languages,
            quality,
            cookies,
            audio_only,
            json,
        } => {
            utils::validate_url(&url)?;

            let options = DownloadOptions {
                output_dir: output_dir.unwrap_or_else(|| config.download.output_dir.clone()),
                subtitle_languages: languages
                    .unwrap_or_else(|| config.download.subtitle_languages.clone()),
                quality: quality.unwrap_or_else(|| config.download.quality.clone()),
                cookies_from_browser: cookies
                    .map(|browser| browser.as_str().to_string())
                    .or_else(|| config.download.cookies_from_browser.clone()),
                audio_only,
                write_info_json: config.download.write_info_json,
            };

            let result = Downloader::new().download(&url, &options).await?;

            if json {
                output::print_json(&result)?;
            } else {
                println!("Download complete: {}", result.folder.display());
                if let Some(video) = &result.video {
                    println!("  Video: {}", video.display());
                }
                if let Some(audio) = &result.audio {
                    println!("  Audio: {}", audio.display());
                }
                if let Some(subtitle) = result.subtitle_vtt.as_ref().or(result.subtitle_srt.as_ref()) {
                    println!("  Subtitle: {}", subtitle.display());
                }
                if let Some(info) = &result.info {
                    println!("  Metadata: {}", info.display());
                }
                if result.needs_transcription {
                    println!("No native subtitles found - transcription needed:");
                    println!(
                        "  vdigest transcribe {}",
                        result.folder.join("video.mp4").display()
                    );
                }
            }
            Ok(0)
        }

        Commands::Transcribe {
            inputs,
            output_dir,
            model,
            language,
            device,
            compute_type,
            retry,
            json,
        } => {
            let mut whisper_config = config.whisper.clone();
            if let Some(model) = model {
                whisper_config.model = model;
            }
            if let Some(language) = language {
                whisper_config.language = language;
            }
            if let Some(device) = device {
                whisper_config.device = device;
            }
            if let Some(compute_type) = compute_type {
                whisper_config.compute_type = compute_type;
            }

            let files = utils::expand_inputs(&inputs, |path| transcribe::is_media(path))?;
            if files.is_empty() {
                anyhow::bail!("No media files found in the given inputs");
            }

            let binary = whisper_config.binary.clone();
            let pipeline = TranscribePipeline::new(WhisperRunner::new(whisper_config))?;
            if !pipeline.whisper().check_availability().await? {
                return Err(DigestError::MissingDependency(format!(
                    "{} (install faster-whisper or openai-whisper)",
                    binary
                ))
                .into());
            }

            let policy = config.batch_policy(retry.max_retries, retry.backoff, retry.fail_fast)?;
            let runner = BatchRunner::new(policy).with_quiet(quiet || json);
            spawn_abort_on_ctrl_c(&runner);

            tracing::info!("Transcribing {} file(s)", files.len());

            let output_root = output_dir;
            let report = runner
                .run(&files, |file: PathBuf| {
                    let pipeline = &pipeline;
                    let output_root = &output_root;
                    async move {
                        let out_dir = item_output_dir(&file, output_root.as_deref());
                        pipeline.transcribe_file(&file, &out_dir).await
                    }
                })
                .await;

            output::print_report(&report, json)?;
            Ok(report.exit_code())
        }

        Commands::Summarize {
            transcripts,
            output_dir,
            provider,
            model,
            api_key,
            retry,
            json,
        } => {
            let kind = match provider {
                Some(kind) => kind,
                None => config.provider()?,
            };
            let key = match api_key {
                Some(key) => key,
                None => config.resolve_api_key(kind)?,
            };

            let options = SummaryOptions {
                model: model
                    .or_else(|| config.summary.model.clone())
                    .unwrap_or_else(|| kind.default_model().to_string()),
                max_tokens: config.summary.max_tokens,
                temperature: config.summary.temperature,
            };

            let files = utils::expand_inputs(&transcripts, |path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("txt"))
            })?;
            if files.is_empty() {
                anyhow::bail!("No transcript files found in the given inputs");
            }

            let provider = summarize::create_provider(kind, key)?;
            let provider_ref: &dyn SummaryProvider = provider.as_ref();

            let policy = config.batch_policy(retry.max_retries, retry.backoff, retry.fail_fast)?;
            let runner = BatchRunner::new(policy).with_quiet(quiet || json);
            spawn_abort_on_ctrl_c(&runner);

            tracing::info!("Summarizing {} transcript(s) with {}", files.len(), kind);

            let output_root = output_dir;
            let report = runner
                .run(&files, |file: PathBuf| {
                    let options = &options;
                    let output_root = &output_root;
                    async move {
                        // Summaries default to sitting beside their transcript.
                        let out_dir = match output_root {
                            Some(root) => item_output_dir(&file, Some(root.as_path())),
                            None => file
                                .parent()
                                .unwrap_or_else(|| Path::new("."))
                                .to_path_buf(),
                        };
                        summarize::summarize_transcript(provider_ref, &file, &out_dir, options)
                            .await
                    }
                })
                .await;

            output::print_report(&report, json)?;
            Ok(report.exit_code())
        }

        Commands::Convert {
            input,
            output,
            format,
            batch,
            retry,
            json,
        } => {
            if batch {
                let target = format.unwrap_or(SubtitleFormat::Srt);
                let files = subtitle::collect_convertible(&input, target)?;
                if files.is_empty() {
                    println!(
                        "No .{} files found under {}",
                        target.opposite().extension(),
                        input.display()
                    );
                    return Ok(0);
                }

                let policy =
                    config.batch_policy(retry.max_retries, retry.backoff, retry.fail_fast)?;
                let runner = BatchRunner::new(policy).with_quiet(quiet || json);
                spawn_abort_on_ctrl_c(&runner);

                tracing::info!("Converting {} file(s) to {}", files.len(), target);

                let report = runner
                    .run(&files, |file: PathBuf| async move {
                        subtitle::convert_file(&file, None, Some(target))
                            .map_err(TaskError::permanent)
                    })
                    .await;

                output::print_report(&report, json)?;
                Ok(report.exit_code())
            } else {
                let result = subtitle::convert_file(&input, output.as_deref(), format)?;

                if json {
                    output::print_json(&result)?;
                } else if result.converted {
                    println!(
                        "Converted {} ({} -> {})",
                        result.input.display(),
                        result.from,
                        result.to
                    );
                    if let Some(path) = &result.output {
                        println!("  Output: {} ({} cues)", path.display(), result.cues);
                    }
                } else {
                    println!(
                        "{} is already in {} format, nothing to convert",
                        result.input.display(),
                        result.to
                    );
                }
                Ok(0)
            }
        }

        Commands::Config { show } => {
            if show {
                config.display();
            } else {
                config.interactive_setup().await?;
            }
            Ok(0)
        }
    }
}

/// Per-item output folder: `<root>/<stem>` when a root is given, otherwise a
/// `<stem>` folder beside the input.
fn item_output_dir(input: &Path, output_root: Option<&Path>) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("item");
    let folder = utils::sanitize_filename(stem);

    match output_root {
        Some(root) => root.join(folder),
        None => input
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(folder),
    }
}

/// Route Ctrl-C into the runner's abort flag so the current item finishes
/// cleanly and the rest of the batch is marked skipped.
fn spawn_abort_on_ctrl_c(runner: &BatchRunner) {
    let abort = runner.abort_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping after the current item");
            abort.store(true, std::sync::atomic::Ordering::SeqCst);
        }
    });
}
