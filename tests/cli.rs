use assert_cmd::Command;
use predicates::prelude::*;

const SAMPLE_VTT: &str = "WEBVTT\n\n00:00:01.000 --> 00:00:02.000\nHello there\n\n00:00:02.500 --> 00:00:04.000\nSecond cue\n";

fn vdigest(config_home: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("vdigest").unwrap();
    cmd.env("XDG_CONFIG_HOME", config_home);
    cmd
}

#[test]
fn help_lists_subcommands() {
    Command::cargo_bin("vdigest")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("download"))
        .stdout(predicate::str::contains("transcribe"))
        .stdout(predicate::str::contains("summarize"))
        .stdout(predicate::str::contains("convert"));
}

#[test]
fn config_show_prints_settings() {
    let dir = tempfile::tempdir().unwrap();

    vdigest(dir.path())
        .args(["--quiet", "config", "--show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Current Configuration"))
        .stdout(predicate::str::contains("Summary provider: claude"));
}

#[test]
fn convert_writes_sibling_srt() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("subtitle.vtt");
    std::fs::write(&input, SAMPLE_VTT).unwrap();

    vdigest(dir.path())
        .current_dir(dir.path())
        .args(["--quiet", "convert", "subtitle.vtt"])
        .assert()
        .success()
        .stdout(predicate::str::contains("vtt -> srt"));

    let srt = std::fs::read_to_string(dir.path().join("subtitle.srt")).unwrap();
    assert!(srt.contains("00:00:01,000 --> 00:00:02,000"));
    assert!(srt.starts_with("1\n"));
}

#[test]
fn convert_batch_reports_counts() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.vtt"), SAMPLE_VTT).unwrap();
    std::fs::write(dir.path().join("b.vtt"), SAMPLE_VTT).unwrap();

    vdigest(dir.path())
        .current_dir(dir.path())
        .args(["--quiet", "convert", "--batch", "."])
        .assert()
        .success()
        .stdout(predicate::str::contains("2 succeeded, 0 failed, 0 skipped"));

    assert!(dir.path().join("a.srt").exists());
    assert!(dir.path().join("b.srt").exists());
}

#[test]
fn download_rejects_invalid_url() {
    let dir = tempfile::tempdir().unwrap();

    vdigest(dir.path())
        .args(["--quiet", "download", "not-a-url"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid URL"));
}
