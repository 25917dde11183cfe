//! # Subprocess Analyzer Tests
//!
//! These tests run the analyzer bridge against small `sh` scripts standing in
//! for the real analysis program. Each script receives the audio path as `$1`.
//!
//! ## Running the Tests
//!
//! ```bash
//! cargo test --test analyzer_test
//! ```

#![cfg(unix)]

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use speech_coach::analyzer::{AnalysisError, Analyzer, SubprocessAnalyzer};
use speech_coach::config::AnalyzerConfig;

const GOOD_OUTPUT: &str =
    r#"{"clarity":80,"pacing":65,"emotionalTone":"confident","feedback":["Good pacing"]}"#;

/// Analyzer that runs `script` through `sh -c`, writing temp files into `temp_dir`
fn script_analyzer(script: &str, temp_dir: &Path) -> SubprocessAnalyzer {
    let mut config = AnalyzerConfig::with_command(
        "sh",
        vec!["-c".to_string(), script.to_string(), "fake-analyzer".to_string()],
    );
    config.temp_dir = Some(temp_dir.to_path_buf());
    SubprocessAnalyzer::new(&config)
}

fn dir_is_empty(dir: &Path) -> bool {
    std::fs::read_dir(dir).unwrap().next().is_none()
}

#[tokio::test]
async fn test_data_url_is_materialized_and_removed_on_success() {
    let temp = tempfile::tempdir().unwrap();
    let work = tempfile::tempdir().unwrap();
    let seen = work.path().join("seen_path");
    let copy = work.path().join("copy");

    let script = format!(
        "printf '%s' \"$1\" > '{}'; cp \"$1\" '{}'; printf '%s' '{}'",
        seen.display(),
        copy.display(),
        GOOD_OUTPUT
    );
    let analyzer = script_analyzer(&script, temp.path());

    let fields = analyzer
        .analyze("data:audio/webm;base64,AQIDBA==")
        .await
        .unwrap();
    assert_eq!(fields.clarity, 80);
    assert_eq!(fields.pacing, 65);
    assert_eq!(fields.emotional_tone, "confident");
    assert_eq!(fields.feedback, vec!["Good pacing"]);

    let seen_path = std::fs::read_to_string(&seen).unwrap();
    assert!(seen_path.ends_with(".webm"), "unexpected path {seen_path}");
    assert!(seen_path.starts_with(&*temp.path().to_string_lossy()));
    assert!(!Path::new(&seen_path).exists());
    assert_eq!(std::fs::read(&copy).unwrap(), vec![1u8, 2, 3, 4]);
    assert!(dir_is_empty(temp.path()));
}

#[tokio::test]
async fn test_data_url_is_removed_when_output_is_not_json() {
    let temp = tempfile::tempdir().unwrap();
    let analyzer = script_analyzer("echo 'Analyzing audio...'; echo oops >&2", temp.path());

    let err = analyzer
        .analyze("data:audio/webm;base64,AAAA")
        .await
        .unwrap_err();

    match err {
        AnalysisError::InvalidOutput { stdout, stderr, .. } => {
            assert!(stdout.contains("Analyzing audio..."));
            assert!(stderr.contains("oops"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(dir_is_empty(temp.path()));
}

#[tokio::test]
async fn test_missing_fields_are_rejected() {
    let temp = tempfile::tempdir().unwrap();
    let analyzer = script_analyzer(r#"printf '%s' '{"clarity":80,"pacing":65}'"#, temp.path());

    let err = analyzer.analyze("clip.webm").await.unwrap_err();
    assert!(matches!(err, AnalysisError::InvalidOutput { .. }));
}

#[tokio::test]
async fn test_nonzero_exit_is_an_error() {
    let temp = tempfile::tempdir().unwrap();
    let script = format!("printf '%s' '{}'; echo boom >&2; exit 3", GOOD_OUTPUT);
    let analyzer = script_analyzer(&script, temp.path());

    let err = analyzer
        .analyze("data:audio/webm;base64,AAAA")
        .await
        .unwrap_err();

    match err {
        AnalysisError::Failed { status, stderr, .. } => {
            assert!(status.contains('3'), "unexpected status {status}");
            assert!(stderr.contains("boom"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(dir_is_empty(temp.path()));
}

#[tokio::test]
async fn test_plain_path_is_passed_through_untouched() {
    let temp = tempfile::tempdir().unwrap();
    let work = tempfile::tempdir().unwrap();
    let audio = work.path().join("clip.json");
    std::fs::write(&audio, GOOD_OUTPUT).unwrap();

    // The "audio" file already holds the analyzer output
    let analyzer = script_analyzer("cat \"$1\"", temp.path());
    let fields = analyzer.analyze(&audio.to_string_lossy()).await.unwrap();

    assert_eq!(fields.emotional_tone, "confident");
    assert!(audio.exists());
    assert!(dir_is_empty(temp.path()));
}

#[tokio::test]
async fn test_snake_case_output_is_accepted() {
    let temp = tempfile::tempdir().unwrap();
    let script = r#"printf '%s' '{"clarity": 91, "pacing": 72, "emotional_tone": "enthusiastic", "feedback": ["a", "b", "c"]}'"#;
    let analyzer = script_analyzer(script, temp.path());

    let fields = analyzer.analyze("clip.webm").await.unwrap();
    assert_eq!(fields.clarity, 91);
    assert_eq!(fields.emotional_tone, "enthusiastic");
    assert_eq!(fields.feedback, vec!["a", "b", "c"]);
}

#[tokio::test]
async fn test_timeout_kills_analyzer_and_removes_file() {
    let temp = tempfile::tempdir().unwrap();
    let mut config = AnalyzerConfig::with_command(
        "sh",
        vec!["-c".to_string(), "exec sleep 10".to_string(), "fake-analyzer".to_string()],
    );
    config.timeout_secs = 1;
    config.temp_dir = Some(temp.path().to_path_buf());
    let analyzer = SubprocessAnalyzer::new(&config);

    let started = Instant::now();
    let err = analyzer
        .analyze("data:audio/webm;base64,AAAA")
        .await
        .unwrap_err();

    assert!(matches!(err, AnalysisError::Timeout(1)));
    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(dir_is_empty(temp.path()));
}

#[tokio::test]
async fn test_missing_program_is_a_spawn_error() {
    let temp = tempfile::tempdir().unwrap();
    let mut config = AnalyzerConfig::with_command("/nonexistent/speech-analyzer", vec![]);
    config.temp_dir = Some(temp.path().to_path_buf());
    let analyzer = SubprocessAnalyzer::new(&config);

    let err = analyzer
        .analyze("data:audio/webm;base64,AAAA")
        .await
        .unwrap_err();

    assert!(matches!(err, AnalysisError::Spawn { .. }));
    assert!(dir_is_empty(temp.path()));
}

#[tokio::test]
async fn test_invalid_data_url_never_spawns() {
    let temp = tempfile::tempdir().unwrap();
    let work = tempfile::tempdir().unwrap();
    let marker = work.path().join("ran");
    let script = format!("touch '{}'", marker.display());
    let analyzer = script_analyzer(&script, temp.path());

    let err = analyzer
        .analyze("data:audio/webm;base64,***")
        .await
        .unwrap_err();

    assert!(matches!(err, AnalysisError::InvalidPayload(_)));
    assert!(!marker.exists());
}

#[tokio::test]
async fn test_concurrency_is_capped() {
    let temp = tempfile::tempdir().unwrap();
    let work = tempfile::tempdir().unwrap();
    let lock = work.path().join("lock");

    // mkdir fails if another analyzer holds the lock, which would mean overlap
    let script = format!(
        "mkdir '{lock}' || exit 9; sleep 0.3; rmdir '{lock}'; printf '%s' '{out}'",
        lock = lock.display(),
        out = GOOD_OUTPUT
    );
    let mut config = AnalyzerConfig::with_command(
        "sh",
        vec!["-c".to_string(), script, "fake-analyzer".to_string()],
    );
    config.max_concurrent = 1;
    config.temp_dir = Some(temp.path().to_path_buf());
    let analyzer = Arc::new(SubprocessAnalyzer::new(&config));
    assert_eq!(analyzer.available_slots(), 1);

    let handles: Vec<_> = (0..3)
        .map(|_| {
            let analyzer = analyzer.clone();
            tokio::spawn(async move { analyzer.analyze("data:audio/webm;base64,AAAA").await })
        })
        .collect();

    for handle in handles {
        let fields = handle.await.unwrap().unwrap();
        assert_eq!(fields.clarity, 80);
    }
    assert_eq!(analyzer.available_slots(), 1);
    assert!(dir_is_empty(temp.path()));
}
