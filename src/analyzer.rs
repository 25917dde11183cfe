//! Bridge to the external speech analyzer
//!
//! The analysis itself happens in a separate program. [`Analyzer`] is the
//! seam the HTTP layer depends on; [`SubprocessAnalyzer`] is the production
//! implementation that spawns the configured program once per request.
//!
//! Subprocess contract: the audio path is passed as the final positional
//! argument, and stdout must carry exactly one JSON object with `clarity`,
//! `pacing`, `emotionalTone` and `feedback`. Anything diagnostic belongs on
//! stderr.

use async_trait::async_trait;
use base64::Engine;
use log::{debug, info, warn};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempPath;
use thiserror::Error;
use tokio::process::Command;
use tokio::sync::Semaphore;

use crate::config::AnalyzerConfig;
use crate::constants::TEMP_AUDIO_PREFIX;
use crate::models::AnalysisFields;

/// Analyzer failures
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// `data:` URL could not be decoded
    #[error("Invalid audio payload: {0}")]
    InvalidPayload(String),

    /// Temporary file or process pipe I/O failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Analyzer program could not be started
    #[error("Failed to spawn analyzer '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Analyzer ran longer than the configured limit and was killed
    #[error("Analyzer timed out after {0} seconds")]
    Timeout(u64),

    /// Analyzer exited with a nonzero status
    #[error("Analyzer exited with {status}; stderr: {stderr}")]
    Failed {
        status: String,
        stdout: String,
        stderr: String,
    },

    /// Analyzer stdout was not the expected JSON object
    #[error("Invalid analysis output: {reason}; stdout: {stdout:?}; stderr: {stderr:?}")]
    InvalidOutput {
        reason: String,
        stdout: String,
        stderr: String,
    },

    /// Admission semaphore was closed
    #[error("Analyzer is shutting down")]
    Closed,
}

/// Turns an audio reference into scores and feedback
#[async_trait]
pub trait Analyzer: Send + Sync {
    async fn analyze(&self, audio_ref: &str) -> Result<AnalysisFields, AnalysisError>;
}

/// Decoded contents of a `data:` URL
#[derive(Debug, Clone, PartialEq)]
pub struct DataUrl {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl DataUrl {
    /// File extension used when materializing the payload
    pub fn extension(&self) -> &'static str {
        let subtype = self
            .mime_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match subtype.as_str() {
            "audio/webm" | "video/webm" => "webm",
            "audio/ogg" | "audio/opus" | "application/ogg" => "ogg",
            "audio/wav" | "audio/x-wav" | "audio/wave" => "wav",
            "audio/mpeg" | "audio/mp3" => "mp3",
            "audio/mp4" | "audio/m4a" | "audio/x-m4a" | "audio/aac" => "m4a",
            _ => "bin",
        }
    }
}

/// Parse a `data:[<mime>][;base64],<payload>` URL
///
/// Returns `Ok(None)` when `audio_ref` is not a data URL at all.
pub fn parse_data_url(audio_ref: &str) -> Result<Option<DataUrl>, AnalysisError> {
    let Some(rest) = audio_ref.strip_prefix("data:") else {
        return Ok(None);
    };
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| AnalysisError::InvalidPayload("data URL has no ',' separator".into()))?;

    let is_base64 = header
        .rsplit(';')
        .next()
        .is_some_and(|param| param.trim().eq_ignore_ascii_case("base64"));

    let bytes = if is_base64 {
        // Tolerate whitespace that browsers and shells sometimes insert
        let cleaned: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
        base64::engine::general_purpose::STANDARD
            .decode(cleaned.as_bytes())
            .map_err(|e| AnalysisError::InvalidPayload(format!("invalid base64: {}", e)))?
    } else {
        urlencoding::decode_binary(payload.as_bytes()).into_owned()
    };

    let mime_type = header
        .strip_suffix(";base64")
        .or_else(|| header.strip_suffix(";BASE64"))
        .unwrap_or(header)
        .to_string();

    Ok(Some(DataUrl { mime_type, bytes }))
}

/// Write decoded audio to a uniquely named temporary file
///
/// The returned `TempPath` deletes the file when dropped; call
/// [`remove_temp_audio`] to delete it explicitly and log failures.
pub fn materialize_audio(data: &DataUrl, temp_dir: &Path) -> Result<TempPath, AnalysisError> {
    let suffix = format!(".{}", data.extension());
    let mut file = tempfile::Builder::new()
        .prefix(TEMP_AUDIO_PREFIX)
        .suffix(&suffix)
        .tempfile_in(temp_dir)?;
    file.write_all(&data.bytes)?;
    file.flush()?;
    Ok(file.into_temp_path())
}

/// Delete a materialized audio file, logging instead of failing
pub fn remove_temp_audio(path: TempPath) {
    let display = path.display().to_string();
    if let Err(e) = path.close() {
        warn!("Failed to remove temporary audio file '{}': {}", display, e);
    } else {
        debug!("Removed temporary audio file '{}'", display);
    }
}

/// Parse analyzer stdout into analysis fields
pub fn parse_analyzer_output(stdout: &str, stderr: &str) -> Result<AnalysisFields, AnalysisError> {
    serde_json::from_str::<AnalysisFields>(stdout.trim()).map_err(|e| {
        AnalysisError::InvalidOutput {
            reason: e.to_string(),
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
        }
    })
}

/// Runs the configured analyzer program as a child process
pub struct SubprocessAnalyzer {
    program: String,
    args: Vec<String>,
    timeout: Duration,
    temp_dir: PathBuf,
    permits: Arc<Semaphore>,
}

impl SubprocessAnalyzer {
    pub fn new(config: &AnalyzerConfig) -> Self {
        Self {
            program: config.program.clone(),
            args: config.args.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            temp_dir: config
                .temp_dir
                .clone()
                .unwrap_or_else(std::env::temp_dir),
            permits: Arc::new(Semaphore::new(config.max_concurrent)),
        }
    }

    /// Number of analyzer runs that could start right now
    pub fn available_slots(&self) -> usize {
        self.permits.available_permits()
    }

    async fn run(&self, audio_path: &Path) -> Result<AnalysisFields, AnalysisError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| AnalysisError::Closed)?;

        debug!(
            "Spawning analyzer: {} {:?} {}",
            self.program,
            self.args,
            audio_path.display()
        );

        let child = Command::new(&self.program)
            .args(&self.args)
            .arg(audio_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| AnalysisError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        // Dropping the output future on timeout kills the child via kill_on_drop
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result?,
            Err(_) => return Err(AnalysisError::Timeout(self.timeout.as_secs())),
        };

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        info!("Analyzer process exited with {}", output.status);
        if !stderr.is_empty() {
            debug!("Analyzer stderr: {}", stderr.trim_end());
        }

        if !output.status.success() {
            return Err(AnalysisError::Failed {
                status: output.status.to_string(),
                stdout,
                stderr,
            });
        }

        parse_analyzer_output(&stdout, &stderr)
    }
}

#[async_trait]
impl Analyzer for SubprocessAnalyzer {
    async fn analyze(&self, audio_ref: &str) -> Result<AnalysisFields, AnalysisError> {
        match parse_data_url(audio_ref)? {
            Some(data) => {
                let temp_path = materialize_audio(&data, &self.temp_dir)?;
                info!(
                    "Materialized {} bytes of {} audio to {}",
                    data.bytes.len(),
                    if data.mime_type.is_empty() { "untyped" } else { data.mime_type.as_str() },
                    temp_path.display()
                );
                let result = self.run(&temp_path).await;
                remove_temp_audio(temp_path);
                result
            }
            None => {
                info!("Analyzing audio at {}", audio_ref);
                self.run(Path::new(audio_ref)).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_base64_data_url() {
        let data = parse_data_url("data:audio/webm;base64,AAAA").unwrap().unwrap();
        assert_eq!(data.mime_type, "audio/webm");
        assert_eq!(data.bytes, vec![0u8, 0, 0]);
        assert_eq!(data.extension(), "webm");
    }

    #[test]
    fn test_parse_percent_encoded_data_url() {
        let data = parse_data_url("data:,hello%20world").unwrap().unwrap();
        assert_eq!(data.mime_type, "");
        assert_eq!(data.bytes, b"hello world".to_vec());
        assert_eq!(data.extension(), "bin");
    }

    #[test]
    fn test_mime_parameters_do_not_affect_extension() {
        let data = parse_data_url("data:audio/ogg;codecs=opus;base64,AQID")
            .unwrap()
            .unwrap();
        assert_eq!(data.mime_type, "audio/ogg;codecs=opus");
        assert_eq!(data.extension(), "ogg");
        assert_eq!(data.bytes, vec![1u8, 2, 3]);
    }

    #[test]
    fn test_plain_reference_is_not_a_data_url() {
        assert!(parse_data_url("/var/audio/clip.webm").unwrap().is_none());
        assert!(parse_data_url("https://example.com/a.wav").unwrap().is_none());
    }

    #[test]
    fn test_malformed_data_urls() {
        assert!(matches!(
            parse_data_url("data:audio/webm;base64"),
            Err(AnalysisError::InvalidPayload(_))
        ));
        assert!(matches!(
            parse_data_url("data:audio/webm;base64,@@@"),
            Err(AnalysisError::InvalidPayload(_))
        ));
    }

    #[test]
    fn test_materialize_and_remove() {
        let dir = tempfile::tempdir().unwrap();
        let data = parse_data_url("data:audio/wav;base64,AQID").unwrap().unwrap();

        let path = materialize_audio(&data, dir.path()).unwrap();
        let owned = path.to_path_buf();
        assert!(owned.exists());
        assert_eq!(std::fs::read(&owned).unwrap(), vec![1u8, 2, 3]);
        let name = owned.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with(TEMP_AUDIO_PREFIX));
        assert!(name.ends_with(".wav"));

        remove_temp_audio(path);
        assert!(!owned.exists());
    }

    #[test]
    fn test_parse_output_keeps_raw_streams_on_failure() {
        let err = parse_analyzer_output("not json", "Traceback").unwrap_err();
        match err {
            AnalysisError::InvalidOutput { stdout, stderr, .. } => {
                assert_eq!(stdout, "not json");
                assert_eq!(stderr, "Traceback");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_parse_output_rejects_trailing_text() {
        let stdout = "{\"clarity\":1,\"pacing\":2,\"emotionalTone\":\"calm\",\"feedback\":[]}\nextra";
        assert!(parse_analyzer_output(stdout, "").is_err());
    }
}
