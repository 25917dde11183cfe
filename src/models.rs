//! Entity shapes and request validation
//!
//! `Recording` and `Analysis` are the stored rows as exposed over the API.
//! `NewRecording` and `AnalysisRequest` are the client-supplied subsets,
//! produced only through the `validate_*` functions below.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// A stored speech clip plus its metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recording {
    pub id: i64,
    pub title: String,
    /// Either a path/URL to the audio or an inline `data:` URL
    pub audio_url: String,
    pub duration_seconds: i64,
    pub recorded_at: DateTime<Utc>,
}

/// A stored scoring result for one recording
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Analysis {
    pub id: i64,
    pub recording_id: i64,
    pub clarity: i64,
    pub pacing: i64,
    pub emotional_tone: String,
    pub feedback: Vec<String>,
    pub analyzed_at: DateTime<Utc>,
}

/// Validated input for creating a recording
#[derive(Debug, Clone, PartialEq)]
pub struct NewRecording {
    pub title: String,
    pub audio_url: String,
    pub duration_seconds: i64,
}

/// Validated input for requesting an analysis
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalysisRequest {
    pub recording_id: i64,
}

/// Scores and feedback produced by an analyzer
///
/// Scores are nominally 0-100 but the range is not enforced. Fractional
/// scores are rounded to the nearest integer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisFields {
    #[serde(deserialize_with = "deserialize_score")]
    pub clarity: i64,
    #[serde(deserialize_with = "deserialize_score")]
    pub pacing: i64,
    #[serde(alias = "emotional_tone")]
    pub emotional_tone: String,
    pub feedback: Vec<String>,
}

/// Input for inserting an analysis row
#[derive(Debug, Clone, PartialEq)]
pub struct NewAnalysis {
    pub recording_id: i64,
    pub fields: AnalysisFields,
}

impl NewAnalysis {
    /// Merge analyzer output into a validated request
    pub fn from_request(request: AnalysisRequest, fields: AnalysisFields) -> Self {
        Self {
            recording_id: request.recording_id,
            fields,
        }
    }
}

fn deserialize_score<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = f64::deserialize(deserializer)?;
    if !value.is_finite() {
        return Err(serde::de::Error::custom("score must be a finite number"));
    }
    Ok(value.round() as i64)
}

/// One problem with one field of a request body
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldIssue {
    pub field: String,
    pub message: String,
}

impl FieldIssue {
    fn new(field: &str, message: &str) -> Self {
        Self {
            field: field.to_string(),
            message: message.to_string(),
        }
    }
}

impl fmt::Display for FieldIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Request body failed validation; lists every offending field
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{}", format_issues(.issues))]
pub struct ValidationError {
    pub issues: Vec<FieldIssue>,
}

impl ValidationError {
    pub fn single(field: &str, message: &str) -> Self {
        Self {
            issues: vec![FieldIssue::new(field, message)],
        }
    }
}

fn format_issues(issues: &[FieldIssue]) -> String {
    issues
        .iter()
        .map(|issue| issue.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

fn require_string<'a>(
    body: &'a serde_json::Map<String, Value>,
    field: &str,
    issues: &mut Vec<FieldIssue>,
) -> Option<&'a str> {
    match body.get(field) {
        None | Some(Value::Null) => {
            issues.push(FieldIssue::new(field, "missing"));
            None
        }
        Some(Value::String(s)) => Some(s.as_str()),
        Some(_) => {
            issues.push(FieldIssue::new(field, "expected string"));
            None
        }
    }
}

fn require_integer(
    body: &serde_json::Map<String, Value>,
    field: &str,
    issues: &mut Vec<FieldIssue>,
) -> Option<i64> {
    match body.get(field) {
        None | Some(Value::Null) => {
            issues.push(FieldIssue::new(field, "missing"));
            None
        }
        Some(value) => match value.as_i64() {
            Some(n) => Some(n),
            None => {
                issues.push(FieldIssue::new(field, "expected integer"));
                None
            }
        },
    }
}

/// Validate a `POST /api/recordings` body
pub fn validate_recording_input(body: &Value) -> Result<NewRecording, ValidationError> {
    let Some(body) = body.as_object() else {
        return Err(ValidationError::single("body", "expected JSON object"));
    };

    let mut issues = Vec::new();

    let title = require_string(body, "title", &mut issues);
    if let Some(t) = title {
        if t.trim().is_empty() {
            issues.push(FieldIssue::new("title", "must not be empty"));
        }
    }

    let audio_url = require_string(body, "audioUrl", &mut issues);
    if let Some(url) = audio_url {
        if url.is_empty() {
            issues.push(FieldIssue::new("audioUrl", "must not be empty"));
        }
    }

    let duration_seconds = require_integer(body, "durationSeconds", &mut issues);
    if let Some(d) = duration_seconds {
        if d < 0 {
            issues.push(FieldIssue::new(
                "durationSeconds",
                "expected non-negative integer",
            ));
        }
    }

    if !issues.is_empty() {
        return Err(ValidationError { issues });
    }

    match (title, audio_url, duration_seconds) {
        (Some(title), Some(audio_url), Some(duration_seconds)) => Ok(NewRecording {
            title: title.to_string(),
            audio_url: audio_url.to_string(),
            duration_seconds,
        }),
        _ => Err(ValidationError::single("body", "incomplete recording data")),
    }
}

/// Validate a `POST /api/analyses` body
///
/// Only `recordingId` is read; scores supplied by the client are ignored
/// because the analyzer output replaces them.
pub fn validate_analysis_request(body: &Value) -> Result<AnalysisRequest, ValidationError> {
    let Some(body) = body.as_object() else {
        return Err(ValidationError::single("body", "expected JSON object"));
    };

    let mut issues = Vec::new();
    match require_integer(body, "recordingId", &mut issues) {
        Some(recording_id) => Ok(AnalysisRequest { recording_id }),
        None => Err(ValidationError { issues }),
    }
}
