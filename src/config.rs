use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::constants::{
    DEFAULT_ANALYZER_TIMEOUT_SECS, DEFAULT_API_PORT, DEFAULT_MAX_CONCURRENT_ANALYSES,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

fn default_api_port() -> u16 {
    DEFAULT_API_PORT
}

fn default_timeout_secs() -> u64 {
    DEFAULT_ANALYZER_TIMEOUT_SECS
}

fn default_max_concurrent() -> usize {
    DEFAULT_MAX_CONCURRENT_ANALYSES
}

/// Server configuration file structure
///
/// ```toml
/// database_path = "data/speech_coach.sqlite"
/// port = 3000
///
/// [analyzer]
/// program = "python3"
/// args = ["server/audio_analyzer.py"]
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// SQLite database file (created if missing)
    pub database_path: PathBuf,
    /// API server port (default: 3000)
    #[serde(default = "default_api_port")]
    pub port: u16,
    /// Directory with a prebuilt frontend bundle, served for non-API paths
    pub static_dir: Option<PathBuf>,
    /// External analyzer settings (maps to [analyzer] section in TOML)
    pub analyzer: AnalyzerConfig,
}

/// External analyzer configuration (maps to [analyzer] section in TOML)
#[derive(Debug, Clone, Deserialize)]
pub struct AnalyzerConfig {
    /// Program to execute (e.g. python3)
    pub program: String,
    /// Leading arguments; the audio path is appended after these
    #[serde(default)]
    pub args: Vec<String>,
    /// Kill the analyzer if it runs longer than this (default: 120)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Maximum analyzer processes running at once (default: 4)
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    /// Where `data:` payloads are written before analysis (default: system temp dir)
    pub temp_dir: Option<PathBuf>,
}

impl AnalyzerConfig {
    /// Analyzer settings with defaults for everything but the command line
    pub fn with_command(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            timeout_secs: DEFAULT_ANALYZER_TIMEOUT_SECS,
            max_concurrent: DEFAULT_MAX_CONCURRENT_ANALYSES,
            temp_dir: None,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.program.trim().is_empty() {
            return Err("analyzer.program must not be empty".to_string());
        }
        if self.timeout_secs == 0 {
            return Err("analyzer.timeout_secs must be greater than 0".to_string());
        }
        if self.max_concurrent == 0 {
            return Err("analyzer.max_concurrent must be greater than 0".to_string());
        }
        if let Some(dir) = &self.temp_dir {
            if !dir.is_dir() {
                return Err(format!(
                    "analyzer.temp_dir '{}' is not a directory",
                    dir.display()
                ));
            }
        }
        Ok(())
    }
}

impl ServerConfig {
    /// Read, parse and validate a TOML config file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml(&content)?;
        config.validate().map_err(ConfigError::Invalid)?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.database_path.as_os_str().is_empty() {
            return Err("database_path must not be empty".to_string());
        }
        if let Some(dir) = &self.static_dir {
            if !dir.is_dir() {
                return Err(format!("static_dir '{}' is not a directory", dir.display()));
            }
        }
        self.analyzer.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_applied() {
        let config = ServerConfig::from_toml(
            r#"
            database_path = "speech.sqlite"

            [analyzer]
            program = "python3"
            "#,
        )
        .unwrap();

        assert_eq!(config.port, 3000);
        assert!(config.static_dir.is_none());
        assert!(config.analyzer.args.is_empty());
        assert_eq!(config.analyzer.timeout_secs, 120);
        assert_eq!(config.analyzer.max_concurrent, 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_full_config() {
        let config = ServerConfig::from_toml(
            r#"
            database_path = "/var/lib/speech/db.sqlite"
            port = 8080

            [analyzer]
            program = "python3"
            args = ["server/audio_analyzer.py"]
            timeout_secs = 30
            max_concurrent = 2
            "#,
        )
        .unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.analyzer.args, vec!["server/audio_analyzer.py"]);
        assert_eq!(config.analyzer.timeout_secs, 30);
        assert_eq!(config.analyzer.max_concurrent, 2);
    }

    #[test]
    fn test_missing_analyzer_section_fails() {
        let result = ServerConfig::from_toml(r#"database_path = "db.sqlite""#);
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_validate_rejects_zero_limits() {
        let mut analyzer = AnalyzerConfig::with_command("python3", vec![]);
        analyzer.timeout_secs = 0;
        assert!(analyzer.validate().unwrap_err().contains("timeout_secs"));

        let mut analyzer = AnalyzerConfig::with_command("python3", vec![]);
        analyzer.max_concurrent = 0;
        assert!(analyzer.validate().unwrap_err().contains("max_concurrent"));

        let analyzer = AnalyzerConfig::with_command("  ", vec![]);
        assert!(analyzer.validate().unwrap_err().contains("program"));
    }
}
