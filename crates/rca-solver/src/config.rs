//! Solver configuration: built-in defaults, an optional TOML file, then
//! `SOLVER_*` environment overrides (env > file > defaults).

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("missing API key (set `api_key` or SOLVER_API_KEY)")]
    MissingApiKey,

    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
}

/// Oracle retry and persistence tuning.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EscalationSettings {
    /// Oracle attempts per task before it is marked failed.
    pub max_attempts: u32,
    /// Batch retry rounds over failed tasks.
    pub retry_rounds: u32,
    pub retry_pause_secs: u64,
    /// Flush the checkpoint after this many completions.
    pub checkpoint_every: usize,
    pub connect_timeout_secs: u64,
    /// Longest silence tolerated while waiting on the response.
    pub read_timeout_secs: u64,
    /// Case text beyond this many characters is cut from the prompt.
    pub prompt_char_limit: usize,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for EscalationSettings {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            retry_rounds: 3,
            retry_pause_secs: 5,
            checkpoint_every: 10,
            connect_timeout_secs: 15,
            read_timeout_secs: 90,
            prompt_char_limit: 5000,
            temperature: 0.1,
            max_tokens: 10_000,
        }
    }
}

impl EscalationSettings {
    pub fn retry_pause(&self) -> Duration {
        Duration::from_secs(self.retry_pause_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }
}

/// Top-level solver configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    pub api_key: String,
    pub model: String,
    /// OpenAI-compatible chat completions endpoint.
    pub api_url: String,
    /// Sent as `HTTP-Referer`; some gateways require it.
    pub referer: String,
    /// Oracle worker pool size.
    pub max_workers: usize,
    pub output_dir: PathBuf,
    /// Input dataset (`ID`, `question`).
    pub test_file: PathBuf,
    /// Labeled cases for the case library (`ID`, `question`, `answer`).
    pub train_file: Option<PathBuf>,
    pub case_file: Option<PathBuf>,
    pub escalation: EscalationSettings,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "qwen/qwen3-32b".into(),
            api_url: "https://openrouter.ai/api/v1/chat/completions".into(),
            referer: "https://localhost".into(),
            max_workers: 8,
            output_dir: PathBuf::from("output"),
            test_file: PathBuf::from("phase_2_test.csv"),
            train_file: None,
            case_file: None,
            escalation: EscalationSettings::default(),
        }
    }
}

impl SolverConfig {
    /// Load from `path` (if any), apply process environment overrides, validate.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Apply `SOLVER_*` overrides from `lookup`. Empty values are ignored.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("SOLVER_API_KEY") {
            self.api_key = v;
        }
        if let Some(v) = get("SOLVER_MODEL") {
            self.model = v;
        }
        if let Some(v) = get("SOLVER_API_URL") {
            self.api_url = v;
        }
        if let Some(v) = get("SOLVER_MAX_WORKERS") {
            self.max_workers = v.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: "SOLVER_MAX_WORKERS",
                value: v.clone(),
            })?;
        }
        if let Some(v) = get("SOLVER_OUTPUT_DIR") {
            self.output_dir = PathBuf::from(v);
        }
        if let Some(v) = get("SOLVER_TEST_FILE") {
            self.test_file = PathBuf::from(v);
        }
        if let Some(v) = get("SOLVER_TRAIN_FILE") {
            self.train_file = Some(PathBuf::from(v));
        }
        if let Some(v) = get("SOLVER_CASE_FILE") {
            self.case_file = Some(PathBuf::from(v));
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_key.trim().is_empty() {
            return Err(ConfigError::MissingApiKey);
        }
        if self.max_workers == 0 {
            return Err(ConfigError::InvalidValue {
                key: "max_workers",
                value: "0".into(),
            });
        }
        if self.escalation.max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                key: "escalation.max_attempts",
                value: "0".into(),
            });
        }
        if self.escalation.checkpoint_every == 0 {
            return Err(ConfigError::InvalidValue {
                key: "escalation.checkpoint_every",
                value: "0".into(),
            });
        }
        Ok(())
    }

    pub fn progress_path(&self) -> PathBuf {
        self.output_dir.join("progress.json")
    }

    pub fn solve_log_path(&self) -> PathBuf {
        self.output_dir.join("solve_log.jsonl")
    }

    pub fn case_cache_path(&self) -> PathBuf {
        self.output_dir.join("case_cache.json")
    }

    pub fn submission_path(&self) -> PathBuf {
        self.output_dir.join("submission.csv")
    }
}
