//! Swarm configuration
//!
//! Built once at startup and passed explicitly into every stage. Values
//! come from defaults, then an optional TOML file, then environment
//! overrides.

use crate::error::ConfigError;
use crate::inference::{AgentRole, GenerationConfig};
use crate::prompts;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable holding the inference API key
pub const API_KEY_ENV: &str = "GOOGLE_API_KEY";
/// Environment override for the model name
pub const MODEL_ENV: &str = "SWARM_MODEL";
/// Environment override for the experiment log path
pub const LOG_PATH_ENV: &str = "SWARM_LOG_PATH";
/// Environment override for the sandbox root
pub const SANDBOX_ENV: &str = "SWARM_SANDBOX";

/// Quality-score floors used by the verdict threshold engine
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Scores below this force FAIL
    pub fail_below: f64,
    /// Scores at or above this (with passing or unknown tests) force PASS
    pub pass_at: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            fail_below: 7.0,
            pass_at: 8.0,
        }
    }
}

/// System instructions per role
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptSet {
    /// Auditor instruction
    pub auditor: String,
    /// Fixer instruction
    pub fixer: String,
    /// Judge instruction
    pub judge: String,
}

impl Default for PromptSet {
    fn default() -> Self {
        Self {
            auditor: prompts::AUDITOR_SYSTEM_PROMPT.to_string(),
            fixer: prompts::FIXER_SYSTEM_PROMPT.to_string(),
            judge: prompts::JUDGE_SYSTEM_PROMPT.to_string(),
        }
    }
}

/// Swarm configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SwarmConfig {
    /// Model identifier sent with every request
    pub model: String,
    /// Auditor sampling
    pub auditor: GenerationConfig,
    /// Fixer sampling
    pub fixer: GenerationConfig,
    /// Judge sampling
    pub judge: GenerationConfig,
    /// Upper bound on one inference call
    pub inference_timeout_secs: u64,
    /// Attempts per issue, and RETRY rounds per file
    pub max_retries: u32,
    /// Verdict floors
    pub thresholds: Thresholds,
    /// Maximum characters of file content put in a prompt
    pub prompt_budget_chars: usize,
    /// Static-analysis findings forwarded to the oracle
    pub max_tool_issues: usize,
    /// Fixes reported with lower confidence ask for clarification instead
    pub min_fix_confidence: f64,
    /// Experiment log file
    pub log_path: PathBuf,
    /// Directory the workspace may touch
    pub sandbox_root: PathBuf,
    /// System instructions
    pub prompts: PromptSet,
}

impl Default for SwarmConfig {
    fn default() -> Self {
        Self {
            model: "gemini-2.5-flash".to_string(),
            auditor: GenerationConfig::new(0.1, 4000),
            fixer: GenerationConfig::new(0.2, 4000),
            judge: GenerationConfig::new(0.1, 2000),
            inference_timeout_secs: 60,
            max_retries: 3,
            thresholds: Thresholds::default(),
            prompt_budget_chars: 24_000,
            max_tool_issues: 5,
            min_fix_confidence: 0.7,
            log_path: PathBuf::from(swarm_log::DEFAULT_LOG_PATH),
            sandbox_root: PathBuf::from("sandbox"),
            prompts: PromptSet::default(),
        }
    }
}

impl SwarmConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With model
    #[inline]
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// With max retries
    #[inline]
    #[must_use]
    pub fn with_max_retries(mut self, max: u32) -> Self {
        self.max_retries = max;
        self
    }

    /// With inference timeout
    #[inline]
    #[must_use]
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.inference_timeout_secs = secs;
        self
    }

    /// With thresholds
    #[inline]
    #[must_use]
    pub fn with_thresholds(mut self, thresholds: Thresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// With experiment log path
    #[inline]
    #[must_use]
    pub fn with_log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_path = path.into();
        self
    }

    /// With sandbox root
    #[inline]
    #[must_use]
    pub fn with_sandbox_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.sandbox_root = root.into();
        self
    }

    /// Sampling settings for a role
    #[inline]
    #[must_use]
    pub fn generation(&self, role: AgentRole) -> GenerationConfig {
        match role {
            AgentRole::Auditor => self.auditor,
            AgentRole::Fixer => self.fixer,
            AgentRole::Judge => self.judge,
        }
    }

    /// System instruction for a role
    #[inline]
    #[must_use]
    pub fn system_prompt(&self, role: AgentRole) -> &str {
        match role {
            AgentRole::Auditor => &self.prompts.auditor,
            AgentRole::Fixer => &self.prompts.fixer,
            AgentRole::Judge => &self.prompts.judge,
        }
    }

    /// Inference timeout as a duration
    #[inline]
    #[must_use]
    pub fn inference_timeout(&self) -> Duration {
        Duration::from_secs(self.inference_timeout_secs)
    }

    /// Parse TOML; absent keys keep their defaults
    ///
    /// # Errors
    /// `ConfigError::Parse` on malformed TOML, `ConfigError::Invalid` on
    /// inconsistent values.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults, then `path` if given, then process environment
    ///
    /// # Errors
    /// `ConfigError` if the file cannot be read or is invalid.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })?;
                Self::from_toml_str(&text)?
            }
            None => Self::default(),
        };
        let config = config.with_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        tracing::debug!(model = %config.model, log = %config.log_path.display(), "configuration loaded");
        Ok(config)
    }

    /// Apply overrides from an environment lookup
    #[must_use]
    pub fn with_env_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(model) = non_empty(MODEL_ENV) {
            self.model = model;
        }
        if let Some(path) = non_empty(LOG_PATH_ENV) {
            self.log_path = PathBuf::from(path);
        }
        if let Some(root) = non_empty(SANDBOX_ENV) {
            self.sandbox_root = PathBuf::from(root);
        }
        self
    }

    /// Check value consistency
    ///
    /// # Errors
    /// `ConfigError::Invalid` naming the first bad setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.model.trim().is_empty() {
            return Err(ConfigError::Invalid("model must not be empty".into()));
        }
        if self.max_retries == 0 {
            return Err(ConfigError::Invalid("max_retries must be at least 1".into()));
        }
        if self.inference_timeout_secs == 0 {
            return Err(ConfigError::Invalid("inference_timeout_secs must be positive".into()));
        }
        if self.thresholds.fail_below > self.thresholds.pass_at {
            return Err(ConfigError::Invalid(format!(
                "thresholds.fail_below ({}) exceeds thresholds.pass_at ({})",
                self.thresholds.fail_below, self.thresholds.pass_at
            )));
        }
        if !(0.0..=1.0).contains(&self.min_fix_confidence) {
            return Err(ConfigError::Invalid("min_fix_confidence must be within [0, 1]".into()));
        }
        Ok(())
    }
}

/// Inference credentials
#[derive(Clone)]
pub struct Credentials {
    api_key: String,
}

impl Credentials {
    /// Create from a key
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
        }
    }

    /// Read `GOOGLE_API_KEY` from the process environment
    ///
    /// # Errors
    /// `ConfigError::MissingCredentials` when unset or blank.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read `GOOGLE_API_KEY` through a lookup function
    ///
    /// # Errors
    /// `ConfigError::MissingCredentials` when unset or blank.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        lookup(API_KEY_ENV)
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .map(Self::new)
            .ok_or(ConfigError::MissingCredentials(API_KEY_ENV))
    }

    /// The API key
    #[inline]
    #[must_use]
    pub fn api_key(&self) -> &str {
        &self.api_key
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials").field("api_key", &"<redacted>").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_match_stage_settings() {
        let config = SwarmConfig::default();
        assert_eq!(config.generation(AgentRole::Auditor), GenerationConfig::new(0.1, 4000));
        assert_eq!(config.generation(AgentRole::Fixer), GenerationConfig::new(0.2, 4000));
        assert_eq!(config.generation(AgentRole::Judge), GenerationConfig::new(0.1, 2000));
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.inference_timeout(), Duration::from_secs(60));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = SwarmConfig::from_toml_str(
            r#"
            model = "gemini-2.0-flash"
            max_retries = 5

            [thresholds]
            pass_at = 9.0
            "#,
        )
        .unwrap();
        assert_eq!(config.model, "gemini-2.0-flash");
        assert_eq!(config.max_retries, 5);
        assert!((config.thresholds.pass_at - 9.0).abs() < f64::EPSILON);
        assert!((config.thresholds.fail_below - 7.0).abs() < f64::EPSILON);
        assert_eq!(config.prompt_budget_chars, 24_000);
    }

    #[test]
    fn inverted_thresholds_are_rejected() {
        let err = SwarmConfig::from_toml_str("[thresholds]\nfail_below = 9.0\npass_at = 8.0\n")
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("swarm.toml");
        std::fs::write(&path, "max_retries = 2\nprompt_budget_chars = 8000\n").unwrap();

        let config = SwarmConfig::load(Some(&path)).unwrap();
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.prompt_budget_chars, 8000);

        let missing = SwarmConfig::load(Some(&dir.path().join("absent.toml"))).unwrap_err();
        assert!(matches!(missing, ConfigError::Read { .. }));
    }

    #[test]
    fn env_overrides_apply() {
        let env: HashMap<&str, &str> = [(MODEL_ENV, "m2"), (SANDBOX_ENV, "/tmp/box"), (LOG_PATH_ENV, " ")]
            .into_iter()
            .collect();
        let config = SwarmConfig::default()
            .with_env_overrides(|k| env.get(k).map(|v| (*v).to_string()));
        assert_eq!(config.model, "m2");
        assert_eq!(config.sandbox_root, PathBuf::from("/tmp/box"));
        assert_eq!(config.log_path, PathBuf::from(swarm_log::DEFAULT_LOG_PATH));
    }

    #[test]
    fn missing_credentials_are_fatal() {
        assert!(matches!(
            Credentials::from_lookup(|_| None),
            Err(ConfigError::MissingCredentials(API_KEY_ENV))
        ));
        assert!(Credentials::from_lookup(|_| Some("  ".into())).is_err());
        let creds = Credentials::from_lookup(|_| Some("secret".into())).unwrap();
        assert_eq!(creds.api_key(), "secret");
        assert!(!format!("{creds:?}").contains("secret"));
    }
}
