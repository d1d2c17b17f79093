use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration for image-stamp.
///
/// Controls how user metadata is merged with the source image's metadata,
/// how untrusted payloads are redacted, and where stamped files are written.
///
/// # Loading
///
/// ```rust,no_run
/// use image_stamp::config::{Config, MergeMode};
///
/// // From a JSON file
/// let config = Config::load(Some("config.json".as_ref())).unwrap();
///
/// // Or use defaults and customize
/// let mut config = Config::default();
/// config.policy.merge_mode = MergeMode::ReplaceAll;
/// config.policy.redaction_patterns.push("javascript:".into());
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Merge, trust and redaction rules.
    pub policy: PolicyConfig,
    /// Output behavior (dry run, file naming).
    pub output: OutputConfig,
}

/// How user-supplied metadata combines with the source image's metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeMode {
    /// Start from the original; user keys overwrite on conflict.
    #[default]
    Merge,
    /// Any non-empty user metadata discards the original entirely.
    ReplaceAll,
}

/// Rules applied by [`resolve`](crate::metadata::resolve).
///
/// # Example
///
/// ```rust
/// use image_stamp::config::{MergeMode, PolicyConfig};
///
/// let policy = PolicyConfig {
///     merge_mode: MergeMode::Merge,
///     payload_key: "UserComment".into(),
///     redaction_marker: "[REDACTED]".into(),
///     redaction_patterns: vec!["<script".into(), "onerror=".into()],
///     trust_literals: vec!["on".into(), "true".into()],
/// };
/// assert_eq!(policy.payload_key, "UserComment");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    pub merge_mode: MergeMode,
    /// Reserved key the embedded payload is stored under.
    pub payload_key: String,
    /// Placeholder written in place of untrusted or disallowed content.
    pub redaction_marker: String,
    /// Case-insensitive substrings that mark a value as executable content.
    pub redaction_patterns: Vec<String>,
    /// Raw field values accepted as an explicit trust opt-in.
    pub trust_literals: Vec<String>,
}

/// Output and behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// If `true`, resolve and inject in memory without writing any files.
    pub dry_run: bool,
    /// Stamped files are named `<stem>.<suffix>.<ext>`.
    pub suffix: String,
    /// Directory for stamped files. Defaults to the input file's directory.
    pub out_dir: Option<PathBuf>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            merge_mode: MergeMode::Merge,
            payload_key: "UserComment".to_string(),
            redaction_marker: "[REDACTED]".to_string(),
            redaction_patterns: vec!["<script".to_string()],
            trust_literals: vec!["on".to_string(), "true".to_string()],
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dry_run: false,
            suffix: "stamped".to_string(),
            out_dir: None,
        }
    }
}

impl Config {
    /// Resolve the config file path: same directory as the executable.
    pub fn config_path() -> Result<PathBuf> {
        let exe_path = std::env::current_exe().context("Failed to get executable path")?;
        let exe_dir = exe_path
            .parent()
            .context("Failed to get executable directory")?;
        Ok(exe_dir.join("config.json"))
    }

    /// Load config from the given path, or from the default location.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_path()?,
        };

        if !config_path.exists() {
            log::warn!(
                "Config file not found at {}. Using defaults.",
                config_path.display()
            );
            return Ok(Self::default());
        }

        let contents =
            std::fs::read_to_string(&config_path).context("Failed to read config file")?;
        let config: Config =
            serde_json::from_str(&contents).context("Failed to parse config file")?;
        Ok(config)
    }

    /// Save config to the given path, or to the default location.
    pub fn save(&self, path: Option<&Path>) -> Result<()> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_path()?,
        };

        let contents = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(&config_path, contents).context("Failed to write config file")?;
        log::info!("Config saved to {}", config_path.display());
        Ok(())
    }
}
