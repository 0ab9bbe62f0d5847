//! Session configuration loaded from a TOML file.

use crate::error::ShellError;
use crate::external::DEFAULT_OUTPUT_LIMIT;
use directories::BaseDirs;
use serde::Deserialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "DIMUTILS_CONFIG";

const APP_DIR: &str = "dimutils";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ShellConfig {
    /// Prompt shown when the interactive buffer is empty.
    pub prompt: String,
    /// Prompt shown while an incomplete program is being continued.
    pub continuation_prompt: String,
    /// Maximum bytes an external command may write before it is killed.
    pub output_limit: usize,
    /// Maximum bytes of interactive input buffered while waiting for a
    /// program to become complete.
    pub max_pending_input: usize,
    /// Keep line-editor history between interactive sessions.
    pub history: bool,
    /// History file; defaults to [`ShellConfig::history_path`].
    pub history_file: Option<PathBuf>,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            prompt: "dim > ".to_string(),
            continuation_prompt: "> ".to_string(),
            output_limit: DEFAULT_OUTPUT_LIMIT,
            max_pending_input: 1024 * 1024,
            history: true,
            history_file: None,
        }
    }
}

impl ShellConfig {
    /// Load the config named by `$DIMUTILS_CONFIG`, or the per-user default
    /// file, or fall back to defaults when the latter does not exist.
    pub fn load() -> Result<Self, ShellError> {
        let explicit = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
        Self::load_from(explicit.as_deref(), Self::default_path().as_deref())
    }

    /// An `explicit` path must exist; a missing `fallback` means defaults.
    pub fn load_from(explicit: Option<&Path>, fallback: Option<&Path>) -> Result<Self, ShellError> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        match fallback {
            Some(path) if path.exists() => Self::from_file(path),
            _ => {
                debug!("no config file, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ShellError> {
        debug!(path = %path.display(), "loading config");
        let text = fs::read_to_string(path).map_err(|e: io::Error| ShellError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::parse(&text).map_err(|message| ShellError::Config {
            path: path.to_path_buf(),
            message,
        })
    }

    /// Parse TOML text. The error is a human-readable description.
    pub fn parse(text: &str) -> Result<Self, String> {
        toml::from_str(text).map_err(|e| e.message().to_string())
    }

    /// `<config dir>/dimutils/shell.toml`
    pub fn default_path() -> Option<PathBuf> {
        BaseDirs::new().map(|dirs| dirs.config_dir().join(APP_DIR).join("shell.toml"))
    }

    /// The configured history file, or `<data dir>/dimutils/history.txt`.
    pub fn history_path(&self) -> Option<PathBuf> {
        self.history_file.clone().or_else(|| {
            BaseDirs::new().map(|dirs| dirs.data_dir().join(APP_DIR).join("history.txt"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults() {
        let config = ShellConfig::default();
        assert_eq!(config.prompt, "dim > ");
        assert_eq!(config.continuation_prompt, "> ");
        assert_eq!(config.output_limit, 2 * 1024 * 1024);
        assert!(config.history);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let config = ShellConfig::parse("prompt = \"$ \"\noutput_limit = 4096\n").unwrap();
        assert_eq!(config.prompt, "$ ");
        assert_eq!(config.output_limit, 4096);
        assert_eq!(config.continuation_prompt, "> ");
        assert_eq!(config.max_pending_input, 1024 * 1024);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = ShellConfig::parse("promt = \"x\"").unwrap_err();
        assert!(err.contains("promt"), "{err}");
    }

    #[test]
    fn missing_fallback_means_defaults() {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("shell.toml");
        let config = ShellConfig::load_from(None, Some(&missing)).unwrap();
        assert_eq!(config, ShellConfig::default());
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("nope.toml");
        let err = ShellConfig::load_from(Some(&missing), None).unwrap_err();
        assert!(matches!(err, ShellError::Config { ref path, .. } if path == &missing));
    }

    #[test]
    fn malformed_file_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("shell.toml");
        fs::write(&path, "history = \"yes\"").unwrap();
        let err = ShellConfig::load_from(None, Some(&path)).unwrap_err();
        assert!(err.to_string().starts_with("config "), "{err}");
    }

    #[test]
    fn explicit_history_file_wins() {
        let config = ShellConfig::parse("history_file = \"/tmp/h.txt\"").unwrap();
        assert_eq!(config.history_path(), Some(PathBuf::from("/tmp/h.txt")));
    }
}
