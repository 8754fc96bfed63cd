//! Configuration for scanning and for the index manager

use crate::error::{IndexError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// File name stem that is never indexed, compared case-insensitively.
pub const EXCLUDED_STEM: &str = "readme";

/// Options for one walk of the prompt tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanOptions {
    /// Index entries whose name starts with a dot
    pub include_hidden: bool,
    /// Directory levels below the root to descend into
    pub max_depth: usize,
    /// Extensions to index, with or without the leading dot
    pub file_extensions: Vec<String>,
    /// Globs matched against root-relative paths
    pub exclude_patterns: Vec<String>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            include_hidden: false,
            max_depth: 10,
            file_extensions: vec![".md".to_string()],
            exclude_patterns: Vec::new(),
        }
    }
}

impl ScanOptions {
    /// True when `file_name` carries one of the configured extensions.
    pub fn matches_extension(&self, file_name: &str) -> bool {
        let lower = file_name.to_lowercase();
        self.file_extensions.iter().any(|ext| {
            let ext = ext.trim().trim_start_matches('.').to_lowercase();
            !ext.is_empty()
                && lower.len() > ext.len() + 1
                && lower.ends_with(&ext)
                && lower[..lower.len() - ext.len()].ends_with('.')
        })
    }

    pub fn is_hidden(&self, name: &str) -> bool {
        !self.include_hidden && name.starts_with('.')
    }
}

/// Main configuration for a prompt index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Quiet period before a debounced rebuild runs
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Maximum file reads in flight during one scan
    #[serde(default = "default_read_concurrency")]
    pub read_concurrency: usize,

    /// Buffered refresh notifications per subscriber
    #[serde(default = "default_notify_capacity")]
    pub notify_capacity: usize,

    #[serde(default)]
    pub scan: ScanOptions,
}

fn default_debounce_ms() -> u64 {
    250
}

fn default_read_concurrency() -> usize {
    16
}

fn default_notify_capacity() -> usize {
    64
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            read_concurrency: default_read_concurrency(),
            notify_capacity: default_notify_capacity(),
            scan: ScanOptions::default(),
        }
    }
}

impl IndexConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| IndexError::io(path, e))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| IndexError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| IndexError::Config(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| IndexError::io(path, e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = IndexConfig::default();
        assert_eq!(config.debounce(), Duration::from_millis(250));
        assert_eq!(config.read_concurrency, 16);
        assert_eq!(config.scan.max_depth, 10);
        assert_eq!(config.scan.file_extensions, vec![".md"]);
        assert!(!config.scan.include_hidden);
        assert!(config.scan.exclude_patterns.is_empty());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = IndexConfig::from_toml(
            r#"
debounce_ms = 50

[scan]
file_extensions = ["md", ".prompt"]
"#,
        )
        .unwrap();
        assert_eq!(config.debounce_ms, 50);
        assert_eq!(config.read_concurrency, 16);
        assert_eq!(config.scan.max_depth, 10);
        assert!(config.scan.matches_extension("a.prompt"));
    }

    #[test]
    fn test_config_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("promptdex.toml");
        let mut config = IndexConfig::default();
        config.scan.exclude_patterns = vec!["archive/**".to_string()];
        config.save(&path).unwrap();
        assert_eq!(IndexConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = IndexConfig::from_toml("debounce_ms = \"soon\"").unwrap_err();
        assert!(matches!(err, IndexError::Config(_)));
    }

    #[test]
    fn test_extension_matching() {
        let options = ScanOptions::default();
        assert!(options.matches_extension("prompt.md"));
        assert!(options.matches_extension("PROMPT.MD"));
        assert!(!options.matches_extension("prompt.mdx"));
        assert!(!options.matches_extension("promptmd"));
        assert!(!options.matches_extension(".md"));
    }

    #[test]
    fn test_hidden_policy() {
        let mut options = ScanOptions::default();
        assert!(options.is_hidden(".git"));
        assert!(!options.is_hidden("visible"));
        options.include_hidden = true;
        assert!(!options.is_hidden(".git"));
    }
}
