//! Server configuration.
//!
//! Loaded from a TOML file, then overridden by command-line flags:
//!
//! ```toml
//! root = "/srv/econet"
//! debug = false
//! tie_break = "lowest-suffix"   # or "first-seen"
//! entry_ttl_ms = 1000
//! attr_ttl_ms = 1000
//! read_only = false
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::suffix::TieBreak;

/// Error type for config operations.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("No backing root configured")]
    MissingRoot,

    #[error("Backing root is not a directory: {}", .0.display())]
    NotADirectory(PathBuf),
}

fn default_ttl_ms() -> u64 {
    1000
}

/// Settings for one suffix-transparent view of a directory tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SuffixFsConfig {
    /// Directory on the host whose contents are presented.
    pub root: PathBuf,
    /// Verbose per-lookup logging.
    pub debug: bool,
    /// Which physical name wins when several strip to the same name.
    pub tie_break: TieBreak,
    /// Entry cache validity, in milliseconds.
    #[serde(default = "default_ttl_ms")]
    pub entry_ttl_ms: u64,
    /// Attribute cache validity, in milliseconds.
    #[serde(default = "default_ttl_ms")]
    pub attr_ttl_ms: u64,
    /// Refuse all writes to the store.
    pub read_only: bool,
}

impl Default for SuffixFsConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::new(),
            debug: false,
            tie_break: TieBreak::default(),
            entry_ttl_ms: default_ttl_ms(),
            attr_ttl_ms: default_ttl_ms(),
            read_only: false,
        }
    }
}

impl SuffixFsConfig {
    /// Configuration for `root` with every other setting at its default.
    pub fn for_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    /// Parse a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Read and parse a TOML file.
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = tokio::fs::read_to_string(path).await?;
        Self::from_toml_str(&content)
    }

    /// Check the root and replace it with its canonical form.
    pub fn validate(mut self) -> Result<Self, ConfigError> {
        if self.root.as_os_str().is_empty() {
            return Err(ConfigError::MissingRoot);
        }
        let root = dunce::canonicalize(&self.root)?;
        if !root.is_dir() {
            return Err(ConfigError::NotADirectory(root));
        }
        self.root = root;
        Ok(self)
    }

    pub fn entry_ttl(&self) -> Duration {
        Duration::from_millis(self.entry_ttl_ms)
    }

    pub fn attr_ttl(&self) -> Duration {
        Duration::from_millis(self.attr_ttl_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_apply_to_missing_keys() {
        let config = SuffixFsConfig::from_toml_str(r#"root = "/srv/econet""#).unwrap();
        assert_eq!(config.root, PathBuf::from("/srv/econet"));
        assert_eq!(config.tie_break, TieBreak::LowestSuffix);
        assert_eq!(config.entry_ttl(), Duration::from_secs(1));
        assert_eq!(config.attr_ttl(), Duration::from_secs(1));
        assert!(!config.debug);
        assert!(!config.read_only);
    }

    #[test]
    fn parses_every_field() {
        let config = SuffixFsConfig::from_toml_str(
            r#"
            root = "/data"
            debug = true
            tie_break = "first-seen"
            entry_ttl_ms = 250
            attr_ttl_ms = 0
            read_only = true
            "#,
        )
        .unwrap();
        assert!(config.debug);
        assert!(config.read_only);
        assert_eq!(config.tie_break, TieBreak::FirstSeen);
        assert_eq!(config.entry_ttl(), Duration::from_millis(250));
        assert_eq!(config.attr_ttl(), Duration::ZERO);
    }

    #[test]
    fn rejects_unknown_keys_and_policies() {
        assert!(matches!(
            SuffixFsConfig::from_toml_str("mountpoint = \"/mnt\""),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            SuffixFsConfig::from_toml_str("tie_break = \"random\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn validate_requires_an_existing_directory() {
        assert!(matches!(
            SuffixFsConfig::default().validate(),
            Err(ConfigError::MissingRoot)
        ));

        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("plain");
        std::fs::write(&file, b"").unwrap();
        assert!(matches!(
            SuffixFsConfig::for_root(&file).validate(),
            Err(ConfigError::NotADirectory(_))
        ));
        assert!(matches!(
            SuffixFsConfig::for_root(tmp.path().join("missing")).validate(),
            Err(ConfigError::Io(_))
        ));

        let config = SuffixFsConfig::for_root(tmp.path()).validate().unwrap();
        assert_eq!(config.root, dunce::canonicalize(tmp.path()).unwrap());
    }

    #[tokio::test]
    async fn load_reads_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("suffixfs.toml");
        tokio::fs::write(&path, "root = \"/srv\"\ndebug = true\n")
            .await
            .unwrap();
        let config = SuffixFsConfig::load(&path).await.unwrap();
        assert!(config.debug);
        assert_eq!(config.root, PathBuf::from("/srv"));
    }
}
