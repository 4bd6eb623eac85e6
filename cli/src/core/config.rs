//! Application configuration
//!
//! Layering: CLI flags override environment variables, which override the
//! JSON config file, which overrides compiled defaults. Credentials only
//! ever come from the environment.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::constants::{CONFIG_FILE_NAME, DEFAULT_CACHE_DIR, ENV_ISSUE_SERVER};
use crate::data::error::DataError;
use crate::data::types::ChannelRef;

// =============================================================================
// Config file shapes
// =============================================================================

/// One configured channel target
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChannelEntry {
    pub name: String,
    pub id: String,
}

/// Object-store mirror target. Parsed and surfaced; mirroring itself is an
/// external collaborator.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StorageFileConfig {
    #[serde(default)]
    pub bucket: Option<String>,
    #[serde(default)]
    pub prefix: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub profile: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct JiraFileConfig {
    #[serde(default)]
    pub server: Option<String>,
}

/// The on-disk config file
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct FileConfig {
    #[serde(default)]
    pub channels: Vec<ChannelEntry>,
    #[serde(default)]
    pub storage: Option<StorageFileConfig>,
    #[serde(default)]
    pub jira: Option<JiraFileConfig>,
}

// =============================================================================
// Resolved configuration
// =============================================================================

/// Fully resolved application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub cache_root: PathBuf,
    /// Default ingestion targets when none are given on the command line
    pub channels: Vec<ChannelRef>,
    /// Issue-tracker base URL; the config file overrides `ISSUE_SERVER`
    pub jira_server: Option<String>,
    pub storage: Option<StorageFileConfig>,
}

impl AppConfig {
    /// Load and resolve configuration. An explicitly given config path must
    /// exist; the default path is optional.
    pub fn load(
        config_path: Option<&Path>,
        cache_path: Option<&Path>,
    ) -> Result<Self, DataError> {
        let file = match config_path {
            Some(path) => {
                if !path.is_file() {
                    return Err(DataError::Config(format!(
                        "Config file not found: {}",
                        path.display()
                    )));
                }
                Self::read_file(path)?
            }
            None => {
                let default = PathBuf::from(CONFIG_FILE_NAME);
                if default.is_file() {
                    Self::read_file(&default)?
                } else {
                    FileConfig::default()
                }
            }
        };

        let jira_server = file
            .jira
            .as_ref()
            .and_then(|j| j.server.clone())
            .or_else(|| std::env::var(ENV_ISSUE_SERVER).ok())
            .filter(|s| !s.is_empty());

        Ok(Self {
            cache_root: cache_path
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CACHE_DIR)),
            channels: file
                .channels
                .iter()
                .map(|c| ChannelRef::new(c.id.clone(), Some(c.name.clone())))
                .collect(),
            jira_server,
            storage: file.storage,
        })
    }

    fn read_file(path: &Path) -> Result<FileConfig, DataError> {
        let content = fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            DataError::Config(format!("Malformed config file {}: {e}", path.display()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_defaults_without_file() {
        let config = AppConfig::load(None, None).unwrap();
        assert_eq!(config.cache_root, PathBuf::from(DEFAULT_CACHE_DIR));
        assert!(config.channels.is_empty());
    }

    #[test]
    fn test_explicit_missing_file_is_config_error() {
        let err = AppConfig::load(Some(Path::new("/nonexistent/tv.json")), None).unwrap_err();
        assert!(matches!(err, DataError::Config(_)));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_load_file_with_channels_and_jira() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "channels": [{{"name": "eng", "id": "C123"}}],
                "jira": {{"server": "https://issues.example.com"}},
                "storage": {{"bucket": "archive", "prefix": "chat/"}}
            }}"#
        )
        .unwrap();

        let config = AppConfig::load(Some(file.path()), Some(Path::new("/data"))).unwrap();
        assert_eq!(config.cache_root, PathBuf::from("/data"));
        assert_eq!(config.channels.len(), 1);
        assert_eq!(config.channels[0].alias(), "eng");
        assert_eq!(
            config.jira_server.as_deref(),
            Some("https://issues.example.com")
        );
        assert_eq!(
            config.storage.as_ref().unwrap().bucket.as_deref(),
            Some("archive")
        );
    }

    #[test]
    fn test_malformed_file_is_config_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        let err = AppConfig::load(Some(file.path()), None).unwrap_err();
        assert!(matches!(err, DataError::Config(_)));
    }
}
