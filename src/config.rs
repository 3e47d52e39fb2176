use crate::layout_settings::LayoutSettings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Paths of the remote store, relative to `base_url`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    pub base_url: String,
    pub load_graph: String,
    pub save_graph: String,
    pub save_node: String,
    pub save_link: String,
    pub add_node: String,
    pub add_link: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            load_graph: "/api/getGraph".to_string(),
            save_graph: "/api/save".to_string(),
            save_node: "/api/node".to_string(),
            save_link: "/api/link".to_string(),
            add_node: "/api/node/add".to_string(),
            add_link: "/api/link/add".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    pub endpoints: Endpoints,
    pub layout: LayoutSettings,
    pub request_timeout_secs: u64,
}

impl EditorConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            endpoints: Endpoints::default(),
            layout: LayoutSettings::default(),
            request_timeout_secs: 4,
        }
    }
}

pub fn load_config(path: &Path) -> Result<EditorConfig, ConfigError> {
    let json_str =
        std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

    let mut config: EditorConfig =
        serde_json::from_str(&json_str).map_err(|source| {
            ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            }
        })?;
    config.layout = config.layout.sanitized();

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_config_round_trip_through_file() {
        let mut config = EditorConfig::default();
        config.endpoints.base_url = "http://graph.local:9000".into();
        config.layout.margins.top = 12.0;

        let temp_file =
            std::env::temp_dir().join("layered_graph_config_test.json");
        std::fs::write(&temp_file, serde_json::to_string_pretty(&config).unwrap())
            .expect("Failed to write config");

        let loaded = load_config(&temp_file).expect("Failed to load config");
        assert_eq!(loaded, config);

        std::fs::remove_file(&temp_file).ok();
    }

    #[test]
    fn test_load_config_reports_missing_and_malformed_files() {
        let missing = std::env::temp_dir().join("layered_graph_no_such_config.json");
        assert!(matches!(load_config(&missing), Err(ConfigError::Io { .. })));

        let bad = std::env::temp_dir().join("layered_graph_bad_config.json");
        std::fs::write(&bad, "{ not json").unwrap();
        assert!(matches!(load_config(&bad), Err(ConfigError::Parse { .. })));
        std::fs::remove_file(&bad).ok();
    }

    #[test]
    fn test_empty_object_is_default_config() {
        let config: EditorConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, EditorConfig::default());
        assert_eq!(config.endpoints.load_graph, "/api/getGraph");
    }
}
