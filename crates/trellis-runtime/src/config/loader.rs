//! Configuration file loader.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, info};
use trellis_core::ConfigError;

/// Configuration loader with support for multiple search paths.
pub struct ConfigLoader {
    search_paths: Vec<PathBuf>,
}

impl ConfigLoader {
    /// Creates a loader with no search paths.
    pub fn new() -> Self {
        Self {
            search_paths: Vec::new(),
        }
    }

    /// Adds a search path for configuration files.
    pub fn add_search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    /// Adds the current directory to the search paths.
    pub fn with_current_dir(self) -> Self {
        if let Ok(cwd) = std::env::current_dir() {
            self.add_search_path(cwd)
        } else {
            self
        }
    }

    /// Adds the user config directory (`<config>/trellis`) to the search
    /// paths.
    pub fn with_user_config_dir(self) -> Self {
        if let Some(config_dir) = dirs::config_dir() {
            self.add_search_path(config_dir.join("trellis"))
        } else {
            self
        }
    }

    /// Loads the first configuration file found, or an empty document.
    pub fn load(&self) -> Result<Value, ConfigError> {
        if let Some(path) = self.find_config_file() {
            return self.load_from_file(&path);
        }
        info!("no configuration file found, using defaults");
        Ok(Value::Null)
    }

    /// Loads configuration from a specific file.
    pub fn load_from_file<P: AsRef<Path>>(&self, path: P) -> Result<Value, ConfigError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading configuration");
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        self.load_from_str(&content)
    }

    /// Loads configuration from a YAML string.
    pub fn load_from_str(&self, yaml: &str) -> Result<Value, ConfigError> {
        let expanded = expand_env_vars(yaml);
        let parsed: serde_yaml::Value =
            serde_yaml::from_str(&expanded).map_err(|e| ConfigError::Parse(e.to_string()))?;
        serde_json::to_value(parsed).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Finds the first available configuration file.
    fn find_config_file(&self) -> Option<PathBuf> {
        const CONFIG_NAMES: &[&str] = &["trellis.yaml", "trellis.yml", "config.yaml", "config.yml"];
        for search_path in &self.search_paths {
            for name in CONFIG_NAMES {
                let path = search_path.join(name);
                debug!(path = %path.display(), "checking for config file");
                if path.exists() {
                    info!(path = %path.display(), "found configuration file");
                    return Some(path);
                }
            }
        }
        None
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new().with_current_dir().with_user_config_dir()
    }
}

/// Expands `${VAR_NAME}` and `${VAR_NAME:-default}` references.
fn expand_env_vars(content: &str) -> String {
    let re = regex_lite::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)(:-([^}]*))?\}")
        .expect("env var pattern is valid");
    let mut result = content.to_string();
    for cap in re.captures_iter(content) {
        let full_match = cap.get(0).map(|m| m.as_str()).unwrap_or_default();
        let Some(var_name) = cap.get(1).map(|m| m.as_str()) else {
            continue;
        };
        let default_value = cap.get(3).map(|m| m.as_str());
        let value = std::env::var(var_name)
            .ok()
            .or_else(|| default_value.map(String::from))
            .unwrap_or_default();
        result = result.replace(full_match, &value);
    }
    result
}

/// Loads configuration with the default search paths.
pub fn load_document() -> Result<Value, ConfigError> {
    ConfigLoader::default().load()
}

/// Loads configuration from a specific file.
pub fn load_document_from_file<P: AsRef<Path>>(path: P) -> Result<Value, ConfigError> {
    ConfigLoader::new().load_from_file(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_yaml_yields_null_document() {
        let doc = ConfigLoader::new().load_from_str("").unwrap();
        assert!(doc.is_null());
    }

    #[test]
    fn parses_component_namespace_tree() {
        let yaml = r#"
mq:
  socket:
    - name: bus
      url: tcp://127.0.0.1:5680
      socket_type: pull
"#;
        let doc = ConfigLoader::new().load_from_str(yaml).unwrap();
        assert_eq!(doc["mq"]["socket"][0]["name"], "bus");
    }

    #[test]
    fn env_var_expansion_with_default() {
        let yaml = "mq:\n  socket:\n    - url: ${TRELLIS_TEST_MISSING_URL:-tcp://fallback:1}\n";
        let doc = ConfigLoader::new().load_from_str(yaml).unwrap();
        assert_eq!(doc["mq"]["socket"][0]["url"], "tcp://fallback:1");
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = ConfigLoader::new()
            .load_from_file("/nonexistent/trellis.yaml")
            .unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }
}
