//! Editor configuration loaded from TOML.
//!
//! ```toml
//! root_id = "0"
//! id_prefix = "n-"
//! id_length = 12
//! lock_new_layers = true
//! default_wrapper = "user-object"
//! debounce_ms = 300
//! ```

use crate::model::{DEFAULT_ROOT_ID, WrapperKind};
use log::{debug, info};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse TOML configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EditorConfig {
    /// Layer parent used when a document has no root cell yet.
    pub root_id: String,

    /// Prepended to every generated node id.
    pub id_prefix: String,

    pub layer_id_prefix: String,

    /// Length of the random part of generated ids.
    pub id_length: usize,

    /// New layers are created with `locked=1`.
    pub lock_new_layers: bool,

    /// Wrapper flavor used when a bare cell has to be wrapped.
    pub default_wrapper: WrapperKind,

    /// Quiet period before a local edit is sent to the host.
    pub debounce_ms: u64,
}

impl Default for EditorConfig {
    fn default() -> Self {
        EditorConfig {
            root_id: DEFAULT_ROOT_ID.to_string(),
            id_prefix: String::new(),
            layer_id_prefix: "layer-".to_string(),
            id_length: 12,
            lock_new_layers: true,
            default_wrapper: WrapperKind::UserObject,
            debounce_ms: 300,
        }
    }
}

impl EditorConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!(path = path.display().to_string(); "Loading editor configuration");
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Load `path` when given, defaults otherwise.
    pub fn load_or_default(path: Option<impl AsRef<Path>>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => {
                debug!("No configuration file given, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = EditorConfig::from_toml_str("").expect("parse");
        assert_eq!(config, EditorConfig::default());
        assert_eq!(config.debounce(), Duration::from_millis(300));
    }

    #[test]
    fn partial_file_overrides_only_given_keys() {
        let config = EditorConfig::from_toml_str(
            "id_prefix = \"n-\"\ndefault_wrapper = \"object\"\nlock_new_layers = false\n",
        )
        .expect("parse");
        assert_eq!(config.id_prefix, "n-");
        assert_eq!(config.default_wrapper, WrapperKind::Object);
        assert!(!config.lock_new_layers);
        assert_eq!(config.id_length, 12);
    }

    #[test]
    fn unknown_keys_and_bad_types_are_errors() {
        assert!(matches!(
            EditorConfig::from_toml_str("colour = 1"),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            EditorConfig::from_toml_str("id_length = \"long\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let result = EditorConfig::load("/definitely/not/here/editor.toml");
        assert!(matches!(result, Err(ConfigError::Io(_))));
        let none: Option<&str> = None;
        assert!(EditorConfig::load_or_default(none).is_ok());
    }
}
