//! Configuration file support for the annotation engine.
//!
//! Handle sizes, commit defaults and log verbosity can be tuned from a JSON
//! file. Missing fields fall back to defaults so older files keep loading.

use serde::{Deserialize, Serialize};

/// Log level setting for the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Show only errors
    Error,
    /// Show errors and warnings
    Warn,
    /// Show errors, warnings, and info messages
    #[default]
    Info,
    /// Show debug-level logging
    Debug,
    /// Show all log messages including trace
    Trace,
}

impl LogLevel {
    /// Convert to log crate's LevelFilter.
    pub fn to_level_filter(&self) -> log::LevelFilter {
        match self {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Current configuration file format version.
/// Increment this when making breaking changes to the config format.
pub const CONFIG_VERSION: u32 = 1;

/// Editor configuration that can be exported and imported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditorConfig {
    /// Version of the configuration file format
    pub version: u32,

    /// Vertex handle sizing
    #[serde(default)]
    pub handles: HandleConfig,

    /// Defaults applied when shapes are committed
    #[serde(default)]
    pub commit: CommitConfig,

    /// Log verbosity level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Vertex handle sizes, in screen pixels at zoom 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandleConfig {
    /// Radius of the first vertex of a ring (the closing target)
    #[serde(default = "default_first_vertex_radius")]
    pub first_vertex_radius: f32,

    /// Radius of every other vertex
    #[serde(default = "default_vertex_radius")]
    pub vertex_radius: f32,

    /// Multiplier applied to the hovered vertex until the pointer leaves it
    #[serde(default = "default_hover_scale")]
    pub hover_scale: f32,

    /// Zoom factors below this are clamped when scaling handles
    #[serde(default = "default_min_zoom")]
    pub min_zoom: f32,
}

fn default_first_vertex_radius() -> f32 {
    6.0
}

fn default_vertex_radius() -> f32 {
    4.0
}

fn default_hover_scale() -> f32 {
    2.0
}

fn default_min_zoom() -> f32 {
    0.1
}

impl Default for HandleConfig {
    fn default() -> Self {
        Self {
            first_vertex_radius: default_first_vertex_radius(),
            vertex_radius: default_vertex_radius(),
            hover_scale: default_hover_scale(),
            min_zoom: default_min_zoom(),
        }
    }
}

/// Defaults used when turning a shape into an item object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitConfig {
    /// Confidence recorded on manually created boxes
    #[serde(default = "default_confidence")]
    pub default_confidence: f32,

    /// Source identifier recorded on manually created objects
    #[serde(default = "default_source_id")]
    pub source_id: String,

    /// Source identifier recorded on objects whose mask came from a model
    #[serde(default = "default_model_source_id")]
    pub model_source_id: String,

    /// Also store committed polygons as rasterized masks
    #[serde(default)]
    pub polygon_as_mask: bool,
}

fn default_confidence() -> f32 {
    1.0
}

fn default_source_id() -> String {
    "manual".to_string()
}

fn default_model_source_id() -> String {
    "model".to_string()
}

impl Default for CommitConfig {
    fn default() -> Self {
        Self {
            default_confidence: default_confidence(),
            source_id: default_source_id(),
            model_source_id: default_model_source_id(),
            polygon_as_mask: false,
        }
    }
}

impl EditorConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self {
            version: CONFIG_VERSION,
            handles: HandleConfig::default(),
            commit: CommitConfig::default(),
            log_level: LogLevel::default(),
        }
    }

    /// Serialize the configuration to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;

        if config.version > CONFIG_VERSION {
            return Err(ConfigError::VersionTooNew {
                file_version: config.version,
                supported_version: CONFIG_VERSION,
            });
        }

        Ok(config)
    }

    /// Load configuration from a file.
    pub fn load(path: &std::path::Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        let config = Self::from_json(&json)?;
        log::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save configuration to a file, creating parent directories as needed.
    pub fn save(&self, path: &std::path::Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_json()?)?;
        log::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Get the default filename for the config file.
    pub fn default_filename() -> &'static str {
        "shape-annotator.json"
    }

    /// Get the default config file path.
    pub fn default_path() -> Option<std::path::PathBuf> {
        if let Some(config_dir) = dirs::config_dir() {
            Some(config_dir.join("shape-annotator").join(Self::default_filename()))
        } else {
            dirs::home_dir().map(|home_dir| {
                home_dir
                    .join(".config")
                    .join("shape-annotator")
                    .join(Self::default_filename())
            })
        }
    }

    /// Try to load configuration from the default path.
    /// Returns None if the file doesn't exist or can't be read.
    pub fn load_from_default_path() -> Option<Self> {
        let path = Self::default_path()?;
        if !path.exists() {
            log::debug!("No config file found at {:?}", path);
            return None;
        }

        match Self::load(&path) {
            Ok(config) => Some(config),
            Err(e) => {
                log::warn!("Failed to load config file {:?}: {}", path, e);
                None
            }
        }
    }
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// JSON parsing error
    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] serde_json::Error),

    /// Configuration version is newer than supported
    #[error(
        "Configuration file version {file_version} is newer than supported version {supported_version}"
    )]
    VersionTooNew {
        file_version: u32,
        supported_version: u32,
    },

    /// I/O error when reading/writing config
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_handle_sizes() {
        let config = EditorConfig::default();
        assert_eq!(config.handles.first_vertex_radius, 6.0);
        assert_eq!(config.handles.vertex_radius, 4.0);
        assert_eq!(config.handles.hover_scale, 2.0);
        assert_eq!(config.commit.default_confidence, 1.0);
        assert!(!config.commit.polygon_as_mask);
    }

    #[test]
    fn test_json_round_trip() {
        let mut config = EditorConfig::default();
        config.commit.polygon_as_mask = true;
        config.log_level = LogLevel::Debug;

        let json = config.to_json().unwrap();
        assert!(json.contains("\"log_level\": \"debug\""));
        assert_eq!(EditorConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let config = EditorConfig::from_json(r#"{"version": 1, "handles": {"vertex_radius": 5.0}}"#)
            .unwrap();
        assert_eq!(config.handles.vertex_radius, 5.0);
        assert_eq!(config.handles.first_vertex_radius, 6.0);
        assert_eq!(config.commit, CommitConfig::default());
    }

    #[test]
    fn test_newer_version_rejected() {
        let err = EditorConfig::from_json(r#"{"version": 99}"#).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::VersionTooNew {
                file_version: 99,
                ..
            }
        ));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = EditorConfig::default();
        config.save(&path).unwrap();
        assert_eq!(EditorConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_level_filter() {
        assert_eq!(LogLevel::Warn.to_level_filter(), log::LevelFilter::Warn);
    }
}
