//! User configuration and preferences

use crate::domain::DeleteMode;
use crate::error::{DragboxError, Result};
use crate::thumbnail::ThumbnailSize;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_THUMBNAIL_EDGE: u32 = 40;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct UserConfig {
    /// Directory shown when no directory is given on the command line
    pub root_directory: Option<PathBuf>,
    pub thumbnail_width: u32,
    pub thumbnail_height: u32,
    /// How entries are deleted: permanently or via the system trash
    pub delete_mode: DeleteMode,
    /// Log level used when RUST_LOG is not set
    pub log_level: String,
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            root_directory: None,
            thumbnail_width: DEFAULT_THUMBNAIL_EDGE,
            thumbnail_height: DEFAULT_THUMBNAIL_EDGE,
            delete_mode: DeleteMode::default(),
            log_level: "info".to_string(),
        }
    }
}

impl UserConfig {
    /// Get the config file path (~/.config/dragbox/config.json)
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("dragbox").join("config.json"))
    }

    /// Load config from the default location, or defaults if there is none
    pub fn load() -> Result<Self> {
        let path = Self::config_path().ok_or_else(|| {
            DragboxError::ConfigError("Could not determine config directory".to_string())
        })?;
        Self::load_from(&path)
    }

    /// Load config from `path`; a missing file yields the defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path).map_err(|e| {
            DragboxError::ConfigError(format!("Failed to read config file: {}", e))
        })?;

        serde_json::from_str(&contents).map_err(|e| {
            DragboxError::ConfigError(format!("Failed to parse config file: {}", e))
        })
    }

    /// The directory to browse: the configured root, else the user's
    /// documents directory, else the current directory
    pub fn resolve_root(&self) -> PathBuf {
        self.root_directory
            .clone()
            .or_else(dirs::document_dir)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn thumbnail_size(&self) -> ThumbnailSize {
        ThumbnailSize::new(self.thumbnail_width, self.thumbnail_height)
    }
}
