//! Converter configuration

use crate::error::{ConvertError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Config file looked up in the working directory.
pub const CONFIG_FILE: &str = "flowform.toml";

/// Name used when a graph is saved without one.
pub const DEFAULT_GRAPH_NAME: &str = "Untitled questionnaire";

/// Spacing used by layout inference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Horizontal distance between siblings.
    pub spacing_x: f64,
    /// Vertical distance between a parent and its children.
    pub spacing_y: f64,
    /// Columns of the grid used for nodes the traversal never reaches.
    pub grid_columns: usize,
    /// Vertical offset of that grid below the main tree.
    pub grid_offset_y: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        LayoutConfig {
            spacing_x: 300.0,
            spacing_y: 200.0,
            grid_columns: 5,
            grid_offset_y: 600.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvertConfig {
    pub default_name: String,
    /// Write `reactflow` layout payloads into exported records.
    pub embed_layout: bool,
    /// Lay out from the graph record's declared `start` instead of guessing from titles.
    pub prefer_declared_start: bool,
    pub layout: LayoutConfig,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        ConvertConfig {
            default_name: DEFAULT_GRAPH_NAME.to_string(),
            embed_layout: false,
            prefer_declared_start: false,
            layout: LayoutConfig::default(),
        }
    }
}

impl ConvertConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Read a config file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| ConvertError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&text)?;
        tracing::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Read `flowform.toml` from `dir` if present, defaults otherwise.
    pub fn discover(dir: &Path) -> Result<Self> {
        let path = dir.join(CONFIG_FILE);
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Apply `FLOWFORM_*` overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_from(|name| std::env::var(name).ok())
    }

    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(name) = lookup("FLOWFORM_DEFAULT_NAME") {
            self.default_name = name;
        }
        if let Some(value) = lookup("FLOWFORM_SPACING_X") {
            self.layout.spacing_x = parse_env("FLOWFORM_SPACING_X", &value)?;
        }
        if let Some(value) = lookup("FLOWFORM_SPACING_Y") {
            self.layout.spacing_y = parse_env("FLOWFORM_SPACING_Y", &value)?;
        }
        Ok(())
    }

    /// `name`, or the configured default when it is blank.
    pub fn resolve_name<'a>(&'a self, name: &'a str) -> &'a str {
        if name.trim().is_empty() {
            &self.default_name
        } else {
            name
        }
    }
}

fn parse_env(name: &str, value: &str) -> Result<f64> {
    value.trim().parse().map_err(|_| ConvertError::InvalidEnv {
        name: name.to_string(),
        value: value.to_string(),
    })
}
