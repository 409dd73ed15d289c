//! Configuration file and presets support.

use indexmap::IndexMap;
use rowtask::Step;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default CLI options.
    pub defaults: Defaults,
    /// User-defined presets: named, pre-configured operations.
    pub presets: IndexMap<String, Step>,
}

/// Default CLI options.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Defaults {
    /// Enable verbose output by default.
    pub verbose: bool,
    /// Enable quiet output by default.
    pub quiet: bool,
    /// Show a progress bar while rows are processed.
    pub progress: bool,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            verbose: false,
            quiet: false,
            progress: true,
        }
    }
}

impl Config {
    /// Load config from the default location (~/.config/rowtask/config.toml).
    pub fn load() -> Self {
        Self::load_from_path(Self::default_path())
    }

    /// Load config from a specific path.
    ///
    /// Runs before logging is set up, so problems go straight to stderr.
    pub fn load_from_path(path: Option<PathBuf>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        if !path.exists() {
            return Self::default();
        }

        match Self::read(&path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Warning: {e}");
                Self::default()
            }
        }
    }

    fn read(path: &Path) -> Result<Self, String> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {e}", path.display()))?;
        toml::from_str(&contents)
            .map_err(|e| format!("Failed to parse config file {}: {e}", path.display()))
    }

    /// Get the default config file path.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("rowtask").join("config.toml"))
    }

    /// Get a preset by name.
    pub fn get_preset(&self, name: &str) -> Option<&Step> {
        self.presets.get(name)
    }
}

/// One-line summary of a preset's options, e.g. `columns=["a","b"], output="x"`.
pub fn describe_options(step: &Step) -> String {
    if step.options.is_empty() {
        return "(no options)".into();
    }
    step.options
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(", ")
}
