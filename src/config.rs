//! Configuration management with layered loading
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. Global config: `$XDG_CONFIG_HOME/downline/downline.toml`
//! 3. Local config: `<dir>/.downline.toml`
//! 4. Environment variables: `DOWNLINE_*` prefix

use std::fmt;
use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::application::ApplicationError;

/// How command results are printed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => f.write_str("text"),
            OutputFormat::Json => f.write_str("json"),
        }
    }
}

/// Raw settings for intermediate parsing.
///
/// `None` means "not specified, inherit from the layer below".
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawSettings {
    pub seed: Option<u64>,
    pub payout_cap: Option<f64>,
    pub format: Option<OutputFormat>,
    pub tree_depth: Option<usize>,
}

/// Unified configuration for downline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Seed used when neither the command line nor the scenario sets one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Binary payout cap applied when the scenario sets none
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payout_cap: Option<f64>,
    /// Default output format
    pub format: OutputFormat,
    /// Depth limit of the tree view
    pub tree_depth: usize,
}

pub const DEFAULT_TREE_DEPTH: usize = 4;

impl Default for Settings {
    fn default() -> Self {
        Self {
            seed: None,
            payout_cap: None,
            format: OutputFormat::Text,
            tree_depth: DEFAULT_TREE_DEPTH,
        }
    }
}

/// Get the XDG config directory for downline.
pub fn global_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "downline").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the global config file.
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("downline.toml"))
}

/// Get the path to the local config file in a working directory.
pub fn local_config_path(dir: &Path) -> PathBuf {
    dir.join(".downline.toml")
}

/// Load a TOML file into RawSettings for manual merging.
fn load_raw_settings(path: &Path) -> Result<RawSettings, ApplicationError> {
    let content = std::fs::read_to_string(path).map_err(|e| ApplicationError::Config {
        message: format!("read {}: {}", path.display(), e),
    })?;
    toml::from_str(&content).map_err(|e| ApplicationError::Config {
        message: format!("parse {}: {}", path.display(), e),
    })
}

impl Settings {
    /// Overlay wins where it specifies a value.
    pub fn merge_with(&self, overlay: &RawSettings) -> Self {
        Self {
            seed: overlay.seed.or(self.seed),
            payout_cap: overlay.payout_cap.or(self.payout_cap),
            format: overlay.format.unwrap_or(self.format),
            tree_depth: overlay.tree_depth.unwrap_or(self.tree_depth),
        }
    }

    /// Load settings with layered precedence.
    ///
    /// # Arguments
    /// * `dir` - Optional working directory holding a local `.downline.toml`
    pub fn load(dir: Option<&Path>) -> Result<Self, ApplicationError> {
        Self::load_layers(global_config_path().as_deref(), dir)
    }

    /// Load settings from an explicit global file and local directory.
    pub fn load_layers(global: Option<&Path>, dir: Option<&Path>) -> Result<Self, ApplicationError> {
        // 1. Start with defaults
        let mut current = Self::default();

        // 2. Global config
        if let Some(global_path) = global {
            if global_path.exists() {
                let raw = load_raw_settings(global_path)?;
                current = current.merge_with(&raw);
            }
        }

        // 3. Local config
        if let Some(dir) = dir {
            let local_path = local_config_path(dir);
            if local_path.exists() {
                let raw = load_raw_settings(&local_path)?;
                current = current.merge_with(&raw);
            }
        }

        // 4. Environment variables
        Self::apply_env_overrides(current)
    }

    /// Apply DOWNLINE_* environment variables as explicit overrides.
    fn apply_env_overrides(mut settings: Self) -> Result<Self, ApplicationError> {
        let config = Config::builder()
            .add_source(Environment::with_prefix("DOWNLINE").separator("__"))
            .build()
            .map_err(config_err)?;

        if let Ok(val) = config.get::<u64>("seed") {
            settings.seed = Some(val);
        }
        if let Ok(val) = config.get::<f64>("payout_cap") {
            settings.payout_cap = Some(val);
        }
        if let Ok(val) = config.get_string("format") {
            settings.format = match val.to_ascii_lowercase().as_str() {
                "text" => OutputFormat::Text,
                "json" => OutputFormat::Json,
                other => {
                    return Err(ApplicationError::Config {
                        message: format!("DOWNLINE_FORMAT: unknown format '{other}'"),
                    })
                }
            };
        }
        if let Ok(val) = config.get::<usize>("tree_depth") {
            settings.tree_depth = val;
        }

        Ok(settings)
    }

    /// Show the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ApplicationError> {
        toml::to_string_pretty(self).map_err(|e| ApplicationError::Config {
            message: format!("serialize config: {e}"),
        })
    }

    /// Generate a template config file.
    pub fn template() -> String {
        r#"# downline configuration
#
# Locations (by precedence, lowest to highest):
#   Global: ~/.config/downline/downline.toml
#   Local:  <dir>/.downline.toml
#   Env:    DOWNLINE_* environment variables (e.g. DOWNLINE_SEED=42)

# Seed for runs that set none on the command line or in the scenario
# seed = 42

# Per-cycle cap on matched binary volume (0 or unset: uncapped)
# payout_cap = 5000.0

# Output format: "text" or "json"
# format = "text"

# Levels shown by `downline tree`
# tree_depth = 4
"#
        .to_string()
    }
}

fn config_err(e: ConfigError) -> ApplicationError {
    ApplicationError::Config {
        message: e.to_string(),
    }
}
