//! Scenario file service
//!
//! Loads simulation scenarios (configuration, optional seed and commission
//! rules) from TOML files and writes run output.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::application::{ApplicationError, ApplicationResult, IoResultExt};
use crate::domain::{CommissionRules, SimulationConfig};
use crate::infrastructure::traits::FileSystem;

/// A runnable scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub commissions: CommissionRules,
}

impl Scenario {
    pub fn new(simulation: SimulationConfig) -> Self {
        Self {
            seed: None,
            simulation,
            commissions: CommissionRules::default(),
        }
    }

    /// First seed found in: command line, scenario, settings.
    pub fn resolve_seed(&self, cli: Option<u64>, settings: Option<u64>) -> Option<u64> {
        cli.or(self.seed).or(settings)
    }
}

/// Service for reading scenarios and writing results.
pub struct ScenarioService {
    fs: Arc<dyn FileSystem>,
}

impl ScenarioService {
    /// Create a new scenario service.
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self { fs }
    }

    /// Parse a scenario file. The configuration is not validated here.
    pub fn load(&self, path: &Path) -> ApplicationResult<Scenario> {
        debug!("load: scenario={}", path.display());
        if !self.fs.is_file(path) {
            return Err(ApplicationError::ScenarioNotFound(path.to_path_buf()));
        }
        let content = self
            .fs
            .read_to_string(path)
            .with_path_context("read scenario", path)?;
        Self::parse(&content).map_err(|message| ApplicationError::Scenario {
            path: path.to_path_buf(),
            message,
        })
    }

    /// Parse scenario TOML text.
    pub fn parse(content: &str) -> Result<Scenario, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }

    /// Render a scenario back to TOML.
    pub fn render(scenario: &Scenario) -> ApplicationResult<String> {
        toml::to_string_pretty(scenario).map_err(|e| ApplicationError::OperationFailed {
            context: "render scenario".to_string(),
            source: Box::new(e),
        })
    }

    /// Write `content` to `path`, creating parent directories.
    pub fn write_output(&self, path: &Path, content: &str) -> ApplicationResult<()> {
        debug!("write_output: path={}", path.display());
        self.fs
            .ensure_parent(path)
            .with_path_context("create output directory", path)?;
        self.fs
            .write(path, content)
            .with_path_context("write output", path)
    }
}
