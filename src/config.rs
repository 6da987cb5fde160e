// ABOUTME: Configuration loading for toolgate.
// ABOUTME: Reads ~/.toolgate/config.toml (or an explicit path) with per-section defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::tools::catalog::BUILTIN_TOOL_NAMES;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub gate: GateConfig,
    pub scanner: ScannerConfig,
    pub downstream: DownstreamConfig,
    pub follow_up: FollowUpConfig,
    pub tools: ToolsConfig,
}

/// Proposal lifecycle and operating mode.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    pub proposal_ttl_seconds: u64,
    pub sweep_interval_seconds: Option<u64>,
    pub state_file: Option<PathBuf>,
    pub dry_run: bool,
    pub execution_timeout_seconds: u64,
    pub audit_dir: Option<PathBuf>,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            proposal_ttl_seconds: 300,
            sweep_interval_seconds: None,
            state_file: None,
            dry_run: false,
            execution_timeout_seconds: 30,
            audit_dir: None,
        }
    }
}

impl GateConfig {
    pub fn proposal_ttl(&self) -> Duration {
        Duration::from_secs(self.proposal_ttl_seconds.max(1))
    }

    /// Sweep interval: the configured seconds (at least one), never more than half the TTL.
    pub fn sweep_interval(&self) -> Duration {
        let half_ttl = self.proposal_ttl() / 2;
        match self.sweep_interval_seconds {
            Some(secs) => Duration::from_secs(secs.max(1)).min(half_ttl),
            None => half_ttl,
        }
    }

    pub fn execution_timeout(&self) -> Duration {
        Duration::from_secs(self.execution_timeout_seconds.max(1))
    }
}

/// Content scanner tuning.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    pub proximity_window: usize,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            proximity_window: crate::scanner::DEFAULT_PROXIMITY_WINDOW,
        }
    }
}

/// Downstream API client settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DownstreamConfig {
    pub base_url: String,
    pub api_version: Option<String>,
    pub timeout_seconds: u64,
    pub token_env: String,
}

impl Default for DownstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "https://services.leadconnectorhq.com".to_string(),
            api_version: Some("2021-07-28".to_string()),
            timeout_seconds: 20,
            token_env: "TOOLGATE_API_TOKEN".to_string(),
        }
    }
}

/// Follow-up action taken when content is blocked.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FollowUpConfig {
    pub enabled: bool,
    pub assignee: Option<String>,
}

impl Default for FollowUpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            assignee: None,
        }
    }
}

/// Tool exposure. The allowlist is kept separate from the catalog.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub allowlist: Vec<String>,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            allowlist: BUILTIN_TOOL_NAMES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Config {
    /// Load config from ~/.toolgate/config.toml, falling back to defaults.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load config from an explicit path, falling back to defaults if it doesn't exist.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Path to the config file.
    pub fn config_path() -> PathBuf {
        Self::base_dir().join("config.toml")
    }

    fn base_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".toolgate")
    }
}
