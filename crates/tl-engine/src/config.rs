//! Engine configuration, loaded from TOML by `tl-cli` (spec SPEC_FULL §1
//! "Configuration"). Every field has a default so a partial or absent file
//! still produces a usable config; [`EngineConfig::validate`] reports
//! problems without panicking, classified by severity.

use serde::{Deserialize, Serialize};

use crate::runtime::loop_runner::LoopConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

#[derive(Debug, Clone)]
pub struct ConfigIssue {
    pub severity: ConfigSeverity,
    pub field: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanupSettings {
    pub ttl_seconds: u64,
    pub sweep_interval_seconds: u64,
}

impl Default for CleanupSettings {
    fn default() -> Self {
        CleanupSettings { ttl_seconds: 3600, sweep_interval_seconds: 3600 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopSettings {
    pub max_iterations: u32,
}

impl Default for LoopSettings {
    fn default() -> Self {
        LoopSettings { max_iterations: LoopConfig::default().max_iterations }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct EngineConfig {
    pub loop_settings: LoopSettings,
    pub cleanup: CleanupSettings,
}

impl EngineConfig {
    pub fn loop_config(&self) -> LoopConfig {
        LoopConfig { max_iterations: self.loop_settings.max_iterations }
    }

    /// Never panics; collects every problem so a caller can decide whether
    /// warnings are acceptable or the process should refuse to start.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        if self.loop_settings.max_iterations == 0 {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "loop_settings.max_iterations",
                message: "must be at least 1".to_string(),
            });
        } else if self.loop_settings.max_iterations > 500 {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Warning,
                field: "loop_settings.max_iterations",
                message: "unusually high; turns may run for a very long time".to_string(),
            });
        }

        if self.cleanup.sweep_interval_seconds == 0 {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "cleanup.sweep_interval_seconds",
                message: "must be at least 1".to_string(),
            });
        }

        if self.cleanup.ttl_seconds < self.cleanup.sweep_interval_seconds {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Warning,
                field: "cleanup.ttl_seconds",
                message: "shorter than the sweep interval; expired state may linger up to one extra sweep".to_string(),
            });
        }

        issues
    }

    pub fn has_errors(issues: &[ConfigIssue]) -> bool {
        issues.iter().any(|i| i.severity == ConfigSeverity::Error)
    }
}
