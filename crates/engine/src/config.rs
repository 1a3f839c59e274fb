//! Engine configuration.
//!
//! Every field has a default, so an empty TOML document is a valid config.
//! Unknown keys are rejected.

use std::path::Path;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::Duration;

use towerline_core::{EscalationConfig, Severity, TransitionMode};

use crate::error::EngineError;
use crate::synth::SynthThresholds;

/// Upper bound for every hour-valued setting, ten years.
pub const MAX_CONFIG_HOURS: i64 = 24 * 366 * 10;
/// Upper bound for cache TTLs, one year.
pub const MAX_CACHE_TTL_SECS: u64 = 86_400 * 366;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub escalation: EscalationSettings,
    pub synth: SynthThresholds,
    pub cache: CacheConfig,
    pub side_store: SideStoreConfig,
    pub concurrency: ConcurrencyMode,
    pub transitions: TransitionMode,
    /// Actor recorded on policy-driven actions.
    pub system_actor: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            escalation: EscalationSettings::default(),
            synth: SynthThresholds::default(),
            cache: CacheConfig::default(),
            side_store: SideStoreConfig::default(),
            concurrency: ConcurrencyMode::default(),
            transitions: TransitionMode::default(),
            system_actor: "system:escalation-policy".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, EngineError> {
        let config: EngineConfig =
            toml::from_str(s).map_err(|e| EngineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Range checks serde cannot express.
    pub fn validate(&self) -> Result<(), EngineError> {
        hours_in_range("escalation.overdue_hours", self.escalation.overdue_hours)?;
        hours_in_range("side_store.state_ttl_hours", self.side_store.state_ttl_hours)?;
        ttl_in_range("cache.summary_ttl_secs", self.cache.summary_ttl_secs)?;
        ttl_in_range(
            "cache.control_tower_ttl_secs",
            self.cache.control_tower_ttl_secs,
        )?;
        if self.system_actor.trim().is_empty() {
            return Err(EngineError::Config("system_actor must not be empty".into()));
        }
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, EngineError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }
}

fn hours_in_range(key: &str, hours: i64) -> Result<(), EngineError> {
    if (0..=MAX_CONFIG_HOURS).contains(&hours) {
        Ok(())
    } else {
        Err(EngineError::Config(format!(
            "{key} must be between 0 and {MAX_CONFIG_HOURS}, got {hours}"
        )))
    }
}

fn ttl_in_range(key: &str, secs: u64) -> Result<(), EngineError> {
    if secs <= MAX_CACHE_TTL_SECS {
        Ok(())
    } else {
        Err(EngineError::Config(format!(
            "{key} must be at most {MAX_CACHE_TTL_SECS}, got {secs}"
        )))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EscalationSettings {
    pub min_severity: Severity,
    pub overdue_hours: i64,
    pub impact_threshold: Decimal,
    /// Escalate qualifying decisions while serving control-tower reads.
    pub auto_escalate_on_read: bool,
    /// Recorded in `escalated_to` on escalation.
    pub escalated_to: String,
}

impl Default for EscalationSettings {
    fn default() -> Self {
        let policy = EscalationConfig::default();
        EscalationSettings {
            min_severity: policy.min_severity,
            overdue_hours: policy.overdue_hours,
            impact_threshold: policy.impact_threshold,
            auto_escalate_on_read: true,
            escalated_to: "CONTROL_TOWER".to_string(),
        }
    }
}

impl EscalationSettings {
    pub fn policy(&self) -> EscalationConfig {
        EscalationConfig {
            min_severity: self.min_severity,
            overdue_hours: self.overdue_hours,
            impact_threshold: self.impact_threshold,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    pub summary_ttl_secs: u64,
    pub control_tower_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            summary_ttl_secs: 30,
            control_tower_ttl_secs: 900,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SideStoreConfig {
    /// How long a decided/dismissed auto decision stays suppressed.
    pub state_ttl_hours: i64,
}

impl Default for SideStoreConfig {
    fn default() -> Self {
        SideStoreConfig {
            state_ttl_hours: 168,
        }
    }
}

impl SideStoreConfig {
    pub fn state_ttl(&self) -> Duration {
        Duration::seconds(self.state_ttl_hours.saturating_mul(3600))
    }
}

/// How conditional updates are issued against the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConcurrencyMode {
    /// Update only if the row version is unchanged since the read.
    #[default]
    Optimistic,
    /// Unconditional update; the last writer wins.
    LastWriteWins,
}

impl ConcurrencyMode {
    pub fn expected_version(self, read_version: i64) -> Option<i64> {
        match self {
            ConcurrencyMode::Optimistic => Some(read_version),
            ConcurrencyMode::LastWriteWins => None,
        }
    }
}
