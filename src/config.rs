//! Tracker configuration
//!
//! Thresholds and bounds are exposed as named constants; `TrackerConfig`
//! bundles them so a host can override any subset from TOML or JSON.

use crate::error::TrackerError;
use serde::{Deserialize, Serialize};

/// Storage key namespace (`<namespace>_uid`, `<namespace>_log`, ...)
pub const DEFAULT_NAMESPACE: &str = "hepple";

/// Maximum number of events retained in the persistent log
pub const DEFAULT_MAX_EVENTS: usize = 2000;

/// Sustained pointer presence required for a hover event (milliseconds)
pub const HOVER_INTENT_MS: i64 = 1000;

/// Quiet period before a scroll position is evaluated (milliseconds)
pub const SCROLL_DEBOUNCE_MS: i64 = 200;

/// Dwell time is only logged when the visit lasted strictly longer than this
pub const DWELL_NOISE_THRESHOLD_SECS: i64 = 2;

/// Interval between visit checkpoints (milliseconds)
pub const HEARTBEAT_INTERVAL_MS: i64 = 5000;

/// Scroll depth boundaries, in percent
pub const SCROLL_MILESTONES: [u8; 4] = [25, 50, 75, 100];

/// Maximum number of characters taken from element text for a label
pub const LABEL_MAX_CHARS: usize = 25;

/// Tracker configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Storage key namespace
    pub namespace: String,
    /// Log capacity (oldest events evicted first)
    pub max_events: usize,
    /// Hover intent threshold in milliseconds
    pub hover_intent_ms: i64,
    /// Scroll debounce in milliseconds
    pub scroll_debounce_ms: i64,
    /// Dwell noise threshold in whole seconds
    pub dwell_noise_threshold_secs: i64,
    /// Visit checkpoint interval in milliseconds (0 disables the heartbeat)
    pub heartbeat_interval_ms: i64,
    /// Scroll milestones in percent, strictly increasing
    pub milestones: Vec<u8>,
    /// Text label truncation length
    pub label_max_chars: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            max_events: DEFAULT_MAX_EVENTS,
            hover_intent_ms: HOVER_INTENT_MS,
            scroll_debounce_ms: SCROLL_DEBOUNCE_MS,
            dwell_noise_threshold_secs: DWELL_NOISE_THRESHOLD_SECS,
            heartbeat_interval_ms: HEARTBEAT_INTERVAL_MS,
            milestones: SCROLL_MILESTONES.to_vec(),
            label_max_chars: LABEL_MAX_CHARS,
        }
    }
}

impl TrackerConfig {
    /// Load and validate a configuration from TOML
    pub fn from_toml_str(toml_str: &str) -> Result<Self, TrackerError> {
        let config: Self = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a configuration from JSON
    pub fn from_json(json: &str) -> Result<Self, TrackerError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the configuration to JSON
    pub fn to_json(&self) -> Result<String, TrackerError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Storage key holding the user identity
    pub fn uid_key(&self) -> String {
        format!("{}_uid", self.namespace)
    }

    /// Storage key holding the event log
    pub fn log_key(&self) -> String {
        format!("{}_log", self.namespace)
    }

    /// Storage key holding the active visit checkpoint
    pub fn visit_key(&self) -> String {
        format!("{}_visit", self.namespace)
    }

    /// Check bounds and ordering constraints
    pub fn validate(&self) -> Result<(), TrackerError> {
        if self.namespace.trim().is_empty() {
            return Err(TrackerError::InvalidConfig(
                "namespace must not be empty".to_string(),
            ));
        }
        if self.max_events == 0 {
            return Err(TrackerError::InvalidConfig(
                "max_events must be at least 1".to_string(),
            ));
        }
        if self.label_max_chars == 0 {
            return Err(TrackerError::InvalidConfig(
                "label_max_chars must be at least 1".to_string(),
            ));
        }
        if self.hover_intent_ms < 0 || self.scroll_debounce_ms < 0 || self.heartbeat_interval_ms < 0
        {
            return Err(TrackerError::InvalidConfig(
                "timer intervals must not be negative".to_string(),
            ));
        }
        if self.milestones.iter().any(|&m| m == 0 || m > 100) {
            return Err(TrackerError::InvalidConfig(
                "milestones must lie within 1..=100".to_string(),
            ));
        }
        if self.milestones.windows(2).any(|w| w[0] >= w[1]) {
            return Err(TrackerError::InvalidConfig(
                "milestones must be strictly increasing".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_config_is_valid() {
        let config = TrackerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.uid_key(), "hepple_uid");
        assert_eq!(config.log_key(), "hepple_log");
        assert_eq!(config.visit_key(), "hepple_visit");
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = TrackerConfig::from_toml_str(
            r#"
            namespace = "spirits"
            max_events = 50
            "#,
        )
        .unwrap();

        assert_eq!(config.namespace, "spirits");
        assert_eq!(config.max_events, 50);
        assert_eq!(config.hover_intent_ms, HOVER_INTENT_MS);
        assert_eq!(config.milestones, vec![25, 50, 75, 100]);
    }

    #[test]
    fn test_json_roundtrip() {
        let config = TrackerConfig {
            max_events: 10,
            ..TrackerConfig::default()
        };
        let json = config.to_json().unwrap();
        assert_eq!(TrackerConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn test_rejects_zero_capacity() {
        let result = TrackerConfig::from_toml_str("max_events = 0");
        assert!(matches!(result, Err(TrackerError::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_unordered_milestones() {
        let config = TrackerConfig {
            milestones: vec![50, 25],
            ..TrackerConfig::default()
        };
        assert!(config.validate().is_err());

        let config = TrackerConfig {
            milestones: vec![0, 50],
            ..TrackerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_malformed_toml() {
        let result = TrackerConfig::from_toml_str("max_events = \"lots\"");
        assert!(matches!(result, Err(TrackerError::ConfigFormat(_))));
    }
}
