//! Fleet configuration

use serde::{Deserialize, Serialize};

/// Fleet-level configuration, owned by the fleet manager.
///
/// Workers hold a reference to the configuration of the fleet that launched
/// them. The reference is attached asynchronously after the worker is
/// created, so it can be absent for a short window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleetConfig {
    pub label: String,
    pub recovery: RecoverySection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoverySection {
    /// Administratively disable automatic resubmission of aborted work
    pub disable_resubmit: bool,
}

impl Default for RecoverySection {
    fn default() -> Self {
        Self {
            disable_resubmit: false,
        }
    }
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            label: "default".to_string(),
            recovery: RecoverySection::default(),
        }
    }
}

impl FleetConfig {
    /// Check whether automatic resubmission is disabled for this fleet
    pub fn resubmit_disabled(&self) -> bool {
        self.recovery.disable_resubmit
    }

    /// Load config from file
    pub fn from_file(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: FleetConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save config to file
    pub fn to_file(&self, path: &str) -> Result<(), Box<dyn std::error::Error>> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(label) = std::env::var("FLEETQ_FLEET_LABEL") {
            config.label = label;
        }
        if let Ok(disable) = std::env::var("FLEETQ_DISABLE_RESUBMIT") {
            config.recovery.disable_resubmit =
                disable.parse().unwrap_or(config.recovery.disable_resubmit);
        }

        config
    }
}
