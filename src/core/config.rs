//! Node-side configuration of the slashing keeper.
//!
//! Unlike `Params`, which governance owns and which lives in the store, this is supplied by the node operator
//! and must be identical on every node of a network.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SlashingError};

/// Blocks between a validator-set change and the moment it takes effect in consensus.
pub const DEFAULT_VALIDATOR_UPDATE_DELAY: i64 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeeperConfig {
    /// Slashes are applied at `infraction_height - validator_update_delay - 1`.
    pub validator_update_delay: i64,
}

impl Default for KeeperConfig {
    fn default() -> Self {
        Self {
            validator_update_delay: DEFAULT_VALIDATOR_UPDATE_DELAY,
        }
    }
}

impl KeeperConfig {
    pub fn validate(&self) -> Result<()> {
        if self.validator_update_delay < 0 {
            return Err(SlashingError::InvalidParams(format!(
                "validator update delay must be non-negative: {}",
                self.validator_update_delay
            )));
        }
        Ok(())
    }

    /// Parses and validates a JSON config. Missing fields take their defaults.
    pub fn from_json(s: &str) -> Result<Self> {
        let config: KeeperConfig = serde_json::from_str(s)
            .map_err(|e| SlashingError::InvalidParams(format!("config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Height whose stake distribution a slash for an infraction at `infraction_height` applies to.
    /// May be negative near genesis.
    pub fn distribution_height(&self, infraction_height: i64) -> i64 {
        infraction_height - self.validator_update_delay - 1
    }
}
