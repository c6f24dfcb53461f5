//! Parameter Store.
//!
//! A single governance-owned record under key `0x00`. `set_params` validates the whole record before writing,
//! so an invalid update leaves the stored params untouched. Readers take one snapshot per block.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::codec;
use crate::core::decimal::Dec;
use crate::core::keys::PARAMS_KEY;
use crate::core::store::KvStore;
use crate::core::types::duration_str;
use crate::error::{Result, SlashingError};

pub const DEFAULT_SIGNED_BLOCKS_WINDOW: i64 = 100;
pub const DEFAULT_DOWNTIME_JAIL_DURATION: Duration = Duration::from_secs(600);

/// Tunable slashing constants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Params {
    pub signed_blocks_window: i64,
    pub min_signed_per_window: Dec,
    #[serde(with = "duration_str")]
    pub downtime_jail_duration: Duration,
    pub slash_fraction_double_sign: Dec,
    pub slash_fraction_downtime: Dec,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            signed_blocks_window: DEFAULT_SIGNED_BLOCKS_WINDOW,
            min_signed_per_window: Dec::from_raw(500_000_000_000_000_000),
            downtime_jail_duration: DEFAULT_DOWNTIME_JAIL_DURATION,
            slash_fraction_double_sign: Dec::from_raw(50_000_000_000_000_000),
            slash_fraction_downtime: Dec::from_raw(10_000_000_000_000_000),
        }
    }
}

impl Params {
    /// Checks every constraint; the first violation is reported.
    pub fn validate(&self) -> Result<()> {
        if self.signed_blocks_window < 1 {
            return Err(SlashingError::InvalidParams(format!(
                "signed blocks window must be at least 1: {}",
                self.signed_blocks_window
            )));
        }
        if self.min_signed_per_window > Dec::ONE {
            return Err(SlashingError::InvalidParams(format!(
                "min signed per window too large: {}",
                self.min_signed_per_window
            )));
        }
        if self.downtime_jail_duration.is_zero() {
            return Err(SlashingError::InvalidParams(
                "downtime jail duration must be positive".to_string(),
            ));
        }
        if self.slash_fraction_double_sign > Dec::ONE {
            return Err(SlashingError::InvalidParams(format!(
                "double sign slash fraction too large: {}",
                self.slash_fraction_double_sign
            )));
        }
        if self.slash_fraction_downtime > Dec::ONE {
            return Err(SlashingError::InvalidParams(format!(
                "downtime slash fraction too large: {}",
                self.slash_fraction_downtime
            )));
        }
        Ok(())
    }

    /// `floor(min_signed_per_window × signed_blocks_window)`.
    pub fn min_signed(&self) -> i64 {
        let window = self.signed_blocks_window.max(0) as u128;
        // min_signed_per_window <= 1, so the product never exceeds the window.
        self.min_signed_per_window
            .mul_int_floor(window)
            .map(|v| v as i64)
            .unwrap_or(self.signed_blocks_window)
    }

    /// Misses tolerated inside one window before downtime punishment.
    pub fn max_missed(&self) -> i64 {
        self.signed_blocks_window - self.min_signed()
    }
}

/// Loads the stored params. Absence is fatal: genesis always writes them.
pub fn get_params(store: &dyn KvStore) -> Result<Params> {
    let raw = store
        .get(PARAMS_KEY)?
        .ok_or_else(|| SlashingError::StoreFailure("params not initialized".to_string()))?;
    codec::decode_params(&raw)
}

/// Validates and persists `params`. On error the store is not touched.
pub fn set_params(store: &mut dyn KvStore, params: &Params) -> Result<()> {
    params.validate()?;
    store.set(PARAMS_KEY, &codec::encode_params(params))?;
    Ok(())
}
