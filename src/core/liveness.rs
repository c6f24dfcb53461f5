//! Signature Handler.
//!
//! Called once per validator per block with that validator's vote from the previous commit. Maintains the
//! missed-block ring buffer and its cached counter, and jails and slashes validators that miss too many blocks.
//!
//! # Determinism
//! The only inputs are the stored state, the block header, the params snapshot and the vote. No wall clock.
//!
//! # Invariants
//! - After every call `missed_blocks_counter == popcount(bitmap over [0, window))`.
//! - `index_offset` grows by one per call except on punishment, where it resets to zero.
//! - Nothing is punished before `start_height + signed_blocks_window` has passed.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::core::bitmap;
use crate::core::context::SlashingContext;
use crate::core::events::{Event, ATTRIBUTE_VALUE_MISSING_SIGNATURE};
use crate::core::params::Params;
use crate::core::pubkey_index;
use crate::core::signing_info::{self, SigningInfo};
use crate::core::staking::{Infraction, StakingKeeper, ValidatorHandle};
use crate::core::types::ConsAddress;
use crate::error::{Result, SlashingError};

/// How a validator's precommit appeared in the last commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockIdFlag {
    /// No precommit received.
    Absent,
    /// Precommit for the committed block.
    Commit,
    /// Precommit for nil. The validator was online.
    Nil,
}

impl BlockIdFlag {
    /// Only an absent precommit counts as a missed block.
    pub fn is_missed(self) -> bool {
        matches!(self, BlockIdFlag::Absent)
    }
}

/// One entry of the previous commit's vote list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteInfo {
    pub address: ConsAddress,
    pub power: i64,
    pub flag: BlockIdFlag,
}

impl VoteInfo {
    pub fn new(address: ConsAddress, power: i64, flag: BlockIdFlag) -> Self {
        Self { address, power, flag }
    }

    pub fn signed(address: ConsAddress, power: i64) -> Self {
        Self::new(address, power, BlockIdFlag::Commit)
    }

    pub fn absent(address: ConsAddress, power: i64) -> Self {
        Self::new(address, power, BlockIdFlag::Absent)
    }
}

impl<K: StakingKeeper> SlashingContext<'_, K> {
    /// Records one vote and punishes the validator if it has fallen below the liveness threshold.
    pub fn handle_validator_signature(&mut self, params: &Params, vote: &VoteInfo) -> Result<()> {
        let addr = &vote.address;
        let height = self.header.height;

        match pubkey_index::get_pubkey(self.store, addr) {
            Ok(_) => {}
            Err(SlashingError::PubkeyNotFound(_)) => {
                return Err(SlashingError::UnknownValidator(addr.clone()))
            }
            Err(e) => return Err(e),
        }

        // A jailed validator is out of the active set; its absence says nothing.
        if self.staking.is_jailed(addr) {
            debug!(validator = %addr, height, "skipping vote of jailed validator");
            return Ok(());
        }

        let mut info = signing_info::must_get_signing_info(self.store, addr)?;
        if info.start_height > height {
            return Err(SlashingError::InvalidHeight {
                start_height: info.start_height,
                height,
            });
        }

        let window = params.signed_blocks_window;
        let slot = info.index_offset.rem_euclid(window) as u64;
        info.index_offset = info
            .index_offset
            .checked_add(1)
            .ok_or_else(|| SlashingError::Codec(format!("index offset overflow for {}", addr)))?;

        let previously_missed = bitmap::get_bit(self.store, addr, slot)?;
        let missed = vote.flag.is_missed();
        match (previously_missed, missed) {
            (false, true) => {
                bitmap::set_bit(self.store, addr, slot, true)?;
                info.missed_blocks_counter += 1;
            }
            (true, false) => {
                bitmap::set_bit(self.store, addr, slot, false)?;
                info.missed_blocks_counter -= 1;
            }
            _ => {}
        }

        if missed {
            self.events
                .emit(Event::liveness(addr, info.missed_blocks_counter, height));
            debug!(
                validator = %addr,
                height,
                missed = info.missed_blocks_counter,
                threshold = params.min_signed(),
                "absent validator"
            );
        }

        let min_height = info.start_height.saturating_add(window);
        if height > min_height && info.missed_blocks_counter > params.max_missed() {
            self.punish_downtime(params, vote, &mut info)?;
        }

        signing_info::set_signing_info(self.store, addr, &info)
    }

    fn punish_downtime(&mut self, params: &Params, vote: &VoteInfo, info: &mut SigningInfo) -> Result<()> {
        let addr = &vote.address;
        let height = self.header.height;

        match self.staking.validator_by_cons_addr(addr) {
            None => {
                warn!(validator = %addr, height, "downtime threshold crossed by unknown validator; not punished");
                return Ok(());
            }
            Some(v) if v.is_jailed() => {
                info!(validator = %addr, height, "validator already jailed; downtime not punished again");
                return Ok(());
            }
            Some(_) => {}
        }

        // Votes at height H were cast by the set chosen at H - delay - 1.
        let distribution_height = self.config.distribution_height(height);
        let burned = self.staking.slash(
            addr,
            distribution_height,
            vote.power,
            params.slash_fraction_downtime,
            Infraction::Downtime,
        )?;
        self.staking.jail(addr)?;

        info.jailed_until = self.header.time.saturating_add(params.downtime_jail_duration);
        // The validator starts a fresh window once it rejoins.
        info.missed_blocks_counter = 0;
        info.index_offset = 0;
        bitmap::delete_all(self.store, addr)?;

        self.events.emit(Event::slash(
            addr,
            vote.power,
            ATTRIBUTE_VALUE_MISSING_SIGNATURE,
            burned,
        ));
        info!(
            validator = %addr,
            height,
            distribution_height,
            burned,
            jailed_until = %info.jailed_until,
            "slashed and jailed validator for downtime"
        );
        Ok(())
    }
}
