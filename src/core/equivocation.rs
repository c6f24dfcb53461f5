//! Equivocation Handler.
//!
//! Consensus reports a validator that signed two conflicting votes at one height. The validator is slashed with
//! `slash_fraction_double_sign`, jailed and tombstoned, so it can never unjail again.
//!
//! Evidence that cannot be acted on (unknown validator, no signing info, already tombstoned, too old) is
//! logged and dropped. None of those cases abort the block.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::core::context::SlashingContext;
use crate::core::events::{Event, ATTRIBUTE_VALUE_DOUBLE_SIGN};
use crate::core::params::Params;
use crate::core::signing_info;
use crate::core::staking::{Infraction, StakingKeeper, ValidatorHandle};
use crate::core::types::{ConsAddress, Timestamp};
use crate::error::Result;

/// Double-sign evidence as delivered by consensus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evidence {
    pub address: ConsAddress,
    /// Height of the conflicting votes.
    pub height: i64,
    /// Block time at `height`.
    pub time: Timestamp,
    /// Voting power at `height`.
    pub power: i64,
}

impl<K: StakingKeeper> SlashingContext<'_, K> {
    pub fn handle_equivocation(&mut self, params: &Params, evidence: &Evidence) -> Result<()> {
        let addr = &evidence.address;

        let validator = match self.staking.validator_by_cons_addr(addr) {
            Some(v) => v,
            None => {
                warn!(validator = %addr, height = evidence.height, "ignoring evidence for unknown validator");
                return Ok(());
            }
        };

        let info = match signing_info::get_signing_info(self.store, addr)? {
            Some(info) => info,
            None => {
                warn!(validator = %addr, height = evidence.height, "ignoring evidence for validator without signing info");
                return Ok(());
            }
        };

        if info.tombstoned {
            info!(validator = %addr, height = evidence.height, "ignoring evidence for tombstoned validator");
            return Ok(());
        }

        // Evidence from the future (clock skew between heights) has age zero.
        let age = self
            .header
            .time
            .duration_since(evidence.time)
            .unwrap_or_default();
        let max_age = self.staking.max_evidence_age();
        if age > max_age {
            warn!(
                validator = %addr,
                infraction_time = %evidence.time,
                block_time = %self.header.time,
                "ignoring expired evidence"
            );
            return Ok(());
        }

        let distribution_height = self.config.distribution_height(evidence.height);
        let burned = self.staking.slash(
            addr,
            distribution_height,
            evidence.power,
            params.slash_fraction_double_sign,
            Infraction::DoubleSign,
        )?;

        // Downtime may have jailed it already.
        if !validator.is_jailed() {
            self.staking.jail(addr)?;
        }

        signing_info::jail_until(self.store, addr, Timestamp::MAX)?;
        signing_info::tombstone(self.store, addr)?;

        self.events.emit(Event::slash(
            addr,
            evidence.power,
            ATTRIBUTE_VALUE_DOUBLE_SIGN,
            burned,
        ));
        info!(
            validator = %addr,
            infraction_height = evidence.height,
            distribution_height,
            burned,
            "slashed, jailed and tombstoned validator for double signing"
        );
        Ok(())
    }
}
