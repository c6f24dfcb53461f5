//! Begin-block driver.
//!
//! # Ordering
//! Params are read once. Every vote is handled, in the order the commit lists them, before any evidence.
//! The first error aborts the block; `Keeper::begin_block` then discards the block's writes and events.

use tracing::debug;

use crate::core::context::SlashingContext;
use crate::core::equivocation::Evidence;
use crate::core::liveness::VoteInfo;
use crate::core::params;
use crate::core::staking::StakingKeeper;
use crate::error::Result;

impl<K: StakingKeeper> SlashingContext<'_, K> {
    pub fn begin_block(&mut self, votes: &[VoteInfo], evidence: &[Evidence]) -> Result<()> {
        let params = params::get_params(self.store)?;
        for vote in votes {
            self.handle_validator_signature(&params, vote)?;
        }
        for ev in evidence {
            self.handle_equivocation(&params, ev)?;
        }
        debug!(
            height = self.header.height,
            votes = votes.len(),
            evidence = evidence.len(),
            "slashing begin block done"
        );
        Ok(())
    }
}
