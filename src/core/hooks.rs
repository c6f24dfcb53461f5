//! Validator lifecycle hooks and unjail.
//!
//! Staking calls `StakingHooks` at each lifecycle transition. Every hook defaults to a no-op; the slashing
//! keeper only overrides creation, bonding and removal:
//!
//! - `after_validator_created` records `cons_addr → pubkey` so votes can be resolved.
//! - `after_validator_bonded` creates the signing info on first bond and moves `start_height` to the current
//!   height on every later bond, so a rejoining validator gets a full window before it can be punished.
//! - `after_validator_removed` drops the pubkey entry. The signing info stays, including its tombstone.

use tracing::{debug, info};

use crate::core::context::SlashingContext;
use crate::core::decimal::Dec;
use crate::core::pubkey_index;
use crate::core::signing_info::{self, SigningInfo};
use crate::core::staking::{StakingKeeper, ValidatorHandle};
use crate::core::types::{AccAddress, BlockHeader, ConsAddress, ValAddress};
use crate::error::{Result, SlashingError};

/// Staking lifecycle notifications. Implementors override only what they react to.
#[allow(unused_variables)]
pub trait StakingHooks {
    fn after_validator_created(&mut self, header: BlockHeader, operator: &ValAddress) -> Result<()> {
        Ok(())
    }

    fn before_validator_modified(&mut self, header: BlockHeader, operator: &ValAddress) -> Result<()> {
        Ok(())
    }

    fn after_validator_removed(
        &mut self,
        header: BlockHeader,
        cons_addr: &ConsAddress,
        operator: &ValAddress,
    ) -> Result<()> {
        Ok(())
    }

    fn after_validator_bonded(
        &mut self,
        header: BlockHeader,
        cons_addr: &ConsAddress,
        operator: &ValAddress,
    ) -> Result<()> {
        Ok(())
    }

    fn after_validator_begin_unbonding(
        &mut self,
        header: BlockHeader,
        cons_addr: &ConsAddress,
        operator: &ValAddress,
    ) -> Result<()> {
        Ok(())
    }

    fn before_delegation_created(
        &mut self,
        header: BlockHeader,
        delegator: &AccAddress,
        operator: &ValAddress,
    ) -> Result<()> {
        Ok(())
    }

    fn before_delegation_shares_modified(
        &mut self,
        header: BlockHeader,
        delegator: &AccAddress,
        operator: &ValAddress,
    ) -> Result<()> {
        Ok(())
    }

    fn before_delegation_removed(
        &mut self,
        header: BlockHeader,
        delegator: &AccAddress,
        operator: &ValAddress,
    ) -> Result<()> {
        Ok(())
    }

    fn after_delegation_modified(
        &mut self,
        header: BlockHeader,
        delegator: &AccAddress,
        operator: &ValAddress,
    ) -> Result<()> {
        Ok(())
    }

    fn before_validator_slashed(
        &mut self,
        header: BlockHeader,
        operator: &ValAddress,
        fraction: Dec,
    ) -> Result<()> {
        Ok(())
    }
}

impl<K: StakingKeeper> SlashingContext<'_, K> {
    pub fn after_validator_created(&mut self, operator: &ValAddress) -> Result<()> {
        let validator = self
            .staking
            .validator(operator)
            .ok_or_else(|| SlashingError::NoValidator(operator.clone()))?;
        let pubkey = validator.consensus_pubkey();
        let cons_addr = pubkey.address();
        pubkey_index::put_pubkey(self.store, &cons_addr, &pubkey)?;
        debug!(operator = %operator, validator = %cons_addr, "registered consensus pubkey");
        Ok(())
    }

    /// Creates the signing info on first bond. On a rebond only `start_height` moves; counters, jail time and
    /// tombstone are kept.
    pub fn after_validator_bonded(&mut self, cons_addr: &ConsAddress) -> Result<()> {
        let height = self.header.height;
        match signing_info::get_signing_info(self.store, cons_addr)? {
            Some(mut info) => {
                info.start_height = height;
                signing_info::set_signing_info(self.store, cons_addr, &info)?;
                debug!(validator = %cons_addr, start_height = height, "restarted signing window on rebond");
            }
            None => {
                let info = SigningInfo::new(cons_addr.clone(), height);
                signing_info::set_signing_info(self.store, cons_addr, &info)?;
                debug!(validator = %cons_addr, start_height = height, "created signing info");
            }
        }
        Ok(())
    }

    pub fn after_validator_removed(&mut self, cons_addr: &ConsAddress) -> Result<()> {
        pubkey_index::delete_pubkey(self.store, cons_addr)
    }

    /// Operator-initiated release from jail. Each check yields its own error, in this order.
    pub fn unjail(&mut self, operator: &ValAddress) -> Result<()> {
        let validator = self
            .staking
            .validator(operator)
            .ok_or_else(|| SlashingError::NoValidator(operator.clone()))?;

        let self_delegation = self
            .staking
            .delegation(&AccAddress::from(operator), operator)
            .ok_or_else(|| SlashingError::MissingSelfDelegation(operator.clone()))?;
        let self_bond = validator.tokens_from_shares(self_delegation.shares);
        if self_bond < validator.min_self_delegation() {
            return Err(SlashingError::SelfDelegationTooLow(operator.clone()));
        }

        if !validator.is_jailed() {
            return Err(SlashingError::NotJailed(operator.clone()));
        }

        let cons_addr = validator.cons_address();
        if let Some(info) = signing_info::get_signing_info(self.store, &cons_addr)? {
            if info.tombstoned {
                return Err(SlashingError::StillJailed(operator.clone()));
            }
            if self.header.time < info.jailed_until {
                return Err(SlashingError::StillJailed(operator.clone()));
            }
        }

        self.staking.unjail(&cons_addr)?;
        info!(operator = %operator, validator = %cons_addr, height = self.header.height, "validator unjailed");
        Ok(())
    }
}
