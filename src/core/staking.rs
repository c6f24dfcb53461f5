//! Interface consumed from the staking subsystem, and an in-memory implementation.
//!
//! The slashing core never writes staking state itself; it only calls `slash`, `jail` and `unjail` here.
//!
//! # Distribution height
//! `slash` may receive a negative `distribution_height` near genesis. Implementations treat such heights as
//! "before genesis": no unbondings or redelegations exist yet, so only the bonded tokens are slashed.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use crate::core::decimal::Dec;
use crate::core::types::{AccAddress, ConsAddress, ConsPubKey, ValAddress};
use crate::error::{Result, SlashingError};

/// Why a slash was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Infraction {
    /// Too many missed blocks inside the signing window.
    Downtime,
    /// Two conflicting votes at one height.
    DoubleSign,
}

impl fmt::Display for Infraction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Infraction::Downtime => f.write_str("downtime"),
            Infraction::DoubleSign => f.write_str("double_sign"),
        }
    }
}

/// Read-only view of a staking validator.
pub trait ValidatorHandle {
    fn is_jailed(&self) -> bool;

    fn consensus_pubkey(&self) -> ConsPubKey;

    fn operator_address(&self) -> ValAddress;

    /// Tokens backing `shares` of this validator's delegator shares (truncated).
    fn tokens_from_shares(&self, shares: Dec) -> u128;

    fn min_self_delegation(&self) -> u128;

    fn cons_address(&self) -> ConsAddress {
        self.consensus_pubkey().address()
    }
}

/// A delegator's stake in one validator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delegation {
    pub delegator: AccAddress,
    pub validator: ValAddress,
    pub shares: Dec,
}

/// Operations the slashing core needs from staking.
pub trait StakingKeeper {
    type Validator: ValidatorHandle;

    /// False for unknown validators.
    fn is_jailed(&self, addr: &ConsAddress) -> bool;

    fn validator(&self, operator: &ValAddress) -> Option<Self::Validator>;

    fn validator_by_cons_addr(&self, addr: &ConsAddress) -> Option<Self::Validator>;

    fn delegation(&self, delegator: &AccAddress, validator: &ValAddress) -> Option<Delegation>;

    /// Evidence older than this (in block time) is ignored.
    fn max_evidence_age(&self) -> Duration;

    /// Burns `fraction` of the stake the validator had at `distribution_height`. Returns the burned amount.
    fn slash(
        &mut self,
        addr: &ConsAddress,
        distribution_height: i64,
        power: i64,
        fraction: Dec,
        reason: Infraction,
    ) -> Result<u128>;

    fn jail(&mut self, addr: &ConsAddress) -> Result<()>;

    fn unjail(&mut self, addr: &ConsAddress) -> Result<()>;

    /// Visits every validator in a deterministic order. The visitor returns `true` to stop early.
    fn iterate_validators(&self, visit: &mut dyn FnMut(&Self::Validator) -> bool);
}

/// Validator record held by `InMemoryStaking`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InMemoryValidator {
    pub operator: ValAddress,
    pub consensus_pubkey: ConsPubKey,
    pub tokens: u128,
    pub delegator_shares: Dec,
    pub min_self_delegation: u128,
    pub jailed: bool,
}

impl ValidatorHandle for InMemoryValidator {
    fn is_jailed(&self) -> bool {
        self.jailed
    }

    fn consensus_pubkey(&self) -> ConsPubKey {
        self.consensus_pubkey.clone()
    }

    fn operator_address(&self) -> ValAddress {
        self.operator.clone()
    }

    fn tokens_from_shares(&self, shares: Dec) -> u128 {
        if self.delegator_shares.is_zero() {
            return 0;
        }
        shares
            .raw()
            .checked_mul(self.tokens)
            .map(|v| v / self.delegator_shares.raw())
            .unwrap_or_else(|| {
                // Large values: divide first, accepting the extra truncation.
                (shares.raw() / self.delegator_shares.raw()).saturating_mul(self.tokens)
            })
    }

    fn min_self_delegation(&self) -> u128 {
        self.min_self_delegation
    }
}

/// One `slash` call observed by `InMemoryStaking`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlashRecord {
    pub cons_addr: ConsAddress,
    pub distribution_height: i64,
    pub power: i64,
    pub fraction: Dec,
    pub reason: Infraction,
    pub burned: u128,
}

/// `BTreeMap`-backed staking used by tests, genesis tooling and the simulator.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStaking {
    validators: BTreeMap<ValAddress, InMemoryValidator>,
    by_cons_addr: BTreeMap<ConsAddress, ValAddress>,
    delegations: BTreeMap<(AccAddress, ValAddress), Delegation>,
    max_evidence_age: Duration,
    slashes: Vec<SlashRecord>,
    jail_count: u64,
    unjail_count: u64,
}

impl InMemoryStaking {
    pub fn new(max_evidence_age: Duration) -> Self {
        Self {
            max_evidence_age,
            ..Self::default()
        }
    }

    /// Creates a validator self-bonded with `self_bond` tokens (shares 1:1). Replaces any validator with the same operator.
    pub fn add_validator(
        &mut self,
        operator: ValAddress,
        consensus_pubkey: ConsPubKey,
        self_bond: u128,
        min_self_delegation: u128,
    ) -> Result<()> {
        let shares = Dec::from_int(self_bond)
            .ok_or_else(|| SlashingError::Staking(format!("self bond {} too large", self_bond)))?;
        self.by_cons_addr
            .insert(consensus_pubkey.address(), operator.clone());
        self.validators.insert(
            operator.clone(),
            InMemoryValidator {
                operator: operator.clone(),
                consensus_pubkey,
                tokens: self_bond,
                delegator_shares: shares,
                min_self_delegation,
                jailed: false,
            },
        );
        let delegator = AccAddress::from(&operator);
        self.delegations.insert(
            (delegator.clone(), operator.clone()),
            Delegation {
                delegator,
                validator: operator,
                shares,
            },
        );
        Ok(())
    }

    /// Removes the validator and its delegations.
    pub fn remove_validator(&mut self, operator: &ValAddress) -> Option<InMemoryValidator> {
        let removed = self.validators.remove(operator)?;
        self.by_cons_addr.remove(&removed.consensus_pubkey.address());
        self.delegations.retain(|(_, v), _| v != operator);
        Some(removed)
    }

    pub fn remove_delegation(&mut self, delegator: &AccAddress, operator: &ValAddress) -> Option<Delegation> {
        self.delegations.remove(&(delegator.clone(), operator.clone()))
    }

    pub fn set_min_self_delegation(&mut self, operator: &ValAddress, amount: u128) -> Result<()> {
        let v = self
            .validators
            .get_mut(operator)
            .ok_or_else(|| SlashingError::Staking(format!("unknown validator {}", operator)))?;
        v.min_self_delegation = amount;
        Ok(())
    }

    pub fn get(&self, operator: &ValAddress) -> Option<&InMemoryValidator> {
        self.validators.get(operator)
    }

    pub fn slashes(&self) -> &[SlashRecord] {
        &self.slashes
    }

    pub fn jail_count(&self) -> u64 {
        self.jail_count
    }

    pub fn unjail_count(&self) -> u64 {
        self.unjail_count
    }

    fn validator_mut(&mut self, addr: &ConsAddress) -> Result<&mut InMemoryValidator> {
        let operator = self
            .by_cons_addr
            .get(addr)
            .ok_or_else(|| SlashingError::Staking(format!("no validator for {}", addr)))?;
        self.validators
            .get_mut(operator)
            .ok_or_else(|| SlashingError::Staking(format!("dangling consensus index for {}", addr)))
    }
}

impl StakingKeeper for InMemoryStaking {
    type Validator = InMemoryValidator;

    fn is_jailed(&self, addr: &ConsAddress) -> bool {
        self.validator_by_cons_addr(addr)
            .map(|v| v.jailed)
            .unwrap_or(false)
    }

    fn validator(&self, operator: &ValAddress) -> Option<InMemoryValidator> {
        self.validators.get(operator).cloned()
    }

    fn validator_by_cons_addr(&self, addr: &ConsAddress) -> Option<InMemoryValidator> {
        self.by_cons_addr
            .get(addr)
            .and_then(|op| self.validators.get(op))
            .cloned()
    }

    fn delegation(&self, delegator: &AccAddress, validator: &ValAddress) -> Option<Delegation> {
        self.delegations
            .get(&(delegator.clone(), validator.clone()))
            .cloned()
    }

    fn max_evidence_age(&self) -> Duration {
        self.max_evidence_age
    }

    fn slash(
        &mut self,
        addr: &ConsAddress,
        distribution_height: i64,
        power: i64,
        fraction: Dec,
        reason: Infraction,
    ) -> Result<u128> {
        let v = self.validator_mut(addr)?;
        let burned = fraction.mul_int_floor(v.tokens).unwrap_or(v.tokens).min(v.tokens);
        v.tokens -= burned;
        self.slashes.push(SlashRecord {
            cons_addr: addr.clone(),
            distribution_height,
            power,
            fraction,
            reason,
            burned,
        });
        Ok(burned)
    }

    fn jail(&mut self, addr: &ConsAddress) -> Result<()> {
        let v = self.validator_mut(addr)?;
        if v.jailed {
            return Err(SlashingError::Staking(format!("validator {} already jailed", addr)));
        }
        v.jailed = true;
        self.jail_count += 1;
        Ok(())
    }

    fn unjail(&mut self, addr: &ConsAddress) -> Result<()> {
        let v = self.validator_mut(addr)?;
        if !v.jailed {
            return Err(SlashingError::Staking(format!("validator {} not jailed", addr)));
        }
        v.jailed = false;
        self.unjail_count += 1;
        Ok(())
    }

    fn iterate_validators(&self, visit: &mut dyn FnMut(&InMemoryValidator) -> bool) {
        for v in self.validators.values() {
            if visit(v) {
                break;
            }
        }
    }
}
