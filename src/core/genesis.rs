//! Genesis import and export.
//!
//! # Canonical form
//! `export_genesis` lists signing infos in store-key order, one `missed_blocks` entry per signing info in the
//! same order, and only the indices whose bit is set. A genesis in that form survives
//! `export_genesis(init_genesis(g)) == g` unchanged.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::core::bitmap;
use crate::core::context::SlashingContext;
use crate::core::params::{self, Params};
use crate::core::pubkey_index;
use crate::core::signing_info::{self, SigningInfo};
use crate::core::staking::{StakingKeeper, ValidatorHandle};
use crate::core::store::KvStore;
use crate::core::types::{ConsAddress, ConsPubKey};
use crate::error::{Result, SlashingError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningInfoEntry {
    pub address: ConsAddress,
    pub validator_signing_info: SigningInfo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissedBlock {
    pub index: i64,
    pub missed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorMissedBlocks {
    pub address: ConsAddress,
    pub missed_blocks: Vec<MissedBlock>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisState {
    pub params: Params,
    #[serde(default)]
    pub signing_infos: Vec<SigningInfoEntry>,
    #[serde(default)]
    pub missed_blocks: Vec<ValidatorMissedBlocks>,
}

impl GenesisState {
    pub fn from_json(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Structural checks. Addresses are already decoded by deserialization.
    pub fn validate(&self) -> Result<()> {
        self.params.validate()?;
        let window = self.params.signed_blocks_window;

        let mut seen = BTreeSet::new();
        for entry in &self.signing_infos {
            let info = &entry.validator_signing_info;
            if info.address != entry.address {
                return Err(SlashingError::InvalidGenesis(format!(
                    "signing info for {} carries address {}",
                    entry.address, info.address
                )));
            }
            if !seen.insert(&entry.address) {
                return Err(SlashingError::InvalidGenesis(format!(
                    "duplicate signing info for {}",
                    entry.address
                )));
            }
            if info.missed_blocks_counter < 0 || info.missed_blocks_counter > window {
                return Err(SlashingError::InvalidGenesis(format!(
                    "missed blocks counter {} of {} outside [0, {}]",
                    info.missed_blocks_counter, entry.address, window
                )));
            }
            if info.index_offset < 0 || info.index_offset == i64::MAX {
                return Err(SlashingError::InvalidGenesis(format!(
                    "index offset {} of {} out of range",
                    info.index_offset, entry.address
                )));
            }
            if info.start_height > i64::MAX - window {
                return Err(SlashingError::InvalidGenesis(format!(
                    "start height {} of {} leaves no room for a window of {}",
                    info.start_height, entry.address, window
                )));
            }
        }

        let mut set_bits: BTreeMap<&ConsAddress, BTreeSet<i64>> = BTreeMap::new();
        for entry in &self.missed_blocks {
            if set_bits.insert(&entry.address, BTreeSet::new()).is_some() {
                return Err(SlashingError::InvalidGenesis(format!(
                    "duplicate missed blocks for {}",
                    entry.address
                )));
            }
            if !seen.contains(&entry.address) {
                return Err(SlashingError::InvalidGenesis(format!(
                    "missed blocks for {} without signing info",
                    entry.address
                )));
            }
            for block in &entry.missed_blocks {
                if block.index < 0 || block.index >= window {
                    return Err(SlashingError::InvalidGenesis(format!(
                        "missed block index {} of {} outside [0, {})",
                        block.index, entry.address, window
                    )));
                }
                if block.missed {
                    set_bits.entry(&entry.address).or_default().insert(block.index);
                }
            }
        }

        // The cached counter must agree with the bits it summarizes.
        for entry in &self.signing_infos {
            let set = set_bits.get(&entry.address).map_or(0, |bits| bits.len() as i64);
            let counter = entry.validator_signing_info.missed_blocks_counter;
            if counter != set {
                return Err(SlashingError::InvalidGenesis(format!(
                    "missed blocks counter {} of {} does not match {} missed blocks",
                    counter, entry.address, set
                )));
            }
        }
        Ok(())
    }
}

impl<K: StakingKeeper> SlashingContext<'_, K> {
    /// Registers every staking validator's pubkey, then writes signing infos, set bits and params.
    pub fn init_genesis(&mut self, genesis: &GenesisState) -> Result<()> {
        genesis.validate()?;

        let mut pubkeys: Vec<ConsPubKey> = Vec::new();
        self.staking.iterate_validators(&mut |v| {
            pubkeys.push(v.consensus_pubkey());
            false
        });
        for pubkey in &pubkeys {
            pubkey_index::put_pubkey(self.store, &pubkey.address(), pubkey)?;
        }

        for entry in &genesis.signing_infos {
            signing_info::set_signing_info(self.store, &entry.address, &entry.validator_signing_info)?;
        }
        for entry in &genesis.missed_blocks {
            for block in entry.missed_blocks.iter().filter(|b| b.missed) {
                bitmap::set_bit(self.store, &entry.address, block.index as u64, true)?;
            }
        }
        params::set_params(self.store, &genesis.params)?;

        info!(
            validators = pubkeys.len(),
            signing_infos = genesis.signing_infos.len(),
            "slashing genesis initialized"
        );
        Ok(())
    }
}

/// Exports the store in canonical form.
pub fn export_genesis(store: &dyn KvStore) -> Result<GenesisState> {
    let params = params::get_params(store)?;
    let window = params.signed_blocks_window;

    let mut signing_infos = Vec::new();
    let mut missed_blocks = Vec::new();
    for (address, info) in signing_info::walk_signing_infos(store)? {
        let missed = bitmap::missed_indices(store, &address, window)?
            .into_iter()
            .map(|index| MissedBlock { index, missed: true })
            .collect();
        missed_blocks.push(ValidatorMissedBlocks {
            address: address.clone(),
            missed_blocks: missed,
        });
        signing_infos.push(SigningInfoEntry {
            address,
            validator_signing_info: info,
        });
    }

    Ok(GenesisState {
        params,
        signing_infos,
        missed_blocks,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(b: u8) -> ConsAddress {
        ConsAddress::from([b; 20])
    }

    fn entry(b: u8) -> SigningInfoEntry {
        SigningInfoEntry {
            address: addr(b),
            validator_signing_info: SigningInfo::new(addr(b), 1),
        }
    }

    #[test]
    fn test_default_is_valid() {
        GenesisState::default().validate().unwrap();
    }

    #[test]
    fn test_rejects_mismatched_and_duplicate_entries() {
        let mut g = GenesisState::default();
        let mut bad = entry(1);
        bad.validator_signing_info.address = addr(2);
        g.signing_infos = vec![bad];
        assert!(matches!(g.validate(), Err(SlashingError::InvalidGenesis(_))));

        g.signing_infos = vec![entry(1), entry(1)];
        assert!(matches!(g.validate(), Err(SlashingError::InvalidGenesis(_))));
    }

    #[test]
    fn test_rejects_out_of_range_values() {
        let mut g = GenesisState::default();
        let mut e = entry(1);
        e.validator_signing_info.missed_blocks_counter = g.params.signed_blocks_window + 1;
        g.signing_infos = vec![e];
        assert!(g.validate().is_err());

        g.signing_infos = vec![entry(1)];
        g.missed_blocks = vec![ValidatorMissedBlocks {
            address: addr(1),
            missed_blocks: vec![MissedBlock {
                index: g.params.signed_blocks_window,
                missed: true,
            }],
        }];
        assert!(g.validate().is_err());

        g.missed_blocks[0].missed_blocks[0].index = 0;
        g.signing_infos[0].validator_signing_info.missed_blocks_counter = 1;
        g.validate().unwrap();

        g.missed_blocks[0].address = addr(3);
        assert!(g.validate().is_err());
    }

    #[test]
    fn test_rejects_counter_out_of_step_with_bits() {
        let mut g = GenesisState::default();
        g.signing_infos = vec![entry(1)];
        g.missed_blocks = vec![ValidatorMissedBlocks {
            address: addr(1),
            missed_blocks: vec![
                MissedBlock { index: 0, missed: true },
                MissedBlock { index: 4, missed: false },
            ],
        }];
        assert!(matches!(g.validate(), Err(SlashingError::InvalidGenesis(_))));

        g.signing_infos[0].validator_signing_info.missed_blocks_counter = 1;
        g.validate().unwrap();

        // A repeated index is one bit.
        g.missed_blocks[0].missed_blocks.push(MissedBlock { index: 0, missed: true });
        g.validate().unwrap();

        g.signing_infos[0].validator_signing_info.missed_blocks_counter = 2;
        assert!(g.validate().is_err());

        // No missed blocks entry at all means zero set bits.
        g.missed_blocks.clear();
        assert!(g.validate().is_err());
        g.signing_infos[0].validator_signing_info.missed_blocks_counter = 0;
        g.validate().unwrap();
    }

    #[test]
    fn test_rejects_overflowing_heights_and_offsets() {
        let mut g = GenesisState::default();
        let window = g.params.signed_blocks_window;
        let mut e = entry(1);
        e.validator_signing_info.start_height = i64::MAX - window + 1;
        g.signing_infos = vec![e];
        assert!(matches!(g.validate(), Err(SlashingError::InvalidGenesis(_))));

        g.signing_infos[0].validator_signing_info.start_height = i64::MAX - window;
        g.validate().unwrap();

        g.signing_infos[0].validator_signing_info.index_offset = i64::MAX;
        assert!(matches!(g.validate(), Err(SlashingError::InvalidGenesis(_))));
        g.signing_infos[0].validator_signing_info.index_offset = -1;
        assert!(g.validate().is_err());
    }

    #[test]
    fn test_json_shape() {
        let mut g = GenesisState::default();
        g.signing_infos = vec![entry(1)];
        let json = g.to_json_pretty().unwrap();
        assert!(json.contains("\"validator_signing_info\""));
        assert!(json.contains("\"downtime_jail_duration\": \"600s\""));
        assert_eq!(GenesisState::from_json(&json).unwrap(), g);
        assert!(matches!(
            GenesisState::from_json("{\"params\": 1}"),
            Err(SlashingError::InvalidGenesis(_))
        ));
    }
}
