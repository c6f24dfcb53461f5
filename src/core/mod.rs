// Validator slashing core
//
// DETERMINISM GUARANTEES:
// =======================
// 1. Same store, same headers, same votes and evidence in the same order → same final store and events
// 2. No randomness and no system time: block time comes from the header
// 3. All fractional arithmetic is fixed-point integer (`Dec`)
// 4. Store iteration is in ascending key order
//
// INVARIANTS:
// - A block's writes and events are committed together or not at all
// - Votes are processed before evidence within a block
// - Params are read once per block

pub mod begin_block;
pub mod bitmap;
pub mod codec;
pub mod config;
pub mod context;
pub mod decimal;
pub mod equivocation;
pub mod events;
pub mod genesis;
pub mod hooks;
pub mod keys;
pub mod liveness;
pub mod params;
pub mod pubkey_index;
pub mod query;
pub mod signing_info;
pub mod staking;
pub mod store;
pub mod types;

use crate::core::config::KeeperConfig;
use crate::core::context::SlashingContext;
use crate::core::equivocation::Evidence;
use crate::core::events::{Event, EventManager};
use crate::core::genesis::GenesisState;
use crate::core::hooks::StakingHooks;
use crate::core::liveness::VoteInfo;
use crate::core::params::Params;
use crate::core::query::{PageRequest, PageResponse};
use crate::core::signing_info::SigningInfo;
use crate::core::staking::StakingKeeper;
use crate::core::store::{apply_changes, CacheStore, KvStore};
use crate::core::types::{BlockHeader, ConsAddress, ConsPubKey, Timestamp, ValAddress};
use crate::error::Result;

/// Slashing keeper
/// Owns the slashing store, the staking collaborator and the event log, and is the entry point for
/// consensus (begin_block), staking (hooks) and operators (unjail, queries).
///
/// DETERMINISM: every method is a pure function of the stored state and its arguments.
#[derive(Debug)]
pub struct Keeper<S: KvStore, K: StakingKeeper> {
    /// Slashing state (params, signing infos, bitmaps, pubkeys)
    store: S,

    /// Staking subsystem the keeper slashes, jails and unjails through
    staking: K,

    config: KeeperConfig,

    /// Events of committed blocks and direct calls, oldest first
    events: EventManager,
}

impl<S: KvStore, K: StakingKeeper> Keeper<S, K> {
    pub fn new(store: S, staking: K, config: KeeperConfig) -> Self {
        Self {
            store,
            staking,
            config,
            events: EventManager::new(),
        }
    }

    fn ctx(&mut self, header: BlockHeader) -> SlashingContext<'_, K> {
        SlashingContext::new(
            &mut self.store,
            &mut self.staking,
            &mut self.events,
            header,
            &self.config,
        )
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn staking(&self) -> &K {
        &self.staking
    }

    pub fn staking_mut(&mut self) -> &mut K {
        &mut self.staking
    }

    pub fn config(&self) -> &KeeperConfig {
        &self.config
    }

    pub fn events(&self) -> &[Event] {
        self.events.events()
    }

    /// Drains the event log.
    pub fn take_events(&mut self) -> Vec<Event> {
        self.events.take()
    }

    // Params

    pub fn params(&self) -> Result<Params> {
        params::get_params(&self.store)
    }

    /// Validates before writing; an invalid set leaves the stored params untouched.
    pub fn set_params(&mut self, params: &Params) -> Result<()> {
        params::set_params(&mut self.store, params)
    }

    // Pubkey index

    pub fn add_pubkey(&mut self, pubkey: &ConsPubKey) -> Result<()> {
        pubkey_index::put_pubkey(&mut self.store, &pubkey.address(), pubkey)
    }

    pub fn pubkey(&self, addr: &ConsAddress) -> Result<ConsPubKey> {
        pubkey_index::get_pubkey(&self.store, addr)
    }

    pub fn delete_pubkey(&mut self, addr: &ConsAddress) -> Result<()> {
        pubkey_index::delete_pubkey(&mut self.store, addr)
    }

    // Signing info

    pub fn get_signing_info(&self, addr: &ConsAddress) -> Result<Option<SigningInfo>> {
        signing_info::get_signing_info(&self.store, addr)
    }

    pub fn set_signing_info(&mut self, addr: &ConsAddress, info: &SigningInfo) -> Result<()> {
        signing_info::set_signing_info(&mut self.store, addr, info)
    }

    pub fn has_signing_info(&self, addr: &ConsAddress) -> Result<bool> {
        signing_info::has_signing_info(&self.store, addr)
    }

    pub fn walk_signing_infos(&self) -> Result<Vec<(ConsAddress, SigningInfo)>> {
        signing_info::walk_signing_infos(&self.store)
    }

    pub fn jail_until(&mut self, addr: &ConsAddress, until: Timestamp) -> Result<()> {
        signing_info::jail_until(&mut self.store, addr, until)
    }

    pub fn tombstone(&mut self, addr: &ConsAddress) -> Result<()> {
        signing_info::tombstone(&mut self.store, addr)
    }

    pub fn is_tombstoned(&self, addr: &ConsAddress) -> Result<bool> {
        signing_info::is_tombstoned(&self.store, addr)
    }

    // Missed-block bitmap

    pub fn missed_block_bit(&self, addr: &ConsAddress, index: u64) -> Result<bool> {
        bitmap::get_bit(&self.store, addr, index)
    }

    pub fn set_missed_block_bit(&mut self, addr: &ConsAddress, index: u64, missed: bool) -> Result<()> {
        bitmap::set_bit(&mut self.store, addr, index, missed)
    }

    pub fn delete_missed_blocks(&mut self, addr: &ConsAddress) -> Result<()> {
        bitmap::delete_all(&mut self.store, addr)
    }

    /// `(index, missed)` over the current window.
    pub fn missed_blocks(&self, addr: &ConsAddress) -> Result<Vec<(i64, bool)>> {
        let window = self.params()?.signed_blocks_window;
        bitmap::iterate(&self.store, addr, window)
    }

    /// Popcount of the bitmap over the current window, recomputed from storage.
    /// Equal to the signing info's cached counter whenever no update is in progress.
    pub fn missed_block_count(&self, addr: &ConsAddress) -> Result<i64> {
        let window = self.params()?.signed_blocks_window;
        bitmap::count_missed(&self.store, addr, window)
    }

    // Handlers

    /// Processes one vote outside a block. Writes go straight to the store.
    pub fn handle_validator_signature(&mut self, header: BlockHeader, vote: &VoteInfo) -> Result<()> {
        let params = self.params()?;
        self.ctx(header).handle_validator_signature(&params, vote)
    }

    /// Processes one piece of evidence outside a block. Writes go straight to the store.
    pub fn handle_equivocation(&mut self, header: BlockHeader, evidence: &Evidence) -> Result<()> {
        let params = self.params()?;
        self.ctx(header).handle_equivocation(&params, evidence)
    }

    /// Runs the slashing part of begin-block.
    ///
    /// All store writes go to a cache first and reach the store only if every vote and every piece of
    /// evidence was handled. On error the store and the event log are exactly as before the call.
    /// Calls already made into staking are not rolled back; the host aborts the block as a whole.
    pub fn begin_block(&mut self, header: BlockHeader, votes: &[VoteInfo], evidence: &[Evidence]) -> Result<()> {
        let mut block_events = EventManager::new();
        let changes = {
            let mut cache = CacheStore::new(&self.store);
            let mut ctx = SlashingContext::new(
                &mut cache,
                &mut self.staking,
                &mut block_events,
                header,
                &self.config,
            );
            ctx.begin_block(votes, evidence)?;
            cache.into_changes()
        };
        apply_changes(&mut self.store, changes)?;
        self.events.extend(block_events.take());
        Ok(())
    }

    pub fn unjail(&mut self, header: BlockHeader, operator: &ValAddress) -> Result<()> {
        self.ctx(header).unjail(operator)
    }

    // Genesis

    pub fn init_genesis(&mut self, header: BlockHeader, genesis: &GenesisState) -> Result<()> {
        self.ctx(header).init_genesis(genesis)
    }

    pub fn export_genesis(&self) -> Result<GenesisState> {
        genesis::export_genesis(&self.store)
    }

    // Queries

    pub fn query_params(&self) -> Result<Params> {
        query::query_params(&self.store)
    }

    pub fn query_signing_info(&self, addr: &ConsAddress) -> Result<SigningInfo> {
        query::query_signing_info(&self.store, addr)
    }

    pub fn query_signing_infos(&self, req: PageRequest) -> Result<PageResponse> {
        query::query_signing_infos(&self.store, req)
    }
}

impl<S: KvStore, K: StakingKeeper> StakingHooks for Keeper<S, K> {
    fn after_validator_created(&mut self, header: BlockHeader, operator: &ValAddress) -> Result<()> {
        self.ctx(header).after_validator_created(operator)
    }

    fn after_validator_removed(
        &mut self,
        header: BlockHeader,
        cons_addr: &ConsAddress,
        _operator: &ValAddress,
    ) -> Result<()> {
        self.ctx(header).after_validator_removed(cons_addr)
    }

    fn after_validator_bonded(
        &mut self,
        header: BlockHeader,
        cons_addr: &ConsAddress,
        _operator: &ValAddress,
    ) -> Result<()> {
        self.ctx(header).after_validator_bonded(cons_addr)
    }
}
