//! Borrowed view of everything one slashing operation touches.
//!
//! A context is built per call by `Keeper`. Inside `begin_block` its store is a `CacheStore`, so an error
//! anywhere in the block discards every write the block made.

use crate::core::config::KeeperConfig;
use crate::core::events::EventManager;
use crate::core::staking::StakingKeeper;
use crate::core::store::KvStore;
use crate::core::types::BlockHeader;

pub struct SlashingContext<'a, K: StakingKeeper> {
    pub store: &'a mut dyn KvStore,
    pub staking: &'a mut K,
    pub events: &'a mut EventManager,
    pub header: BlockHeader,
    pub config: &'a KeeperConfig,
}

impl<'a, K: StakingKeeper> SlashingContext<'a, K> {
    pub fn new(
        store: &'a mut dyn KvStore,
        staking: &'a mut K,
        events: &'a mut EventManager,
        header: BlockHeader,
        config: &'a KeeperConfig,
    ) -> Self {
        Self {
            store,
            staking,
            events,
            header,
            config,
        }
    }
}
