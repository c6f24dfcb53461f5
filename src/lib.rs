pub mod error;
pub mod core;

pub use error::{Result, SlashingError};

// Core API exports
pub use core::Keeper;
pub use core::config::{KeeperConfig, DEFAULT_VALIDATOR_UPDATE_DELAY};
pub use core::context::SlashingContext;
pub use core::decimal::{Dec, DecError, DEC_PRECISION, DEC_SCALE};
pub use core::types::{
    AccAddress,
    BlockHeader,
    ConsAddress,
    ConsPubKey,
    Timestamp,
    ValAddress,
    ADDRESS_LEN,
    MAX_ADDRESS_LEN,
    MAX_TIMESTAMP_SECONDS,
};
pub use core::store::{apply_changes, CacheStore, KvPair, KvStore, MemStore, StoreError};
pub use core::keys::{
    prefix_end,
    MISSED_BITMAP_PREFIX,
    PARAMS_KEY,
    PUBKEY_PREFIX,
    SIGNING_INFO_PREFIX,
};
pub use core::params::{
    Params,
    get_params,
    set_params,
    DEFAULT_DOWNTIME_JAIL_DURATION,
    DEFAULT_SIGNED_BLOCKS_WINDOW,
};
pub use core::signing_info::SigningInfo;
pub use core::bitmap::{CHUNK_BYTES, CHUNK_SIZE};
pub use core::staking::{
    Delegation,
    InMemoryStaking,
    InMemoryValidator,
    Infraction,
    SlashRecord,
    StakingKeeper,
    ValidatorHandle,
};
pub use core::events::{
    Event,
    EventManager,
    EVENT_TYPE_LIVENESS,
    EVENT_TYPE_SLASH,
    ATTRIBUTE_VALUE_DOUBLE_SIGN,
    ATTRIBUTE_VALUE_MISSING_SIGNATURE,
};
pub use core::liveness::{BlockIdFlag, VoteInfo};
pub use core::equivocation::Evidence;
pub use core::hooks::StakingHooks;
pub use core::genesis::{
    GenesisState,
    MissedBlock,
    SigningInfoEntry,
    ValidatorMissedBlocks,
    export_genesis,
};
pub use core::query::{PageRequest, PageResponse, DEFAULT_PAGE_LIMIT};
