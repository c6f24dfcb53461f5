//! Signing Info Record.
//!
//! One record per consensus address, created on first bond and never deleted. The store itself enforces
//! nothing; the signature and equivocation handlers own the invariants.
//!
//! # Invariants
//! - `missed_blocks_counter == popcount(bitmap over [0, signed_blocks_window))` outside a signature update.
//! - `0 <= missed_blocks_counter <= signed_blocks_window`.
//! - `tombstoned` is only ever set, never cleared.

use serde::{Deserialize, Serialize};

use crate::core::codec;
use crate::core::keys;
use crate::core::store::KvStore;
use crate::core::types::{ConsAddress, Timestamp};
use crate::error::{Result, SlashingError};

/// Liveness bookkeeping for one validator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningInfo {
    pub address: ConsAddress,
    /// Height at which the current signing window started.
    pub start_height: i64,
    /// Blocks the validator should have signed since `start_height`; the window slot is `index_offset mod window`.
    pub index_offset: i64,
    /// Unjailing is forbidden before this time. `Timestamp::EPOCH` means never jailed.
    pub jailed_until: Timestamp,
    pub tombstoned: bool,
    /// Cached popcount of the missed-block bitmap.
    pub missed_blocks_counter: i64,
}

impl SigningInfo {
    /// Fresh record for a validator bonded at `start_height`.
    pub fn new(address: ConsAddress, start_height: i64) -> Self {
        Self {
            address,
            start_height,
            index_offset: 0,
            jailed_until: Timestamp::EPOCH,
            tombstoned: false,
            missed_blocks_counter: 0,
        }
    }
}

pub fn get_signing_info(store: &dyn KvStore, addr: &ConsAddress) -> Result<Option<SigningInfo>> {
    match store.get(&keys::signing_info_key(addr))? {
        Some(raw) => codec::decode_signing_info(&raw).map(Some),
        None => Ok(None),
    }
}

/// Like `get_signing_info`, but absence is an error.
pub fn must_get_signing_info(store: &dyn KvStore, addr: &ConsAddress) -> Result<SigningInfo> {
    get_signing_info(store, addr)?.ok_or_else(|| SlashingError::SigningInfoNotFound(addr.clone()))
}

pub fn set_signing_info(store: &mut dyn KvStore, addr: &ConsAddress, info: &SigningInfo) -> Result<()> {
    store.set(&keys::signing_info_key(addr), &codec::encode_signing_info(info))?;
    Ok(())
}

pub fn has_signing_info(store: &dyn KvStore, addr: &ConsAddress) -> Result<bool> {
    Ok(store.has(&keys::signing_info_key(addr))?)
}

/// Every signing info in store-key order (length prefix, then address bytes).
pub fn walk_signing_infos(store: &dyn KvStore) -> Result<Vec<(ConsAddress, SigningInfo)>> {
    store
        .prefix_scan(&[keys::SIGNING_INFO_PREFIX])?
        .into_iter()
        .map(|(key, raw)| {
            let addr = keys::address_from_signing_info_key(&key)?;
            let info = codec::decode_signing_info(&raw)?;
            Ok((addr, info))
        })
        .collect()
}

/// Sets `jailed_until`. Fails if the validator has no signing info.
pub fn jail_until(store: &mut dyn KvStore, addr: &ConsAddress, until: Timestamp) -> Result<()> {
    let mut info = must_get_signing_info(store, addr)?;
    info.jailed_until = until;
    set_signing_info(store, addr, &info)
}

/// Marks the validator tombstoned. Fails if it has no signing info or is already tombstoned.
pub fn tombstone(store: &mut dyn KvStore, addr: &ConsAddress) -> Result<()> {
    let mut info = must_get_signing_info(store, addr)?;
    if info.tombstoned {
        return Err(SlashingError::AlreadyTombstoned(addr.clone()));
    }
    info.tombstoned = true;
    set_signing_info(store, addr, &info)
}

/// False when no signing info exists.
pub fn is_tombstoned(store: &dyn KvStore, addr: &ConsAddress) -> Result<bool> {
    Ok(get_signing_info(store, addr)?.map(|i| i.tombstoned).unwrap_or(false))
}
