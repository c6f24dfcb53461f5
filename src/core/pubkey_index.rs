//! Address ↔ Public Key Index.
//!
//! Recovers the full consensus public key from the short address carried by votes and evidence.
//! Written by the validator-created hook, removed by the validator-removed hook.

use crate::core::keys;
use crate::core::store::KvStore;
use crate::core::types::{ConsAddress, ConsPubKey};
use crate::error::{Result, SlashingError};

/// Stores `pubkey` under `addr`, overwriting any previous entry.
pub fn put_pubkey(store: &mut dyn KvStore, addr: &ConsAddress, pubkey: &ConsPubKey) -> Result<()> {
    store.set(&keys::pubkey_key(addr), pubkey.as_bytes())?;
    Ok(())
}

/// Returns the pubkey for `addr` or `PubkeyNotFound`.
pub fn get_pubkey(store: &dyn KvStore, addr: &ConsAddress) -> Result<ConsPubKey> {
    store
        .get(&keys::pubkey_key(addr))?
        .map(ConsPubKey::new)
        .ok_or_else(|| SlashingError::PubkeyNotFound(addr.clone()))
}

pub fn delete_pubkey(store: &mut dyn KvStore, addr: &ConsAddress) -> Result<()> {
    store.delete(&keys::pubkey_key(addr))?;
    Ok(())
}
