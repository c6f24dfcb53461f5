//! Missed-Block Bitmap.
//!
//! Logically `signed_blocks_window` bits per validator, one per window slot, set when the validator missed the
//! block that fell into that slot. Physically stored in chunks of `CHUNK_SIZE` bits under
//! `0x02 ‖ LP(addr) ‖ u64_le(chunk_index)`. An absent chunk reads as all zeros.
//!
//! # Bit order
//! Bit `i` of a chunk is bit `i % 8` (LSB first) of byte `i / 8`.
//!
//! # Invariants
//! - Bits at or beyond the window are never read or written by the core.
//! - Chunks are not removed when they become all zero; only `delete_all` removes them.

use std::collections::BTreeMap;

use crate::core::keys;
use crate::core::store::KvStore;
use crate::core::types::ConsAddress;
use crate::error::{Result, SlashingError};

/// Bits per stored chunk.
pub const CHUNK_SIZE: u64 = 1024;

/// Bytes per stored chunk.
pub const CHUNK_BYTES: usize = (CHUNK_SIZE / 8) as usize;

/// Splits a window index into `(chunk_index, bit_within_chunk)`.
pub fn chunk_position(index: u64) -> (u64, u64) {
    (index / CHUNK_SIZE, index % CHUNK_SIZE)
}

fn read_chunk(store: &dyn KvStore, addr: &ConsAddress, chunk_index: u64) -> Result<Vec<u8>> {
    match store.get(&keys::missed_bitmap_chunk_key(addr, chunk_index))? {
        Some(chunk) => check_chunk(chunk),
        None => Ok(vec![0u8; CHUNK_BYTES]),
    }
}

fn check_chunk(chunk: Vec<u8>) -> Result<Vec<u8>> {
    if chunk.len() != CHUNK_BYTES {
        return Err(SlashingError::Codec(format!(
            "bitmap chunk must be {} bytes, got {}",
            CHUNK_BYTES,
            chunk.len()
        )));
    }
    Ok(chunk)
}

fn bit_of(chunk: &[u8], bit: u64) -> bool {
    let byte = chunk[(bit / 8) as usize];
    byte & (1u8 << (bit % 8)) != 0
}

/// Whether the validator missed the block in window slot `index`. False if the chunk is absent.
pub fn get_bit(store: &dyn KvStore, addr: &ConsAddress, index: u64) -> Result<bool> {
    let (chunk_index, bit) = chunk_position(index);
    let chunk = read_chunk(store, addr, chunk_index)?;
    Ok(bit_of(&chunk, bit))
}

/// Sets window slot `index` to `missed`, writing the containing chunk back.
pub fn set_bit(store: &mut dyn KvStore, addr: &ConsAddress, index: u64, missed: bool) -> Result<()> {
    let (chunk_index, bit) = chunk_position(index);
    let mut chunk = read_chunk(store, addr, chunk_index)?;
    let byte = &mut chunk[(bit / 8) as usize];
    let mask = 1u8 << (bit % 8);
    if missed {
        *byte |= mask;
    } else {
        *byte &= !mask;
    }
    store.set(&keys::missed_bitmap_chunk_key(addr, chunk_index), &chunk)?;
    Ok(())
}

/// Removes every chunk of the validator's bitmap.
pub fn delete_all(store: &mut dyn KvStore, addr: &ConsAddress) -> Result<()> {
    let prefix = keys::missed_bitmap_prefix(addr);
    for (key, _) in store.prefix_scan(&prefix)? {
        store.delete(&key)?;
    }
    Ok(())
}

fn load_chunks(store: &dyn KvStore, addr: &ConsAddress) -> Result<BTreeMap<u64, Vec<u8>>> {
    let prefix = keys::missed_bitmap_prefix(addr);
    store
        .prefix_scan(&prefix)?
        .into_iter()
        .map(|(key, chunk)| Ok((keys::chunk_index_from_key(&prefix, &key)?, check_chunk(chunk)?)))
        .collect()
}

/// Every `(index, missed)` over `[0, window)` in ascending index order.
pub fn iterate(store: &dyn KvStore, addr: &ConsAddress, window: i64) -> Result<Vec<(i64, bool)>> {
    let chunks = load_chunks(store, addr)?;
    let window = window.max(0) as u64;
    let mut out = Vec::with_capacity(window as usize);
    for index in 0..window {
        let (chunk_index, bit) = chunk_position(index);
        let missed = chunks
            .get(&chunk_index)
            .map(|c| bit_of(c, bit))
            .unwrap_or(false);
        out.push((index as i64, missed));
    }
    Ok(out)
}

/// Indices over `[0, window)` whose bit is set, ascending.
pub fn missed_indices(store: &dyn KvStore, addr: &ConsAddress, window: i64) -> Result<Vec<i64>> {
    Ok(iterate(store, addr, window)?
        .into_iter()
        .filter(|(_, missed)| *missed)
        .map(|(index, _)| index)
        .collect())
}

/// Popcount over `[0, window)`. Recomputes what `missed_blocks_counter` caches.
pub fn count_missed(store: &dyn KvStore, addr: &ConsAddress, window: i64) -> Result<i64> {
    let chunks = load_chunks(store, addr)?;
    let window = window.max(0) as u64;
    let mut count = 0i64;
    for (chunk_index, chunk) in &chunks {
        let base = chunk_index.saturating_mul(CHUNK_SIZE);
        if base >= window {
            break;
        }
        let bits_in_window = (window - base).min(CHUNK_SIZE);
        for bit in 0..bits_in_window {
            if bit_of(chunk, bit) {
                count += 1;
            }
        }
    }
    Ok(count)
}
