//! Store key layout.
//!
//! | Key                                          | Value            |
//! |----------------------------------------------|------------------|
//! | `0x00`                                       | params           |
//! | `0x01 ‖ LP(cons_addr)`                       | signing info     |
//! | `0x02 ‖ LP(cons_addr) ‖ u64_le(chunk_index)` | raw bitmap chunk |
//! | `0x03 ‖ cons_addr`                           | consensus pubkey |
//!
//! `LP(x)` is `len(x) as one byte ‖ x`.

use crate::core::types::ConsAddress;
use crate::error::{Result, SlashingError};

pub const PARAMS_KEY: &[u8] = &[0x00];
pub const SIGNING_INFO_PREFIX: u8 = 0x01;
pub const MISSED_BITMAP_PREFIX: u8 = 0x02;
pub const PUBKEY_PREFIX: u8 = 0x03;

fn length_prefixed(addr: &ConsAddress) -> Vec<u8> {
    let bytes = addr.as_bytes();
    // ConsAddress guarantees 1..=255 bytes.
    let mut out = Vec::with_capacity(1 + bytes.len());
    out.push(bytes.len() as u8);
    out.extend_from_slice(bytes);
    out
}

pub fn signing_info_key(addr: &ConsAddress) -> Vec<u8> {
    let mut key = vec![SIGNING_INFO_PREFIX];
    key.extend(length_prefixed(addr));
    key
}

/// Recovers the address from a signing-info key.
pub fn address_from_signing_info_key(key: &[u8]) -> Result<ConsAddress> {
    match key.split_first() {
        Some((&SIGNING_INFO_PREFIX, rest)) => address_from_length_prefixed(rest)
            .map(|(addr, _)| addr),
        _ => Err(SlashingError::Codec(format!(
            "not a signing info key: {}",
            hex::encode(key)
        ))),
    }
}

fn address_from_length_prefixed(bytes: &[u8]) -> Result<(ConsAddress, &[u8])> {
    let (&len, rest) = bytes
        .split_first()
        .ok_or_else(|| SlashingError::Codec("empty length-prefixed address".to_string()))?;
    let len = len as usize;
    if rest.len() < len {
        return Err(SlashingError::Codec(format!(
            "address length prefix {} exceeds key remainder {}",
            len,
            rest.len()
        )));
    }
    let addr = ConsAddress::new(rest[..len].to_vec())?;
    Ok((addr, &rest[len..]))
}

/// Prefix covering every bitmap chunk of `addr`.
pub fn missed_bitmap_prefix(addr: &ConsAddress) -> Vec<u8> {
    let mut key = vec![MISSED_BITMAP_PREFIX];
    key.extend(length_prefixed(addr));
    key
}

pub fn missed_bitmap_chunk_key(addr: &ConsAddress, chunk_index: u64) -> Vec<u8> {
    let mut key = missed_bitmap_prefix(addr);
    key.extend_from_slice(&chunk_index.to_le_bytes());
    key
}

/// Recovers the chunk index from a chunk key under `prefix`.
pub fn chunk_index_from_key(prefix: &[u8], key: &[u8]) -> Result<u64> {
    let suffix = key
        .strip_prefix(prefix)
        .ok_or_else(|| SlashingError::Codec("chunk key outside bitmap prefix".to_string()))?;
    let raw: [u8; 8] = suffix.try_into().map_err(|_| {
        SlashingError::Codec(format!("chunk index must be 8 bytes, got {}", suffix.len()))
    })?;
    Ok(u64::from_le_bytes(raw))
}

pub fn pubkey_key(addr: &ConsAddress) -> Vec<u8> {
    let mut key = vec![PUBKEY_PREFIX];
    key.extend_from_slice(addr.as_bytes());
    key
}

/// Exclusive upper bound of a prefix scan; `None` when the prefix is empty or all `0xFF`.
pub fn prefix_end(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut end = prefix.to_vec();
    while let Some(last) = end.pop() {
        if last < 0xff {
            end.push(last + 1);
            return Some(end);
        }
    }
    None
}
