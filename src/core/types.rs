//! Identifiers, keys and time values shared by every slashing component.
//!
//! # Determinism
//! Block time always comes from the header (`BlockHeader::time`); nothing here reads the system clock.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::error::{Result, SlashingError};

/// Length in bytes of an address derived from a consensus public key.
pub const ADDRESS_LEN: usize = 20;

/// Longest address that still fits the one-byte length prefix used in store keys.
pub const MAX_ADDRESS_LEN: usize = 255;

macro_rules! address_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(Vec<u8>);

        impl $name {
            /// Wraps raw address bytes. Errors on empty input or more than `MAX_ADDRESS_LEN` bytes.
            pub fn new(bytes: Vec<u8>) -> Result<Self> {
                if bytes.is_empty() || bytes.len() > MAX_ADDRESS_LEN {
                    return Err(SlashingError::InvalidAddress(format!(
                        "{} must be 1..={} bytes, got {}",
                        stringify!($name),
                        MAX_ADDRESS_LEN,
                        bytes.len()
                    )));
                }
                Ok(Self(bytes))
            }

            /// Parses a hex-encoded address.
            pub fn from_hex(s: &str) -> Result<Self> {
                let bytes = hex::decode(s)
                    .map_err(|e| SlashingError::InvalidAddress(format!("{}: {}", s, e)))?;
                Self::new(bytes)
            }

            pub fn as_bytes(&self) -> &[u8] {
                &self.0
            }

            pub fn to_hex(&self) -> String {
                hex::encode(&self.0)
            }
        }

        impl From<[u8; ADDRESS_LEN]> for $name {
            fn from(bytes: [u8; ADDRESS_LEN]) -> Self {
                Self(bytes.to_vec())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.to_hex())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.to_hex())
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_hex())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                Self::from_hex(&s).map_err(serde::de::Error::custom)
            }
        }
    };
}

address_type!(
    /// Consensus address: the first 20 bytes of SHA-256 over the consensus public key.
    /// Every piece of slashing state is filed under it.
    ConsAddress
);

address_type!(
    /// Operator address of a validator, as known to staking.
    ValAddress
);

address_type!(
    /// Account address of a delegator.
    AccAddress
);

impl From<&ValAddress> for AccAddress {
    /// The operator's own account; self-delegations are filed under it.
    fn from(val: &ValAddress) -> Self {
        AccAddress(val.0.clone())
    }
}

/// Consensus public key. Opaque to the slashing core.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ConsPubKey(Vec<u8>);

impl ConsPubKey {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Derives the consensus address (truncated SHA-256).
    pub fn address(&self) -> ConsAddress {
        let digest = Sha256::digest(&self.0);
        ConsAddress(digest[..ADDRESS_LEN].to_vec())
    }
}

impl fmt::Debug for ConsPubKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConsPubKey({})", hex::encode(&self.0))
    }
}

/// Seconds of the latest representable timestamp (9999-12-31T23:59:59Z).
pub const MAX_TIMESTAMP_SECONDS: i64 = 253_402_300_799;

const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// Block timestamp with nanosecond resolution. Ordering is chronological.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp {
    pub seconds: i64,
    pub nanos: u32,
}

impl Timestamp {
    /// Epoch zero; in a signing info it means "never jailed".
    pub const EPOCH: Timestamp = Timestamp { seconds: 0, nanos: 0 };

    /// Effectively forever. Used as `jailed_until` for tombstoned validators.
    pub const MAX: Timestamp = Timestamp { seconds: MAX_TIMESTAMP_SECONDS, nanos: 0 };

    pub fn from_seconds(seconds: i64) -> Self {
        Self { seconds, nanos: 0 }
    }

    /// Adds a duration, saturating at `Timestamp::MAX`.
    pub fn saturating_add(&self, d: Duration) -> Timestamp {
        let total_nanos = self.nanos as i64 + d.subsec_nanos() as i64;
        let carry = total_nanos / NANOS_PER_SECOND;
        let nanos = (total_nanos % NANOS_PER_SECOND) as u32;
        let secs = i64::try_from(d.as_secs()).unwrap_or(i64::MAX);
        let seconds = self.seconds.saturating_add(secs).saturating_add(carry);
        let t = Timestamp { seconds, nanos };
        if t > Timestamp::MAX {
            Timestamp::MAX
        } else {
            t
        }
    }

    /// Time elapsed from `earlier` to `self`; `None` if `earlier` is later.
    pub fn duration_since(&self, earlier: Timestamp) -> Option<Duration> {
        if *self < earlier {
            return None;
        }
        let mut secs = self.seconds - earlier.seconds;
        let mut nanos = self.nanos as i64 - earlier.nanos as i64;
        if nanos < 0 {
            nanos += NANOS_PER_SECOND;
            secs -= 1;
        }
        Some(Duration::new(secs as u64, nanos as u32))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.nanos == 0 {
            write!(f, "{}s", self.seconds)
        } else {
            write!(f, "{}.{:09}s", self.seconds, self.nanos)
        }
    }
}

/// Header fields the slashing core reads for the block being processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub height: i64,
    pub time: Timestamp,
}

impl BlockHeader {
    pub fn new(height: i64, time: Timestamp) -> Self {
        Self { height, time }
    }
}

/// Serde helper rendering a `Duration` as `"600s"` / `"1.5s"`.
pub mod duration_str {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn format(d: &Duration) -> String {
        if d.subsec_nanos() == 0 {
            format!("{}s", d.as_secs())
        } else {
            let s = format!("{}.{:09}", d.as_secs(), d.subsec_nanos());
            format!("{}s", s.trim_end_matches('0'))
        }
    }

    pub fn parse(s: &str) -> Result<Duration, String> {
        let body = s
            .strip_suffix('s')
            .ok_or_else(|| format!("duration {:?} must end in 's'", s))?;
        let (secs, frac) = match body.split_once('.') {
            Some((secs, frac)) => (secs, frac),
            None => (body, ""),
        };
        let secs: u64 = secs
            .parse()
            .map_err(|e| format!("duration {:?}: {}", s, e))?;
        if frac.len() > 9 || !frac.chars().all(|c| c.is_ascii_digit()) {
            return Err(format!("duration {:?}: invalid fraction", s));
        }
        let nanos: u32 = if frac.is_empty() {
            0
        } else {
            format!("{:0<9}", frac)
                .parse()
                .map_err(|e| format!("duration {:?}: {}", s, e))?
        };
        Ok(Duration::new(secs, nanos))
    }

    pub fn serialize<S: Serializer>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format(d))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let s = String::deserialize(deserializer)?;
        parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_from_pubkey_is_truncated_sha256() {
        let pk = ConsPubKey::new(vec![7u8; 32]);
        let addr = pk.address();
        assert_eq!(addr.as_bytes().len(), ADDRESS_LEN);
        assert_eq!(addr.as_bytes(), &Sha256::digest([7u8; 32])[..ADDRESS_LEN]);
        assert_eq!(addr, pk.address());
    }

    #[test]
    fn test_address_length_bounds() {
        assert!(ConsAddress::new(vec![]).is_err());
        assert!(ConsAddress::new(vec![1; MAX_ADDRESS_LEN]).is_ok());
        assert!(ConsAddress::new(vec![1; MAX_ADDRESS_LEN + 1]).is_err());
    }

    #[test]
    fn test_address_hex_serde() {
        let addr = ConsAddress::from([0xabu8; 20]);
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, format!("\"{}\"", "ab".repeat(20)));
        let back: ConsAddress = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr);
        assert!(serde_json::from_str::<ConsAddress>("\"zz\"").is_err());
    }

    #[test]
    fn test_timestamp_add_and_since() {
        let t = Timestamp { seconds: 10, nanos: 900_000_000 };
        let later = t.saturating_add(Duration::new(5, 200_000_000));
        assert_eq!(later, Timestamp { seconds: 16, nanos: 100_000_000 });
        assert_eq!(later.duration_since(t), Some(Duration::new(5, 200_000_000)));
        assert_eq!(t.duration_since(later), None);
    }

    #[test]
    fn test_timestamp_saturates_at_max() {
        let t = Timestamp::from_seconds(MAX_TIMESTAMP_SECONDS - 1);
        assert_eq!(t.saturating_add(Duration::from_secs(600)), Timestamp::MAX);
        assert!(Timestamp::EPOCH < Timestamp::MAX);
    }

    #[test]
    fn test_duration_str() {
        assert_eq!(duration_str::format(&Duration::from_secs(600)), "600s");
        assert_eq!(duration_str::format(&Duration::from_millis(1500)), "1.5s");
        assert_eq!(duration_str::parse("600s").unwrap(), Duration::from_secs(600));
        assert_eq!(duration_str::parse("1.5s").unwrap(), Duration::from_millis(1500));
        assert!(duration_str::parse("600").is_err());
        assert!(duration_str::parse("1.x s").is_err());
    }
}
