//! Canonical store encoding.
//!
//! Stored values are protobuf messages with fixed tags, so every node produces byte-identical values.
//! Decimals are encoded as the ASCII digits of their raw 18-digit fixed-point integer.

use std::time::Duration;

use prost::Message;

use crate::core::decimal::Dec;
use crate::core::params::Params;
use crate::core::signing_info::SigningInfo;
use crate::core::types::{ConsAddress, Timestamp};
use crate::error::{Result, SlashingError};

#[derive(Clone, PartialEq, Message)]
pub struct SigningInfoProto {
    #[prost(string, tag = "1")]
    pub address: String,
    #[prost(int64, tag = "2")]
    pub start_height: i64,
    #[prost(int64, tag = "3")]
    pub index_offset: i64,
    #[prost(message, optional, tag = "4")]
    pub jailed_until: Option<prost_types::Timestamp>,
    #[prost(bool, tag = "5")]
    pub tombstoned: bool,
    #[prost(int64, tag = "6")]
    pub missed_blocks_counter: i64,
}

#[derive(Clone, PartialEq, Message)]
pub struct ParamsProto {
    #[prost(int64, tag = "1")]
    pub signed_blocks_window: i64,
    #[prost(bytes = "vec", tag = "2")]
    pub min_signed_per_window: Vec<u8>,
    #[prost(message, optional, tag = "3")]
    pub downtime_jail_duration: Option<prost_types::Duration>,
    #[prost(bytes = "vec", tag = "4")]
    pub slash_fraction_double_sign: Vec<u8>,
    #[prost(bytes = "vec", tag = "5")]
    pub slash_fraction_downtime: Vec<u8>,
}

fn timestamp_to_proto(t: Timestamp) -> prost_types::Timestamp {
    prost_types::Timestamp {
        seconds: t.seconds,
        nanos: t.nanos as i32,
    }
}

fn timestamp_from_proto(t: Option<prost_types::Timestamp>) -> Result<Timestamp> {
    let t = t.unwrap_or_default();
    let nanos = u32::try_from(t.nanos)
        .ok()
        .filter(|n| *n < 1_000_000_000)
        .ok_or_else(|| SlashingError::Codec(format!("invalid timestamp nanos {}", t.nanos)))?;
    Ok(Timestamp {
        seconds: t.seconds,
        nanos,
    })
}

fn duration_to_proto(d: Duration) -> prost_types::Duration {
    prost_types::Duration {
        seconds: i64::try_from(d.as_secs()).unwrap_or(i64::MAX),
        nanos: d.subsec_nanos() as i32,
    }
}

fn duration_from_proto(d: Option<prost_types::Duration>) -> Result<Duration> {
    let d = d.unwrap_or_default();
    if d.seconds < 0 || d.nanos < 0 || d.nanos >= 1_000_000_000 {
        return Err(SlashingError::Codec(format!(
            "invalid duration {}s {}ns",
            d.seconds, d.nanos
        )));
    }
    Ok(Duration::new(d.seconds as u64, d.nanos as u32))
}

fn dec_to_bytes(d: Dec) -> Vec<u8> {
    d.raw().to_string().into_bytes()
}

fn dec_from_bytes(field: &str, raw: &[u8]) -> Result<Dec> {
    std::str::from_utf8(raw)
        .ok()
        .and_then(|s| s.parse::<u128>().ok())
        .map(Dec::from_raw)
        .ok_or_else(|| SlashingError::Codec(format!("invalid decimal in {}", field)))
}

pub fn encode_signing_info(info: &SigningInfo) -> Vec<u8> {
    SigningInfoProto {
        address: info.address.to_hex(),
        start_height: info.start_height,
        index_offset: info.index_offset,
        jailed_until: Some(timestamp_to_proto(info.jailed_until)),
        tombstoned: info.tombstoned,
        missed_blocks_counter: info.missed_blocks_counter,
    }
    .encode_to_vec()
}

pub fn decode_signing_info(raw: &[u8]) -> Result<SigningInfo> {
    let p = SigningInfoProto::decode(raw)?;
    Ok(SigningInfo {
        address: ConsAddress::from_hex(&p.address)?,
        start_height: p.start_height,
        index_offset: p.index_offset,
        jailed_until: timestamp_from_proto(p.jailed_until)?,
        tombstoned: p.tombstoned,
        missed_blocks_counter: p.missed_blocks_counter,
    })
}

pub fn encode_params(params: &Params) -> Vec<u8> {
    ParamsProto {
        signed_blocks_window: params.signed_blocks_window,
        min_signed_per_window: dec_to_bytes(params.min_signed_per_window),
        downtime_jail_duration: Some(duration_to_proto(params.downtime_jail_duration)),
        slash_fraction_double_sign: dec_to_bytes(params.slash_fraction_double_sign),
        slash_fraction_downtime: dec_to_bytes(params.slash_fraction_downtime),
    }
    .encode_to_vec()
}

pub fn decode_params(raw: &[u8]) -> Result<Params> {
    let p = ParamsProto::decode(raw)?;
    Ok(Params {
        signed_blocks_window: p.signed_blocks_window,
        min_signed_per_window: dec_from_bytes("min_signed_per_window", &p.min_signed_per_window)?,
        downtime_jail_duration: duration_from_proto(p.downtime_jail_duration)?,
        slash_fraction_double_sign: dec_from_bytes(
            "slash_fraction_double_sign",
            &p.slash_fraction_double_sign,
        )?,
        slash_fraction_downtime: dec_from_bytes("slash_fraction_downtime", &p.slash_fraction_downtime)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signing_info_field_order_on_the_wire() {
        let info = SigningInfo {
            address: ConsAddress::from([1u8; 20]),
            start_height: 5,
            index_offset: 9,
            jailed_until: Timestamp::from_seconds(3),
            tombstoned: true,
            missed_blocks_counter: 2,
        };
        let raw = encode_signing_info(&info);
        // Tag 1 (string), wire type 2, 40 hex chars.
        assert_eq!(&raw[..2], &[0x0a, 40]);
        assert_eq!(&raw[2..42], "01".repeat(20).as_bytes());
        // Tag 2 and 3 (varint).
        assert_eq!(&raw[42..46], &[0x10, 5, 0x18, 9]);
        // Tag 4 (message) holding seconds = 3.
        assert_eq!(&raw[46..50], &[0x22, 2, 0x08, 3]);
        // Tag 5 (bool), tag 6 (varint).
        assert_eq!(&raw[50..], &[0x28, 1, 0x30, 2]);
        assert_eq!(decode_signing_info(&raw).unwrap(), info);
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let info = SigningInfo::new(ConsAddress::from([9u8; 20]), 100);
        assert_eq!(encode_signing_info(&info), encode_signing_info(&info.clone()));
        let p = Params::default();
        assert_eq!(encode_params(&p), encode_params(&p.clone()));
    }

    #[test]
    fn test_params_decode_matches() {
        let p = Params::default();
        assert_eq!(decode_params(&encode_params(&p)).unwrap(), p);
    }

    #[test]
    fn test_corrupt_values_are_codec_errors() {
        assert!(matches!(decode_signing_info(&[0xff, 0xff]), Err(SlashingError::Codec(_))));
        let bad = ParamsProto {
            signed_blocks_window: 1,
            min_signed_per_window: b"0.5".to_vec(),
            downtime_jail_duration: None,
            slash_fraction_double_sign: b"0".to_vec(),
            slash_fraction_downtime: b"0".to_vec(),
        }
        .encode_to_vec();
        assert!(matches!(decode_params(&bad), Err(SlashingError::Codec(_))));
    }
}
