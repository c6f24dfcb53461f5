use thiserror::Error;

use crate::core::types::{ConsAddress, ValAddress};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SlashingError {
    #[error("No validator found for operator {0}")]
    NoValidator(ValAddress),

    #[error("Validator {0} has no self-delegation")]
    MissingSelfDelegation(ValAddress),

    #[error("Validator {0} self-delegation is below the minimum")]
    SelfDelegationTooLow(ValAddress),

    #[error("Validator {0} is not jailed")]
    NotJailed(ValAddress),

    #[error("Validator {0} is still jailed and cannot be unjailed")]
    StillJailed(ValAddress),

    #[error("Validator {0} is already tombstoned")]
    AlreadyTombstoned(ConsAddress),

    #[error("Invalid params: {0}")]
    InvalidParams(String),

    #[error("Unknown validator: no public key for {0}")]
    UnknownValidator(ConsAddress),

    #[error("Invalid height: signing window starts at {start_height}, block height is {height}")]
    InvalidHeight { start_height: i64, height: i64 },

    #[error("Store failure: {0}")]
    StoreFailure(String),

    #[error("Signing info not found for {0}")]
    SigningInfoNotFound(ConsAddress),

    #[error("Public key not found for {0}")]
    PubkeyNotFound(ConsAddress),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid genesis: {0}")]
    InvalidGenesis(String),

    #[error("Codec error: {0}")]
    Codec(String),

    #[error("Staking error: {0}")]
    Staking(String),
}

impl SlashingError {
    /// Fatal errors abort the block. Everything else is a rejection the caller can report.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SlashingError::UnknownValidator(_)
                | SlashingError::InvalidHeight { .. }
                | SlashingError::StoreFailure(_)
                | SlashingError::SigningInfoNotFound(_)
                | SlashingError::Codec(_)
                | SlashingError::Staking(_)
        )
    }

    /// Stable numeric code for inclusion in a transaction result.
    pub fn code(&self) -> u32 {
        match self {
            SlashingError::NoValidator(_) => 2,
            SlashingError::MissingSelfDelegation(_) => 3,
            SlashingError::SelfDelegationTooLow(_) => 4,
            SlashingError::StillJailed(_) => 5,
            SlashingError::NotJailed(_) => 6,
            SlashingError::AlreadyTombstoned(_) => 7,
            SlashingError::InvalidParams(_) => 8,
            SlashingError::UnknownValidator(_) => 9,
            SlashingError::InvalidHeight { .. } => 10,
            SlashingError::StoreFailure(_) => 11,
            SlashingError::SigningInfoNotFound(_) => 12,
            SlashingError::PubkeyNotFound(_) => 13,
            SlashingError::InvalidAddress(_) => 14,
            SlashingError::InvalidGenesis(_) => 15,
            SlashingError::Codec(_) => 16,
            SlashingError::Staking(_) => 17,
        }
    }
}

pub type Result<T> = std::result::Result<T, SlashingError>;

impl From<prost::DecodeError> for SlashingError {
    fn from(err: prost::DecodeError) -> Self {
        SlashingError::Codec(err.to_string())
    }
}

impl From<serde_json::Error> for SlashingError {
    fn from(err: serde_json::Error) -> Self {
        SlashingError::InvalidGenesis(err.to_string())
    }
}
