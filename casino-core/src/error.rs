use crate::types::{GroupId, PlayerId};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, LedgerError>;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Insufficient funds: need {need}, have {available}")]
    InsufficientFunds { need: i64, available: i64 },

    #[error("Invalid amount: {0}")]
    InvalidAmount(i64),

    #[error("Cannot transfer to yourself")]
    SelfTransfer,

    #[error("Group {0} is already registered")]
    GroupAlreadyRegistered(GroupId),

    #[error("Group {0} is disabled")]
    GroupDisabled(GroupId),

    #[error("Player {0} is not privileged")]
    NotPrivileged(PlayerId),

    #[error("Round {0} is not open")]
    RoundNotOpen(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl LedgerError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Short, stable category reported to callers instead of the raw message.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Storage(_) | Self::Io(_) => "persistence_failure",
            Self::Serialization(_) => "serialization_error",
            Self::Config(_) => "invalid_config",
            Self::InsufficientFunds { .. } => "insufficient_funds",
            Self::InvalidAmount(_) => "invalid_amount",
            Self::SelfTransfer => "self_transfer",
            Self::GroupAlreadyRegistered(_) => "group_already_registered",
            Self::GroupDisabled(_) => "group_disabled",
            Self::NotPrivileged(_) => "not_privileged",
            Self::RoundNotOpen(_) => "round_not_open",
            Self::Internal(_) => "internal_error",
        }
    }
}
