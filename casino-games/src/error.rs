use thiserror::Error;

pub type Result<T> = std::result::Result<T, GameError>;

#[derive(Error, Debug)]
pub enum GameError {
    #[error("Ledger error: {0}")]
    Ledger(#[from] casino_core::LedgerError),

    #[error("Invalid wager: {0}")]
    InvalidWager(String),

    #[error("A game is already open for this player")]
    GameAlreadyOpen,

    #[error("No active game")]
    NoActiveGame,

    #[error("Invalid action: {0}")]
    InvalidAction(String),

    #[error("Unsupported feature: {0}")]
    UnsupportedFeature(&'static str),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl GameError {
    pub fn invalid_wager(msg: impl Into<String>) -> Self {
        Self::InvalidWager(msg.into())
    }

    pub fn invalid_action(msg: impl Into<String>) -> Self {
        Self::InvalidAction(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Ledger failures keep their own category.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Ledger(e) => e.code(),
            Self::InvalidWager(_) => "invalid_wager",
            Self::GameAlreadyOpen => "game_already_open",
            Self::NoActiveGame => "no_active_game",
            Self::InvalidAction(_) => "invalid_action",
            Self::UnsupportedFeature(_) => "unsupported_feature",
            Self::Config(_) => "invalid_config",
            Self::Serialization(_) => "serialization_error",
            Self::Internal(_) => "internal_error",
        }
    }
}
