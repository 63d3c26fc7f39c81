use crate::error::{GameError, Result};
use casino_core::LedgerConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AbandonPolicy {
    /// The house keeps the stake.
    Forfeit,
    Refund,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub shoe_decks: usize,
    /// 1.0 is neutral.
    pub luck_factor: f64,
    pub duel_idle_timeout_secs: u64,
    pub abandon_policy: AbandonPolicy,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            shoe_decks: 6,
            luck_factor: 1.0,
            duel_idle_timeout_secs: 300, // 5 minutes
            abandon_policy: AbandonPolicy::Forfeit,
        }
    }
}

impl GameConfig {
    pub fn duel_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.duel_idle_timeout_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.shoe_decks == 0 || self.shoe_decks > 8 {
            return Err(GameError::config("Shoe must hold between 1 and 8 decks"));
        }

        if !self.luck_factor.is_finite() || self.luck_factor <= 0.0 {
            return Err(GameError::config("Luck factor must be a positive number"));
        }

        if self.duel_idle_timeout_secs == 0 {
            return Err(GameError::config("Duel idle timeout must be greater than 0"));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CasinoConfig {
    pub ledger: LedgerConfig,
    pub games: GameConfig,
}

impl CasinoConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            GameError::config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> Result<()> {
        self.ledger.validate()?;
        self.games.validate()
    }
}
