use crate::card_duel::DuelSnapshot;
use crate::coin_flip::CoinFlipRoll;
use crate::dice_gate::DiceGateRoll;
use casino_core::Funds;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameKind {
    CardDuel,
    DiceGate,
    CoinFlip,
}

impl GameKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GameKind::CardDuel => "card-duel",
            GameKind::DiceGate => "dice-gate",
            GameKind::CoinFlip => "coin-flip",
        }
    }
}

impl fmt::Display for GameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "game", content = "detail", rename_all = "kebab-case")]
pub enum RoundDetail {
    CardDuel(DuelSnapshot),
    DiceGate(DiceGateRoll),
    CoinFlip(CoinFlipRoll),
}

impl RoundDetail {
    pub fn kind(&self) -> GameKind {
        match self {
            RoundDetail::CardDuel(_) => GameKind::CardDuel,
            RoundDetail::DiceGate(_) => GameKind::DiceGate,
            RoundDetail::CoinFlip(_) => GameKind::CoinFlip,
        }
    }
}

/// A settled round as reported back to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundResult {
    pub round_id: Uuid,
    pub wager: i64,
    pub payout: i64,
    pub profit: i64,
    /// After the payout was credited.
    pub funds: Funds,
    pub detail: RoundDetail,
}

impl RoundResult {
    pub fn new(round_id: Uuid, wager: i64, payout: i64, funds: Funds, detail: RoundDetail) -> Self {
        Self {
            round_id,
            wager,
            payout,
            profit: payout - wager,
            funds,
            detail,
        }
    }

    pub fn game(&self) -> GameKind {
        self.detail.kind()
    }
}

/// Audit description shared by the wager and payout rows of one round.
pub(crate) fn describe(kind: GameKind, round_id: Uuid, note: &str) -> String {
    format!("{} {} {}", kind, round_id, note)
}
