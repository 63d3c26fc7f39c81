//! Four two-colored coins, bets on how many land red.
//!
//! Unlike the dice game, the luck factor biases every coin toward red no
//! matter which bets were placed, capped at 90%.

use crate::error::{GameError, Result};
use crate::rng::RandomSource;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub const COINS: usize = 4;
const MAX_RED_PROBABILITY: f64 = 0.9;
const MAX_MULTIPLIER: i64 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CoinBet {
    Even,
    Odd,
    TwoRed,
    ThreeRed,
    ThreeWhite,
    FourRed,
    FourWhite,
}

impl CoinBet {
    pub const ALL: [CoinBet; 7] = [
        CoinBet::Even,
        CoinBet::Odd,
        CoinBet::TwoRed,
        CoinBet::ThreeRed,
        CoinBet::ThreeWhite,
        CoinBet::FourRed,
        CoinBet::FourWhite,
    ];

    pub fn multiplier(&self) -> i64 {
        match self {
            CoinBet::Even | CoinBet::Odd => 1,
            CoinBet::TwoRed => 2,
            CoinBet::ThreeRed | CoinBet::ThreeWhite => 4,
            CoinBet::FourRed | CoinBet::FourWhite => 8,
        }
    }

    pub fn wins(&self, red_count: usize) -> bool {
        match self {
            CoinBet::Even => red_count % 2 == 0,
            CoinBet::Odd => red_count % 2 == 1,
            CoinBet::TwoRed => red_count == 2,
            CoinBet::ThreeRed => red_count == 3,
            CoinBet::ThreeWhite => red_count == 1,
            CoinBet::FourRed => red_count == 4,
            CoinBet::FourWhite => red_count == 0,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            CoinBet::Even => "even",
            CoinBet::Odd => "odd",
            CoinBet::TwoRed => "two-red",
            CoinBet::ThreeRed => "three-red",
            CoinBet::ThreeWhite => "three-white",
            CoinBet::FourRed => "four-red",
            CoinBet::FourWhite => "four-white",
        }
    }
}

impl fmt::Display for CoinBet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CoinBet {
    type Err = GameError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_lowercase().replace('_', "-");
        match normalized.as_str() {
            "even" | "chan" | "chẵn" => Ok(CoinBet::Even),
            "odd" | "le" | "lẻ" => Ok(CoinBet::Odd),
            "two-red" | "2red" => Ok(CoinBet::TwoRed),
            "three-red" | "3red" => Ok(CoinBet::ThreeRed),
            "three-white" | "3white" => Ok(CoinBet::ThreeWhite),
            "four-red" | "4red" => Ok(CoinBet::FourRed),
            "four-white" | "4white" => Ok(CoinBet::FourWhite),
            other => Err(GameError::invalid_wager(format!(
                "Unknown coin bet '{}'",
                other
            ))),
        }
    }
}

/// Independent stakes, at most one per bet kind. The total, and the
/// largest payout it can produce, always fit in an `i64`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoinWagers {
    stakes: BTreeMap<CoinBet, i64>,
}

impl CoinWagers {
    pub fn new(stakes: impl IntoIterator<Item = (CoinBet, i64)>) -> Result<Self> {
        let mut map = BTreeMap::new();
        for (bet, stake) in stakes {
            if stake < 1 {
                return Err(GameError::invalid_wager(format!(
                    "Stake on {} must be positive",
                    bet
                )));
            }
            if map.insert(bet, stake).is_some() {
                return Err(GameError::invalid_wager(format!(
                    "Bet {} placed twice",
                    bet
                )));
            }
        }

        if map.is_empty() {
            return Err(GameError::invalid_wager("No bets placed"));
        }

        map.values()
            .try_fold(0i64, |sum, stake| sum.checked_add(*stake))
            .and_then(|total| total.checked_mul(MAX_MULTIPLIER))
            .ok_or_else(|| GameError::invalid_wager("Total stake is too large"))?;

        Ok(Self { stakes: map })
    }

    pub fn total(&self) -> i64 {
        self.stakes.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (CoinBet, i64)> + '_ {
        self.stakes.iter().map(|(b, s)| (*b, *s))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BetResult {
    pub bet: CoinBet,
    pub stake: i64,
    pub won: bool,
    pub payout: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoinFlipRoll {
    /// true is red.
    pub coins: [bool; COINS],
    pub red_count: usize,
    pub bets: Vec<BetResult>,
    pub payout: i64,
}

pub fn red_probability(luck_factor: f64) -> f64 {
    (0.5 * luck_factor).clamp(0.0, MAX_RED_PROBABILITY)
}

pub fn flip(wagers: &CoinWagers, luck_factor: f64, rng: &mut dyn RandomSource) -> CoinFlipRoll {
    let p_red = red_probability(luck_factor);

    let mut coins = [false; COINS];
    for coin in coins.iter_mut() {
        *coin = rng.draw_uniform() < p_red;
    }

    settle(wagers, coins)
}

pub fn settle(wagers: &CoinWagers, coins: [bool; COINS]) -> CoinFlipRoll {
    let red_count = coins.iter().filter(|c| **c).count();

    let bets: Vec<BetResult> = wagers
        .iter()
        .map(|(bet, stake)| {
            let won = bet.wins(red_count);
            BetResult {
                bet,
                stake,
                won,
                payout: if won { stake * bet.multiplier() } else { 0 },
            }
        })
        .collect();

    let payout = bets.iter().map(|b| b.payout).sum();
    CoinFlipRoll {
        coins,
        red_count,
        bets,
        payout,
    }
}
