//! Three six-faced dice, bets on faces ("gates").
//!
//! Each gate pays its stake once per die showing it. The luck factor
//! only scales the faces the player actually bet on.

use crate::error::{GameError, Result};
use crate::rng::{weighted_choice, RandomSource};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub const DICE_PER_ROLL: usize = 3;
const MAX_HITS: i64 = DICE_PER_ROLL as i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Gate {
    Gourd,
    Crab,
    Shrimp,
    Fish,
    Rooster,
    Deer,
}

impl Gate {
    pub const ALL: [Gate; 6] = [
        Gate::Gourd,
        Gate::Crab,
        Gate::Shrimp,
        Gate::Fish,
        Gate::Rooster,
        Gate::Deer,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Gate::Gourd => "gourd",
            Gate::Crab => "crab",
            Gate::Shrimp => "shrimp",
            Gate::Fish => "fish",
            Gate::Rooster => "rooster",
            Gate::Deer => "deer",
        }
    }

    fn index(&self) -> usize {
        Gate::ALL.iter().position(|g| g == self).unwrap_or(0)
    }
}

impl fmt::Display for Gate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Gate {
    type Err = GameError;

    /// English names and the traditional ones.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "gourd" | "bau" | "bầu" => Ok(Gate::Gourd),
            "crab" | "cua" => Ok(Gate::Crab),
            "shrimp" | "tom" | "tôm" => Ok(Gate::Shrimp),
            "fish" | "ca" | "cá" => Ok(Gate::Fish),
            "rooster" | "chicken" | "ga" | "gà" => Ok(Gate::Rooster),
            "deer" | "nai" => Ok(Gate::Deer),
            other => Err(GameError::invalid_wager(format!("Unknown gate '{}'", other))),
        }
    }
}

/// Validated stakes, one per distinct gate. The total, and the largest
/// payout it can produce, always fit in an `i64`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GateWagers {
    stakes: BTreeMap<Gate, i64>,
}

impl GateWagers {
    /// Spread `total` evenly over 1 to 6 distinct gates. The remainder of
    /// the floor division is not wagered.
    pub fn split_evenly(total: i64, gates: &[Gate]) -> Result<Self> {
        if gates.is_empty() || gates.len() > Gate::ALL.len() {
            return Err(GameError::invalid_wager("Pick between 1 and 6 gates"));
        }

        let mut stakes = BTreeMap::new();
        let per_gate = total / gates.len() as i64;
        if per_gate < 1 {
            return Err(GameError::invalid_wager(format!(
                "{} is too small to split over {} gates",
                total,
                gates.len()
            )));
        }

        for gate in gates {
            if stakes.insert(*gate, per_gate).is_some() {
                return Err(GameError::invalid_wager(format!(
                    "Gate {} picked twice",
                    gate
                )));
            }
        }

        Self::checked(stakes)
    }

    pub fn explicit(stakes: impl IntoIterator<Item = (Gate, i64)>) -> Result<Self> {
        let mut map = BTreeMap::new();
        for (gate, stake) in stakes {
            if stake < 1 {
                return Err(GameError::invalid_wager(format!(
                    "Stake on {} must be positive",
                    gate
                )));
            }
            if map.insert(gate, stake).is_some() {
                return Err(GameError::invalid_wager(format!(
                    "Gate {} picked twice",
                    gate
                )));
            }
        }

        if map.is_empty() {
            return Err(GameError::invalid_wager("No gates picked"));
        }

        Self::checked(map)
    }

    fn checked(stakes: BTreeMap<Gate, i64>) -> Result<Self> {
        stakes
            .values()
            .try_fold(0i64, |sum, stake| sum.checked_add(*stake))
            .and_then(|total| total.checked_mul(MAX_HITS))
            .ok_or_else(|| GameError::invalid_wager("Total stake is too large"))?;

        Ok(Self { stakes })
    }

    pub fn total(&self) -> i64 {
        self.stakes.values().sum()
    }

    pub fn stake_on(&self, gate: Gate) -> i64 {
        self.stakes.get(&gate).copied().unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Gate, i64)> + '_ {
        self.stakes.iter().map(|(g, s)| (*g, *s))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateResult {
    pub gate: Gate,
    pub stake: i64,
    pub hits: u32,
    pub payout: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiceGateRoll {
    pub faces: [Gate; DICE_PER_ROLL],
    pub gates: Vec<GateResult>,
    pub payout: i64,
}

/// Normalized face weights; wagered gates are scaled by `luck_factor`.
pub fn gate_weights(wagers: &GateWagers, luck_factor: f64) -> [f64; 6] {
    let base = 1.0 / Gate::ALL.len() as f64;
    let mut weights = [base; 6];

    for (gate, stake) in wagers.iter() {
        if stake > 0 {
            weights[gate.index()] *= luck_factor;
        }
    }

    let total: f64 = weights.iter().sum();
    for weight in weights.iter_mut() {
        *weight /= total;
    }
    weights
}

pub fn roll(wagers: &GateWagers, luck_factor: f64, rng: &mut dyn RandomSource) -> DiceGateRoll {
    let weights = gate_weights(wagers, luck_factor);

    let mut faces = [Gate::Gourd; DICE_PER_ROLL];
    for face in faces.iter_mut() {
        *face = weighted_choice(rng, &Gate::ALL, &weights)
            .copied()
            .unwrap_or_else(|| Gate::ALL[rng.draw_index(Gate::ALL.len())]);
    }

    settle(wagers, faces)
}

/// Pay every wagered gate by its number of hits.
pub fn settle(wagers: &GateWagers, faces: [Gate; DICE_PER_ROLL]) -> DiceGateRoll {
    let gates: Vec<GateResult> = wagers
        .iter()
        .map(|(gate, stake)| {
            let hits = faces.iter().filter(|f| **f == gate).count() as u32;
            GateResult {
                gate,
                stake,
                hits,
                payout: stake * hits as i64,
            }
        })
        .collect();

    let payout = gates.iter().map(|g| g.payout).sum();
    DiceGateRoll {
        faces,
        gates,
        payout,
    }
}
