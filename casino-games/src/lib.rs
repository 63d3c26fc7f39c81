//! Casino games - card duel, dice gate and coin flip
//!
//! Instant games debit, roll and credit within one call. Card duels stay
//! open in a session registry, one per player and group, until they are
//! finished or expire.

pub mod card_duel;
pub mod cards;
pub mod casino;
pub mod coin_flip;
pub mod config;
pub mod dice_gate;
pub mod error;
pub mod rng;
pub mod round;
pub mod session;

pub use card_duel::{CardDuel, DuelAction, DuelOutcome, DuelSnapshot};
pub use cards::{hand_value, Card, Rank, Shoe, Suit};
pub use casino::Casino;
pub use coin_flip::{CoinBet, CoinFlipRoll, CoinWagers};
pub use config::{AbandonPolicy, CasinoConfig, GameConfig};
pub use dice_gate::{DiceGateRoll, Gate, GateWagers};
pub use error::{GameError, Result};
pub use rng::{RandomSource, SeededRng, SystemRng};
pub use round::{GameKind, RoundDetail, RoundResult};
pub use session::SessionRegistry;
