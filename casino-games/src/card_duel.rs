//! Player against dealer, one hand each.
//!
//! The dealer draws to 17 and stands on every 17. A two-card 21 pays
//! 2.5x unless the dealer also holds a two-card 21. Splitting is shown
//! to the player when the first two cards pair up, but is not playable.

use crate::cards::{hand_value, Card, Shoe};
use crate::error::{GameError, Result};
use crate::rng::RandomSource;
use casino_core::Funds;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const DEALER_STANDS_ON: u32 = 17;
/// Largest payout is a natural, 5/2 of the wager.
const LARGEST_PAYOUT_FACTOR: i64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DuelAction {
    Hit,
    Stand,
    Double,
    Split,
}

impl FromStr for DuelAction {
    type Err = GameError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "hit" | "h" => Ok(DuelAction::Hit),
            "stand" | "s" => Ok(DuelAction::Stand),
            "double" | "d" => Ok(DuelAction::Double),
            "split" | "p" => Ok(DuelAction::Split),
            other => Err(GameError::invalid_action(format!(
                "Unknown duel action '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DuelOutcome {
    Blackjack,
    Win,
    DealerBust,
    Push,
    Lose,
    Bust,
    /// Closed by the idle timeout.
    Abandoned,
}

impl DuelOutcome {
    /// Amount returned for `wager`, stake included. Abandoned duels are
    /// paid according to the abandon policy instead.
    pub fn payout(&self, wager: i64) -> i64 {
        match self {
            DuelOutcome::Blackjack => wager.saturating_mul(5) / 2,
            DuelOutcome::Win | DuelOutcome::DealerBust => wager.saturating_mul(2),
            DuelOutcome::Push => wager,
            DuelOutcome::Lose | DuelOutcome::Bust | DuelOutcome::Abandoned => 0,
        }
    }
}

impl fmt::Display for DuelOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DuelOutcome::Blackjack => "BLACKJACK",
            DuelOutcome::Win => "WIN",
            DuelOutcome::DealerBust => "DEALER_BUST",
            DuelOutcome::Push => "PUSH",
            DuelOutcome::Lose => "LOSE",
            DuelOutcome::Bust => "BUST",
            DuelOutcome::Abandoned => "ABANDONED",
        };
        f.write_str(label)
    }
}

/// What the player is allowed to see.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuelSnapshot {
    pub player_hand: Vec<Card>,
    pub player_value: u32,
    /// Only the up-card while the duel is in progress.
    pub dealer_hand: Vec<Card>,
    pub dealer_value: u32,
    pub wager: i64,
    pub outcome: Option<DuelOutcome>,
    pub payout: i64,
    pub can_double: bool,
    pub can_split: bool,
    /// Filled in by the casino once the payout is credited.
    pub funds: Option<Funds>,
}

impl DuelSnapshot {
    pub fn is_finished(&self) -> bool {
        self.outcome.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardDuel {
    player: Vec<Card>,
    dealer: Vec<Card>,
    wager: i64,
    shoe: Shoe,
    outcome: Option<DuelOutcome>,
    payout: i64,
}

impl CardDuel {
    /// Two cards each, player first.
    pub fn deal(wager: i64, mut shoe: Shoe, rng: &mut dyn RandomSource) -> Result<Self> {
        if wager <= 0 {
            return Err(GameError::invalid_wager("Wager must be positive"));
        }
        if wager.checked_mul(LARGEST_PAYOUT_FACTOR).is_none() {
            return Err(GameError::invalid_wager(format!(
                "Wager {} is too large",
                wager
            )));
        }

        let player = vec![shoe.draw(rng), shoe.draw(rng)];
        let dealer = vec![shoe.draw(rng), shoe.draw(rng)];

        Ok(Self {
            player,
            dealer,
            wager,
            shoe,
            outcome: None,
            payout: 0,
        })
    }

    pub fn wager(&self) -> i64 {
        self.wager
    }

    pub fn payout(&self) -> i64 {
        self.payout
    }

    pub fn outcome(&self) -> Option<DuelOutcome> {
        self.outcome
    }

    pub fn is_terminal(&self) -> bool {
        self.outcome.is_some()
    }

    pub fn player_hand(&self) -> &[Card] {
        &self.player
    }

    pub fn dealer_hand(&self) -> &[Card] {
        &self.dealer
    }

    pub fn can_double(&self) -> bool {
        !self.is_terminal() && self.player.len() == 2
    }

    pub fn can_split(&self) -> bool {
        !self.is_terminal() && self.player.len() == 2 && self.player[0].rank == self.player[1].rank
    }

    pub fn hit(&mut self, rng: &mut dyn RandomSource) -> Result<()> {
        self.ensure_in_progress()?;

        self.player.push(self.shoe.draw(rng));
        if hand_value(&self.player).total > 21 {
            self.finish(DuelOutcome::Bust);
        }
        Ok(())
    }

    pub fn stand(&mut self, rng: &mut dyn RandomSource) -> Result<()> {
        self.ensure_in_progress()?;

        self.dealer_play(rng);
        self.resolve();
        Ok(())
    }

    /// The extra stake must already be debited.
    pub fn double(&mut self, rng: &mut dyn RandomSource) -> Result<()> {
        if !self.can_double() {
            return Err(GameError::invalid_action(
                "Double is only allowed on the first two cards",
            ));
        }

        self.wager = self
            .wager
            .checked_mul(2)
            .ok_or_else(|| GameError::invalid_wager("Doubled wager is too large"))?;
        self.player.push(self.shoe.draw(rng));

        if hand_value(&self.player).total > 21 {
            self.finish(DuelOutcome::Bust);
        } else {
            self.dealer_play(rng);
            self.resolve();
        }
        Ok(())
    }

    pub fn split(&self) -> Result<()> {
        Err(GameError::UnsupportedFeature("split"))
    }

    /// Close an idle duel. With `refund` the stake comes back in full.
    pub fn abandon(&mut self, refund: bool) -> Result<()> {
        self.ensure_in_progress()?;

        self.outcome = Some(DuelOutcome::Abandoned);
        self.payout = if refund { self.wager } else { 0 };
        Ok(())
    }

    pub fn snapshot(&self) -> DuelSnapshot {
        let finished = self.is_terminal();
        // an up-card ace counts as 1 until the hole card is shown
        let (dealer_hand, dealer_value) = if finished {
            (self.dealer.clone(), hand_value(&self.dealer).total)
        } else {
            let up: Vec<Card> = self.dealer.iter().take(1).copied().collect();
            let value = up.iter().map(|c| c.rank.hard_value()).sum();
            (up, value)
        };

        DuelSnapshot {
            player_value: hand_value(&self.player).total,
            player_hand: self.player.clone(),
            dealer_value,
            dealer_hand,
            wager: self.wager,
            outcome: self.outcome,
            payout: self.payout,
            can_double: self.can_double(),
            can_split: self.can_split(),
            funds: None,
        }
    }

    fn ensure_in_progress(&self) -> Result<()> {
        match self.outcome {
            Some(outcome) => Err(GameError::invalid_action(format!(
                "Duel already finished ({})",
                outcome
            ))),
            None => Ok(()),
        }
    }

    fn dealer_play(&mut self, rng: &mut dyn RandomSource) {
        while hand_value(&self.dealer).total < DEALER_STANDS_ON {
            self.dealer.push(self.shoe.draw(rng));
        }
    }

    fn resolve(&mut self) {
        let player = hand_value(&self.player).total;
        let dealer = hand_value(&self.dealer).total;

        let mut outcome = if player > 21 {
            DuelOutcome::Bust
        } else if dealer > 21 {
            DuelOutcome::DealerBust
        } else if player > dealer {
            DuelOutcome::Win
        } else if player == dealer {
            DuelOutcome::Push
        } else {
            DuelOutcome::Lose
        };

        let player_natural = self.player.len() == 2 && player == 21;
        let dealer_natural = self.dealer.len() == 2 && dealer == 21;
        if player_natural && !dealer_natural {
            outcome = DuelOutcome::Blackjack;
        }

        self.finish(outcome);
    }

    fn finish(&mut self, outcome: DuelOutcome) {
        self.outcome = Some(outcome);
        self.payout = outcome.payout(self.wager);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cards::{Rank, Suit};
    use crate::rng::SeededRng;

    /// Deal order: player, player, dealer, dealer, then draws.
    fn duel(wager: i64, ranks: &[Rank]) -> (CardDuel, SeededRng) {
        let mut rng = SeededRng::new(11);
        let shoe = Shoe::stacked(6, ranks.iter().map(|r| Card::new(*r, Suit::Clubs)));
        let duel = CardDuel::deal(wager, shoe, &mut rng).unwrap();
        (duel, rng)
    }

    #[test]
    fn test_natural_pays_two_and_a_half() {
        let (mut duel, mut rng) = duel(100, &[Rank::Ace, Rank::King, Rank::Ten, Rank::Seven]);
        duel.stand(&mut rng).unwrap();

        assert_eq!(duel.outcome(), Some(DuelOutcome::Blackjack));
        assert_eq!(duel.payout(), 250);
    }

    #[test]
    fn test_natural_against_dealer_natural_pushes() {
        let (mut duel, mut rng) = duel(100, &[Rank::Ace, Rank::King, Rank::Ace, Rank::Queen]);
        duel.stand(&mut rng).unwrap();

        assert_eq!(duel.outcome(), Some(DuelOutcome::Push));
        assert_eq!(duel.payout(), 100);
    }

    #[test]
    fn test_blackjack_payout_is_floored() {
        assert_eq!(DuelOutcome::Blackjack.payout(15), 37);
    }

    #[test]
    fn test_hit_to_22_busts() {
        let (mut duel, mut rng) = duel(
            50,
            &[Rank::King, Rank::Queen, Rank::Nine, Rank::Seven, Rank::Two],
        );
        duel.hit(&mut rng).unwrap();

        assert_eq!(hand_value(duel.player_hand()).total, 22);
        assert_eq!(duel.outcome(), Some(DuelOutcome::Bust));
        assert_eq!(duel.payout(), 0);
        // the dealer never drew
        assert_eq!(duel.dealer_hand().len(), 2);
        assert!(duel.hit(&mut rng).is_err());
        assert!(duel.stand(&mut rng).is_err());
    }

    #[test]
    fn test_dealer_draws_to_seventeen() {
        let (mut duel, mut rng) = duel(
            10,
            &[Rank::Ten, Rank::Eight, Rank::Six, Rank::Five, Rank::Four, Rank::Nine],
        );
        duel.stand(&mut rng).unwrap();

        // 6 + 5 + 4 = 15, then 9 -> 24
        assert_eq!(duel.dealer_hand().len(), 4);
        assert_eq!(duel.outcome(), Some(DuelOutcome::DealerBust));
        assert_eq!(duel.payout(), 20);
    }

    #[test]
    fn test_stand_outcomes() {
        let (mut win, mut rng) = duel(10, &[Rank::Ten, Rank::Nine, Rank::Ten, Rank::Seven]);
        win.stand(&mut rng).unwrap();
        assert_eq!(win.outcome(), Some(DuelOutcome::Win));
        assert_eq!(win.payout(), 20);

        let (mut lose, mut rng) = duel(10, &[Rank::Ten, Rank::Seven, Rank::Ten, Rank::Nine]);
        lose.stand(&mut rng).unwrap();
        assert_eq!(lose.outcome(), Some(DuelOutcome::Lose));
        assert_eq!(lose.payout(), 0);

        let (mut push, mut rng) = duel(10, &[Rank::Ten, Rank::Eight, Rank::Nine, Rank::Nine]);
        push.stand(&mut rng).unwrap();
        assert_eq!(push.outcome(), Some(DuelOutcome::Push));
        assert_eq!(push.payout(), 10);
    }

    #[test]
    fn test_three_card_21_is_not_blackjack() {
        let (mut duel, mut rng) = duel(
            10,
            &[Rank::Five, Rank::Six, Rank::Ten, Rank::Eight, Rank::King],
        );
        duel.hit(&mut rng).unwrap();
        duel.stand(&mut rng).unwrap();
        assert_eq!(duel.outcome(), Some(DuelOutcome::Win));
        assert_eq!(duel.payout(), 20);
    }

    #[test]
    fn test_double_doubles_wager_and_resolves() {
        let (mut duel, mut rng) = duel(
            40,
            &[Rank::Five, Rank::Six, Rank::Ten, Rank::Seven, Rank::Nine],
        );
        assert!(duel.can_double());
        duel.double(&mut rng).unwrap();

        assert_eq!(duel.wager(), 80);
        assert_eq!(duel.player_hand().len(), 3);
        assert_eq!(duel.outcome(), Some(DuelOutcome::Win));
        assert_eq!(duel.payout(), 160);
    }

    #[test]
    fn test_double_after_hit_is_rejected() {
        let (mut duel, mut rng) = duel(
            40,
            &[Rank::Two, Rank::Three, Rank::Ten, Rank::Seven, Rank::Four],
        );
        duel.hit(&mut rng).unwrap();
        assert!(!duel.can_double());

        let err = duel.double(&mut rng).unwrap_err();
        assert_eq!(err.code(), "invalid_action");
        assert_eq!(duel.wager(), 40);
    }

    #[test]
    fn test_split_is_advertised_but_unsupported() {
        let (duel, _rng) = duel(10, &[Rank::Eight, Rank::Eight, Rank::Ten, Rank::Seven]);
        assert!(duel.can_split());
        assert!(duel.snapshot().can_split);

        let err = duel.split().unwrap_err();
        assert_eq!(err.code(), "unsupported_feature");
        assert!(!duel.is_terminal());
    }

    #[test]
    fn test_snapshot_hides_hole_card() {
        let (mut duel, mut rng) = duel(10, &[Rank::Ten, Rank::Nine, Rank::Ace, Rank::Six, Rank::Two]);
        let hidden = duel.snapshot();
        assert_eq!(hidden.dealer_hand.len(), 1);
        assert_eq!(hidden.dealer_value, 1);
        assert!(!hidden.is_finished());

        duel.stand(&mut rng).unwrap();
        let shown = duel.snapshot();
        assert_eq!(shown.dealer_hand.len(), 2);
        // soft 17 stands
        assert_eq!(shown.dealer_value, 17);
        assert_eq!(shown.outcome, Some(DuelOutcome::Win));
    }

    #[test]
    fn test_abandon_policies() {
        let (mut forfeit, _) = duel(30, &[Rank::Ten, Rank::Nine, Rank::Ten, Rank::Seven]);
        forfeit.abandon(false).unwrap();
        assert_eq!(forfeit.outcome(), Some(DuelOutcome::Abandoned));
        assert_eq!(forfeit.payout(), 0);

        let (mut refund, _) = duel(30, &[Rank::Ten, Rank::Nine, Rank::Ten, Rank::Seven]);
        refund.abandon(true).unwrap();
        assert_eq!(refund.payout(), 30);
        assert!(refund.abandon(true).is_err());
    }

    #[test]
    fn test_zero_wager_rejected() {
        let mut rng = SeededRng::new(1);
        let shoe = Shoe::new(1, &mut rng);
        let err = CardDuel::deal(0, shoe, &mut rng).unwrap_err();
        assert_eq!(err.code(), "invalid_wager");
    }

    #[test]
    fn test_oversized_wager_rejected() {
        let mut rng = SeededRng::new(1);
        let shoe = Shoe::new(1, &mut rng);
        let err = CardDuel::deal(i64::MAX / 2, shoe, &mut rng).unwrap_err();
        assert_eq!(err.code(), "invalid_wager");

        let (duel, _) = duel(i64::MAX / 5, &[Rank::Ace, Rank::King, Rank::Ten, Rank::Seven]);
        assert_eq!(duel.wager(), i64::MAX / 5);
    }

    #[test]
    fn test_parse_actions() {
        assert_eq!("Hit".parse::<DuelAction>().unwrap(), DuelAction::Hit);
        assert_eq!(" d ".parse::<DuelAction>().unwrap(), DuelAction::Double);
        assert!("surrender".parse::<DuelAction>().is_err());
    }
}
