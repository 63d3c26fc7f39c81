use crate::rng::RandomSource;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Suit {
    Hearts,
    Diamonds,
    Clubs,
    Spades,
}

impl Suit {
    pub const ALL: [Suit; 4] = [Suit::Hearts, Suit::Diamonds, Suit::Clubs, Suit::Spades];

    pub fn symbol(&self) -> char {
        match self {
            Suit::Hearts => '♥',
            Suit::Diamonds => '♦',
            Suit::Clubs => '♣',
            Suit::Spades => '♠',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rank {
    Ace,
    Two,
    Three,
    Four,
    Five,
    Six,
    Seven,
    Eight,
    Nine,
    Ten,
    Jack,
    Queen,
    King,
}

impl Rank {
    pub const ALL: [Rank; 13] = [
        Rank::Ace,
        Rank::Two,
        Rank::Three,
        Rank::Four,
        Rank::Five,
        Rank::Six,
        Rank::Seven,
        Rank::Eight,
        Rank::Nine,
        Rank::Ten,
        Rank::Jack,
        Rank::Queen,
        Rank::King,
    ];

    /// Aces count 1.
    pub fn hard_value(&self) -> u32 {
        match self {
            Rank::Ace => 1,
            Rank::Two => 2,
            Rank::Three => 3,
            Rank::Four => 4,
            Rank::Five => 5,
            Rank::Six => 6,
            Rank::Seven => 7,
            Rank::Eight => 8,
            Rank::Nine => 9,
            Rank::Ten | Rank::Jack | Rank::Queen | Rank::King => 10,
        }
    }

    /// Aces count 11.
    pub fn soft_value(&self) -> u32 {
        match self {
            Rank::Ace => 11,
            other => other.hard_value(),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Rank::Ace => "A",
            Rank::Two => "2",
            Rank::Three => "3",
            Rank::Four => "4",
            Rank::Five => "5",
            Rank::Six => "6",
            Rank::Seven => "7",
            Rank::Eight => "8",
            Rank::Nine => "9",
            Rank::Ten => "10",
            Rank::Jack => "J",
            Rank::Queen => "Q",
            Rank::King => "K",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Card {
    pub suit: Suit,
    pub rank: Rank,
}

impl Card {
    pub fn new(rank: Rank, suit: Suit) -> Self {
        Self { suit, rank }
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.rank.label(), self.suit.symbol())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandValue {
    pub total: u32,
    /// An ace is still being counted as 11.
    pub soft: bool,
}

/// Aces start at 11 and drop to 1 one at a time while the hand is over 21.
pub fn hand_value(cards: &[Card]) -> HandValue {
    let mut total = 0;
    let mut soft_aces = 0;

    for card in cards {
        total += card.rank.soft_value();
        if card.rank == Rank::Ace {
            soft_aces += 1;
        }
    }

    while total > 21 && soft_aces > 0 {
        total -= 10;
        soft_aces -= 1;
    }

    HandValue {
        total,
        soft: soft_aces > 0,
    }
}

/// Several 52-card decks shuffled together.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shoe {
    decks: usize,
    // drawn from the back
    cards: Vec<Card>,
}

impl Shoe {
    pub fn new(decks: usize, rng: &mut dyn RandomSource) -> Self {
        let mut shoe = Self {
            decks: decks.max(1),
            cards: Vec::new(),
        };
        shoe.refill(rng);
        shoe
    }

    /// A shoe that deals `cards` in the given order, then refills normally.
    pub fn stacked(decks: usize, cards: impl IntoIterator<Item = Card>) -> Self {
        let mut cards: Vec<Card> = cards.into_iter().collect();
        cards.reverse();
        Self {
            decks: decks.max(1),
            cards,
        }
    }

    pub fn refill(&mut self, rng: &mut dyn RandomSource) {
        self.cards.clear();
        for _ in 0..self.decks {
            for suit in Suit::ALL {
                for rank in Rank::ALL {
                    self.cards.push(Card::new(rank, suit));
                }
            }
        }
        self.cards.shuffle(rng.rng());
        tracing::debug!("Shoe refilled with {} cards", self.cards.len());
    }

    /// An empty shoe is rebuilt and reshuffled before drawing.
    pub fn draw(&mut self, rng: &mut dyn RandomSource) -> Card {
        loop {
            if let Some(card) = self.cards.pop() {
                return card;
            }
            self.refill(rng);
        }
    }

    pub fn remaining(&self) -> usize {
        self.cards.len()
    }

    pub fn decks(&self) -> usize {
        self.decks
    }
}
