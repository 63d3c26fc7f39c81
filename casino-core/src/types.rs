use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Chat-platform user identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PlayerId(pub u64);

/// Chat-platform group (server) identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GroupId(pub u64);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for PlayerId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl From<u64> for GroupId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// A balance is owned by one player inside one group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BalanceKey {
    pub player: PlayerId,
    pub group: GroupId,
}

impl BalanceKey {
    pub fn new(player: PlayerId, group: GroupId) -> Self {
        Self { player, group }
    }

    pub fn from_raw(player: u64, group: u64) -> Self {
        Self::new(PlayerId(player), GroupId(group))
    }
}

impl fmt::Display for BalanceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.player, self.group)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Balance {
    pub key: BalanceKey,
    pub amount: i64,
    pub created_at: DateTime<Utc>,
}

/// What a caller is allowed to spend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Funds {
    Limited(i64),
    Unlimited,
}

impl Funds {
    pub fn covers(&self, amount: i64) -> bool {
        match self {
            Funds::Limited(available) => *available >= amount,
            Funds::Unlimited => true,
        }
    }
}

impl fmt::Display for Funds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Funds::Limited(amount) => write!(f, "{}", amount),
            Funds::Unlimited => write!(f, "unlimited"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionKind {
    Wager,
    Payout,
    TransferOut,
    TransferIn,
    AdminCredit,
    AdminDebit,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Wager => "wager",
            TransactionKind::Payout => "payout",
            TransactionKind::TransferOut => "transfer-out",
            TransactionKind::TransferIn => "transfer-in",
            TransactionKind::AdminCredit => "admin-credit",
            TransactionKind::AdminDebit => "admin-debit",
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "wager" => Ok(TransactionKind::Wager),
            "payout" => Ok(TransactionKind::Payout),
            "transfer-out" => Ok(TransactionKind::TransferOut),
            "transfer-in" => Ok(TransactionKind::TransferIn),
            "admin-credit" => Ok(TransactionKind::AdminCredit),
            "admin-debit" => Ok(TransactionKind::AdminDebit),
            other => Err(format!("Unknown transaction kind: {}", other)),
        }
    }
}

/// Append-only audit row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: i64,
    pub key: BalanceKey,
    pub amount: i64, // +ve credit, -ve debit
    pub kind: TransactionKind,
    pub description: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferReceipt {
    pub from: BalanceKey,
    pub to: BalanceKey,
    pub amount: i64,
    pub from_funds: Funds,
    pub to_funds: Funds,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupConfig {
    pub group: GroupId,
    pub prefix: String,
    pub enabled: bool,
    pub starting_balance: i64,
    pub created_at: DateTime<Utc>,
}

/// A multi-step round whose stake is taken but not yet paid out. The
/// ledger stores `state` as-is; only the game layer understands it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveGame {
    pub key: BalanceKey,
    pub round_id: String,
    pub game: String,
    pub state: String,
    pub opened_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
