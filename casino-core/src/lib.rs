//! Casino core - balances and audit log for group wagering
//!
//! Every balance belongs to one (player, group) pair. Mutations are
//! serialized per pair and always land together with their transaction row.

pub mod error;
pub mod ledger;
pub mod storage;
pub mod types;

pub use error::{LedgerError, Result};
pub use ledger::{Ledger, LedgerConfig};
pub use types::{
    ActiveGame, Balance, BalanceKey, Funds, GroupConfig, GroupId, PlayerId, TransactionKind,
    TransactionRecord, TransferReceipt,
};
