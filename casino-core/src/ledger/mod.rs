pub mod config;
pub mod locks;
pub mod manager;

pub use config::LedgerConfig;
pub use locks::KeyLocks;
pub use manager::Ledger;
