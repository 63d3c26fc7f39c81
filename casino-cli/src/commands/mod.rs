pub mod admin;
pub mod balance;
pub mod games;
pub mod group;

pub use admin::{handle_admin_command, AdminCommands};
pub use balance::{handle_balance_command, BalanceCommands};
pub use games::{handle_play_command, PlayCommands};
pub use group::{handle_group_command, GroupCommands};
