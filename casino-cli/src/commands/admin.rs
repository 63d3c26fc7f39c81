use anyhow::Result;
use casino_core::{BalanceKey, GroupId, PlayerId};
use casino_games::Casino;
use clap::Subcommand;

#[derive(Subcommand)]
pub enum AdminCommands {
    /// Add to a player's balance
    Credit {
        /// Privileged player performing the change
        #[arg(long)]
        actor: u64,
        /// Target player
        player: u64,
        /// Group id
        group: u64,
        /// Amount to add
        amount: i64,
        /// Reason recorded in the history
        #[arg(short, long, default_value = "manual credit")]
        reason: String,
    },
    /// Remove from a player's balance, never below zero
    Debit {
        #[arg(long)]
        actor: u64,
        player: u64,
        group: u64,
        amount: i64,
        #[arg(short, long, default_value = "manual debit")]
        reason: String,
    },
    /// Set a player's balance to an exact amount
    Set {
        #[arg(long)]
        actor: u64,
        player: u64,
        group: u64,
        amount: i64,
        #[arg(short, long, default_value = "balance reset")]
        reason: String,
    },
}

pub async fn handle_admin_command(command: AdminCommands, casino: &Casino) -> Result<()> {
    let ledger = casino.ledger();

    match command {
        AdminCommands::Credit {
            actor,
            player,
            group,
            amount,
            reason,
        } => {
            let key = BalanceKey::from_raw(player, group);
            let balance = ledger
                .admin_credit(PlayerId(actor), &key, amount, &reason)
                .await?;
            println!("Credited {} to {}", amount, key);
            println!("New balance: {}", balance);
        }
        AdminCommands::Debit {
            actor,
            player,
            group,
            amount,
            reason,
        } => {
            let key = BalanceKey::from_raw(player, group);
            let removed = ledger
                .admin_debit(PlayerId(actor), &key, amount, &reason)
                .await?;
            if removed < amount {
                println!("Debited {} from {} (requested {})", removed, key, amount);
            } else {
                println!("Debited {} from {}", removed, key);
            }
            let funds = casino.get_balance(PlayerId(player), GroupId(group)).await?;
            println!("New balance: {}", funds);
        }
        AdminCommands::Set {
            actor,
            player,
            group,
            amount,
            reason,
        } => {
            let key = BalanceKey::from_raw(player, group);
            let balance = ledger
                .admin_set_balance(PlayerId(actor), &key, amount, &reason)
                .await?;
            println!("Balance of {} set to {}", key, balance);
        }
    }

    Ok(())
}
