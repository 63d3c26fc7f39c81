use anyhow::Result;
use casino_core::{BalanceKey, GroupId, PlayerId};
use casino_games::Casino;
use clap::Subcommand;
use comfy_table::{presets::UTF8_FULL, Table};

#[derive(Subcommand)]
pub enum BalanceCommands {
    /// Show a player's balance in a group
    Show {
        /// Player id
        player: u64,
        /// Group id
        group: u64,
    },
    /// Show recent ledger entries, newest first
    History {
        player: u64,
        group: u64,
        /// Maximum number of entries
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
    /// Move funds to another player in the same group
    Transfer {
        /// Sending player
        from: u64,
        /// Receiving player
        to: u64,
        group: u64,
        amount: i64,
    },
}

pub async fn handle_balance_command(command: BalanceCommands, casino: &Casino) -> Result<()> {
    match command {
        BalanceCommands::Show { player, group } => {
            let funds = casino.get_balance(PlayerId(player), GroupId(group)).await?;
            println!("Player {} in group {}: {}", player, group, funds);
        }
        BalanceCommands::History {
            player,
            group,
            limit,
        } => {
            let key = BalanceKey::from_raw(player, group);
            let records = casino.ledger().history(&key, limit).await?;

            if records.is_empty() {
                println!("No transactions for {}", key);
                return Ok(());
            }

            let mut table = Table::new();
            table.load_preset(UTF8_FULL);
            table.set_header(vec!["ID", "Kind", "Amount", "Description", "Time"]);

            for record in &records {
                table.add_row(vec![
                    record.id.to_string(),
                    record.kind.to_string(),
                    format!("{:+}", record.amount),
                    record.description.clone(),
                    record.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
                ]);
            }

            println!("{}", table);
        }
        BalanceCommands::Transfer {
            from,
            to,
            group,
            amount,
        } => {
            let receipt = casino
                .transfer(PlayerId(from), PlayerId(to), GroupId(group), amount)
                .await?;
            println!("Transferred {} from {} to {}", receipt.amount, receipt.from, receipt.to);
            println!("Sender balance: {}", receipt.from_funds);
            println!("Receiver balance: {}", receipt.to_funds);
        }
    }

    Ok(())
}
