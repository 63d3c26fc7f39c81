use anyhow::Result;
use casino_core::GroupId;
use casino_games::Casino;
use clap::Subcommand;
use comfy_table::{presets::UTF8_FULL, Table};

#[derive(Subcommand)]
pub enum GroupCommands {
    /// Register a group with its own settings
    Register {
        /// Group id
        group: u64,
        /// Command prefix
        #[arg(short, long)]
        prefix: Option<String>,
        /// Balance new players start with
        #[arg(short, long)]
        starting_balance: Option<i64>,
    },
    /// Show a group's settings
    Show {
        /// Group id
        group: u64,
    },
    /// Allow wagering in a group
    Enable {
        /// Group id
        group: u64,
    },
    /// Stop new wagers and transfers in a group
    Disable {
        /// Group id
        group: u64,
    },
}

pub async fn handle_group_command(command: GroupCommands, casino: &Casino) -> Result<()> {
    let ledger = casino.ledger();

    match command {
        GroupCommands::Register {
            group,
            prefix,
            starting_balance,
        } => {
            let config = ledger
                .register_group(GroupId(group), prefix.as_deref(), starting_balance)
                .await?;
            println!("Registered group {}", config.group);
            println!("Prefix: {}", config.prefix);
            println!("Starting balance: {}", config.starting_balance);
        }
        GroupCommands::Show { group } => match ledger.group_config(GroupId(group)).await? {
            Some(config) => {
                let mut table = Table::new();
                table.load_preset(UTF8_FULL);
                table.set_header(vec!["Setting", "Value"]);
                table.add_row(vec!["Group".to_string(), config.group.to_string()]);
                table.add_row(vec!["Prefix".to_string(), config.prefix.clone()]);
                table.add_row(vec![
                    "Enabled".to_string(),
                    if config.enabled { "yes" } else { "no" }.to_string(),
                ]);
                table.add_row(vec![
                    "Starting balance".to_string(),
                    config.starting_balance.to_string(),
                ]);
                table.add_row(vec![
                    "Registered".to_string(),
                    config.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                ]);
                println!("{}", table);
            }
            None => {
                println!("Group {} is not registered", group);
                println!(
                    "Defaults apply: prefix '{}', starting balance {}",
                    ledger.config().default_prefix,
                    ledger.config().default_starting_balance
                );
            }
        },
        GroupCommands::Enable { group } => {
            ledger.set_group_enabled(GroupId(group), true).await?;
            println!("Group {} enabled", group);
        }
        GroupCommands::Disable { group } => {
            ledger.set_group_enabled(GroupId(group), false).await?;
            println!("Group {} disabled", group);
        }
    }

    Ok(())
}
