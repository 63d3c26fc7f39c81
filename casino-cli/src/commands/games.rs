use anyhow::{bail, Context, Result};
use casino_core::{GroupId, LedgerError, PlayerId};
use casino_games::{
    Card, Casino, CoinBet, CoinWagers, DuelAction, DuelSnapshot, Gate, GateWagers, GameError,
    RoundDetail, RoundResult,
};
use clap::Subcommand;
use comfy_table::{presets::UTF8_FULL, Table};
use dialoguer::Select;

#[derive(Subcommand)]
pub enum PlayCommands {
    /// Play a card duel against the dealer
    Duel {
        player: u64,
        group: u64,
        wager: i64,
        /// Hit until the hand reaches this value, then stand, without prompting
        #[arg(long)]
        stand_on: Option<u32>,
    },
    /// Roll the three gate dice
    Dice {
        player: u64,
        group: u64,
        /// Stakes as gate=amount, or plain gate names with --split
        bets: Vec<String>,
        /// Spread this total evenly over the named gates
        #[arg(long)]
        split: Option<i64>,
    },
    /// Flip the four coins
    Coin {
        player: u64,
        group: u64,
        /// Stakes as bet=amount (even, odd, two-red, three-red, three-white, four-red, four-white)
        bets: Vec<String>,
    },
}

pub async fn handle_play_command(command: PlayCommands, casino: &Casino) -> Result<()> {
    match command {
        PlayCommands::Duel {
            player,
            group,
            wager,
            stand_on,
        } => play_duel(casino, PlayerId(player), GroupId(group), wager, stand_on).await,
        PlayCommands::Dice {
            player,
            group,
            bets,
            split,
        } => {
            let wagers = match split {
                Some(total) => {
                    let gates = bets
                        .iter()
                        .map(|name| name.parse::<Gate>())
                        .collect::<std::result::Result<Vec<_>, _>>()?;
                    GateWagers::split_evenly(total, &gates)?
                }
                None => {
                    let stakes = bets
                        .iter()
                        .map(|arg| -> Result<(Gate, i64)> {
                            let (name, stake) = parse_stake(arg)?;
                            Ok((name.parse::<Gate>()?, stake))
                        })
                        .collect::<Result<Vec<_>>>()?;
                    GateWagers::explicit(stakes)?
                }
            };

            let result = casino
                .play_dice_gate(PlayerId(player), GroupId(group), &wagers)
                .await?;
            print_round(&result);
            Ok(())
        }
        PlayCommands::Coin {
            player,
            group,
            bets,
        } => {
            let stakes = bets
                .iter()
                .map(|arg| -> Result<(CoinBet, i64)> {
                    let (name, stake) = parse_stake(arg)?;
                    Ok((name.parse::<CoinBet>()?, stake))
                })
                .collect::<Result<Vec<_>>>()?;
            let wagers = CoinWagers::new(stakes)?;

            let result = casino
                .play_coin_flip(PlayerId(player), GroupId(group), &wagers)
                .await?;
            print_round(&result);
            Ok(())
        }
    }
}

async fn play_duel(
    casino: &Casino,
    player: PlayerId,
    group: GroupId,
    wager: i64,
    stand_on: Option<u32>,
) -> Result<()> {
    let mut snapshot = match casino.current_duel(player, group).await {
        Ok(open) => {
            println!("Resuming your open duel (wager {})", open.wager);
            open
        }
        Err(GameError::NoActiveGame) => casino.start_card_duel(player, group, wager).await?,
        Err(e) => return Err(e.into()),
    };

    while !snapshot.is_finished() {
        print_hands(&snapshot);

        let action = match stand_on {
            Some(target) if snapshot.player_value < target => DuelAction::Hit,
            Some(_) => DuelAction::Stand,
            None => prompt_action(&snapshot),
        };

        match casino.duel_action(player, group, action).await {
            Ok(next) => snapshot = next,
            // the duel is still open after a refused action
            Err(e @ (GameError::UnsupportedFeature(_)
            | GameError::InvalidAction(_)
            | GameError::Ledger(LedgerError::InsufficientFunds { .. }))) => {
                println!("{}", e);
            }
            Err(e) => return Err(e.into()),
        }
    }

    print_hands(&snapshot);
    if let Some(outcome) = snapshot.outcome {
        println!("Result: {}", outcome);
    }
    println!("Wager: {}, Payout: {}", snapshot.wager, snapshot.payout);
    if let Some(funds) = snapshot.funds {
        println!("Balance: {}", funds);
    }

    Ok(())
}

/// Stands when no terminal is attached.
fn prompt_action(snapshot: &DuelSnapshot) -> DuelAction {
    let mut actions = vec![DuelAction::Hit, DuelAction::Stand];
    if snapshot.can_double {
        actions.push(DuelAction::Double);
    }
    if snapshot.can_split {
        actions.push(DuelAction::Split);
    }

    let labels: Vec<&str> = actions
        .iter()
        .map(|a| match a {
            DuelAction::Hit => "Hit",
            DuelAction::Stand => "Stand",
            DuelAction::Double => "Double down",
            DuelAction::Split => "Split",
        })
        .collect();

    match Select::new()
        .with_prompt("Your move")
        .items(&labels)
        .default(0)
        .interact()
    {
        Ok(index) => actions[index],
        Err(e) => {
            tracing::debug!("Prompt failed, standing: {}", e);
            DuelAction::Stand
        }
    }
}

fn print_hands(snapshot: &DuelSnapshot) {
    println!(
        "Dealer: {} ({})",
        format_cards(&snapshot.dealer_hand),
        snapshot.dealer_value
    );
    println!(
        "You:    {} ({})",
        format_cards(&snapshot.player_hand),
        snapshot.player_value
    );
}

fn format_cards(cards: &[Card]) -> String {
    cards
        .iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

fn print_round(result: &RoundResult) {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Bet", "Stake", "Result", "Payout"]);

    match &result.detail {
        RoundDetail::DiceGate(roll) => {
            let faces: Vec<&str> = roll.faces.iter().map(|g| g.name()).collect();
            println!("Dice: {}", faces.join(" "));
            for gate in &roll.gates {
                table.add_row(vec![
                    gate.gate.to_string(),
                    gate.stake.to_string(),
                    format!("{} hit(s)", gate.hits),
                    gate.payout.to_string(),
                ]);
            }
        }
        RoundDetail::CoinFlip(roll) => {
            let coins: Vec<&str> = roll
                .coins
                .iter()
                .map(|red| if *red { "red" } else { "white" })
                .collect();
            println!("Coins: {} ({} red)", coins.join(" "), roll.red_count);
            for bet in &roll.bets {
                table.add_row(vec![
                    bet.bet.to_string(),
                    bet.stake.to_string(),
                    if bet.won { "won" } else { "lost" }.to_string(),
                    bet.payout.to_string(),
                ]);
            }
        }
        RoundDetail::CardDuel(_) => {}
    }

    println!("{}", table);
    println!(
        "Wager: {}, Payout: {}, Profit: {:+}",
        result.wager, result.payout, result.profit
    );
    println!("Balance: {}", result.funds);
}

/// Splits `name=amount`.
fn parse_stake(arg: &str) -> Result<(&str, i64)> {
    let Some((name, amount)) = arg.split_once('=') else {
        bail!("Expected name=amount, got '{}'", arg);
    };
    let amount = amount
        .trim()
        .parse::<i64>()
        .with_context(|| format!("Invalid amount in '{}'", arg))?;
    Ok((name.trim(), amount))
}
