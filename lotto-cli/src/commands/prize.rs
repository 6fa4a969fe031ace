use super::{format_amount, Session};
use clap::Subcommand;
use comfy_table::{presets::UTF8_FULL, Table};
use lotto_core::{Result, RoundId};

#[derive(Subcommand)]
pub enum PrizeCommands {
    /// Show your prize for a round
    Show {
        /// Round id
        round: RoundId,
    },
    /// Claim your prize for a drawn round
    Claim {
        /// Round id
        round: RoundId,
    },
    /// List every round with an unclaimed prize
    Pending,
    /// Show your playing statistics
    Stats,
}

pub async fn handle_prize_command(cmd: PrizeCommands, session: &Session) -> Result<()> {
    let service = &session.service;
    let owner = session.account()?;

    match cmd {
        PrizeCommands::Show { round } => {
            let prize = service.pending_prize(owner, round).await?;

            if let Some(record) = service.claim_record(owner, round).await {
                println!(
                    "'{}' claimed {} from round {}.",
                    owner,
                    format_amount(record.amount),
                    round
                );
            } else if prize.is_zero() {
                println!("No prize for '{}' in round {}.", owner, round);
            } else {
                println!("Prize for '{}' in round {}: {}", owner, round, format_amount(prize));
                println!("Claim it with: lotto prize claim {}", round);
            }
        }

        PrizeCommands::Claim { round } => {
            let amount = service.claim_prize(owner, round).await?;
            println!("Claimed {} from round {}!", format_amount(amount), round);
        }

        PrizeCommands::Pending => {
            let pending = service.pending_prizes(owner).await?;

            if pending.is_empty() {
                println!("No unclaimed prizes for '{}'.", owner);
                return Ok(());
            }

            let mut table = Table::new();
            table.load_preset(UTF8_FULL);
            table.set_header(vec!["Round", "Prize (units)"]);
            for prize in pending {
                table.add_row(vec![prize.round_id.to_string(), prize.amount.to_string()]);
            }

            println!("Unclaimed prizes for '{}':", owner);
            println!("{}", table);
        }

        PrizeCommands::Stats => {
            let stats = service.player_statistics(owner).await?;

            println!("Statistics for '{}':", owner);
            println!("  Rounds played: {}", stats.rounds_played);
            println!("  Tickets bought: {}", stats.tickets_bought);
            println!("  Total spent: {}", format_amount(stats.total_spent));
            println!("  Winning tickets: {}", stats.winning_tickets);
            println!("  Best match: {}", stats.best_match);
            println!("  Win rate: {:.1}%", stats.win_rate);
            println!("  Total claimed: {}", format_amount(stats.total_claimed));
            println!("  Unclaimed: {}", format_amount(stats.unclaimed));

            let mut table = Table::new();
            table.load_preset(UTF8_FULL);
            table.set_header(vec!["Matches", "Tickets"]);
            for (matches, count) in &stats.matches_by_tier {
                table.add_row(vec![matches.to_string(), count.to_string()]);
            }
            println!("{}", table);
        }
    }

    Ok(())
}
