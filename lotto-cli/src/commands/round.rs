use super::{format_amount, format_duration, format_time, Session};
use clap::Subcommand;
use comfy_table::{presets::UTF8_FULL, Table};
use lotto_core::{Result, RoundId};

#[derive(Subcommand)]
pub enum RoundCommands {
    /// Show the current round, or a past one by id
    Show {
        /// Round id
        round: Option<RoundId>,
    },
    /// Draw and close the current round once its deadline has passed
    Draw,
    /// Recompute a closed round's numbers from its revealed seed
    Verify {
        /// Round id
        round: RoundId,
    },
    /// List recent rounds
    List {
        /// Maximum number of rounds to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },
    /// Show the carried jackpot
    Jackpot,
}

pub async fn handle_round_command(cmd: RoundCommands, session: &Session) -> Result<()> {
    let service = &session.service;

    match cmd {
        RoundCommands::Show { round: None } => {
            let round = service.current_round_summary().await;
            let remaining = service.time_until_draw().await;

            println!("Current round {}:", round.id);
            println!("  Opened: {}", format_time(round.opened_at));
            println!("  Closes: {}", format_time(round.closes_at));
            if remaining == 0 {
                println!("  Status: expired, waiting for draw");
            } else {
                println!("  Time left: {}", format_duration(remaining));
            }
            println!("  Tickets: {}", round.ticket_count);
            println!("  Prize pool: {}", format_amount(round.prize_pool));
        }

        RoundCommands::Show { round: Some(id) } => {
            let round = service.round_details(id).await?;

            println!("Round {}:", round.id);
            println!("  Opened: {}", format_time(round.opened_at));
            println!("  Closes: {}", format_time(round.closes_at));
            println!("  Tickets: {}", round.ticket_count);
            println!("  Prize pool: {}", format_amount(round.prize_pool()));
            println!("  Jackpot carried in: {}", format_amount(round.jackpot_contribution));
            println!("  Seed commitment: {}", round.seed_commitment);

            match (&round.winning_numbers, &round.settlement) {
                (Some(winning), Some(settlement)) => {
                    println!("  Winning numbers: {}", winning);
                    println!("  Distributed so far: {}", format_amount(round.distributed_total));
                    println!("  Rolled over: {}", format_amount(settlement.rollover));
                    println!();

                    let mut table = Table::new();
                    table.load_preset(UTF8_FULL);
                    table.set_header(vec![
                        "Matches",
                        "Share (bps)",
                        "Winners",
                        "Per ticket",
                        "Owed",
                        "Rolled over",
                    ]);
                    for tier in &settlement.tiers {
                        table.add_row(vec![
                            tier.matches.to_string(),
                            tier.share_bps.to_string(),
                            tier.winners.to_string(),
                            tier.unit_payout.to_string(),
                            tier.paid().to_string(),
                            tier.rolled_over.to_string(),
                        ]);
                    }
                    println!("{}", table);
                }
                _ => println!("  Status: not drawn yet"),
            }
        }

        RoundCommands::Draw => {
            let outcome = service.draw().await?;
            let closed = outcome.closed;

            println!("Round {} drawn!", closed.id);
            if let Some(winning) = closed.winning_numbers {
                println!("  Winning numbers: {}", winning);
            }
            if let Some(settlement) = &closed.settlement {
                println!("  Prize pool: {}", format_amount(settlement.prize_pool));
                println!("  Owed to winners: {}", format_amount(settlement.allocated));
                println!("  Rolled into jackpot: {}", format_amount(settlement.rollover));
            }
            println!("Round {} is now open.", outcome.next_round_id);
        }

        RoundCommands::Verify { round } => {
            let winning = service.winning_numbers(round).await?;
            if service.verify_draw(round).await? {
                println!("Round {} verified.", round);
                if let Some(winning) = winning {
                    println!("  Seed reproduces {}", winning);
                }
            } else {
                println!("Round {} FAILED verification: seed does not match the published draw.", round);
            }
        }

        RoundCommands::List { limit } => {
            let rounds = service.recent_rounds(limit).await;

            let mut table = Table::new();
            table.load_preset(UTF8_FULL);
            table.set_header(vec!["Round", "Closes", "Tickets", "Pool", "Status"]);

            for round in rounds {
                table.add_row(vec![
                    round.id.to_string(),
                    format_time(round.closes_at),
                    round.ticket_count.to_string(),
                    round.prize_pool.to_string(),
                    if round.closed { "Drawn" } else { "Open" }.to_string(),
                ]);
            }

            println!("{}", table);
        }

        RoundCommands::Jackpot => {
            let jackpot = service.jackpot_snapshot().await;

            println!("Jackpot:");
            println!("  Waiting to roll over: {}", format_amount(jackpot.rollover));
            println!("  Carried into current round: {}", format_amount(jackpot.current_contribution));
            println!("  Current prize pool: {}", format_amount(jackpot.current_pool));
        }
    }

    Ok(())
}
