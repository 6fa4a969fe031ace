use super::{format_amount, format_time, Session};
use clap::Subcommand;
use comfy_table::{presets::UTF8_FULL, Table};
use lotto_core::constants::NUMBERS_PER_TICKET;
use lotto_core::{Amount, LotteryError, Result, RoundId};

#[derive(Subcommand)]
pub enum TicketCommands {
    /// Buy a ticket in the current round
    Buy {
        /// Five distinct numbers between 1 and 35
        #[arg(num_args = NUMBERS_PER_TICKET, required = true)]
        numbers: Vec<u8>,
        /// Amount paid in base units (defaults to the ticket price)
        #[arg(long)]
        paid: Option<u64>,
    },
    /// List your tickets in a round
    List {
        /// Round id (defaults to the current round)
        #[arg(short, long)]
        round: Option<RoundId>,
    },
}

pub async fn handle_ticket_command(cmd: TicketCommands, session: &Session) -> Result<()> {
    let service = &session.service;

    match cmd {
        TicketCommands::Buy { numbers, paid } => {
            let owner = session.account()?;
            let numbers: [u8; NUMBERS_PER_TICKET] = numbers.as_slice().try_into().map_err(|_| {
                LotteryError::config(format!(
                    "A ticket needs exactly {} numbers",
                    NUMBERS_PER_TICKET
                ))
            })?;
            let paid = match paid {
                Some(units) => Amount::from_units(units),
                None => service.config().await.ticket_price,
            };

            let ticket = service.buy_ticket(owner, numbers, paid).await?;

            println!("Ticket bought!");
            println!("  Round: {}", ticket.round_id);
            println!("  Ticket #: {}", ticket.index);
            println!("  Numbers: {}", ticket.numbers);
            println!("  Paid: {}", format_amount(paid));
        }

        TicketCommands::List { round } => {
            let owner = session.account()?;
            let round_id = match round {
                Some(id) => id,
                None => service.current_round_summary().await.id,
            };
            let tickets = service.tickets_of(owner, round_id).await;

            if tickets.is_empty() {
                println!("No tickets for '{}' in round {}.", owner, round_id);
                return Ok(());
            }

            let winning = service.winning_numbers(round_id).await.ok().flatten();

            let mut table = Table::new();
            table.load_preset(UTF8_FULL);
            table.set_header(vec!["#", "Numbers", "Bought", "Matches"]);

            for ticket in &tickets {
                let matches = winning
                    .map(|w| ticket.numbers.matches(&w).to_string())
                    .unwrap_or_else(|| "-".to_string());
                table.add_row(vec![
                    ticket.index.to_string(),
                    ticket.numbers.to_string(),
                    format_time(ticket.purchased_at),
                    matches,
                ]);
            }

            println!("Tickets for '{}' in round {}:", owner, round_id);
            println!("{}", table);
            println!("Tickets sold across all rounds: {}", service.total_tickets().await);
        }
    }

    Ok(())
}
