use chrono::{Duration, Utc};
use lotto_core::{
    AccountId, LotteryConfig, LotteryService, ManualClock, ServiceOptions,
};
use std::sync::Arc;
use tempfile::tempdir;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    // Create temp dir
    let temp_dir = tempdir()?;
    println!("Using temporary directory: {:?}", temp_dir.path());

    // A manual clock lets the example skip ahead to the draw
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let options = ServiceOptions::default().with_clock(clock.clone());

    let config = LotteryConfig::new(AccountId::new("operator"));
    let service = LotteryService::create(temp_dir.path(), config, options).await?;
    let price = service.config().await.ticket_price;

    let round = service.current_round_summary().await;
    println!("Round {} open until {}", round.id, round.closes_at);

    let players = [
        (AccountId::new("alice"), [1, 2, 3, 4, 5]),
        (AccountId::new("bob"), [5, 10, 15, 20, 25]),
        (AccountId::new("carol"), [31, 32, 33, 34, 35]),
    ];
    for (player, numbers) in &players {
        let ticket = service.buy_ticket(player, *numbers, price).await?;
        println!("{} bought ticket #{}: {}", player, ticket.index, ticket.numbers);
    }

    clock.advance(Duration::days(4));
    let outcome = service.draw().await?;

    if let Some(winning) = outcome.closed.winning_numbers {
        println!("\nWinning numbers for round {}: {}", outcome.closed.id, winning);
    }
    if let Some(settlement) = &outcome.closed.settlement {
        println!("Pool: {} units, owed: {} units, rolled over: {} units",
            settlement.prize_pool, settlement.allocated, settlement.rollover);
    }

    for (player, _) in &players {
        let prize = service.pending_prize(player, outcome.closed.id).await?;
        if !prize.is_zero() {
            let paid = service.claim_prize(player, outcome.closed.id).await?;
            println!("{} claimed {} units", player, paid);
        }
    }

    println!("\nRound {} verified: {}", outcome.closed.id, service.verify_draw(outcome.closed.id).await?);

    let jackpot = service.jackpot_snapshot().await;
    println!("Round {} starts with {} units carried over", outcome.next_round_id, jackpot.current_contribution);
    println!("Operator fees: {} units", service.operator_balance().await);

    Ok(())
}
