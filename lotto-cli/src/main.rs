mod commands;
mod config;

use anyhow::Context;
use clap::{Parser, Subcommand};
use commands::Session;
use config::CliConfig;
use lotto_core::{
    AccountId, Amount, LotteryConfig, LotteryError, LotteryService, ServiceOptions, TierShares,
};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "lotto")]
#[command(about = "Lotto - numbers lottery with rolling jackpot")]
#[command(version)]
struct Cli {
    /// Data directory for the lottery database
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    /// Account to act as (defaults to the one set with `lotto use`)
    #[arg(short, long, global = true)]
    account: Option<String>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new lottery
    Init {
        /// Account allowed to withdraw fees and sweep funds
        #[arg(short, long, default_value = lotto_core::constants::DEFAULT_OPERATOR)]
        operator: String,
        /// Ticket price in base units
        #[arg(long, default_value_t = lotto_core::constants::DEFAULT_TICKET_PRICE)]
        price: u64,
        /// Operator fee in basis points
        #[arg(long, default_value_t = lotto_core::constants::DEFAULT_FEE_BPS)]
        fee_bps: u16,
        /// Round length in seconds
        #[arg(long, default_value_t = lotto_core::constants::DEFAULT_ROUND_DURATION_SECS)]
        round_secs: u64,
        /// Tier shares in basis points for 2, 3, 4 and 5 matches
        #[arg(long, value_delimiter = ',')]
        tier_shares: Option<Vec<u16>>,
    },

    /// Set the default account for later commands
    Use {
        /// Account id
        account: String,
    },

    /// Round and draw commands
    #[command(subcommand)]
    Round(commands::RoundCommands),

    /// Ticket commands
    #[command(subcommand)]
    Ticket(commands::TicketCommands),

    /// Prize and player statistics commands
    #[command(subcommand)]
    Prize(commands::PrizeCommands),

    /// Operator commands
    #[command(subcommand)]
    Admin(commands::AdminCommands),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(format!(
            "lotto_cli={},lotto_core={}",
            log_level, log_level
        )))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Get data directory
    let data_dir = cli.data_dir.clone().unwrap_or_else(CliConfig::default_data_dir);

    if let Err(e) = run(cli, &data_dir).await {
        match e.downcast_ref::<LotteryError>() {
            Some(LotteryError::NotInitialized(dir)) => {
                eprintln!("Error: No lottery found in {}", dir);
                eprintln!("Create one with: lotto init");
            }
            Some(LotteryError::InvalidPrice { expected, offered }) => {
                eprintln!("Error: Incorrect ticket price");
                eprintln!("Expected: {} units, offered: {} units", expected, offered);
            }
            Some(LotteryError::StillActive { round_id }) => {
                eprintln!("Error: Round {} is still active", round_id);
                eprintln!("Use 'lotto round show' to see when it closes");
            }
            Some(LotteryError::InsufficientFunds { need, available }) => {
                eprintln!("Error: Insufficient funds held by the lottery");
                eprintln!("Need: {} units, Available: {} units", need, available);
            }
            _ => {
                eprintln!("Error: {:#}", e);
            }
        }
        std::process::exit(1);
    }

    Ok(())
}

async fn run(cli: Cli, data_dir: &Path) -> anyhow::Result<()> {
    // Ensure data directory exists
    tokio::fs::create_dir_all(data_dir)
        .await
        .with_context(|| format!("Failed to create data directory {}", data_dir.display()))?;

    let mut cli_config = CliConfig::load(data_dir)?;
    tracing::debug!("Using data directory {}", data_dir.display());

    match cli.command {
        Commands::Init {
            operator,
            price,
            fee_bps,
            round_secs,
            tier_shares,
        } => {
            let mut config = LotteryConfig::new(AccountId::new(operator.clone()))
                .with_ticket_price(Amount::from_units(price))
                .with_fee_bps(fee_bps)
                .with_round_duration(Duration::from_secs(round_secs));
            if let Some(shares) = tier_shares {
                config = config.with_tier_shares(parse_tier_shares(&shares)?);
            }

            let service =
                LotteryService::create(data_dir, config, ServiceOptions::default()).await?;
            let round = service.current_round_summary().await;

            if cli_config.default_account.is_none() {
                cli_config.default_account = Some(operator.clone());
                cli_config.save(data_dir)?;
            }

            println!("Lottery created in {}", data_dir.display());
            println!("  Operator: {}", operator);
            println!("  Round {} closes at {}", round.id, round.closes_at.format("%Y-%m-%d %H:%M:%S UTC"));
        }

        Commands::Use { account } => {
            cli_config.default_account = Some(account.clone());
            cli_config.save(data_dir)?;
            println!("Default account set to '{}'", account);
        }

        Commands::Round(cmd) => {
            let session = open_session(data_dir, cli.account, &cli_config).await?;
            commands::handle_round_command(cmd, &session).await?;
        }
        Commands::Ticket(cmd) => {
            let session = open_session(data_dir, cli.account, &cli_config).await?;
            commands::handle_ticket_command(cmd, &session).await?;
        }
        Commands::Prize(cmd) => {
            let session = open_session(data_dir, cli.account, &cli_config).await?;
            commands::handle_prize_command(cmd, &session).await?;
        }
        Commands::Admin(cmd) => {
            let session = open_session(data_dir, cli.account, &cli_config).await?;
            commands::handle_admin_command(cmd, &session).await?;
        }
    }

    Ok(())
}

async fn open_session(
    data_dir: &Path,
    account: Option<String>,
    cli_config: &CliConfig,
) -> lotto_core::Result<Session> {
    let service = LotteryService::open(data_dir, ServiceOptions::default()).await?;
    let account = account
        .or_else(|| cli_config.default_account.clone())
        .map(AccountId::new);
    match &account {
        Some(account) => tracing::debug!("Acting as '{}'", account),
        None => tracing::debug!("No account selected"),
    }
    Ok(Session::new(service, account))
}

fn parse_tier_shares(shares: &[u16]) -> lotto_core::Result<TierShares> {
    match shares {
        &[two_matches, three_matches, four_matches, five_matches] => Ok(TierShares {
            two_matches,
            three_matches,
            four_matches,
            five_matches,
        }),
        _ => Err(LotteryError::config(format!(
            "Expected 4 tier shares (2, 3, 4 and 5 matches), got {}",
            shares.len()
        ))),
    }
}
