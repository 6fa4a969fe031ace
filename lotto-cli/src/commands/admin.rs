use super::{format_amount, format_time, Session};
use clap::Subcommand;
use comfy_table::{presets::UTF8_FULL, Table};
use dialoguer::Confirm;
use lotto_core::{AccountId, LotteryError, Result};

#[derive(Subcommand)]
pub enum AdminCommands {
    /// Show accumulated operator fees and funds held
    Fees,
    /// Withdraw accumulated operator fees
    Withdraw,
    /// Move every held fund to the operator (recovery only)
    Sweep {
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },
    /// Show the outgoing transfer journal
    Transfers {
        /// Only transfers to this account
        #[arg(short, long)]
        recipient: Option<String>,
        /// Maximum number of transfers to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
}

pub async fn handle_admin_command(cmd: AdminCommands, session: &Session) -> Result<()> {
    let service = &session.service;

    match cmd {
        AdminCommands::Fees => {
            let config = service.config().await;
            println!("Operator: {}", config.operator);
            println!("  Fee rate: {} bps", config.fee_bps);
            println!("  Fees owed: {}", format_amount(service.operator_balance().await));
            println!("  Funds held: {}", format_amount(service.vault().await));
        }

        AdminCommands::Withdraw => {
            let caller = session.account()?;
            let transfer = service.withdraw_fees(caller).await?;

            println!("Withdrew {} to '{}'.", format_amount(transfer.amount), transfer.recipient);
            println!("  Transfer id: {}", transfer.id);
        }

        AdminCommands::Sweep { force } => {
            let caller = session.account()?;

            if !force {
                let confirm = Confirm::new()
                    .with_prompt(format!(
                        "Sweep {} to '{}'? Outstanding prizes will no longer be payable.",
                        format_amount(service.vault().await),
                        caller
                    ))
                    .default(false)
                    .interact()
                    .map_err(|e| LotteryError::dialog(e.to_string()))?;

                if !confirm {
                    println!("Sweep cancelled.");
                    return Ok(());
                }
            }

            let transfer = service.emergency_withdraw(caller).await?;
            println!("Swept {} to '{}'.", format_amount(transfer.amount), transfer.recipient);
        }

        AdminCommands::Transfers { recipient, limit } => {
            let recipient = recipient.map(AccountId::new);
            let transfers = service.transfers(recipient.as_ref(), limit).await?;

            if transfers.is_empty() {
                println!("No transfers recorded.");
                return Ok(());
            }

            let mut table = Table::new();
            table.load_preset(UTF8_FULL);
            table.set_header(vec!["When", "Kind", "Recipient", "Amount (units)", "Round"]);

            for transfer in transfers {
                table.add_row(vec![
                    format_time(transfer.created_at),
                    transfer.kind.to_string(),
                    transfer.recipient.to_string(),
                    transfer.amount.to_string(),
                    transfer
                        .round_id
                        .map(|id| id.to_string())
                        .unwrap_or_else(|| "-".to_string()),
                ]);
            }

            println!("{}", table);
        }
    }

    Ok(())
}
