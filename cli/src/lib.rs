mod args;

use std::sync::Arc;

use anyhow::Context;
pub use args::{Args, Commands, HistoryArgs, LimitArgs, SetStatusArgs, StudentArgs};
use clap::Parser;
use common::{
    Database, IntaSendClient, IntaSendConfig, Transaction, TransactionStatus, WalletProvider,
    WalletService,
};

/// Runs the CLI command parser and executes the selected command.
/// Returns true if a CLI command was handled, false otherwise.
pub async fn run_cli() -> bool {
    let args = Args::parse();
    let Some(command) = args.command else {
        return false;
    };

    if let Err(e) = run_command(command).await {
        eprintln!("Error: {e:#}");
    }
    true
}

async fn run_command(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::SyncBalances => {
            let service = connect_service().await?;
            let report = service.sync_balances().await?;
            println!(
                "Sync complete: {} updated, {} unchanged, {} failed",
                report.updated, report.unchanged, report.failed
            );
        }
        Commands::Wallets => {
            let db = connect_db().await?;
            let wallets = db.list_wallets().await?;
            if wallets.is_empty() {
                println!("No wallets found.");
            }
            for wallet in wallets {
                println!(
                    "{:<12} {:<24} {:<14} {:>12.2} KES",
                    wallet.student_id, wallet.student_name, wallet.wallet_id, wallet.balance
                );
            }
        }
        Commands::Transactions(LimitArgs { limit }) => {
            let db = connect_db().await?;
            print_transactions(&db.list_transactions(limit).await?);
        }
        Commands::Student(StudentArgs { student_id, limit }) => {
            let db = connect_db().await?;
            let wallet = db
                .get_wallet_by_student_id(&student_id)
                .await?
                .with_context(|| format!("No wallet found for student {student_id}"))?;
            println!("Student:  {} ({})", wallet.student_name, wallet.student_id);
            println!("Wallet:   {}", wallet.wallet_id);
            println!("Balance:  {:.2} KES (cached)", wallet.balance);
            if let Some(phone) = &wallet.phone {
                println!("Phone:    {phone}");
            }
            if let Some(email) = &wallet.email {
                println!("Email:    {email}");
            }
            println!();
            print_transactions(
                &db.list_transactions_for_student(&student_id, limit)
                    .await?,
            );
        }
        Commands::SetStatus(SetStatusArgs {
            transaction_id,
            status,
        }) => {
            let status: TransactionStatus = status.parse().map_err(anyhow::Error::msg)?;
            let db = connect_db().await?;
            if db.update_transaction_status(&transaction_id, status).await? {
                println!("Transaction {transaction_id} marked as {status}");
            } else {
                println!("No transaction with id {transaction_id}");
            }
        }
        Commands::ProviderWallets => {
            let provider = connect_provider()?;
            for wallet in provider.list_wallets().await? {
                println!(
                    "{:<14} {:<20} {:>12.2} {} (available {:.2})",
                    wallet.wallet_id,
                    wallet.label.as_deref().unwrap_or("-"),
                    wallet.current_balance,
                    wallet.currency,
                    wallet.available_balance
                );
            }
        }
        Commands::History(HistoryArgs { student_id }) => {
            let service = connect_service().await?;
            let entries = service.provider_history(&student_id).await?;
            if entries.is_empty() {
                println!("No provider transactions for {student_id}.");
            }
            for entry in entries {
                println!("{}", serde_json::to_string_pretty(&entry)?);
            }
        }
    }
    Ok(())
}

fn print_transactions(transactions: &[Transaction]) {
    if transactions.is_empty() {
        println!("No transactions found.");
        return;
    }
    for tx in transactions {
        let parties = match (&tx.from_student, &tx.to_student) {
            (Some(from), Some(to)) => format!("{from} -> {to}"),
            _ => tx.student_id.clone().unwrap_or_else(|| "-".to_string()),
        };
        println!(
            "#{:<5} {:<19} {:<17} {:<20} {:>10.2} {:<9} {}",
            tx.id,
            tx.timestamp
                .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_default(),
            format!("{:?}", tx.kind),
            parties,
            tx.amount,
            tx.status,
            tx.description.as_deref().unwrap_or("")
        );
    }
}

/// Helper to open the database named by DATABASE_URL.
async fn connect_db() -> anyhow::Result<Database> {
    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://wallet_system.db".to_string());
    Database::new(&database_url)
        .await
        .with_context(|| format!("Failed to open database `{database_url}`"))
}

fn connect_provider() -> anyhow::Result<Arc<dyn WalletProvider>> {
    let config = IntaSendConfig::from_env()?;
    let client = IntaSendClient::new(&config).context("Failed to create IntaSend client")?;
    Ok(Arc::new(client))
}

async fn connect_service() -> anyhow::Result<WalletService> {
    let currency = std::env::var("WALLET_CURRENCY").unwrap_or_else(|_| "KES".to_string());
    Ok(WalletService::new(
        connect_db().await?,
        connect_provider()?,
        currency,
    ))
}
