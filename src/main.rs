//! Barter negotiation CLI binary

use anyhow::Context;
use barter_negotiation::config::Config;
use barter_negotiation::{SledTradeStore, TradeProposal, TradeService, TradeStatus};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "barter")]
#[command(about = "Negotiate item and balance trades between two parties", long_about = None)]
struct Cli {
    /// TOML config file; defaults apply when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Overrides the database path from the config
    #[arg(long)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Open a trade offer from the proposer to the counterparty
    Create {
        #[arg(long)]
        proposer: String,
        #[arg(long)]
        counterparty: String,
        /// Item offered by the proposer (repeatable)
        #[arg(long = "item-a")]
        items_a: Vec<String>,
        /// Item offered by the counterparty (repeatable)
        #[arg(long = "item-b")]
        items_b: Vec<String>,
        #[arg(long, default_value_t = 0)]
        balance_a: u64,
        #[arg(long, default_value_t = 0)]
        balance_b: u64,
    },
    /// List trades, optionally only those in one status
    List {
        #[arg(long)]
        status: Option<TradeStatus>,
    },
    /// Show a single trade
    Show { trade_id: String },
    /// Accept a pending trade (counterparty only)
    Accept { trade_id: String, party: String },
    /// Reject a pending trade
    Reject { trade_id: String, party: String },
    /// Cancel a trade once the cooldown has passed (counterparty only)
    Cancel { trade_id: String, party: String },
    /// Mark an accepted trade as completed
    Complete { trade_id: String, party: String },
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref()).context("Failed to load config")?;
    if let Some(db) = cli.db {
        config.db_path = db;
    }

    let store = SledTradeStore::open(&config.db_path)
        .with_context(|| format!("Failed to open database at {}", config.db_path.display()))?;
    let service = TradeService::new(store, &config.negotiation);

    match cli.command {
        Commands::Create {
            proposer,
            counterparty,
            items_a,
            items_b,
            balance_a,
            balance_b,
        } => {
            let proposal = TradeProposal::new()
                .set_proposer(proposer)
                .set_counterparty(counterparty)
                .offer_items_a(items_a)
                .offer_items_b(items_b)
                .set_balance_a(balance_a)
                .set_balance_b(balance_b);
            let trade_id = service
                .create_trade(proposal)
                .context("Trade failed on create")?;
            print_json(&serde_json::json!({
                "message": "Trade offer created!",
                "trade_id": trade_id,
            }))?;
        }
        Commands::List { status } => print_json(&service.list_trades(status)?)?,
        Commands::Show { trade_id } => print_json(&service.get_trade(&trade_id)?)?,
        Commands::Accept { trade_id, party } => print_json(
            &service
                .accept_trade(&trade_id, &party)
                .context("Trade failed on accept")?,
        )?,
        Commands::Reject { trade_id, party } => print_json(
            &service
                .reject_trade(&trade_id, &party)
                .context("Trade failed on reject")?,
        )?,
        Commands::Cancel { trade_id, party } => print_json(
            &service
                .cancel_trade(&trade_id, &party)
                .context("Trade failed on cancel")?,
        )?,
        Commands::Complete { trade_id, party } => print_json(
            &service
                .complete_trade(&trade_id, &party)
                .context("Trade failed on complete")?,
        )?,
    }

    service.store().flush()?;
    Ok(())
}
