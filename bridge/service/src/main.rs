// Copyright (c) 2024 The Botho Foundation

//! HTLC Bridge Service
//!
//! Operator process for the cross-chain HTLC bridge: keeps the timelock
//! records in SQLite, watches for expiring locks and inspects records.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

mod db;
mod engine;

use htlc_bridge_core::{BridgeConfig, HtlcLedger, Secret, TxKind, XHash};

/// HTLC Bridge Service - timelock custody for cross-chain transfers
#[derive(Parser, Debug)]
#[command(name = "htlc-bridge")]
#[command(about = "Operator service for HTLC cross-chain custody")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "htlc_bridge.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Run database migrations only
    #[arg(long)]
    migrate: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Watch open locks until interrupted (default)
    Run,

    /// Print a stored record as JSON
    Show {
        /// Namespace: user, smg or debt
        kind: TxKind,
        x_hash: XHash,
    },

    /// Seconds left in the redeem window of a hash lock
    LeftTime { x_hash: XHash },

    /// Compute the hash lock of a 32-byte secret
    HashSecret { x: Secret },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Setup logging
    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(true)
        .with_thread_ids(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    // Needs neither configuration nor database
    if let Some(Command::HashSecret { x }) = &args.command {
        println!("{}", x.x_hash());
        return Ok(());
    }

    // Load configuration
    let config_path = args.config.to_string_lossy();
    let config = if args.config.exists() {
        info!("Loading configuration from {}", config_path);
        BridgeConfig::from_file(&config_path)?
    } else {
        info!("Using default configuration");
        BridgeConfig::default()
    };

    // Initialize database
    info!("Initializing database at {}", config.service.db_path);
    let db = db::Database::open(&config.service.db_path)?;
    db.migrate()?;

    if args.migrate {
        info!("Database migration complete");
        return Ok(());
    }

    let htlc = HtlcLedger::new(db.clone()).with_unique_x_hash(config.htlc.unique_x_hash);

    match args.command.unwrap_or(Command::Run) {
        Command::Run => {
            info!("Bridge configuration:");
            info!("  Chain ID: {}", config.chain.chain_id);
            info!("  Custody: {}", config.chain.custody_account);
            info!("  Fee recipient: {}", config.chain.fee_recipient);
            info!("  Token pairs: {}", config.registry().len());
            info!("  Unique hash locks: {}", config.htlc.unique_x_hash);

            let monitor = engine::TimeoutMonitor::new(config.service.clone(), db);
            monitor.run().await?;
        }
        Command::Show { kind, x_hash } => match htlc.record(kind, &x_hash)? {
            Some(record) => {
                println!("{}", serde_json::to_string_pretty(&record)?);
                for entry in db.audit_trail(&x_hash)? {
                    println!("{} {} {}", entry.created_at, entry.action, entry.details);
                }
            }
            None => println!("No {} record for {}", kind, x_hash),
        },
        Command::LeftTime { x_hash } => {
            let left = htlc.get_left_locked_time(&x_hash, engine::unix_now())?;
            println!("{}", left);
        }
        Command::HashSecret { .. } => {}
    }

    Ok(())
}
