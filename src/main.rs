//! Multisig ledger node
//!
//! Command-line entry point: initialise a data directory, derive keys,
//! inspect the persisted ledger or run the node with its REST API.

use clap::{Parser, Subcommand};
use multisig_ledger::api::{create_router, produce_and_publish, ApiState, WsBroadcaster};
use multisig_ledger::cli;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

#[derive(Parser)]
#[command(name = "ledger")]
#[command(author = "Darshan")]
#[command(version = "0.1.0")]
#[command(about = "A ledger node with multisignature accounts and dapp transfers", long_about = None)]
struct Cli {
    /// Data directory for ledger storage
    #[arg(short, long, default_value = ".ledger_data")]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a genesis file and node settings
    Init {
        /// Address to fund at genesis (repeatable); a key pair is generated if omitted
        #[arg(short, long)]
        fund: Vec<String>,

        /// Genesis balance per funded account, in base units
        #[arg(short, long)]
        balance: Option<u64>,
    },

    /// Generate a key pair, or derive one from a passphrase
    Keygen {
        /// Passphrase to derive the key pair from
        #[arg(short, long)]
        secret: Option<String>,
    },

    /// Show the persisted ledger state
    Status,

    /// Start the node and its REST API
    Start {
        /// Port to listen on for REST API
        #[arg(short, long)]
        port: Option<u16>,

        /// Seconds between produced blocks (0 disables the ticker)
        #[arg(long)]
        block_interval: Option<u64>,

        /// Maximum transactions per block
        #[arg(long)]
        max_block_transactions: Option<usize>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init { fund, balance } => {
            cli::cmd_init(&cli.data_dir, &fund, balance)?;
        }

        Commands::Keygen { secret } => {
            cli::cmd_keygen(secret.as_deref())?;
        }

        Commands::Status => {
            cli::cmd_status(&cli.data_dir)?;
        }

        Commands::Start {
            port,
            block_interval,
            max_block_transactions,
        } => {
            let mut config = cli::load_config(&cli.data_dir)?;
            if let Some(port) = port {
                config.api_port = port;
            }
            if let Some(interval) = block_interval {
                config.block_interval_secs = interval;
            }
            if let Some(max) = max_block_transactions {
                config.max_transactions_per_block = max;
            }

            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(run_node(config))?;
        }
    }

    Ok(())
}

async fn run_node(config: multisig_ledger::NodeConfig) -> Result<(), Box<dyn std::error::Error>> {
    let port = config.api_port;
    let interval = config.block_interval_secs;

    let (node, storage) = cli::load_node(config)?;
    println!("📂 Ledger loaded at height {}", node.height());

    let state = ApiState {
        node: Arc::new(RwLock::new(node)),
        storage: Arc::new(storage),
        ws_broadcaster: Arc::new(WsBroadcaster::new()),
    };

    // Periodic block production
    if interval > 0 {
        let ticker_state = state.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(interval));
            // The first tick fires immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let summary = produce_and_publish(&ticker_state).await;
                log::debug!(
                    "Tick at height {}: {} confirmed",
                    summary.height,
                    summary.confirmed.len()
                );
            }
        });
        println!("⏱️  Producing a block every {}s", interval);
    }

    // Save the ledger on Ctrl+C
    let shutdown_state = state.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        println!("\n📴 Shutting down node...");

        let node = shutdown_state.node.read().await;
        match shutdown_state.storage.save(node.state()) {
            Ok(()) => println!("✅ Ledger saved at height {}", node.height()),
            Err(e) => log::error!("Failed to save ledger: {}", e),
        }
        std::process::exit(0);
    });

    let app = create_router(state);
    let addr = format!("0.0.0.0:{}", port);
    println!("🚀 REST API server starting on http://localhost:{}", port);
    println!();
    println!("📖 Available endpoints:");
    println!("   GET  /health                      - Health check");
    println!("   GET  /ws                          - WebSocket updates");
    println!("   POST /api/transactions            - Submit transaction");
    println!("   GET  /api/transactions/pool       - Pending transactions");
    println!("   GET  /api/transactions/{{id}}       - Transaction status");
    println!("   POST /api/signatures              - Add member signature");
    println!("   POST /api/blocks                  - Produce block now");
    println!("   GET  /api/accounts/{{address}}      - Account details");
    println!("   GET  /api/multisig/{{address}}      - Multisig policy");
    println!("   GET  /api/dapps                   - List dapps");
    println!("   GET  /api/dapps/{{id}}              - Dapp details");
    println!();

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
