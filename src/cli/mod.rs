use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;

use papertrader::Config;

pub mod commands;
pub mod migrate;

#[derive(Parser)]
#[command(
    name = "papertrader",
    about = "AI-assisted trading signals and paper portfolio",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP API
    Serve {
        /// Port to listen on (overrides PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Generate a BUY/SELL/HOLD signal for a symbol
    Signal {
        #[arg(short, long)]
        symbol: String,
    },

    /// Create a paper account with starting cash (no-op if it exists)
    Open {
        #[arg(short, long)]
        account: String,
    },

    /// Buy shares at the given price
    Buy {
        #[arg(short, long)]
        account: String,

        #[arg(short, long)]
        symbol: String,

        #[arg(short, long)]
        quantity: u64,

        #[arg(short, long)]
        price: f64,
    },

    /// Sell shares at the given price
    Sell {
        #[arg(short, long)]
        account: String,

        #[arg(short, long)]
        symbol: String,

        #[arg(short, long)]
        quantity: u64,

        #[arg(short, long)]
        price: f64,
    },

    /// Show holdings and net worth
    Portfolio {
        #[arg(short, long)]
        account: String,
    },

    /// Run database migrations
    Migrate,
}

/// Execute CLI command
pub async fn run(cli: Cli, mut config: Config) -> Result<()> {
    match cli.command {
        Commands::Serve { port } => {
            if let Some(port) = port {
                config.server.port = port;
            }
            papertrader::server::serve(&config).await?;
        }
        Commands::Signal { symbol } => {
            info!("Generating signal for {}", symbol);
            commands::signal(&config, &symbol).await?;
        }
        Commands::Open { account } => {
            commands::open(&config, &account).await?;
        }
        Commands::Buy {
            account,
            symbol,
            quantity,
            price,
        } => {
            commands::trade(&config, &account, &symbol, quantity, price, commands::Side::Buy)
                .await?;
        }
        Commands::Sell {
            account,
            symbol,
            quantity,
            price,
        } => {
            commands::trade(&config, &account, &symbol, quantity, price, commands::Side::Sell)
                .await?;
        }
        Commands::Portfolio { account } => {
            commands::portfolio(&config, &account).await?;
        }
        Commands::Migrate => {
            migrate::execute(&config).await?;
        }
    }

    Ok(())
}
