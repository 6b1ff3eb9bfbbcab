//! Confidential ERC20 CLI
//!
//! Connects a wallet, checks the network, then reads, decrypts and transfers
//! an encrypted token balance.
//!
//! Usage:
//! ```shell
//! # Show the connection state
//! cargo run --bin cerc20 -- status --connect
//!
//! # Decrypt my balance on a local mocked network
//! cargo run --bin cerc20 -- --mocked balance --decrypt
//!
//! # Transfer an encrypted amount on Sepolia
//! cargo run --bin cerc20 -- transfer --amount 42 --to $RECIPIENT -p '$PRIVATE_KEY'
//! ```

use clap::{Parser, Subcommand};
use colored::*;
use std::process;
use tracing_subscriber::EnvFilter;

use cerc20_script::commands::{BalanceCommand, DevnetCommand, SecretCommand, StatusCommand, TransferCommand};
use cerc20_script::AppConfig;

#[derive(Parser)]
#[command(
    name = "cerc20",
    about = "🔐 Confidential ERC20 client",
    long_about = "Client for a confidential ERC20 token.\n\nFeatures:\n• Connects a wallet and checks the authorized network\n• Reads and decrypts the encrypted balance\n• Encrypts amounts and transfers them\n• Requests and polls the contract secret",
    version = "0.1.0"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    config: AppConfig,

    /// Enable verbose logging
    #[arg(long, short = 'v', global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// 🔌 Show wallet, network and engine state
    Status(StatusCommand),
    /// 💰 Read and decrypt the encrypted balance
    Balance(BalanceCommand),
    /// 📤 Encrypt an amount and transfer it
    Transfer(TransferCommand),
    /// 🔮 Request and poll the contract secret
    Secret(SecretCommand),
    /// 🌑 Interactive session
    Devnet(DevnetCommand),
}

fn setup_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with_target(false)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Load environment variables
    dotenv::dotenv().ok();

    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let result = match &cli.command {
        Commands::Status(cmd) => cmd.execute(&cli.config).await,
        Commands::Balance(cmd) => cmd.execute(&cli.config).await,
        Commands::Transfer(cmd) => cmd.execute(&cli.config).await,
        Commands::Secret(cmd) => cmd.execute(&cli.config).await,
        Commands::Devnet(cmd) => cmd.execute(&cli.config).await,
    };

    if let Err(e) = result {
        println!();
        eprintln!("{} {}", "💥".bright_red(), "Operation failed!".bright_red().bold());
        eprintln!("   {}", format!("{e:#}").bright_red());
        println!();
        eprintln!("{} {}", "💡".bright_blue(), "Tips:".bright_blue().bold());
        eprintln!("   • Check your private key format (should start with 0x)");
        eprintln!("   • Ensure your RPC endpoint and encryption gateway are reachable");
        eprintln!("   • Use --mocked to run against the in-process network");
        eprintln!("   • Run with --verbose for detailed logs");

        process::exit(1);
    }
}
