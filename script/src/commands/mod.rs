//! Terminal commands
//!
//! Each command builds an [`App`](crate::session::App), brings the connection
//! as far as it can and renders what the connection manager exposes.

pub mod balance;
pub mod devnet;
pub mod secret;
pub mod status;
pub mod transfer;

pub use balance::BalanceCommand;
pub use devnet::DevnetCommand;
pub use secret::SecretCommand;
pub use status::StatusCommand;
pub use transfer::TransferCommand;

use std::time::Duration;

use cerc20_lib::connection::{ConnectionManager, ConnectionView};
use cerc20_lib::BalanceController;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};

pub(crate) fn print_header(title: &str) {
    println!("{}", title.bright_cyan().bold());
    println!("{}", "═".repeat(50).bright_black());
    println!();
}

pub(crate) fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner()
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
        .template("{spinner:.cyan} {msg}")
    {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Prints the connection view. Returns true when the session is ready.
pub(crate) fn render_connection(manager: &ConnectionManager) -> bool {
    match manager.view() {
        ConnectionView::NoWallet => {
            println!("{} {}", "❌".bright_red(), "No wallet has been found".bright_red());
            false
        }
        ConnectionView::Hidden => {
            println!("{} {}", "🔌".bright_yellow(), "Not connected".bright_yellow());
            false
        }
        ConnectionView::WrongNetwork { .. } => {
            println!(
                "{} {}",
                "⚠️".bright_yellow(),
                manager.switch_prompt().bright_yellow().bold()
            );
            if let Some(notice) = &manager.state().notice {
                println!("   {}", notice.bright_red());
            }
            false
        }
        ConnectionView::Loading => {
            println!("{} {}", "⏳".bright_blue(), "Loading...".bright_blue());
            false
        }
        ConnectionView::Ready(_) => {
            if let Some(label) = manager.account_label() {
                println!(
                    "{} Connected with {}",
                    "🟢".bright_green(),
                    label.bright_green().bold()
                );
            }
            true
        }
    }
}

pub(crate) fn render_balance(controller: &BalanceController) {
    println!("{}", "📋 Encrypted Balance".bright_green().bold());
    println!("{}", "─".repeat(30).bright_black());
    println!(
        "{} {}",
        "Token:".bright_white(),
        controller.contract_address().to_checksum(None).bright_cyan()
    );
    println!(
        "{} {}",
        "My encrypted balance is:".bright_white(),
        controller.encrypted_balance_display().bright_yellow()
    );
    println!(
        "{} {}",
        "My decrypted private balance is:".bright_white(),
        controller.decrypted_balance().to_string().bright_green().bold()
    );
}

pub(crate) fn render_encryption(controller: &BalanceController) {
    let (Some(handle), Some(proof)) = (controller.handle_hex(), controller.proof_hex()) else {
        return;
    };
    println!(
        "{}",
        format!("This is an encryption of {}:", controller.chosen_amount()).bright_white()
    );
    println!("   {} {}", "Handle:".bright_white(), handle.bright_black());
    println!("   {} {}", "Input Proof:".bright_white(), proof.bright_black());
}
