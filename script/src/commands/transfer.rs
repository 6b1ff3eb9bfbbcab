use anyhow::{bail, Result};
use clap::Args;
use colored::*;
use dialoguer::{Confirm, Input};

use super::{print_header, render_balance, render_connection, render_encryption, spinner};
use crate::config::AppConfig;
use crate::session::App;

/// Encrypt an amount and transfer it to a recipient
#[derive(Args, Debug)]
pub struct TransferCommand {
    /// Amount to transfer (will prompt if not provided)
    #[arg(long, short = 'a')]
    pub amount: Option<String>,

    /// Recipient address (will prompt if not provided)
    #[arg(long, short = 't')]
    pub to: Option<String>,

    /// Skip confirmation prompts
    #[arg(long, short = 'y')]
    pub yes: bool,
}

impl TransferCommand {
    pub async fn execute(&self, config: &AppConfig) -> Result<()> {
        print_header("📤 Confidential ERC20 - Transfer");

        let mut app = App::build(config).await?;
        app.connect().await?;
        if !render_connection(app.manager()) {
            return Ok(());
        }
        let mut controller = app.controller().await?;

        let amount = match &self.amount {
            Some(amount) => amount.clone(),
            None => Input::<String>::new()
                .with_prompt(format!("{} Choose an amount to transfer", "💰".bright_yellow()))
                .interact_text()?,
        };
        controller.confirm_transfer_amount(&amount);

        let recipient = match &self.to {
            Some(to) => to.clone(),
            None => Input::<String>::new()
                .with_prompt(format!("{} Recipient address", "📫".bright_yellow()))
                .interact_text()?,
        };
        if controller.confirm_transfer_address(&recipient).is_err() {
            bail!(controller
                .error_message()
                .unwrap_or("Invalid Ethereum address.")
                .to_string());
        }
        println!(
            "{} {}",
            "Chosen recipient address:".bright_white(),
            controller.chosen_address_display().bright_cyan()
        );

        let pb = spinner(&format!("Encrypting {}...", controller.chosen_amount()));
        let encrypted = controller.encrypt_chosen_amount().await;
        pb.finish_and_clear();
        encrypted?;
        render_encryption(&controller);

        if !controller.can_transfer() {
            bail!("nothing to transfer");
        }

        if !self.yes {
            println!();
            let confirmed = Confirm::new()
                .with_prompt(format!(
                    "{} Transfer the encrypted amount to {}?",
                    "⚠️".bright_yellow(),
                    controller.chosen_address_display().bright_red().bold()
                ))
                .default(false)
                .interact()?;

            if !confirmed {
                println!("{} Operation cancelled by user", "🚫".bright_red());
                return Ok(());
            }
        }

        let pb = spinner("Sending transaction to network...");
        let tx = controller.transfer().await;
        pb.finish_and_clear();
        if let Some(tx) = tx? {
            println!("{} {} {}", "✅".bright_green(), "Transaction confirmed:".bright_green(), tx);
        }

        println!();
        render_balance(&controller);
        Ok(())
    }
}
