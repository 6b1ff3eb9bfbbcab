use anyhow::Result;
use clap::Args;
use colored::*;
use dialoguer::{Input, Select};
use tracing::warn;

use super::{print_header, render_balance, render_connection, render_encryption, spinner};
use crate::config::AppConfig;
use crate::session::App;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Decrypt,
    ChooseAmount,
    Encrypt,
    ChooseRecipient,
    Transfer,
    RequestSecret,
    RefreshSecret,
    RefreshBalance,
    Quit,
}

impl Action {
    fn label(self, amount: &str) -> String {
        match self {
            Action::Decrypt => "Reencrypt and decrypt my balance".to_string(),
            Action::ChooseAmount => "Choose an amount to transfer".to_string(),
            Action::Encrypt => format!("Encrypt {amount}"),
            Action::ChooseRecipient => "Choose a recipient address".to_string(),
            Action::Transfer => "Transfer Encrypted Amount to Recipient".to_string(),
            Action::RequestSecret => "Request Secret Decryption".to_string(),
            Action::RefreshSecret => "Refresh Decrypted Secret".to_string(),
            Action::RefreshBalance => "Refresh encrypted balance".to_string(),
            Action::Quit => "Quit".to_string(),
        }
    }
}

/// Interactive session over one connection
#[derive(Args, Debug)]
pub struct DevnetCommand {}

impl DevnetCommand {
    pub async fn execute(&self, config: &AppConfig) -> Result<()> {
        print_header("🌑 Confidential ERC20 - Devnet");

        let mut app = App::build(config).await?;
        app.connect().await?;
        if !render_connection(app.manager()) {
            return Ok(());
        }
        let mut controller = app.controller().await?;

        loop {
            if app.manager_mut().drain_events().await? > 0 {
                match app.manager().session() {
                    Some(session) => controller.set_session(session).await?,
                    None => {
                        render_connection(app.manager());
                        return Ok(());
                    }
                }
            }

            println!();
            render_balance(&controller);
            render_encryption(&controller);
            if controller.chosen_address().is_some() {
                println!(
                    "{} {}",
                    "Chosen recipient address:".bright_white(),
                    controller.chosen_address_display().bright_cyan()
                );
            }
            if let Some(message) = controller.error_message() {
                println!("{}", message.bright_red());
            }
            println!(
                "{} {}",
                "The decrypted secret value is:".bright_white(),
                controller.secret().to_string().bright_magenta()
            );
            println!();

            let mut actions = vec![
                Action::Decrypt,
                Action::ChooseAmount,
                Action::Encrypt,
                Action::ChooseRecipient,
            ];
            if controller.can_transfer() {
                actions.push(Action::Transfer);
            }
            if controller.can_request_reveal() {
                actions.push(Action::RequestSecret);
            }
            if controller.can_refresh_secret() {
                actions.push(Action::RefreshSecret);
            }
            actions.push(Action::RefreshBalance);
            actions.push(Action::Quit);

            let labels: Vec<String> = actions
                .iter()
                .map(|a| a.label(controller.chosen_amount()))
                .collect();
            let choice = Select::new()
                .with_prompt("What next?")
                .items(&labels)
                .default(0)
                .interact()?;

            let result = match actions[choice] {
                Action::Decrypt => {
                    let pb = spinner("Reencrypting balance...");
                    let result = controller.decrypt().await;
                    pb.finish_and_clear();
                    result
                }
                Action::ChooseAmount => {
                    let amount: String = Input::<String>::new().with_prompt("Enter a number").interact_text()?;
                    controller.confirm_transfer_amount(&amount);
                    Ok(())
                }
                Action::Encrypt => {
                    let pb = spinner("Encrypting...");
                    let result = controller.encrypt_chosen_amount().await;
                    pb.finish_and_clear();
                    result
                }
                Action::ChooseRecipient => {
                    let address: String = Input::<String>::new().with_prompt("Recipient address").interact_text()?;
                    // The error message is rendered with the next view.
                    let _ = controller.confirm_transfer_address(&address);
                    Ok(())
                }
                Action::Transfer => {
                    let pb = spinner("Sending transaction to network...");
                    let result = controller.transfer().await.map(|_| ());
                    pb.finish_and_clear();
                    result
                }
                Action::RequestSecret => {
                    let pb = spinner("Requesting secret decryption...");
                    let result = controller.request_secret_reveal().await.map(|_| ());
                    pb.finish_and_clear();
                    result
                }
                Action::RefreshSecret => controller.poll_revealed_secret().await.map(|_| ()),
                Action::RefreshBalance => controller.refresh_encrypted_balance().await,
                Action::Quit => break,
            };

            if let Err(e) = result {
                warn!("action failed: {e}");
                eprintln!("{} {}", "💥".bright_red(), e.to_string().bright_red());
            }
        }

        app.manager_mut().shutdown();
        Ok(())
    }
}
