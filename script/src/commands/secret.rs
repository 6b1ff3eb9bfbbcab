use std::time::Duration;

use anyhow::Result;
use clap::Args;
use colored::*;
use tokio::time::sleep;

use super::{print_header, render_connection, spinner};
use crate::config::AppConfig;
use crate::session::App;

/// Request the secret reveal and poll for the revealed value
#[derive(Args, Debug)]
pub struct SecretCommand {
    /// Submit the reveal request before polling
    #[arg(long, short = 'r')]
    pub request: bool,

    /// Number of polls before giving up
    #[arg(long, default_value_t = 1)]
    pub polls: u32,

    /// Seconds between polls
    #[arg(long, default_value_t = 5)]
    pub interval: u64,
}

impl SecretCommand {
    pub async fn execute(&self, config: &AppConfig) -> Result<()> {
        print_header("🔮 Confidential ERC20 - Secret");

        let mut app = App::build(config).await?;
        app.connect().await?;
        if !render_connection(app.manager()) {
            return Ok(());
        }
        let mut controller = app.controller().await?;

        if self.request {
            let pb = spinner("Requesting secret decryption...");
            let tx = controller.request_secret_reveal().await;
            pb.finish_and_clear();
            if let Some(tx) = tx? {
                println!("{} {} {}", "✅".bright_green(), "Reveal requested:".bright_green(), tx);
            }
        }

        for poll in 1..=self.polls.max(1) {
            let secret = controller.poll_revealed_secret().await?;
            println!(
                "{} {}",
                "The decrypted secret value is:".bright_white(),
                secret.to_string().bright_magenta().bold()
            );
            if !controller.can_refresh_secret() || poll == self.polls {
                break;
            }
            sleep(Duration::from_secs(self.interval)).await;
        }
        Ok(())
    }
}
