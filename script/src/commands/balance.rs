use anyhow::Result;
use clap::Args;
use colored::*;

use super::{print_header, render_balance, render_connection, spinner};
use crate::config::AppConfig;
use crate::session::App;

/// Read the encrypted balance and optionally decrypt it
#[derive(Args, Debug)]
pub struct BalanceCommand {
    /// Reencrypt and decrypt the balance (asks the wallet for a signature)
    #[arg(long, short = 'd')]
    pub decrypt: bool,
}

impl BalanceCommand {
    pub async fn execute(&self, config: &AppConfig) -> Result<()> {
        print_header("💰 Confidential ERC20 - Balance");

        let mut app = App::build(config).await?;
        app.connect().await?;
        if !render_connection(app.manager()) {
            return Ok(());
        }

        let mut controller = app.controller().await?;
        if self.decrypt {
            let pb = spinner("Reencrypting balance...");
            let result = controller.decrypt().await;
            pb.finish_and_clear();
            result?;
            println!("{} {}", "🔓".bright_green(), "Balance decrypted".bright_green());
        }

        println!();
        render_balance(&controller);
        Ok(())
    }
}
