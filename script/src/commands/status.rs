use anyhow::Result;
use clap::Args;
use colored::*;

use super::{print_header, render_connection};
use crate::config::AppConfig;
use crate::session::App;

/// Show wallet, network and engine state
#[derive(Args, Debug)]
pub struct StatusCommand {
    /// Request account authorization and switch network if needed
    #[arg(long, short = 'c')]
    pub connect: bool,
}

impl StatusCommand {
    pub async fn execute(&self, config: &AppConfig) -> Result<()> {
        print_header("🔐 Confidential ERC20 - Status");

        let mut app = App::build(config).await?;
        app.detect().await?;
        if self.connect && app.manager().state().has_provider {
            app.manager_mut().connect().await?;
        }

        let state = app.manager().state();
        println!("{} {}", "Mode:".bright_white(), app.mode().to_string().bright_cyan());
        println!(
            "{} {}",
            "Authorized network:".bright_white(),
            app.mode().authorized_chain_id().bright_cyan()
        );
        println!("{} {}", "Connected:".bright_white(), state.connected);
        println!("{} {}", "Valid network:".bright_white(), state.valid_network);
        println!("{} {}", "Engine ready:".bright_white(), state.engine_ready);
        println!();
        render_connection(app.manager());
        Ok(())
    }
}
