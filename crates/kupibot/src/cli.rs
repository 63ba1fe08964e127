use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "kupidon")]
#[command(author, version, about = "Telegram bot front end for the Kupidon mini-app", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the bot (webhook mode when BOT_WEBHOOK_URL is set)
    Run {
        /// Force long polling even when a webhook URL is configured
        #[arg(long)]
        polling: bool,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
