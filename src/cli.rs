use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "golosbot")]
#[command(author, version, about = "Telegram bot and REST backend for running voting campaigns", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the Telegram bot (long polling)
    Bot,

    /// Run the voting REST API server
    Serve {
        /// Port to listen on (overrides WEB_PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
