use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "nebulas-watcher",
    version,
    about = "Nebulas chain watcher with Telegram notifications"
)]
pub struct Cli {
    /// Specify the config file path (default: ./config.yaml)
    #[arg(long, default_value = "config.yaml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the scanner, the price feeds and the bot (default)
    Run,
    /// Print the persisted scan cursor and exit
    Cursor,
}
