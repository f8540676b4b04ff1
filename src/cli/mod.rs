pub mod commands;

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "backscroll")]
#[command(about = "Export chat history from a web messaging client", long_about = None)]
pub struct Cli {
    /// Config file to use instead of ~/.config/backscroll/config.toml
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the conversations currently visible in the client
    List,
    /// Export conversations back to a date
    Export {
        /// Conversation title; repeat for several conversations
        #[arg(long = "chat", required = true)]
        chats: Vec<String>,

        /// Oldest day to load, as YYYY-MM-DD
        #[arg(long)]
        since: NaiveDate,

        /// Output directory (default: from config)
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Skip images, videos, documents and links
        #[arg(long)]
        no_media: bool,

        /// Open the output directory when done
        #[arg(long)]
        open: bool,
    },
    /// Print the config file path
    Config,
}
