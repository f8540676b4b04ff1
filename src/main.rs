use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use backscroll::app::AppContext;
use backscroll::cli::commands::{self, ExportArgs};
use backscroll::cli::{Cli, Commands};
use backscroll::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if let Commands::Config = cli.command {
        commands::print_config_path(cli.config)?;
        return Ok(());
    }

    let config = match cli.config {
        Some(ref path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let ctx = AppContext::connect(config).await?;

    match cli.command {
        Commands::List => {
            commands::list_conversations(&ctx).await?;
        }
        Commands::Export {
            chats,
            since,
            out,
            no_media,
            open,
        } => {
            let args = ExportArgs {
                chats,
                since,
                out,
                no_media,
                open,
            };
            commands::export(&ctx, args).await?;
        }
        Commands::Config => {}
    }

    Ok(())
}
