use std::path::PathBuf;

use chrono::NaiveDate;

use crate::app::{AppContext, Result};
use crate::config::Config;
use crate::export::{Exporter, FsSink, ProgressEvent, ProgressRelay};

pub async fn list_conversations(ctx: &AppContext) -> Result<()> {
    let conversations = ctx.surface().list_conversations().await?;

    if conversations.is_empty() {
        println!("No conversations visible");
        return Ok(());
    }

    for conversation in conversations {
        println!("{}", conversation.title);
    }

    Ok(())
}

pub struct ExportArgs {
    pub chats: Vec<String>,
    pub since: NaiveDate,
    pub out: Option<PathBuf>,
    pub no_media: bool,
    pub open: bool,
}

pub async fn export(ctx: &AppContext, args: ExportArgs) -> Result<()> {
    let mut config = ctx.config.clone();
    if args.no_media {
        config.media.kinds.clear();
    }

    let out_dir = ctx.output_dir(args.out);
    std::fs::create_dir_all(&out_dir)?;
    let sink = FsSink::new(&out_dir);

    println!(
        "Exporting {} conversations since {} into {}",
        args.chats.len(),
        args.since,
        out_dir.display()
    );

    let (relay, mut rx) = ProgressRelay::channel();
    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match event {
                ProgressEvent::AutomationError { .. } => eprintln!("{}", format_event(&event)),
                _ => println!("{}", format_event(&event)),
            }
        }
    });

    let exporter = Exporter::new(ctx.surface(), &ctx.fetcher, &sink, relay, &config);
    let result = exporter.export_conversations(&args.chats, args.since).await;
    // closes the relay so the printer drains and exits
    drop(exporter);

    if let Err(e) = printer.await {
        tracing::error!("Progress printer failed: {}", e);
    }
    sink.flush().await;
    let summary = result?;

    for (title, stats) in &summary.exported {
        println!(
            "  {}: {} messages, {} media items, {} month files{}",
            title,
            stats.messages,
            stats.media_items,
            stats.month_segments,
            if stats.reached_target {
                ""
            } else {
                " (target date not reached)"
            }
        );
    }

    if args.open {
        open::that(&out_dir)?;
    }

    Ok(())
}

pub fn print_config_path(path: Option<PathBuf>) -> std::result::Result<(), crate::config::ConfigError> {
    let path = match path {
        Some(p) => p,
        None => Config::default_config_path()?,
    };
    println!("{}", path.display());
    Ok(())
}

/// One line per progress event.
pub fn format_event(event: &ProgressEvent) -> String {
    match event {
        ProgressEvent::Progress {
            conversation,
            percent_complete,
            stats,
        } => format!(
            "[{:>3}%] {}: {} messages, {} media",
            percent_complete, conversation, stats.messages, stats.media_items
        ),
        ProgressEvent::AutomationError {
            conversation,
            message,
        } => format!("[fail] {}: {}", conversation, message),
        ProgressEvent::ExportComplete { processed, failed } => {
            format!("Export complete: {} processed, {} failed", processed, failed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::ConversationStats;

    #[test]
    fn test_format_event() {
        let progress = ProgressEvent::Progress {
            conversation: "Family".into(),
            percent_complete: 40,
            stats: ConversationStats {
                messages: 120,
                media_items: 3,
                ..Default::default()
            },
        };
        assert_eq!(format_event(&progress), "[ 40%] Family: 120 messages, 3 media");

        let done = ProgressEvent::ExportComplete {
            processed: 2,
            failed: 0,
        };
        assert_eq!(format_event(&done), "Export complete: 2 processed, 0 failed");
    }
}
