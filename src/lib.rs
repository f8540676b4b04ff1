//! # backscroll
//!
//! Exports chat history (text, media, links) from a web messaging client by
//! driving its live page over the Chrome DevTools Protocol.
//!
//! ## Architecture
//!
//! ```text
//! Exporter → Navigator → HistoryEngine → MediaCollector → transcript → DownloadSink
//!                 ↘            ↓               ↓              ↓
//!                   ChatSurface (ChromeSurface over CDP)
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! # Open the client (scan the QR code on first run) and list conversations
//! backscroll list
//!
//! # Export two conversations back to the start of 2024
//! backscroll export --chat Family --chat Work --since 2024-01-01 --open
//!
//! # Where the config file lives
//! backscroll config
//! ```

/// Application context and error handling.
///
/// [`AppContext`](app::AppContext) owns the configuration, the Chrome
/// surface and the HTTP fetcher.
pub mod app;

/// Page surface: the [`ChatSurface`](browser::ChatSurface) trait and its
/// chromiumoxide implementation.
pub mod browser;

/// Command-line interface using clap.
///
/// - `list` - Print visible conversations
/// - `export --chat <TITLE>... --since <DATE>` - Export conversations
/// - `config` - Print the config file path
pub mod cli;

/// Configuration loaded from `~/.config/backscroll/config.toml`.
pub mod config;

/// Date inference for the oldest rendered message.
pub mod dates;

/// Waiting for elements to become visible.
pub mod dom;

/// Core domain models.
///
/// - [`Conversation`](domain::Conversation): a chat thread and its list entry
/// - [`MediaItem`](domain::MediaItem): deduplicated media identity
/// - [`MonthSegment`](domain::MonthSegment): one calendar month of a transcript
/// - [`ExtractedTranscript`](domain::ExtractedTranscript): the assembled export
pub mod domain;

/// Export orchestration, download sink and progress relay.
pub mod export;

/// Scrolling a conversation back to a target date.
pub mod history;

/// Synthetic pointer input.
pub mod interaction;

/// Media, document and link collection.
pub mod media;

/// Opening conversations from the conversation list.
pub mod navigation;

/// Transcript assembly and month partitioning.
pub mod transcript;
