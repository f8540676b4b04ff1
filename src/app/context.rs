use std::path::PathBuf;

use tracing::info;

use crate::app::error::Result;
use crate::browser::{ChatSurface, ChromeSurface};
use crate::config::Config;
use crate::dom::wait_for_element;
use crate::media::HttpFetcher;

/// Everything a command needs once the chat client is up.
pub struct AppContext {
    pub config: Config,
    pub surface: ChromeSurface,
    pub fetcher: HttpFetcher,
}

impl AppContext {
    /// Open the chat client and wait until the conversation list is rendered.
    ///
    /// On a fresh profile this is where the QR-code login happens, hence the
    /// long `login_timeout_secs`.
    pub async fn connect(config: Config) -> Result<Self> {
        let surface = ChromeSurface::open(&config.browser, config.selectors.clone()).await?;

        info!(
            "Waiting up to {}s for the conversation list",
            config.browser.login_timeout_secs
        );
        wait_for_element(
            &surface,
            &config.selectors.chat_list,
            config.browser.login_timeout(),
        )
        .await?;

        let fetcher = HttpFetcher::new(config.browser.user_agent.as_deref())?;

        Ok(Self {
            config,
            surface,
            fetcher,
        })
    }

    pub fn surface(&self) -> &dyn ChatSurface {
        &self.surface
    }

    /// Output root: the command-line override, else the configured directory.
    pub fn output_dir(&self, overridden: Option<PathBuf>) -> PathBuf {
        overridden.unwrap_or_else(|| self.config.export.output_dir())
    }
}
