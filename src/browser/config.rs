use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// How to obtain the Chrome page hosting the chat client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Whether to run the browser in headless mode (default: false, login needs a window)
    pub headless: bool,

    /// Persistent profile directory so the chat client stays logged in
    pub user_data_dir: Option<PathBuf>,

    /// Attach to an already running Chrome (e.g. `http://127.0.0.1:9222`) instead of launching
    pub cdp_url: Option<String>,

    /// URL of the web chat client
    pub app_url: String,

    /// How long to wait for the conversation list after opening the client (default: 180)
    pub login_timeout_secs: u64,

    /// User agent string to use
    pub user_agent: Option<String>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: false,
            user_data_dir: dirs::data_dir().map(|d| d.join("backscroll").join("profile")),
            cdp_url: None,
            app_url: "https://web.whatsapp.com/".to_string(),
            login_timeout_secs: 180,
            user_agent: None,
        }
    }
}

impl BrowserConfig {
    pub fn login_timeout(&self) -> Duration {
        Duration::from_secs(self.login_timeout_secs)
    }
}

/// CSS selectors for every part of the host UI the engine touches.
///
/// The host markup changes without notice, so none of these are baked into
/// the engine; override them in the `[selectors]` config section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorTable {
    /// Scrollable pane holding the conversation list
    pub chat_list: String,
    /// Clickable conversation entries inside the list
    pub chat_list_item: String,
    /// Element inside an entry carrying the conversation title
    pub chat_title: String,
    /// Conversation pane that appears once a conversation is open
    pub message_pane: String,
    /// Title of the open conversation in the pane header
    pub header_title: String,
    /// Scroll container of the message history
    pub scroll_container: String,
    /// A single rendered message
    pub message: String,
    /// Element inside a message carrying the structured timestamp attribute
    pub timestamp_holder: String,
    /// Name of the structured timestamp attribute
    pub timestamp_attribute: String,
    /// Row element wrapping messages and separators
    pub row: String,
    /// Visible date separator label
    pub date_separator: String,
    /// Explicit "load older messages" control
    pub load_older: String,
    pub image: String,
    pub video: String,
    pub document: String,
    /// Element inside a document block carrying its file name
    pub document_label: String,
    /// Download control of a document block
    pub document_download: String,
    pub link: String,
    /// Container cloned into the transcript
    pub transcript_container: String,
}

impl Default for SelectorTable {
    fn default() -> Self {
        Self {
            chat_list: "#pane-side".to_string(),
            chat_list_item: "#pane-side [role=\"listitem\"], #pane-side [role=\"row\"]".to_string(),
            chat_title: "span[title]".to_string(),
            message_pane: "#main".to_string(),
            header_title: "#main header span[title], #main header span[dir=\"auto\"]".to_string(),
            scroll_container: "#main [data-tab=\"8\"], #main .copyable-area > div[tabindex]"
                .to_string(),
            message: "#main .message-in, #main .message-out".to_string(),
            timestamp_holder: "[data-pre-plain-text]".to_string(),
            timestamp_attribute: "data-pre-plain-text".to_string(),
            row: "[role=\"row\"]".to_string(),
            date_separator: "#main [role=\"row\"] span[dir=\"auto\"]".to_string(),
            load_older: "#main button[title*=\"older\" i], #main div[role=\"button\"][title*=\"older\" i]"
                .to_string(),
            image: "#main .message-in img[src^=\"blob:\"], #main .message-out img[src^=\"blob:\"]"
                .to_string(),
            video: "#main video[src], #main video source[src]".to_string(),
            document: "#main [data-icon^=\"document\"]".to_string(),
            document_label: "span[title], span[dir=\"auto\"]".to_string(),
            document_download: "[data-icon=\"audio-download\"], [data-icon=\"download\"]".to_string(),
            link: "#main .copyable-text a[href^=\"http\"]".to_string(),
            transcript_container: "#main [role=\"application\"]".to_string(),
        }
    }
}
