//! Browser driver configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// CSS selectors used to find controls on the chat page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSelectors {
    #[serde(default = "default_prompt_input")]
    pub prompt_input: String,
    #[serde(default = "default_response")]
    pub response: String,
    #[serde(default = "default_file_input")]
    pub file_input: String,
}

impl Default for PageSelectors {
    fn default() -> Self {
        Self {
            prompt_input: default_prompt_input(),
            response: default_response(),
            file_input: default_file_input(),
        }
    }
}

fn default_prompt_input() -> String {
    "#prompt-textarea".into()
}
fn default_response() -> String {
    "div.markdown".into()
}
fn default_file_input() -> String {
    "input[type=file]".into()
}

/// Browser launch and page-polling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    #[serde(default = "default_url")]
    pub start_url: String,
    #[serde(default)]
    pub headless: bool,
    /// Explicit Chrome/Chromium binary; searched on `PATH` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chrome_path: Option<PathBuf>,
    #[serde(default = "default_debugging_port")]
    pub debugging_port: u16,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    /// How long the newest response must stay unchanged before it counts
    /// as complete.
    #[serde(default = "default_settle")]
    pub settle_ms: u64,
    #[serde(default = "default_launch_timeout")]
    pub launch_timeout_secs: u64,
    #[serde(default)]
    pub selectors: PageSelectors,
}

fn default_url() -> String {
    "https://chatgpt.com".into()
}
fn default_debugging_port() -> u16 {
    9222
}
fn default_poll_interval() -> u64 {
    500
}
fn default_settle() -> u64 {
    2000
}
fn default_launch_timeout() -> u64 {
    20
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            start_url: default_url(),
            headless: false,
            chrome_path: None,
            debugging_port: default_debugging_port(),
            poll_interval_ms: default_poll_interval(),
            settle_ms: default_settle(),
            launch_timeout_secs: default_launch_timeout(),
            selectors: PageSelectors::default(),
        }
    }
}

impl BrowserConfig {
    /// Load config from a JSON file, or return defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!("Ignoring invalid browser config {}: {}", path.display(), e);
                Self::default()
            }),
            Err(e) => {
                warn!("Cannot read browser config {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(50))
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn launch_timeout(&self) -> Duration {
        Duration::from_secs(self.launch_timeout_secs)
    }
}
