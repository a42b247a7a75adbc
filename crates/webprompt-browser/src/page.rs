//! Chat page driver built on CDP.
//!
//! Completion detection: before each submission the number of rendered
//! response nodes is recorded. A response has arrived once a node beyond
//! that count exists, and is complete once its text has stopped changing
//! for the configured settle interval.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::time::Instant;
use tracing::{debug, info};

use webprompt_core::{Error, Result};

use crate::cdp::CdpConnection;
use crate::chrome::ChromeProcess;
use crate::config::{BrowserConfig, PageSelectors};
use crate::driver::RemoteInterfaceDriver;
use crate::script;

/// Polls for the input control before giving up with a submission error.
const INPUT_ATTEMPTS: u32 = 10;

pub struct ChatPageDriver {
    cdp: CdpConnection,
    selectors: PageSelectors,
    poll_interval: Duration,
    settle: Duration,
    /// Response nodes present before the pending submission.
    baseline: usize,
}

impl ChatPageDriver {
    pub fn new(cdp: CdpConnection, config: &BrowserConfig) -> Self {
        Self {
            cdp,
            selectors: config.selectors.clone(),
            poll_interval: config.poll_interval(),
            settle: config.settle(),
            baseline: 0,
        }
    }

    /// Attach to the page target of a freshly launched browser.
    pub async fn connect(chrome: &ChromeProcess, config: &BrowserConfig) -> Result<Self> {
        let ws_url = chrome.page_websocket_url(config.launch_timeout()).await?;
        let cdp = CdpConnection::connect(&ws_url).await?;
        info!("Attached to chat page");
        Ok(Self::new(cdp, config))
    }

    pub async fn close(self) {
        self.cdp.close().await;
    }

    async fn response_count(&mut self) -> Result<usize> {
        let value = self
            .cdp
            .evaluate(&script::count_nodes(&self.selectors.response))
            .await?;
        Ok(value.as_u64().unwrap_or(0) as usize)
    }

    async fn latest_response(&mut self) -> Result<Option<String>> {
        let value = self
            .cdp
            .evaluate(&script::last_node_text(&self.selectors.response))
            .await?;
        Ok(value.as_str().map(str::to_string))
    }

    /// Evaluate a script that reports whether the input control was found,
    /// retrying while the page is still rendering it.
    async fn with_input(&mut self, script: &str) -> Result<()> {
        for attempt in 1..=INPUT_ATTEMPTS {
            if self.cdp.evaluate(script).await? == Value::Bool(true) {
                return Ok(());
            }
            debug!("Input control not ready (attempt {})", attempt);
            tokio::time::sleep(self.poll_interval).await;
        }
        Err(Error::Submission(format!(
            "input control '{}' not found",
            self.selectors.prompt_input
        )))
    }

    async fn press_enter(&mut self) -> Result<()> {
        for kind in ["keyDown", "keyUp"] {
            let mut params = json!({
                "type": kind,
                "key": "Enter",
                "code": "Enter",
                "windowsVirtualKeyCode": 13,
                "nativeVirtualKeyCode": 13,
            });
            if kind == "keyDown" {
                params["text"] = json!("\r");
            }
            self.cdp
                .call("Input.dispatchKeyEvent", params)
                .await
                .map_err(|e| Error::Submission(format!("cannot send Enter: {}", e)))?;
        }
        Ok(())
    }

    async fn attach_file(&mut self, path: &Path) -> Result<()> {
        let document = self.cdp.call("DOM.getDocument", json!({ "depth": 0 })).await?;
        let root = document
            .pointer("/root/nodeId")
            .and_then(Value::as_u64)
            .ok_or_else(|| Error::Driver("DOM.getDocument returned no root".into()))?;

        let found = self
            .cdp
            .call(
                "DOM.querySelector",
                json!({ "nodeId": root, "selector": self.selectors.file_input }),
            )
            .await?;
        let node_id = found.get("nodeId").and_then(Value::as_u64).unwrap_or(0);
        if node_id == 0 {
            return Err(Error::Submission(format!(
                "file input '{}' not found",
                self.selectors.file_input
            )));
        }

        self.cdp
            .call(
                "DOM.setFileInputFiles",
                json!({ "nodeId": node_id, "files": [path.display().to_string()] }),
            )
            .await
            .map_err(|e| Error::Submission(format!("cannot attach image: {}", e)))?;
        Ok(())
    }
}

#[async_trait]
impl RemoteInterfaceDriver for ChatPageDriver {
    async fn submit_prompt(&mut self, text: &str) -> Result<()> {
        self.baseline = self.response_count().await?;
        let fill = script::fill(&self.selectors.prompt_input, text);
        self.with_input(&fill).await?;
        self.press_enter().await?;
        debug!("Prompt submitted ({} chars)", text.len());
        Ok(())
    }

    async fn submit_image(&mut self, path: &Path) -> Result<()> {
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| Error::file(path, e))?;
        if !metadata.is_file() {
            return Err(Error::file(path, "not a regular file"));
        }
        let absolute = tokio::fs::canonicalize(path)
            .await
            .map_err(|e| Error::file(path, e))?;

        self.baseline = self.response_count().await?;
        self.attach_file(&absolute).await?;
        // Give the page time to upload the attachment before sending.
        tokio::time::sleep(self.settle).await;
        let focus = script::focus(&self.selectors.prompt_input);
        self.with_input(&focus).await?;
        self.press_enter().await?;
        debug!("Image submitted: {}", absolute.display());
        Ok(())
    }

    async fn await_response(&mut self, timeout: Duration) -> Result<Option<String>> {
        let deadline = Instant::now() + timeout;

        loop {
            if self.response_count().await? > self.baseline {
                break;
            }
            if Instant::now() >= deadline {
                return Err(Error::Timeout(timeout));
            }
            tokio::time::sleep(self.poll_interval).await;
        }

        let mut latest = self.latest_response().await?;
        let mut stable_since = Instant::now();
        while stable_since.elapsed() < self.settle {
            if Instant::now() >= deadline {
                debug!("Response still changing at deadline; returning current text");
                break;
            }
            tokio::time::sleep(self.poll_interval).await;
            let current = self.latest_response().await?;
            if current != latest {
                latest = current;
                stable_since = Instant::now();
            }
        }

        Ok(latest
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty()))
    }
}
