//! Chrome process lifecycle: locate, launch, discover the page target, kill.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use serde::Deserialize;
use tempfile::TempDir;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use webprompt_core::{Error, Result};

use crate::config::BrowserConfig;

const CHROME_CANDIDATES: &[&str] = &[
    "google-chrome",
    "google-chrome-stable",
    "chromium",
    "chromium-browser",
    "chrome",
];

#[cfg(target_os = "macos")]
const MACOS_CHROME: &str = "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome";

/// A running Chrome instance with a throwaway profile.
pub struct ChromeProcess {
    child: Child,
    // Held so the profile directory lives exactly as long as the browser.
    profile: TempDir,
    debugging_port: u16,
}

#[derive(Debug, Deserialize)]
struct TargetInfo {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    url: String,
    #[serde(rename = "webSocketDebuggerUrl")]
    ws_url: Option<String>,
}

impl ChromeProcess {
    /// Launch Chrome and wait until DevTools is reachable.
    pub async fn launch(config: &BrowserConfig) -> Result<Self> {
        let binary = find_chrome(config.chrome_path.as_deref())?;
        let profile = tempfile::Builder::new()
            .prefix("webprompt-profile-")
            .tempdir()
            .map_err(|e| Error::Driver(format!("cannot create browser profile: {}", e)))?;

        let args = launch_args(config, profile.path());
        debug!("Launching {} {:?}", binary.display(), args);

        let child = Command::new(&binary)
            .args(&args)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::Driver(format!("cannot start {}: {}", binary.display(), e)))?;

        info!(
            "Chrome started (pid {:?}, headless={}, port {})",
            child.id(),
            config.headless,
            config.debugging_port
        );

        Ok(Self {
            child,
            profile,
            debugging_port: config.debugging_port,
        })
    }

    /// Poll `/json/list` until a page target with a debugger URL shows up.
    pub async fn page_websocket_url(&self, timeout: Duration) -> Result<String> {
        let client = reqwest::Client::new();
        let endpoint = format!("http://127.0.0.1:{}/json/list", self.debugging_port);
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            match client.get(&endpoint).send().await {
                Ok(response) => match response.json::<Vec<TargetInfo>>().await {
                    Ok(targets) => {
                        if let Some(url) = pick_page_target(&targets) {
                            return Ok(url);
                        }
                    }
                    Err(e) => debug!("DevTools target list not ready: {}", e),
                },
                Err(e) => debug!("DevTools not reachable yet: {}", e),
            }

            if tokio::time::Instant::now() >= deadline {
                return Err(Error::Driver(format!(
                    "no page target on DevTools port {} after {}s",
                    self.debugging_port,
                    timeout.as_secs()
                )));
            }
            tokio::time::sleep(Duration::from_millis(250)).await;
        }
    }

    /// Kill the browser and remove its profile.
    pub async fn shutdown(mut self) {
        if let Err(e) = self.child.kill().await {
            warn!("Failed to stop Chrome: {}", e);
        }
        if let Err(e) = self.profile.close() {
            debug!("Failed to remove browser profile: {}", e);
        }
        info!("Chrome stopped");
    }
}

/// First page target (preferring non-devtools URLs) that exposes a debugger.
fn pick_page_target(targets: &[TargetInfo]) -> Option<String> {
    targets
        .iter()
        .filter(|t| t.kind == "page" && !t.url.starts_with("devtools://"))
        .find_map(|t| t.ws_url.clone())
}

fn launch_args(config: &BrowserConfig, profile: &Path) -> Vec<String> {
    let mut args = vec![
        format!("--remote-debugging-port={}", config.debugging_port),
        format!("--user-data-dir={}", profile.display()),
        "--no-first-run".to_string(),
        "--no-default-browser-check".to_string(),
        "--no-service-autorun".to_string(),
        "--password-store=basic".to_string(),
        "--disable-blink-features=AutomationControlled".to_string(),
        "--incognito".to_string(),
        "--disable-notifications".to_string(),
        "--start-maximized".to_string(),
    ];
    if config.headless {
        args.push("--headless=new".to_string());
    }
    args.push(config.start_url.clone());
    args
}

fn find_chrome(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        if path.is_file() {
            return Ok(path.to_path_buf());
        }
        return Err(Error::Config(format!(
            "Chrome binary not found at {}",
            path.display()
        )));
    }

    if let Some(path_var) = std::env::var_os("PATH") {
        for dir in std::env::split_paths(&path_var) {
            for name in CHROME_CANDIDATES {
                let candidate = dir.join(name);
                if candidate.is_file() {
                    return Ok(candidate);
                }
            }
        }
    }

    #[cfg(target_os = "macos")]
    {
        let app = PathBuf::from(MACOS_CHROME);
        if app.is_file() {
            return Ok(app);
        }
    }

    Err(Error::Config(
        "no Chrome or Chromium binary found; pass --chrome <path>".into(),
    ))
}
