//! webprompt: talk to a browser-hosted chat assistant from the terminal.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use webprompt_browser::{BrowserConfig, ChatPageDriver, ChromeProcess};
use webprompt_core::{SessionConfig, SessionOptions};
use webprompt_notify::TelegramChannel;
use webprompt_session::SessionOrchestrator;

mod clipboard;
mod repl;

use clipboard::SessionClipboard;
use repl::OperatorInput;

/// How long teardown waits for notifications still in flight.
const NOTIFY_FLUSH: Duration = Duration::from_secs(5);

#[derive(Parser)]
#[command(
    name = "webprompt",
    version,
    about = "Send prompts to a browser chat assistant and keep the transcript"
)]
struct Cli {
    /// Run the browser without a window.
    #[arg(long)]
    headless: bool,

    /// Append every exchange to this file.
    #[arg(long, value_name = "PATH")]
    save_file: Option<PathBuf>,

    /// Send each non-empty line of this file as a prompt before the prompt loop.
    #[arg(long, value_name = "PATH")]
    batch: Option<PathBuf>,

    /// Forward every response to Telegram.
    #[arg(long)]
    notify: bool,

    #[arg(long, env = "WEBPROMPT_TELEGRAM_CHAT_ID", value_name = "ID")]
    telegram_chat_id: Option<String>,

    #[arg(
        long,
        env = "WEBPROMPT_TELEGRAM_TOKEN",
        value_name = "TOKEN",
        hide_env_values = true
    )]
    telegram_token: Option<String>,

    /// JSON file with `chat_id` and `token`, used for whatever the flags leave unset.
    #[arg(long, value_name = "FILE")]
    notify_config: Option<PathBuf>,

    /// Chat page to open.
    #[arg(long)]
    url: Option<String>,

    /// Chrome or Chromium binary.
    #[arg(long, value_name = "PATH")]
    chrome: Option<PathBuf>,

    /// JSON browser settings (selectors, ports, timings).
    #[arg(long, value_name = "FILE")]
    browser_config: Option<PathBuf>,

    /// Seconds to wait for each response.
    #[arg(long, value_name = "SECS", default_value_t = 60)]
    timeout_secs: u64,

    /// Start immediately instead of waiting for a manual login.
    #[arg(long)]
    no_wait: bool,
}

impl Cli {
    fn session_options(&self) -> SessionOptions {
        SessionOptions {
            headless: self.headless,
            save_file: self.save_file.clone(),
            batch_prompts: self.batch.clone(),
            notify: self.notify,
            chat_id: self.telegram_chat_id.clone(),
            credential: self.telegram_token.clone(),
            notify_config: self.notify_config.clone(),
            timeout: Some(Duration::from_secs(self.timeout_secs)),
        }
    }

    fn browser_config(&self) -> BrowserConfig {
        let mut config = match &self.browser_config {
            Some(path) => BrowserConfig::load(path),
            None => BrowserConfig::default(),
        };
        if let Some(url) = &self.url {
            config.start_url = url.clone();
        }
        if let Some(chrome) = &self.chrome {
            config.chrome_path = Some(chrome.clone());
        }
        config.headless |= self.headless;
        config
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout carries the answers.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = SessionConfig::resolve(cli.session_options())?;
    let browser = cli.browser_config();

    // A launch dropped midway kills its child and removes its profile.
    let launched =
        interruptible(ChromeProcess::launch(&browser), tokio::signal::ctrl_c()).await;
    let chrome = match launched {
        Some(launched) => launched.context("Failed to launch Chrome")?,
        None => {
            info!("Interrupted during browser launch");
            return Ok(());
        }
    };
    let attached = interruptible(
        ChatPageDriver::connect(&chrome, &browser),
        tokio::signal::ctrl_c(),
    )
    .await;
    let mut driver = match attached {
        Some(Ok(driver)) => driver,
        Some(Err(e)) => {
            chrome.shutdown().await;
            return Err(e).context("Failed to attach to the chat page");
        }
        None => {
            info!("Interrupted while attaching to the chat page");
            chrome.shutdown().await;
            return Ok(());
        }
    };
    info!("Opened {}", browser.start_url);

    let mut input = OperatorInput::spawn_stdin();
    let mut clipboard = SessionClipboard::new();
    {
        let mut session = SessionOrchestrator::new(&config, &mut driver);
        if let Some(target) = config.notify_target() {
            session = session.with_notifier(Arc::new(TelegramChannel::new(target)));
            info!("Responses will be forwarded to Telegram");
        }

        let finished = interruptible(
            repl::run(&mut session, &config, &mut input, &mut clipboard, !cli.no_wait),
            tokio::signal::ctrl_c(),
        )
        .await;
        if finished.is_none() {
            println!();
            info!("Interrupted");
        }

        session.flush_notifications(NOTIFY_FLUSH).await;
        info!("Session ended with {} exchange(s)", session.history().len());
    }

    driver.close().await;
    chrome.shutdown().await;
    Ok(())
}

/// Run `work` unless `interrupt` completes first, in which case `work`
/// is dropped and `None` is returned.
async fn interruptible<F, I>(work: F, interrupt: I) -> Option<F::Output>
where
    F: Future,
    I: Future,
{
    tokio::select! {
        output = work => Some(output),
        _ = interrupt => None,
    }
}
