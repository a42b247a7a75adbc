//! Session orchestrator: submits prompts and records every attempt.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use webprompt_browser::RemoteInterfaceDriver;
use webprompt_core::{Result, SessionConfig};
use webprompt_notify::NotificationChannel;

use crate::history::{Exchange, ExchangeKind, HistoryStore, Outcome};
use crate::transcript::{self, TranscriptFile};
use crate::wait::{self, Submission, IMAGE_PROMPT};

/// Consecutive failed exchanges before the operator is warned.
const FAILURE_WARN_THRESHOLD: u32 = 3;

/// Drives one conversation through a borrowed driver.
///
/// Every call to [`ask`](Self::ask) or [`ask_with_image`](Self::ask_with_image)
/// appends exactly one [`Exchange`]; no other operation does.
pub struct SessionOrchestrator<'d, D: RemoteInterfaceDriver + ?Sized> {
    driver: &'d mut D,
    history: HistoryStore,
    save_file: Option<TranscriptFile>,
    notifier: Option<Arc<dyn NotificationChannel>>,
    /// Notification deliveries still in flight.
    pending: Vec<JoinHandle<()>>,
    response_timeout: Duration,
    consecutive_failures: u32,
}

impl<'d, D: RemoteInterfaceDriver + ?Sized> SessionOrchestrator<'d, D> {
    pub fn new(config: &SessionConfig, driver: &'d mut D) -> Self {
        Self {
            driver,
            history: HistoryStore::new(),
            save_file: config.save_file().map(TranscriptFile::new),
            notifier: None,
            pending: Vec::new(),
            response_timeout: config.response_timeout(),
            consecutive_failures: 0,
        }
    }

    /// Forward each response to `channel`.
    pub fn with_notifier(mut self, channel: Arc<dyn NotificationChannel>) -> Self {
        self.notifier = Some(channel);
        self
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Send a text prompt. The caller guarantees `prompt` is not blank.
    pub async fn ask(&mut self, prompt: &str) -> Exchange {
        debug_assert!(!prompt.trim().is_empty(), "blank prompts are rejected upstream");
        let result = wait::submit_and_wait(
            &mut *self.driver,
            Submission::Prompt(prompt),
            self.response_timeout,
        )
        .await;
        self.record(
            prompt.to_string(),
            ExchangeKind::Text,
            result.outcome,
            result.response,
            result.elapsed,
        )
    }

    /// Send the image at `path`, then delete it whatever the outcome.
    pub async fn ask_with_image(&mut self, path: &Path) -> Exchange {
        let _cleanup = RemoveOnDrop(path);
        let result = wait::submit_and_wait(
            &mut *self.driver,
            Submission::Image(path),
            self.response_timeout,
        )
        .await;
        self.record(
            IMAGE_PROMPT.to_string(),
            ExchangeKind::Image,
            result.outcome,
            result.response,
            result.elapsed,
        )
    }

    /// Forget every exchange and empty the save file. Irreversible.
    pub fn clear_history(&mut self) {
        let dropped = self.history.len();
        self.history.clear();
        self.consecutive_failures = 0;
        if let Some(file) = &self.save_file {
            if let Err(e) = file.truncate() {
                warn!("Could not truncate save file: {}", e);
            }
        }
        info!("History cleared ({} exchange(s) dropped)", dropped);
    }

    pub fn search_history(&self, term: &str) -> Vec<Exchange> {
        self.history.search(term)
    }

    pub fn export_history(&self, path: &Path) -> Result<()> {
        transcript::export(path, self.history.entries())
    }

    pub fn clipboard_text(&self) -> String {
        self.history.clipboard_text()
    }

    /// Wait up to `timeout` for notifications still being delivered.
    pub async fn flush_notifications(&mut self, timeout: Duration) {
        let deadline = tokio::time::Instant::now() + timeout;
        for handle in self.pending.drain(..) {
            if tokio::time::timeout_at(deadline, handle).await.is_err() {
                warn!("Gave up waiting for a notification to be delivered");
            }
        }
    }

    fn record(
        &mut self,
        prompt: String,
        kind: ExchangeKind,
        outcome: Outcome,
        response: String,
        elapsed: Duration,
    ) -> Exchange {
        let exchange = Exchange::new(prompt, response, kind, outcome, elapsed);
        self.history.push(exchange.clone());
        info!(
            "Exchange #{} ({:?}) finished: {} in {:.1}s",
            self.history.len(),
            kind,
            outcome,
            elapsed.as_secs_f64()
        );

        self.track_failures(outcome);

        if let Some(file) = &self.save_file {
            if let Err(e) = file.append(&exchange) {
                warn!("Could not write to save file: {}", e);
            }
        }

        if let Some(channel) = &self.notifier {
            self.pending.retain(|handle| !handle.is_finished());
            let channel = Arc::clone(channel);
            let message = exchange.response().to_string();
            self.pending.push(tokio::spawn(async move {
                match channel.notify(&message).await {
                    Ok(()) => debug!("{} notification delivered", channel.name()),
                    Err(e) => warn!("{} notification failed: {}", channel.name(), e),
                }
            }));
        }

        exchange
    }

    /// Only a success ends a failure streak; an empty answer leaves it as is.
    fn track_failures(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Success => {
                self.consecutive_failures = 0;
                return;
            }
            Outcome::Empty => return,
            Outcome::Failure => self.consecutive_failures += 1,
        }
        if self.consecutive_failures >= FAILURE_WARN_THRESHOLD {
            warn!(
                "{} consecutive exchanges have failed; the page may need attention",
                self.consecutive_failures
            );
        }
    }
}

/// Removes a file when dropped, so it goes away on every exit path.
struct RemoveOnDrop<'a>(&'a Path);

impl Drop for RemoveOnDrop<'_> {
    fn drop(&mut self) {
        match std::fs::remove_file(self.0) {
            Ok(()) => debug!("Removed temporary image {}", self.0.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Could not remove {}: {}", self.0.display(), e),
        }
    }
}
