//! Response-wait protocol.
//!
//! A submission ends in exactly one of three ways: content (trimmed), no
//! content (`[no response]`), or failure (`[ERROR] <description>`). One
//! fixed window covers submit and wait together; there is no retry.

use std::path::Path;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use webprompt_browser::RemoteInterfaceDriver;
use webprompt_core::{Error, Result};

use crate::history::Outcome;

/// Response recorded when the interface finished without content.
pub const NO_RESPONSE: &str = "[no response]";
/// Prefix of the response recorded for failed submissions.
pub const ERROR_PREFIX: &str = "[ERROR]";
/// Prompt recorded for image submissions.
pub const IMAGE_PROMPT: &str = "[image]";

pub(crate) enum Submission<'a> {
    Prompt(&'a str),
    Image(&'a Path),
}

pub(crate) struct WaitResult {
    pub outcome: Outcome,
    pub response: String,
    pub elapsed: Duration,
}

/// Submit and wait, bounded by `window`. Never fails: errors are folded
/// into the result.
pub(crate) async fn submit_and_wait<D>(
    driver: &mut D,
    submission: Submission<'_>,
    window: Duration,
) -> WaitResult
where
    D: RemoteInterfaceDriver + ?Sized,
{
    let started = Instant::now();
    let attempt = async move {
        match submission {
            Submission::Prompt(text) => driver.submit_prompt(text).await?,
            Submission::Image(path) => driver.submit_image(path).await?,
        }
        let remaining = window.saturating_sub(started.elapsed());
        driver.await_response(remaining).await
    };

    // The driver only sees what is left of the window; report the whole window.
    let result = match tokio::time::timeout(window, attempt).await {
        Ok(Err(Error::Timeout(_))) | Err(_) => Err(Error::Timeout(window)),
        Ok(result) => result,
    };
    let (outcome, response) = classify(result);
    let elapsed = started.elapsed();
    debug!("Submission finished: {} after {:?}", outcome, elapsed);

    WaitResult {
        outcome,
        response,
        elapsed,
    }
}

/// Map a driver result onto an outcome and the text to record.
pub fn classify(result: Result<Option<String>>) -> (Outcome, String) {
    match result {
        Ok(Some(text)) => {
            let text = text.trim();
            if text.is_empty() {
                (Outcome::Empty, NO_RESPONSE.to_string())
            } else {
                (Outcome::Success, text.to_string())
            }
        }
        Ok(None) => (Outcome::Empty, NO_RESPONSE.to_string()),
        Err(e) => (Outcome::Failure, error_marker(&e)),
    }
}

pub fn error_marker(err: &Error) -> String {
    format!("{} {}", ERROR_PREFIX, err)
}
