//! The contract the session layer uses to talk to the remote chat surface.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use webprompt_core::Result;

/// Submits input to, and reads output from, a remote conversational UI.
///
/// Implementations own the mechanics (selectors, polling, transport). Callers
/// make one submission at a time and always follow it with
/// [`await_response`](Self::await_response).
#[async_trait]
pub trait RemoteInterfaceDriver: Send {
    /// Type `text` into the input control and send it.
    ///
    /// Fails with `Error::Submission` when the control cannot be located or
    /// does not accept text.
    async fn submit_prompt(&mut self, text: &str) -> Result<()>;

    /// Attach the image at `path` and send it.
    ///
    /// Fails with `Error::File` when `path` is unreadable, otherwise as
    /// [`submit_prompt`](Self::submit_prompt).
    async fn submit_image(&mut self, path: &Path) -> Result<()>;

    /// Wait for the response to the last submission.
    ///
    /// `Ok(None)` means the interface finished without rendering any content.
    /// Fails with `Error::Timeout` when nothing appears within `timeout`, or
    /// `Error::Driver` for any other fault.
    async fn await_response(&mut self, timeout: Duration) -> Result<Option<String>>;
}
