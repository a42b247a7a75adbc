//! Session configuration, assembled once at startup and never mutated.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};

/// Window for the whole submit-and-wait sequence of one exchange.
pub const RESPONSE_TIMEOUT: Duration = Duration::from_secs(60);

/// Where notifications go and the credential used to send them.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct NotifyTarget {
    pub chat_id: String,
    #[serde(alias = "token")]
    pub credential: String,
}

impl std::fmt::Debug for NotifyTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifyTarget")
            .field("chat_id", &self.chat_id)
            .field("credential", &"<redacted>")
            .finish()
    }
}

impl NotifyTarget {
    /// Read a `{ "chat_id": ..., "token": ... }` file. Read-only: nothing
    /// ever writes credentials back.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| Error::file(path, e))?;
        serde_json::from_str(&raw)
            .map_err(|e| Error::Config(format!("invalid notify config {}: {}", path.display(), e)))
    }
}

/// Raw, unvalidated run options as collected by the launcher.
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    pub headless: bool,
    pub save_file: Option<PathBuf>,
    pub batch_prompts: Option<PathBuf>,
    pub notify: bool,
    pub chat_id: Option<String>,
    pub credential: Option<String>,
    pub notify_config: Option<PathBuf>,
    pub timeout: Option<Duration>,
}

/// Immutable record of run options.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    headless: bool,
    save_file: Option<PathBuf>,
    batch_prompts: Option<PathBuf>,
    notify: bool,
    notify_target: Option<NotifyTarget>,
    response_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            headless: false,
            save_file: None,
            batch_prompts: None,
            notify: false,
            notify_target: None,
            response_timeout: RESPONSE_TIMEOUT,
        }
    }
}

impl SessionConfig {
    /// Validate options and freeze them.
    ///
    /// Explicit chat id / credential win over the notify config file.
    /// Requesting notifications without both resolving is a `Config` error.
    pub fn resolve(options: SessionOptions) -> Result<Self> {
        let notify_target = if options.notify {
            Some(resolve_target(&options)?)
        } else {
            None
        };

        let response_timeout = match options.timeout {
            Some(t) if t.is_zero() => {
                return Err(Error::Config("response timeout must be positive".into()))
            }
            Some(t) => t,
            None => RESPONSE_TIMEOUT,
        };

        if let Some(path) = &options.save_file {
            if path.is_dir() {
                return Err(Error::Config(format!(
                    "save file {} is a directory",
                    path.display()
                )));
            }
        }

        Ok(Self {
            headless: options.headless,
            save_file: options.save_file,
            batch_prompts: options.batch_prompts,
            notify: options.notify,
            notify_target,
            response_timeout,
        })
    }

    pub fn headless(&self) -> bool {
        self.headless
    }

    pub fn save_file(&self) -> Option<&Path> {
        self.save_file.as_deref()
    }

    pub fn batch_prompts(&self) -> Option<&Path> {
        self.batch_prompts.as_deref()
    }

    pub fn notify(&self) -> bool {
        self.notify
    }

    pub fn notify_target(&self) -> Option<&NotifyTarget> {
        self.notify_target.as_ref()
    }

    pub fn response_timeout(&self) -> Duration {
        self.response_timeout
    }
}

fn resolve_target(options: &SessionOptions) -> Result<NotifyTarget> {
    let from_file = match &options.notify_config {
        Some(path) => Some(NotifyTarget::load(path).map_err(|e| match e {
            Error::File(msg) => Error::Config(format!("cannot read notify config {}", msg)),
            other => other,
        })?),
        None => None,
    };

    let chat_id = non_blank(options.chat_id.as_deref())
        .or_else(|| from_file.as_ref().map(|t| t.chat_id.clone()))
        .filter(|s| !s.trim().is_empty());
    let credential = non_blank(options.credential.as_deref())
        .or_else(|| from_file.as_ref().map(|t| t.credential.clone()))
        .filter(|s| !s.trim().is_empty());

    match (chat_id, credential) {
        (Some(chat_id), Some(credential)) => {
            debug!("Notification target resolved: chat_id={}", chat_id);
            Ok(NotifyTarget { chat_id, credential })
        }
        (None, _) => Err(Error::Config(
            "notifications requested but no chat id was provided".into(),
        )),
        (_, None) => Err(Error::Config(
            "notifications requested but no credential was provided".into(),
        )),
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
