//! Session layer: a single operator conversation, one exchange at a time.
//!
//! [`SessionOrchestrator`] submits prompts through a borrowed
//! [`RemoteInterfaceDriver`](webprompt_browser::RemoteInterfaceDriver),
//! records every attempt in a [`HistoryStore`], and fans out the save-file
//! and notification side effects.

pub mod batch;
pub mod command;
pub mod history;
pub mod orchestrator;
pub mod transcript;
pub mod wait;

pub use batch::load_batch_prompts;
pub use command::{Command, ParseError};
pub use history::{Exchange, ExchangeKind, HistoryStore, Outcome};
pub use orchestrator::SessionOrchestrator;
pub use transcript::{ExportFormat, TranscriptFile};
pub use wait::{ERROR_PREFIX, IMAGE_PROMPT, NO_RESPONSE};
