//! webprompt core: error taxonomy and immutable session configuration.

pub mod config;
pub mod error;

pub use config::{NotifyTarget, SessionConfig, SessionOptions, RESPONSE_TIMEOUT};
pub use error::{Error, Result};
