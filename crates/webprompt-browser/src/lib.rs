//! Browser driver: Chrome lifecycle, CDP transport, chat page automation.
//!
//! The session layer only sees [`RemoteInterfaceDriver`]; everything that
//! knows about selectors, DevTools, or the Chrome process lives here.

pub mod cdp;
pub mod chrome;
pub mod config;
pub mod driver;
pub mod page;
mod script;

pub use cdp::CdpConnection;
pub use chrome::ChromeProcess;
pub use config::{BrowserConfig, PageSelectors};
pub use driver::RemoteInterfaceDriver;
pub use page::ChatPageDriver;
