use webprompt_core::{Error, Result};

/// Destination of `/copy`.
pub trait TextClipboard {
    fn set_text(&mut self, text: &str) -> Result<()>;
}

/// System clipboard handle backed by `arboard`.
pub struct Clipboard {
    inner: arboard::Clipboard,
}

impl Clipboard {
    pub fn new() -> Result<Self> {
        let inner = arboard::Clipboard::new().map_err(|e| Error::Clipboard(e.to_string()))?;
        Ok(Self { inner })
    }
}

impl TextClipboard for Clipboard {
    fn set_text(&mut self, text: &str) -> Result<()> {
        self.inner
            .set_text(text.to_owned())
            .map_err(|e| Error::Clipboard(e.to_string()))
    }
}

/// Opens the system clipboard on first use and keeps the handle until the
/// session ends. On X11 and Wayland the copied text is served by this
/// process, so it stops being pasteable once the last handle is dropped.
#[derive(Default)]
pub struct SessionClipboard {
    handle: Option<Clipboard>,
}

impl SessionClipboard {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TextClipboard for SessionClipboard {
    fn set_text(&mut self, text: &str) -> Result<()> {
        let handle = match self.handle.take() {
            Some(handle) => handle,
            None => Clipboard::new()?,
        };
        self.handle.insert(handle).set_text(text)
    }
}
