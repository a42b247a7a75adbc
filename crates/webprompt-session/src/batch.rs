//! Batch prompt files: one prompt per non-empty line, replayed in order.

use std::path::Path;

use tracing::info;

use webprompt_core::{Error, Result};

pub fn load_batch_prompts(path: &Path) -> Result<Vec<String>> {
    let raw = std::fs::read_to_string(path).map_err(|e| Error::file(path, e))?;
    let prompts: Vec<String> = raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();
    info!("Loaded {} batch prompt(s) from {}", prompts.len(), path.display());
    Ok(prompts)
}
