//! Transcript files: the append-only save file and history exports.

use std::borrow::Cow;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use webprompt_core::{Error, Result};

use crate::history::Exchange;

/// First line of a Markdown export.
pub const EXPORT_TITLE: &str = "# Conversation history";
const EXPORT_HEADING: &str = "## Q: ";

/// One save-file / clipboard record.
pub fn format_record(prompt: &str, response: &str) -> String {
    format!("Q: {}\nA: {}\n\n", prompt, response)
}

/// Append-only save file. Opened and closed on every write so no handle
/// is held between exchanges.
#[derive(Debug, Clone)]
pub struct TranscriptFile {
    path: PathBuf,
}

impl TranscriptFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn append(&self, exchange: &Exchange) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| Error::file(&self.path, e))?;
        file.write_all(format_record(exchange.prompt(), exchange.response()).as_bytes())
            .map_err(|e| Error::file(&self.path, e))?;
        Ok(())
    }

    /// Empty the file, creating it if needed.
    pub fn truncate(&self) -> Result<()> {
        OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.path)
            .map_err(|e| Error::file(&self.path, e))?;
        debug!("Truncated save file {}", self.path.display());
        Ok(())
    }
}

/// Export document format, picked from the target extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Markdown,
    Json,
}

impl ExportFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Markdown,
        }
    }
}

/// Prompts are flattened onto the heading line. Response lines that would
/// read as a heading get one extra leading backslash.
pub fn render_markdown(exchanges: &[Exchange]) -> String {
    let mut doc = format!("{}\n\n", EXPORT_TITLE);
    for exchange in exchanges {
        doc.push_str(EXPORT_HEADING);
        doc.push_str(&heading_text(exchange.prompt()));
        doc.push('\n');
        for (i, line) in exchange.response().split('\n').enumerate() {
            if i > 0 {
                doc.push('\n');
            }
            doc.push_str(&escape_body_line(line));
        }
        doc.push_str("\n\n");
    }
    doc
}

fn heading_text(prompt: &str) -> Cow<'_, str> {
    if prompt.contains(['\n', '\r']) {
        Cow::Owned(prompt.replace("\r\n", " ").replace(['\n', '\r'], " "))
    } else {
        Cow::Borrowed(prompt)
    }
}

/// Zero or more backslashes followed by the entry heading.
fn looks_like_heading(line: &str) -> bool {
    line.trim_start_matches('\\').starts_with(EXPORT_HEADING)
}

fn escape_body_line(line: &str) -> Cow<'_, str> {
    if looks_like_heading(line) {
        Cow::Owned(format!("\\{}", line))
    } else {
        Cow::Borrowed(line)
    }
}

fn unescape_body_line(line: &str) -> &str {
    match line.strip_prefix('\\') {
        Some(rest) if looks_like_heading(line) => rest,
        _ => line,
    }
}

pub fn render_json(exchanges: &[Exchange]) -> Result<String> {
    Ok(serde_json::to_string_pretty(exchanges)?)
}

/// Write `exchanges` to `path`, replacing any existing file only once the
/// new content is fully on disk.
pub fn export(path: &Path, exchanges: &[Exchange]) -> Result<()> {
    let body = match ExportFormat::from_path(path) {
        ExportFormat::Markdown => render_markdown(exchanges),
        ExportFormat::Json => render_json(exchanges)?,
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut staged = tempfile::NamedTempFile::new_in(dir).map_err(|e| Error::file(path, e))?;
    staged
        .write_all(body.as_bytes())
        .and_then(|_| staged.as_file().sync_all())
        .map_err(|e| Error::file(path, e))?;
    staged
        .persist(path)
        .map_err(|e| Error::file(path, e.error))?;

    info!("Exported {} exchange(s) to {}", exchanges.len(), path.display());
    Ok(())
}

/// Read back the prompt/response pairs of a Markdown export.
///
/// Responses come back exactly; prompts that held line breaks come back
/// with each break replaced by a space.
pub fn parse_export(doc: &str) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    let mut current: Option<(String, Vec<&str>)> = None;

    for line in doc.lines() {
        if let Some(prompt) = line.strip_prefix(EXPORT_HEADING) {
            if let Some((prompt, body)) = current.take() {
                pairs.push((prompt, join_body(&body)));
            }
            current = Some((prompt.to_string(), Vec::new()));
        } else if let Some((_, body)) = current.as_mut() {
            body.push(unescape_body_line(line));
        }
    }
    if let Some((prompt, body)) = current {
        pairs.push((prompt, join_body(&body)));
    }
    pairs
}

fn join_body(lines: &[&str]) -> String {
    lines.join("\n").trim_end_matches('\n').to_string()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::history::{ExchangeKind, Outcome};

    fn exchange(prompt: &str, response: &str) -> Exchange {
        Exchange::new(
            prompt.into(),
            response.into(),
            ExchangeKind::Text,
            Outcome::Success,
            Duration::from_millis(10),
        )
    }

    #[test]
    fn test_append_and_truncate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chat.txt");
        let file = TranscriptFile::new(&path);

        file.append(&exchange("2+2?", "4")).unwrap();
        file.append(&exchange("name?", "Ada\nLovelace")).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "Q: 2+2?\nA: 4\n\nQ: name?\nA: Ada\nLovelace\n\n");

        file.truncate().unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
    }

    #[test]
    fn test_append_to_missing_dir_is_file_error() {
        let file = TranscriptFile::new("/nonexistent/dir/chat.txt");
        let err = file.append(&exchange("q", "a")).unwrap_err();
        assert!(matches!(err, Error::File(_)));
    }

    #[test]
    fn test_render_markdown() {
        let doc = render_markdown(&[exchange("2+2?", "4"), exchange("name?", "Ada")]);
        assert_eq!(
            doc,
            "# Conversation history\n\n## Q: 2+2?\n4\n\n## Q: name?\nAda\n\n"
        );
        assert_eq!(render_markdown(&[]), "# Conversation history\n\n");
    }

    #[test]
    fn test_parse_export_multiline() {
        let exchanges = vec![
            exchange("list three", "1. a\n\n2. b\n3. c"),
            exchange("[image]", "[no response]"),
        ];
        let pairs = parse_export(&render_markdown(&exchanges));
        assert_eq!(
            pairs,
            vec![
                ("list three".to_string(), "1. a\n\n2. b\n3. c".to_string()),
                ("[image]".to_string(), "[no response]".to_string()),
            ]
        );
    }

    #[test]
    fn test_heading_lookalike_in_response_round_trips() {
        let exchanges = vec![
            exchange("show markdown", "Like this:\n## Q: not a prompt\n\\## Q: escaped"),
            exchange("next", "ok"),
        ];
        let doc = render_markdown(&exchanges);
        assert!(doc.contains("\n\\## Q: not a prompt\n\\\\## Q: escaped\n"));

        let pairs = parse_export(&doc);
        assert_eq!(
            pairs,
            vec![
                (
                    "show markdown".to_string(),
                    "Like this:\n## Q: not a prompt\n\\## Q: escaped".to_string()
                ),
                ("next".to_string(), "ok".to_string()),
            ]
        );
    }

    #[test]
    fn test_multiline_prompt_is_flattened_in_heading() {
        let exchanges = vec![exchange("first line\nsecond line\r\nthird", "answer")];
        let doc = render_markdown(&exchanges);
        assert!(doc.contains("## Q: first line second line third\nanswer\n"));

        let pairs = parse_export(&doc);
        assert_eq!(
            pairs,
            vec![(
                "first line second line third".to_string(),
                "answer".to_string()
            )]
        );
    }

    #[test]
    fn test_export_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.md");
        std::fs::write(&path, "old content").unwrap();

        export(&path, &[exchange("q", "a")]).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with(EXPORT_TITLE));
        assert!(!content.contains("old content"));

        // No staging files left behind.
        let entries = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[test]
    fn test_export_into_missing_dir_is_file_error() {
        let err = export(Path::new("/nonexistent/dir/history.md"), &[]).unwrap_err();
        assert!(matches!(err, Error::File(_)));
    }

    #[test]
    fn test_export_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.JSON");
        export(&path, &[exchange("2+2?", "4")]).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        let back: Vec<Exchange> = serde_json::from_str(&raw).unwrap();
        assert_eq!(back.len(), 1);
        assert_eq!(back[0].prompt(), "2+2?");
        assert_eq!(back[0].response(), "4");
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(ExportFormat::from_path(Path::new("a.json")), ExportFormat::Json);
        assert_eq!(ExportFormat::from_path(Path::new("a.md")), ExportFormat::Markdown);
        assert_eq!(ExportFormat::from_path(Path::new("history")), ExportFormat::Markdown);
    }
}
