//! Operator commands, parsed from one input line.
//!
//! Plain text is a prompt. Lines starting with `/` are commands; `quit`,
//! `exit`, `history` and `help` also work without the slash.

use std::path::PathBuf;

use thiserror::Error;

pub const HELP: &str = "\
Type a prompt and press ENTER to send it. Commands:
  /image <path>    send an image (a temporary copy is uploaded)
  /history         list every exchange so far
  /search <term>   list exchanges whose prompt or response contains <term>
  /export <path>   write the history to <path> (.json for JSON, Markdown otherwise)
  /copy            copy the history to the clipboard
  /clear           forget the history and empty the save file
  /help            show this help
  /quit            end the session";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Ask(String),
    Image(PathBuf),
    History,
    Search(String),
    Export(PathBuf),
    Copy,
    Clear,
    Help,
    Quit,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ParseError {
    #[error("/{0} needs an argument")]
    MissingArgument(&'static str),

    #[error("Unknown command: /{0} (try /help)")]
    Unknown(String),
}

impl Command {
    /// `Ok(None)` for a blank line, which is never sent as a prompt.
    pub fn parse(line: &str) -> Result<Option<Self>, ParseError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }

        let Some(rest) = line.strip_prefix('/') else {
            return Ok(Some(match line.to_lowercase().as_str() {
                "quit" | "exit" => Self::Quit,
                "history" => Self::History,
                "help" => Self::Help,
                _ => Self::Ask(line.to_string()),
            }));
        };

        let (name, arg) = match rest.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (rest, ""),
        };

        let command = match name.to_lowercase().as_str() {
            "quit" | "exit" | "q" => Self::Quit,
            "history" => Self::History,
            "help" | "?" => Self::Help,
            "copy" => Self::Copy,
            "clear" => Self::Clear,
            "search" => Self::Search(required(arg, "search")?.to_string()),
            "export" => Self::Export(PathBuf::from(required(arg, "export")?)),
            "image" => Self::Image(PathBuf::from(required(arg, "image")?)),
            other => return Err(ParseError::Unknown(other.to_string())),
        };
        Ok(Some(command))
    }
}

fn required<'a>(arg: &'a str, command: &'static str) -> Result<&'a str, ParseError> {
    if arg.is_empty() {
        Err(ParseError::MissingArgument(command))
    } else {
        Ok(arg)
    }
}
