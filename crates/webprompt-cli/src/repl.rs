//! Operator loop: login gate, batch replay, then one command per line.

use std::io::{BufRead, Write};
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};

use tokio::sync::mpsc;
use tracing::{info, warn};

use webprompt_browser::RemoteInterfaceDriver;
use webprompt_core::{Error, Result, SessionConfig};
use webprompt_session::command::HELP;
use webprompt_session::{load_batch_prompts, Command, Exchange, SessionOrchestrator};

use crate::clipboard::TextClipboard;

/// Lines typed by the operator.
///
/// Stdin is read on a dedicated thread; a blocking read cannot be
/// cancelled, and the runtime must still be able to exit on Ctrl-C.
pub struct OperatorInput {
    rx: mpsc::Receiver<String>,
}

impl OperatorInput {
    pub fn spawn_stdin() -> Self {
        let (tx, rx) = mpsc::channel(16);
        std::thread::spawn(move || {
            for line in std::io::stdin().lock().lines() {
                match line {
                    Ok(line) => {
                        if tx.blocking_send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("Stopped reading input: {}", e);
                        break;
                    }
                }
            }
        });
        Self { rx }
    }

    #[cfg(test)]
    fn scripted(lines: &[&str]) -> Self {
        let (tx, rx) = mpsc::channel(lines.len().max(1));
        for line in lines {
            let _ = tx.try_send(line.to_string());
        }
        Self { rx }
    }

    /// `None` once input is exhausted.
    pub async fn next_line(&mut self) -> Option<String> {
        self.rx.recv().await
    }
}

pub async fn run<D>(
    session: &mut SessionOrchestrator<'_, D>,
    config: &SessionConfig,
    input: &mut OperatorInput,
    clipboard: &mut dyn TextClipboard,
    wait_for_login: bool,
) where
    D: RemoteInterfaceDriver + ?Sized,
{
    if wait_for_login {
        println!("Log in to the chat page in the browser window, then press ENTER.");
        if input.next_line().await.is_none() {
            return;
        }
    }

    if let Some(path) = config.batch_prompts() {
        replay_batch(session, path).await;
    }

    println!("Ready. Type a prompt, or /help for commands.");
    loop {
        show_prompt();
        let Some(line) = input.next_line().await else {
            info!("End of input");
            break;
        };
        match Command::parse(&line) {
            Ok(None) => {}
            Ok(Some(command)) => {
                if dispatch(session, clipboard, command).await.is_break() {
                    break;
                }
            }
            Err(e) => println!("{}", e),
        }
    }
}

async fn replay_batch<D>(session: &mut SessionOrchestrator<'_, D>, path: &Path)
where
    D: RemoteInterfaceDriver + ?Sized,
{
    let prompts = match load_batch_prompts(path) {
        Ok(prompts) => prompts,
        Err(e) => {
            warn!("Skipping batch prompts: {}", e);
            return;
        }
    };
    let total = prompts.len();
    for (i, prompt) in prompts.iter().enumerate() {
        println!("[batch {}/{}] {}", i + 1, total, prompt);
        let exchange = session.ask(prompt).await;
        print_answer(&exchange);
    }
}

async fn dispatch<D>(
    session: &mut SessionOrchestrator<'_, D>,
    clipboard: &mut dyn TextClipboard,
    command: Command,
) -> ControlFlow<()>
where
    D: RemoteInterfaceDriver + ?Sized,
{
    match command {
        Command::Ask(prompt) => {
            let exchange = session.ask(&prompt).await;
            print_answer(&exchange);
        }
        Command::Image(path) => match stage_image(&path) {
            Ok(staged) => {
                let exchange = session.ask_with_image(&staged).await;
                print_answer(&exchange);
            }
            Err(e) => warn!("Image not sent: {}", e),
        },
        Command::History => {
            if session.history().is_empty() {
                println!("No exchanges yet.");
            }
            for (i, exchange) in session.history().iter().enumerate() {
                println!("{}", format_entry(i + 1, exchange));
            }
        }
        Command::Search(term) => {
            let hits = session.search_history(&term);
            if hits.is_empty() {
                println!("No exchanges match \"{}\".", term);
            }
            for (i, exchange) in hits.iter().enumerate() {
                println!("{}", format_entry(i + 1, exchange));
            }
        }
        Command::Export(path) => match session.export_history(&path) {
            Ok(()) => println!(
                "Exported {} exchange(s) to {}",
                session.history().len(),
                path.display()
            ),
            Err(e) => warn!("Export failed: {}", e),
        },
        Command::Copy => match clipboard.set_text(&session.clipboard_text()) {
            Ok(()) => println!("Copied {} exchange(s) to the clipboard.", session.history().len()),
            Err(e) => warn!("Copy failed: {}", e),
        },
        Command::Clear => {
            session.clear_history();
            println!("History cleared.");
        }
        Command::Help => println!("{}", HELP),
        Command::Quit => return ControlFlow::Break(()),
    }
    ControlFlow::Continue(())
}

/// Copy the operator's image to a temporary file that the session may
/// delete. The extension is kept so the page accepts the upload.
fn stage_image(source: &Path) -> Result<PathBuf> {
    if !source.is_file() {
        return Err(Error::file(source, "not a readable file"));
    }
    let suffix = source
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default();
    let staged = tempfile::Builder::new()
        .prefix("webprompt-upload-")
        .suffix(&suffix)
        .tempfile()
        .map_err(|e| Error::file(source, e))?;
    std::fs::copy(source, staged.path()).map_err(|e| Error::file(source, e))?;
    staged
        .into_temp_path()
        .keep()
        .map_err(|e| Error::file(source, e.error))
}

fn format_entry(index: usize, exchange: &Exchange) -> String {
    format!(
        "{}. Q: {}\n   A: {}",
        index,
        exchange.prompt(),
        exchange.response().replace('\n', "\n      ")
    )
}

fn print_answer(exchange: &Exchange) {
    println!("{}", exchange.response());
    println!("({:.1}s)", exchange.elapsed().as_secs_f64());
}

fn show_prompt() {
    print!("> ");
    let _ = std::io::stdout().flush();
}
