//! End-to-end session behavior against scripted drivers and channels.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use webprompt_browser::RemoteInterfaceDriver;
use webprompt_core::{Error, Result, SessionConfig, SessionOptions};
use webprompt_notify::NotificationChannel;
use webprompt_session::transcript::parse_export;
use webprompt_session::{
    Command, ExchangeKind, Outcome, SessionOrchestrator, ERROR_PREFIX, IMAGE_PROMPT, NO_RESPONSE,
};

// ---------------------------------------------------------------
// Test doubles
// ---------------------------------------------------------------

enum Step {
    Reply(&'static str),
    Nothing,
    Fail,
    /// Never answers within any reasonable window.
    Hang,
}

struct MockDriver {
    steps: VecDeque<Step>,
    images_seen: Vec<bool>,
}

impl MockDriver {
    fn new(steps: Vec<Step>) -> Self {
        Self {
            steps: steps.into(),
            images_seen: Vec::new(),
        }
    }
}

#[async_trait]
impl RemoteInterfaceDriver for MockDriver {
    async fn submit_prompt(&mut self, _text: &str) -> Result<()> {
        Ok(())
    }

    async fn submit_image(&mut self, path: &Path) -> Result<()> {
        self.images_seen.push(path.exists());
        Ok(())
    }

    async fn await_response(&mut self, _timeout: Duration) -> Result<Option<String>> {
        match self.steps.pop_front().unwrap_or(Step::Fail) {
            Step::Reply(text) => Ok(Some(text.to_string())),
            Step::Nothing => Ok(None),
            Step::Fail => Err(Error::Driver("page crashed".into())),
            Step::Hang => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(Some("too late".into()))
            }
        }
    }
}

#[derive(Default)]
struct RecordingChannel {
    messages: Mutex<Vec<String>>,
    fail: bool,
}

#[async_trait]
impl NotificationChannel for RecordingChannel {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn notify(&self, message: &str) -> Result<()> {
        self.messages.lock().unwrap().push(message.to_string());
        if self.fail {
            return Err(Error::Notification("channel down".into()));
        }
        Ok(())
    }
}

fn config_with(options: SessionOptions) -> SessionConfig {
    SessionConfig::resolve(options).unwrap()
}

// ---------------------------------------------------------------
// History length and ordering
// ---------------------------------------------------------------

#[tokio::test]
async fn test_every_submission_appends_once_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let image = dir.path().join("shot.png");
    std::fs::write(&image, b"png").unwrap();

    let mut driver = MockDriver::new(vec![
        Step::Reply("one"),
        Step::Nothing,
        Step::Fail,
        Step::Reply("four"),
    ]);
    let mut session = SessionOrchestrator::new(&SessionConfig::default(), &mut driver);

    session.ask("first").await;
    session.ask("second").await;
    session.ask_with_image(&image).await;
    session.ask("fourth").await;

    // Auxiliary actions never append.
    session.search_history("o");
    session.export_history(&dir.path().join("out.md")).unwrap();
    session.clipboard_text();

    let history = session.history();
    assert_eq!(history.len(), 4);
    let prompts: Vec<&str> = history.iter().map(|e| e.prompt()).collect();
    assert_eq!(prompts, vec!["first", "second", IMAGE_PROMPT, "fourth"]);
    let outcomes: Vec<Outcome> = history.iter().map(|e| e.outcome()).collect();
    assert_eq!(
        outcomes,
        vec![
            Outcome::Success,
            Outcome::Empty,
            Outcome::Failure,
            Outcome::Success
        ]
    );
    assert_eq!(history.entries()[1].response(), NO_RESPONSE);
    assert!(history.entries()[2].response().starts_with(ERROR_PREFIX));
}

#[tokio::test]
async fn test_hanging_driver_yields_error_exchange() {
    let config = config_with(SessionOptions {
        timeout: Some(Duration::from_millis(100)),
        ..Default::default()
    });
    let mut driver = MockDriver::new(vec![Step::Hang]);
    let mut session = SessionOrchestrator::new(&config, &mut driver);

    let exchange = session.ask("are you there?").await;
    assert_eq!(exchange.outcome(), Outcome::Failure);
    assert!(exchange.response().starts_with("[ERROR] Timed out"));
    assert!(exchange.elapsed() < Duration::from_secs(5));
    assert_eq!(session.history().len(), 1);
}

#[tokio::test]
async fn test_clear_then_ask_leaves_one_exchange() {
    let mut driver = MockDriver::new(vec![Step::Reply("a"), Step::Reply("b"), Step::Reply("c")]);
    let mut session = SessionOrchestrator::new(&SessionConfig::default(), &mut driver);
    session.ask("one").await;
    session.ask("two").await;

    session.clear_history();
    session.ask("three").await;

    let history = session.history();
    assert_eq!(history.len(), 1);
    assert_eq!(history.entries()[0].prompt(), "three");
    assert_eq!(history.entries()[0].response(), "c");
}

// ---------------------------------------------------------------
// Save file, export, search
// ---------------------------------------------------------------

#[tokio::test]
async fn test_ask_appends_one_save_record() {
    let dir = tempfile::tempdir().unwrap();
    let save = dir.path().join("conversation.txt");
    let config = config_with(SessionOptions {
        save_file: Some(save.clone()),
        ..Default::default()
    });
    let mut driver = MockDriver::new(vec![Step::Reply("4")]);
    let mut session = SessionOrchestrator::new(&config, &mut driver);

    let exchange = session.ask("2+2?").await;
    assert_eq!(exchange.prompt(), "2+2?");
    assert_eq!(exchange.response(), "4");
    assert_eq!(
        std::fs::read_to_string(&save).unwrap(),
        "Q: 2+2?\nA: 4\n\n"
    );
}

#[tokio::test]
async fn test_clear_truncates_save_file() {
    let dir = tempfile::tempdir().unwrap();
    let save = dir.path().join("conversation.txt");
    let config = config_with(SessionOptions {
        save_file: Some(save.clone()),
        ..Default::default()
    });
    let mut driver = MockDriver::new(vec![Step::Reply("x"), Step::Reply("y")]);
    let mut session = SessionOrchestrator::new(&config, &mut driver);

    session.ask("before").await;
    session.clear_history();
    assert_eq!(std::fs::read_to_string(&save).unwrap(), "");

    session.ask("after").await;
    assert_eq!(
        std::fs::read_to_string(&save).unwrap(),
        "Q: after\nA: y\n\n"
    );
}

#[tokio::test]
async fn test_unwritable_save_file_does_not_stop_session() {
    let config = config_with(SessionOptions {
        save_file: Some("/nonexistent/dir/conversation.txt".into()),
        ..Default::default()
    });
    let mut driver = MockDriver::new(vec![Step::Reply("still here")]);
    let mut session = SessionOrchestrator::new(&config, &mut driver);

    let exchange = session.ask("hello").await;
    assert_eq!(exchange.response(), "still here");
    assert_eq!(session.history().len(), 1);
}

#[tokio::test]
async fn test_export_round_trip_and_idempotence() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("history.md");
    let mut driver = MockDriver::new(vec![
        Step::Reply("Sure:\n\n- eggs\n- milk"),
        Step::Fail,
        Step::Reply("Ada"),
    ]);
    let mut session = SessionOrchestrator::new(&SessionConfig::default(), &mut driver);
    session.ask("shopping list?").await;
    session.ask("broken?").await;
    session.ask("name?").await;

    session.export_history(&path).unwrap();
    let first = std::fs::read_to_string(&path).unwrap();
    session.export_history(&path).unwrap();
    let second = std::fs::read_to_string(&path).unwrap();
    assert_eq!(first, second);
    assert!(first.starts_with("# Conversation history\n"));

    let pairs = parse_export(&first);
    let expected: Vec<(String, String)> = session
        .history()
        .iter()
        .map(|e| (e.prompt().to_string(), e.response().to_string()))
        .collect();
    assert_eq!(pairs, expected);
    assert_eq!(pairs[0].1, "Sure:\n\n- eggs\n- milk");
    assert_eq!(session.history().len(), 3);
}

#[tokio::test]
async fn test_search_returns_matching_exchange_only() {
    let mut driver = MockDriver::new(vec![Step::Reply("4"), Step::Reply("Ada")]);
    let mut session = SessionOrchestrator::new(&SessionConfig::default(), &mut driver);
    session.ask("2+2?").await;
    session.ask("name?").await;

    let hits = session.search_history("4");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].prompt(), "2+2?");
    assert_eq!(hits[0].response(), "4");
    assert_eq!(session.search_history("4"), hits);
    assert_eq!(session.history().len(), 2);
}

// ---------------------------------------------------------------
// Images
// ---------------------------------------------------------------

#[tokio::test]
async fn test_image_is_deleted_after_success() {
    let dir = tempfile::tempdir().unwrap();
    let image = dir.path().join("img.png");
    std::fs::write(&image, b"png").unwrap();

    let mut driver = MockDriver::new(vec![Step::Reply("a cat")]);
    let mut session = SessionOrchestrator::new(&SessionConfig::default(), &mut driver);
    let exchange = session.ask_with_image(&image).await;
    drop(session);

    assert_eq!(exchange.prompt(), IMAGE_PROMPT);
    assert_eq!(exchange.kind(), ExchangeKind::Image);
    assert_eq!(exchange.response(), "a cat");
    assert_eq!(driver.images_seen, vec![true]);
    assert!(!image.exists());
}

#[tokio::test]
async fn test_image_is_deleted_after_timeout() {
    let dir = tempfile::tempdir().unwrap();
    let image = dir.path().join("img.png");
    std::fs::write(&image, b"png").unwrap();
    let config = config_with(SessionOptions {
        timeout: Some(Duration::from_millis(50)),
        ..Default::default()
    });

    let mut driver = MockDriver::new(vec![Step::Hang]);
    let mut session = SessionOrchestrator::new(&config, &mut driver);
    let exchange = session.ask_with_image(&image).await;

    assert_eq!(exchange.outcome(), Outcome::Failure);
    assert!(!image.exists());
}

// ---------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------

#[tokio::test]
async fn test_response_is_forwarded_to_channel() {
    let channel = Arc::new(RecordingChannel::default());
    let mut driver = MockDriver::new(vec![Step::Reply("4"), Step::Fail]);
    let mut session = SessionOrchestrator::new(&SessionConfig::default(), &mut driver)
        .with_notifier(channel.clone());

    session.ask("2+2?").await;
    session.ask("again?").await;
    session.flush_notifications(Duration::from_secs(1)).await;

    let messages = channel.messages.lock().unwrap().clone();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0], "4");
    assert!(messages[1].starts_with(ERROR_PREFIX));
}

#[tokio::test]
async fn test_failing_channel_does_not_affect_history() {
    let channel = Arc::new(RecordingChannel {
        fail: true,
        ..Default::default()
    });
    let mut driver = MockDriver::new(vec![Step::Reply("ok")]);
    let mut session = SessionOrchestrator::new(&SessionConfig::default(), &mut driver)
        .with_notifier(channel.clone());

    let exchange = session.ask("ping").await;
    session.flush_notifications(Duration::from_secs(1)).await;

    assert_eq!(exchange.outcome(), Outcome::Success);
    assert_eq!(session.history().len(), 1);
    assert_eq!(channel.messages.lock().unwrap().len(), 1);
}

// ---------------------------------------------------------------
// Command dispatch contract
// ---------------------------------------------------------------

#[tokio::test]
async fn test_only_submitting_commands_grow_history() {
    let lines = ["2+2?", "/search 4", "/history", "", "name?", "/copy", "quit"];
    let mut driver = MockDriver::new(vec![Step::Reply("4"), Step::Reply("Ada")]);
    let mut session = SessionOrchestrator::new(&SessionConfig::default(), &mut driver);

    let mut submissions = 0;
    for line in lines {
        match Command::parse(line).unwrap() {
            Some(Command::Ask(prompt)) => {
                session.ask(&prompt).await;
                submissions += 1;
            }
            Some(Command::Search(term)) => {
                assert_eq!(session.search_history(&term).len(), 1);
            }
            Some(Command::Quit) => break,
            Some(_) | None => {}
        }
    }
    assert_eq!(submissions, 2);
    assert_eq!(session.history().len(), 2);
}
