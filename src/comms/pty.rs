//! Console channel: reads lines from stdin, prints replies to stdout.
//!
//! Free text goes through the dispatcher with the console's active dataset.
//! Slash commands manage that dataset:
//!
//! ```text
//! /load <path>   import a CSV file and make it active
//! /dataset       show the active dataset profile
//! /help
//! /quit
//! ```
//!
//! Runs until `/quit`, EOF on stdin, or the shutdown token is cancelled.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::state::{CommsEvent, CommsState};
use super::{Channel, ChannelFuture};
use crate::agents::AgentRequest;
use crate::error::AppError;

const HELP: &str = "\
Commands:
  /load <path>   load a CSV file as the active dataset
  /dataset       show the active dataset
  /help          show this help
  /quit          exit
Anything else is a request, e.g. \"analyze sales by region\",
\"show me units per month\" or \"write a report\".";

#[derive(Debug, PartialEq, Eq)]
pub enum ConsoleCommand<'a> {
    Load(&'a str),
    Dataset,
    Help,
    Quit,
    Unknown(&'a str),
    Message(&'a str),
}

impl<'a> ConsoleCommand<'a> {
    pub fn parse(line: &'a str) -> Self {
        let line = line.trim();
        let Some(rest) = line.strip_prefix('/') else {
            return ConsoleCommand::Message(line);
        };
        let (cmd, arg) = match rest.split_once(char::is_whitespace) {
            Some((cmd, arg)) => (cmd, arg.trim()),
            None => (rest, ""),
        };
        match cmd {
            "load" => ConsoleCommand::Load(arg),
            "dataset" => ConsoleCommand::Dataset,
            "help" | "?" => ConsoleCommand::Help,
            "quit" | "exit" => ConsoleCommand::Quit,
            other => ConsoleCommand::Unknown(other),
        }
    }
}

/// One console session: the active dataset plus line handling.
pub struct Console {
    channel_id: String,
    state: Arc<CommsState>,
    dataset_id: Option<String>,
}

impl Console {
    pub fn new(channel_id: impl Into<String>, state: Arc<CommsState>) -> Self {
        Self { channel_id: channel_id.into(), state, dataset_id: None }
    }

    pub fn dataset_id(&self) -> Option<&str> {
        self.dataset_id.as_deref()
    }

    /// Handle one input line. `None` means the session should end.
    pub async fn handle_line(&mut self, line: &str) -> Option<String> {
        let reply = match ConsoleCommand::parse(line) {
            ConsoleCommand::Quit => return None,
            ConsoleCommand::Help => HELP.to_string(),
            ConsoleCommand::Unknown(cmd) => format!("unknown command /{cmd}, try /help"),
            ConsoleCommand::Load("") => "usage: /load <path to csv>".to_string(),
            ConsoleCommand::Load(path) => self.load(path).await,
            ConsoleCommand::Dataset => self.describe_dataset(),
            ConsoleCommand::Message("") => String::new(),
            ConsoleCommand::Message(text) => self.message(text).await,
        };
        Some(reply)
    }

    async fn load(&mut self, path: &str) -> String {
        let path = crate::config::expand_home(path);
        let bytes = match tokio::fs::read(&path).await {
            Ok(b) => b,
            Err(e) => return format!("cannot read {}: {e}", path.display()),
        };
        match self.state.import_dataset(&self.channel_id, &bytes) {
            Ok(summary) => {
                self.dataset_id = Some(summary.dataset_id.clone());
                format!(
                    "Loaded {} as dataset {} ({} rows, {} columns).",
                    path.display(),
                    summary.dataset_id,
                    summary.rows,
                    summary.columns.len()
                )
            }
            Err(e) => format!("could not load {}: {e}", path.display()),
        }
    }

    fn describe_dataset(&self) -> String {
        let Some(id) = self.dataset_id.as_deref() else {
            return "No dataset loaded. Use /load <path>.".to_string();
        };
        match self.state.dataset_summary(id) {
            Ok(summary) => format!("Dataset {id}\n{}", summary.render().trim_end()),
            Err(e) => format!("dataset {id}: {e}"),
        }
    }

    async fn message(&self, text: &str) -> String {
        let req = AgentRequest::new(text).with_dataset(self.dataset_id.clone());
        let reply = self.state.send_message(&self.channel_id, req).await;
        let mut out = if reply.ok { reply.message } else { format!("[{}] {}", reply.intent, reply.message) };
        if let Some(artifact) = reply.artifact {
            let location = self.state.agents().store.location(artifact.kind, &artifact.file_name);
            out.push_str(&format!("\n-> {}", location.display()));
        }
        out
    }
}

// ── PtyChannel ───────────────────────────────────────────────────────────────

pub struct PtyChannel {
    channel_id: String,
    state: Arc<CommsState>,
    bot_name: String,
}

impl PtyChannel {
    pub fn new(channel_id: impl Into<String>, state: Arc<CommsState>, bot_name: impl Into<String>) -> Self {
        Self { channel_id: channel_id.into(), state, bot_name: bot_name.into() }
    }
}

impl Channel for PtyChannel {
    fn id(&self) -> &str {
        &self.channel_id
    }

    fn run(self: Box<Self>, shutdown: CancellationToken) -> ChannelFuture {
        Box::pin(run_pty(self.channel_id, self.state, self.bot_name, shutdown))
    }
}

async fn run_pty(
    channel_id: String,
    state: Arc<CommsState>,
    bot_name: String,
    shutdown: CancellationToken,
) -> Result<(), AppError> {
    info!(%channel_id, "pty channel started");
    println!("─────────────────────────────────");
    println!(" {bot_name} console  (/help, Ctrl-C to quit)");
    println!("─────────────────────────────────");

    let mut console = Console::new(channel_id.clone(), state.clone());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("> ");
        use std::io::Write as _;
        let _ = std::io::stdout().flush();

        tokio::select! {
            biased;

            _ = shutdown.cancelled() => {
                println!();
                info!("pty channel shutting down");
                break;
            }

            line = lines.next_line() => {
                match line {
                    Err(e) => {
                        warn!("pty read error: {e}");
                        break;
                    }
                    Ok(None) => {
                        info!("pty stdin closed");
                        break;
                    }
                    Ok(Some(input)) => {
                        debug!(input = %input.trim(), "pty received line");
                        // A long model call still yields to Ctrl-C.
                        let reply = tokio::select! {
                            biased;
                            _ = shutdown.cancelled() => break,
                            reply = console.handle_line(&input) => reply,
                        };
                        match reply {
                            None => {
                                shutdown.cancel();
                                break;
                            }
                            Some(text) if text.is_empty() => {}
                            Some(text) => println!("{text}"),
                        }
                    }
                }
            }
        }
    }

    state.report_event(CommsEvent::ChannelShutdown { channel_id });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::CommunicationAgent;
    use crate::agents::test_support::*;
    use std::io::Write;
    use tokio::sync::mpsc;

    fn console() -> (tempfile::TempDir, Console, mpsc::Receiver<CommsEvent>) {
        let (tmp, agents) = dummy_state();
        let (tx, rx) = mpsc::channel(8);
        let state = Arc::new(CommsState::new(CommunicationAgent::new(agents), tx));
        (tmp, Console::new("pty-test", state), rx)
    }

    #[test]
    fn parses_commands() {
        assert_eq!(ConsoleCommand::parse("/load  data/sales.csv "), ConsoleCommand::Load("data/sales.csv"));
        assert_eq!(ConsoleCommand::parse("/load"), ConsoleCommand::Load(""));
        assert_eq!(ConsoleCommand::parse("/dataset"), ConsoleCommand::Dataset);
        assert_eq!(ConsoleCommand::parse("/exit"), ConsoleCommand::Quit);
        assert_eq!(ConsoleCommand::parse("/frob x"), ConsoleCommand::Unknown("frob"));
        assert_eq!(ConsoleCommand::parse("  analyze this "), ConsoleCommand::Message("analyze this"));
    }

    #[tokio::test]
    async fn quit_ends_session() {
        let (_tmp, mut console, _rx) = console();
        assert!(console.handle_line("/quit").await.is_none());
        assert_eq!(console.handle_line("   ").await.as_deref(), Some(""));
    }

    #[tokio::test]
    async fn load_sets_active_dataset() {
        let (_tmp, mut console, mut rx) = console();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SALES_CSV).unwrap();

        let reply = console.handle_line(&format!("/load {}", file.path().display())).await.unwrap();
        assert!(reply.contains("4 rows, 4 columns"), "{reply}");
        let id = console.dataset_id().unwrap().to_string();
        assert!(matches!(rx.try_recv(), Ok(CommsEvent::DatasetImported { dataset_id, .. }) if dataset_id == id));

        let reply = console.handle_line("/dataset").await.unwrap();
        assert!(reply.contains("- region (text)"));
    }

    #[tokio::test]
    async fn load_missing_file_reports_error() {
        let (_tmp, mut console, _rx) = console();
        let reply = console.handle_line("/load /no/such/file.csv").await.unwrap();
        assert!(reply.starts_with("cannot read"));
        assert!(console.dataset_id().is_none());
    }

    #[tokio::test]
    async fn messages_without_dataset_get_guidance() {
        let (_tmp, mut console, _rx) = console();
        let reply = console.handle_line("analyze revenue").await.unwrap();
        assert!(reply.starts_with("[Analyze Data] Please upload a dataset"));
        let reply = console.handle_line("hello").await.unwrap();
        assert!(reply.starts_with("[Unknown Intent] Sorry"));
    }

    #[tokio::test]
    async fn report_prints_artifact_location() {
        let (tmp, mut console, _rx) = console();
        let reply = console.handle_line("report please").await.unwrap();
        assert!(reply.contains(&tmp.path().join("reports").display().to_string()), "{reply}");
        assert!(reply.trim_end().ends_with(".pdf"));
    }
}
