//! Application state and command handling for the terminal client.
//!
//! `App` owns the stored keys, the current session and the inbox, and maps
//! each typed command onto a core workflow. Nothing here fails the process:
//! every workflow problem becomes a status line.

use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use telstrasms_core::api::ApiClient;
use telstrasms_core::auth::{CredentialStore, Session};
use telstrasms_core::config::Config;
use telstrasms_core::models::{CredentialEntry, Inbox, KeyPair};
use telstrasms_core::workflow::{self, Failure, KeySelection};
use telstrasms_core::Notice;

use crate::render;

// ============================================================================
// Constants
// ============================================================================

const PROMPT: &str = "> ";

/// Typed at the key prompt to enter a key and hidden secret separately
const NEW_PAIR_KEYWORD: &str = "new";

const HELP_TEXT: &str = "\
Commands:
  keys                 list stored keys
  key [n | key secret] choose a stored key, or enter a new pair
  key new              enter a new pair, secret typed hidden
  send [number]        send a message (prompts for the text)
  poll                 fetch all queued messages
  messages             show received messages
  status               show number and token lifetime
  help                 show this help
  quit                 exit";

// ============================================================================
// Commands
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Keys,
    ChooseKey(Option<String>),
    Send(Option<String>),
    Poll,
    Messages,
    Status,
    Help,
    Quit,
    Empty,
    Unknown(String),
}

impl Command {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, Some(rest.trim()).filter(|r| !r.is_empty())),
            None => (line, None),
        };
        let rest = rest.map(str::to_string);

        match word.to_lowercase().as_str() {
            "" => Command::Empty,
            "keys" | "k" => Command::Keys,
            "key" | "token" => Command::ChooseKey(rest),
            "send" | "s" => Command::Send(rest),
            "poll" | "receive" | "r" => Command::Poll,
            "messages" | "m" => Command::Messages,
            "status" => Command::Status,
            "help" | "?" => Command::Help,
            "quit" | "exit" | "q" => Command::Quit,
            other => Command::Unknown(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Normal,
    Quitting,
}

// ============================================================================
// Main Application Struct
// ============================================================================

pub struct App {
    api: ApiClient,
    store: CredentialStore,
    keys: Vec<CredentialEntry>,
    session: Option<Session>,
    inbox: Inbox,
    pub state: AppState,
    startup_notice: Option<Notice>,
}

impl App {
    /// Create the application, loading stored keys
    pub fn new(config: &Config) -> Result<Self> {
        let api = ApiClient::new(config.api_base_url()).context("Failed to build HTTP client")?;
        debug!(base_url = api.base_url(), "API client configured");

        let store = CredentialStore::new(config.keys_path());
        let loaded = store.load();
        info!(count = loaded.entries.len(), path = %store.path().display(), "Keys loaded");

        let startup_notice = match (&loaded.problem, loaded.skipped) {
            (Some(problem), _) => Some(Notice::from(problem)),
            (None, 0) => None,
            (None, skipped) => Some(
                Notice::warning(format!("Skipped {} key file entries", skipped))
                    .with_detail("Entries need a \"key\" and a \"secret\""),
            ),
        };

        Ok(Self {
            api,
            store,
            keys: loaded.entries,
            session: None,
            inbox: Inbox::new(),
            state: AppState::Normal,
            startup_notice,
        })
    }

    /// Read and run commands until `quit` or end of input
    pub async fn run(&mut self) -> Result<()> {
        if let Some(notice) = self.startup_notice.take() {
            println!("{}", render::notice(&notice));
        }
        println!("{}", render::number_label(None));
        println!("Ready. Type `help` for commands.");

        while self.state != AppState::Quitting {
            let Some(line) = prompt_line(PROMPT)? else {
                break;
            };
            self.handle(Command::parse(&line)).await?;
        }
        Ok(())
    }

    pub async fn handle(&mut self, command: Command) -> Result<()> {
        match command {
            Command::Keys => println!("{}", render::key_choices(&self.keys)),
            Command::ChooseKey(selection) => self.choose_key(selection).await?,
            Command::Send(destination) => self.send(destination).await?,
            Command::Poll => self.poll().await,
            Command::Messages => println!("{}", render::message_table(&self.inbox.rows())),
            Command::Status => self.show_status(),
            Command::Help => println!("{}", HELP_TEXT),
            Command::Quit => self.state = AppState::Quitting,
            Command::Empty => {}
            Command::Unknown(word) => println!("Unknown command `{}`. Type `help`.", word),
        }
        Ok(())
    }

    async fn choose_key(&mut self, selection: Option<String>) -> Result<()> {
        let input = match selection {
            Some(input) => input,
            None => {
                println!("{}", render::key_choices(&self.keys));
                let Some(input) = prompt_line(
                    "Choose key number, or enter a new key pair ([key] [secret]) or `new`: ",
                )?
                else {
                    return Ok(());
                };
                input
            }
        };

        let parsed = if input.trim().eq_ignore_ascii_case(NEW_PAIR_KEYWORD) {
            let key = prompt_line("Key: ")?.unwrap_or_default();
            let secret = rpassword::prompt_password("Secret: ")?;
            KeyPair::new(key.trim(), secret.trim()).map(KeySelection::New)
        } else {
            workflow::parse_selection(&input, &self.keys)
        };
        let selection = match parsed {
            Ok(selection) => selection,
            Err(e) => {
                report(&Notice::from(&e));
                return Ok(());
            }
        };

        println!("Requesting token...");
        match workflow::choose_key(&self.api, &self.store, &mut self.keys, selection).await {
            Ok(outcome) => {
                for notice in &outcome.notices {
                    report(notice);
                }
                let number = outcome.session.phone_number().to_string();
                // Received messages belong to the number they were sent to
                if self.session.as_ref().map(Session::phone_number) != Some(number.as_str()) {
                    self.inbox = Inbox::new();
                }
                self.session = Some(outcome.session);
                println!("{}", render::number_label(Some(&number)));
            }
            Err(failure) => report(&Notice::from(&failure)),
        }
        Ok(())
    }

    async fn send(&mut self, destination: Option<String>) -> Result<()> {
        if self.session.is_none() {
            report(&Notice::from(&Failure::NoSession));
            return Ok(());
        }

        let destination = match destination {
            Some(destination) => destination,
            None => prompt_line("Dest. number: ")?.unwrap_or_default(),
        };
        let text = prompt_line("Message: ")?.unwrap_or_default();

        if !destination.trim().is_empty() && !text.trim().is_empty() {
            println!("Sending message to {}", destination.trim());
        }
        match workflow::send_message(&self.api, self.session.as_ref(), &destination, &text).await {
            Ok(sent) => {
                debug!(ids = ?sent.receipt.message_ids, status = ?sent.receipt.delivery_status, "Message accepted");
                println!("Request to send message successful");
            }
            Err(failure @ Failure::Api(_)) => {
                report(&Notice::from(&failure));
                println!("Request to send message failed");
            }
            Err(failure) => report(&Notice::from(&failure)),
        }
        Ok(())
    }

    async fn poll(&mut self) {
        if self.session.is_none() {
            report(&Notice::from(&Failure::NoSession));
            return;
        }

        println!("Fetching messages...");
        let outcome = workflow::drain_inbox(&self.api, self.session.as_ref()).await;
        let received = outcome.messages.len();
        self.inbox.append(outcome.messages);

        if received > 0 || !self.inbox.is_empty() {
            println!("{}", render::message_table(&self.inbox.rows()));
        }
        match outcome.failure {
            None => println!("Fetched all messages ({} new)", received),
            Some(failure) => {
                warn!(received, "Fetch stopped before the inbox was empty");
                report(&Notice::from(&failure));
            }
        }
    }

    fn show_status(&self) {
        match &self.session {
            Some(session) => {
                println!("{}", render::number_label(Some(session.phone_number())));
                println!(
                    "Token issued {}, about {} minutes left",
                    session.issued_at().format("%H:%M:%S"),
                    session.minutes_until_expiry()
                );
            }
            None => println!("{}", render::number_label(None)),
        }
        println!(
            "{} stored key(s) in {}; {} message(s) received",
            self.keys.len(),
            self.store.path().display(),
            self.inbox.len()
        );
    }
}

fn report(notice: &Notice) {
    println!("{}", render::notice(notice));
}

/// Print a prompt and read one line. Returns None at end of input.
fn prompt_line(prompt: &str) -> Result<Option<String>> {
    print!("{}", prompt);
    io::stdout().flush()?;

    let mut line = String::new();
    let read = io::stdin().lock().read_line(&mut line)?;
    if read == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim_end_matches(['\n', '\r']).to_string()))
}

// ============================================================================
// Tests
// ============================================================================
