//! Key selection, sending and inbox draining.
//!
//! These are the operations the front end invokes. State is passed in
//! explicitly: the key file entries, the current session (if any), and the
//! API to call. Each operation returns its result rather than touching any
//! global state, and every failure is a [`Failure`] the caller turns into a
//! [`Notice`].

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::api::{ApiError, InboundMessage, Poll, SendReceipt, SmsApi};
use crate::auth::{CredentialStore, Session};
use crate::models::{CredentialEntry, KeyPair, Message, ValidationError};
use crate::notice::Notice;
use crate::utils::parse_timestamp;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Failure {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Request bearer first")]
    NoSession,
}

impl From<&Failure> for Notice {
    fn from(failure: &Failure) -> Self {
        match failure {
            Failure::Validation(e) => Notice::from(e),
            Failure::Api(e) => Notice::from(e),
            Failure::NoSession => Notice::warning("Request bearer first"),
        }
    }
}

/// Which key pair to authenticate with
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySelection {
    /// Zero-based position in the key file
    Existing(usize),
    /// A pair typed in by the user
    New(KeyPair),
}

/// Interpret what the user typed when choosing a key.
///
/// Exactly two words are a new `[key] [secret]` pair. Anything else is read as
/// a 1-based entry number, optionally followed by the rest of its choice label
/// (`"2. +61412345678 <key>"`).
pub fn parse_selection(
    input: &str,
    entries: &[CredentialEntry],
) -> Result<KeySelection, ValidationError> {
    let parts: Vec<&str> = input.split_whitespace().collect();
    match parts.as_slice() {
        [] => Err(ValidationError::EmptySelection),
        [key, secret] => Ok(KeySelection::New(KeyPair::new(key, secret)?)),
        [first, ..] => {
            let position: usize = first
                .trim_end_matches('.')
                .parse()
                .map_err(|_| ValidationError::MalformedSelection(input.trim().to_string()))?;
            if position == 0 || position > entries.len() {
                return Err(ValidationError::UnknownEntry(position));
            }
            Ok(KeySelection::Existing(position - 1))
        }
    }
}

/// Result of a successful key selection
#[derive(Debug)]
pub struct KeyOutcome {
    pub session: Session,
    /// Things worth telling the user, in order; may include a save failure
    pub notices: Vec<Notice>,
}

/// Authenticate with the selected pair and resolve its number.
///
/// The pair is validated before any request. The assigned number is queried
/// first and a new one requested only if none exists. On success the number
/// is recorded against the entry (appending one for a new pair) and the key
/// file is saved. On failure `entries` is left untouched.
pub async fn choose_key<A: SmsApi + ?Sized>(
    api: &A,
    store: &CredentialStore,
    entries: &mut Vec<CredentialEntry>,
    selection: KeySelection,
) -> Result<KeyOutcome, Failure> {
    let (pair, existing) = match selection {
        KeySelection::Existing(index) => {
            let entry = entries
                .get(index)
                .ok_or(ValidationError::UnknownEntry(index + 1))?;
            (entry.key_pair()?, Some(index))
        }
        KeySelection::New(pair) => {
            let matched = entries.iter().position(|e| e.matches(&pair));
            (pair, matched)
        }
    };

    let mut notices = Vec::new();

    let bearer = api.get_bearer(pair.key(), pair.secret()).await?;
    debug!("Bearer obtained");
    notices.push(Notice::info("Success! Token valid for one hour"));

    let number = match api.get_number(&bearer.token).await? {
        Some(number) => number,
        None => {
            notices.push(
                Notice::info("No number")
                    .with_detail("This bearer has no number associated. Will request a new one."),
            );
            api.new_number(&bearer.token).await?
        }
    };
    info!(%number, "Number resolved");

    let index = match existing {
        Some(index) => index,
        None => {
            entries.push(CredentialEntry::new(pair));
            entries.len() - 1
        }
    };
    entries[index].number = Some(number.clone());

    if let Err(e) = store.save(entries) {
        warn!(error = %e, "Failed to save key file");
        notices.push(Notice::from(&e));
    }

    Ok(KeyOutcome {
        session: Session::new(bearer, number, index),
        notices,
    })
}

/// A message accepted by the provider
#[derive(Debug, Clone)]
pub struct SentMessage {
    pub message: Message,
    pub receipt: SendReceipt,
}

/// Send `text` to `destination` from the session's number.
///
/// Blank input is rejected without contacting the provider.
pub async fn send_message<A: SmsApi + ?Sized>(
    api: &A,
    session: Option<&Session>,
    destination: &str,
    text: &str,
) -> Result<SentMessage, Failure> {
    let session = session.ok_or(Failure::NoSession)?;

    let destination = destination.trim();
    if destination.is_empty() {
        return Err(ValidationError::BlankDestination.into());
    }
    if text.trim().is_empty() {
        return Err(ValidationError::BlankText.into());
    }
    if destination == session.phone_number() {
        return Err(ValidationError::OwnNumber.into());
    }

    debug!(%destination, "Sending message");
    let receipt = api.send_message(session.token(), destination, text).await?;
    let message = Message::outgoing(session.phone_number(), destination, text)?
        .with_id(receipt.message_ids.first().cloned());

    Ok(SentMessage { message, receipt })
}

/// What a drain collected before it stopped
#[derive(Debug, Default)]
pub struct PollOutcome {
    /// Received messages in arrival order
    pub messages: Vec<Message>,
    /// Why the drain stopped early, if it did
    pub failure: Option<Failure>,
}

impl PollOutcome {
    pub fn is_complete(&self) -> bool {
        self.failure.is_none()
    }
}

/// Poll until the provider reports no queued messages.
///
/// No backoff and no dedup. Stops at the first failure, keeping whatever
/// was received before it.
pub async fn drain_inbox<A: SmsApi + ?Sized>(api: &A, session: Option<&Session>) -> PollOutcome {
    let Some(session) = session else {
        return PollOutcome {
            messages: Vec::new(),
            failure: Some(Failure::NoSession),
        };
    };

    let mut messages = Vec::new();
    loop {
        match api.poll_message(session.token()).await {
            Ok(Poll::Empty) => break,
            Ok(Poll::Received(inbound)) => {
                if let Some(message) = to_message(session, inbound) {
                    messages.push(message);
                }
            }
            Err(e) => {
                warn!(error = %e, received = messages.len(), "Polling stopped early");
                return PollOutcome {
                    messages,
                    failure: Some(e.into()),
                };
            }
        }
    }

    debug!(received = messages.len(), "Inbox drained");
    PollOutcome {
        messages,
        failure: None,
    }
}

fn to_message(session: &Session, inbound: InboundMessage) -> Option<Message> {
    if let Some(dest) = inbound.destination_address.as_deref() {
        if dest != session.phone_number() {
            debug!(%dest, own = session.phone_number(), "Inbound message addressed to another number");
        }
    }
    let timestamp = inbound.sent_timestamp.as_deref().and_then(|raw| {
        let parsed = parse_timestamp(raw);
        if parsed.is_none() {
            debug!(%raw, "Unparseable sentTimestamp");
        }
        parsed
    });

    let id = inbound.message_id.clone();
    match Message::incoming(
        session.phone_number(),
        inbound.sender_address,
        inbound.message,
        inbound.message_id,
        timestamp,
    ) {
        Ok(message) => Some(message),
        Err(e) => {
            warn!(error = %e, ?id, "Dropping inbound message sent from the session's own number");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{Bearer, Operation};
    use crate::models::Direction;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tempfile::TempDir;

    const KEY: &str = "abcdefghijklmnopqrstuvwxyz012345";
    const SECRET: &str = "ABCDEFGHIJKLMNOP";
    const OWN: &str = "+61400000001";

    /// Scripted provider that records which operations were called
    struct FakeApi {
        bearer: Result<Bearer, ApiError>,
        assigned: Result<Option<String>, ApiError>,
        provisioned: Result<String, ApiError>,
        send: Result<SendReceipt, ApiError>,
        polls: Mutex<VecDeque<Result<Poll, ApiError>>>,
        calls: Mutex<Vec<Operation>>,
    }

    impl FakeApi {
        fn new() -> Self {
            Self {
                bearer: Ok(Bearer {
                    token: "tok".to_string(),
                    lifetime: chrono::Duration::seconds(3600),
                }),
                assigned: Ok(Some(OWN.to_string())),
                provisioned: Ok("+61499999999".to_string()),
                send: Ok(SendReceipt {
                    message_ids: vec!["sent-1".to_string()],
                    delivery_status: Some("MessageWaiting".to_string()),
                }),
                polls: Mutex::new(VecDeque::new()),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn with_polls(self, polls: Vec<Result<Poll, ApiError>>) -> Self {
            *self.polls.lock().unwrap() = polls.into();
            self
        }

        fn record(&self, op: Operation) {
            self.calls.lock().unwrap().push(op);
        }

        fn calls(&self) -> Vec<Operation> {
            self.calls.lock().unwrap().clone()
        }

        fn count(&self, op: Operation) -> usize {
            self.calls().iter().filter(|c| **c == op).count()
        }
    }

    #[async_trait]
    impl SmsApi for FakeApi {
        async fn get_bearer(&self, _key: &str, _secret: &str) -> Result<Bearer, ApiError> {
            self.record(Operation::GetBearer);
            self.bearer.clone()
        }

        async fn get_number(&self, _bearer: &str) -> Result<Option<String>, ApiError> {
            self.record(Operation::GetNumber);
            self.assigned.clone()
        }

        async fn new_number(&self, _bearer: &str) -> Result<String, ApiError> {
            self.record(Operation::NewNumber);
            self.provisioned.clone()
        }

        async fn send_message(
            &self,
            _bearer: &str,
            _destination: &str,
            _text: &str,
        ) -> Result<SendReceipt, ApiError> {
            self.record(Operation::SendMessage);
            self.send.clone()
        }

        async fn poll_message(&self, _bearer: &str) -> Result<Poll, ApiError> {
            self.record(Operation::PollMessage);
            self.polls
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(Poll::Empty))
        }
    }

    fn timeout(operation: Operation) -> ApiError {
        ApiError::Timeout { operation }
    }

    fn pair() -> KeyPair {
        KeyPair::new(KEY, SECRET).unwrap()
    }

    fn stored(number: Option<&str>) -> CredentialEntry {
        let mut entry = CredentialEntry::new(pair());
        entry.number = number.map(str::to_string);
        entry
    }

    fn temp_store() -> (TempDir, CredentialStore) {
        let dir = TempDir::new().unwrap();
        let store = CredentialStore::new(dir.path().join("keys.json"));
        (dir, store)
    }

    fn session() -> Session {
        Session::new(
            Bearer {
                token: "tok".to_string(),
                lifetime: chrono::Duration::seconds(3600),
            },
            OWN,
            0,
        )
    }

    fn inbound(sender: &str, text: &str, id: &str) -> Result<Poll, ApiError> {
        Ok(Poll::Received(InboundMessage {
            sender_address: sender.to_string(),
            destination_address: Some(OWN.to_string()),
            message: text.to_string(),
            message_id: Some(id.to_string()),
            sent_timestamp: Some("2019-02-04T11:51:52+10:00".to_string()),
        }))
    }

    // -------------------------------------------------------------------------
    // Selection parsing
    // -------------------------------------------------------------------------

    #[test]
    fn test_parse_selection_new_pair() {
        let selection = parse_selection(&format!("  {} {} ", KEY, SECRET), &[]).unwrap();
        assert_eq!(selection, KeySelection::New(pair()));
    }

    #[test]
    fn test_parse_selection_rejects_bad_lengths() {
        assert_eq!(
            parse_selection(&format!("{}x {}", KEY, SECRET), &[]),
            Err(ValidationError::KeyLength(33))
        );
        assert_eq!(
            parse_selection(&format!("{} short", KEY), &[]),
            Err(ValidationError::SecretLength(5))
        );
    }

    #[test]
    fn test_parse_selection_existing() {
        let entries = vec![stored(None), stored(Some(OWN))];
        assert_eq!(parse_selection("2", &entries), Ok(KeySelection::Existing(1)));

        let label = entries[0].choice_label(1);
        assert_eq!(parse_selection(&label, &entries), Ok(KeySelection::Existing(0)));

        assert_eq!(
            parse_selection("3", &entries),
            Err(ValidationError::UnknownEntry(3))
        );
        assert_eq!(
            parse_selection("0", &entries),
            Err(ValidationError::UnknownEntry(0))
        );
        assert!(matches!(
            parse_selection("abc", &entries),
            Err(ValidationError::MalformedSelection(_))
        ));
        assert_eq!(parse_selection("   ", &entries), Err(ValidationError::EmptySelection));
    }

    // -------------------------------------------------------------------------
    // Key selection
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_choose_key_new_pair_appends_and_saves() {
        let api = FakeApi::new();
        let (_dir, store) = temp_store();
        let mut entries = Vec::new();

        let outcome = choose_key(&api, &store, &mut entries, KeySelection::New(pair()))
            .await
            .unwrap();

        assert_eq!(outcome.session.phone_number(), OWN);
        assert_eq!(outcome.session.token(), "tok");
        assert_eq!(outcome.session.entry_index(), 0);
        assert_eq!(entries, vec![stored(Some(OWN))]);
        assert_eq!(store.load().entries, entries);
        assert_eq!(api.calls(), vec![Operation::GetBearer, Operation::GetNumber]);
    }

    #[tokio::test]
    async fn test_choose_key_requests_number_once_when_unassigned() {
        let mut api = FakeApi::new();
        api.assigned = Ok(None);
        let (_dir, store) = temp_store();
        let mut entries = vec![stored(None)];

        let outcome = choose_key(&api, &store, &mut entries, KeySelection::Existing(0))
            .await
            .unwrap();

        assert_eq!(api.count(Operation::NewNumber), 1);
        assert_eq!(outcome.session.phone_number(), "+61499999999");
        assert_eq!(entries[0].number.as_deref(), Some("+61499999999"));
        assert_eq!(
            store.load().entries[0].number.as_deref(),
            Some("+61499999999")
        );
        assert!(outcome.notices.iter().any(|n| n.title == "No number"));
    }

    #[tokio::test]
    async fn test_choose_key_updates_existing_entry_in_place() {
        let api = FakeApi::new();
        let (_dir, store) = temp_store();
        let other = {
            let mut e = CredentialEntry::new(KeyPair::new(&"z".repeat(32), &"z".repeat(16)).unwrap());
            e.number = Some("+61488888888".to_string());
            e
        };
        let mut entries = vec![other.clone(), stored(Some("+61400000099"))];

        let outcome = choose_key(&api, &store, &mut entries, KeySelection::Existing(1))
            .await
            .unwrap();

        assert_eq!(outcome.session.entry_index(), 1);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], other);
        assert_eq!(entries[1].number.as_deref(), Some(OWN));
    }

    #[tokio::test]
    async fn test_choose_key_typed_pair_matching_stored_entry_updates_it() {
        let api = FakeApi::new();
        let (_dir, store) = temp_store();
        let mut entries = vec![stored(None)];

        choose_key(&api, &store, &mut entries, KeySelection::New(pair()))
            .await
            .unwrap();

        assert_eq!(entries, vec![stored(Some(OWN))]);
    }

    #[tokio::test]
    async fn test_choose_key_invalid_stored_pair_makes_no_calls() {
        let api = FakeApi::new();
        let (_dir, store) = temp_store();
        let mut entries = vec![CredentialEntry {
            key: "too-short".to_string(),
            secret: SECRET.to_string(),
            number: None,
        }];
        let before = entries.clone();

        let err = choose_key(&api, &store, &mut entries, KeySelection::Existing(0))
            .await
            .unwrap_err();

        assert_eq!(err, Failure::Validation(ValidationError::KeyLength(9)));
        assert!(api.calls().is_empty());
        assert_eq!(entries, before);
    }

    #[tokio::test]
    async fn test_choose_key_timeout_leaves_entries_untouched() {
        for op in [Operation::GetBearer, Operation::GetNumber, Operation::NewNumber] {
            let mut api = FakeApi::new();
            api.assigned = Ok(None);
            match op {
                Operation::GetBearer => api.bearer = Err(timeout(op)),
                Operation::GetNumber => api.assigned = Err(timeout(op)),
                _ => api.provisioned = Err(timeout(op)),
            }
            let (_dir, store) = temp_store();
            let mut entries = vec![stored(Some("+61400000099"))];
            let before = entries.clone();

            let err = choose_key(&api, &store, &mut entries, KeySelection::Existing(0))
                .await
                .unwrap_err();

            assert_eq!(err, Failure::Api(timeout(op)));
            assert_eq!(Notice::from(&err).title, "Request timed out");
            assert_eq!(entries, before);
            // Nothing was written
            assert!(!store.path().exists());
        }
    }

    #[tokio::test]
    async fn test_choose_key_save_failure_still_returns_session() {
        let api = FakeApi::new();
        let dir = TempDir::new().unwrap();
        // A directory cannot be written as the key file
        let store = CredentialStore::new(dir.path());
        let mut entries = Vec::new();

        let outcome = choose_key(&api, &store, &mut entries, KeySelection::New(pair()))
            .await
            .unwrap();

        assert_eq!(outcome.session.phone_number(), OWN);
        assert_eq!(entries.len(), 1);
        assert!(outcome
            .notices
            .iter()
            .any(|n| n.title == "Could not write to key file"));
    }

    // -------------------------------------------------------------------------
    // Sending
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_send_message_success() {
        let api = FakeApi::new();
        let session = session();

        let sent = send_message(&api, Some(&session), " +61411111111 ", "hello")
            .await
            .unwrap();

        assert_eq!(sent.message.direction(), Direction::Outgoing);
        assert_eq!(sent.message.destination(), "+61411111111");
        assert_eq!(sent.message.id(), Some("sent-1"));
        assert!(sent.message.is_consistent_with(OWN));
        assert_eq!(api.calls(), vec![Operation::SendMessage]);
    }

    #[tokio::test]
    async fn test_send_message_blank_input_makes_no_calls() {
        let api = FakeApi::new();
        let session = session();

        let err = send_message(&api, Some(&session), "   ", "hello")
            .await
            .unwrap_err();
        assert_eq!(err, Failure::Validation(ValidationError::BlankDestination));

        let err = send_message(&api, Some(&session), "+61411111111", "")
            .await
            .unwrap_err();
        assert_eq!(err, Failure::Validation(ValidationError::BlankText));

        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_send_message_to_own_number_makes_no_calls() {
        let api = FakeApi::new();

        let err = send_message(&api, Some(&session()), &format!(" {} ", OWN), "hello")
            .await
            .unwrap_err();
        assert_eq!(err, Failure::Validation(ValidationError::OwnNumber));
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_send_message_requires_session() {
        let api = FakeApi::new();
        let err = send_message(&api, None, "+61411111111", "hello")
            .await
            .unwrap_err();
        assert_eq!(err, Failure::NoSession);
        assert_eq!(Notice::from(&err).title, "Request bearer first");
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_send_message_timeout() {
        let mut api = FakeApi::new();
        api.send = Err(timeout(Operation::SendMessage));

        let err = send_message(&api, Some(&session()), "+61411111111", "hello")
            .await
            .unwrap_err();
        assert_eq!(err, Failure::Api(timeout(Operation::SendMessage)));
    }

    // -------------------------------------------------------------------------
    // Polling
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_drain_inbox_collects_in_order_until_empty() {
        let api = FakeApi::new().with_polls(vec![
            inbound("+61411111111", "first", "m1"),
            inbound("+61422222222", "second", "m2"),
            Ok(Poll::Empty),
            inbound("+61433333333", "never read", "m3"),
        ]);

        let outcome = drain_inbox(&api, Some(&session())).await;

        assert!(outcome.is_complete());
        let texts: Vec<&str> = outcome.messages.iter().map(|m| m.text()).collect();
        assert_eq!(texts, vec!["first", "second"]);
        assert_eq!(api.count(Operation::PollMessage), 3);

        let first = &outcome.messages[0];
        assert_eq!(first.direction(), Direction::Incoming);
        assert_eq!(first.sender(), "+61411111111");
        assert_eq!(first.id(), Some("m1"));
        assert!(first.timestamp().is_some());
        assert!(outcome.messages.iter().all(|m| m.is_consistent_with(OWN)));
    }

    #[tokio::test]
    async fn test_drain_inbox_keeps_duplicates() {
        let api = FakeApi::new().with_polls(vec![
            inbound("+61411111111", "again", "m1"),
            inbound("+61411111111", "again", "m1"),
        ]);

        let outcome = drain_inbox(&api, Some(&session())).await;
        assert_eq!(outcome.messages.len(), 2);
        assert_eq!(outcome.messages[0], outcome.messages[1]);
    }

    #[tokio::test]
    async fn test_drain_inbox_stops_at_first_failure() {
        let api = FakeApi::new().with_polls(vec![
            inbound("+61411111111", "first", "m1"),
            Err(ApiError::UnexpectedStatus {
                operation: Operation::PollMessage,
                status: 500,
                body: "oops".to_string(),
            }),
            inbound("+61422222222", "second", "m2"),
        ]);

        let outcome = drain_inbox(&api, Some(&session())).await;

        assert_eq!(outcome.messages.len(), 1);
        assert!(matches!(
            outcome.failure,
            Some(Failure::Api(ApiError::UnexpectedStatus { status: 500, .. }))
        ));
        assert_eq!(api.count(Operation::PollMessage), 2);
    }

    #[tokio::test]
    async fn test_drain_inbox_skips_messages_from_own_number() {
        let api = FakeApi::new().with_polls(vec![
            inbound(OWN, "echo", "m1"),
            inbound("+61411111111", "real", "m2"),
        ]);

        let outcome = drain_inbox(&api, Some(&session())).await;
        assert!(outcome.is_complete());
        assert_eq!(outcome.messages.len(), 1);
        assert_eq!(outcome.messages[0].text(), "real");
        assert_eq!(api.count(Operation::PollMessage), 3);
    }

    #[tokio::test]
    async fn test_drain_inbox_timeout() {
        let api = FakeApi::new().with_polls(vec![Err(timeout(Operation::PollMessage))]);

        let outcome = drain_inbox(&api, Some(&session())).await;
        assert!(outcome.messages.is_empty());
        assert_eq!(
            outcome.failure,
            Some(Failure::Api(timeout(Operation::PollMessage)))
        );
    }

    #[tokio::test]
    async fn test_drain_inbox_requires_session() {
        let api = FakeApi::new();
        let outcome = drain_inbox(&api, None).await;
        assert_eq!(outcome.failure, Some(Failure::NoSession));
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_unparseable_timestamp_is_dropped() {
        let api = FakeApi::new().with_polls(vec![Ok(Poll::Received(InboundMessage {
            sender_address: "+61411111111".to_string(),
            destination_address: None,
            message: "hi".to_string(),
            message_id: None,
            sent_timestamp: Some("not a time".to_string()),
        }))]);

        let outcome = drain_inbox(&api, Some(&session())).await;
        assert_eq!(outcome.messages.len(), 1);
        assert!(outcome.messages[0].timestamp().is_none());
    }
}
