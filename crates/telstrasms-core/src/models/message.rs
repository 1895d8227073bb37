use chrono::{DateTime, FixedOffset};

use crate::models::ValidationError;
use crate::utils::format_timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Incoming,
    Outgoing,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Incoming => write!(f, "Incoming"),
            Direction::Outgoing => write!(f, "Outgoing"),
        }
    }
}

/// A single SMS, sent or received during this session.
///
/// Fields are private so exactly one side holds the session's own number, on
/// the side the direction implies; use [`Message::incoming`] or
/// [`Message::outgoing`], which refuse a counterpart equal to that number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    direction: Direction,
    sender: String,
    destination: String,
    text: String,
    id: Option<String>,
    timestamp: Option<DateTime<FixedOffset>>,
}

impl Message {
    /// A message received on `own_number`.
    pub fn incoming(
        own_number: &str,
        sender: impl Into<String>,
        text: impl Into<String>,
        id: Option<String>,
        timestamp: Option<DateTime<FixedOffset>>,
    ) -> Result<Self, ValidationError> {
        let sender = sender.into();
        if sender == own_number {
            return Err(ValidationError::OwnNumber);
        }
        Ok(Self {
            direction: Direction::Incoming,
            sender,
            destination: own_number.to_string(),
            text: text.into(),
            id,
            timestamp,
        })
    }

    /// A message sent from `own_number`.
    pub fn outgoing(
        own_number: &str,
        destination: impl Into<String>,
        text: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let destination = destination.into();
        if destination == own_number {
            return Err(ValidationError::OwnNumber);
        }
        Ok(Self {
            direction: Direction::Outgoing,
            sender: own_number.to_string(),
            destination,
            text: text.into(),
            id: None,
            timestamp: None,
        })
    }

    /// Attach the provider-assigned id after a successful send.
    pub fn with_id(mut self, id: Option<String>) -> Self {
        self.id = id;
        self
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn sender(&self) -> &str {
        &self.sender
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn timestamp(&self) -> Option<DateTime<FixedOffset>> {
        self.timestamp
    }

    /// The number on the far side of the conversation.
    pub fn counterpart(&self) -> &str {
        match self.direction {
            Direction::Incoming => &self.sender,
            Direction::Outgoing => &self.destination,
        }
    }

    /// Exactly one side holds `own_number`, and it is the side `direction` implies.
    pub fn is_consistent_with(&self, own_number: &str) -> bool {
        match self.direction {
            Direction::Incoming => self.destination == own_number && self.sender != own_number,
            Direction::Outgoing => self.sender == own_number && self.destination != own_number,
        }
    }

    pub fn to_row(&self) -> MessageRow {
        MessageRow {
            sender: self.sender.clone(),
            time: self.timestamp.map(format_timestamp).unwrap_or_default(),
            text: self.text.clone(),
        }
    }
}

/// Display-ready record for the message table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRow {
    pub sender: String,
    pub time: String,
    pub text: String,
}

/// Received messages for the current session, in arrival order.
///
/// Append-only; duplicate deliveries from the provider are kept.
#[derive(Debug, Clone, Default)]
pub struct Inbox {
    messages: Vec<Message>,
}

impl Inbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, messages: impl IntoIterator<Item = Message>) {
        self.messages.extend(messages);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn rows(&self) -> Vec<MessageRow> {
        self.messages.iter().map(Message::to_row).collect()
    }
}
