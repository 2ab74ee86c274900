//! Ordered conversation log with a delivery status per entry.

use crate::model::{Message, MessageRole};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnStatus {
    /// Sent to the endpoint, no answer yet.
    Pending,
    Committed,
    /// The completion call failed; the turn is kept for display only.
    Failed(String),
}

impl TurnStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Committed => "committed",
            Self::Failed(_) => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub message: Message,
    pub status: TurnStatus,
}

/// Handle to a pending entry returned by [`Transcript::push_pending`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnId(usize);

#[derive(Debug, Clone)]
pub struct Transcript {
    entries: Vec<Entry>,
}

impl Transcript {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            entries: vec![Entry {
                message: Message::system(system_prompt),
                status: TurnStatus::Committed,
            }],
        }
    }

    pub fn reset(&mut self, system_prompt: impl Into<String>) {
        *self = Self::new(system_prompt);
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn push_committed(&mut self, message: Message) {
        self.entries.push(Entry {
            message,
            status: TurnStatus::Committed,
        });
    }

    pub fn push_pending(&mut self, message: Message) -> TurnId {
        self.entries.push(Entry {
            message,
            status: TurnStatus::Pending,
        });
        TurnId(self.entries.len() - 1)
    }

    pub fn commit(&mut self, turn: TurnId) {
        self.set_status(turn, TurnStatus::Committed);
    }

    pub fn fail(&mut self, turn: TurnId, reason: impl Into<String>) {
        self.set_status(turn, TurnStatus::Failed(reason.into()));
    }

    fn set_status(&mut self, turn: TurnId, status: TurnStatus) {
        // A reset between push and resolve invalidates the handle.
        if let Some(entry) = self.entries.get_mut(turn.0)
            && entry.status == TurnStatus::Pending
        {
            entry.status = status;
        }
    }

    /// Messages eligible for replay to the model: everything not marked failed.
    pub fn replayable(&self) -> Vec<Message> {
        self.entries
            .iter()
            .filter(|entry| !matches!(entry.status, TurnStatus::Failed(_)))
            .map(|entry| entry.message.clone())
            .collect()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.entries
            .iter()
            .map(|entry| entry.message.clone())
            .collect()
    }

    pub fn system_message(&self) -> Option<&Message> {
        self.entries
            .first()
            .map(|entry| &entry.message)
            .filter(|message| message.role == MessageRole::System)
    }
}
