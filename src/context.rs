use crate::model::{Message, MessageRole};

/// Decides which transcript messages go into an outbound request.
pub trait ContextPolicy {
    fn assemble(&self, messages: &[Message]) -> Vec<Message>;

    fn name(&self) -> &'static str;
}

/// Replays the entire history on every request.
#[derive(Debug, Clone, Copy, Default)]
pub struct FullHistory;

impl ContextPolicy for FullHistory {
    fn assemble(&self, messages: &[Message]) -> Vec<Message> {
        messages.to_vec()
    }

    fn name(&self) -> &'static str {
        "full-history"
    }
}

/// Keeps the leading system message plus the newest turns.
#[derive(Debug, Clone, Copy)]
pub struct RecentWindow {
    max_messages: usize,
}

impl RecentWindow {
    pub fn new(max_messages: usize) -> Self {
        Self {
            max_messages: max_messages.max(2),
        }
    }

    pub fn max_messages(&self) -> usize {
        self.max_messages
    }
}

impl ContextPolicy for RecentWindow {
    fn assemble(&self, messages: &[Message]) -> Vec<Message> {
        if messages.len() <= self.max_messages {
            return messages.to_vec();
        }

        let (head, rest) = match messages.split_first() {
            Some((first, rest)) if first.role == MessageRole::System => (Some(first), rest),
            _ => (None, messages),
        };

        let keep_tail = self.max_messages - usize::from(head.is_some());
        let mut tail = &rest[rest.len().saturating_sub(keep_tail)..];
        while let Some((first, remaining)) = tail.split_first()
            && first.role == MessageRole::Assistant
        {
            tail = remaining;
        }

        head.into_iter().chain(tail).cloned().collect()
    }

    fn name(&self) -> &'static str {
        "recent-window"
    }
}

pub fn policy_for(max_messages: Option<usize>) -> Box<dyn ContextPolicy> {
    match max_messages {
        Some(max) => Box::new(RecentWindow::new(max)),
        None => Box::new(FullHistory),
    }
}
