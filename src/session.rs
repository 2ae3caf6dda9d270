use crate::llm::ChatMessage;
use chrono::{DateTime, Utc};

/// Messages kept per side of the conversation
const HISTORY_LIMIT: usize = 50;

/// Per-user chat session: system message plus bounded alternating history.
///
/// In-memory only; sessions live for the process lifetime.
#[derive(Debug, Clone)]
pub struct ChatSession {
    pub system_message: String,
    user_messages: Vec<ChatMessage>,
    assistant_messages: Vec<ChatMessage>,
    pub last_updated: DateTime<Utc>,
    pub total_interactions: usize,
}

impl ChatSession {
    pub fn new(system_message: &str) -> Self {
        Self {
            system_message: system_message.to_string(),
            user_messages: Vec::new(),
            assistant_messages: Vec::new(),
            last_updated: Utc::now(),
            total_interactions: 0,
        }
    }

    pub fn add_user_message(&mut self, content: String) {
        self.user_messages.push(ChatMessage::user(content));
        self.maintain_balance();
        self.last_updated = Utc::now();
        self.total_interactions += 1;
    }

    pub fn add_assistant_message(&mut self, content: String) {
        self.assistant_messages.push(ChatMessage::assistant(content));
        self.maintain_balance();
        self.last_updated = Utc::now();
    }

    /// Interleave user and assistant history in conversation order
    pub fn conversation_messages(&self) -> Vec<ChatMessage> {
        let mut messages = Vec::new();
        let max_len = std::cmp::max(self.user_messages.len(), self.assistant_messages.len());

        for i in 0..max_len {
            if let Some(message) = self.user_messages.get(i) {
                messages.push(message.clone());
            }
            if let Some(message) = self.assistant_messages.get(i) {
                messages.push(message.clone());
            }
        }

        messages
    }

    fn maintain_balance(&mut self) {
        if self.user_messages.len() > HISTORY_LIMIT {
            self.user_messages
                .drain(0..self.user_messages.len() - HISTORY_LIMIT);
        }
        if self.assistant_messages.len() > HISTORY_LIMIT {
            self.assistant_messages
                .drain(0..self.assistant_messages.len() - HISTORY_LIMIT);
        }
    }

    pub fn clear(&mut self) {
        self.user_messages.clear();
        self.assistant_messages.clear();
        self.last_updated = Utc::now();
    }

    pub fn total_messages(&self) -> usize {
        self.user_messages.len() + self.assistant_messages.len()
    }
}
