//! Message exchange bookkeeping shared by the messages of one exchange.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// Message exchange pattern of an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExchangePattern {
    InOnly,
    InOut,
    OutOnly,
    /// Client-side request/response: the inbound message is the response
    OutIn,
}

/// Role of a message within its exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageLabel {
    In,
    Out,
    Fault,
}

#[derive(Debug, Default)]
struct ExchangeState {
    messages: HashMap<MessageLabel, Uuid>,
    understood_headers: HashSet<String>,
    complete: bool,
}

/// Exchange shared between the request and response contexts
#[derive(Debug)]
pub struct ExchangeContext {
    id: Uuid,
    pattern: ExchangePattern,
    state: Mutex<ExchangeState>,
}

impl ExchangeContext {
    pub fn new(pattern: ExchangePattern) -> Self {
        Self {
            id: Uuid::new_v4(),
            pattern,
            state: Mutex::new(ExchangeState::default()),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn pattern(&self) -> ExchangePattern {
        self.pattern
    }

    pub fn add_message(&self, label: MessageLabel, message_id: Uuid) {
        self.state.lock().messages.insert(label, message_id);
    }

    pub fn message(&self, label: MessageLabel) -> Option<Uuid> {
        self.state.lock().messages.get(&label).copied()
    }

    pub fn remove_message(&self, label: MessageLabel) -> Option<Uuid> {
        self.state.lock().messages.remove(&label)
    }

    /// Declare a header understood by the application on the client side
    pub fn declare_understood(&self, header: impl Into<String>) {
        self.state.lock().understood_headers.insert(header.into());
    }

    pub fn is_understood(&self, header: &str) -> bool {
        self.state.lock().understood_headers.contains(header)
    }

    pub fn understood_headers(&self) -> HashSet<String> {
        self.state.lock().understood_headers.clone()
    }

    pub fn set_complete(&self, complete: bool) {
        self.state.lock().complete = complete;
    }

    pub fn is_complete(&self) -> bool {
        self.state.lock().complete
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_labels() {
        let exchange = ExchangeContext::new(ExchangePattern::OutIn);
        let request = Uuid::new_v4();
        let response = Uuid::new_v4();
        exchange.add_message(MessageLabel::Out, request);
        exchange.add_message(MessageLabel::In, response);

        assert_eq!(exchange.message(MessageLabel::Out), Some(request));
        assert_eq!(exchange.remove_message(MessageLabel::In), Some(response));
        assert_eq!(exchange.message(MessageLabel::In), None);
    }

    #[test]
    fn test_understood_headers() {
        let exchange = ExchangeContext::new(ExchangePattern::OutIn);
        exchange.declare_understood("{urn:tx}Coordination");
        assert!(exchange.is_understood("{urn:tx}Coordination"));
        assert!(!exchange.is_understood("{urn:tx}Other"));
    }
}
