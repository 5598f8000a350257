// # Notifier Trait
//
// Defines the outbound half of the chat transport.
//
// ## Implementations
//
// - Telegram Bot API: `mcgate-telegram` crate
//
// Delivery failures are returned to the caller, but the flows only log them:
// a failed notification never aborts a state transition.

use async_trait::async_trait;

use crate::command::Command;
use crate::traits::AccountId;

/// One action button attached to a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    pub label: String,
    pub command: Command,
}

impl Action {
    pub fn new(label: impl Into<String>, command: Command) -> Self {
        Self {
            label: label.into(),
            command,
        }
    }
}

/// A text message with optional action buttons
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutboundMessage {
    pub text: String,
    pub actions: Vec<Action>,
}

impl OutboundMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            actions: Vec::new(),
        }
    }

    pub fn with_action(mut self, label: impl Into<String>, command: Command) -> Self {
        self.actions.push(Action::new(label, command));
        self
    }

    /// Whether any attached action carries the given command
    pub fn has_action(&self, command: &Command) -> bool {
        self.actions.iter().any(|action| &action.command == command)
    }
}

/// Trait for notifier implementations
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver a message to an account's private chat
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Accepted by the transport
    /// - `Err(Error::Transport)`: Delivery failed
    async fn send(&self, to: AccountId, message: &OutboundMessage) -> Result<(), crate::Error>;

    /// Transport name (for logging/debugging)
    fn transport_name(&self) -> &'static str;
}
