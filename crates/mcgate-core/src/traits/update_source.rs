// # Update Source Trait
//
// Defines the inbound half of the chat transport.
//
// ## Implementations
//
// - Telegram Bot API long polling: `mcgate-telegram` crate
//
// ## Usage
//
// ```rust,ignore
// use tokio_stream::StreamExt;
//
// let source = /* UpdateSource implementation */;
// let mut updates = source.watch();
// while let Some(inbound) = updates.next().await {
//     dispatcher.handle(inbound).await;
// }
// ```

use tokio_stream::Stream;
use std::pin::Pin;

use crate::command::Command;
use crate::traits::AccountId;

/// What the user sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// A slash command or button press, already decoded
    Command(Command),
    /// Free text (answer to the current conversational step)
    Text(String),
}

/// One inbound update from a private chat
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inbound {
    /// Sender account id
    pub from: AccountId,
    /// Sender's platform handle, if any
    pub display_name: Option<String>,
    pub payload: Payload,
}

impl Inbound {
    pub fn command(from: AccountId, command: Command) -> Self {
        Self {
            from,
            display_name: None,
            payload: Payload::Command(command),
        }
    }

    pub fn text(from: AccountId, text: impl Into<String>) -> Self {
        Self {
            from,
            display_name: None,
            payload: Payload::Text(text.into()),
        }
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }
}

/// Trait for update source implementations
///
/// # Trust Level: Semi-Trusted
///
/// ## Allowed Capabilities
/// - ✅ Network I/O against the chat platform
/// - ✅ Spawn one task that feeds the stream
///
/// ## Forbidden Capabilities
/// - ❌ Interpret commands beyond decoding them into [`Command`]
/// - ❌ Access the account store or external access stores
///
/// Undecodable callback payloads are dropped at this boundary (logged), so
/// the core only ever sees the closed command set.
pub trait UpdateSource: Send + Sync {
    /// Stream of inbound updates
    ///
    /// The stream ends only when the transport shuts down.
    fn watch(&self) -> Pin<Box<dyn Stream<Item = Inbound> + Send + 'static>>;
}
