//! Conversational flows
//!
//! Each flow is a set of free functions over [`Services`]. A flow step takes
//! the acting account and its input, performs the state transition and
//! returns an [`Outcome`]: the reply for the actor plus any engine events.
//!
//! Errors returned from a step are shown to the actor through
//! [`Error::user_message`](crate::Error::user_message). Recoverable errors
//! (validation, most conflicts) leave the session where it was, so the
//! same step is re-prompted.
//!
//! ## Ordering rules
//!
//! - Removal (reject, delete, unregister): revoke access, then delete the row.
//! - Approval: write `approved = true`, then grant access.
//! - Edit of an approved account: retract the old grant, persist, grant the new one.
//!
//! Access failures never undo a store write; they are reported to the
//! administrators as drift.

pub mod admin;
pub mod approval;
pub mod console;
pub mod edit;
pub mod registration;
pub mod unregister;

use std::sync::Arc;
use tracing::warn;

use crate::access::AccessSynchronizer;
use crate::config::GateConfig;
use crate::engine::GateEvent;
use crate::error::{Error, Result};
use crate::session::SessionStore;
use crate::traits::{Account, AccountId, AccountStore, Console, Notifier, OutboundMessage};

/// Longest text an administrator may send through the bot
///
/// Leaves room for the prefix under the 4096 character limit chat
/// platforms put on one message.
pub const MAX_MESSAGE_CHARS: usize = 4000;

/// Everything a flow step may touch
#[derive(Clone)]
pub struct Services {
    pub config: Arc<GateConfig>,
    pub store: Arc<dyn AccountStore>,
    pub access: AccessSynchronizer,
    pub notifier: Arc<dyn Notifier>,
    pub console: Arc<dyn Console>,
    pub sessions: SessionStore,
}

impl Services {
    pub fn new(
        config: Arc<GateConfig>,
        store: Arc<dyn AccountStore>,
        access: AccessSynchronizer,
        notifier: Arc<dyn Notifier>,
        console: Arc<dyn Console>,
    ) -> Self {
        Self {
            config,
            store,
            access,
            notifier,
            console,
            sessions: SessionStore::new(),
        }
    }

    /// Fail with `PermissionDenied` unless the actor is an administrator
    pub fn require_admin(&self, actor: AccountId) -> Result<()> {
        if self.config.is_admin(actor) {
            return Ok(());
        }
        warn!(actor, "Permission denied for administrator action");
        Err(Error::PermissionDenied(actor))
    }

    /// Load an account row or fail with `AccountNotFound`
    pub async fn load(&self, account_id: AccountId) -> Result<Account> {
        self.store
            .get(account_id)
            .await?
            .ok_or(Error::AccountNotFound(account_id))
    }

    /// Deliver a message; failures are logged and swallowed
    pub async fn notify(&self, to: AccountId, message: &OutboundMessage) -> bool {
        match self.notifier.send(to, message).await {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    to,
                    transport = self.notifier.transport_name(),
                    error = %e,
                    "Notification delivery failed"
                );
                false
            }
        }
    }

    /// Deliver a message to every administrator
    pub async fn notify_admins(&self, message: &OutboundMessage) {
        for admin in &self.config.admins {
            self.notify(*admin, message).await;
        }
    }
}

/// Result of one flow step
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Outcome {
    /// Reply to the actor
    pub reply: OutboundMessage,
    pub events: Vec<GateEvent>,
}

impl Outcome {
    pub fn reply(reply: OutboundMessage) -> Self {
        Self {
            reply,
            events: Vec::new(),
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::reply(OutboundMessage::text(text))
    }

    pub fn with_event(mut self, event: GateEvent) -> Self {
        self.events.push(event);
        self
    }
}

/// One-line account summary used across flows
pub(crate) fn describe(account: &Account) -> String {
    let status = if account.approved { "approved" } else { "pending" };
    match &account.display_name {
        Some(name) => format!(
            "@{name} (id {}): nickname {}, IP {}, {status}",
            account.account_id, account.nickname, account.ip_address
        ),
        None => format!(
            "id {}: nickname {}, IP {}, {status}",
            account.account_id, account.nickname, account.ip_address
        ),
    }
}
