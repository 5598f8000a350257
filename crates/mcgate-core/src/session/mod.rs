//! Conversation sessions
//!
//! A session is the transient, per-account state of one multi-step flow.
//! At most one session exists per account; starting a flow supersedes
//! whatever was there. Nothing here is persisted.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::traits::AccountId;

/// Registration progress
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationStep {
    AwaitingNickname {
        display_name: Option<String>,
    },
    AwaitingIp {
        display_name: Option<String>,
        nickname: String,
    },
    AwaitingConfirmation {
        display_name: Option<String>,
        nickname: String,
        ip_address: String,
    },
}

/// The active flow of one account
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Session {
    Registration(RegistrationStep),
    /// Waiting for a new nickname for `target`
    EditNickname { target: AccountId, by_admin: bool },
    /// Waiting for a new IP for `target`
    EditIp { target: AccountId, by_admin: bool },
    /// Waiting for the unregister confirm/cancel button
    Unregister,
    /// Waiting for an administrator's broadcast text
    Broadcast,
    /// Waiting for the text of a bot message to `target`
    DirectMessage { target: AccountId },
    /// Waiting for a global chat line
    ConsoleSay,
    /// Waiting for an in-game private message to `target`
    ConsoleTell { target: AccountId },
}

impl Session {
    /// Short name for logs
    pub fn kind(&self) -> &'static str {
        match self {
            Session::Registration(_) => "registration",
            Session::EditNickname { .. } => "edit_nickname",
            Session::EditIp { .. } => "edit_ip",
            Session::Unregister => "unregister",
            Session::Broadcast => "broadcast",
            Session::DirectMessage { .. } => "direct_message",
            Session::ConsoleSay => "console_say",
            Session::ConsoleTell { .. } => "console_tell",
        }
    }
}

#[derive(Debug, Clone)]
struct Entry {
    session: Session,
    touched_at: DateTime<Utc>,
}

/// Sessions keyed by account id
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    inner: Arc<RwLock<HashMap<AccountId, Entry>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current session of an account
    pub async fn get(&self, account_id: AccountId) -> Option<Session> {
        self.inner
            .read()
            .await
            .get(&account_id)
            .map(|entry| entry.session.clone())
    }

    /// Current session of an account, marking it as active now
    ///
    /// Any input addressed to a session counts as activity, including input
    /// that is rejected and re-prompted.
    pub async fn touch(&self, account_id: AccountId) -> Option<Session> {
        let mut guard = self.inner.write().await;
        let entry = guard.get_mut(&account_id)?;
        entry.touched_at = Utc::now();
        Some(entry.session.clone())
    }

    /// Start a new flow, superseding any active one
    ///
    /// Returns the superseded session.
    pub async fn begin(&self, account_id: AccountId, session: Session) -> Option<Session> {
        let entry = Entry {
            session,
            touched_at: Utc::now(),
        };
        self.inner
            .write()
            .await
            .insert(account_id, entry)
            .map(|previous| previous.session)
    }

    /// Advance the active flow to its next step
    pub async fn replace(&self, account_id: AccountId, session: Session) {
        self.begin(account_id, session).await;
    }

    /// End the active flow, if any
    pub async fn end(&self, account_id: AccountId) -> Option<Session> {
        self.inner
            .write()
            .await
            .remove(&account_id)
            .map(|entry| entry.session)
    }

    /// Drop sessions idle for longer than `timeout`
    ///
    /// Returns the accounts whose sessions were dropped. A timeout reaching
    /// past the representable date range drops nothing.
    pub async fn expire(&self, timeout: Duration) -> Vec<AccountId> {
        let Some(cutoff) = Utc::now().checked_sub_signed(timeout) else {
            return Vec::new();
        };
        let mut guard = self.inner.write().await;
        let stale: Vec<AccountId> = guard
            .iter()
            .filter(|(_, entry)| entry.touched_at < cutoff)
            .map(|(id, _)| *id)
            .collect();
        for id in &stale {
            guard.remove(id);
        }
        stale
    }

    /// Number of active sessions
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}
