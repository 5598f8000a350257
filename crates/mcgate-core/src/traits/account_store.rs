// # Account Store Trait
//
// Defines the interface for the persistent account table.
//
// ## Purpose
//
// One row per end-user, keyed by the messaging-platform user id. A row exists
// only while the account is pending or approved; rejection and unregistration
// delete it outright.
//
// ## Implementations
//
// - SQLite: `store::SqliteAccountStore`
// - In-memory: `store::MemoryAccountStore`
//
// ## Usage
//
// ```rust,ignore
// use mcgate_core::{AccountStore, AccountPatch};
//
// let store = /* AccountStore implementation */;
// store.create(42, Some("alex"), "steve_1", "203.0.113.5").await?;
// store.update(42, &AccountPatch::new().approved(true)).await?;
// ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Externally issued account identity (the chat platform user id)
pub type AccountId = i64;

/// One account row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub account_id: AccountId,
    /// Informational only
    pub display_name: Option<String>,
    /// Canonical lowercase nickname
    pub nickname: String,
    /// Textual IPv4/IPv6 address as submitted (trimmed)
    pub ip_address: String,
    pub approved: bool,
}

impl Account {
    /// Label for listings: display name when known, otherwise the nickname
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.nickname)
    }
}

/// Listing filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccountFilter {
    #[default]
    All,
    Approved,
    Pending,
}

impl AccountFilter {
    /// Whether an account passes this filter
    pub fn matches(&self, account: &Account) -> bool {
        match self {
            AccountFilter::All => true,
            AccountFilter::Approved => account.approved,
            AccountFilter::Pending => !account.approved,
        }
    }
}

/// Partial update of an account row; `None` fields are left untouched
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountPatch {
    pub nickname: Option<String>,
    pub ip_address: Option<String>,
    pub approved: Option<bool>,
}

impl AccountPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nickname(mut self, nickname: impl Into<String>) -> Self {
        self.nickname = Some(nickname.into());
        self
    }

    pub fn ip_address(mut self, ip_address: impl Into<String>) -> Self {
        self.ip_address = Some(ip_address.into());
        self
    }

    pub fn approved(mut self, approved: bool) -> Self {
        self.approved = Some(approved);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.nickname.is_none() && self.ip_address.is_none() && self.approved.is_none()
    }

    /// Apply this patch to an in-memory row
    pub fn apply_to(&self, account: &mut Account) {
        if let Some(nickname) = &self.nickname {
            account.nickname = nickname.clone();
        }
        if let Some(ip_address) = &self.ip_address {
            account.ip_address = ip_address.clone();
        }
        if let Some(approved) = self.approved {
            account.approved = approved;
        }
    }
}

/// Trait for account store implementations
///
/// Implementations must be thread-safe and usable across async tasks.
///
/// # Atomicity
///
/// Each method is atomic with respect to the others. No method spans more
/// than one row, and nothing here coordinates with the whitelist or firewall.
///
/// # Uniqueness
///
/// `nickname` (case-insensitively) and `ip_address` are unique across rows.
/// `create` and `update` must reject a write that would violate this with
/// `ConflictError::NicknameTaken` / `ConflictError::IpTaken`, so concurrent
/// registrations that both passed validation cannot both commit.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Check whether a row exists for the account
    async fn exists(&self, account_id: AccountId) -> Result<bool, crate::Error> {
        Ok(self.get(account_id).await?.is_some())
    }

    /// Get an account row
    ///
    /// # Returns
    ///
    /// - `Ok(Some(Account))`: The row
    /// - `Ok(None)`: No row for this id
    /// - `Err(Error)`: Storage error
    async fn get(&self, account_id: AccountId) -> Result<Option<Account>, crate::Error>;

    /// Create a pending row, replacing any existing row for the same id
    ///
    /// The new row always has `approved = false`.
    ///
    /// # Returns
    ///
    /// - `Ok(Account)`: The stored row
    /// - `Err(Error::Conflict(..))`: Nickname or IP held by another account
    /// - `Err(Error)`: Storage error
    async fn create(
        &self,
        account_id: AccountId,
        display_name: Option<&str>,
        nickname: &str,
        ip_address: &str,
    ) -> Result<Account, crate::Error>;

    /// Update some fields of an existing row
    ///
    /// # Returns
    ///
    /// - `Ok(Account)`: The row after the update
    /// - `Err(Error::AccountNotFound)`: No row for this id
    /// - `Err(Error::Conflict(..))`: Nickname or IP held by another account
    async fn update(
        &self,
        account_id: AccountId,
        patch: &AccountPatch,
    ) -> Result<Account, crate::Error>;

    /// Delete a row
    ///
    /// Idempotent: deleting a missing row succeeds.
    ///
    /// # Returns
    ///
    /// - `Ok(true)`: A row was removed
    /// - `Ok(false)`: There was nothing to remove
    async fn delete(&self, account_id: AccountId) -> Result<bool, crate::Error>;

    /// List rows matching the filter, ordered by display name
    async fn list(&self, filter: AccountFilter) -> Result<Vec<Account>, crate::Error>;

    /// Find the account holding a nickname (case-insensitive)
    async fn nickname_holder(&self, nickname: &str) -> Result<Option<AccountId>, crate::Error>;

    /// Find the account holding an exact IP string
    async fn ip_holder(&self, ip_address: &str) -> Result<Option<AccountId>, crate::Error>;

    /// Persist any pending changes
    ///
    /// Called by the engine on shutdown.
    async fn flush(&self) -> Result<(), crate::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending() -> Account {
        Account {
            account_id: 42,
            display_name: None,
            nickname: "steve_1".into(),
            ip_address: "203.0.113.5".into(),
            approved: false,
        }
    }

    #[test]
    fn patch_only_touches_set_fields() {
        let mut account = pending();
        AccountPatch::new().approved(true).apply_to(&mut account);

        assert!(account.approved);
        assert_eq!(account.nickname, "steve_1");
        assert_eq!(account.ip_address, "203.0.113.5");
    }

    #[test]
    fn filter_partitions_by_approval() {
        let mut account = pending();
        assert!(AccountFilter::Pending.matches(&account));
        assert!(!AccountFilter::Approved.matches(&account));

        account.approved = true;
        assert!(AccountFilter::Approved.matches(&account));
        assert!(AccountFilter::All.matches(&account));
    }
}
