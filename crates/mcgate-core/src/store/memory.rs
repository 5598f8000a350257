// # Memory Account Store
//
// In-memory implementation of AccountStore.
//
// ## Purpose
//
// Provides a fast account table that doesn't persist across restarts.
// Useful for tests and for trying the bot out against a scratch server.
//
// ## Crash Behavior
//
// - All accounts are lost on restart/crash
// - Whitelist and firewall entries granted before the restart stay in place
//   until an administrator removes them by hand
//
// ## Uniqueness
//
// Mirrors the SQLite schema: nicknames are unique case-insensitively and IP
// strings are unique exactly. Checks and writes happen under one write lock.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use async_trait::async_trait;

use crate::error::ConflictError;
use crate::traits::account_store::{Account, AccountFilter, AccountId, AccountPatch, AccountStore};
use crate::Error;

/// In-memory account store implementation
///
/// # Example
///
/// ```rust,no_run
/// use mcgate_core::store::MemoryAccountStore;
/// use mcgate_core::traits::AccountStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemoryAccountStore::new();
///
///     store.create(42, Some("alex"), "steve_1", "203.0.113.5").await?;
///
///     let account = store.get(42).await?.unwrap();
///     assert!(!account.approved);
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryAccountStore {
    inner: Arc<RwLock<HashMap<AccountId, Account>>>,
}

impl MemoryAccountStore {
    /// Create a new empty memory account store
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of accounts in the store
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Check if the store is empty
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

/// Reject a row whose nickname or IP is held by a different account
fn check_unique(
    rows: &HashMap<AccountId, Account>,
    account_id: AccountId,
    nickname: &str,
    ip_address: &str,
) -> Result<(), Error> {
    for other in rows.values().filter(|row| row.account_id != account_id) {
        if other.nickname.eq_ignore_ascii_case(nickname) {
            return Err(ConflictError::NicknameTaken(nickname.to_string()).into());
        }
        if other.ip_address == ip_address {
            return Err(ConflictError::IpTaken(ip_address.to_string()).into());
        }
    }
    Ok(())
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn get(&self, account_id: AccountId) -> Result<Option<Account>, Error> {
        let guard = self.inner.read().await;
        Ok(guard.get(&account_id).cloned())
    }

    async fn create(
        &self,
        account_id: AccountId,
        display_name: Option<&str>,
        nickname: &str,
        ip_address: &str,
    ) -> Result<Account, Error> {
        let mut guard = self.inner.write().await;
        check_unique(&guard, account_id, nickname, ip_address)?;

        let account = Account {
            account_id,
            display_name: display_name.map(str::to_string),
            nickname: nickname.to_string(),
            ip_address: ip_address.to_string(),
            approved: false,
        };
        guard.insert(account_id, account.clone());
        Ok(account)
    }

    async fn update(&self, account_id: AccountId, patch: &AccountPatch) -> Result<Account, Error> {
        let mut guard = self.inner.write().await;

        let mut updated = guard
            .get(&account_id)
            .cloned()
            .ok_or(Error::AccountNotFound(account_id))?;
        patch.apply_to(&mut updated);
        check_unique(&guard, account_id, &updated.nickname, &updated.ip_address)?;

        guard.insert(account_id, updated.clone());
        Ok(updated)
    }

    async fn delete(&self, account_id: AccountId) -> Result<bool, Error> {
        let mut guard = self.inner.write().await;
        Ok(guard.remove(&account_id).is_some())
    }

    async fn list(&self, filter: AccountFilter) -> Result<Vec<Account>, Error> {
        let guard = self.inner.read().await;
        let mut accounts: Vec<Account> = guard
            .values()
            .filter(|account| filter.matches(account))
            .cloned()
            .collect();
        accounts.sort_by(|a, b| {
            a.label()
                .to_lowercase()
                .cmp(&b.label().to_lowercase())
                .then(a.account_id.cmp(&b.account_id))
        });
        Ok(accounts)
    }

    async fn nickname_holder(&self, nickname: &str) -> Result<Option<AccountId>, Error> {
        let guard = self.inner.read().await;
        Ok(guard
            .values()
            .find(|account| account.nickname.eq_ignore_ascii_case(nickname))
            .map(|account| account.account_id))
    }

    async fn ip_holder(&self, ip_address: &str) -> Result<Option<AccountId>, Error> {
        let guard = self.inner.read().await;
        Ok(guard
            .values()
            .find(|account| account.ip_address == ip_address)
            .map(|account| account.account_id))
    }

    async fn flush(&self) -> Result<(), Error> {
        // Nothing to persist
        Ok(())
    }
}
