//! SQLite account store
//!
//! Persists the account table with SQLx. The schema lives in the embedded
//! migrations under `migrations/`; uniqueness of nickname and IP is a
//! storage-level constraint, and violations come back as
//! [`ConflictError`](crate::ConflictError) variants.

use async_trait::async_trait;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::ConflictError;
use crate::traits::account_store::{Account, AccountFilter, AccountId, AccountPatch, AccountStore};
use crate::Error;

static MEMDB_COUNTER: AtomicU64 = AtomicU64::new(0);

type AccountRow = (i64, Option<String>, String, String, bool);

fn from_row((account_id, display_name, nickname, ip_address, approved): AccountRow) -> Account {
    Account {
        account_id,
        display_name,
        nickname,
        ip_address,
        approved,
    }
}

/// Map a UNIQUE violation to the conflicting field, anything else to a store error
fn map_write_error(err: sqlx::Error, nickname: &str, ip_address: &str) -> Error {
    if let sqlx::Error::Database(ref db_err) = err
        && db_err.is_unique_violation()
    {
        let message = db_err.message();
        if message.contains("accounts.nickname") {
            return ConflictError::NicknameTaken(nickname.to_string()).into();
        }
        if message.contains("accounts.ip_address") {
            return ConflictError::IpTaken(ip_address.to_string()).into();
        }
    }
    Error::from(err)
}

/// SQLite-backed account store
#[derive(Debug, Clone)]
pub struct SqliteAccountStore {
    pool: SqlitePool,
}

impl SqliteAccountStore {
    const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);
    const IDLE_TIMEOUT: Duration = Duration::from_secs(60);

    /// Open (or create) the database file and apply migrations
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && let Err(e) = std::fs::create_dir_all(parent)
        {
            warn!(path = %parent.display(), error = %e, "Failed to create database directory");
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .acquire_timeout(Self::ACQUIRE_TIMEOUT)
            .idle_timeout(Some(Self::IDLE_TIMEOUT))
            .connect_with(options)
            .await?;

        info!(path = %path.display(), "Account database connected");
        Self::prepare(pool).await
    }

    /// Open a private in-memory database (tests, scratch runs)
    pub async fn open_in_memory() -> Result<Self, Error> {
        // Shared-cache name must be unique per store or parallel tests collide
        let id = MEMDB_COUNTER.fetch_add(1, Ordering::Relaxed);
        let uri = format!(
            "file:mcgate-memdb-{}-{}?mode=memory&cache=shared",
            std::process::id(),
            id
        );

        let options = SqliteConnectOptions::new()
            .filename(&uri)
            .shared_cache(true)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .acquire_timeout(Self::ACQUIRE_TIMEOUT)
            .connect_with(options)
            .await?;

        Self::prepare(pool).await
    }

    async fn prepare(pool: SqlitePool) -> Result<Self, Error> {
        sqlx::migrate!("./migrations").run(&pool).await?;
        debug!("Account database migrations applied");

        sqlx::query("PRAGMA journal_mode=WAL").execute(&pool).await?;
        sqlx::query("PRAGMA synchronous=NORMAL").execute(&pool).await?;

        Ok(Self { pool })
    }

    /// Close the pool, waiting for in-flight queries
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl AccountStore for SqliteAccountStore {
    async fn get(&self, account_id: AccountId) -> Result<Option<Account>, Error> {
        let row = sqlx::query_as::<_, AccountRow>(
            r#"
            SELECT account_id, display_name, nickname, ip_address, approved
            FROM accounts
            WHERE account_id = ?
            "#,
        )
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(from_row))
    }

    async fn create(
        &self,
        account_id: AccountId,
        display_name: Option<&str>,
        nickname: &str,
        ip_address: &str,
    ) -> Result<Account, Error> {
        // Upsert on the primary key only; the UNIQUE columns still fail on other rows
        sqlx::query(
            r#"
            INSERT INTO accounts (account_id, display_name, nickname, ip_address, approved)
            VALUES (?, ?, ?, ?, 0)
            ON CONFLICT(account_id) DO UPDATE SET
                display_name = excluded.display_name,
                nickname = excluded.nickname,
                ip_address = excluded.ip_address,
                approved = 0
            "#,
        )
        .bind(account_id)
        .bind(display_name)
        .bind(nickname)
        .bind(ip_address)
        .execute(&self.pool)
        .await
        .map_err(|e| map_write_error(e, nickname, ip_address))?;

        Ok(Account {
            account_id,
            display_name: display_name.map(str::to_string),
            nickname: nickname.to_string(),
            ip_address: ip_address.to_string(),
            approved: false,
        })
    }

    async fn update(&self, account_id: AccountId, patch: &AccountPatch) -> Result<Account, Error> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, AccountRow>(
            r#"
            SELECT account_id, display_name, nickname, ip_address, approved
            FROM accounts
            WHERE account_id = ?
            "#,
        )
        .bind(account_id)
        .fetch_optional(&mut *tx)
        .await?;

        let mut account = row.map(from_row).ok_or(Error::AccountNotFound(account_id))?;
        patch.apply_to(&mut account);

        sqlx::query(
            r#"
            UPDATE accounts
            SET nickname = ?, ip_address = ?, approved = ?
            WHERE account_id = ?
            "#,
        )
        .bind(&account.nickname)
        .bind(&account.ip_address)
        .bind(account.approved)
        .bind(account_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_write_error(e, &account.nickname, &account.ip_address))?;

        tx.commit().await?;
        Ok(account)
    }

    async fn delete(&self, account_id: AccountId) -> Result<bool, Error> {
        let result = sqlx::query("DELETE FROM accounts WHERE account_id = ?")
            .bind(account_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list(&self, filter: AccountFilter) -> Result<Vec<Account>, Error> {
        let condition = match filter {
            AccountFilter::All => "",
            AccountFilter::Approved => "WHERE approved = 1",
            AccountFilter::Pending => "WHERE approved = 0",
        };
        let query = format!(
            r#"
            SELECT account_id, display_name, nickname, ip_address, approved
            FROM accounts
            {condition}
            ORDER BY COALESCE(display_name, nickname) COLLATE NOCASE, account_id
            "#
        );

        let rows = sqlx::query_as::<_, AccountRow>(&query)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(from_row).collect())
    }

    async fn nickname_holder(&self, nickname: &str) -> Result<Option<AccountId>, Error> {
        let holder = sqlx::query_scalar::<_, i64>(
            "SELECT account_id FROM accounts WHERE nickname = ? COLLATE NOCASE",
        )
        .bind(nickname)
        .fetch_optional(&self.pool)
        .await?;

        Ok(holder)
    }

    async fn ip_holder(&self, ip_address: &str) -> Result<Option<AccountId>, Error> {
        let holder = sqlx::query_scalar::<_, i64>(
            "SELECT account_id FROM accounts WHERE ip_address = ?",
        )
        .bind(ip_address)
        .fetch_optional(&self.pool)
        .await?;

        Ok(holder)
    }

    async fn flush(&self) -> Result<(), Error> {
        sqlx::query("PRAGMA wal_checkpoint(TRUNCATE)")
            .execute(&self.pool)
            .await?;
        debug!("Account database checkpointed");
        Ok(())
    }
}
