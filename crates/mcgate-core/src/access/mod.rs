//! Access synchronization
//!
//! Keeps the two external access stores (game whitelist and host firewall)
//! in line with the account table. There is no shared commit protocol
//! between them, so every call is applied best-effort and failures are
//! reported, not rolled back.
//!
//! ## Contract
//!
//! - Single-resource calls ([`AccessSynchronizer::whitelist_add`] etc.)
//!   return `Err` on failure. A firewall call touches two rules (TCP then
//!   UDP); both are always attempted and a partial failure is one combined error.
//! - Account-level calls ([`AccessSynchronizer::grant`],
//!   [`AccessSynchronizer::revoke`]) never fail. They return a
//!   [`SyncReport`] listing the sub-steps that did, and log each failure
//!   with account id, nickname, ip and step so drift can be repaired.
//! - Every call is idempotent, so repair is "run it again" or
//!   [`AccessSynchronizer::resync`].

use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::FirewallConfig;
use crate::error::{Error, Result};
use crate::traits::{Account, AccountFilter, AccountId, AccountStore, AllowRule, Firewall, Protocol, Whitelist};

/// One sub-step of an account-level grant or revoke
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncStep {
    WhitelistAdd,
    WhitelistRemove,
    WhitelistReload,
    FirewallAdd,
    FirewallRemove,
}

impl fmt::Display for SyncStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyncStep::WhitelistAdd => "whitelist add",
            SyncStep::WhitelistRemove => "whitelist remove",
            SyncStep::WhitelistReload => "whitelist reload",
            SyncStep::FirewallAdd => "firewall add",
            SyncStep::FirewallRemove => "firewall remove",
        };
        f.write_str(name)
    }
}

/// A failed sub-step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncFailure {
    /// Account the step was run for; `None` for process-wide steps (reload)
    pub account_id: Option<AccountId>,
    pub step: SyncStep,
    pub error: String,
}

impl fmt::Display for SyncFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.account_id {
            Some(id) => write!(f, "{} for account {}: {}", self.step, id, self.error),
            None => write!(f, "{}: {}", self.step, self.error),
        }
    }
}

/// Outcome of a best-effort synchronization
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub failures: Vec<SyncFailure>,
}

impl SyncReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn merge(&mut self, other: SyncReport) {
        self.failures.extend(other.failures);
    }

    pub(crate) fn record(&mut self, account_id: Option<AccountId>, step: SyncStep, result: Result<()>) {
        if let Err(e) = result {
            self.failures.push(SyncFailure {
                account_id,
                step,
                error: e.to_string(),
            });
        }
    }

    /// Administrator-facing warning, or `None` when nothing failed
    pub fn warning(&self) -> Option<String> {
        if self.is_clean() {
            return None;
        }
        let mut text = String::from("⚠️ Access synchronization incomplete:");
        for failure in &self.failures {
            text.push_str("\n• ");
            text.push_str(&failure.to_string());
        }
        text.push_str("\nThe account change was saved. Use /resync once the cause is fixed.");
        Some(text)
    }
}

/// Best-effort grant/revoke across whitelist and firewall
#[derive(Clone)]
pub struct AccessSynchronizer {
    whitelist: Arc<dyn Whitelist>,
    firewall: Arc<dyn Firewall>,
    port: u16,
}

impl fmt::Debug for AccessSynchronizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessSynchronizer")
            .field("whitelist", &self.whitelist.backend_name())
            .field("firewall", &self.firewall.backend_name())
            .field("port", &self.port)
            .finish()
    }
}

impl AccessSynchronizer {
    pub fn new(whitelist: Arc<dyn Whitelist>, firewall: Arc<dyn Firewall>, config: &FirewallConfig) -> Self {
        Self {
            whitelist,
            firewall,
            port: config.port,
        }
    }

    /// Game port the firewall rules open
    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn whitelist_add(&self, nickname: &str) -> Result<()> {
        debug!(nickname, backend = self.whitelist.backend_name(), "Whitelist add");
        self.whitelist.add(nickname).await
    }

    pub async fn whitelist_remove(&self, nickname: &str) -> Result<()> {
        debug!(nickname, backend = self.whitelist.backend_name(), "Whitelist remove");
        self.whitelist.remove(nickname).await
    }

    pub async fn whitelist_reload(&self) -> Result<()> {
        debug!(backend = self.whitelist.backend_name(), "Whitelist reload");
        self.whitelist.reload().await
    }

    /// Install the TCP and UDP allow-rules for an address
    pub async fn firewall_add(&self, ip: &str) -> Result<()> {
        let mut failed = Vec::new();
        for protocol in Protocol::ALL {
            let rule = AllowRule::new(ip, self.port, protocol);
            if let Err(e) = self.firewall.allow(&rule).await {
                failed.push(format!("{protocol}: {e}"));
            }
        }
        combine(ip, "allow", failed)
    }

    /// Delete the TCP and UDP allow-rules for an address
    pub async fn firewall_remove(&self, ip: &str) -> Result<()> {
        let mut failed = Vec::new();
        for protocol in Protocol::ALL {
            let rule = AllowRule::new(ip, self.port, protocol);
            if let Err(e) = self.firewall.delete(&rule).await {
                failed.push(format!("{protocol}: {e}"));
            }
        }
        combine(ip, "delete", failed)
    }

    /// Whitelist the nickname, then open the firewall for the IP
    pub async fn grant(&self, account: &Account) -> SyncReport {
        let mut report = SyncReport::default();
        let id = Some(account.account_id);
        report.record(id, SyncStep::WhitelistAdd, self.whitelist_add(&account.nickname).await);
        report.record(id, SyncStep::FirewallAdd, self.firewall_add(&account.ip_address).await);
        self.log_report("grant", account, &report);
        report
    }

    /// Remove the nickname from the whitelist, then close the firewall for the IP
    ///
    /// Safe to call for accounts that were never granted.
    pub async fn revoke(&self, account: &Account) -> SyncReport {
        let mut report = SyncReport::default();
        let id = Some(account.account_id);
        report.record(id, SyncStep::WhitelistRemove, self.whitelist_remove(&account.nickname).await);
        report.record(id, SyncStep::FirewallRemove, self.firewall_remove(&account.ip_address).await);
        self.log_report("revoke", account, &report);
        report
    }

    /// Re-grant every approved account, then reload the whitelist
    pub async fn resync(&self, store: &dyn AccountStore) -> Result<(usize, SyncReport)> {
        let approved = store.list(AccountFilter::Approved).await?;
        let mut report = SyncReport::default();
        for account in &approved {
            report.merge(self.grant(account).await);
        }
        report.record(None, SyncStep::WhitelistReload, self.whitelist_reload().await);

        info!(
            accounts = approved.len(),
            failures = report.failures.len(),
            "Access resync finished"
        );
        Ok((approved.len(), report))
    }

    fn log_report(&self, action: &str, account: &Account, report: &SyncReport) {
        if report.is_clean() {
            info!(
                account_id = account.account_id,
                nickname = %account.nickname,
                ip = %account.ip_address,
                "Access {action} applied"
            );
            return;
        }
        for failure in &report.failures {
            warn!(
                account_id = account.account_id,
                nickname = %account.nickname,
                ip = %account.ip_address,
                step = %failure.step,
                error = %failure.error,
                "Access {action} incomplete"
            );
        }
    }
}

fn combine(ip: &str, action: &str, failed: Vec<String>) -> Result<()> {
    if failed.is_empty() {
        return Ok(());
    }
    Err(Error::firewall(format!(
        "{action} for {ip} failed ({})",
        failed.join("; ")
    )))
}
