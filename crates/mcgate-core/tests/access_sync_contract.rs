//! Contract Test: Access Synchronization
//!
//! Constraints verified:
//! - whitelist/firewall calls are idempotent
//! - Firewall calls always attempt both protocols and combine failures
//! - grant/revoke report failures instead of returning errors
//! - resync repairs drift for every approved account

mod common;

use common::*;
use mcgate_core::config::FirewallConfig;
use mcgate_core::store::MemoryAccountStore;
use mcgate_core::traits::{Account, AccountPatch, AccountStore, Protocol};
use mcgate_core::{AccessSynchronizer, Error, SyncStep};
use std::sync::Arc;

fn synchronizer() -> (AccessSynchronizer, Arc<RecordingWhitelist>, Arc<RecordingFirewall>) {
    let whitelist = RecordingWhitelist::new();
    let firewall = RecordingFirewall::new();
    let access = AccessSynchronizer::new(whitelist.clone(), firewall.clone(), &FirewallConfig::default());
    (access, whitelist, firewall)
}

fn account() -> Account {
    Account {
        account_id: PLAYER,
        display_name: None,
        nickname: "steve_1".into(),
        ip_address: "203.0.113.5".into(),
        approved: true,
    }
}

#[tokio::test]
async fn whitelist_add_twice_equals_once() {
    let (access, whitelist, _) = synchronizer();

    access.whitelist_add("steve_1").await.unwrap();
    let once = whitelist.members();
    access.whitelist_add("steve_1").await.unwrap();

    assert_eq!(whitelist.members(), once);
}

#[tokio::test]
async fn firewall_add_then_remove_restores_rule_set() {
    let (access, _, firewall) = synchronizer();
    access.firewall_add("198.51.100.7").await.unwrap();
    let before = firewall.rules();

    access.firewall_add("203.0.113.5").await.unwrap();
    assert_eq!(firewall.rules().len(), 4);
    access.firewall_remove("203.0.113.5").await.unwrap();

    assert_eq!(firewall.rules(), before);
    // Removing again is harmless
    access.firewall_remove("203.0.113.5").await.unwrap();
}

#[tokio::test]
async fn partial_firewall_failure_is_one_combined_error() {
    let (access, _, firewall) = synchronizer();
    firewall.fail_protocol(Some(Protocol::Tcp));

    let err = access.firewall_add("203.0.113.5").await.unwrap_err();

    assert!(matches!(err, Error::Firewall(ref msg) if msg.contains("tcp")));
    // UDP was still attempted and applied
    assert_eq!(firewall.call_count(), 2);
    assert_eq!(firewall.protocols_for("203.0.113.5"), vec![Protocol::Udp]);
}

#[tokio::test]
async fn dead_control_channel_is_reported_per_step() {
    let (access, whitelist, firewall) = synchronizer();
    whitelist.set_down(true);

    let err = access.whitelist_add("steve_1").await.unwrap_err();
    assert!(matches!(err, Error::ControlChannelUnavailable(_)));

    let report = access.grant(&account()).await;
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].step, SyncStep::WhitelistAdd);
    assert_eq!(report.failures[0].account_id, Some(PLAYER));
    // The firewall half is independent
    assert_eq!(firewall.protocols_for("203.0.113.5").len(), 2);
}

#[tokio::test]
async fn revoke_of_never_granted_account_is_clean() {
    let (access, _, _) = synchronizer();
    assert!(access.revoke(&account()).await.is_clean());
}

#[tokio::test]
async fn resync_regrants_approved_accounts_only() {
    let (access, whitelist, firewall) = synchronizer();
    let store = MemoryAccountStore::new();
    store.create(1, None, "steve_1", "203.0.113.5").await.unwrap();
    store.create(2, None, "alex", "198.51.100.7").await.unwrap();
    store.update(1, &AccountPatch::new().approved(true)).await.unwrap();

    let (count, report) = access.resync(&store).await.unwrap();

    assert_eq!(count, 1);
    assert!(report.is_clean());
    assert!(whitelist.contains("steve_1"));
    assert!(!whitelist.contains("alex"));
    assert_eq!(firewall.rules().len(), 2);
    assert_eq!(whitelist.reload_count(), 1);
}

#[tokio::test]
async fn resync_repairs_drift_left_by_failed_approval() {
    let gate = Harness::new();
    gate.register(PLAYER, "steve_1", "203.0.113.5").await;
    gate.whitelist.set_down(true);
    gate.command(ADMIN, mcgate_core::Command::Approve(PLAYER)).await;
    assert!(!gate.whitelist.contains("steve_1"));

    gate.whitelist.set_down(false);
    gate.command(ADMIN, mcgate_core::Command::Resync).await;

    assert!(gate.whitelist.contains("steve_1"));
    assert!(gate.last_reply(ADMIN).contains("Resynced access for 1"));
}
