//! Contract Test: Self-Service Unregistration
//!
//! Constraints verified:
//! - Removal only happens after the explicit confirm step
//! - Access is revoked before the row is deleted, and administrators are told
//! - Stale confirm buttons do nothing

mod common;

use common::*;
use mcgate_core::traits::AccountStore;
use mcgate_core::{Command, GateEvent, RemovalReason};

#[tokio::test]
async fn scenario_f_confirmed_unregistration_removes_everything() {
    let gate = Harness::new();
    gate.register_approved(PLAYER, "steve_1", "203.0.113.5").await;

    gate.command(PLAYER, Command::Unregister).await;
    let prompt = gate.notifier.last_to(PLAYER).unwrap();
    assert!(prompt.has_action(&Command::ConfirmUnregister));
    assert!(prompt.has_action(&Command::CancelUnregister));
    assert!(gate.store.exists(PLAYER).await.unwrap(), "nothing removed before confirm");

    let events = gate.command(PLAYER, Command::ConfirmUnregister).await;

    assert_eq!(
        events,
        vec![GateEvent::AccountRemoved {
            account_id: PLAYER,
            reason: RemovalReason::Unregistered
        }]
    );
    assert!(gate.store.get(PLAYER).await.unwrap().is_none());
    assert!(gate.whitelist.members().is_empty());
    assert!(gate.firewall.rules().is_empty());

    for admin in [ADMIN, SECOND_ADMIN] {
        assert!(gate.last_reply(admin).contains("unregistered"));
    }
}

#[tokio::test]
async fn cancel_keeps_the_account() {
    let gate = Harness::new();
    gate.register_approved(PLAYER, "steve_1", "203.0.113.5").await;

    gate.command(PLAYER, Command::Unregister).await;
    gate.command(PLAYER, Command::CancelUnregister).await;

    assert_eq!(gate.last_reply(PLAYER), "Unregistration cancelled.");
    assert!(gate.store.exists(PLAYER).await.unwrap());
    assert!(gate.whitelist.contains("steve_1"));

    // The confirm button from the earlier prompt is now stale
    gate.command(PLAYER, Command::ConfirmUnregister).await;
    assert!(gate.last_reply(PLAYER).contains("no longer active"));
    assert!(gate.store.exists(PLAYER).await.unwrap());
}

#[tokio::test]
async fn unregister_without_row_is_not_found() {
    let gate = Harness::new();

    gate.command(PLAYER, Command::Unregister).await;

    assert_eq!(gate.last_reply(PLAYER), "Account not found.");
    assert!(gate.dispatcher.sessions().get(PLAYER).await.is_none());
}

#[tokio::test]
async fn revoke_failure_still_deletes_and_warns_admins() {
    let gate = Harness::new();
    gate.register_approved(PLAYER, "steve_1", "203.0.113.5").await;
    gate.whitelist.set_down(true);

    gate.command(PLAYER, Command::Unregister).await;
    let events = gate.command(PLAYER, Command::ConfirmUnregister).await;

    assert!(gate.store.is_empty().await);
    assert!(events.contains(&GateEvent::AccessDrift {
        account_id: Some(PLAYER),
        failures: 1
    }));
    assert!(gate.last_reply(ADMIN).contains("whitelist remove"));
    assert!(!gate.last_reply(PLAYER).contains("whitelist"));
}
