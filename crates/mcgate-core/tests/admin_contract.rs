//! Contract Test: Administrator Tooling and Status
//!
//! Constraints verified:
//! - Listings reflect the pending/approved split
//! - Manual grant/revoke touches exactly one external store
//! - Listings are paged with navigation buttons
//! - Broadcast reaches approved players only, reports delivery, and refuses
//!   texts too long for one chat message
//! - Idle sessions expire; input addressed to a session keeps it alive
//! - Out-of-range session timeouts are refused by validation and never
//!   crash or short-circuit the dispatcher

mod common;

use common::*;
use mcgate_core::config::MAX_SESSION_TIMEOUT_SECS;
use mcgate_core::flows::admin::LIST_PAGE_SIZE;
use mcgate_core::flows::MAX_MESSAGE_CHARS;
use mcgate_core::traits::Protocol;
use mcgate_core::{Command, GateEvent, RegistrationStep, Resource, Session};
use std::time::Duration;

#[tokio::test]
async fn listings_split_pending_and_approved() {
    let gate = Harness::new();

    gate.command(ADMIN, Command::ListPending { page: 1 }).await;
    assert_eq!(gate.last_reply(ADMIN), "No pending applications.");

    gate.register(PLAYER, "steve_1", "203.0.113.5").await;
    gate.register_approved(OTHER_PLAYER, "alex", "198.51.100.7").await;

    gate.command(ADMIN, Command::ListPending { page: 1 }).await;
    let pending = gate.notifier.last_to(ADMIN).unwrap();
    assert!(pending.text.contains("steve_1"));
    assert!(!pending.text.contains("alex"));
    assert!(pending.has_action(&Command::Approve(PLAYER)));
    assert!(pending.has_action(&Command::Reject(PLAYER)));

    gate.command(ADMIN, Command::ListApproved { page: 1 }).await;
    let approved = gate.notifier.last_to(ADMIN).unwrap();
    assert!(approved.text.contains("alex"));
    assert!(!approved.text.contains("steve_1"));
    assert!(approved.has_action(&Command::Inspect(OTHER_PLAYER)));
}

#[tokio::test]
async fn listings_are_paged() {
    let gate = Harness::new();
    for i in 0..25u8 {
        gate.register(
            100 + i64::from(i),
            &format!("player_{i}"),
            &format!("198.51.100.{}", 10 + i),
        )
        .await;
    }

    gate.command(ADMIN, Command::ListPending { page: 1 }).await;
    let first = gate.notifier.last_to(ADMIN).unwrap();
    assert!(first.text.starts_with("Pending applications (25), page 1 of 2:"));
    assert_eq!(first.text.matches("\n• ").count(), LIST_PAGE_SIZE);
    assert!(first.has_action(&Command::ListPending { page: 2 }));
    assert!(!first.actions.iter().any(|action| action.label.contains("Previous")));

    gate.command(ADMIN, Command::ListPending { page: 2 }).await;
    let second = gate.notifier.last_to(ADMIN).unwrap();
    assert_eq!(second.text.matches("\n• ").count(), 25 - LIST_PAGE_SIZE);
    assert!(second.has_action(&Command::ListPending { page: 1 }));
    assert!(!second.has_action(&Command::ListPending { page: 3 }));

    // Past the end clamps to the last page
    gate.command(ADMIN, Command::ListPending { page: 9 }).await;
    assert!(gate.last_reply(ADMIN).contains("page 2 of 2"));
}

#[tokio::test]
async fn status_and_help_depend_on_caller() {
    let gate = Harness::new();

    gate.command(PLAYER, Command::Status).await;
    assert_eq!(gate.last_reply(PLAYER), "You are not registered.");

    gate.register(PLAYER, "steve_1", "203.0.113.5").await;
    gate.command(PLAYER, Command::Status).await;
    assert!(gate.last_reply(PLAYER).contains("awaiting review"));

    gate.command(ADMIN, Command::Approve(PLAYER)).await;
    gate.command(PLAYER, Command::Status).await;
    let status = gate.notifier.last_to(PLAYER).unwrap();
    assert!(status.text.contains("You are approved"));
    assert!(status.has_action(&Command::Unregister));

    gate.command(PLAYER, Command::Help).await;
    assert!(!gate.last_reply(PLAYER).contains("Administration"));
    gate.command(ADMIN, Command::Help).await;
    assert!(gate.last_reply(ADMIN).contains("Administration"));
}

#[tokio::test]
async fn manual_grant_and_revoke_touch_one_store() {
    let gate = Harness::new();
    gate.register(PLAYER, "steve_1", "203.0.113.5").await;

    gate.command(
        ADMIN,
        Command::Grant {
            target: PLAYER,
            resource: Resource::Whitelist,
        },
    )
    .await;
    assert!(gate.whitelist.contains("steve_1"));
    assert!(gate.firewall.rules().is_empty());

    gate.command(
        ADMIN,
        Command::Grant {
            target: PLAYER,
            resource: Resource::Firewall,
        },
    )
    .await;
    assert_eq!(gate.firewall.rules().len(), 2);

    gate.command(
        ADMIN,
        Command::Revoke {
            target: PLAYER,
            resource: Resource::Whitelist,
        },
    )
    .await;
    assert!(gate.whitelist.members().is_empty());
    assert_eq!(gate.firewall.rules().len(), 2);
}

#[tokio::test]
async fn manual_grant_failure_shows_raw_error_to_admin() {
    let gate = Harness::new();
    gate.register(PLAYER, "steve_1", "203.0.113.5").await;
    gate.firewall.fail_protocol(Some(Protocol::Tcp));

    let events = gate
        .command(
            ADMIN,
            Command::Grant {
                target: PLAYER,
                resource: Resource::Firewall,
            },
        )
        .await;

    assert_eq!(
        events,
        vec![GateEvent::AccessDrift {
            account_id: Some(PLAYER),
            failures: 1
        }]
    );
    assert!(gate.last_reply(ADMIN).contains("ufw exited with status 1"));
}

#[tokio::test]
async fn reload_reports_dead_control_channel() {
    let gate = Harness::new();

    gate.command(ADMIN, Command::ReloadWhitelist).await;
    assert_eq!(gate.last_reply(ADMIN), "Whitelist reloaded.");

    gate.whitelist.set_down(true);
    let events = gate.command(ADMIN, Command::ReloadWhitelist).await;
    assert!(gate.last_reply(ADMIN).contains("screen session not found"));
    assert_eq!(
        events,
        vec![GateEvent::AccessDrift {
            account_id: None,
            failures: 1
        }]
    );
    assert_eq!(gate.whitelist.reload_count(), 2);
}

#[tokio::test]
async fn broadcast_reaches_approved_players_only() {
    let gate = Harness::new();
    gate.register_approved(PLAYER, "steve_1", "203.0.113.5").await;
    gate.register_approved(OTHER_PLAYER, "alex", "198.51.100.7").await;
    gate.register(3, "zoe", "192.0.2.80").await;
    gate.notifier.make_unreachable(OTHER_PLAYER);

    gate.command(ADMIN, Command::Broadcast).await;
    gate.text(ADMIN, "Server restarts at 18:00").await;

    assert_eq!(gate.last_reply(PLAYER), "📢 Server restarts at 18:00");
    assert!(!gate.last_reply(3).contains("Server restarts"));
    assert_eq!(gate.last_reply(ADMIN), "Broadcast delivered to 1 of 2 player(s).");
    assert!(gate.dispatcher.sessions().get(ADMIN).await.is_none());
}

#[tokio::test]
async fn empty_broadcast_is_not_sent() {
    let gate = Harness::new();
    gate.register_approved(PLAYER, "steve_1", "203.0.113.5").await;
    let before = gate.notifier.sent_to(PLAYER).len();

    gate.command(ADMIN, Command::Broadcast).await;
    gate.text(ADMIN, "   ").await;

    assert!(gate.last_reply(ADMIN).contains("empty"));
    assert_eq!(gate.notifier.sent_to(PLAYER).len(), before);
}

#[tokio::test]
async fn oversized_broadcast_is_reprompted() {
    let gate = Harness::new();
    gate.register_approved(PLAYER, "steve_1", "203.0.113.5").await;
    let before = gate.notifier.sent_to(PLAYER).len();

    gate.command(ADMIN, Command::Broadcast).await;
    gate.text(ADMIN, &"x".repeat(MAX_MESSAGE_CHARS + 1)).await;

    assert!(gate.last_reply(ADMIN).contains("too long"));
    assert_eq!(gate.notifier.sent_to(PLAYER).len(), before);
    assert_eq!(gate.dispatcher.sessions().get(ADMIN).await, Some(Session::Broadcast));

    gate.text(ADMIN, "Shorter").await;
    assert_eq!(gate.last_reply(PLAYER), "📢 Shorter");
}

#[tokio::test]
async fn idle_sessions_expire() {
    let mut config = minimal_config();
    config.engine.session_timeout_secs = 1;
    let gate = Harness::with_config(config);

    gate.command(PLAYER, Command::Register).await;
    tokio::time::sleep(Duration::from_millis(1100)).await;

    gate.text(PLAYER, "steve_1").await;

    assert!(gate.last_reply(PLAYER).contains("didn't understand"));
    assert!(gate.dispatcher.sessions().get(PLAYER).await.is_none());
}

#[tokio::test]
async fn text_without_session_and_during_unregister() {
    let gate = Harness::new();
    gate.text(PLAYER, "hello").await;
    assert!(gate.last_reply(PLAYER).contains("/help"));

    gate.register(PLAYER, "steve_1", "203.0.113.5").await;
    gate.command(PLAYER, Command::Unregister).await;
    gate.text(PLAYER, "yes").await;
    assert!(gate.last_reply(PLAYER).contains("buttons above"));

    gate.command(PLAYER, Command::Cancel).await;
    assert_eq!(gate.last_reply(PLAYER), "Cancelled.");
    gate.command(PLAYER, Command::Cancel).await;
    assert_eq!(gate.last_reply(PLAYER), "Nothing to cancel.");
}

#[tokio::test]
async fn rejected_input_counts_as_activity() {
    let mut config = minimal_config();
    config.engine.session_timeout_secs = 2;
    let gate = Harness::with_config(config);

    gate.command(PLAYER, Command::Register).await;
    tokio::time::sleep(Duration::from_millis(1200)).await;
    gate.text(PLAYER, "no spaces allowed").await;
    tokio::time::sleep(Duration::from_millis(1200)).await;

    // 2.4s since the prompt, 1.2s since the last message
    gate.text(PLAYER, "steve_1").await;
    assert!(matches!(
        gate.dispatcher.sessions().get(PLAYER).await,
        Some(Session::Registration(RegistrationStep::AwaitingIp { .. }))
    ));
}

#[tokio::test]
async fn oversized_session_timeout_is_refused_and_harmless() {
    for secs in [1_000_000_000_000_000, u64::MAX] {
        let mut config = minimal_config();
        config.engine.session_timeout_secs = secs;
        assert!(config.validate().is_err());

        let gate = Harness::with_config(config);
        gate.command(PLAYER, Command::Register).await;
        gate.text(PLAYER, "steve_1").await;

        assert!(!gate.last_reply(PLAYER).contains("didn't understand"));
        assert!(matches!(
            gate.dispatcher.sessions().get(PLAYER).await,
            Some(Session::Registration(RegistrationStep::AwaitingIp { .. }))
        ));
    }

    let mut config = minimal_config();
    config.engine.session_timeout_secs = MAX_SESSION_TIMEOUT_SECS;
    assert!(config.validate().is_ok());
}
