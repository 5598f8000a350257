//! Self-service unregistration with a confirm/cancel step

use tracing::info;

use super::{describe, Outcome, Services};
use crate::command::Command;
use crate::engine::{GateEvent, RemovalReason};
use crate::error::{Error, Result};
use crate::session::Session;
use crate::traits::{AccountId, OutboundMessage};

pub async fn start(svc: &Services, actor: AccountId) -> Result<Outcome> {
    let account = svc.load(actor).await?;
    svc.sessions.begin(actor, Session::Unregister).await;

    Ok(Outcome::reply(
        OutboundMessage::text(format!(
            "Remove your registration for {}? You will lose access to the server.",
            account.nickname
        ))
        .with_action("Yes, unregister", Command::ConfirmUnregister)
        .with_action("Keep my account", Command::CancelUnregister),
    ))
}

pub async fn confirm(svc: &Services, actor: AccountId) -> Result<Outcome> {
    if svc.sessions.get(actor).await != Some(Session::Unregister) {
        return Err(Error::SessionExpired);
    }
    svc.sessions.end(actor).await;

    let account = svc.load(actor).await?;
    let report = svc.access.revoke(&account).await;
    svc.store.delete(actor).await?;

    info!(account_id = actor, nickname = %account.nickname, "Account unregistered");

    let mut notice = format!("🚪 Player unregistered: {}", describe(&account));
    if let Some(warning) = report.warning() {
        notice.push_str("\n\n");
        notice.push_str(&warning);
    }
    svc.notify_admins(&OutboundMessage::text(notice)).await;

    let mut outcome = Outcome::text("Your registration has been removed. Use /reg to apply again.")
        .with_event(GateEvent::AccountRemoved {
            account_id: actor,
            reason: RemovalReason::Unregistered,
        });
    if !report.is_clean() {
        outcome = outcome.with_event(GateEvent::AccessDrift {
            account_id: Some(actor),
            failures: report.failures.len(),
        });
    }
    Ok(outcome)
}

pub async fn cancel(svc: &Services, actor: AccountId) -> Result<Outcome> {
    if svc.sessions.get(actor).await != Some(Session::Unregister) {
        return Err(Error::SessionExpired);
    }
    svc.sessions.end(actor).await;
    Ok(Outcome::text("Unregistration cancelled."))
}
