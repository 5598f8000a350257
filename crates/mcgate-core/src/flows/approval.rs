//! Administrator decisions on accounts: approve, reject, delete

use tracing::info;

use super::{describe, Outcome, Services};
use crate::engine::{GateEvent, RemovalReason};
use crate::error::Result;
use crate::traits::{AccountId, AccountPatch, OutboundMessage};

/// Approve an account and grant access
///
/// Re-approving an approved account re-issues the grant, which is harmless.
/// Grant failures are reported to the administrator; the approval stands.
pub async fn approve(svc: &Services, actor: AccountId, target: AccountId) -> Result<Outcome> {
    svc.require_admin(actor)?;
    svc.load(target).await?;

    let account = svc
        .store
        .update(target, &AccountPatch::new().approved(true))
        .await?;
    let report = svc.access.grant(&account).await;

    info!(admin = actor, account_id = target, nickname = %account.nickname, "Account approved");

    svc.notify(
        target,
        &OutboundMessage::text(format!(
            "✅ Your application has been approved! Nickname {} can now join from {}.",
            account.nickname, account.ip_address
        )),
    )
    .await;

    let mut text = format!("Approved {}", describe(&account));
    let mut outcome = Outcome::default().with_event(GateEvent::AccountApproved { account_id: target });
    if let Some(warning) = report.warning() {
        text.push_str("\n\n");
        text.push_str(&warning);
        outcome = outcome.with_event(GateEvent::AccessDrift {
            account_id: Some(target),
            failures: report.failures.len(),
        });
    }
    outcome.reply = OutboundMessage::text(text);
    Ok(outcome)
}

/// Reject a pending application: revoke whatever may be granted, delete the row
pub async fn reject(svc: &Services, actor: AccountId, target: AccountId) -> Result<Outcome> {
    remove(
        svc,
        actor,
        target,
        RemovalReason::Rejected,
        "❌ Your application has been declined by an administrator.",
    )
    .await
}

/// Delete an account outright
pub async fn delete(svc: &Services, actor: AccountId, target: AccountId) -> Result<Outcome> {
    remove(
        svc,
        actor,
        target,
        RemovalReason::Deleted,
        "Your registration has been removed by an administrator.",
    )
    .await
}

async fn remove(
    svc: &Services,
    actor: AccountId,
    target: AccountId,
    reason: RemovalReason,
    notice: &str,
) -> Result<Outcome> {
    svc.require_admin(actor)?;
    let account = svc.load(target).await?;

    let report = svc.access.revoke(&account).await;
    svc.store.delete(target).await?;
    // A half-finished edit of a deleted account has nothing left to edit
    svc.sessions.end(target).await;

    info!(
        admin = actor,
        account_id = target,
        nickname = %account.nickname,
        reason = ?reason,
        "Account removed"
    );

    svc.notify(target, &OutboundMessage::text(notice)).await;

    let verb = match reason {
        RemovalReason::Rejected => "Rejected",
        _ => "Deleted",
    };
    let mut text = format!("{verb} {}", describe(&account));
    let mut outcome = Outcome::default().with_event(GateEvent::AccountRemoved {
        account_id: target,
        reason,
    });
    if let Some(warning) = report.warning() {
        text.push_str("\n\n");
        text.push_str(&warning);
        outcome = outcome.with_event(GateEvent::AccessDrift {
            account_id: Some(target),
            failures: report.failures.len(),
        });
    }
    outcome.reply = OutboundMessage::text(text);
    Ok(outcome)
}
