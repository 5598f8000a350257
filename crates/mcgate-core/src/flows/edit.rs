//! Nickname and IP edits
//!
//! Two parallel one-step machines (`AwaitingValue → done`). A user edits
//! their own row; an administrator may edit anyone's. For an approved
//! account the old grant is retracted before the row is written and the new
//! grant is installed afterwards. If the write fails, the old grant is put
//! back so access keeps matching the (unchanged) row.

use tracing::{debug, info, warn};

use super::{Outcome, Services};
use crate::access::{SyncReport, SyncStep};
use crate::command::Command;
use crate::engine::GateEvent;
use crate::error::{ConflictError, Field, Result, ValidationError};
use crate::session::Session;
use crate::traits::{Account, AccountId, AccountPatch, OutboundMessage};
use crate::validate::{canonical_nickname, validate_ip};

/// Resolve the edit target and check permission
fn resolve(svc: &Services, actor: AccountId, target: Option<AccountId>) -> Result<(AccountId, bool)> {
    match target {
        Some(target) => {
            svc.require_admin(actor)?;
            Ok((target, true))
        }
        None => Ok((actor, false)),
    }
}

/// Enter the nickname edit
pub async fn start_nickname(svc: &Services, actor: AccountId, target: Option<AccountId>) -> Result<Outcome> {
    let (target, by_admin) = resolve(svc, actor, target)?;
    let account = svc.load(target).await?;

    svc.sessions
        .begin(actor, Session::EditNickname { target, by_admin })
        .await;

    Ok(Outcome::reply(
        OutboundMessage::text(format!(
            "Current nickname: {}\nEnter the new nickname (3-16 characters: latin letters, digits, underscore):",
            account.nickname
        ))
        .with_action("Cancel", Command::Cancel),
    ))
}

/// Enter the IP edit
pub async fn start_ip(svc: &Services, actor: AccountId, target: Option<AccountId>) -> Result<Outcome> {
    let (target, by_admin) = resolve(svc, actor, target)?;
    let account = svc.load(target).await?;

    svc.sessions.begin(actor, Session::EditIp { target, by_admin }).await;

    Ok(Outcome::reply(
        OutboundMessage::text(format!(
            "Current IP address: {}\nEnter the new IP address:",
            account.ip_address
        ))
        .with_action("Cancel", Command::Cancel),
    ))
}

/// Load the edit target, ending the session if it no longer exists
async fn load_target(svc: &Services, actor: AccountId, target: AccountId) -> Result<Account> {
    match svc.load(target).await {
        Ok(account) => Ok(account),
        Err(e) => {
            svc.sessions.end(actor).await;
            Err(e)
        }
    }
}

/// Handle the submitted nickname
pub async fn submit_nickname(
    svc: &Services,
    actor: AccountId,
    target: AccountId,
    by_admin: bool,
    text: &str,
) -> Result<Outcome> {
    let account = load_target(svc, actor, target).await?;

    let nickname = canonical_nickname(text)?;
    if nickname.eq_ignore_ascii_case(&account.nickname) {
        return Err(ConflictError::NoChange.into());
    }
    if svc.store.nickname_holder(&nickname).await?.is_some() {
        return Err(ConflictError::NicknameTaken(nickname).into());
    }

    let mut report = SyncReport::default();
    if account.approved {
        report.record(
            Some(target),
            SyncStep::WhitelistRemove,
            svc.access.whitelist_remove(&account.nickname).await,
        );
    }

    let updated = match svc
        .store
        .update(target, &AccountPatch::new().nickname(&nickname))
        .await
    {
        Ok(updated) => updated,
        Err(e) => {
            if account.approved {
                restore(svc, &account, Field::Nickname).await;
            }
            if !e.is_recoverable() {
                svc.sessions.end(actor).await;
            }
            return Err(e);
        }
    };

    if updated.approved {
        report.record(
            Some(target),
            SyncStep::WhitelistAdd,
            svc.access.whitelist_add(&updated.nickname).await,
        );
    }
    svc.sessions.end(actor).await;

    info!(
        actor,
        account_id = target,
        old = %account.nickname,
        new = %updated.nickname,
        "Nickname changed"
    );

    finish(svc, actor, by_admin, &account, &updated, Field::Nickname, report).await
}

/// Handle the submitted IP address
pub async fn submit_ip(
    svc: &Services,
    actor: AccountId,
    target: AccountId,
    by_admin: bool,
    text: &str,
) -> Result<Outcome> {
    let account = load_target(svc, actor, target).await?;

    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Empty(Field::Ip).into());
    }
    if trimmed == account.ip_address {
        return Err(ConflictError::NoChange.into());
    }
    let ip_address = validate_ip(svc.store.as_ref(), trimmed).await?;

    let mut report = SyncReport::default();
    if account.approved {
        report.record(
            Some(target),
            SyncStep::FirewallRemove,
            svc.access.firewall_remove(&account.ip_address).await,
        );
    }

    let updated = match svc
        .store
        .update(target, &AccountPatch::new().ip_address(&ip_address))
        .await
    {
        Ok(updated) => updated,
        Err(e) => {
            if account.approved {
                restore(svc, &account, Field::Ip).await;
            }
            if !e.is_recoverable() {
                svc.sessions.end(actor).await;
            }
            return Err(e);
        }
    };

    if updated.approved {
        report.record(
            Some(target),
            SyncStep::FirewallAdd,
            svc.access.firewall_add(&updated.ip_address).await,
        );
    }
    svc.sessions.end(actor).await;

    info!(
        actor,
        account_id = target,
        old = %account.ip_address,
        new = %updated.ip_address,
        "IP address changed"
    );

    finish(svc, actor, by_admin, &account, &updated, Field::Ip, report).await
}

/// Put back the grant retracted before a failed write
async fn restore(svc: &Services, account: &Account, field: Field) {
    let result = match field {
        Field::Nickname => svc.access.whitelist_add(&account.nickname).await,
        Field::Ip => svc.access.firewall_add(&account.ip_address).await,
    };
    if let Err(e) = result {
        warn!(
            account_id = account.account_id,
            nickname = %account.nickname,
            ip = %account.ip_address,
            error = %e,
            "Failed to restore access after aborted edit"
        );
    }
}

/// Notify the other party and build the actor's reply
async fn finish(
    svc: &Services,
    actor: AccountId,
    by_admin: bool,
    before: &Account,
    after: &Account,
    field: Field,
    report: SyncReport,
) -> Result<Outcome> {
    let (old, new) = match field {
        Field::Nickname => (&before.nickname, &after.nickname),
        Field::Ip => (&before.ip_address, &after.ip_address),
    };

    let mut reply = format!("The {field} has been changed from {old} to {new}.");
    let warning = report.warning();

    if by_admin {
        // Drift details only ever go to administrators
        if let Some(warning) = &warning {
            reply.push_str("\n\n");
            reply.push_str(warning);
        }
        svc.notify(
            after.account_id,
            &OutboundMessage::text(format!(
                "An administrator changed your {field} from {old} to {new}."
            )),
        )
        .await;
    } else if after.approved {
        let mut notice = format!(
            "✏️ Player {} (id {}) changed their {field}: {old} → {new}",
            after.nickname, after.account_id
        );
        if let Some(warning) = &warning {
            notice.push_str("\n\n");
            notice.push_str(warning);
        }
        svc.notify_admins(&OutboundMessage::text(notice)).await;
    }

    let mut outcome = Outcome::text(reply).with_event(GateEvent::AccountEdited {
        account_id: after.account_id,
        field,
    });
    if !report.is_clean() {
        outcome = outcome.with_event(GateEvent::AccessDrift {
            account_id: Some(after.account_id),
            failures: report.failures.len(),
        });
    }
    debug!(actor, by_admin, field = %field, "Edit finished");
    Ok(outcome)
}
